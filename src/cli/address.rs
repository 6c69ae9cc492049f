use tls_witness::claims::{address_for_key, parse_private_key, EthSecp256k1};

/// Print the address controlled by a private key
pub fn execute(private_key: &str) -> Result<(), Box<dyn std::error::Error>> {
    let key = parse_private_key(private_key)?;
    println!("{}", address_for_key(&EthSecp256k1, &key)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_execute() {
        assert!(execute("0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80").is_ok());
        assert!(execute("zz").is_err());
    }
}
