use tls_witness::claims::ClaimInfo;

/// Print the identifier of a claim
pub fn execute(
    provider: &str,
    parameters: &str,
    context: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let identifier = ClaimInfo::new(provider, parameters, context).identifier()?;
    println!("{}", identifier);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_execute() {
        assert!(execute("http", r#"{"b":2,"a":1}"#, "").is_ok());
        assert!(execute("http", "not json", "").is_err());
    }
}
