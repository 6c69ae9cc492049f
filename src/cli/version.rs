/// Display version information
pub fn execute() {
    println!("tls-witness {}", env!("CARGO_PKG_VERSION"));
    println!("Selective-disclosure claims over witnessed TLS sessions");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_execute() {
        // Version command should not panic
        execute();
    }
}
