//! `config init` and `config show`.

use std::path::Path;
use tls_witness::config::Config;

pub fn init(path: &Path, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() && !force {
        return Err(format!(
            "config file '{}' already exists (use --force to overwrite)",
            path.display()
        )
        .into());
    }

    Config::create_default(path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

pub fn show(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_or_default(path)?;
    config.validate()?;
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

/// Configuration at `path`, or the defaults when no file exists.
pub fn load_or_default(path: &Path) -> Result<Config, Box<dyn std::error::Error>> {
    if path.exists() {
        Ok(Config::load(path)?)
    } else {
        Ok(Config::default())
    }
}
