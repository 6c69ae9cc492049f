use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod address;
pub mod config;
pub mod identifier;
pub mod version;
pub mod witnesses;

#[derive(Parser)]
#[command(name = "tls-witness")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Selective-disclosure claims over witnessed TLS sessions", long_about = None)]
pub struct Cli {
    /// Path to config file (default: ~/.config/tls-witness/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Compute the identifier of a claim
    Identifier {
        /// Provider name
        #[arg(long)]
        provider: String,

        /// Claim parameters as JSON
        #[arg(long)]
        parameters: String,

        /// Claim context as JSON (optional)
        #[arg(long, default_value = "")]
        context: String,
    },

    /// List the witnesses selected for a claim in the configured epoch
    Witnesses {
        /// Claim identifier (0x-prefixed hex)
        #[arg(long)]
        identifier: String,

        /// Claim timestamp in unix seconds
        #[arg(long)]
        timestamp: u32,
    },

    /// Print the address controlled by a private key
    Address {
        /// Hex-encoded secp256k1 private key
        #[arg(long)]
        private_key: String,
    },

    /// Display version information
    Version,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,
}

/// Config file the command line points at.
pub fn config_path(cli: &Cli) -> PathBuf {
    cli.config
        .clone()
        .unwrap_or_else(tls_witness::config::default_config_path)
}

pub async fn execute(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let path = config_path(&cli);
    match cli.command {
        Commands::Config { action } => match action {
            ConfigAction::Init { force } => config::init(&path, force),
            ConfigAction::Show => config::show(&path),
        },
        Commands::Identifier {
            provider,
            parameters,
            context,
        } => identifier::execute(&provider, &parameters, &context),
        Commands::Witnesses {
            identifier,
            timestamp,
        } => witnesses::execute(&path, &identifier, timestamp).await,
        Commands::Address { private_key } => address::execute(&private_key),
        Commands::Version => {
            version::execute();
            Ok(())
        }
    }
}
