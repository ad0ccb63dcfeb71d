pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "card-binding")]
#[command(about = "Manage default payment cards for billing customers")]
pub struct CliConfig {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "card-binding.toml")]
    pub config: String,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Create the remote billing customer for an account (no-op if it exists)
    Provision {
        account: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        name: Option<String>,
    },
    /// Attach a payment method and make it the account's default
    SetDefault { account: String, reference: String },
    /// Show the account's default payment method
    ShowDefault { account: String },
    /// List card payment methods attached to the account's customer
    List { account: String },
}

#[cfg(feature = "cli")]
impl Command {
    pub fn account_id(&self) -> &str {
        match self {
            Command::Provision { account, .. }
            | Command::SetDefault { account, .. }
            | Command::ShowDefault { account }
            | Command::List { account } => account,
        }
    }
}
