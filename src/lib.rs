//! Leasehold - leased, self-expiring Kubernetes clusters
//!
//! Tracks clusters on Linode LKE, gives each one a lease, and tears down
//! clusters whose lease lapses. Operators drive it from a line-oriented
//! console.

pub mod commands;
pub mod config;
pub mod daemon;

#[cfg(test)]
mod testing;

pub use config::Settings;

use clap::{Parser, Subcommand};

/// Leasehold - leased Kubernetes clusters on Linode LKE
#[derive(Parser, Debug)]
#[command(name = "leasehold")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub settings: Settings,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Run the sweeper and the operator console (default)
    Run,
    /// Print the current cluster listing and exit
    List,
}

impl Cli {
    /// Run the selected command
    pub async fn run(self) -> anyhow::Result<()> {
        self.settings.validate()?;
        match self.command.unwrap_or(Commands::Run) {
            Commands::Run => daemon::run(self.settings).await,
            Commands::List => daemon::list(self.settings).await,
        }
    }
}
