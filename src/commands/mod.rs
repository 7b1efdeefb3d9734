pub mod migrate;
pub mod usage;

use crate::Config;
use clap::Subcommand;

pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,
    /// Run database migrations
    Migrate {
        #[command(subcommand)]
        action: migrate::MigrateAction,
    },
    /// Inspect and adjust account usage counters
    Usage {
        #[command(subcommand)]
        action: usage::UsageAction,
    },
}

/// Runs every command except `Serve`, which the binary handles itself
pub async fn handle_command(command: Commands, config: &Config) -> CommandResult {
    match command {
        Commands::Serve => Ok(()),
        Commands::Migrate { action } => migrate::handle_migrate_command(action, config).await,
        Commands::Usage { action } => usage::handle_usage_command(action, config).await,
    }
}
