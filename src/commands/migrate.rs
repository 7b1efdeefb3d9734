use super::CommandResult;
use crate::Config;
use crate::database::DatabaseManagerImpl;
use crate::database::migration::Migrator;
use clap::Subcommand;
use sea_orm_migration::MigratorTrait;
use tracing::info;

#[derive(Subcommand)]
pub enum MigrateAction {
    /// Apply all pending migrations
    Up,
    /// Roll back applied migrations
    Down {
        #[arg(short, long, default_value = "1", help = "Number of migrations to roll back")]
        steps: u32,
    },
    /// Show applied and pending migrations
    Status,
}

pub async fn handle_migrate_command(action: MigrateAction, config: &Config) -> CommandResult {
    let db = DatabaseManagerImpl::new_from_config(config).await?;
    let connection = &db.connection;

    match action {
        MigrateAction::Up => {
            info!("Running pending migrations...");
            Migrator::up(connection, None).await?;
            info!("All migrations applied");
        }
        MigrateAction::Down { steps } => {
            info!(steps, "Rolling back migrations...");
            Migrator::down(connection, Some(steps)).await?;
            info!("Rollback completed");
        }
        MigrateAction::Status => {
            Migrator::status(connection).await?;
        }
    }

    Ok(())
}
