use super::CommandResult;
use crate::Config;
use crate::database::entities::Plan;
use crate::database::{DatabaseManager, DatabaseManagerImpl, DatabaseResult};
use crate::entitlement::{EntitlementLedger, UsageSummary};
use clap::Subcommand;
use std::sync::Arc;
use tracing::info;

#[derive(Subcommand, Debug, PartialEq)]
pub enum UsageAction {
    /// Start a new counting period for one account, or for all accounts
    Reset {
        #[arg(long, help = "Only reset this user ID")]
        user: Option<i32>,
    },
    /// Move an account to another plan (free, pro, enterprise, admin)
    SetPlan {
        #[arg(long)]
        user: i32,
        #[arg(long)]
        plan: Plan,
    },
    /// Print an account's usage summary as JSON
    Show {
        #[arg(long)]
        user: i32,
    },
}

pub async fn handle_usage_command(action: UsageAction, config: &Config) -> CommandResult {
    let db: Arc<dyn DatabaseManager> = Arc::new(DatabaseManagerImpl::new_from_config(config).await?);
    let ledger = EntitlementLedger::new(db, config.plans.limits());

    match run_usage_action(action, &ledger).await? {
        UsageOutput::Message(message) => println!("{}", message),
        UsageOutput::Summary(summary) => println!("{}", serde_json::to_string_pretty(&summary)?),
    }
    Ok(())
}

#[derive(Debug)]
pub enum UsageOutput {
    Message(String),
    Summary(UsageSummary),
}

pub async fn run_usage_action(
    action: UsageAction,
    ledger: &EntitlementLedger,
) -> DatabaseResult<UsageOutput> {
    match action {
        UsageAction::Reset { user: Some(user_id) } => {
            ledger.reset_period(user_id).await?;
            info!(user_id, "Usage reset");
            Ok(UsageOutput::Message(format!("Usage reset for user {}", user_id)))
        }
        UsageAction::Reset { user: None } => {
            let count = ledger.reset_all().await?;
            Ok(UsageOutput::Message(format!("Usage reset for {} accounts", count)))
        }
        UsageAction::SetPlan { user, plan } => {
            ledger.change_plan(user, plan).await?;
            Ok(UsageOutput::Message(format!("User {} moved to plan {}", user, plan)))
        }
        UsageAction::Show { user } => Ok(UsageOutput::Summary(ledger.summary(user).await?)),
    }
}
