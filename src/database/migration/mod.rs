use sea_orm_migration::prelude::*;

pub use sea_orm_migration::MigratorTrait;

mod m20261001_000001_create_users_table;
mod m20261001_000002_create_generations_table;
mod m20261001_000003_create_api_keys_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20261001_000001_create_users_table::Migration),
            Box::new(m20261001_000002_create_generations_table::Migration),
            Box::new(m20261001_000003_create_api_keys_table::Migration),
        ]
    }
}

/// Common table and column identifiers
#[derive(Iden)]
pub enum Users {
    Table,
    Id,
    Email,
    Username,
    PasswordHash,
    FullName,
    IsActive,
    IsVerified,
    Plan,
    GenerationsUsed,
    PeriodStart,
    StripeCustomerId,
    StripeSubscriptionId,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
pub enum Generations {
    Table,
    Id,
    UserId,
    ContentType,
    Topic,
    Tone,
    Length,
    AdditionalPrompt,
    GeneratedContent,
    TokensUsed,
    ProcessingTimeMs,
    ModelUsed,
    CreatedAt,
}

#[derive(Iden)]
pub enum ApiKeys {
    Table,
    Id,
    UserId,
    KeyHash,
    KeyPrefix,
    Name,
    IsActive,
    LastUsed,
    CreatedAt,
    ExpiresAt,
}
