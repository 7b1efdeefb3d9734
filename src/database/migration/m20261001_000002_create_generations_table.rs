use super::{Generations, Users};
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Generations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Generations::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Generations::UserId).integer().not_null())
                    .col(ColumnDef::new(Generations::ContentType).string().not_null())
                    .col(ColumnDef::new(Generations::Topic).string().not_null())
                    .col(ColumnDef::new(Generations::Tone).string().not_null())
                    .col(ColumnDef::new(Generations::Length).string().not_null())
                    .col(ColumnDef::new(Generations::AdditionalPrompt).text().null())
                    .col(
                        ColumnDef::new(Generations::GeneratedContent)
                            .text()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Generations::TokensUsed).integer().null())
                    .col(ColumnDef::new(Generations::ProcessingTimeMs).integer().null())
                    .col(ColumnDef::new(Generations::ModelUsed).string().null())
                    .col(
                        ColumnDef::new(Generations::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_generations_user_id")
                            .from(Generations::Table, Generations::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // History listing is per user, newest first
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_generations_user_created")
                    .table(Generations::Table)
                    .col(Generations::UserId)
                    .col(Generations::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Generations::Table).to_owned())
            .await
    }
}
