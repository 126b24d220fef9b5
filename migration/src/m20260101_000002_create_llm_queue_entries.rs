// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(LlmQueueEntries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LlmQueueEntries::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(LlmQueueEntries::UserId).string().not_null())
                    .col(ColumnDef::new(LlmQueueEntries::Prompt).text().not_null())
                    .col(ColumnDef::new(LlmQueueEntries::Feature).string().not_null())
                    .col(ColumnDef::new(LlmQueueEntries::TaskId).string())
                    .col(
                        ColumnDef::new(LlmQueueEntries::Status)
                            .string_len(20)
                            .not_null()
                            .default("PENDING"),
                    )
                    .col(ColumnDef::new(LlmQueueEntries::ResultText).text())
                    .col(ColumnDef::new(LlmQueueEntries::ErrorMessage).text())
                    .col(
                        ColumnDef::new(LlmQueueEntries::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(LlmQueueEntries::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(LlmQueueEntries::ProcessedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        // Claim scan: oldest PENDING; recovery scan: oldest stale PROCESSING
        manager
            .create_index(
                Index::create()
                    .name("idx_llm_queue_status_created_at")
                    .table(LlmQueueEntries::Table)
                    .col(LlmQueueEntries::Status)
                    .col(LlmQueueEntries::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // Cooldown gate: latest processed_at among terminal entries
        manager
            .create_index(
                Index::create()
                    .name("idx_llm_queue_status_processed_at")
                    .table(LlmQueueEntries::Table)
                    .col(LlmQueueEntries::Status)
                    .col(LlmQueueEntries::ProcessedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_llm_queue_feature_task_status")
                    .table(LlmQueueEntries::Table)
                    .col(LlmQueueEntries::Feature)
                    .col(LlmQueueEntries::TaskId)
                    .col(LlmQueueEntries::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_llm_queue_user_id")
                    .table(LlmQueueEntries::Table)
                    .col(LlmQueueEntries::UserId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(LlmQueueEntries::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum LlmQueueEntries {
    Table,
    Id,
    UserId,
    Prompt,
    Feature,
    TaskId,
    Status,
    #[sea_orm(iden = "result")]
    ResultText,
    #[sea_orm(iden = "error")]
    ErrorMessage,
    CreatedAt,
    UpdatedAt,
    ProcessedAt,
}
