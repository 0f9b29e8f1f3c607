//! Create reviews table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Reviews::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Reviews::Id).string_len(32).not_null().primary_key())
                    .col(ColumnDef::new(Reviews::PromptId).string_len(32).not_null())
                    .col(ColumnDef::new(Reviews::ReviewerId).string_len(32).not_null())
                    .col(ColumnDef::new(Reviews::Status).string_len(16).not_null())
                    .col(ColumnDef::new(Reviews::Notes).text())
                    .col(
                        ColumnDef::new(Reviews::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_reviews_prompt")
                            .from(Reviews::Table, Reviews::PromptId)
                            .to(Prompts::Table, Prompts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_reviews_reviewer")
                            .from(Reviews::Table, Reviews::ReviewerId)
                            .to(Users::Table, Users::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_reviews_prompt_id")
                    .table(Reviews::Table)
                    .col(Reviews::PromptId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Reviews::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Reviews {
    Table,
    Id,
    PromptId,
    ReviewerId,
    Status,
    Notes,
    CreatedAt,
}

#[derive(Iden)]
enum Prompts {
    Table,
    Id,
}

#[derive(Iden)]
enum Users {
    Table,
    Id,
}
