//! Create tags table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Tags::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Tags::Id).string_len(32).not_null().primary_key())
                    .col(ColumnDef::new(Tags::Name).string_len(64).not_null())
                    .col(ColumnDef::new(Tags::DisplayName).string_len(64).not_null())
                    .col(ColumnDef::new(Tags::Color).string_len(32))
                    .col(ColumnDef::new(Tags::Count).integer().not_null().default(0))
                    .col(
                        ColumnDef::new(Tags::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_tags_name")
                    .table(Tags::Table)
                    .col(Tags::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Popular tags listing
        manager
            .create_index(
                Index::create()
                    .name("idx_tags_count")
                    .table(Tags::Table)
                    .col(Tags::Count)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Tags::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Tags {
    Table,
    Id,
    Name,
    DisplayName,
    Color,
    Count,
    CreatedAt,
}
