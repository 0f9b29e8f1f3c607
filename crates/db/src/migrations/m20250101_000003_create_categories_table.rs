//! Create categories table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Categories::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Categories::Id).string_len(32).not_null().primary_key())
                    .col(ColumnDef::new(Categories::Name).string_len(64).not_null())
                    .col(ColumnDef::new(Categories::DisplayName).string_len(128).not_null())
                    .col(ColumnDef::new(Categories::Icon).string_len(64))
                    .col(ColumnDef::new(Categories::Color).string_len(32))
                    .col(ColumnDef::new(Categories::Count).integer().not_null().default(0))
                    .col(ColumnDef::new(Categories::SortOrder).integer().not_null().default(0))
                    .col(
                        ColumnDef::new(Categories::CreatedAt)
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
                    .name("idx_categories_name")
                    .table(Categories::Table)
                    .col(Categories::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Categories::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Categories {
    Table,
    Id,
    Name,
    DisplayName,
    Icon,
    Color,
    Count,
    SortOrder,
    CreatedAt,
}
