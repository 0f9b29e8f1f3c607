//! Create prompts and prompt_tags tables migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Prompts::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Prompts::Id).string_len(32).not_null().primary_key())
                    .col(ColumnDef::new(Prompts::Title).string_len(200).not_null())
                    .col(ColumnDef::new(Prompts::Description).text())
                    .col(ColumnDef::new(Prompts::Content).text().not_null())
                    .col(
                        ColumnDef::new(Prompts::Status)
                            .string_len(16)
                            .not_null()
                            .default("reviewing"),
                    )
                    .col(ColumnDef::new(Prompts::IsPublic).boolean().not_null().default(true))
                    .col(ColumnDef::new(Prompts::ViewCount).big_integer().not_null().default(0))
                    .col(
                        ColumnDef::new(Prompts::FavoriteCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Prompts::Images)
                            .json_binary()
                            .not_null()
                            .default(Expr::cust("'[]'::jsonb")),
                    )
                    .col(ColumnDef::new(Prompts::CategoryId).string_len(32))
                    .col(ColumnDef::new(Prompts::AuthorId).string_len(32).not_null())
                    .col(
                        ColumnDef::new(Prompts::Language)
                            .string_len(16)
                            .not_null()
                            .default("en"),
                    )
                    .col(
                        ColumnDef::new(Prompts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Prompts::UpdatedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_prompts_author")
                            .from(Prompts::Table, Prompts::AuthorId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_prompts_category")
                            .from(Prompts::Table, Prompts::CategoryId)
                            .to(Categories::Table, Categories::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .check(Expr::col(Prompts::FavoriteCount).gte(0))
                    .to_owned(),
            )
            .await?;

        // Public listing: status + visibility, newest first
        manager
            .create_index(
                Index::create()
                    .name("idx_prompts_status_public_created")
                    .table(Prompts::Table)
                    .col(Prompts::Status)
                    .col(Prompts::IsPublic)
                    .col(Prompts::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_prompts_author_id")
                    .table(Prompts::Table)
                    .col(Prompts::AuthorId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_prompts_category_id")
                    .table(Prompts::Table)
                    .col(Prompts::CategoryId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PromptTags::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(PromptTags::PromptId).string_len(32).not_null())
                    .col(ColumnDef::new(PromptTags::TagId).string_len(32).not_null())
                    .primary_key(
                        Index::create()
                            .col(PromptTags::PromptId)
                            .col(PromptTags::TagId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_prompt_tags_prompt")
                            .from(PromptTags::Table, PromptTags::PromptId)
                            .to(Prompts::Table, Prompts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_prompt_tags_tag")
                            .from(PromptTags::Table, PromptTags::TagId)
                            .to(Tags::Table, Tags::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Tag filter looks up prompts by tag
        manager
            .create_index(
                Index::create()
                    .name("idx_prompt_tags_tag_id")
                    .table(PromptTags::Table)
                    .col(PromptTags::TagId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PromptTags::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Prompts::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Prompts {
    Table,
    Id,
    Title,
    Description,
    Content,
    Status,
    IsPublic,
    ViewCount,
    FavoriteCount,
    Images,
    CategoryId,
    AuthorId,
    Language,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum PromptTags {
    Table,
    PromptId,
    TagId,
}

#[derive(Iden)]
enum Users {
    Table,
    Id,
}

#[derive(Iden)]
enum Categories {
    Table,
    Id,
}

#[derive(Iden)]
enum Tags {
    Table,
    Id,
}
