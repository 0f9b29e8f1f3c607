//! Create the `prompt_stats()` aggregate function.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Column names must match `repositories::stats::PromptStats`
        manager
            .get_connection()
            .execute_unprepared(
                r"
                CREATE OR REPLACE FUNCTION prompt_stats()
                RETURNS TABLE (
                    total_prompts BIGINT,
                    published_prompts BIGINT,
                    reviewing_prompts BIGINT,
                    rejected_prompts BIGINT,
                    total_users BIGINT,
                    total_categories BIGINT,
                    total_tags BIGINT,
                    total_favorites BIGINT
                )
                LANGUAGE sql STABLE
                AS $$
                    SELECT
                        (SELECT COUNT(*) FROM prompts),
                        (SELECT COUNT(*) FROM prompts WHERE status = 'published'),
                        (SELECT COUNT(*) FROM prompts WHERE status = 'reviewing'),
                        (SELECT COUNT(*) FROM prompts WHERE status = 'rejected'),
                        (SELECT COUNT(*) FROM users),
                        (SELECT COUNT(*) FROM categories),
                        (SELECT COUNT(*) FROM tags),
                        (SELECT COUNT(*) FROM favorites)
                $$;
                ",
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("DROP FUNCTION IF EXISTS prompt_stats();")
            .await?;

        Ok(())
    }
}
