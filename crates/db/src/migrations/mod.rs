//! Database migrations.
//!
//! Schema migrations for the database.

#![allow(missing_docs)]

use sea_orm_migration::prelude::*;

mod m20250101_000001_create_users_table;
mod m20250101_000002_create_profiles_table;
mod m20250101_000003_create_categories_table;
mod m20250101_000004_create_tags_table;
mod m20250101_000005_create_prompts_table;
mod m20250101_000006_create_favorites_table;
mod m20250101_000007_create_reviews_table;
mod m20250101_000008_create_prompt_stats_function;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_users_table::Migration),
            Box::new(m20250101_000002_create_profiles_table::Migration),
            Box::new(m20250101_000003_create_categories_table::Migration),
            Box::new(m20250101_000004_create_tags_table::Migration),
            Box::new(m20250101_000005_create_prompts_table::Migration),
            Box::new(m20250101_000006_create_favorites_table::Migration),
            Box::new(m20250101_000007_create_reviews_table::Migration),
            Box::new(m20250101_000008_create_prompt_stats_function::Migration),
        ]
    }
}
