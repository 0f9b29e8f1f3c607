//! Site-wide statistics queries.

use std::sync::Arc;

use prompthub_common::{AppError, AppResult};
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbBackend, EntityTrait, FromQueryResult, PaginatorTrait,
    QueryFilter, Statement,
};
use serde::{Deserialize, Serialize};

use crate::entities::prompt::PromptStatus;
use crate::entities::{Category, Favorite, Prompt, Tag, User, prompt};

/// Aggregate counters for the admin dashboard.
///
/// Field names match the columns returned by the `prompt_stats()` SQL function.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, FromQueryResult)]
pub struct PromptStats {
    pub total_prompts: i64,
    pub published_prompts: i64,
    pub reviewing_prompts: i64,
    pub rejected_prompts: i64,
    pub total_users: i64,
    pub total_categories: i64,
    pub total_tags: i64,
    pub total_favorites: i64,
}

/// Statistics repository.
#[derive(Clone)]
pub struct StatsRepository {
    db: Arc<DatabaseConnection>,
}

impl StatsRepository {
    /// Create a new statistics repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Call the `prompt_stats()` aggregate function.
    pub async fn aggregate(&self) -> AppResult<Option<PromptStats>> {
        PromptStats::find_by_statement(Statement::from_string(
            DbBackend::Postgres,
            "SELECT * FROM prompt_stats()",
        ))
        .one(self.db.as_ref())
        .await
        .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count prompts, optionally restricted to one status.
    pub async fn count_prompts(&self, status: Option<PromptStatus>) -> AppResult<i64> {
        let mut query = Prompt::find();
        if let Some(status) = status {
            query = query.filter(prompt::Column::Status.eq(status));
        }
        count(query.count(self.db.as_ref()).await)
    }

    /// Count users.
    pub async fn count_users(&self) -> AppResult<i64> {
        count(User::find().count(self.db.as_ref()).await)
    }

    /// Count categories.
    pub async fn count_categories(&self) -> AppResult<i64> {
        count(Category::find().count(self.db.as_ref()).await)
    }

    /// Count tags.
    pub async fn count_tags(&self) -> AppResult<i64> {
        count(Tag::find().count(self.db.as_ref()).await)
    }

    /// Count favorites.
    pub async fn count_favorites(&self) -> AppResult<i64> {
        count(Favorite::find().count(self.db.as_ref()).await)
    }
}

fn count(result: Result<u64, sea_orm::DbErr>) -> AppResult<i64> {
    result
        .map(|n| i64::try_from(n).unwrap_or(i64::MAX))
        .map_err(|e| AppError::Database(e.to_string()))
}
