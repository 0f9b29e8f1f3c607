//! Tag and prompt/tag association repository.

use std::sync::Arc;

use chrono::Utc;
use prompthub_common::{AppError, AppResult};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};

use super::escape_like;
use crate::entities::{PromptTag, Tag, prompt_tag, tag};

/// Tag repository for database operations.
#[derive(Clone)]
pub struct TagRepository {
    db: Arc<DatabaseConnection>,
}

impl TagRepository {
    /// Create a new tag repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a tag by its (lower-cased) name.
    pub async fn find_by_name(&self, name: &str) -> AppResult<Option<tag::Model>> {
        Tag::find()
            .filter(tag::Column::Name.eq(name.to_lowercase()))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Most used tags.
    pub async fn find_popular(&self, limit: u64) -> AppResult<Vec<tag::Model>> {
        Tag::find()
            .order_by_desc(tag::Column::Count)
            .order_by_asc(tag::Column::Name)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Tags whose name starts with `prefix`, most used first.
    ///
    /// `%` and `_` in the prefix match literally.
    pub async fn search_by_prefix(
        &self,
        prefix: &str,
        limit: u64,
    ) -> AppResult<Vec<tag::Model>> {
        let pattern = format!("{}%", escape_like(&prefix.to_lowercase()));
        Tag::find()
            .filter(tag::Column::Name.like(pattern))
            .order_by_desc(tag::Column::Count)
            .order_by_asc(tag::Column::Name)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert a new tag.
    pub async fn create(&self, id: String, name: &str) -> AppResult<tag::Model> {
        let model = tag::ActiveModel {
            id: Set(id),
            name: Set(name.to_lowercase()),
            display_name: Set(name.to_string()),
            color: Set(None),
            count: Set(0),
            created_at: Set(Utc::now().into()),
        };

        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count all tags.
    pub async fn count(&self) -> AppResult<u64> {
        Tag::find()
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ==================== Prompt/Tag Operations ====================

    /// Tags attached to each of `prompt_ids`, as `(prompt_id, tag)` pairs.
    pub async fn find_for_prompts(
        &self,
        prompt_ids: &[String],
    ) -> AppResult<Vec<(String, tag::Model)>> {
        if prompt_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = PromptTag::find()
            .filter(prompt_tag::Column::PromptId.is_in(prompt_ids.iter().cloned()))
            .find_also_related(Tag)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(rows
            .into_iter()
            .filter_map(|(link, tag)| tag.map(|tag| (link.prompt_id, tag)))
            .collect())
    }

    /// Attach tags to a prompt and bump their counts. Existing links are kept.
    pub async fn attach(&self, prompt_id: &str, tag_ids: &[String]) -> AppResult<()> {
        if tag_ids.is_empty() {
            return Ok(());
        }

        let links = tag_ids.iter().map(|tag_id| prompt_tag::ActiveModel {
            prompt_id: Set(prompt_id.to_string()),
            tag_id: Set(tag_id.clone()),
        });

        PromptTag::insert_many(links)
            .on_conflict(
                OnConflict::columns([prompt_tag::Column::PromptId, prompt_tag::Column::TagId])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Tag::update_many()
            .col_expr(tag::Column::Count, Expr::col(tag::Column::Count).add(1))
            .filter(tag::Column::Id.is_in(tag_ids.iter().cloned()))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }

    /// Remove all tags from a prompt and decrement their counts.
    ///
    /// Returns the IDs of the tags that were detached.
    pub async fn detach_all(&self, prompt_id: &str) -> AppResult<Vec<String>> {
        let tag_ids: Vec<String> = PromptTag::find()
            .filter(prompt_tag::Column::PromptId.eq(prompt_id))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .into_iter()
            .map(|link| link.tag_id)
            .collect();

        if tag_ids.is_empty() {
            return Ok(tag_ids);
        }

        PromptTag::delete_many()
            .filter(prompt_tag::Column::PromptId.eq(prompt_id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Tag::update_many()
            .col_expr(tag::Column::Count, Expr::cust("GREATEST(count - 1, 0)"))
            .filter(tag::Column::Id.is_in(tag_ids.iter().cloned()))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(tag_ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn create_test_tag(id: &str, name: &str, count: i32) -> tag::Model {
        tag::Model {
            id: id.to_string(),
            name: name.to_lowercase(),
            display_name: name.to_string(),
            color: None,
            count,
            created_at: Utc::now().into(),
        }
    }

    fn exec_ok(rows_affected: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected,
        }
    }

    #[tokio::test]
    async fn test_find_popular() {
        let a = create_test_tag("t1", "rust", 12);
        let b = create_test_tag("t2", "gpt", 4);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[a, b]])
                .into_connection(),
        );

        let repo = TagRepository::new(db);
        let result = repo.find_popular(10).await.unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].name, "rust");
    }

    #[tokio::test]
    async fn test_search_by_prefix_escapes_wildcards() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<tag::Model>::new()])
                .into_connection(),
        );

        let repo = TagRepository::new(db.clone());
        let result = repo.search_by_prefix("50%_Off", 10).await.unwrap();
        assert!(result.is_empty());
        drop(repo);

        let log = Arc::try_unwrap(db).unwrap().into_transaction_log();
        let sql = format!("{log:?}");
        assert!(sql.contains("LIKE"));
        assert!(sql.contains("50\\\\%\\\\_off%"));
    }

    #[tokio::test]
    async fn test_create_lowercases_name() {
        let created = create_test_tag("t1", "Rust", 0);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[created]])
                .into_connection(),
        );

        let repo = TagRepository::new(db);
        let result = repo.create("t1".to_string(), "Rust").await.unwrap();

        assert_eq!(result.name, "rust");
        assert_eq!(result.display_name, "Rust");
    }

    #[tokio::test]
    async fn test_detach_all_without_tags() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<prompt_tag::Model>::new()])
                .into_connection(),
        );

        let repo = TagRepository::new(db);
        assert!(repo.detach_all("p1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_detach_all() {
        let links = vec![
            prompt_tag::Model {
                prompt_id: "p1".to_string(),
                tag_id: "t1".to_string(),
            },
            prompt_tag::Model {
                prompt_id: "p1".to_string(),
                tag_id: "t2".to_string(),
            },
        ];

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([links])
                .append_exec_results([exec_ok(2), exec_ok(2)])
                .into_connection(),
        );

        let repo = TagRepository::new(db);
        let detached = repo.detach_all("p1").await.unwrap();

        assert_eq!(detached, vec!["t1", "t2"]);
    }

    #[tokio::test]
    async fn test_attach() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([exec_ok(2), exec_ok(2)])
                .into_connection(),
        );

        let repo = TagRepository::new(db);
        let result = repo
            .attach("p1", &["t1".to_string(), "t2".to_string()])
            .await;

        assert!(result.is_ok());
    }
}
