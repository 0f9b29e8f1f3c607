//! Prompt repository.

use std::sync::Arc;

use chrono::Utc;
use prompthub_common::{AppError, AppResult};
use sea_orm::sea_query::{Expr, Func, Query};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, FromQueryResult,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select, Set,
};

use super::escape_like;
use crate::entities::prompt::PromptStatus;
use crate::entities::{Category, Prompt, PromptTag, Tag, category, prompt, prompt_tag, tag};

/// Ordering for prompt listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PromptSort {
    /// Newest first.
    #[default]
    Latest,
    /// Most favorited, then most viewed.
    Popular,
    /// Most viewed.
    Views,
    /// Most favorited.
    Favorites,
}

impl PromptSort {
    /// Parse a `sort` query value. Unknown values fall back to [`PromptSort::Latest`].
    #[must_use]
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("popular") => Self::Popular,
            Some("views") => Self::Views,
            Some("favorites") => Self::Favorites,
            _ => Self::Latest,
        }
    }

    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Latest => "latest",
            Self::Popular => "popular",
            Self::Views => "views",
            Self::Favorites => "favorites",
        }
    }
}

/// Filter for prompt listings.
#[derive(Debug, Clone, Default)]
pub struct PromptFilter {
    /// Case-insensitive substring over title, description and content.
    pub query: Option<String>,
    /// Category name.
    pub category: Option<String>,
    /// Tag name.
    pub tag: Option<String>,
    pub language: Option<String>,
    pub status: Option<PromptStatus>,
    /// Only `is_public` rows.
    pub public_only: bool,
    pub author_id: Option<String>,
    /// Prompt to leave out (e.g. the one currently displayed).
    pub exclude_id: Option<String>,
    pub sort: PromptSort,
}

impl PromptFilter {
    /// Filter matching what anonymous visitors may see.
    #[must_use]
    pub fn public() -> Self {
        Self {
            status: Some(PromptStatus::Published),
            public_only: true,
            ..Self::default()
        }
    }

    fn apply(&self, mut query: Select<Prompt>) -> Select<Prompt> {
        if let Some(status) = self.status {
            query = query.filter(prompt::Column::Status.eq(status));
        }
        if self.public_only {
            query = query.filter(prompt::Column::IsPublic.eq(true));
        }
        if let Some(author_id) = &self.author_id {
            query = query.filter(prompt::Column::AuthorId.eq(author_id.as_str()));
        }
        if let Some(exclude_id) = &self.exclude_id {
            query = query.filter(prompt::Column::Id.ne(exclude_id.as_str()));
        }
        if let Some(language) = &self.language {
            query = query.filter(prompt::Column::Language.eq(language.as_str()));
        }
        if let Some(name) = &self.category {
            query = query.filter(
                prompt::Column::CategoryId.in_subquery(
                    Query::select()
                        .column(category::Column::Id)
                        .from(Category)
                        .and_where(category::Column::Name.eq(name.as_str()))
                        .to_owned(),
                ),
            );
        }
        if let Some(name) = &self.tag {
            query = query.filter(
                prompt::Column::Id.in_subquery(
                    Query::select()
                        .column((PromptTag, prompt_tag::Column::PromptId))
                        .from(PromptTag)
                        .inner_join(
                            Tag,
                            Expr::col((Tag, tag::Column::Id))
                                .equals((PromptTag, prompt_tag::Column::TagId)),
                        )
                        .and_where(tag::Column::Name.eq(name.to_lowercase()))
                        .to_owned(),
                ),
            );
        }
        if let Some(text) = &self.query {
            let pattern = format!("%{}%", escape_like(&text.to_lowercase()));
            let lower = |column: prompt::Column| {
                Expr::expr(Func::lower(Expr::col((Prompt, column)))).like(pattern.clone())
            };
            query = query.filter(
                Condition::any()
                    .add(lower(prompt::Column::Title))
                    .add(lower(prompt::Column::Description))
                    .add(lower(prompt::Column::Content)),
            );
        }
        query
    }

    fn order(&self, query: Select<Prompt>) -> Select<Prompt> {
        let query = match self.sort {
            PromptSort::Latest => query,
            PromptSort::Popular => query
                .order_by_desc(prompt::Column::FavoriteCount)
                .order_by_desc(prompt::Column::ViewCount),
            PromptSort::Views => query.order_by_desc(prompt::Column::ViewCount),
            PromptSort::Favorites => query.order_by_desc(prompt::Column::FavoriteCount),
        };
        query
            .order_by_desc(prompt::Column::CreatedAt)
            .order_by_desc(prompt::Column::Id)
    }
}

/// View and favorite totals across an author's prompts.
#[derive(Debug, Clone, Default, PartialEq, Eq, FromQueryResult)]
pub struct AuthorTotals {
    pub total_views: i64,
    pub total_favorites: i64,
}

/// Sitemap entry for a published public prompt.
#[derive(Debug, Clone, PartialEq, Eq, FromQueryResult)]
pub struct PromptSitemapRow {
    pub id: String,
    pub created_at: sea_orm::prelude::DateTimeWithTimeZone,
    pub updated_at: Option<sea_orm::prelude::DateTimeWithTimeZone>,
}

/// Fields accepted when creating a prompt.
#[derive(Debug, Clone)]
pub struct NewPrompt {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub content: String,
    pub is_public: bool,
    pub images: Vec<String>,
    pub category_id: Option<String>,
    pub author_id: String,
    pub language: String,
}

/// Partial update of a prompt. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct PromptChanges {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub content: Option<String>,
    pub is_public: Option<bool>,
    pub images: Option<Vec<String>>,
    pub category_id: Option<Option<String>>,
    pub language: Option<String>,
    pub status: Option<PromptStatus>,
}

/// Prompt repository for database operations.
#[derive(Clone)]
pub struct PromptRepository {
    db: Arc<DatabaseConnection>,
}

impl PromptRepository {
    /// Create a new prompt repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a prompt by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<prompt::Model>> {
        Prompt::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a prompt by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<prompt::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::PromptNotFound(id.to_string()))
    }

    /// Find prompts by IDs (unordered).
    pub async fn find_by_ids(&self, ids: &[String]) -> AppResult<Vec<prompt::Model>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        Prompt::find()
            .filter(prompt::Column::Id.is_in(ids.iter().cloned()))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List prompts matching `filter`.
    pub async fn list(
        &self,
        filter: &PromptFilter,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<prompt::Model>> {
        filter
            .order(filter.apply(Prompt::find()))
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count prompts matching `filter`.
    pub async fn count(&self, filter: &PromptFilter) -> AppResult<u64> {
        filter
            .apply(Prompt::find())
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert a new prompt in `reviewing` state.
    pub async fn create(&self, input: NewPrompt) -> AppResult<prompt::Model> {
        let model = prompt::ActiveModel {
            id: Set(input.id),
            title: Set(input.title),
            description: Set(input.description),
            content: Set(input.content),
            status: Set(PromptStatus::Reviewing),
            is_public: Set(input.is_public),
            view_count: Set(0),
            favorite_count: Set(0),
            images: Set(crate::encode_images(&input.images)),
            category_id: Set(input.category_id),
            author_id: Set(input.author_id),
            language: Set(input.language),
            created_at: Set(Utc::now().into()),
            updated_at: Set(None),
        };

        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Apply `changes` to an existing prompt.
    pub async fn update(
        &self,
        existing: prompt::Model,
        changes: PromptChanges,
    ) -> AppResult<prompt::Model> {
        let mut active: prompt::ActiveModel = existing.into();

        if let Some(title) = changes.title {
            active.title = Set(title);
        }
        if let Some(description) = changes.description {
            active.description = Set(description);
        }
        if let Some(content) = changes.content {
            active.content = Set(content);
        }
        if let Some(is_public) = changes.is_public {
            active.is_public = Set(is_public);
        }
        if let Some(images) = changes.images {
            active.images = Set(crate::encode_images(&images));
        }
        if let Some(category_id) = changes.category_id {
            active.category_id = Set(category_id);
        }
        if let Some(language) = changes.language {
            active.language = Set(language);
        }
        if let Some(status) = changes.status {
            active.status = Set(status);
        }
        active.updated_at = Set(Some(Utc::now().into()));

        active
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Set the moderation status.
    pub async fn set_status(&self, id: &str, status: PromptStatus) -> AppResult<()> {
        Prompt::update_many()
            .col_expr(prompt::Column::Status, Expr::value(status.as_str()))
            .col_expr(prompt::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(prompt::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Delete a prompt. Tags, favorites and reviews cascade.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        Prompt::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Increment view count.
    pub async fn increment_view_count(&self, id: &str) -> AppResult<()> {
        Prompt::update_many()
            .col_expr(
                prompt::Column::ViewCount,
                Expr::col(prompt::Column::ViewCount).add(1),
            )
            .filter(prompt::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Increment favorite count.
    pub async fn increment_favorite_count(&self, id: &str) -> AppResult<()> {
        Prompt::update_many()
            .col_expr(
                prompt::Column::FavoriteCount,
                Expr::col(prompt::Column::FavoriteCount).add(1),
            )
            .filter(prompt::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Decrement favorite count, never below zero.
    pub async fn decrement_favorite_count(&self, id: &str) -> AppResult<()> {
        Prompt::update_many()
            .col_expr(
                prompt::Column::FavoriteCount,
                Expr::cust("GREATEST(favorite_count - 1, 0)"),
            )
            .filter(prompt::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Sum of views and favorites over an author's prompts.
    pub async fn totals_by_author(&self, author_id: &str) -> AppResult<AuthorTotals> {
        let totals = Prompt::find()
            .select_only()
            .column_as(Expr::cust("COALESCE(SUM(view_count), 0)::bigint"), "total_views")
            .column_as(
                Expr::cust("COALESCE(SUM(favorite_count), 0)::bigint"),
                "total_favorites",
            )
            .filter(prompt::Column::AuthorId.eq(author_id))
            .into_model::<AuthorTotals>()
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(totals.unwrap_or_default())
    }

    /// Published public prompts for the sitemap, most recently touched first.
    pub async fn find_sitemap_rows(&self, limit: u64) -> AppResult<Vec<PromptSitemapRow>> {
        Prompt::find()
            .select_only()
            .column(prompt::Column::Id)
            .column(prompt::Column::CreatedAt)
            .column(prompt::Column::UpdatedAt)
            .filter(prompt::Column::Status.eq(PromptStatus::Published))
            .filter(prompt::Column::IsPublic.eq(true))
            .order_by_desc(prompt::Column::CreatedAt)
            .limit(limit)
            .into_model::<PromptSitemapRow>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::btreemap;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Value};
    use serde_json::json;

    fn create_test_prompt(id: &str, author_id: &str) -> prompt::Model {
        prompt::Model {
            id: id.to_string(),
            title: format!("Prompt {id}"),
            description: Some("A test prompt".to_string()),
            content: "You are a helpful assistant.".to_string(),
            status: PromptStatus::Published,
            is_public: true,
            view_count: 10,
            favorite_count: 2,
            images: json!(["https://cdn.test/a.jpg"]),
            category_id: Some("cat1".to_string()),
            author_id: author_id.to_string(),
            language: "en".to_string(),
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    #[test]
    fn test_sort_parse() {
        assert_eq!(PromptSort::parse(Some("popular")), PromptSort::Popular);
        assert_eq!(PromptSort::parse(Some("views")), PromptSort::Views);
        assert_eq!(PromptSort::parse(Some("favorites")), PromptSort::Favorites);
        assert_eq!(PromptSort::parse(Some("random")), PromptSort::Latest);
        assert_eq!(PromptSort::parse(None), PromptSort::Latest);
    }

    #[tokio::test]
    async fn test_find_by_id() {
        let p = create_test_prompt("p1", "user1");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[p.clone()]])
                .into_connection(),
        );

        let repo = PromptRepository::new(db);
        let result = repo.find_by_id("p1").await.unwrap();

        assert_eq!(result.unwrap().id, "p1");
    }

    #[tokio::test]
    async fn test_get_by_id_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<prompt::Model>::new()])
                .into_connection(),
        );

        let repo = PromptRepository::new(db);
        let result = repo.get_by_id("missing").await;

        assert!(matches!(result, Err(AppError::PromptNotFound(_))));
    }

    #[tokio::test]
    async fn test_list_with_filters() {
        let p1 = create_test_prompt("p1", "user1");
        let p2 = create_test_prompt("p2", "user2");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[p1, p2]])
                .into_connection(),
        );

        let repo = PromptRepository::new(db.clone());
        let filter = PromptFilter {
            query: Some("Assistant".to_string()),
            category: Some("coding".to_string()),
            tag: Some("Rust".to_string()),
            sort: PromptSort::Popular,
            ..PromptFilter::public()
        };
        let result = repo.list(&filter, 20, 0).await.unwrap();
        assert_eq!(result.len(), 2);
        drop(repo);

        let log = Arc::try_unwrap(db).unwrap().into_transaction_log();
        let sql = format!("{log:?}");
        assert!(sql.contains("LOWER"));
        assert!(sql.contains("\\\"categories\\\""));
        assert!(sql.contains("\\\"prompt_tags\\\""));
        assert!(sql.contains("rust"));
        assert!(sql.contains("%assistant%"));
    }

    #[tokio::test]
    async fn test_count() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[btreemap! {
                    "num_items" => Into::<Value>::into(7i64),
                }]])
                .into_connection(),
        );

        let repo = PromptRepository::new(db);
        assert_eq!(repo.count(&PromptFilter::public()).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_decrement_favorite_count_is_clamped_in_sql() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );

        let repo = PromptRepository::new(db.clone());
        repo.decrement_favorite_count("p1").await.unwrap();
        drop(repo);

        let log = Arc::try_unwrap(db).unwrap().into_transaction_log();
        assert!(format!("{log:?}").contains("GREATEST(favorite_count - 1, 0)"));
    }

    #[tokio::test]
    async fn test_totals_by_author() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[btreemap! {
                    "total_views" => Into::<Value>::into(120i64),
                    "total_favorites" => Into::<Value>::into(9i64),
                }]])
                .into_connection(),
        );

        let repo = PromptRepository::new(db);
        let totals = repo.totals_by_author("user1").await.unwrap();

        assert_eq!(
            totals,
            AuthorTotals {
                total_views: 120,
                total_favorites: 9
            }
        );
    }

    #[tokio::test]
    async fn test_find_by_ids_empty_skips_query() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let repo = PromptRepository::new(db);
        assert!(repo.find_by_ids(&[]).await.unwrap().is_empty());
    }
}
