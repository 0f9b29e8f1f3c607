//! Prompt service.

use std::collections::{HashMap, HashSet};

use prompthub_common::{AppError, AppResult, IdGenerator, QueryFingerprint};
use prompthub_db::{
    entities::{prompt, prompt::PromptStatus, user},
    repositories::{
        CategoryRepository, NewPrompt, ProfileRepository, PromptChanges, PromptFilter,
        PromptRepository, PromptSort, TagRepository,
    },
};
use serde::Deserialize;
use validator::Validate;

use super::taxonomy::get_or_create_tag;
use crate::views::{Pagination, PromptPage, PromptRelations, PromptView, double_option};

/// Language used when a prompt does not name one.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Query string accepted by the prompt listing endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PromptQuery {
    pub q: Option<String>,
    pub category: Option<String>,
    pub tag: Option<String>,
    pub language: Option<String>,
    pub sort: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub exclude: Option<String>,
}

impl PromptQuery {
    /// Cache fingerprint over every recognized parameter.
    ///
    /// Page and limit are fingerprinted after clamping so that equivalent
    /// requests share a key.
    #[must_use]
    pub fn fingerprint(&self, namespace: &str) -> QueryFingerprint {
        let pagination = self.pagination();
        QueryFingerprint::new(namespace)
            .param("q", self.q.as_deref().map(str::to_lowercase))
            .param("category", self.category.as_deref())
            .param("tag", self.tag.as_deref().map(str::to_lowercase))
            .param("language", self.language.as_deref())
            .param("sort", Some(self.sort().as_str()))
            .param("page", Some(pagination.page))
            .param("limit", Some(pagination.limit))
            .param("exclude", self.exclude.as_deref())
    }

    #[must_use]
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page, self.limit)
    }

    fn sort(&self) -> PromptSort {
        PromptSort::parse(self.sort.as_deref())
    }

    /// Trimmed free-text query, if any.
    fn text(&self) -> Option<String> {
        non_empty(self.q.as_deref())
    }

    fn public_filter(&self) -> PromptFilter {
        PromptFilter {
            query: self.text(),
            category: non_empty(self.category.as_deref()),
            tag: non_empty(self.tag.as_deref()),
            language: non_empty(self.language.as_deref()),
            exclude_id: non_empty(self.exclude.as_deref()),
            sort: self.sort(),
            ..PromptFilter::public()
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

const fn default_true() -> bool {
    true
}

/// Input for creating a prompt.
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePromptInput {
    #[validate(length(min = 1, max = 200))]
    pub title: String,

    #[validate(length(max = 1000))]
    pub description: Option<String>,

    #[validate(length(min = 1, max = 20000))]
    pub content: String,

    #[serde(default = "default_true")]
    pub is_public: bool,

    /// Image URLs returned by the upload endpoint.
    #[serde(default)]
    #[validate(length(max = 9))]
    pub images: Vec<String>,

    pub category_id: Option<String>,

    /// Tag names; unknown tags are created.
    #[serde(default)]
    #[validate(length(max = 10))]
    pub tags: Vec<String>,

    #[validate(length(min = 2, max = 16))]
    pub language: Option<String>,
}

/// Input for updating a prompt. Missing fields are left untouched.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdatePromptInput {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,

    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,

    #[validate(length(min = 1, max = 20000))]
    pub content: Option<String>,

    pub is_public: Option<bool>,

    #[validate(length(max = 9))]
    pub images: Option<Vec<String>>,

    /// `Some(None)` removes the category.
    #[serde(default, deserialize_with = "double_option")]
    pub category_id: Option<Option<String>>,

    /// Replaces the full tag set when present.
    #[validate(length(max = 10))]
    pub tags: Option<Vec<String>>,

    #[validate(length(min = 2, max = 16))]
    pub language: Option<String>,
}

/// Prompt service for business logic.
#[derive(Clone)]
pub struct PromptService {
    prompt_repo: PromptRepository,
    tag_repo: TagRepository,
    category_repo: CategoryRepository,
    profile_repo: ProfileRepository,
    id_gen: IdGenerator,
}

impl PromptService {
    /// Create a new prompt service.
    #[must_use]
    pub const fn new(
        prompt_repo: PromptRepository,
        tag_repo: TagRepository,
        category_repo: CategoryRepository,
        profile_repo: ProfileRepository,
    ) -> Self {
        Self {
            prompt_repo,
            tag_repo,
            category_repo,
            profile_repo,
            id_gen: IdGenerator::new(),
        }
    }

    // ==================== Reads ====================

    /// Published public prompts matching `query`.
    pub async fn list_public(&self, query: &PromptQuery) -> AppResult<PromptPage> {
        self.page(&query.public_filter(), query.pagination()).await
    }

    /// Free-text search over published public prompts. `q` is required.
    pub async fn search(&self, query: &PromptQuery) -> AppResult<PromptPage> {
        if query.text().is_none() {
            return Err(AppError::BadRequest("Missing search query `q`".to_string()));
        }
        self.list_public(query).await
    }

    /// All prompts of one author, any status.
    pub async fn list_by_author(
        &self,
        author_id: &str,
        pagination: Pagination,
    ) -> AppResult<PromptPage> {
        let filter = PromptFilter {
            author_id: Some(author_id.to_string()),
            ..PromptFilter::default()
        };
        self.page(&filter, pagination).await
    }

    /// Prompts in a moderation state, regardless of visibility.
    pub async fn list_by_status(
        &self,
        status: Option<PromptStatus>,
        pagination: Pagination,
    ) -> AppResult<PromptPage> {
        let filter = PromptFilter {
            status,
            ..PromptFilter::default()
        };
        self.page(&filter, pagination).await
    }

    async fn page(&self, filter: &PromptFilter, pagination: Pagination) -> AppResult<PromptPage> {
        let total = self.prompt_repo.count(filter).await?;
        let models = if total == 0 {
            Vec::new()
        } else {
            self.prompt_repo
                .list(filter, pagination.limit, pagination.offset())
                .await?
        };
        let items = self.hydrate(models).await?;
        Ok(PromptPage::new(items, total, pagination))
    }

    /// A prompt by ID without visibility checks.
    pub async fn get(&self, id: &str) -> AppResult<PromptView> {
        let model = self.prompt_repo.get_by_id(id).await?;
        self.hydrate_one(model).await
    }

    /// A prompt by ID as seen by `viewer`.
    pub async fn get_visible(
        &self,
        id: &str,
        viewer: Option<&user::Model>,
    ) -> AppResult<PromptView> {
        let view = self.get(id).await?;
        ensure_visible(&view, viewer)?;
        Ok(view)
    }

    /// Render rows with their category, tags and author.
    pub async fn hydrate(&self, models: Vec<prompt::Model>) -> AppResult<Vec<PromptView>> {
        if models.is_empty() {
            return Ok(Vec::new());
        }

        let prompt_ids: Vec<String> = models.iter().map(|m| m.id.clone()).collect();
        let category_ids = unique(models.iter().filter_map(|m| m.category_id.clone()));
        let author_ids = unique(models.iter().map(|m| m.author_id.clone()));

        let mut relations = PromptRelations::default();
        for category in self.category_repo.find_by_ids(&category_ids).await? {
            relations.categories.insert(category.id.clone(), category);
        }
        for (prompt_id, tag) in self.tag_repo.find_for_prompts(&prompt_ids).await? {
            relations.tags.entry(prompt_id).or_default().push(tag);
        }
        for profile in self.profile_repo.find_by_ids(&author_ids).await? {
            relations.authors.insert(profile.id.clone(), profile);
        }

        Ok(models
            .into_iter()
            .map(|model| PromptView::from_model(model, &relations))
            .collect())
    }

    /// Render rows by ID, keeping the order of `ids` and skipping missing rows.
    pub async fn hydrate_ids(&self, ids: &[String]) -> AppResult<Vec<PromptView>> {
        let mut by_id: HashMap<String, prompt::Model> = self
            .prompt_repo
            .find_by_ids(ids)
            .await?
            .into_iter()
            .map(|m| (m.id.clone(), m))
            .collect();
        let ordered = ids.iter().filter_map(|id| by_id.remove(id)).collect();
        self.hydrate(ordered).await
    }

    async fn hydrate_one(&self, model: prompt::Model) -> AppResult<PromptView> {
        let id = model.id.clone();
        self.hydrate(vec![model])
            .await?
            .pop()
            .ok_or(AppError::PromptNotFound(id))
    }

    // ==================== Writes ====================

    /// Create a prompt in `reviewing` state.
    pub async fn create(
        &self,
        author: &user::Model,
        input: CreatePromptInput,
    ) -> AppResult<PromptView> {
        input.validate()?;
        let title = required_text("title", &input.title)?;
        let content = required_text("content", &input.content)?;

        if let Some(category_id) = &input.category_id {
            self.ensure_category(category_id).await?;
        }
        let tag_ids = self.resolve_tags(&input.tags).await?;

        let model = self
            .prompt_repo
            .create(NewPrompt {
                id: self.id_gen.generate(),
                title,
                description: input.description,
                content,
                is_public: input.is_public,
                images: input.images,
                category_id: input.category_id.clone(),
                author_id: author.id.clone(),
                language: input
                    .language
                    .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
            })
            .await?;

        self.tag_repo.attach(&model.id, &tag_ids).await?;
        if let Some(category_id) = &input.category_id {
            self.category_repo.increment_count(category_id).await?;
        }

        tracing::info!(prompt_id = %model.id, author_id = %author.id, "Prompt created");
        self.hydrate_one(model).await
    }

    /// Update a prompt. Only the author or an admin may edit.
    ///
    /// Edits by the author send the prompt back to review.
    pub async fn update(
        &self,
        id: &str,
        actor: &user::Model,
        input: UpdatePromptInput,
    ) -> AppResult<PromptView> {
        input.validate()?;

        let existing = self.prompt_repo.get_by_id(id).await?;
        ensure_can_edit(&existing, actor)?;

        let title = input
            .title
            .as_deref()
            .map(|t| required_text("title", t))
            .transpose()?;
        let content = input
            .content
            .as_deref()
            .map(|c| required_text("content", c))
            .transpose()?;

        if let Some(Some(category_id)) = &input.category_id {
            self.ensure_category(category_id).await?;
        }
        let tag_ids = match &input.tags {
            Some(tags) => Some(self.resolve_tags(tags).await?),
            None => None,
        };

        let old_category = existing.category_id.clone();
        let status = if actor.role.is_admin() {
            None
        } else {
            Some(PromptStatus::Reviewing)
        };

        let updated = self
            .prompt_repo
            .update(
                existing,
                PromptChanges {
                    title,
                    description: input.description,
                    content,
                    is_public: input.is_public,
                    images: input.images,
                    category_id: input.category_id.clone(),
                    language: input.language,
                    status,
                },
            )
            .await?;

        if let Some(new_category) = input.category_id {
            if new_category != old_category {
                if let Some(old) = &old_category {
                    self.category_repo.decrement_count(old).await?;
                }
                if let Some(new) = &new_category {
                    self.category_repo.increment_count(new).await?;
                }
            }
        }

        if let Some(tag_ids) = tag_ids {
            self.tag_repo.detach_all(&updated.id).await?;
            self.tag_repo.attach(&updated.id, &tag_ids).await?;
        }

        tracing::info!(prompt_id = %updated.id, actor_id = %actor.id, "Prompt updated");
        self.hydrate_one(updated).await
    }

    /// Delete a prompt. Only the author or an admin may delete.
    pub async fn delete(&self, id: &str, actor: &user::Model) -> AppResult<()> {
        let existing = self.prompt_repo.get_by_id(id).await?;
        ensure_can_edit(&existing, actor)?;

        self.tag_repo.detach_all(&existing.id).await?;
        if let Some(category_id) = &existing.category_id {
            self.category_repo.decrement_count(category_id).await?;
        }
        self.prompt_repo.delete(&existing.id).await?;

        tracing::info!(prompt_id = %existing.id, actor_id = %actor.id, "Prompt deleted");
        Ok(())
    }

    /// Count a view of a prompt.
    pub async fn record_view(&self, id: &str) -> AppResult<()> {
        let existing = self.prompt_repo.get_by_id(id).await?;
        self.prompt_repo.increment_view_count(&existing.id).await
    }

    async fn ensure_category(&self, category_id: &str) -> AppResult<()> {
        if self.category_repo.find_by_id(category_id).await?.is_none() {
            return Err(AppError::BadRequest(format!(
                "Unknown category: {category_id}"
            )));
        }
        Ok(())
    }

    /// Resolve tag names to IDs, creating missing tags. Duplicates collapse.
    async fn resolve_tags(&self, names: &[String]) -> AppResult<Vec<String>> {
        let mut seen = HashSet::new();
        let mut ids = Vec::new();
        for name in names {
            let tag = get_or_create_tag(&self.tag_repo, &self.id_gen, name).await?;
            if seen.insert(tag.id.clone()) {
                ids.push(tag.id);
            }
        }
        Ok(ids)
    }
}

/// Hide prompts that are not public and published from everyone but the
/// author and admins. Hidden prompts look missing.
pub fn ensure_visible(view: &PromptView, viewer: Option<&user::Model>) -> AppResult<()> {
    if view.status == PromptStatus::Published && view.is_public {
        return Ok(());
    }
    match viewer {
        Some(user) if user.role.is_admin() || user.id == view.author_id => Ok(()),
        _ => Err(AppError::PromptNotFound(view.id.clone())),
    }
}

fn ensure_can_edit(model: &prompt::Model, actor: &user::Model) -> AppResult<()> {
    if model.author_id == actor.id || actor.role.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Only the author or an admin can modify this prompt".to_string(),
        ))
    }
}

fn required_text(field: &str, value: &str) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation(format!("{field}: must not be blank")));
    }
    Ok(value.to_string())
}

fn unique(values: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    values.filter(|v| seen.insert(v.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use maplit::btreemap;
    use prompthub_db::entities::{profile, tag, user::Role};
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, Value};
    use serde_json::json;
    use std::sync::Arc;

    fn test_user(id: &str, role: Role) -> user::Model {
        user::Model {
            id: id.to_string(),
            email: format!("{id}@example.com"),
            password_hash: String::new(),
            token: None,
            role,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    fn test_prompt(id: &str, author_id: &str, status: PromptStatus) -> prompt::Model {
        prompt::Model {
            id: id.to_string(),
            title: "Translator".to_string(),
            description: None,
            content: "Translate the following text.".to_string(),
            status,
            is_public: true,
            view_count: 0,
            favorite_count: 0,
            images: json!([]),
            category_id: None,
            author_id: author_id.to_string(),
            language: "en".to_string(),
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    fn empty_db() -> DatabaseConnection {
        MockDatabase::new(DatabaseBackend::Postgres).into_connection()
    }

    struct Dbs {
        prompt: DatabaseConnection,
        tag: DatabaseConnection,
        category: DatabaseConnection,
        profile: DatabaseConnection,
    }

    impl Default for Dbs {
        fn default() -> Self {
            Self {
                prompt: empty_db(),
                tag: empty_db(),
                category: empty_db(),
                profile: empty_db(),
            }
        }
    }

    fn service(dbs: Dbs) -> PromptService {
        PromptService::new(
            PromptRepository::new(Arc::new(dbs.prompt)),
            TagRepository::new(Arc::new(dbs.tag)),
            CategoryRepository::new(Arc::new(dbs.category)),
            ProfileRepository::new(Arc::new(dbs.profile)),
        )
    }

    fn create_input() -> CreatePromptInput {
        CreatePromptInput {
            title: "  Translator ".to_string(),
            description: None,
            content: "Translate the following text.".to_string(),
            is_public: true,
            images: vec![],
            category_id: None,
            tags: vec![],
            language: None,
        }
    }

    #[test]
    fn test_fingerprint_normalizes_params() {
        let a = PromptQuery {
            q: Some("Rust ".to_string()),
            page: Some(0),
            ..PromptQuery::default()
        };
        let b = PromptQuery {
            q: Some("rust".to_string()),
            sort: Some("latest".to_string()),
            page: Some(1),
            limit: Some(20),
            ..PromptQuery::default()
        };
        assert_eq!(
            a.fingerprint("prompts:list").cache_key(),
            b.fingerprint("prompts:list").cache_key()
        );
        assert_ne!(
            a.fingerprint("prompts:list").cache_key(),
            a.fingerprint("prompts:search").cache_key()
        );
    }

    #[test]
    fn test_public_filter_drops_blank_values() {
        let query = PromptQuery {
            category: Some("  ".to_string()),
            tag: Some("rust".to_string()),
            ..PromptQuery::default()
        };
        let filter = query.public_filter();
        assert!(filter.category.is_none());
        assert_eq!(filter.tag.as_deref(), Some("rust"));
        assert_eq!(filter.status, Some(PromptStatus::Published));
        assert!(filter.public_only);
    }

    #[test]
    fn test_ensure_visible() {
        let owner = test_user("u1", Role::User);
        let admin = test_user("a1", Role::Admin);
        let other = test_user("u2", Role::User);
        let hidden = PromptView::from_model(
            test_prompt("p1", "u1", PromptStatus::Reviewing),
            &PromptRelations::default(),
        );

        assert!(matches!(
            ensure_visible(&hidden, None),
            Err(AppError::PromptNotFound(_))
        ));
        assert!(ensure_visible(&hidden, Some(&other)).is_err());
        assert!(ensure_visible(&hidden, Some(&owner)).is_ok());
        assert!(ensure_visible(&hidden, Some(&admin)).is_ok());

        let published = PromptView::from_model(
            test_prompt("p2", "u1", PromptStatus::Published),
            &PromptRelations::default(),
        );
        assert!(ensure_visible(&published, None).is_ok());
    }

    #[tokio::test]
    async fn test_search_requires_query() {
        let service = service(Dbs::default());
        let result = service
            .search(&PromptQuery {
                q: Some("   ".to_string()),
                ..PromptQuery::default()
            })
            .await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_list_public_empty_skips_listing() {
        let prompt_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[btreemap! {
                "num_items" => Into::<Value>::into(0i64),
            }]])
            .into_connection();

        let service = service(Dbs {
            prompt: prompt_db,
            ..Dbs::default()
        });
        let page = service.list_public(&PromptQuery::default()).await.unwrap();

        assert_eq!(page.total, 0);
        assert!(page.items.is_empty());
        assert!(!page.has_more);
    }

    #[tokio::test]
    async fn test_get_attaches_tags_and_author() {
        let prompt_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[test_prompt("p1", "u1", PromptStatus::Published)]])
            .into_connection();
        let tag_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[(
                prompthub_db::entities::prompt_tag::Model {
                    prompt_id: "p1".to_string(),
                    tag_id: "t1".to_string(),
                },
                tag::Model {
                    id: "t1".to_string(),
                    name: "translation".to_string(),
                    display_name: "Translation".to_string(),
                    color: None,
                    count: 1,
                    created_at: Utc::now().into(),
                },
            )]])
            .into_connection();
        let profile_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[profile::Model {
                id: "u1".to_string(),
                username: "alice".to_string(),
                nickname: None,
                avatar_url: None,
                bio: None,
                created_at: Utc::now().into(),
                updated_at: None,
            }]])
            .into_connection();

        let service = service(Dbs {
            prompt: prompt_db,
            tag: tag_db,
            profile: profile_db,
            ..Dbs::default()
        });
        let view = service.get("p1").await.unwrap();

        assert_eq!(view.tags.len(), 1);
        assert_eq!(view.tags[0].name, "translation");
        assert_eq!(view.author.unwrap().username, "alice");
    }

    #[tokio::test]
    async fn test_get_visible_hides_unpublished() {
        let prompt_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[test_prompt("p1", "u1", PromptStatus::Reviewing)]])
            .into_connection();
        let tag_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<tag::Model>::new()])
            .into_connection();
        let profile_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<profile::Model>::new()])
            .into_connection();

        let service = service(Dbs {
            prompt: prompt_db,
            tag: tag_db,
            profile: profile_db,
            ..Dbs::default()
        });
        let result = service.get_visible("p1", None).await;

        assert!(matches!(result, Err(AppError::PromptNotFound(_))));
    }

    #[tokio::test]
    async fn test_create_starts_in_review() {
        let author = test_user("u1", Role::User);
        let prompt_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[test_prompt("p1", "u1", PromptStatus::Reviewing)]])
            .into_connection();
        let tag_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<tag::Model>::new()])
            .into_connection();
        let profile_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<profile::Model>::new()])
            .into_connection();

        let service = service(Dbs {
            prompt: prompt_db,
            tag: tag_db,
            profile: profile_db,
            ..Dbs::default()
        });
        let view = service.create(&author, create_input()).await.unwrap();

        assert_eq!(view.status, PromptStatus::Reviewing);
        assert_eq!(view.author_id, "u1");
    }

    #[tokio::test]
    async fn test_create_rejects_blank_title() {
        let author = test_user("u1", Role::User);
        let service = service(Dbs::default());
        let result = service
            .create(
                &author,
                CreatePromptInput {
                    title: "   ".to_string(),
                    ..create_input()
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_create_rejects_too_many_tags() {
        let author = test_user("u1", Role::User);
        let service = service(Dbs::default());
        let result = service
            .create(
                &author,
                CreatePromptInput {
                    tags: (0..11).map(|i| format!("tag{i}")).collect(),
                    ..create_input()
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_update_by_stranger_is_forbidden() {
        let stranger = test_user("u2", Role::User);
        let prompt_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[test_prompt("p1", "u1", PromptStatus::Published)]])
            .into_connection();

        let service = service(Dbs {
            prompt: prompt_db,
            ..Dbs::default()
        });
        let result = service
            .update("p1", &stranger, UpdatePromptInput::default())
            .await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_delete_by_stranger_is_forbidden() {
        let stranger = test_user("u2", Role::User);
        let prompt_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[test_prompt("p1", "u1", PromptStatus::Published)]])
            .into_connection();

        let service = service(Dbs {
            prompt: prompt_db,
            ..Dbs::default()
        });

        assert!(matches!(
            service.delete("p1", &stranger).await,
            Err(AppError::Forbidden(_))
        ));
    }
}
