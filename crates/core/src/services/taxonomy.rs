//! Category and tag service.

use chrono::Utc;
use prompthub_common::{AppError, AppResult, IdGenerator};
use prompthub_db::{
    entities::{category, tag},
    repositories::{CategoryRepository, TagRepository},
};
use sea_orm::Set;
use serde::Deserialize;
use validator::Validate;

/// Maximum tag name length in characters.
pub const MAX_TAG_LENGTH: usize = 32;

/// Input for creating a category.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCategoryInput {
    #[validate(length(min = 1, max = 64))]
    pub name: String,

    #[validate(length(min = 1, max = 128))]
    pub display_name: String,

    #[validate(length(max = 64))]
    pub icon: Option<String>,

    #[validate(length(max = 32))]
    pub color: Option<String>,

    #[serde(default)]
    pub sort_order: i32,
}

/// Input for updating a category.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateCategoryInput {
    #[validate(length(min = 1, max = 128))]
    pub display_name: Option<String>,

    /// `Some(None)` clears the icon.
    #[serde(default, deserialize_with = "crate::views::double_option")]
    pub icon: Option<Option<String>>,

    /// `Some(None)` clears the color.
    #[serde(default, deserialize_with = "crate::views::double_option")]
    pub color: Option<Option<String>>,

    pub sort_order: Option<i32>,
}

/// Category and tag service.
#[derive(Clone)]
pub struct TaxonomyService {
    category_repo: CategoryRepository,
    tag_repo: TagRepository,
    id_gen: IdGenerator,
}

impl TaxonomyService {
    /// Create a new taxonomy service.
    #[must_use]
    pub const fn new(category_repo: CategoryRepository, tag_repo: TagRepository) -> Self {
        Self {
            category_repo,
            tag_repo,
            id_gen: IdGenerator::new(),
        }
    }

    // ==================== Categories ====================

    /// All categories in display order.
    pub async fn list_categories(&self) -> AppResult<Vec<category::Model>> {
        self.category_repo.find_all().await
    }

    /// Create a category. Names are unique.
    pub async fn create_category(&self, input: CreateCategoryInput) -> AppResult<category::Model> {
        input.validate()?;

        let name = normalize_slug(&input.name)?;
        if self.category_repo.find_by_name(&name).await?.is_some() {
            return Err(AppError::Conflict(format!("Category already exists: {name}")));
        }

        let model = category::ActiveModel {
            id: Set(self.id_gen.generate()),
            name: Set(name),
            display_name: Set(input.display_name),
            icon: Set(input.icon),
            color: Set(input.color),
            count: Set(0),
            sort_order: Set(input.sort_order),
            created_at: Set(Utc::now().into()),
        };

        self.category_repo.create(model).await
    }

    /// Update a category's presentation fields.
    pub async fn update_category(
        &self,
        id: &str,
        input: UpdateCategoryInput,
    ) -> AppResult<category::Model> {
        input.validate()?;
        check_max_len("icon", input.icon.as_ref(), 64)?;
        check_max_len("color", input.color.as_ref(), 32)?;

        let existing = self
            .category_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Category not found: {id}")))?;

        let mut active: category::ActiveModel = existing.into();
        if let Some(display_name) = input.display_name {
            active.display_name = Set(display_name);
        }
        if let Some(icon) = input.icon {
            active.icon = Set(icon);
        }
        if let Some(color) = input.color {
            active.color = Set(color);
        }
        if let Some(sort_order) = input.sort_order {
            active.sort_order = Set(sort_order);
        }

        self.category_repo.update(active).await
    }

    /// Delete a category. Its prompts become uncategorized.
    pub async fn delete_category(&self, id: &str) -> AppResult<()> {
        if self.category_repo.find_by_id(id).await?.is_none() {
            return Err(AppError::NotFound(format!("Category not found: {id}")));
        }
        self.category_repo.delete(id).await
    }

    // ==================== Tags ====================

    /// Most used tags.
    pub async fn list_popular_tags(&self, limit: u64) -> AppResult<Vec<tag::Model>> {
        self.tag_repo.find_popular(limit).await
    }

    /// Tags starting with `prefix`.
    pub async fn search_tags(&self, prefix: &str, limit: u64) -> AppResult<Vec<tag::Model>> {
        let prefix = prefix.trim();
        if prefix.is_empty() {
            return self.list_popular_tags(limit).await;
        }
        self.tag_repo.search_by_prefix(prefix, limit).await
    }

    /// Find a tag by name, creating it if needed.
    pub async fn get_or_create_tag(&self, name: &str) -> AppResult<tag::Model> {
        get_or_create_tag(&self.tag_repo, &self.id_gen, name).await
    }
}

/// Find a tag by (case-insensitive) name, creating it if needed.
pub(crate) async fn get_or_create_tag(
    repo: &TagRepository,
    id_gen: &IdGenerator,
    name: &str,
) -> AppResult<tag::Model> {
    let name = validate_tag_name(name)?;
    if let Some(existing) = repo.find_by_name(&name).await? {
        return Ok(existing);
    }
    repo.create(id_gen.generate(), &name).await
}

/// Trim a tag name and check its length.
pub fn validate_tag_name(name: &str) -> AppResult<String> {
    let name = name.trim().trim_start_matches('#').trim();
    if name.is_empty() {
        return Err(AppError::Validation("tag: must not be empty".to_string()));
    }
    if name.chars().count() > MAX_TAG_LENGTH {
        return Err(AppError::Validation(format!(
            "tag: must be at most {MAX_TAG_LENGTH} characters"
        )));
    }
    Ok(name.to_string())
}

fn check_max_len(field: &str, value: Option<&Option<String>>, max: usize) -> AppResult<()> {
    match value {
        Some(Some(v)) if v.chars().count() > max => Err(AppError::Validation(format!(
            "{field}: must be at most {max} characters"
        ))),
        _ => Ok(()),
    }
}

/// Lower-case a category name and restrict it to URL-safe characters.
fn normalize_slug(name: &str) -> AppResult<String> {
    let slug = name.trim().to_lowercase();
    if slug.is_empty()
        || !slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(AppError::Validation(
            "name: only letters, digits, '-' and '_' are allowed".to_string(),
        ));
    }
    Ok(slug)
}
