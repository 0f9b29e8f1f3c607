//! API view types and the row-to-view transformers.
//!
//! Views are what handlers return and what the read-through cache stores, so
//! every view round-trips through JSON.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset};
use prompthub_db::decode_images;
use prompthub_db::entities::prompt::PromptStatus;
use prompthub_db::entities::user::Role;
use prompthub_db::entities::{category, profile, prompt, tag, user};
use serde::{Deserialize, Deserializer, Serialize};

/// Deserialize a field so that `null` becomes `Some(None)` and a missing
/// field (with `#[serde(default)]`) stays `None`.
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Category reference embedded in a prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub id: String,
    pub name: String,
    pub display_name: String,
    pub icon: Option<String>,
    pub color: Option<String>,
}

impl From<&category::Model> for CategorySummary {
    fn from(model: &category::Model) -> Self {
        Self {
            id: model.id.clone(),
            name: model.name.clone(),
            display_name: model.display_name.clone(),
            icon: model.icon.clone(),
            color: model.color.clone(),
        }
    }
}

/// Tag reference embedded in a prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSummary {
    pub id: String,
    pub name: String,
    pub display_name: String,
    pub color: Option<String>,
}

impl From<&tag::Model> for TagSummary {
    fn from(model: &tag::Model) -> Self {
        Self {
            id: model.id.clone(),
            name: model.name.clone(),
            display_name: model.display_name.clone(),
            color: model.color.clone(),
        }
    }
}

/// Public author information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorSummary {
    pub id: String,
    pub username: String,
    pub nickname: Option<String>,
    pub avatar_url: Option<String>,
}

impl From<&profile::Model> for AuthorSummary {
    fn from(model: &profile::Model) -> Self {
        Self {
            id: model.id.clone(),
            username: model.username.clone(),
            nickname: model.nickname.clone(),
            avatar_url: model.avatar_url.clone(),
        }
    }
}

/// A prompt as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptView {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub content: String,
    pub status: PromptStatus,
    pub is_public: bool,
    pub view_count: i64,
    pub favorite_count: i64,
    pub images: Vec<String>,
    pub language: String,
    pub category: Option<CategorySummary>,
    pub tags: Vec<TagSummary>,
    pub author_id: String,
    pub author: Option<AuthorSummary>,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: Option<DateTime<FixedOffset>>,
}

/// Related rows needed to render prompts, keyed by ID.
#[derive(Debug, Default)]
pub struct PromptRelations {
    pub categories: HashMap<String, category::Model>,
    pub tags: HashMap<String, Vec<tag::Model>>,
    pub authors: HashMap<String, profile::Model>,
}

impl PromptView {
    /// Build a view from a row and its related rows.
    ///
    /// This is the only place the `images` column is decoded.
    #[must_use]
    pub fn from_model(model: prompt::Model, relations: &PromptRelations) -> Self {
        let images = decode_images(&model.images);
        let category = model
            .category_id
            .as_ref()
            .and_then(|id| relations.categories.get(id))
            .map(CategorySummary::from);
        let tags = relations
            .tags
            .get(&model.id)
            .map(|tags| tags.iter().map(TagSummary::from).collect())
            .unwrap_or_default();
        let author = relations.authors.get(&model.author_id).map(AuthorSummary::from);

        Self {
            id: model.id,
            title: model.title,
            description: model.description,
            content: model.content,
            status: model.status,
            is_public: model.is_public,
            view_count: model.view_count,
            favorite_count: model.favorite_count,
            images,
            language: model.language,
            category,
            tags,
            author_id: model.author_id,
            author,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// One page of prompts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptPage {
    pub items: Vec<PromptView>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub has_more: bool,
}

impl PromptPage {
    #[must_use]
    pub fn new(items: Vec<PromptView>, total: u64, pagination: Pagination) -> Self {
        let has_more = pagination.offset().saturating_add(items.len() as u64) < total;
        Self {
            items,
            total,
            page: pagination.page,
            limit: pagination.limit,
            has_more,
        }
    }
}

/// Page/limit pair with defaults and bounds applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
}

impl Pagination {
    pub const DEFAULT_LIMIT: u64 = 20;
    pub const MAX_LIMIT: u64 = 100;
    /// Highest page whose offset still fits a signed 64-bit SQL `OFFSET`.
    pub const MAX_PAGE: u64 = i64::MAX.unsigned_abs() / Self::MAX_LIMIT;

    /// Normalize client-supplied values: page is 1..=MAX_PAGE, limit is 1..=100.
    #[must_use]
    pub fn new(page: Option<u64>, limit: Option<u64>) -> Self {
        Self {
            page: page.unwrap_or(1).clamp(1, Self::MAX_PAGE),
            limit: limit
                .unwrap_or(Self::DEFAULT_LIMIT)
                .clamp(1, Self::MAX_LIMIT),
        }
    }

    #[must_use]
    pub const fn offset(self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// The signed-in user and their profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileView {
    pub id: String,
    pub email: String,
    pub role: Role,
    pub username: Option<String>,
    pub nickname: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
}

impl ProfileView {
    /// Combine an identity row with its (possibly not yet created) profile.
    #[must_use]
    pub fn new(user: &user::Model, profile: Option<&profile::Model>) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            role: user.role,
            username: profile.map(|p| p.username.clone()),
            nickname: profile.and_then(|p| p.nickname.clone()),
            avatar_url: profile.and_then(|p| p.avatar_url.clone()),
            bio: profile.and_then(|p| p.bio.clone()),
        }
    }
}

/// Counters shown on a user's dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    pub prompt_count: u64,
    pub published_count: u64,
    pub reviewing_count: u64,
    pub rejected_count: u64,
    pub favorites_given: u64,
    pub favorites_received: i64,
    pub total_views: i64,
}
