//! Prompt entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Moderation state of a prompt.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, EnumIter, DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum PromptStatus {
    #[sea_orm(string_value = "reviewing")]
    #[default]
    Reviewing,
    #[sea_orm(string_value = "published")]
    Published,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

impl PromptStatus {
    /// Wire name, as stored and as accepted in query strings.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reviewing => "reviewing",
            Self::Published => "published",
            Self::Rejected => "rejected",
        }
    }

    /// Parse a wire name.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "reviewing" => Some(Self::Reviewing),
            "published" => Some(Self::Published),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "prompts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub title: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    #[sea_orm(column_type = "Text")]
    pub content: String,

    pub status: PromptStatus,

    #[sea_orm(default_value = true)]
    pub is_public: bool,

    #[sea_orm(default_value = 0)]
    pub view_count: i64,

    /// Denormalized, never negative.
    #[sea_orm(default_value = 0)]
    pub favorite_count: i64,

    /// Image URLs. Use [`decode_images`] to read.
    #[sea_orm(column_type = "JsonBinary")]
    pub images: Json,

    #[sea_orm(nullable)]
    pub category_id: Option<String>,

    pub author_id: String,

    pub language: String,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

impl Model {
    /// Whether anonymous visitors may see this prompt.
    #[must_use]
    pub fn is_publicly_visible(&self) -> bool {
        self.is_public && self.status == PromptStatus::Published
    }
}

/// Decode the `images` column into a list of URLs.
///
/// Rows written by older clients hold a JSON string that itself contains an
/// encoded array; both shapes are accepted. Anything else yields no images.
#[must_use]
pub fn decode_images(value: &Json) -> Vec<String> {
    match value {
        Json::Array(items) => items
            .iter()
            .filter_map(|item| item.as_str())
            .filter(|url| !url.is_empty())
            .map(str::to_string)
            .collect(),
        Json::String(encoded) => serde_json::from_str::<Json>(encoded)
            .ok()
            .filter(Json::is_array)
            .map(|inner| decode_images(&inner))
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// Encode image URLs for the `images` column.
#[must_use]
pub fn encode_images(urls: &[String]) -> Json {
    Json::Array(urls.iter().cloned().map(Json::String).collect())
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::AuthorId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Author,
    #[sea_orm(
        belongs_to = "super::category::Entity",
        from = "Column::CategoryId",
        to = "super::category::Column::Id",
        on_delete = "SetNull"
    )]
    Category,
    #[sea_orm(has_many = "super::prompt_tag::Entity")]
    PromptTags,
    #[sea_orm(has_many = "super::favorite::Entity")]
    Favorites,
    #[sea_orm(has_many = "super::review::Entity")]
    Reviews,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Author.def()
    }
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl Related<super::prompt_tag::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PromptTags.def()
    }
}

impl Related<super::favorite::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Favorites.def()
    }
}

impl Related<super::review::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reviews.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
