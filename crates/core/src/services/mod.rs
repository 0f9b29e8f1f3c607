//! Business logic services.

#![allow(missing_docs)]

pub mod favorite;
pub mod media;
pub mod moderation;
pub mod prompt;
pub mod sitemap;
pub mod stats;
pub mod taxonomy;
pub mod user;

pub use favorite::{FavoriteService, FavoriteToggle, clamp_favorite_count};
pub use media::{
    ImageDimensions, ImageFormat, MediaConfig, MediaService, ProcessedImage, UploadedImage,
    fit_within, normalize_image, validate_upload,
};
pub use moderation::{ModerationService, ReviewInput};
pub use prompt::{
    CreatePromptInput, DEFAULT_LANGUAGE, PromptQuery, PromptService, UpdatePromptInput,
    ensure_visible,
};
pub use sitemap::{SitemapService, render_sitemap};
pub use stats::StatsService;
pub use taxonomy::{
    CreateCategoryInput, MAX_TAG_LENGTH, TaxonomyService, UpdateCategoryInput, validate_tag_name,
};
pub use user::{
    AuthSession, ChangePasswordInput, LoginInput, RegisterInput, UpdateProfileInput, UserService,
};
