//! Favorite service.

use chrono::Utc;
use prompthub_common::{AppError, AppResult, IdGenerator};
use prompthub_db::{
    entities::favorite,
    repositories::{FavoriteRepository, PromptRepository},
};
use sea_orm::Set;
use serde::{Deserialize, Serialize};

use super::prompt::PromptService;
use crate::views::{Pagination, PromptPage};

/// Outcome of a favorite toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavoriteToggle {
    pub favorited: bool,
    pub favorite_count: i64,
}

/// Favorite service for business logic.
#[derive(Clone)]
pub struct FavoriteService {
    favorite_repo: FavoriteRepository,
    prompt_repo: PromptRepository,
    prompt_service: PromptService,
    id_gen: IdGenerator,
}

impl FavoriteService {
    /// Create a new favorite service.
    #[must_use]
    pub const fn new(
        favorite_repo: FavoriteRepository,
        prompt_repo: PromptRepository,
        prompt_service: PromptService,
    ) -> Self {
        Self {
            favorite_repo,
            prompt_repo,
            prompt_service,
            id_gen: IdGenerator::new(),
        }
    }

    /// Favorite the prompt if the user has not yet, otherwise unfavorite it.
    pub async fn toggle(&self, user_id: &str, prompt_id: &str) -> AppResult<FavoriteToggle> {
        let prompt = self.prompt_repo.get_by_id(prompt_id).await?;
        if !prompt.is_publicly_visible() && prompt.author_id != user_id {
            return Err(AppError::PromptNotFound(prompt_id.to_string()));
        }

        let existing = self
            .favorite_repo
            .find_by_user_and_prompt(user_id, prompt_id)
            .await?;

        let toggle = if let Some(existing) = existing {
            self.favorite_repo.delete(&existing.id).await?;
            self.prompt_repo.decrement_favorite_count(prompt_id).await?;
            FavoriteToggle {
                favorited: false,
                favorite_count: clamp_favorite_count(prompt.favorite_count, -1),
            }
        } else {
            let model = favorite::ActiveModel {
                id: Set(self.id_gen.generate()),
                user_id: Set(user_id.to_string()),
                prompt_id: Set(prompt_id.to_string()),
                created_at: Set(Utc::now().into()),
            };
            self.favorite_repo.create(model).await?;
            self.prompt_repo.increment_favorite_count(prompt_id).await?;
            FavoriteToggle {
                favorited: true,
                favorite_count: clamp_favorite_count(prompt.favorite_count, 1),
            }
        };

        tracing::debug!(
            user_id = %user_id,
            prompt_id = %prompt_id,
            favorited = toggle.favorited,
            "Favorite toggled"
        );
        Ok(toggle)
    }

    /// Whether the user has favorited the prompt.
    pub async fn is_favorited(&self, user_id: &str, prompt_id: &str) -> AppResult<bool> {
        self.favorite_repo.is_favorited(user_id, prompt_id).await
    }

    /// The user's favorited prompts, most recently favorited first.
    pub async fn list_for_user(
        &self,
        user_id: &str,
        pagination: Pagination,
    ) -> AppResult<PromptPage> {
        let total = self.favorite_repo.count_by_user(user_id).await?;
        let prompt_ids: Vec<String> = self
            .favorite_repo
            .find_by_user(user_id, pagination.limit, pagination.offset())
            .await?
            .into_iter()
            .map(|f| f.prompt_id)
            .collect();
        let items = self.prompt_service.hydrate_ids(&prompt_ids).await?;
        Ok(PromptPage::new(items, total, pagination))
    }
}

/// Apply a favorite delta to a count without going below zero.
#[must_use]
pub const fn clamp_favorite_count(current: i64, delta: i64) -> i64 {
    let next = current.saturating_add(delta);
    if next < 0 { 0 } else { next }
}
