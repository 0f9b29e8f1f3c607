//! Admin statistics.

use prompthub_common::AppResult;
use prompthub_db::{
    entities::prompt::PromptStatus,
    repositories::{PromptStats, StatsRepository},
};

/// Statistics service.
#[derive(Clone)]
pub struct StatsService {
    stats_repo: StatsRepository,
}

impl StatsService {
    /// Create a new statistics service.
    #[must_use]
    pub const fn new(stats_repo: StatsRepository) -> Self {
        Self { stats_repo }
    }

    /// Site-wide counters.
    ///
    /// Uses the `prompt_stats()` aggregate and falls back to individual
    /// counts when it fails or returns no row.
    pub async fn admin_stats(&self) -> AppResult<PromptStats> {
        match self.stats_repo.aggregate().await {
            Ok(Some(stats)) => return Ok(stats),
            Ok(None) => tracing::warn!("prompt_stats() returned no row, counting directly"),
            Err(e) => tracing::warn!(error = %e, "prompt_stats() failed, counting directly"),
        }
        self.count_directly().await
    }

    async fn count_directly(&self) -> AppResult<PromptStats> {
        Ok(PromptStats {
            total_prompts: self.stats_repo.count_prompts(None).await?,
            published_prompts: self
                .stats_repo
                .count_prompts(Some(PromptStatus::Published))
                .await?,
            reviewing_prompts: self
                .stats_repo
                .count_prompts(Some(PromptStatus::Reviewing))
                .await?,
            rejected_prompts: self
                .stats_repo
                .count_prompts(Some(PromptStatus::Rejected))
                .await?,
            total_users: self.stats_repo.count_users().await?,
            total_categories: self.stats_repo.count_categories().await?,
            total_tags: self.stats_repo.count_tags().await?,
            total_favorites: self.stats_repo.count_favorites().await?,
        })
    }
}
