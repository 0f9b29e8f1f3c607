//! Prompt moderation.

use chrono::Utc;
use prompthub_common::{AppError, AppResult, IdGenerator};
use prompthub_db::{
    entities::{prompt::PromptStatus, review, user},
    repositories::{PromptRepository, ReviewRepository},
};
use sea_orm::Set;
use serde::Deserialize;
use validator::Validate;

/// A moderation decision.
#[derive(Debug, Deserialize, Validate)]
pub struct ReviewInput {
    /// `published` or `rejected`.
    pub status: PromptStatus,

    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

/// Moderation service.
#[derive(Clone)]
pub struct ModerationService {
    prompt_repo: PromptRepository,
    review_repo: ReviewRepository,
    id_gen: IdGenerator,
}

impl ModerationService {
    /// Create a new moderation service.
    #[must_use]
    pub const fn new(prompt_repo: PromptRepository, review_repo: ReviewRepository) -> Self {
        Self {
            prompt_repo,
            review_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Publish or reject a prompt and record the decision.
    pub async fn review(
        &self,
        prompt_id: &str,
        reviewer: &user::Model,
        input: ReviewInput,
    ) -> AppResult<review::Model> {
        if !reviewer.role.is_admin() {
            return Err(AppError::Forbidden("Admin access required".to_string()));
        }
        input.validate()?;
        if input.status == PromptStatus::Reviewing {
            return Err(AppError::BadRequest(
                "status must be `published` or `rejected`".to_string(),
            ));
        }

        let prompt = self.prompt_repo.get_by_id(prompt_id).await?;

        let notes = input
            .notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        let review = self
            .review_repo
            .create(review::ActiveModel {
                id: Set(self.id_gen.generate()),
                prompt_id: Set(prompt.id.clone()),
                reviewer_id: Set(reviewer.id.clone()),
                status: Set(input.status),
                notes: Set(notes),
                created_at: Set(Utc::now().into()),
            })
            .await?;
        // The status only changes once its review row exists.
        self.prompt_repo.set_status(&prompt.id, input.status).await?;

        tracing::info!(
            prompt_id = %prompt.id,
            reviewer_id = %reviewer.id,
            from = prompt.status.as_str(),
            to = input.status.as_str(),
            "Prompt reviewed"
        );
        Ok(review)
    }

    /// Review history of a prompt, newest first.
    pub async fn reviews_for(&self, prompt_id: &str) -> AppResult<Vec<review::Model>> {
        let prompt = self.prompt_repo.get_by_id(prompt_id).await?;
        self.review_repo.find_by_prompt(&prompt.id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prompthub_db::entities::{prompt, user::Role};
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, MockExecResult};
    use serde_json::json;
    use std::sync::Arc;

    fn test_user(role: Role) -> user::Model {
        user::Model {
            id: "admin1".to_string(),
            email: "admin@example.com".to_string(),
            password_hash: String::new(),
            token: None,
            role,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    fn test_prompt() -> prompt::Model {
        prompt::Model {
            id: "p1".to_string(),
            title: "Prompt".to_string(),
            description: None,
            content: "Content".to_string(),
            status: PromptStatus::Reviewing,
            is_public: true,
            view_count: 0,
            favorite_count: 0,
            images: json!([]),
            category_id: None,
            author_id: "u1".to_string(),
            language: "en".to_string(),
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    fn empty_db() -> DatabaseConnection {
        MockDatabase::new(DatabaseBackend::Postgres).into_connection()
    }

    fn service(prompt_db: DatabaseConnection, review_db: DatabaseConnection) -> ModerationService {
        ModerationService::new(
            PromptRepository::new(Arc::new(prompt_db)),
            ReviewRepository::new(Arc::new(review_db)),
        )
    }

    #[tokio::test]
    async fn test_non_admin_is_forbidden() {
        let result = service(empty_db(), empty_db())
            .review(
                "p1",
                &test_user(Role::User),
                ReviewInput {
                    status: PromptStatus::Published,
                    notes: None,
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_reviewing_is_not_a_decision() {
        let result = service(empty_db(), empty_db())
            .review(
                "p1",
                &test_user(Role::Admin),
                ReviewInput {
                    status: PromptStatus::Reviewing,
                    notes: None,
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_publish_records_review() {
        let prompt_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[test_prompt()]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();
        let review_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[review::Model {
                id: "r1".to_string(),
                prompt_id: "p1".to_string(),
                reviewer_id: "admin1".to_string(),
                status: PromptStatus::Published,
                notes: Some("Looks good".to_string()),
                created_at: Utc::now().into(),
            }]])
            .into_connection();

        let review = service(prompt_db, review_db)
            .review(
                "p1",
                &test_user(Role::Admin),
                ReviewInput {
                    status: PromptStatus::Published,
                    notes: Some("  Looks good ".to_string()),
                },
            )
            .await
            .unwrap();

        assert_eq!(review.status, PromptStatus::Published);
        assert_eq!(review.reviewer_id, "admin1");
    }

    #[tokio::test]
    async fn test_failed_review_insert_leaves_status_unchanged() {
        let prompt_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[test_prompt()]])
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );
        // No result for the insert, so recording the review fails.
        let moderation = ModerationService::new(
            PromptRepository::new(prompt_db.clone()),
            ReviewRepository::new(Arc::new(empty_db())),
        );

        let result = moderation
            .review(
                "p1",
                &test_user(Role::Admin),
                ReviewInput {
                    status: PromptStatus::Published,
                    notes: None,
                },
            )
            .await;
        drop(moderation);

        assert!(matches!(result, Err(AppError::Database(_))));
        let log = Arc::try_unwrap(prompt_db).unwrap().into_transaction_log();
        assert_eq!(log.len(), 1, "only the prompt lookup may reach the database");
    }

    #[tokio::test]
    async fn test_review_missing_prompt() {
        let prompt_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<prompt::Model>::new()])
            .into_connection();

        let result = service(prompt_db, empty_db())
            .review(
                "missing",
                &test_user(Role::Admin),
                ReviewInput {
                    status: PromptStatus::Rejected,
                    notes: None,
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::PromptNotFound(_))));
    }
}
