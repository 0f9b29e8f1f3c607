//! User service: accounts, sessions and profiles.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::Utc;
use prompthub_common::{AppError, AppResult, IdGenerator};
use prompthub_db::{
    entities::{profile, prompt::PromptStatus, user, user::Role},
    repositories::{
        FavoriteRepository, ProfileRepository, PromptFilter, PromptRepository, UserRepository,
    },
};
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::views::{ProfileView, UserStats, double_option};

/// Longest generated username stem, before the random suffix.
const USERNAME_STEM_MAX: usize = 20;

/// Attempts at finding a free generated username.
const USERNAME_ATTEMPTS: usize = 3;

/// Input for registering an account.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterInput {
    #[validate(email, length(max = 254))]
    pub email: String,

    #[validate(length(min = 8, max = 128))]
    pub password: String,

    /// Optional public handle; one is generated from the email otherwise.
    #[validate(length(min = 3, max = 32))]
    pub username: Option<String>,
}

/// Input for signing in.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginInput {
    #[validate(length(min = 1, max = 254))]
    pub email: String,

    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

/// Input for updating the caller's profile. Missing fields are left untouched.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateProfileInput {
    #[validate(length(min = 3, max = 32))]
    pub username: Option<String>,

    #[serde(default, deserialize_with = "double_option")]
    pub nickname: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    pub avatar_url: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    pub bio: Option<Option<String>>,
}

/// Input for changing the password.
#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordInput {
    #[validate(length(min = 1, max = 128))]
    pub current_password: String,

    #[validate(length(min = 8, max = 128))]
    pub new_password: String,
}

/// A signed-in session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub token: String,
    pub user: ProfileView,
}

/// User service for business logic.
#[derive(Clone)]
pub struct UserService {
    user_repo: UserRepository,
    profile_repo: ProfileRepository,
    prompt_repo: PromptRepository,
    favorite_repo: FavoriteRepository,
    id_gen: IdGenerator,
}

impl UserService {
    /// Create a new user service.
    #[must_use]
    pub const fn new(
        user_repo: UserRepository,
        profile_repo: ProfileRepository,
        prompt_repo: PromptRepository,
        favorite_repo: FavoriteRepository,
    ) -> Self {
        Self {
            user_repo,
            profile_repo,
            prompt_repo,
            favorite_repo,
            id_gen: IdGenerator::new(),
        }
    }

    // ==================== Sessions ====================

    /// Create an account and its profile, and open a session.
    pub async fn register(&self, input: RegisterInput) -> AppResult<AuthSession> {
        input.validate()?;

        let email = input.email.trim().to_lowercase();
        if self.user_repo.find_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        let username = match input.username.as_deref() {
            Some(name) => {
                let name = validate_username(name)?;
                if self.profile_repo.find_by_username(&name).await?.is_some() {
                    return Err(AppError::Conflict("Username already taken".to_string()));
                }
                name
            }
            None => self.generate_username(&email).await?,
        };

        let password_hash = hash_password(&input.password)?;
        let token = self.id_gen.generate_token();
        let now = Utc::now();

        let user = self
            .user_repo
            .create(user::ActiveModel {
                id: Set(self.id_gen.generate()),
                email: Set(email),
                password_hash: Set(password_hash),
                token: Set(Some(token.clone())),
                role: Set(Role::User),
                created_at: Set(now.into()),
                updated_at: Set(None),
            })
            .await?;

        let profile = self
            .profile_repo
            .create(profile::ActiveModel {
                id: Set(user.id.clone()),
                username: Set(username),
                nickname: Set(None),
                avatar_url: Set(None),
                bio: Set(None),
                created_at: Set(now.into()),
                updated_at: Set(None),
            })
            .await?;

        tracing::info!(user_id = %user.id, "User registered");
        Ok(AuthSession {
            token,
            user: ProfileView::new(&user, Some(&profile)),
        })
    }

    /// Check credentials and issue a fresh session token.
    pub async fn login(&self, input: LoginInput) -> AppResult<AuthSession> {
        input.validate()?;

        let user = self
            .user_repo
            .find_by_email(&input.email)
            .await?
            .ok_or(AppError::Unauthorized)?;
        if !verify_password(&input.password, &user.password_hash)? {
            return Err(AppError::Unauthorized);
        }

        let token = self.id_gen.generate_token();
        let user = self.user_repo.set_token(user, Some(token.clone())).await?;
        let profile = self.profile_repo.find_by_id(&user.id).await?;

        tracing::info!(user_id = %user.id, "User signed in");
        Ok(AuthSession {
            token,
            user: ProfileView::new(&user, profile.as_ref()),
        })
    }

    /// End the session by rotating the token to one nobody holds.
    pub async fn logout(&self, user: user::Model) -> AppResult<()> {
        let user_id = user.id.clone();
        self.user_repo
            .set_token(user, Some(self.id_gen.generate_token()))
            .await?;
        tracing::info!(user_id = %user_id, "User signed out");
        Ok(())
    }

    /// Authenticate a user by token.
    pub async fn authenticate_by_token(&self, token: &str) -> AppResult<user::Model> {
        if token.is_empty() {
            return Err(AppError::Unauthorized);
        }
        self.user_repo
            .find_by_token(token)
            .await?
            .ok_or(AppError::Unauthorized)
    }

    // ==================== Profiles ====================

    /// The caller's identity and profile, if one exists yet.
    pub async fn get_profile(&self, user: &user::Model) -> AppResult<ProfileView> {
        let profile = self.profile_repo.find_by_id(&user.id).await?;
        Ok(ProfileView::new(user, profile.as_ref()))
    }

    /// Return the user's profile, creating it on first use.
    pub async fn ensure_profile(&self, user: &user::Model) -> AppResult<profile::Model> {
        if let Some(profile) = self.profile_repo.find_by_id(&user.id).await? {
            return Ok(profile);
        }

        let username = self.generate_username(&user.email).await?;
        let profile = self
            .profile_repo
            .create(profile::ActiveModel {
                id: Set(user.id.clone()),
                username: Set(username),
                nickname: Set(None),
                avatar_url: Set(None),
                bio: Set(None),
                created_at: Set(Utc::now().into()),
                updated_at: Set(None),
            })
            .await?;

        tracing::debug!(user_id = %user.id, username = %profile.username, "Created profile");
        Ok(profile)
    }

    /// Update the caller's profile.
    pub async fn update_profile(
        &self,
        user: &user::Model,
        input: UpdateProfileInput,
    ) -> AppResult<ProfileView> {
        input.validate()?;
        check_max_len("nickname", input.nickname.as_ref(), 64)?;
        check_max_len("avatar_url", input.avatar_url.as_ref(), 2048)?;
        check_max_len("bio", input.bio.as_ref(), 500)?;

        let profile = self.ensure_profile(user).await?;

        let username = match input.username.as_deref() {
            Some(name) => {
                let name = validate_username(name)?;
                if name != profile.username {
                    if let Some(other) = self.profile_repo.find_by_username(&name).await? {
                        if other.id != user.id {
                            return Err(AppError::Conflict("Username already taken".to_string()));
                        }
                    }
                }
                Some(name)
            }
            None => None,
        };

        let mut active: profile::ActiveModel = profile.into();
        if let Some(username) = username {
            active.username = Set(username);
        }
        if let Some(nickname) = input.nickname {
            active.nickname = Set(nickname.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()));
        }
        if let Some(avatar_url) = input.avatar_url {
            active.avatar_url = Set(avatar_url);
        }
        if let Some(bio) = input.bio {
            active.bio = Set(bio);
        }
        active.updated_at = Set(Some(Utc::now().into()));

        let profile = self.profile_repo.update(active).await?;
        Ok(ProfileView::new(user, Some(&profile)))
    }

    /// Change the password after checking the current one.
    pub async fn change_password(
        &self,
        user: user::Model,
        input: ChangePasswordInput,
    ) -> AppResult<()> {
        input.validate()?;

        if !verify_password(&input.current_password, &user.password_hash)? {
            return Err(AppError::BadRequest(
                "Current password is incorrect".to_string(),
            ));
        }

        let user_id = user.id.clone();
        let password_hash = hash_password(&input.new_password)?;
        self.user_repo.set_password_hash(user, password_hash).await?;

        tracing::info!(user_id = %user_id, "Password changed");
        Ok(())
    }

    /// Counters for the user's dashboard.
    pub async fn stats(&self, user_id: &str) -> AppResult<UserStats> {
        let by_status = |status: Option<PromptStatus>| PromptFilter {
            author_id: Some(user_id.to_string()),
            status,
            ..PromptFilter::default()
        };

        let prompt_count = self.prompt_repo.count(&by_status(None)).await?;
        let published_count = self
            .prompt_repo
            .count(&by_status(Some(PromptStatus::Published)))
            .await?;
        let reviewing_count = self
            .prompt_repo
            .count(&by_status(Some(PromptStatus::Reviewing)))
            .await?;
        let rejected_count = self
            .prompt_repo
            .count(&by_status(Some(PromptStatus::Rejected)))
            .await?;
        let favorites_given = self.favorite_repo.count_by_user(user_id).await?;
        let totals = self.prompt_repo.totals_by_author(user_id).await?;

        Ok(UserStats {
            prompt_count,
            published_count,
            reviewing_count,
            rejected_count,
            favorites_given,
            favorites_received: totals.total_favorites,
            total_views: totals.total_views,
        })
    }

    /// Pick an unused username derived from an email address.
    async fn generate_username(&self, email: &str) -> AppResult<String> {
        let stem = username_stem(email);
        for _ in 0..USERNAME_ATTEMPTS {
            let candidate = format!("{stem}_{}", self.id_gen.random_suffix(6));
            if self.profile_repo.find_by_username(&candidate).await?.is_none() {
                return Ok(candidate);
            }
        }
        Err(AppError::Conflict(
            "Could not allocate a username, please choose one".to_string(),
        ))
    }
}

/// Lower-case the local part of an email and keep only `[a-z0-9_]`.
fn username_stem(email: &str) -> String {
    let local = email.split('@').next().unwrap_or_default();
    let stem: String = local
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .take(USERNAME_STEM_MAX)
        .collect();
    if stem.is_empty() {
        "user".to_string()
    } else {
        stem
    }
}

/// Usernames are lower-case `[a-z0-9_]`.
fn validate_username(name: &str) -> AppResult<String> {
    let name = name.trim().to_lowercase();
    if name.len() < 3
        || name.len() > 32
        || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(AppError::Validation(
            "username: 3-32 characters of letters, digits and '_'".to_string(),
        ));
    }
    Ok(name)
}

fn check_max_len(field: &str, value: Option<&Option<String>>, max: usize) -> AppResult<()> {
    match value {
        Some(Some(v)) if v.chars().count() > max => Err(AppError::Validation(format!(
            "{field}: must be at most {max} characters"
        ))),
        _ => Ok(()),
    }
}

/// Hash a password using Argon2.
fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {e}")))
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| AppError::Internal(format!("Invalid hash: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}
