//! Authentication endpoints.
//!
//! Sessions are opaque tokens stored on the user row. Clients either keep the
//! token and send it as a bearer token, or rely on the `session` cookie set
//! here.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use prompthub_common::AppResult;
use prompthub_core::{AuthSession, LoginInput, ProfileView, RegisterInput};

use crate::{
    extractors::{AuthUser, MaybeAuthUser},
    middleware::{AppState, SESSION_COOKIE},
};

fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

/// Create an account and sign in.
async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(input): Json<RegisterInput>,
) -> AppResult<impl IntoResponse> {
    let session = state.user_service.register(input).await?;
    let jar = jar.add(session_cookie(session.token.clone()));
    Ok((StatusCode::CREATED, jar, Json(session)))
}

/// Sign in with email and password.
async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(input): Json<LoginInput>,
) -> AppResult<(CookieJar, Json<AuthSession>)> {
    let session = state.user_service.login(input).await?;
    let jar = jar.add(session_cookie(session.token.clone()));
    Ok((jar, Json(session)))
}

/// Sign out: the token stops working and the cookie is cleared.
async fn logout(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    jar: CookieJar,
) -> AppResult<impl IntoResponse> {
    state.user_service.logout(user).await?;
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    Ok((jar, StatusCode::NO_CONTENT))
}

/// The signed-in user, or `null`.
async fn session(
    State(state): State<AppState>,
    MaybeAuthUser(user): MaybeAuthUser,
) -> AppResult<Json<Option<ProfileView>>> {
    let view = match user {
        Some(user) => Some(state.user_service.get_profile(&user).await?),
        None => None,
    };
    Ok(Json(view))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/session", get(session))
}
