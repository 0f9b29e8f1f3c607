//! API integration tests.
//!
//! These tests drive the full router with a mock database.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::redundant_clone)]

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
    response::Response,
};
use chrono::Utc;
use maplit::btreemap;
use prompthub_api::{AppState, app};
use prompthub_common::{
    CacheError, CacheStore, LocalStorage, MemoryCacheStore, ReadThroughCache, StorageConfig,
    StorageService,
    config::{Config, DatabaseConfig, ServerConfig},
};
use prompthub_core::PromptView;
use prompthub_db::entities::prompt::PromptStatus;
use prompthub_db::entities::{category, profile, prompt, prompt_tag, review, user};
use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Value};
use tower::ServiceExt;

/// A cache store whose backend is always down.
struct UnavailableStore;

#[async_trait::async_trait]
impl CacheStore for UnavailableStore {
    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Err(CacheError::Backend("connection refused".into()))
    }

    async fn set(&self, _key: &str, _value: String, _ttl: u64) -> Result<(), CacheError> {
        Err(CacheError::Backend("connection refused".into()))
    }

    async fn delete(&self, _key: &str) -> Result<(), CacheError> {
        Err(CacheError::Backend("connection refused".into()))
    }
}

fn test_config() -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 3000,
            url: "https://prompts.example.com".to_string(),
        },
        database: DatabaseConfig {
            url: "postgres://localhost/test".to_string(),
            max_connections: 10,
            min_connections: 1,
        },
        redis: None,
        storage: StorageConfig::default(),
    }
}

fn test_app(db: MockDatabase, store: Arc<dyn CacheStore>) -> Router {
    let storage: StorageService = Arc::new(LocalStorage::new(
        std::env::temp_dir().join("prompthub-api-tests"),
        "http://localhost:3000/files".to_string(),
    ));
    let state = AppState::new(
        Arc::new(db.into_connection()),
        ReadThroughCache::new(store, "test"),
        storage,
        &test_config(),
    );
    app(state)
}

fn empty_db() -> MockDatabase {
    MockDatabase::new(DatabaseBackend::Postgres)
}

fn user_row(role: user::Role) -> user::Model {
    user::Model {
        id: "user1".to_string(),
        email: "someone@example.com".to_string(),
        password_hash: "$argon2id$unused".to_string(),
        token: Some("tok".to_string()),
        role,
        created_at: Utc::now().into(),
        updated_at: None,
    }
}

fn category_row(id: &str, name: &str) -> category::Model {
    category::Model {
        id: id.to_string(),
        name: name.to_string(),
        display_name: name.to_uppercase(),
        icon: None,
        color: None,
        count: 3,
        sort_order: 0,
        created_at: Utc::now().into(),
    }
}

fn prompt_row(title: &str, status: PromptStatus) -> prompt::Model {
    prompt::Model {
        id: "p1".to_string(),
        title: title.to_string(),
        description: None,
        content: "Content".to_string(),
        status,
        is_public: true,
        view_count: 0,
        favorite_count: 0,
        images: serde_json::json!([]),
        category_id: None,
        author_id: "author1".to_string(),
        language: "en".to_string(),
        created_at: Utc::now().into(),
        updated_at: None,
    }
}

/// Append the result sets of hydrating one prompt without a category.
fn with_prompt(db: MockDatabase, row: prompt::Model) -> MockDatabase {
    db.append_query_results([vec![row]])
        .append_query_results([Vec::<prompt_tag::Model>::new()])
        .append_query_results([Vec::<profile::Model>::new()])
}

fn hidden_view(author_id: &str) -> PromptView {
    PromptView {
        id: "p1".to_string(),
        title: "Draft".to_string(),
        description: None,
        content: "Content".to_string(),
        status: PromptStatus::Reviewing,
        is_public: true,
        view_count: 0,
        favorite_count: 0,
        images: Vec::new(),
        language: "en".to_string(),
        category: None,
        tags: Vec::new(),
        author_id: author_id.to_string(),
        author: None,
        created_at: Utc::now().into(),
        updated_at: None,
    }
}

fn review_row() -> review::Model {
    review::Model {
        id: "r1".to_string(),
        prompt_id: "p1".to_string(),
        reviewer_id: "user1".to_string(),
        status: PromptStatus::Published,
        notes: None,
        created_at: Utc::now().into(),
    }
}

const fn exec(rows_affected: u64) -> MockExecResult {
    MockExecResult {
        last_insert_id: 0,
        rows_affected,
    }
}

/// A memory store that already holds `view` under the prompt's cache key.
async fn seeded_store(view: &PromptView) -> Arc<MemoryCacheStore> {
    let store = Arc::new(MemoryCacheStore::new());
    store
        .set("test:prompt:p1", serde_json::to_string(view).unwrap(), 300)
        .await
        .unwrap();
    store
}

fn authed(method: &str, uri: &str, body: Body) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, "Bearer tok")
        .header(header::CONTENT_TYPE, "application/json")
        .body(body)
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_string(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let app = test_app(empty_db(), Arc::new(MemoryCacheStore::new()));

    let response = app.oneshot(get("/api/nonexistent")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_prompts_requires_session() {
    let app = test_app(empty_db(), Arc::new(MemoryCacheStore::new()));

    let response = app
        .oneshot(get("/api/admin/prompts?status=reviewing"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_prompts_forbidden_for_regular_user() {
    let db = empty_db().append_query_results([vec![user_row(user::Role::User)]]);
    let app = test_app(db, Arc::new(MemoryCacheStore::new()));

    let request = Request::builder()
        .uri("/api/admin/prompts?status=reviewing")
        .header(header::AUTHORIZATION, "Bearer tok")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert!(body["error"]["code"].is_string());
}

#[tokio::test]
async fn test_admin_stats_requires_session() {
    let app = test_app(empty_db(), Arc::new(MemoryCacheStore::new()));

    let response = app.oneshot(get("/api/admin/stats")).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unknown_session_cookie_is_anonymous() {
    let db = empty_db().append_query_results([Vec::<user::Model>::new()]);
    let app = test_app(db, Arc::new(MemoryCacheStore::new()));

    let request = Request::builder()
        .uri("/api/auth/session")
        .header(header::COOKIE, "session=stale")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "null");
}

#[tokio::test]
async fn test_search_requires_query() {
    let app = test_app(empty_db(), Arc::new(MemoryCacheStore::new()));

    let response = app.oneshot(get("/api/prompts/search?q=%20")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_requires_session() {
    let app = test_app(empty_db(), Arc::new(MemoryCacheStore::new()));

    let request = Request::builder()
        .method("POST")
        .uri("/api/upload")
        .header(header::CONTENT_TYPE, "multipart/form-data; boundary=x")
        .body(Body::from("--x--\r\n"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_cache_outage_only_changes_x_cache() {
    let rows = vec![category_row("c1", "coding"), category_row("c2", "writing")];

    let healthy = test_app(
        empty_db().append_query_results([rows.clone()]),
        Arc::new(MemoryCacheStore::new()),
    );
    let degraded = test_app(
        empty_db().append_query_results([rows]),
        Arc::new(UnavailableStore),
    );

    let healthy_response = healthy.oneshot(get("/api/categories")).await.unwrap();
    let degraded_response = degraded.oneshot(get("/api/categories")).await.unwrap();

    assert_eq!(healthy_response.status(), StatusCode::OK);
    assert_eq!(degraded_response.status(), StatusCode::OK);
    assert_eq!(healthy_response.headers()["x-cache"], "MISS");
    assert!(degraded_response.headers().get("x-cache").is_none());
    assert_eq!(
        healthy_response.headers()[header::CACHE_CONTROL],
        degraded_response.headers()[header::CACHE_CONTROL]
    );
    assert_eq!(
        body_string(healthy_response).await,
        body_string(degraded_response).await
    );
}

#[tokio::test]
async fn test_second_read_is_cache_hit() {
    let db = empty_db().append_query_results([vec![category_row("c1", "coding")]]);
    let app = test_app(db, Arc::new(MemoryCacheStore::new()));

    let first = app.clone().oneshot(get("/api/categories")).await.unwrap();
    assert_eq!(first.headers()["x-cache"], "MISS");

    // The mock holds a single result set; a second query would fail.
    let second = app.oneshot(get("/api/categories")).await.unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(second.headers()["x-cache"], "HIT");
    assert_eq!(body_string(first).await, body_string(second).await);
}

#[tokio::test]
async fn test_if_none_match_returns_304() {
    let db = empty_db().append_query_results([vec![category_row("c1", "coding")]]);
    let app = test_app(db, Arc::new(MemoryCacheStore::new()));

    let first = app.clone().oneshot(get("/api/categories")).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let etag = first.headers()[header::ETAG].clone();
    assert!(etag.to_str().unwrap().starts_with("W/\""));

    let request = Request::builder()
        .uri("/api/categories")
        .header(header::IF_NONE_MATCH, etag.clone())
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
    assert_eq!(response.headers()[header::ETAG], etag);
    assert!(response.headers().get(header::CACHE_CONTROL).is_some());
    assert!(body_string(response).await.is_empty());
}

#[tokio::test]
async fn test_huge_page_number_is_clamped() {
    let db = empty_db().append_query_results([vec![
        btreemap! { "num_items" => Into::<Value>::into(0i64) },
    ]]);
    let app = test_app(db, Arc::new(MemoryCacheStore::new()));

    let response = app
        .oneshot(get("/api/prompts?page=18446744073709551615&limit=100"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["has_more"], false);
    assert_eq!(body["limit"], 100);
}

#[tokio::test]
async fn test_huge_page_number_lists_past_the_end() {
    let db = empty_db()
        .append_query_results([vec![btreemap! { "num_items" => Into::<Value>::into(5i64) }]])
        .append_query_results([Vec::<prompt::Model>::new()]);
    let app = test_app(db, Arc::new(MemoryCacheStore::new()));

    let response = app
        .oneshot(get("/api/prompts?page=18446744073709551615"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["total"], 5);
    assert_eq!(body["items"], serde_json::json!([]));
}

#[tokio::test]
async fn test_hidden_prompt_is_404_for_anonymous_on_cache_hit() {
    let store = seeded_store(&hidden_view("author1")).await;
    // No result sets: the cached copy must answer without touching the database.
    let app = test_app(empty_db(), store);

    let response = app.oneshot(get("/api/prompts/p1")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_hidden_prompt_is_404_for_other_users_on_cache_hit() {
    let store = seeded_store(&hidden_view("author1")).await;
    let db = empty_db().append_query_results([vec![user_row(user::Role::User)]]);
    let app = test_app(db, store);

    let response = app
        .oneshot(authed("GET", "/api/prompts/p1", Body::empty()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_hidden_prompt_gets_private_headers_for_author() {
    let store = seeded_store(&hidden_view("user1")).await;
    let db = empty_db().append_query_results([vec![user_row(user::Role::User)]]);
    let app = test_app(db, store);

    let response = app
        .oneshot(authed("GET", "/api/prompts/p1", Body::empty()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::CACHE_CONTROL], "private, max-age=300");
    assert_eq!(headers[header::VARY], "authorization, cookie");
    assert!(headers.get("cdn-cache-control").is_none());
    assert_eq!(headers["x-cache"], "HIT");
}

#[tokio::test]
async fn test_hidden_prompt_gets_private_headers_for_admin() {
    let store = seeded_store(&hidden_view("author1")).await;
    let db = empty_db().append_query_results([vec![user_row(user::Role::Admin)]]);
    let app = test_app(db, store);

    let response = app
        .oneshot(authed("GET", "/api/prompts/p1", Body::empty()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CACHE_CONTROL],
        "private, max-age=300"
    );
}

#[tokio::test]
async fn test_published_prompt_gets_public_headers() {
    let db = with_prompt(empty_db(), prompt_row("Hello", PromptStatus::Published));
    let app = test_app(db, Arc::new(MemoryCacheStore::new()));

    let response = app.oneshot(get("/api/prompts/p1")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let cache_control = response.headers()[header::CACHE_CONTROL].to_str().unwrap();
    assert!(cache_control.starts_with("public"));
    assert_eq!(response.headers()["x-cache"], "MISS");
}

#[tokio::test]
async fn test_update_invalidates_cached_prompt() {
    let old = prompt_row("Old title", PromptStatus::Published);
    let new = prompt::Model {
        title: "New title".to_string(),
        ..old.clone()
    };

    // First GET, then the admin's PUT (session, lookup, update, hydrate),
    // then the GET that follows invalidation.
    let db = with_prompt(empty_db(), old.clone())
        .append_query_results([vec![user_row(user::Role::Admin)]])
        .append_query_results([vec![old]]);
    let db = with_prompt(db, new.clone());
    let db = with_prompt(db, new);
    let app = test_app(db, Arc::new(MemoryCacheStore::new()));

    let first = app.clone().oneshot(get("/api/prompts/p1")).await.unwrap();
    assert_eq!(first.headers()["x-cache"], "MISS");
    let second = app.clone().oneshot(get("/api/prompts/p1")).await.unwrap();
    assert_eq!(second.headers()["x-cache"], "HIT");
    assert!(body_string(second).await.contains("Old title"));

    let update = app
        .clone()
        .oneshot(authed(
            "PUT",
            "/api/prompts/p1",
            Body::from(r#"{"title":"New title"}"#),
        ))
        .await
        .unwrap();
    assert_eq!(update.status(), StatusCode::OK);

    let after = app.oneshot(get("/api/prompts/p1")).await.unwrap();
    assert_eq!(after.status(), StatusCode::OK);
    assert_eq!(after.headers()["x-cache"], "MISS");
    let body = body_string(after).await;
    assert!(body.contains("New title"));
    assert!(!body.contains("Old title"));
}

#[tokio::test]
async fn test_delete_invalidates_cached_prompt() {
    let store = seeded_store(&hidden_view("user1")).await;
    let mut owned = prompt_row("Mine", PromptStatus::Reviewing);
    owned.author_id = "user1".to_string();
    let db = empty_db()
        .append_query_results([vec![user_row(user::Role::User)]])
        .append_query_results([vec![owned]])
        .append_query_results([Vec::<prompt_tag::Model>::new()])
        .append_exec_results([exec(1)]);
    let app = test_app(db, store.clone());

    let response = app
        .oneshot(authed("DELETE", "/api/prompts/p1", Body::empty()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(store.get("test:prompt:p1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_review_invalidates_cached_prompt() {
    let store = seeded_store(&hidden_view("author1")).await;
    let db = empty_db()
        .append_query_results([vec![user_row(user::Role::Admin)]])
        .append_query_results([vec![prompt_row("Draft", PromptStatus::Reviewing)]])
        .append_query_results([vec![review_row()]])
        .append_exec_results([exec(1)]);
    let app = test_app(db, store.clone());

    let response = app
        .oneshot(authed(
            "POST",
            "/api/admin/prompts/p1/review",
            Body::from(r#"{"status":"published"}"#),
        ))
        .await
        .unwrap();

    assert!(response.status().is_success());
    assert!(store.get("test:prompt:p1").await.unwrap().is_none());
}
