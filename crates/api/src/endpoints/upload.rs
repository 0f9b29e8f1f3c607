//! Image upload endpoint.

use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart, State},
    response::Response,
    routing::post,
};
use prompthub_common::{AppError, AppResult};

use crate::{extractors::AuthUser, middleware::AppState, response::created};

/// Request body cap. Larger than the image limit so oversized files reach
/// the size check and get a 400 rather than a transport error.
const UPLOAD_BODY_LIMIT: usize = 4 * 1024 * 1024;

const FILE_FIELD: &str = "file";

/// Accept one image in the multipart `file` field, normalize and store it.
async fn upload(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    mut multipart: Multipart,
) -> AppResult<Response> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read upload: {e}")))?;

        let image = state
            .media_service
            .upload(&user.id, data.to_vec(), &content_type)
            .await?;
        return Ok(created(image));
    }

    Err(AppError::BadRequest(format!(
        "Missing `{FILE_FIELD}` field"
    )))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/upload", post(upload))
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT))
}
