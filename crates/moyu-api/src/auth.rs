use axum::{
    extract::{Multipart, State},
    response::IntoResponse,
};
use serde_json::json;
use tracing::{error, info};

use moyu_types::api::{
    EmailAvailability, EmailCheckRequest, LoginRequest, RegisterRequest, UploadResponse,
    UserResponse,
};

use crate::campaigns::discard_upload;
use crate::error::ApiError;
use crate::extract::{JsonBody, UploadForm};
use crate::middleware::CurrentUser;
use crate::response::ok;
use crate::services::{run_blocking, users};
use crate::state::AppState;

fn issue_token(state: &AppState, user_id: i64, failure: &str) -> Result<String, ApiError> {
    state.tokens.generate(user_id).map_err(|e| {
        error!("Token generation for user {} failed: {}", user_id, e);
        ApiError::bad_request(failure)
    })
}

/// POST /api/v1/users
pub async fn register_user(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    const FAILED: &str = "Register account failed";

    let user = run_blocking(&state, move |db| users::register(db, &req))
        .await
        .map_err(|e| ApiError::from_service(FAILED, e))?;

    let token = issue_token(&state, user.id, FAILED)?;
    Ok(ok("Account has been registered", UserResponse::new(&user, token)))
}

/// POST /api/v1/sessions
pub async fn login(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    const FAILED: &str = "Login failed";

    let user = run_blocking(&state, move |db| users::login(db, &req))
        .await
        .map_err(|e| ApiError::from_service(FAILED, e))?;

    let token = issue_token(&state, user.id, FAILED)?;
    info!("User {} logged in", user.id);
    Ok(ok("Successfully logged in", UserResponse::new(&user, token)))
}

/// POST /api/v1/email_checkers
pub async fn check_email(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<EmailCheckRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let is_available = run_blocking(&state, move |db| users::is_email_available(db, &req))
        .await
        .map_err(|e| ApiError::from_service("Email checking failed", e))?;

    let message = if is_available {
        "Email is available"
    } else {
        "Email has been registered"
    };
    Ok(ok(message, EmailAvailability { is_available }))
}

/// POST /api/v1/avatars
///
/// Multipart with an `avatar` file field.
pub async fn upload_avatar(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    const FAILED: &str = "Failed to upload avatar image";
    let not_uploaded = || json!({ "is_uploaded": false });

    let form = UploadForm::read(multipart, "avatar").await.map_err(|e| {
        info!("Avatar upload from user {} unreadable: {}", user.id, e);
        ApiError::bad_request_with(FAILED, not_uploaded())
    })?;
    let file = form
        .file
        .ok_or_else(|| ApiError::bad_request_with(FAILED, not_uploaded()))?;

    let path = state
        .uploads
        .save_avatar(user.id, &file.file_name, &file.bytes)
        .await
        .map_err(|e| {
            error!("Saving avatar for user {} failed: {:#}", user.id, e);
            ApiError::bad_request_with(FAILED, not_uploaded())
        })?;

    let user_id = user.id;
    let stored = path.clone();
    let saved = run_blocking(&state, move |db| users::save_avatar(db, user_id, &stored)).await;
    if let Err(e) = saved {
        discard_upload(&state, &path).await;
        return Err(ApiError::from_service(FAILED, e));
    }

    Ok(ok("Avatar successfully uploaded", UploadResponse { is_uploaded: true }))
}

/// GET /api/v1/users/fetch
pub async fn fetch_user(CurrentUser(user): CurrentUser) -> impl IntoResponse {
    ok("Successfully fetch user data", UserResponse::new(&user, ""))
}
