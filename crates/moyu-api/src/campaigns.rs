use axum::{
    extract::{Multipart, Query, State, rejection::QueryRejection},
    response::IntoResponse,
};
use serde_json::json;
use tracing::{error, info, warn};

use moyu_types::api::{CampaignListQuery, CampaignRequest, CampaignSummary, UploadResponse};

use crate::error::ApiError;
use crate::extract::{JsonBody, ResourceId, UploadForm, parse_form_bool};
use crate::middleware::CurrentUser;
use crate::response::ok;
use crate::services::{campaigns, run_blocking};
use crate::state::AppState;

/// GET /api/v1/campaigns[?user_id=N]
pub async fn list_campaigns(
    State(state): State<AppState>,
    query: Result<Query<CampaignListQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    const FAILED: &str = "Failed to get campaigns";

    let Query(query) = query.map_err(|_| ApiError::bad_request(FAILED))?;
    let campaigns = run_blocking(&state, move |db| campaigns::list(db, query.user_id))
        .await
        .map_err(|e| ApiError::from_service(FAILED, e))?;

    Ok(ok("Successfully get list of campaigns", campaigns))
}

/// GET /api/v1/campaigns/{id}
pub async fn get_campaign(
    State(state): State<AppState>,
    ResourceId(id): ResourceId,
) -> Result<impl IntoResponse, ApiError> {
    let detail = run_blocking(&state, move |db| campaigns::detail(db, id))
        .await
        .map_err(|e| ApiError::from_service("Failed to get campaign detail", e))?;

    Ok(ok("Successfully get campaign detail", detail))
}

/// POST /api/v1/campaigns
pub async fn create_campaign(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    JsonBody(req): JsonBody<CampaignRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let campaign = run_blocking(&state, move |db| campaigns::create(db, &req, &user))
        .await
        .map_err(|e| ApiError::from_service("Failed to create campaign", e))?;

    Ok(ok("Successfully created campaign", CampaignSummary::new(&campaign, None)))
}

/// PUT /api/v1/campaigns/{id}
///
/// Owner only.
pub async fn update_campaign(
    State(state): State<AppState>,
    ResourceId(id): ResourceId,
    CurrentUser(user): CurrentUser,
    JsonBody(req): JsonBody<CampaignRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let campaign = run_blocking(&state, move |db| campaigns::update(db, id, &req, &user))
        .await
        .map_err(|e| ApiError::from_service("Failed to update campaign", e))?;

    Ok(ok("Successfully updated campaign", CampaignSummary::new(&campaign, None)))
}

/// POST /api/v1/campaign-images
///
/// Multipart with `campaign_id`, `is_primary` and a `file` field. Owner only.
pub async fn upload_image(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    const FAILED: &str = "Failed to upload campaign image";
    let not_uploaded = || json!({ "is_uploaded": false });

    let form = UploadForm::read(multipart, "file").await.map_err(|e| {
        info!("Campaign image upload from user {} unreadable: {}", user.id, e);
        ApiError::bad_request_with(FAILED, not_uploaded())
    })?;

    let mut errors = Vec::new();
    let campaign_id = form.field("campaign_id").and_then(|v| v.parse::<i64>().ok()).filter(|id| *id > 0);
    if campaign_id.is_none() {
        errors.push("campaign_id is required".to_string());
    }
    let is_primary = parse_form_bool(form.field("is_primary"));
    if is_primary.is_none() {
        errors.push("is_primary must be a boolean".to_string());
    }
    let (Some(campaign_id), Some(is_primary)) = (campaign_id, is_primary) else {
        return Err(ApiError::validation(FAILED, errors));
    };

    let file = form
        .file
        .ok_or_else(|| ApiError::bad_request_with(FAILED, not_uploaded()))?;

    // Check ownership before anything touches the disk.
    let owner = user.clone();
    run_blocking(&state, move |db| campaigns::owned_by(db, campaign_id, &owner))
        .await
        .map_err(|e| ApiError::from_service(FAILED, e))?;

    let path = state
        .uploads
        .save_campaign_image(user.id, &file.file_name, &file.bytes)
        .await
        .map_err(|e| {
            error!("Saving image for campaign {} failed: {:#}", campaign_id, e);
            ApiError::bad_request_with(FAILED, not_uploaded())
        })?;

    let stored = path.clone();
    let saved = run_blocking(&state, move |db| {
        campaigns::save_image(db, campaign_id, is_primary, &user, &stored)
    })
    .await;
    if let Err(e) = saved {
        discard_upload(&state, &path).await;
        return Err(ApiError::from_service(FAILED, e));
    }

    Ok(ok("Campaign image successfully uploaded", UploadResponse { is_uploaded: true }))
}

/// Remove a stored file whose database row could not be written.
pub(crate) async fn discard_upload(state: &AppState, path: &str) {
    if let Err(e) = state.uploads.remove(path).await {
        warn!("Orphaned upload {} left on disk: {:#}", path, e);
    }
}
