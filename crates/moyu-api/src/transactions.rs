use axum::{extract::State, response::IntoResponse};
use tracing::{info, warn};

use moyu_types::api::{
    CampaignTransactionResponse, PaymentNotification, TransactionRequest, TransactionResponse,
    UserTransactionResponse,
};

use crate::error::ApiError;
use crate::extract::{JsonBody, ResourceId};
use crate::middleware::CurrentUser;
use crate::response::ok;
use crate::services::{ServiceError, run_blocking, transactions};
use crate::state::AppState;

/// GET /api/v1/campaigns/{id}/transactions
///
/// Campaign owner only.
///
/// A missing campaign and a campaign owned by someone else produce the same
/// response; the distinction is kept in the log.
pub async fn campaign_transactions(
    State(state): State<AppState>,
    ResourceId(campaign_id): ResourceId,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    const FAILED: &str = "Failed to get campaign's transactions";

    let actor_id = user.id;
    let rows = run_blocking(&state, move |db| transactions::for_campaign(db, campaign_id, &user))
        .await
        .map_err(|e| match e {
            ServiceError::NotFound(_) | ServiceError::Forbidden(_) => {
                warn!(
                    "User {} denied transactions of campaign {}: {}",
                    actor_id, campaign_id, e
                );
                ApiError::bad_request(FAILED)
            }
            other => ApiError::from_service(FAILED, other),
        })?;

    let data: Vec<CampaignTransactionResponse> = rows.iter().map(Into::into).collect();
    Ok(ok("Successfully get campaign's transactions", data))
}

/// GET /api/v1/transactions
///
/// The caller's own pledges.
pub async fn user_transactions(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    let rows = run_blocking(&state, move |db| transactions::for_user(db, &user))
        .await
        .map_err(|e| ApiError::from_service("Failed to get user's transactions", e))?;

    let data: Vec<UserTransactionResponse> = rows.iter().map(Into::into).collect();
    Ok(ok("Successfully get user's transactions", data))
}

/// POST /api/v1/transactions
pub async fn create_transaction(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    JsonBody(req): JsonBody<TransactionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let tx = transactions::create(&state, req, user)
        .await
        .map_err(|e| ApiError::from_service("Failed to create transaction", e))?;

    Ok(ok("Successfully created transaction", TransactionResponse::from(&tx)))
}

/// POST /api/v1/transactions/notify
///
/// Payment provider webhook, no auth.
pub async fn payment_notification(
    State(state): State<AppState>,
    JsonBody(notification): JsonBody<PaymentNotification>,
) -> Result<impl IntoResponse, ApiError> {
    const FAILED: &str = "Failed to process notification";

    info!(
        "Payment notification for order '{}': {}",
        notification.order_id, notification.transaction_status
    );

    let server_key = state.payment_server_key.clone();
    let tx = run_blocking(&state, move |db| {
        transactions::process_notification(db, &notification, server_key.as_deref())
    })
    .await
    .map_err(|e| match e {
        ServiceError::NotFound(_) => ApiError::bad_request(FAILED),
        other => ApiError::from_service(FAILED, other),
    })?;

    Ok(ok("Notification processed", TransactionResponse::from(&tx)))
}
