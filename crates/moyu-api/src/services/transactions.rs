use tracing::{info, warn};

use moyu_db::Database;
use moyu_types::api::{PaymentNotification, TransactionRequest};
use moyu_types::models::{CampaignTransaction, Transaction, User, UserTransaction};

use super::ownership::OwnershipCheck;
use super::{ServiceError, ServiceResult, run_blocking};
use crate::payment::{self, PaymentRequest};
use crate::state::AppState;

/// Transactions of a campaign, visible only to the campaign's owner.
///
/// A missing campaign is `NotFound` and a foreign one is `Forbidden`; in
/// neither case is any transaction read.
pub fn for_campaign(
    db: &Database,
    campaign_id: i64,
    actor: &User,
) -> ServiceResult<Vec<CampaignTransaction>> {
    let campaign = db.get_campaign(campaign_id)?.owned_by(actor, "campaign")?;
    Ok(db.get_campaign_transactions(campaign.id)?)
}

pub fn for_user(db: &Database, actor: &User) -> ServiceResult<Vec<UserTransaction>> {
    Ok(db.get_user_transactions(actor.id)?)
}

/// Insert a pending pledge. The campaign must exist.
pub fn create_pending(db: &Database, req: &TransactionRequest, actor: &User) -> ServiceResult<Transaction> {
    req.validate().map_err(ServiceError::Validation)?;

    if db.get_campaign(req.campaign_id)?.is_none() {
        return Err(ServiceError::NotFound("campaign"));
    }

    let tx = db.create_transaction(req.campaign_id, actor.id, req.amount)?;
    info!(
        "User {} pledged {} to campaign {} ({})",
        actor.id, tx.amount, tx.campaign_id, tx.code
    );
    Ok(tx)
}

/// Create a pledge and attach the provider's payment URL.
///
/// If the provider fails the pledge stays `pending` without a URL and the
/// caller gets `Upstream`.
pub async fn create(state: &AppState, req: TransactionRequest, actor: User) -> ServiceResult<Transaction> {
    let backer = actor.clone();
    let pending = run_blocking(state, move |db| create_pending(db, &req, &backer)).await?;

    let payment_req = PaymentRequest {
        order_id: pending.code.clone(),
        amount: pending.amount,
        customer_name: actor.name,
        customer_email: actor.email,
    };
    let url = state
        .payment
        .payment_url(&payment_req)
        .await
        .map_err(ServiceError::Upstream)?;

    let id = pending.id;
    run_blocking(state, move |db| {
        db.set_payment_url(id, &url)?
            .ok_or(ServiceError::NotFound("transaction"))
    })
    .await
}

/// Apply a provider notification. Returns the transaction after the update.
///
/// When `server_key` is set, the notification's signature must match.
pub fn process_notification(
    db: &Database,
    notification: &PaymentNotification,
    server_key: Option<&str>,
) -> ServiceResult<Transaction> {
    if let Some(key) = server_key {
        if !payment::verify_signature(notification, key) {
            warn!("Rejected notification for order '{}': bad signature", notification.order_id);
            return Err(ServiceError::BadNotification("signature mismatch".into()));
        }
    }

    let id = payment::parse_order_id(&notification.order_id).ok_or_else(|| {
        ServiceError::BadNotification(format!("unknown order id '{}'", notification.order_id))
    })?;

    let Some(status) = payment::status_from_notification(notification) else {
        info!(
            "Order {} notification '{}' leaves status unchanged",
            id, notification.transaction_status
        );
        return db.get_transaction(id)?.ok_or(ServiceError::NotFound("transaction"));
    };

    let change = db
        .apply_transaction_status(id, status)?
        .ok_or(ServiceError::NotFound("transaction"))?;

    if change.became_paid {
        info!(
            "Transaction {} paid; campaign {} credited {}",
            id, change.transaction.campaign_id, change.transaction.amount
        );
    } else if change.left_paid {
        warn!(
            "Transaction {} no longer paid ({}); campaign {} debited {}",
            id, change.transaction.status, change.transaction.campaign_id, change.transaction.amount
        );
    }
    Ok(change.transaction)
}
