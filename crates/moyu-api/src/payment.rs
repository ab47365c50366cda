//! Payment provider client and webhook helpers.
//!
//! The provider speaks the Snap protocol: we POST an order and receive a
//! redirect URL for the backer; the provider later POSTs a notification with
//! the order's status, signed with our server key.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha512};
use tracing::{info, warn};

use moyu_types::api::PaymentNotification;
use moyu_types::models::TransactionStatus;

pub const SNAP_SANDBOX_URL: &str = "https://app.sandbox.midtrans.com/snap/v1/transactions";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub order_id: String,
    pub amount: i64,
    pub customer_name: String,
    pub customer_email: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// URL the backer visits to pay for the order.
    async fn payment_url(&self, req: &PaymentRequest) -> Result<String>;
}

pub struct SnapGateway {
    client: reqwest::Client,
    server_key: String,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct SnapResponse {
    redirect_url: Option<String>,
}

impl SnapGateway {
    pub fn new(server_key: impl Into<String>, endpoint: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("building payment HTTP client")?;
        Ok(Self {
            client,
            server_key: server_key.into(),
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl PaymentGateway for SnapGateway {
    async fn payment_url(&self, req: &PaymentRequest) -> Result<String> {
        let body = json!({
            "transaction_details": {
                "order_id": req.order_id,
                "gross_amount": req.amount,
            },
            "customer_details": {
                "first_name": req.customer_name,
                "email": req.customer_email,
            },
        });

        let resp = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.server_key, Some(""))
            .json(&body)
            .send()
            .await
            .context("sending payment request")?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            bail!("payment provider returned {}: {}", status, text);
        }

        let parsed: SnapResponse = resp.json().await.context("decoding payment response")?;
        let url = parsed
            .redirect_url
            .filter(|u| !u.is_empty())
            .context("payment response has no redirect_url")?;

        info!("Payment URL issued for order {}", req.order_id);
        Ok(url)
    }
}

/// Used when no server key is configured: orders are accepted without a
/// payment URL.
pub struct OfflineGateway;

#[async_trait]
impl PaymentGateway for OfflineGateway {
    async fn payment_url(&self, req: &PaymentRequest) -> Result<String> {
        warn!("Payment gateway offline; order {} has no payment URL", req.order_id);
        Ok(String::new())
    }
}

/// Map a provider notification onto our status. `None` means "leave as is".
pub fn status_from_notification(n: &PaymentNotification) -> Option<TransactionStatus> {
    match n.transaction_status.as_str() {
        "capture" if n.payment_type == "credit_card" && n.fraud_status == "accept" => {
            Some(TransactionStatus::Paid)
        }
        "settlement" => Some(TransactionStatus::Paid),
        "deny" | "expire" | "cancel" => Some(TransactionStatus::Cancelled),
        _ => None,
    }
}

/// Accepts both bare ids and our `ORDER-<id>` codes.
pub fn parse_order_id(order_id: &str) -> Option<i64> {
    let raw = order_id.trim();
    let digits = raw.strip_prefix("ORDER-").unwrap_or(raw);
    digits.parse::<i64>().ok().filter(|id| *id > 0)
}

/// hex(SHA-512(order_id + status_code + gross_amount + server_key))
pub fn notification_signature(
    order_id: &str,
    status_code: &str,
    gross_amount: &str,
    server_key: &str,
) -> String {
    let mut hasher = Sha512::new();
    hasher.update(order_id.as_bytes());
    hasher.update(status_code.as_bytes());
    hasher.update(gross_amount.as_bytes());
    hasher.update(server_key.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn verify_signature(n: &PaymentNotification, server_key: &str) -> bool {
    let expected = notification_signature(&n.order_id, &n.status_code, &n.gross_amount, server_key);
    n.signature_key
        .as_deref()
        .is_some_and(|given| given.eq_ignore_ascii_case(&expected))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification(status: &str, payment_type: &str, fraud: &str) -> PaymentNotification {
        PaymentNotification {
            transaction_status: status.into(),
            order_id: "ORDER-7".into(),
            payment_type: payment_type.into(),
            fraud_status: fraud.into(),
            status_code: "200".into(),
            gross_amount: "50000.00".into(),
            signature_key: None,
        }
    }

    #[test]
    fn status_mapping() {
        use TransactionStatus::*;
        assert_eq!(status_from_notification(&notification("capture", "credit_card", "accept")), Some(Paid));
        assert_eq!(status_from_notification(&notification("capture", "credit_card", "challenge")), None);
        assert_eq!(status_from_notification(&notification("capture", "gopay", "accept")), None);
        assert_eq!(status_from_notification(&notification("settlement", "bank_transfer", "")), Some(Paid));
        assert_eq!(status_from_notification(&notification("deny", "", "")), Some(Cancelled));
        assert_eq!(status_from_notification(&notification("expire", "", "")), Some(Cancelled));
        assert_eq!(status_from_notification(&notification("cancel", "", "")), Some(Cancelled));
        assert_eq!(status_from_notification(&notification("pending", "", "")), None);
    }

    #[test]
    fn order_ids() {
        assert_eq!(parse_order_id("ORDER-12"), Some(12));
        assert_eq!(parse_order_id("12"), Some(12));
        assert_eq!(parse_order_id("ORDER-"), None);
        assert_eq!(parse_order_id("ORDER-0"), None);
        assert_eq!(parse_order_id("abc"), None);
    }

    #[test]
    fn signature_check() {
        let mut n = notification("settlement", "bank_transfer", "");
        assert!(!verify_signature(&n, "server-key"));

        n.signature_key = Some(notification_signature("ORDER-7", "200", "50000.00", "server-key"));
        assert!(verify_signature(&n, "server-key"));
        assert!(!verify_signature(&n, "another-key"));
    }

    #[test]
    fn signature_is_sha512_hex() {
        let sig = notification_signature("1", "200", "10.00", "k");
        assert_eq!(sig.len(), 128);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
