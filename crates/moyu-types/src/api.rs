use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{
    Campaign, CampaignImage, CampaignTransaction, Transaction, User, UserTransaction,
};

const MIN_PASSWORD_LEN: usize = 8;

/// Largest goal or pledge accepted. Keeps campaign totals far from `i64::MAX`.
pub const MAX_AMOUNT: i64 = 1_000_000_000_000;

fn require(errors: &mut Vec<String>, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.push(format!("{} is required", field));
    }
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

fn into_result(errors: Vec<String>) -> Result<(), Vec<String>> {
    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

// -- Users --

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterRequest {
    pub name: String,
    pub occupation: String,
    pub email: String,
    pub password: String,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        require(&mut errors, "name", &self.name);
        require(&mut errors, "occupation", &self.occupation);
        require(&mut errors, "email", &self.email);
        if !self.email.trim().is_empty() && !looks_like_email(self.email.trim()) {
            errors.push("email must be a valid email address".to_string());
        }
        if self.password.len() < MIN_PASSWORD_LEN {
            errors.push(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LEN
            ));
        }
        into_result(errors)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        require(&mut errors, "email", &self.email);
        require(&mut errors, "password", &self.password);
        into_result(errors)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EmailCheckRequest {
    pub email: String,
}

impl EmailCheckRequest {
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        require(&mut errors, "email", &self.email);
        if !self.email.trim().is_empty() && !looks_like_email(self.email.trim()) {
            errors.push("email must be a valid email address".to_string());
        }
        into_result(errors)
    }
}

#[derive(Debug, Serialize)]
pub struct EmailAvailability {
    pub is_available: bool,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub name: String,
    pub occupation: String,
    pub email: String,
    pub token: String,
    pub image_url: String,
}

impl UserResponse {
    pub fn new(user: &User, token: impl Into<String>) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            occupation: user.occupation.clone(),
            email: user.email.clone(),
            token: token.into(),
            image_url: user.avatar_file_name.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub is_uploaded: bool,
}

// -- Campaigns --

#[derive(Debug, Default, Deserialize)]
pub struct CampaignListQuery {
    pub user_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CampaignRequest {
    pub name: String,
    pub short_description: String,
    pub description: String,
    pub goal_amount: i64,
    pub perks: String,
}

impl CampaignRequest {
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        require(&mut errors, "name", &self.name);
        require(&mut errors, "short_description", &self.short_description);
        require(&mut errors, "description", &self.description);
        require(&mut errors, "perks", &self.perks);
        if self.goal_amount <= 0 {
            errors.push("goal_amount must be greater than zero".to_string());
        } else if self.goal_amount > MAX_AMOUNT {
            errors.push(format!("goal_amount must not exceed {}", MAX_AMOUNT));
        }
        into_result(errors)
    }
}

#[derive(Debug, Serialize)]
pub struct CampaignSummary {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub short_description: String,
    pub image_url: String,
    pub goal_amount: i64,
    pub current_amount: i64,
    pub backer_count: i64,
    pub slug: String,
}

impl CampaignSummary {
    pub fn new(campaign: &Campaign, primary_image: Option<&str>) -> Self {
        Self {
            id: campaign.id,
            user_id: campaign.user_id,
            name: campaign.name.clone(),
            short_description: campaign.short_description.clone(),
            image_url: primary_image.unwrap_or_default().to_string(),
            goal_amount: campaign.goal_amount,
            current_amount: campaign.current_amount,
            backer_count: campaign.backer_count,
            slug: campaign.slug.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CampaignOwner {
    pub name: String,
    pub image_url: String,
}

#[derive(Debug, Serialize)]
pub struct CampaignImageResponse {
    pub image_url: String,
    pub is_primary: bool,
}

#[derive(Debug, Serialize)]
pub struct CampaignDetail {
    pub id: i64,
    pub name: String,
    pub short_description: String,
    pub description: String,
    pub image_url: String,
    pub goal_amount: i64,
    pub current_amount: i64,
    pub backer_count: i64,
    pub user_id: i64,
    pub slug: String,
    pub perks: Vec<String>,
    pub user: CampaignOwner,
    pub images: Vec<CampaignImageResponse>,
}

impl CampaignDetail {
    pub fn new(campaign: &Campaign, owner: &User, images: &[CampaignImage]) -> Self {
        let image_url = images
            .iter()
            .find(|img| img.is_primary)
            .map(|img| img.file_name.clone())
            .unwrap_or_default();

        Self {
            id: campaign.id,
            name: campaign.name.clone(),
            short_description: campaign.short_description.clone(),
            description: campaign.description.clone(),
            image_url,
            goal_amount: campaign.goal_amount,
            current_amount: campaign.current_amount,
            backer_count: campaign.backer_count,
            user_id: campaign.user_id,
            slug: campaign.slug.clone(),
            perks: campaign.perk_list(),
            user: CampaignOwner {
                name: owner.name.clone(),
                image_url: owner.avatar_file_name.clone().unwrap_or_default(),
            },
            images: images
                .iter()
                .map(|img| CampaignImageResponse {
                    image_url: img.file_name.clone(),
                    is_primary: img.is_primary,
                })
                .collect(),
        }
    }
}

// -- Transactions --

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TransactionRequest {
    pub campaign_id: i64,
    pub amount: i64,
}

impl TransactionRequest {
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if self.campaign_id <= 0 {
            errors.push("campaign_id is required".to_string());
        }
        if self.amount <= 0 {
            errors.push("amount must be greater than zero".to_string());
        } else if self.amount > MAX_AMOUNT {
            errors.push(format!("amount must not exceed {}", MAX_AMOUNT));
        }
        into_result(errors)
    }
}

/// Payment provider webhook body. Providers send every field as a string.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct PaymentNotification {
    pub transaction_status: String,
    pub order_id: String,
    pub payment_type: String,
    pub fraud_status: String,
    pub status_code: String,
    pub gross_amount: String,
    pub signature_key: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CampaignTransactionResponse {
    pub id: i64,
    pub name: String,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

impl From<&CampaignTransaction> for CampaignTransactionResponse {
    fn from(row: &CampaignTransaction) -> Self {
        Self {
            id: row.transaction.id,
            name: row.backer_name.clone(),
            amount: row.transaction.amount,
            created_at: row.transaction.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TransactionCampaign {
    pub name: String,
    pub image_url: String,
}

#[derive(Debug, Serialize)]
pub struct UserTransactionResponse {
    pub id: i64,
    pub amount: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub campaign: TransactionCampaign,
}

impl From<&UserTransaction> for UserTransactionResponse {
    fn from(row: &UserTransaction) -> Self {
        Self {
            id: row.transaction.id,
            amount: row.transaction.amount,
            status: row.transaction.status.to_string(),
            created_at: row.transaction.created_at,
            campaign: TransactionCampaign {
                name: row.campaign_name.clone(),
                image_url: row.campaign_image.clone().unwrap_or_default(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    pub id: i64,
    pub campaign_id: i64,
    pub user_id: i64,
    pub amount: i64,
    pub status: String,
    pub code: String,
    pub payment_url: String,
}

impl From<&Transaction> for TransactionResponse {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: tx.id,
            campaign_id: tx.campaign_id,
            user_id: tx.user_id,
            amount: tx.amount,
            status: tx.status.to_string(),
            code: tx.code.clone(),
            payment_url: tx.payment_url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_reports_every_missing_field() {
        let errors = RegisterRequest::default().validate().unwrap_err();
        assert!(errors.contains(&"name is required".to_string()));
        assert!(errors.contains(&"occupation is required".to_string()));
        assert!(errors.contains(&"email is required".to_string()));
        assert!(errors.iter().any(|e| e.starts_with("password")));
    }

    #[test]
    fn register_rejects_malformed_email() {
        let req = RegisterRequest {
            name: "Ana".into(),
            occupation: "Baker".into(),
            email: "ana.example.com".into(),
            password: "correct horse".into(),
        };
        assert_eq!(
            req.validate().unwrap_err(),
            vec!["email must be a valid email address".to_string()]
        );
    }

    #[test]
    fn campaign_goal_must_be_positive() {
        let req = CampaignRequest {
            name: "Ovens".into(),
            short_description: "New ovens".into(),
            description: "Two ovens for the bakery".into(),
            goal_amount: 0,
            perks: "bread, cake".into(),
        };
        assert_eq!(
            req.validate().unwrap_err(),
            vec!["goal_amount must be greater than zero".to_string()]
        );
    }

    #[test]
    fn amounts_are_capped() {
        let pledge = |amount| TransactionRequest { campaign_id: 1, amount };
        assert!(pledge(MAX_AMOUNT).validate().is_ok());
        assert_eq!(
            pledge(MAX_AMOUNT + 1).validate().unwrap_err(),
            vec![format!("amount must not exceed {}", MAX_AMOUNT)]
        );
        assert!(pledge(i64::MAX).validate().is_err());

        let campaign = CampaignRequest {
            name: "Ovens".into(),
            short_description: "New ovens".into(),
            description: "Two ovens for the bakery".into(),
            goal_amount: i64::MAX,
            perks: "bread".into(),
        };
        assert!(campaign.validate().is_err());
    }

    #[test]
    fn email_shape() {
        assert!(looks_like_email("a@b.co"));
        assert!(!looks_like_email("a@b"));
        assert!(!looks_like_email("@b.co"));
        assert!(!looks_like_email("a@@b.co"));
        assert!(!looks_like_email("a@.co"));
    }
}
