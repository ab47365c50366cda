use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered account. Also the "actor" of every authenticated request.
///
/// Deliberately not `Serialize`: the password hash must never reach a
/// response body. Use [`crate::api::UserResponse`] instead.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub occupation: String,
    pub email: String,
    pub password_hash: String,
    pub avatar_file_name: Option<String>,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub short_description: String,
    pub description: String,
    pub perks: String,
    pub backer_count: i64,
    pub goal_amount: i64,
    pub current_amount: i64,
    pub slug: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Campaign {
    /// Perks are stored comma-separated; blank entries are dropped.
    pub fn perk_list(&self) -> Vec<String> {
        self.perks
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignImage {
    pub id: i64,
    pub campaign_id: i64,
    pub file_name: String,
    pub is_primary: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Paid,
    Cancelled,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Paid => "paid",
            TransactionStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransactionStatus::Pending),
            "paid" => Ok(TransactionStatus::Paid),
            "cancelled" => Ok(TransactionStatus::Cancelled),
            other => Err(format!("unknown transaction status '{}'", other)),
        }
    }
}

/// A pledge from a backer to a campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub campaign_id: i64,
    pub user_id: i64,
    pub amount: i64,
    pub status: TransactionStatus,
    pub code: String,
    pub payment_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A transaction on a campaign, joined with the backer's display name.
#[derive(Debug, Clone, PartialEq)]
pub struct CampaignTransaction {
    pub transaction: Transaction,
    pub backer_name: String,
}

/// A transaction made by a backer, joined with the campaign it funds.
#[derive(Debug, Clone, PartialEq)]
pub struct UserTransaction {
    pub transaction: Transaction,
    pub campaign_name: String,
    pub campaign_image: Option<String>,
}
