//! Row mapping from SQLite result rows into `moyu-types` models.
//!
//! Every SELECT in `queries` lists its columns in the order these functions
//! read them; the `*_COLUMNS` constants keep the two in step.

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::Row;
use rusqlite::types::Type;
use tracing::warn;

use moyu_types::models::{Campaign, CampaignImage, Transaction, TransactionStatus, User};

pub const USER_COLUMNS: &str = "u.id, u.name, u.occupation, u.email, u.password_hash, \
     u.avatar_file_name, u.role, u.created_at, u.updated_at";

pub const CAMPAIGN_COLUMNS: &str = "c.id, c.user_id, c.name, c.short_description, \
     c.description, c.perks, c.backer_count, c.goal_amount, c.current_amount, c.slug, \
     c.created_at, c.updated_at";

pub const IMAGE_COLUMNS: &str = "i.id, i.campaign_id, i.file_name, i.is_primary, i.created_at";

pub const TRANSACTION_COLUMNS: &str = "t.id, t.campaign_id, t.user_id, t.amount, t.status, \
     t.code, t.payment_url, t.created_at, t.updated_at";

pub const USER_COLUMN_COUNT: usize = 9;
pub const CAMPAIGN_COLUMN_COUNT: usize = 12;
pub const TRANSACTION_COLUMN_COUNT: usize = 9;

/// SQLite stores `datetime('now')` as "YYYY-MM-DD HH:MM:SS" without a zone.
pub fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            DateTime::default()
        })
}

fn timestamp_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    Ok(parse_timestamp(&raw))
}

pub fn user_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(offset)?,
        name: row.get(offset + 1)?,
        occupation: row.get(offset + 2)?,
        email: row.get(offset + 3)?,
        password_hash: row.get(offset + 4)?,
        avatar_file_name: row.get(offset + 5)?,
        role: row.get(offset + 6)?,
        created_at: timestamp_at(row, offset + 7)?,
        updated_at: timestamp_at(row, offset + 8)?,
    })
}

pub fn campaign_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Campaign> {
    Ok(Campaign {
        id: row.get(offset)?,
        user_id: row.get(offset + 1)?,
        name: row.get(offset + 2)?,
        short_description: row.get(offset + 3)?,
        description: row.get(offset + 4)?,
        perks: row.get(offset + 5)?,
        backer_count: row.get(offset + 6)?,
        goal_amount: row.get(offset + 7)?,
        current_amount: row.get(offset + 8)?,
        slug: row.get(offset + 9)?,
        created_at: timestamp_at(row, offset + 10)?,
        updated_at: timestamp_at(row, offset + 11)?,
    })
}

pub fn image_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<CampaignImage> {
    Ok(CampaignImage {
        id: row.get(offset)?,
        campaign_id: row.get(offset + 1)?,
        file_name: row.get(offset + 2)?,
        is_primary: row.get(offset + 3)?,
        created_at: timestamp_at(row, offset + 4)?,
    })
}

pub fn transaction_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Transaction> {
    let status_idx = offset + 4;
    let raw_status: String = row.get(status_idx)?;
    let status = raw_status.parse::<TransactionStatus>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(status_idx, Type::Text, e.into())
    })?;

    Ok(Transaction {
        id: row.get(offset)?,
        campaign_id: row.get(offset + 1)?,
        user_id: row.get(offset + 2)?,
        amount: row.get(offset + 3)?,
        status,
        code: row.get(offset + 5)?,
        payment_url: row.get(offset + 6)?,
        created_at: timestamp_at(row, offset + 7)?,
        updated_at: timestamp_at(row, offset + 8)?,
    })
}
