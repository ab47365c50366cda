use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            name                TEXT NOT NULL,
            occupation          TEXT NOT NULL,
            email               TEXT NOT NULL UNIQUE,
            password_hash       TEXT NOT NULL,
            avatar_file_name    TEXT,
            role                TEXT NOT NULL DEFAULT 'user',
            created_at          TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at          TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS campaigns (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id             INTEGER NOT NULL REFERENCES users(id),
            name                TEXT NOT NULL,
            short_description   TEXT NOT NULL,
            description         TEXT NOT NULL,
            perks               TEXT NOT NULL,
            backer_count        INTEGER NOT NULL DEFAULT 0,
            goal_amount         INTEGER NOT NULL,
            current_amount      INTEGER NOT NULL DEFAULT 0,
            slug                TEXT NOT NULL,
            created_at          TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at          TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_campaigns_user
            ON campaigns(user_id);

        CREATE TABLE IF NOT EXISTS campaign_images (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            campaign_id     INTEGER NOT NULL REFERENCES campaigns(id),
            file_name       TEXT NOT NULL,
            is_primary      INTEGER NOT NULL DEFAULT 0,
            created_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_campaign_images_campaign
            ON campaign_images(campaign_id);

        -- At most one primary image per campaign, enforced by the store as well
        CREATE UNIQUE INDEX IF NOT EXISTS idx_campaign_images_one_primary
            ON campaign_images(campaign_id) WHERE is_primary = 1;

        CREATE TABLE IF NOT EXISTS transactions (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            campaign_id     INTEGER NOT NULL REFERENCES campaigns(id),
            user_id         INTEGER NOT NULL REFERENCES users(id),
            amount          INTEGER NOT NULL,
            status          TEXT NOT NULL DEFAULT 'pending',
            code            TEXT NOT NULL DEFAULT '',
            payment_url     TEXT NOT NULL DEFAULT '',
            created_at      TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_transactions_campaign
            ON transactions(campaign_id, id);

        CREATE INDEX IF NOT EXISTS idx_transactions_user
            ON transactions(user_id, id);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
