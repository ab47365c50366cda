use crate::Database;
use crate::models::{
    CAMPAIGN_COLUMNS, CAMPAIGN_COLUMN_COUNT, IMAGE_COLUMNS, TRANSACTION_COLUMNS,
    TRANSACTION_COLUMN_COUNT, USER_COLUMNS, campaign_from_row, image_from_row,
    transaction_from_row, user_from_row,
};
use anyhow::{Result, anyhow};
use moyu_types::models::{
    Campaign, CampaignImage, CampaignTransaction, Transaction, TransactionStatus, User,
    UserTransaction,
};
use rusqlite::{Connection, params};

pub struct NewUser<'a> {
    pub name: &'a str,
    pub occupation: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
}

/// Owner-editable campaign columns, shared by create and update.
pub struct CampaignFields<'a> {
    pub name: &'a str,
    pub short_description: &'a str,
    pub description: &'a str,
    pub perks: &'a str,
    pub goal_amount: i64,
}

/// Result of applying a payment status to a transaction.
#[derive(Debug)]
pub struct StatusChange {
    pub transaction: Transaction,
    /// True only when this call moved the transaction into `paid`.
    pub became_paid: bool,
    /// True only when this call moved the transaction out of `paid`.
    pub left_paid: bool,
}

impl Database {
    // -- Users --

    pub fn create_user(&self, user: &NewUser<'_>) -> Result<User> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (name, occupation, email, password_hash) VALUES (?1, ?2, ?3, ?4)",
                (user.name, user.occupation, user.email, user.password_hash),
            )?;
            let id = conn.last_insert_rowid();
            query_user_by_id(conn, id)?.ok_or_else(|| anyhow!("User {} vanished after insert", id))
        })
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<User>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM users u WHERE u.email = ?1", USER_COLUMNS);
            conn.query_row(&sql, [email], |row| user_from_row(row, 0)).optional()
        })
    }

    pub fn update_avatar(&self, id: i64, file_name: &str) -> Result<Option<User>> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE users SET avatar_file_name = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![file_name, id],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_user_by_id(conn, id)
        })
    }

    // -- Campaigns --

    pub fn create_campaign(
        &self,
        user_id: i64,
        fields: &CampaignFields<'_>,
        slug: &str,
    ) -> Result<Campaign> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO campaigns (user_id, name, short_description, description, perks, goal_amount, slug)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    user_id,
                    fields.name,
                    fields.short_description,
                    fields.description,
                    fields.perks,
                    fields.goal_amount,
                    slug,
                ],
            )?;
            let id = conn.last_insert_rowid();
            query_campaign(conn, id)?.ok_or_else(|| anyhow!("Campaign {} vanished after insert", id))
        })
    }

    pub fn get_campaign(&self, id: i64) -> Result<Option<Campaign>> {
        self.with_conn(|conn| query_campaign(conn, id))
    }

    /// Campaigns with their primary image, optionally restricted to one owner.
    pub fn list_campaigns(&self, owner_id: Option<i64>) -> Result<Vec<(Campaign, Option<String>)>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {}, i.file_name
                 FROM campaigns c
                 LEFT JOIN campaign_images i ON i.campaign_id = c.id AND i.is_primary = 1
                 WHERE ?1 IS NULL OR c.user_id = ?1
                 ORDER BY c.id",
                CAMPAIGN_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([owner_id], |row| {
                    Ok((campaign_from_row(row, 0)?, row.get(CAMPAIGN_COLUMN_COUNT)?))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_campaign(&self, id: i64, fields: &CampaignFields<'_>) -> Result<Option<Campaign>> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE campaigns
                 SET name = ?1, short_description = ?2, description = ?3, perks = ?4,
                     goal_amount = ?5, updated_at = datetime('now')
                 WHERE id = ?6",
                params![
                    fields.name,
                    fields.short_description,
                    fields.description,
                    fields.perks,
                    fields.goal_amount,
                    id,
                ],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_campaign(conn, id)
        })
    }

    pub fn get_campaign_images(&self, campaign_id: i64) -> Result<Vec<CampaignImage>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM campaign_images i WHERE i.campaign_id = ?1 ORDER BY i.id",
                IMAGE_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([campaign_id], |row| image_from_row(row, 0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Insert an image row. When `is_primary` is set, every other image of the
    /// campaign loses its flag in the same transaction.
    pub fn add_campaign_image(
        &self,
        campaign_id: i64,
        file_name: &str,
        is_primary: bool,
    ) -> Result<CampaignImage> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            if is_primary {
                tx.execute(
                    "UPDATE campaign_images SET is_primary = 0 WHERE campaign_id = ?1 AND is_primary = 1",
                    [campaign_id],
                )?;
            }

            tx.execute(
                "INSERT INTO campaign_images (campaign_id, file_name, is_primary) VALUES (?1, ?2, ?3)",
                params![campaign_id, file_name, is_primary],
            )?;
            let id = tx.last_insert_rowid();

            let sql = format!("SELECT {} FROM campaign_images i WHERE i.id = ?1", IMAGE_COLUMNS);
            let image = tx.query_row(&sql, [id], |row| image_from_row(row, 0))?;

            tx.commit()?;
            Ok(image)
        })
    }

    // -- Transactions --

    /// Insert a pending transaction and stamp its order code.
    pub fn create_transaction(&self, campaign_id: i64, user_id: i64, amount: i64) -> Result<Transaction> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            tx.execute(
                "INSERT INTO transactions (campaign_id, user_id, amount, status) VALUES (?1, ?2, ?3, ?4)",
                params![campaign_id, user_id, amount, TransactionStatus::Pending.as_str()],
            )?;
            let id = tx.last_insert_rowid();
            tx.execute(
                "UPDATE transactions SET code = ?1 WHERE id = ?2",
                params![order_code(id), id],
            )?;

            let created = query_transaction(&tx, id)?
                .ok_or_else(|| anyhow!("Transaction {} vanished after insert", id))?;
            tx.commit()?;
            Ok(created)
        })
    }

    pub fn get_transaction(&self, id: i64) -> Result<Option<Transaction>> {
        self.with_conn(|conn| query_transaction(conn, id))
    }

    pub fn set_payment_url(&self, id: i64, payment_url: &str) -> Result<Option<Transaction>> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE transactions SET payment_url = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![payment_url, id],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_transaction(conn, id)
        })
    }

    /// All transactions of a campaign in insertion order, with backer names.
    pub fn get_campaign_transactions(&self, campaign_id: i64) -> Result<Vec<CampaignTransaction>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {}, u.name
                 FROM transactions t
                 JOIN users u ON u.id = t.user_id
                 WHERE t.campaign_id = ?1
                 ORDER BY t.id ASC",
                TRANSACTION_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([campaign_id], |row| {
                    Ok(CampaignTransaction {
                        transaction: transaction_from_row(row, 0)?,
                        backer_name: row.get(TRANSACTION_COLUMN_COUNT)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// A backer's transactions, newest first, with campaign name and image.
    pub fn get_user_transactions(&self, user_id: i64) -> Result<Vec<UserTransaction>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {}, c.name, i.file_name
                 FROM transactions t
                 JOIN campaigns c ON c.id = t.campaign_id
                 LEFT JOIN campaign_images i ON i.campaign_id = c.id AND i.is_primary = 1
                 WHERE t.user_id = ?1
                 ORDER BY t.id DESC",
                TRANSACTION_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(UserTransaction {
                        transaction: transaction_from_row(row, 0)?,
                        campaign_name: row.get(TRANSACTION_COLUMN_COUNT)?,
                        campaign_image: row.get(TRANSACTION_COLUMN_COUNT + 1)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Set a transaction's status, keeping the campaign's counters equal to
    /// the sum of its paid transactions.
    ///
    /// Moving into `paid` credits the campaign (one more backer, amount
    /// added); moving out of `paid` takes the same back. Both happen inside
    /// the same SQLite transaction as the status change.
    pub fn apply_transaction_status(
        &self,
        id: i64,
        status: TransactionStatus,
    ) -> Result<Option<StatusChange>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let Some(current) = query_transaction(&tx, id)? else {
                return Ok(None);
            };

            let was_paid = current.status == TransactionStatus::Paid;
            let is_paid = status == TransactionStatus::Paid;
            let became_paid = is_paid && !was_paid;
            let left_paid = was_paid && !is_paid;

            tx.execute(
                "UPDATE transactions SET status = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![status.as_str(), id],
            )?;

            if became_paid || left_paid {
                let (backers, amount) = if became_paid {
                    (1, current.amount)
                } else {
                    (-1, -current.amount)
                };
                tx.execute(
                    "UPDATE campaigns
                     SET backer_count = backer_count + ?1,
                         current_amount = current_amount + ?2,
                         updated_at = datetime('now')
                     WHERE id = ?3",
                    params![backers, amount, current.campaign_id],
                )?;
            }

            let transaction = query_transaction(&tx, id)?
                .ok_or_else(|| anyhow!("Transaction {} vanished during update", id))?;
            tx.commit()?;

            Ok(Some(StatusChange {
                transaction,
                became_paid,
                left_paid,
            }))
        })
    }
}

/// Order code handed to the payment provider as `order_id`.
pub fn order_code(id: i64) -> String {
    format!("ORDER-{}", id)
}

fn query_user_by_id(conn: &Connection, id: i64) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users u WHERE u.id = ?1", USER_COLUMNS);
    conn.query_row(&sql, [id], |row| user_from_row(row, 0)).optional()
}

fn query_campaign(conn: &Connection, id: i64) -> Result<Option<Campaign>> {
    let sql = format!("SELECT {} FROM campaigns c WHERE c.id = ?1", CAMPAIGN_COLUMNS);
    conn.query_row(&sql, [id], |row| campaign_from_row(row, 0)).optional()
}

fn query_transaction(conn: &Connection, id: i64) -> Result<Option<Transaction>> {
    let sql = format!("SELECT {} FROM transactions t WHERE t.id = ?1", TRANSACTION_COLUMNS);
    conn.query_row(&sql, [id], |row| transaction_from_row(row, 0)).optional()
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed_user(db: &Database, email: &str) -> User {
        db.create_user(&NewUser {
            name: "Backer",
            occupation: "Tester",
            email,
            password_hash: "not-a-real-hash",
        })
        .unwrap()
    }

    fn seed_campaign(db: &Database, owner: &User) -> Campaign {
        db.create_campaign(
            owner.id,
            &CampaignFields {
                name: "Community oven",
                short_description: "Bread for everyone",
                description: "A wood-fired oven for the neighbourhood",
                perks: "loaf, class",
                goal_amount: 1_000_000,
            },
            "community-oven-1",
        )
        .unwrap()
    }

    fn primary_count(db: &Database, campaign_id: i64) -> usize {
        db.get_campaign_images(campaign_id)
            .unwrap()
            .iter()
            .filter(|img| img.is_primary)
            .count()
    }

    #[test]
    fn new_primary_image_clears_previous_primary() {
        let db = Database::open_in_memory().unwrap();
        let owner = seed_user(&db, "owner@example.com");
        let campaign = seed_campaign(&db, &owner);

        let first = db.add_campaign_image(campaign.id, "a.png", true).unwrap();
        let second = db.add_campaign_image(campaign.id, "b.png", true).unwrap();

        let images = db.get_campaign_images(campaign.id).unwrap();
        assert_eq!(images.len(), 2);
        assert!(!images.iter().find(|i| i.id == first.id).unwrap().is_primary);
        assert!(images.iter().find(|i| i.id == second.id).unwrap().is_primary);
    }

    #[test]
    fn non_primary_upload_keeps_existing_primary() {
        let db = Database::open_in_memory().unwrap();
        let owner = seed_user(&db, "owner@example.com");
        let campaign = seed_campaign(&db, &owner);

        let primary = db.add_campaign_image(campaign.id, "a.png", true).unwrap();
        db.add_campaign_image(campaign.id, "b.png", false).unwrap();
        db.add_campaign_image(campaign.id, "b.png", false).unwrap();

        let images = db.get_campaign_images(campaign.id).unwrap();
        assert_eq!(images.len(), 3);
        let primaries: Vec<_> = images.iter().filter(|i| i.is_primary).collect();
        assert_eq!(primaries.len(), 1);
        assert_eq!(primaries[0].id, primary.id);
    }

    #[test]
    fn at_most_one_primary_after_mixed_uploads() {
        let db = Database::open_in_memory().unwrap();
        let owner = seed_user(&db, "owner@example.com");
        let campaign = seed_campaign(&db, &owner);
        let other = seed_campaign(&db, &owner);

        for (i, primary) in [true, false, true, true, false, false, true].iter().enumerate() {
            db.add_campaign_image(campaign.id, &format!("{}.png", i), *primary).unwrap();
            db.add_campaign_image(other.id, &format!("o{}.png", i), !*primary).unwrap();
            assert!(primary_count(&db, campaign.id) <= 1);
            assert!(primary_count(&db, other.id) <= 1);
        }
        assert_eq!(primary_count(&db, campaign.id), 1);
        assert_eq!(primary_count(&db, other.id), 1);
    }

    #[test]
    fn campaign_transactions_keep_insertion_order() {
        let db = Database::open_in_memory().unwrap();
        let owner = seed_user(&db, "owner@example.com");
        let backer = seed_user(&db, "backer@example.com");
        let campaign = seed_campaign(&db, &owner);
        let unrelated = seed_campaign(&db, &owner);

        let a = db.create_transaction(campaign.id, backer.id, 10_000).unwrap();
        db.create_transaction(unrelated.id, backer.id, 99).unwrap();
        let b = db.create_transaction(campaign.id, owner.id, 20_000).unwrap();
        let c = db.create_transaction(campaign.id, backer.id, 30_000).unwrap();

        let rows = db.get_campaign_transactions(campaign.id).unwrap();
        let ids: Vec<i64> = rows.iter().map(|r| r.transaction.id).collect();
        assert_eq!(ids, vec![a.id, b.id, c.id]);
        assert_eq!(rows[0].backer_name, "Backer");
        assert!(rows.iter().all(|r| r.transaction.campaign_id == campaign.id));
    }

    #[test]
    fn created_transaction_is_pending_with_order_code() {
        let db = Database::open_in_memory().unwrap();
        let owner = seed_user(&db, "owner@example.com");
        let campaign = seed_campaign(&db, &owner);

        let tx = db.create_transaction(campaign.id, owner.id, 5_000).unwrap();
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert_eq!(tx.code, order_code(tx.id));
        assert_eq!(tx.payment_url, "");
    }

    #[test]
    fn transaction_for_missing_campaign_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let owner = seed_user(&db, "owner@example.com");
        assert!(db.create_transaction(404, owner.id, 5_000).is_err());
    }

    #[test]
    fn paid_status_credits_campaign_once() {
        let db = Database::open_in_memory().unwrap();
        let owner = seed_user(&db, "owner@example.com");
        let backer = seed_user(&db, "backer@example.com");
        let campaign = seed_campaign(&db, &owner);
        let tx = db.create_transaction(campaign.id, backer.id, 25_000).unwrap();

        let first = db.apply_transaction_status(tx.id, TransactionStatus::Paid).unwrap().unwrap();
        assert!(first.became_paid);
        let again = db.apply_transaction_status(tx.id, TransactionStatus::Paid).unwrap().unwrap();
        assert!(!again.became_paid);

        let campaign = db.get_campaign(campaign.id).unwrap().unwrap();
        assert_eq!(campaign.backer_count, 1);
        assert_eq!(campaign.current_amount, 25_000);
    }

    #[test]
    fn leaving_paid_takes_the_credit_back() {
        let db = Database::open_in_memory().unwrap();
        let owner = seed_user(&db, "owner@example.com");
        let backer = seed_user(&db, "backer@example.com");
        let campaign = seed_campaign(&db, &owner);
        let tx = db.create_transaction(campaign.id, backer.id, 1_000).unwrap();

        let counters = |db: &Database| {
            let c = db.get_campaign(campaign.id).unwrap().unwrap();
            (c.backer_count, c.current_amount)
        };

        assert!(db.apply_transaction_status(tx.id, TransactionStatus::Paid).unwrap().unwrap().became_paid);
        assert_eq!(counters(&db), (1, 1_000));

        let cancelled = db
            .apply_transaction_status(tx.id, TransactionStatus::Cancelled)
            .unwrap()
            .unwrap();
        assert!(cancelled.left_paid);
        assert_eq!(counters(&db), (0, 0));

        db.apply_transaction_status(tx.id, TransactionStatus::Cancelled).unwrap();
        assert_eq!(counters(&db), (0, 0));

        db.apply_transaction_status(tx.id, TransactionStatus::Paid).unwrap();
        assert_eq!(counters(&db), (1, 1_000));
    }

    #[test]
    fn cancelling_a_pending_transaction_leaves_counters_alone() {
        let db = Database::open_in_memory().unwrap();
        let owner = seed_user(&db, "owner@example.com");
        let campaign = seed_campaign(&db, &owner);
        let tx = db.create_transaction(campaign.id, owner.id, 500).unwrap();

        let change = db
            .apply_transaction_status(tx.id, TransactionStatus::Cancelled)
            .unwrap()
            .unwrap();
        assert!(!change.became_paid && !change.left_paid);
        let campaign = db.get_campaign(campaign.id).unwrap().unwrap();
        assert_eq!((campaign.backer_count, campaign.current_amount), (0, 0));
    }

    #[test]
    fn unknown_transaction_status_update_is_none() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.apply_transaction_status(7, TransactionStatus::Cancelled).unwrap().is_none());
    }

    #[test]
    fn list_campaigns_filters_by_owner_and_joins_primary_image() {
        let db = Database::open_in_memory().unwrap();
        let alice = seed_user(&db, "alice@example.com");
        let bob = seed_user(&db, "bob@example.com");
        let mine = seed_campaign(&db, &alice);
        seed_campaign(&db, &bob);
        db.add_campaign_image(mine.id, "side.png", false).unwrap();
        db.add_campaign_image(mine.id, "cover.png", true).unwrap();

        assert_eq!(db.list_campaigns(None).unwrap().len(), 2);

        let only_alice = db.list_campaigns(Some(alice.id)).unwrap();
        assert_eq!(only_alice.len(), 1);
        assert_eq!(only_alice[0].0.id, mine.id);
        assert_eq!(only_alice[0].1.as_deref(), Some("cover.png"));
    }

    #[test]
    fn duplicate_email_is_rejected_by_store() {
        let db = Database::open_in_memory().unwrap();
        seed_user(&db, "same@example.com");
        let dup = db.create_user(&NewUser {
            name: "Other",
            occupation: "Other",
            email: "same@example.com",
            password_hash: "x",
        });
        assert!(dup.is_err());
    }
}
