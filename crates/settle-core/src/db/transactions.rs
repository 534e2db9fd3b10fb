//! Transaction operations

use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use super::{amount_from_db, amount_to_db, parse_datetime, Database, TRANSACTION_COLUMNS};
use crate::error::{Error, Result};
use crate::models::{BillState, CardLink, NewTransaction, Transaction};

impl Database {
    /// Insert a transaction on an existing connection (skips duplicates based on import_hash)
    pub(crate) fn insert_transaction_with_conn(
        conn: &Connection,
        owner_id: &str,
        tx: &NewTransaction,
    ) -> Result<Option<i64>> {
        if let Some(hash) = &tx.import_hash {
            let existing: Option<i64> = conn
                .query_row(
                    "SELECT id FROM transactions WHERE import_hash = ?",
                    params![hash],
                    |row| row.get(0),
                )
                .optional()?;

            if existing.is_some() {
                return Ok(None); // Duplicate, skip
            }
        }

        conn.execute(
            r#"
            INSERT INTO transactions (owner_id, date, description, amount, type, category, billing_cycle,
                                      is_credit_card_payment, import_hash, original_data)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                owner_id,
                tx.date.to_string(),
                tx.description,
                amount_to_db(tx.amount.abs()),
                tx.kind.as_str(),
                tx.category,
                tx.billing_cycle.map(|c| c.to_string()),
                tx.is_credit_card_payment,
                tx.import_hash,
                tx.original_data,
            ],
        )?;

        Ok(Some(conn.last_insert_rowid()))
    }

    /// Create a single transaction and return it as stored
    pub fn create_transaction(&self, owner_id: &str, tx: &NewTransaction) -> Result<Transaction> {
        if tx.description.trim().is_empty() {
            return Err(Error::InvalidData("Description is required".to_string()));
        }

        let conn = self.conn()?;
        let id = Self::insert_transaction_with_conn(&conn, owner_id, tx)?.ok_or_else(|| {
            Error::InvalidData("A transaction with the same import hash already exists".to_string())
        })?;

        info!(
            owner = owner_id,
            id,
            bill = tx.is_credit_card_payment,
            "Created transaction"
        );

        Self::query_owned_transaction(&conn, owner_id, id)?
            .ok_or_else(|| Error::NotFound(format!("Transaction {}", id)))
    }

    /// Get a single transaction owned by `owner_id`
    pub fn get_transaction(&self, owner_id: &str, id: i64) -> Result<Option<Transaction>> {
        let conn = self.conn()?;
        Self::query_owned_transaction(&conn, owner_id, id)
    }

    /// Fetch an owned, non-deleted transaction on an existing connection
    pub(crate) fn query_owned_transaction(
        conn: &Connection,
        owner_id: &str,
        id: i64,
    ) -> Result<Option<Transaction>> {
        let sql = format!(
            "SELECT {} FROM transactions WHERE id = ? AND owner_id = ? AND deleted_at IS NULL",
            TRANSACTION_COLUMNS
        );
        let transaction = conn
            .query_row(&sql, params![id, owner_id], |row| Self::row_to_transaction(row))
            .optional()?;

        Ok(transaction)
    }

    /// List visible transactions, newest first
    pub fn list_transactions(&self, owner_id: &str, limit: i64, offset: i64) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let sql = format!(
            r#"
            SELECT {}
            FROM transactions
            WHERE owner_id = ? AND deleted_at IS NULL AND archived = 0
            ORDER BY date DESC, id DESC
            LIMIT ? OFFSET ?
            "#,
            TRANSACTION_COLUMNS
        );

        let mut stmt = conn.prepare(&sql)?;
        let transactions = stmt
            .query_map(params![owner_id, limit, offset], |row| {
                Self::row_to_transaction(row)
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(transactions)
    }

    /// Count visible transactions
    pub fn count_transactions(&self, owner_id: &str) -> Result<i64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM transactions WHERE owner_id = ? AND deleted_at IS NULL AND archived = 0",
            params![owner_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Hide or unhide a transaction
    pub fn set_transaction_archived(&self, owner_id: &str, id: i64, archived: bool) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE transactions SET archived = ? WHERE id = ? AND owner_id = ? AND deleted_at IS NULL",
            params![archived, id, owner_id],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("Transaction {}", id)));
        }
        Ok(())
    }

    /// Soft-delete a transaction
    ///
    /// An expanded bill must be unlinked first so its statement rows are not
    /// left pointing at a deleted row.
    pub fn delete_transaction(&self, owner_id: &str, id: i64) -> Result<()> {
        let conn = self.conn()?;
        let tx = Self::query_owned_transaction(&conn, owner_id, id)?
            .ok_or_else(|| Error::NotFound(format!("Transaction {}", id)))?;

        if tx.bill_state.is_expanded() {
            return Err(Error::InvalidData(format!(
                "Bill {} holds statement detail; unlink it before deleting",
                id
            )));
        }

        conn.execute(
            "UPDATE transactions SET deleted_at = CURRENT_TIMESTAMP WHERE id = ? AND owner_id = ?",
            params![id, owner_id],
        )?;
        Ok(())
    }

    /// Helper to convert a row (selected with `TRANSACTION_COLUMNS`) to a Transaction
    pub(crate) fn row_to_transaction(row: &rusqlite::Row) -> rusqlite::Result<Transaction> {
        let date_str: String = row.get(2)?;
        let amount = amount_from_db(row.get(4)?);
        let kind_str: String = row.get(5)?;
        let cycle_str: Option<String> = row.get(7)?;
        let payment_id: Option<i64> = row.get(8)?;
        let is_payment_int: i64 = row.get(9)?;
        let original_amount: Option<f64> = row.get(10)?;
        let expanded_at_str: Option<String> = row.get(11)?;
        let archived_int: i64 = row.get(14)?;
        let created_at_str: String = row.get(15)?;

        Ok(Transaction {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            date: chrono::NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").unwrap_or_default(),
            description: row.get(3)?,
            amount,
            kind: kind_str.parse().unwrap_or_default(),
            category: row.get(6)?,
            billing_cycle: cycle_str.and_then(|s| s.parse().ok()),
            card_link: CardLink::from_column(payment_id),
            is_credit_card_payment: is_payment_int != 0,
            bill_state: BillState::from_columns(
                amount,
                original_amount.map(amount_from_db),
                expanded_at_str.as_deref().map(parse_datetime),
            ),
            import_hash: row.get(12)?,
            original_data: row.get(13)?,
            archived: archived_int != 0,
            created_at: parse_datetime(&created_at_str),
        })
    }
}
