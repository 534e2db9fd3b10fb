//! Reconciliation reads: pending rows, open bills, cycle status

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};

use super::{amount_from_db, Database, TRANSACTION_COLUMNS};
use crate::error::Result;
use crate::models::{CycleStatus, PendingCycle, Transaction};
use crate::reconcile::BillingCycle;

/// Visible statement rows of a cycle that no bill has absorbed
const PENDING_FILTER: &str = "owner_id = ? AND billing_cycle = ? AND credit_card_payment_id IS NULL \
     AND deleted_at IS NULL AND archived = 0";

impl Database {
    /// Pending statement rows of a cycle, oldest first
    pub(crate) fn query_pending_rows(
        conn: &Connection,
        owner_id: &str,
        cycle: BillingCycle,
    ) -> Result<Vec<Transaction>> {
        let sql = format!(
            "SELECT {} FROM transactions WHERE {} ORDER BY date ASC, id ASC",
            TRANSACTION_COLUMNS, PENDING_FILTER
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![owner_id, cycle.to_string()], |row| {
                Self::row_to_transaction(row)
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Every visible statement row of a cycle, linked or not
    pub(crate) fn query_cycle_rows(
        conn: &Connection,
        owner_id: &str,
        cycle: BillingCycle,
    ) -> Result<Vec<Transaction>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM transactions
            WHERE owner_id = ? AND billing_cycle = ? AND deleted_at IS NULL AND archived = 0
            ORDER BY date ASC, id ASC
            "#,
            TRANSACTION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![owner_id, cycle.to_string()], |row| {
                Self::row_to_transaction(row)
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// The bill a cycle is linked to, if any of its rows are linked
    pub(crate) fn query_cycle_link(
        conn: &Connection,
        owner_id: &str,
        cycle: BillingCycle,
    ) -> Result<Option<i64>> {
        let bill_id = conn
            .query_row(
                r#"
                SELECT credit_card_payment_id
                FROM transactions
                WHERE owner_id = ? AND billing_cycle = ? AND credit_card_payment_id IS NOT NULL
                ORDER BY id ASC
                LIMIT 1
                "#,
                params![owner_id, cycle.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(bill_id)
    }

    /// Unexpanded, unlinked, visible expenses dated inside `[start, end]`
    ///
    /// Candidate bills are filtered from these by the bill predicate.
    pub(crate) fn query_open_expenses(
        conn: &Connection,
        owner_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Transaction>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM transactions
            WHERE owner_id = ?
              AND type = 'expense'
              AND date >= ? AND date <= ?
              AND expanded_at IS NULL
              AND billing_cycle IS NULL
              AND credit_card_payment_id IS NULL
              AND deleted_at IS NULL
              AND archived = 0
            ORDER BY date DESC, id ASC
            "#,
            TRANSACTION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(
                params![owner_id, start.to_string(), end.to_string()],
                |row| Self::row_to_transaction(row),
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Pending statement rows of a cycle
    pub fn pending_rows(&self, owner_id: &str, cycle: BillingCycle) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        Self::query_pending_rows(&conn, owner_id, cycle)
    }

    /// Cycles with statement rows still waiting for a bill, newest first
    pub fn list_pending_cycles(&self, owner_id: &str) -> Result<Vec<PendingCycle>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT billing_cycle, COUNT(*),
                   COALESCE(SUM(CASE WHEN type = 'income' THEN -amount ELSE amount END), 0)
            FROM transactions
            WHERE owner_id = ?
              AND billing_cycle IS NOT NULL
              AND credit_card_payment_id IS NULL
              AND deleted_at IS NULL
              AND archived = 0
            GROUP BY billing_cycle
            ORDER BY billing_cycle DESC
            "#,
        )?;

        let rows = stmt
            .query_map(params![owner_id], |row| {
                let cycle: String = row.get(0)?;
                let count: i64 = row.get(1)?;
                let total: f64 = row.get(2)?;
                Ok((cycle, count, total))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        // Rows with an unparseable cycle were not written by this crate; skip them
        let cycles = rows
            .into_iter()
            .filter_map(|(cycle, count, total)| {
                cycle.parse().ok().map(|billing_cycle| PendingCycle {
                    billing_cycle,
                    transaction_count: count,
                    total: amount_from_db(total),
                })
            })
            .collect();

        Ok(cycles)
    }

    /// Reconciliation state of one cycle
    pub fn cycle_status(&self, owner_id: &str, cycle: BillingCycle) -> Result<CycleStatus> {
        let conn = self.conn()?;
        let (total, pending): (i64, i64) = conn.query_row(
            r#"
            SELECT COUNT(*),
                   COALESCE(SUM(CASE WHEN credit_card_payment_id IS NULL THEN 1 ELSE 0 END), 0)
            FROM transactions
            WHERE owner_id = ? AND billing_cycle = ? AND deleted_at IS NULL AND archived = 0
            "#,
            params![owner_id, cycle.to_string()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        if total == 0 {
            return Ok(CycleStatus::NoData);
        }
        if pending > 0 {
            return Ok(CycleStatus::Pending { count: pending });
        }

        match Self::query_cycle_link(&conn, owner_id, cycle)? {
            Some(bill_id) => Ok(CycleStatus::Linked {
                bill_id,
                count: total,
            }),
            None => Ok(CycleStatus::NoData),
        }
    }

    /// Statement rows absorbed by a bill (the bill's expanded detail)
    pub fn linked_rows(&self, owner_id: &str, bill_id: i64) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let sql = format!(
            r#"
            SELECT {}
            FROM transactions
            WHERE owner_id = ? AND credit_card_payment_id = ? AND deleted_at IS NULL
            ORDER BY date ASC, id ASC
            "#,
            TRANSACTION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![owner_id, bill_id], |row| Self::row_to_transaction(row))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
