//! Link/unlink state transitions
//!
//! Linking expands a bill: every pending row of the cycle points at it, its
//! amount is snapshotted into `original_amount` and zeroed, and `expanded_at`
//! is set. Unlinking collapses it again. Both run inside a write transaction
//! that takes the SQLite write lock up front (`BEGIN IMMEDIATE`) and re-reads
//! what it mutates, so two writers on the same cycle serialize.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use tracing::{info, warn};

use super::{begin_write, commit_write, format_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{LinkResult, UnlinkResult};
use crate::reconcile::{BillingCycle, MatchDecision};

impl Database {
    /// Apply an auto-link or confirmed decision
    ///
    /// Re-applying the same bill to an already linked cycle is a no-op that
    /// reports `already_linked`. A cycle linked to a different bill, or a bill
    /// already holding another cycle, is a `Conflict`.
    pub fn apply_link(&self, decision: &MatchDecision) -> Result<LinkResult> {
        let bill_id = decision.linkable_bill()?;
        let owner_id = decision.owner_id.as_str();
        let cycle = decision.billing_cycle;

        let mut conn = self.conn()?;
        let tx = begin_write(&mut conn)?;

        let bill = Self::query_owned_transaction(&tx, owner_id, bill_id)?
            .ok_or_else(|| Error::NotFound(format!("Bill {}", bill_id)))?;
        if bill.billing_cycle.is_some() {
            return Err(Error::InvalidData(format!(
                "Transaction {} is a statement row, not a bill",
                bill_id
            )));
        }

        if let Some(existing) = Self::query_cycle_link(&tx, owner_id, cycle)? {
            if existing != bill_id {
                warn!(
                    owner = owner_id,
                    cycle = %cycle,
                    existing,
                    requested = bill_id,
                    "Cycle already linked to another bill"
                );
                return Err(Error::Conflict(format!(
                    "Cycle {} is already linked to bill {}",
                    cycle, existing
                )));
            }
        }

        if bill.bill_state.is_expanded() {
            let held: Vec<String> = tx
                .prepare("SELECT DISTINCT billing_cycle FROM transactions WHERE credit_card_payment_id = ?")?
                .query_map(params![bill_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            if held.iter().any(|c| c != &cycle.to_string()) {
                return Err(Error::Conflict(format!(
                    "Bill {} already holds another statement",
                    bill_id
                )));
            }
        }

        let linked_count = tx.execute(
            r#"
            UPDATE transactions
            SET credit_card_payment_id = ?
            WHERE owner_id = ? AND billing_cycle = ? AND credit_card_payment_id IS NULL
              AND deleted_at IS NULL AND archived = 0
            "#,
            params![bill_id, owner_id, cycle.to_string()],
        )?;

        let already_linked = bill.bill_state.is_expanded() && linked_count == 0;

        if !bill.bill_state.is_expanded() {
            if linked_count == 0 {
                // Rows vanished between decision and apply
                return Err(Error::Conflict(format!(
                    "Cycle {} has no pending rows to link",
                    cycle
                )));
            }
            tx.execute(
                r#"
                UPDATE transactions
                SET original_amount = amount, amount = 0, expanded_at = ?
                WHERE id = ? AND expanded_at IS NULL
                "#,
                params![format_datetime(Utc::now()), bill_id],
            )?;
        }

        let total_linked: i64 = tx.query_row(
            r#"
            SELECT COUNT(*) FROM transactions
            WHERE credit_card_payment_id = ? AND billing_cycle = ? AND deleted_at IS NULL
            "#,
            params![bill_id, cycle.to_string()],
            |row| row.get(0),
        )?;

        commit_write(tx)?;

        if already_linked {
            info!(
                owner = owner_id,
                cycle = %cycle,
                bill_id,
                total_linked,
                "Cycle already linked"
            );
        } else {
            info!(
                owner = owner_id,
                cycle = %cycle,
                bill_id,
                linked_count,
                tier = ?decision.tier,
                forced = decision.forced,
                "Linked statement to bill"
            );
        }

        Ok(LinkResult {
            billing_cycle: cycle,
            bill_id,
            linked_count,
            total_linked: usize::try_from(total_linked).unwrap_or_default(),
            tier: decision.tier,
            amount_delta: decision.amount_delta,
            already_linked,
            forced: decision.forced,
        })
    }

    /// Collapse an expanded bill: restore its amount and release its rows
    pub fn apply_unlink(&self, owner_id: &str, bill_id: i64) -> Result<UnlinkResult> {
        let mut conn = self.conn()?;
        let tx = begin_write(&mut conn)?;

        let bill = Self::query_owned_transaction(&tx, owner_id, bill_id)?
            .ok_or_else(|| Error::NotFound(format!("Bill {}", bill_id)))?;
        let restored_amount = bill
            .bill_state
            .original_amount()
            .ok_or(Error::NotExpanded { bill_id })?;

        let cycle: Option<String> = tx
            .query_row(
                "SELECT billing_cycle FROM transactions WHERE credit_card_payment_id = ? LIMIT 1",
                params![bill_id],
                |row| row.get(0),
            )
            .optional()?;

        let restored_count = tx.execute(
            "UPDATE transactions SET credit_card_payment_id = NULL WHERE credit_card_payment_id = ? AND owner_id = ?",
            params![bill_id, owner_id],
        )?;

        tx.execute(
            r#"
            UPDATE transactions
            SET amount = COALESCE(original_amount, amount), original_amount = NULL, expanded_at = NULL
            WHERE id = ?
            "#,
            params![bill_id],
        )?;

        commit_write(tx)?;

        let billing_cycle = cycle.and_then(|c| c.parse::<BillingCycle>().ok());
        info!(
            owner = owner_id,
            bill_id,
            restored_count,
            cycle = ?billing_cycle.map(|c| c.to_string()),
            "Unlinked bill"
        );

        Ok(UnlinkResult {
            bill_id,
            billing_cycle,
            restored_count,
            restored_amount,
        })
    }
}
