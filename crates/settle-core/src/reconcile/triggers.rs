//! Trigger adapters
//!
//! The events that run the engine: a statement was imported, a bill was
//! created, the user pressed "Reconcile", or the user asked to unlink. Each
//! trigger decides, applies the decision when it is safe, and records the
//! change in the audit log under the acting owner.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use super::cycle::BillingCycle;
use super::engine::{MatchDecision, Outcome, Reconciler};
use crate::error::Result;
use crate::models::{CycleStatus, LinkResult, Transaction, UnlinkResult};

/// What a trigger did for one cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TriggerOutcome {
    /// Rows were linked (or were already linked) to a bill
    Linked(LinkResult),
    /// Several bills fit, or the only one is out of tolerance; the user picks
    NeedsSelection(MatchDecision),
    /// No usable bill yet; rows stay pending
    StillPending {
        billing_cycle: BillingCycle,
        pending_count: usize,
    },
    /// The cycle has no pending rows
    NothingToDo { billing_cycle: BillingCycle },
}

impl<'a> Reconciler<'a> {
    /// Run after a statement import for the imported cycle
    pub fn after_statement_import(&self, owner_id: &str, cycle: BillingCycle) -> Result<TriggerOutcome> {
        let decision = self.reconcile(owner_id, cycle, None)?;
        self.settle(owner_id, decision)
    }

    /// Run after a bill is created, for every pending cycle whose window holds its date
    pub fn after_bill_created(&self, owner_id: &str, bill: &Transaction) -> Result<Vec<TriggerOutcome>> {
        if !self.is_bill(bill) {
            return Ok(Vec::new());
        }

        let mut outcomes = Vec::new();
        for cycle in BillingCycle::cycles_covering(bill.date, self.window_days()) {
            if !matches!(self.db.cycle_status(owner_id, cycle)?, CycleStatus::Pending { .. }) {
                continue;
            }
            debug!(owner = owner_id, cycle = %cycle, bill_id = bill.id, "Re-evaluating pending cycle");
            let decision = self.reconcile(owner_id, cycle, None)?;
            outcomes.push(self.settle(owner_id, decision)?);
        }

        Ok(outcomes)
    }

    /// Manual "Reconcile" action
    ///
    /// `forced_bill_id` links to that bill regardless of tier; `confirm_bill_id`
    /// picks one of the candidates a previous call returned.
    pub fn reconcile_on_demand(
        &self,
        owner_id: &str,
        cycle: BillingCycle,
        forced_bill_id: Option<i64>,
        confirm_bill_id: Option<i64>,
    ) -> Result<TriggerOutcome> {
        let mut decision = self.reconcile(owner_id, cycle, forced_bill_id)?;

        if let Some(bill_id) = confirm_bill_id {
            let already_chosen =
                decision.outcome == Outcome::AutoLink && decision.chosen_bill_id == Some(bill_id);
            if decision.pending_count > 0 && !already_chosen {
                decision = decision.confirm(bill_id)?;
            }
        }

        self.settle(owner_id, decision)
    }

    /// "Desvincular": collapse a bill and release its statement rows
    pub fn unlink(&self, owner_id: &str, bill_id: i64) -> Result<UnlinkResult> {
        let result = self.db.apply_unlink(owner_id, bill_id)?;

        let details = json!({
            "billing_cycle": result.billing_cycle,
            "restored_count": result.restored_count,
            "restored_amount": result.restored_amount,
        });
        self.db.log_audit(
            owner_id,
            "unlink",
            Some("transaction"),
            Some(bill_id),
            Some(&details.to_string()),
        )?;

        Ok(result)
    }

    /// Apply a decision when it is linkable, otherwise report why not
    fn settle(&self, owner_id: &str, decision: MatchDecision) -> Result<TriggerOutcome> {
        match decision.outcome {
            Outcome::AutoLink => {
                let result = self.db.apply_link(&decision)?;
                if !result.already_linked {
                    let action = if decision.forced { "link_forced" } else { "link" };
                    let details = json!({
                        "billing_cycle": result.billing_cycle,
                        "linked_count": result.linked_count,
                        "total_linked": result.total_linked,
                        "tier": result.tier,
                        "amount_delta": result.amount_delta,
                        "mismatch": decision.mismatch,
                    });
                    self.db.log_audit(
                        owner_id,
                        action,
                        Some("transaction"),
                        Some(result.bill_id),
                        Some(&details.to_string()),
                    )?;
                }
                Ok(TriggerOutcome::Linked(result))
            }
            Outcome::Disambiguate => {
                info!(
                    owner = owner_id,
                    cycle = %decision.billing_cycle,
                    candidates = decision.candidates.len(),
                    "Cycle needs bill selection"
                );
                Ok(TriggerOutcome::NeedsSelection(decision))
            }
            Outcome::NoMatch if decision.pending_count > 0 => Ok(TriggerOutcome::StillPending {
                billing_cycle: decision.billing_cycle,
                pending_count: decision.pending_count,
            }),
            Outcome::NoMatch => Ok(TriggerOutcome::NothingToDo {
                billing_cycle: decision.billing_cycle,
            }),
        }
    }
}
