//! Reconciliation engine
//!
//! Reads a cycle's pending statement rows and the bills that could pay them,
//! then decides whether to link automatically, ask the user, or wait. The
//! engine never writes; applying a decision is the job of
//! [`Database::apply_link`](crate::db::Database::apply_link).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::amount::{compare, AmountComparison, Confidence, Tier, Tolerances};
use super::candidates::{find_candidates, BillCandidate, BillPredicate, RegexBillMatcher};
use super::cycle::{BillingCycle, DEFAULT_WINDOW_DAYS};
use crate::config::ReconcileConfig;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{statement_total, NewTransaction, Transaction, TransactionKind};

/// What the engine concluded for a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    AutoLink,
    Disambiguate,
    NoMatch,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AutoLink => "auto_link",
            Self::Disambiguate => "disambiguate",
            Self::NoMatch => "no_match",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A bill candidate with its comparison against the statement total
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    #[serde(flatten)]
    pub bill: BillCandidate,
    pub comparison: AmountComparison,
}

/// How the bill for a cycle is selected
#[derive(Debug, Clone)]
pub enum Selection {
    /// Search the candidate window
    Search(Vec<BillCandidate>),
    /// The user named the bill; the tier is informational only
    Forced(BillCandidate),
    /// The cycle already links to this bill; new rows join it
    Existing(BillCandidate),
}

/// Engine output for one (owner, cycle)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchDecision {
    pub owner_id: String,
    pub billing_cycle: BillingCycle,
    pub outcome: Outcome,
    pub chosen_bill_id: Option<i64>,
    pub candidates: Vec<ScoredCandidate>,
    pub confidence: Option<Confidence>,
    pub tier: Option<Tier>,
    /// |statement total - bill| for the chosen bill
    pub amount_delta: Option<Decimal>,
    /// Purchases minus refunds of the compared statement rows
    pub cc_total: Decimal,
    pub pending_count: usize,
    /// The chosen bill came from the user rather than the tier policy
    pub forced: bool,
    /// A forced or confirmed bill whose amount is outside every tolerance
    pub mismatch: bool,
}

impl MatchDecision {
    fn empty(owner_id: &str, cycle: BillingCycle) -> Self {
        Self {
            owner_id: owner_id.to_string(),
            billing_cycle: cycle,
            outcome: Outcome::NoMatch,
            chosen_bill_id: None,
            candidates: Vec::new(),
            confidence: None,
            tier: None,
            amount_delta: None,
            cc_total: Decimal::ZERO,
            pending_count: 0,
            forced: false,
            mismatch: false,
        }
    }

    fn choose(&mut self, index: usize, forced: bool) {
        let chosen = &self.candidates[index];
        let tier = chosen.comparison.tier;
        self.outcome = Outcome::AutoLink;
        self.chosen_bill_id = Some(chosen.bill.id);
        self.tier = Some(tier);
        self.confidence = Some(tier.confidence());
        self.amount_delta = Some(chosen.comparison.delta_abs);
        self.forced = forced;
        self.mismatch = tier == Tier::NoMatch;
    }

    /// Resolve a disambiguation by picking one of the listed candidates
    pub fn confirm(mut self, bill_id: i64) -> Result<Self> {
        let index = self
            .candidates
            .iter()
            .position(|c| c.bill.id == bill_id)
            .ok_or_else(|| {
                Error::InvalidData(format!(
                    "Bill {} is not a candidate for cycle {}",
                    bill_id, self.billing_cycle
                ))
            })?;
        self.choose(index, true);
        Ok(self)
    }

    /// The bill to link, if this decision is ready to apply
    pub fn linkable_bill(&self) -> Result<i64> {
        match (self.outcome, self.chosen_bill_id) {
            (Outcome::AutoLink, Some(bill_id)) => Ok(bill_id),
            _ => Err(Error::NoBillChosen),
        }
    }
}

/// Apply the tier policy to a cycle snapshot
///
/// Pure: no storage access. `cc_total` is the net statement total the
/// bill is compared against, `pending_count` the rows that would be linked.
pub fn decide(
    owner_id: &str,
    cycle: BillingCycle,
    cc_total: Decimal,
    pending_count: usize,
    selection: Selection,
    tolerances: &Tolerances,
) -> MatchDecision {
    let mut decision = MatchDecision::empty(owner_id, cycle);
    if pending_count == 0 {
        return decision;
    }
    decision.cc_total = cc_total;
    decision.pending_count = pending_count;

    let score = |bill: BillCandidate| {
        let comparison = compare(cc_total, bill.amount, tolerances);
        ScoredCandidate { bill, comparison }
    };

    match selection {
        Selection::Forced(bill) => {
            decision.candidates = vec![score(bill)];
            decision.choose(0, true);
        }
        Selection::Existing(bill) => {
            decision.candidates = vec![score(bill)];
            // Already committed to this bill; a drifting total is only a warning
            decision.choose(0, false);
        }
        Selection::Search(bills) => {
            let mut scored: Vec<ScoredCandidate> = bills.into_iter().map(score).collect();
            scored.sort_by(|a, b| {
                b.bill
                    .date
                    .cmp(&a.bill.date)
                    .then(a.comparison.delta_abs.cmp(&b.comparison.delta_abs))
                    .then(a.bill.id.cmp(&b.bill.id))
            });
            decision.candidates = scored;

            match decision.candidates.len() {
                0 => {}
                1 if decision.candidates[0].comparison.tier.is_auto_linkable() => {
                    decision.choose(0, false);
                }
                _ => decision.outcome = Outcome::Disambiguate,
            }
        }
    }

    decision
}

/// Reconciliation engine bound to a database
pub struct Reconciler<'a> {
    pub(crate) db: &'a Database,
    tolerances: Tolerances,
    window_days: i64,
    predicate: Box<dyn BillPredicate>,
}

impl<'a> Reconciler<'a> {
    /// Engine with the built-in defaults
    pub fn new(db: &'a Database) -> Self {
        Self {
            db,
            tolerances: Tolerances::default(),
            window_days: DEFAULT_WINDOW_DAYS,
            predicate: Box::new(RegexBillMatcher::default()),
        }
    }

    /// Engine with loaded configuration
    pub fn with_config(db: &'a Database, config: &ReconcileConfig) -> Result<Self> {
        Ok(Self {
            db,
            tolerances: config.tolerances.clone(),
            window_days: config.window_days,
            predicate: Box::new(config.bill_matcher()?),
        })
    }

    /// Replace the bill-description heuristic
    pub fn with_predicate(mut self, predicate: Box<dyn BillPredicate>) -> Self {
        self.predicate = predicate;
        self
    }

    pub fn window_days(&self) -> i64 {
        self.window_days
    }

    /// Mark a new expense as a bill payment when its description looks like one
    pub fn classify(&self, mut tx: NewTransaction) -> NewTransaction {
        if tx.kind == TransactionKind::Expense
            && tx.billing_cycle.is_none()
            && !tx.is_credit_card_payment
            && self.predicate.is_bill_like(&tx.description)
        {
            debug!("Description '{}' looks like a card bill", tx.description);
            tx.is_credit_card_payment = true;
        }
        tx
    }

    /// Whether a stored transaction could pay a statement
    pub fn is_bill(&self, tx: &Transaction) -> bool {
        tx.kind == TransactionKind::Expense
            && tx.billing_cycle.is_none()
            && (tx.is_credit_card_payment || self.predicate.is_bill_like(&tx.description))
    }

    /// Bills that could pay a cycle's statement
    pub fn find_candidates(&self, owner_id: &str, cycle: BillingCycle) -> Result<Vec<BillCandidate>> {
        let conn = self.db.conn()?;
        find_candidates(&conn, owner_id, cycle, self.window_days, self.predicate.as_ref())
    }

    /// Compute the decision for a cycle without writing anything
    pub fn reconcile(
        &self,
        owner_id: &str,
        cycle: BillingCycle,
        forced_bill_id: Option<i64>,
    ) -> Result<MatchDecision> {
        let mut conn = self.db.conn()?;
        // One read transaction so rows and candidates come from the same snapshot
        let tx = conn.transaction()?;

        let pending = Database::query_pending_rows(&tx, owner_id, cycle)?;
        if pending.is_empty() {
            debug!(owner = owner_id, cycle = %cycle, "No pending statement rows");
            return Ok(MatchDecision::empty(owner_id, cycle));
        }
        let pending_total = statement_total(&pending);

        let (selection, cc_total) = if let Some(bill_id) = forced_bill_id {
            let bill = Database::query_owned_transaction(&tx, owner_id, bill_id)?
                .ok_or_else(|| Error::NotFound(format!("Bill {}", bill_id)))?;
            if bill.billing_cycle.is_some() || bill.kind != TransactionKind::Expense {
                return Err(Error::InvalidData(format!(
                    "Transaction {} is not a bill payment",
                    bill_id
                )));
            }
            (Selection::Forced(candidate_from_bill(&bill)), pending_total)
        } else if let Some(bill_id) = Database::query_cycle_link(&tx, owner_id, cycle)? {
            let bill = Database::query_owned_transaction(&tx, owner_id, bill_id)?
                .ok_or_else(|| Error::NotFound(format!("Bill {}", bill_id)))?;
            // Compare the whole statement against the bill's pre-expansion amount
            let cycle_total = statement_total(&Database::query_cycle_rows(&tx, owner_id, cycle)?);
            (Selection::Existing(candidate_from_bill(&bill)), cycle_total)
        } else {
            let bills = find_candidates(
                &tx,
                owner_id,
                cycle,
                self.window_days,
                self.predicate.as_ref(),
            )?;
            (Selection::Search(bills), pending_total)
        };
        tx.commit()?;

        let decision = decide(
            owner_id,
            cycle,
            cc_total,
            pending.len(),
            selection,
            &self.tolerances,
        );

        debug!(
            owner = owner_id,
            cycle = %cycle,
            outcome = %decision.outcome,
            candidates = decision.candidates.len(),
            cc_total = %decision.cc_total,
            "Reconciliation decision"
        );

        Ok(decision)
    }
}

/// Candidate view of a bill, using its pre-expansion amount when expanded
fn candidate_from_bill(bill: &Transaction) -> BillCandidate {
    let mut candidate = BillCandidate::from(bill);
    if let Some(original) = bill.bill_state.original_amount() {
        candidate.amount = original;
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn cycle() -> BillingCycle {
        "2025-12".parse().unwrap()
    }

    fn bill(id: i64, day: u32, amount: Decimal) -> BillCandidate {
        BillCandidate {
            id,
            date: NaiveDate::from_ymd_opt(2026, 1, day).unwrap(),
            amount,
            description: "Pagamento de fatura".to_string(),
            category: None,
            is_credit_card_payment: true,
        }
    }

    fn search(total: Decimal, bills: Vec<BillCandidate>) -> MatchDecision {
        decide(
            "owner",
            cycle(),
            total,
            3,
            Selection::Search(bills),
            &Tolerances::default(),
        )
    }

    #[test]
    fn test_no_pending_rows_is_no_match() {
        let decision = decide(
            "owner",
            cycle(),
            Decimal::ZERO,
            0,
            Selection::Search(vec![bill(1, 10, dec!(100))]),
            &Tolerances::default(),
        );
        assert_eq!(decision.outcome, Outcome::NoMatch);
        assert!(decision.candidates.is_empty());
    }

    #[test]
    fn test_no_candidates_is_no_match() {
        let decision = search(dec!(500), vec![]);
        assert_eq!(decision.outcome, Outcome::NoMatch);
        assert_eq!(decision.pending_count, 3);
        assert!(decision.chosen_bill_id.is_none());
    }

    #[test]
    fn test_single_in_tolerance_candidate_auto_links() {
        let decision = search(dec!(1010.00), vec![bill(7, 13, dec!(1000.00))]);
        assert_eq!(decision.outcome, Outcome::AutoLink);
        assert_eq!(decision.chosen_bill_id, Some(7));
        assert_eq!(decision.tier, Some(Tier::MediumConfidence));
        assert_eq!(decision.confidence, Some(Confidence::Medium));
        assert_eq!(decision.amount_delta, Some(dec!(10.00)));
        assert!(!decision.forced);
        assert!(!decision.mismatch);
    }

    #[test]
    fn test_single_out_of_tolerance_candidate_needs_confirmation() {
        let decision = search(dec!(1500.00), vec![bill(7, 13, dec!(1000.00))]);
        assert_eq!(decision.outcome, Outcome::Disambiguate);
        assert_eq!(decision.candidates.len(), 1);
        assert_eq!(decision.candidates[0].comparison.tier, Tier::NoMatch);
        assert!(decision.linkable_bill().is_err());
    }

    #[test]
    fn test_two_candidates_disambiguate_sorted() {
        let decision = search(
            dec!(1000.00),
            vec![
                bill(1, 5, dec!(1000.00)),
                bill(2, 13, dec!(990.00)),
                bill(3, 13, dec!(1000.00)),
            ],
        );
        assert_eq!(decision.outcome, Outcome::Disambiguate);
        let ids: Vec<i64> = decision.candidates.iter().map(|c| c.bill.id).collect();
        // Newest first, then closest amount
        assert_eq!(ids, vec![3, 2, 1]);
        assert!(decision.chosen_bill_id.is_none());
    }

    #[test]
    fn test_confirm_picks_listed_candidate() {
        let decision = search(
            dec!(1000.00),
            vec![bill(1, 10, dec!(500.00)), bill(2, 13, dec!(1000.00))],
        );
        let confirmed = decision.clone().confirm(2).unwrap();
        assert_eq!(confirmed.outcome, Outcome::AutoLink);
        assert_eq!(confirmed.linkable_bill().unwrap(), 2);
        assert_eq!(confirmed.tier, Some(Tier::ExactMatch));
        assert!(!confirmed.mismatch);

        let mismatched = decision.clone().confirm(1).unwrap();
        assert!(mismatched.mismatch);

        assert!(matches!(decision.confirm(99), Err(Error::InvalidData(_))));
    }

    #[test]
    fn test_forced_bill_skips_tier_gating() {
        let decision = decide(
            "owner",
            cycle(),
            dec!(2000.00),
            3,
            Selection::Forced(bill(9, 1, dec!(100.00))),
            &Tolerances::default(),
        );
        assert_eq!(decision.outcome, Outcome::AutoLink);
        assert_eq!(decision.chosen_bill_id, Some(9));
        assert_eq!(decision.tier, Some(Tier::NoMatch));
        assert!(decision.forced);
        assert!(decision.mismatch);
    }

    #[test]
    fn test_existing_link_is_extended() {
        let decision = decide(
            "owner",
            cycle(),
            dec!(1030.00),
            1,
            Selection::Existing(bill(4, 13, dec!(1000.00))),
            &Tolerances::default(),
        );
        assert_eq!(decision.outcome, Outcome::AutoLink);
        assert_eq!(decision.chosen_bill_id, Some(4));
        assert!(!decision.forced);
        assert!(decision.mismatch);
    }
}
