//! Statement reconciliation
//!
//! Links the rows of a credit-card statement to the bank-side bill that paid
//! it. [`amount`] compares totals, [`cycle`] defines statement months and
//! their search windows, [`candidates`] finds bills, [`engine`] decides and
//! [`triggers`] wires decisions to the events that cause them.

pub mod amount;
pub mod candidates;
pub mod cycle;
pub mod engine;
pub mod triggers;

pub use amount::{compare, AmountComparison, Confidence, Tier, Tolerances};
pub use candidates::{BillCandidate, BillPredicate, RegexBillMatcher};
pub use cycle::{BillingCycle, DEFAULT_WINDOW_DAYS, MAX_WINDOW_DAYS};
pub use engine::{decide, MatchDecision, Outcome, Reconciler, ScoredCandidate, Selection};
pub use triggers::TriggerOutcome;
