//! Settle Core Library
//!
//! Credit-card statement reconciliation for personal finances:
//! - Encrypted SQLite storage with migrations and an audit log
//! - Statement CSV import with per-cycle deduplication
//! - Amount comparison with confidence tiers
//! - Bill candidate search around each billing cycle
//! - Link/unlink of statement rows to the bill that paid them

pub mod config;
pub mod db;
pub mod error;
pub mod import;
pub mod models;
pub mod reconcile;

pub use config::ReconcileConfig;
pub use db::{AuditEntry, Database};
pub use error::{Error, Result};
pub use import::parse_statement;
pub use models::{
    BillState, CardLink, CycleStatus, ImportSummary, LinkResult, NewTransaction, PendingCycle,
    Transaction, TransactionKind, UnlinkResult,
};
pub use reconcile::{
    BillCandidate, BillingCycle, MatchDecision, Outcome, Reconciler, Tier, Tolerances,
    TriggerOutcome,
};
