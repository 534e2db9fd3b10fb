//! Domain models for Settle

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::reconcile::{BillingCycle, Tier};

/// Direction of a transaction; amounts are always stored as magnitudes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    #[default]
    Expense,
    Income,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Expense => "expense",
            Self::Income => "income",
        }
    }
}

impl std::str::FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "expense" => Ok(Self::Expense),
            "income" => Ok(Self::Income),
            _ => Err(format!("Unknown transaction type: {}", s)),
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Link from a statement row to the bill that paid it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CardLink {
    #[default]
    Unlinked,
    Linked(i64),
}

impl CardLink {
    pub fn from_column(bill_id: Option<i64>) -> Self {
        bill_id.map_or(Self::Unlinked, Self::Linked)
    }

    pub fn bill_id(&self) -> Option<i64> {
        match self {
            Self::Unlinked => None,
            Self::Linked(id) => Some(*id),
        }
    }

    pub fn is_linked(&self) -> bool {
        matches!(self, Self::Linked(_))
    }
}

/// Whether a bill has absorbed statement detail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum BillState {
    #[default]
    Plain,
    Expanded {
        /// Bill amount before it was zeroed by the expansion
        original_amount: Decimal,
        expanded_at: DateTime<Utc>,
    },
}

impl BillState {
    /// Build from the nullable persistence columns
    ///
    /// `expanded_at` decides the state; a missing snapshot falls back to the
    /// row's current amount.
    pub fn from_columns(
        amount: Decimal,
        original_amount: Option<Decimal>,
        expanded_at: Option<DateTime<Utc>>,
    ) -> Self {
        match expanded_at {
            Some(expanded_at) => Self::Expanded {
                original_amount: original_amount.unwrap_or(amount),
                expanded_at,
            },
            None => Self::Plain,
        }
    }

    pub fn is_expanded(&self) -> bool {
        matches!(self, Self::Expanded { .. })
    }

    pub fn original_amount(&self) -> Option<Decimal> {
        match self {
            Self::Plain => None,
            Self::Expanded {
                original_amount, ..
            } => Some(*original_amount),
        }
    }
}

/// A transaction (statement row, bill payment or anything else)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub owner_id: String,
    pub date: NaiveDate,
    pub description: String,
    /// Positive magnitude; direction lives in `kind`
    pub amount: Decimal,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub category: Option<String>,
    /// Statement month, set only on credit-card statement rows
    pub billing_cycle: Option<BillingCycle>,
    pub card_link: CardLink,
    pub is_credit_card_payment: bool,
    pub bill_state: BillState,
    pub import_hash: Option<String>,
    /// JSON of the raw import row
    pub original_data: Option<String>,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// A statement row that no bill has absorbed yet
    pub fn is_pending(&self) -> bool {
        self.billing_cycle.is_some() && !self.card_link.is_linked()
    }

    /// Amount as it counts towards a statement total: refunds subtract
    pub fn signed_amount(&self) -> Decimal {
        match self.kind {
            TransactionKind::Expense => self.amount,
            TransactionKind::Income => -self.amount,
        }
    }
}

/// Net total a statement's rows add up to
pub fn statement_total(rows: &[Transaction]) -> Decimal {
    rows.iter().map(Transaction::signed_amount).sum()
}

/// Data for inserting a new transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub date: NaiveDate,
    pub description: String,
    pub amount: Decimal,
    #[serde(rename = "type", default)]
    pub kind: TransactionKind,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub billing_cycle: Option<BillingCycle>,
    #[serde(default)]
    pub is_credit_card_payment: bool,
    #[serde(default)]
    pub import_hash: Option<String>,
    #[serde(default)]
    pub original_data: Option<String>,
}

impl NewTransaction {
    /// A manually entered expense
    pub fn expense(date: NaiveDate, description: impl Into<String>, amount: Decimal) -> Self {
        Self {
            date,
            description: description.into(),
            amount: amount.abs(),
            kind: TransactionKind::Expense,
            category: None,
            billing_cycle: None,
            is_credit_card_payment: false,
            import_hash: None,
            original_data: None,
        }
    }

    /// Mark as an explicit credit-card bill payment
    pub fn flagged_as_bill(mut self) -> Self {
        self.is_credit_card_payment = true;
        self
    }
}

/// A cycle with statement rows waiting for a bill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingCycle {
    pub billing_cycle: BillingCycle,
    pub transaction_count: i64,
    /// Purchases minus refunds of the pending rows
    pub total: Decimal,
}

/// Reconciliation state of one (owner, cycle)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum CycleStatus {
    /// No statement rows for the cycle
    NoData,
    /// Rows exist and at least one is not linked
    Pending { count: i64 },
    /// Every row is linked to `bill_id`
    Linked { bill_id: i64, count: i64 },
}

/// Outcome of a statement import
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub billing_cycle: BillingCycle,
    pub imported: usize,
    /// Rows already present (same import hash)
    pub skipped: usize,
}

/// Persisted result of linking a cycle to a bill
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkResult {
    pub billing_cycle: BillingCycle,
    pub bill_id: i64,
    /// Rows newly linked by this call
    pub linked_count: usize,
    /// Rows of the cycle the bill holds after this call
    pub total_linked: usize,
    pub tier: Option<Tier>,
    pub amount_delta: Option<Decimal>,
    /// The cycle was already linked to this bill and nothing changed
    pub already_linked: bool,
    /// Linked by explicit user choice, bypassing tier gating
    pub forced: bool,
}

/// Persisted result of collapsing a bill
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlinkResult {
    pub bill_id: i64,
    pub billing_cycle: Option<BillingCycle>,
    pub restored_count: usize,
    /// Amount written back onto the bill
    pub restored_amount: Decimal,
}
