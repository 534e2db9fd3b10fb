//! Bill candidate search
//!
//! A bill candidate is an expense that pays a credit-card statement: either
//! flagged explicitly (`is_credit_card_payment`) or recognised by its
//! description. Candidates already absorbed by another statement are skipped.

use chrono::NaiveDate;
use regex::{Regex, RegexBuilder};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::cycle::BillingCycle;
use crate::db::Database;
use crate::error::Result;
use crate::models::Transaction;

/// Description patterns for bill payments (pt-BR and English bank wording)
pub const DEFAULT_BILL_PATTERNS: &[&str] = &[
    r"pagamento\s+(de\s+|da\s+)?fatura",
    r"pgto\.?\s+(de\s+)?fatura",
    r"fatura\s+(do\s+)?cart[aã]o",
    r"cart[aã]o\s+de\s+cr[eé]dito",
    r"credit\s+card",
    r"card\s+bill",
    r"bill\s+payment",
];

/// Decides whether a description looks like a credit-card bill payment
pub trait BillPredicate: Send + Sync {
    fn is_bill_like(&self, description: &str) -> bool;
}

/// Case-insensitive regex matcher over transaction descriptions
#[derive(Debug, Clone)]
pub struct RegexBillMatcher {
    patterns: Vec<Regex>,
}

impl RegexBillMatcher {
    /// Compile a matcher from user-provided patterns
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                RegexBuilder::new(p.as_ref())
                    .case_insensitive(true)
                    .build()
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }
}

impl Default for RegexBillMatcher {
    fn default() -> Self {
        // Built-in patterns are known-good literals
        let patterns = DEFAULT_BILL_PATTERNS
            .iter()
            .filter_map(|p| RegexBuilder::new(p).case_insensitive(true).build().ok())
            .collect();
        Self { patterns }
    }
}

impl BillPredicate for RegexBillMatcher {
    fn is_bill_like(&self, description: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(description))
    }
}

/// An expense that may pay a cycle's statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillCandidate {
    pub id: i64,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub description: String,
    pub category: Option<String>,
    pub is_credit_card_payment: bool,
}

impl From<&Transaction> for BillCandidate {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: tx.id,
            date: tx.date,
            amount: tx.amount,
            description: tx.description.clone(),
            category: tx.category.clone(),
            is_credit_card_payment: tx.is_credit_card_payment,
        }
    }
}

/// Find bill candidates for a cycle on an existing connection
///
/// Ordered by date descending then id; the engine refines ties by amount delta.
pub fn find_candidates(
    conn: &Connection,
    owner_id: &str,
    cycle: BillingCycle,
    window_days: i64,
    predicate: &dyn BillPredicate,
) -> Result<Vec<BillCandidate>> {
    let (start, end) = cycle.candidate_window(window_days);
    let rows = Database::query_open_expenses(conn, owner_id, start, end)?;

    let mut candidates: Vec<BillCandidate> = rows
        .iter()
        .filter(|tx| tx.is_credit_card_payment || predicate.is_bill_like(&tx.description))
        .map(BillCandidate::from)
        .collect();

    candidates.sort_by(|a, b| b.date.cmp(&a.date).then(a.id.cmp(&b.id)));
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_patterns_match_bill_wording() {
        let matcher = RegexBillMatcher::default();
        assert!(matcher.is_bill_like("Pagamento de fatura"));
        assert!(matcher.is_bill_like("PAGAMENTO FATURA NUBANK"));
        assert!(matcher.is_bill_like("Pgto. fatura Itau"));
        assert!(matcher.is_bill_like("Fatura cartão"));
        assert!(matcher.is_bill_like("FATURA DO CARTAO"));
        assert!(matcher.is_bill_like("Cartão de Crédito Inter"));
        assert!(matcher.is_bill_like("CHASE CREDIT CARD AUTOPAY"));
        assert!(matcher.is_bill_like("Card bill"));
        assert!(matcher.is_bill_like("Online bill payment"));
    }

    #[test]
    fn test_default_patterns_reject_purchases() {
        let matcher = RegexBillMatcher::default();
        assert!(!matcher.is_bill_like("Supermercado Extra"));
        assert!(!matcher.is_bill_like("Uber *trip"));
        assert!(!matcher.is_bill_like("Pagamento de boleto"));
        assert!(!matcher.is_bill_like("Cartão presente"));
    }

    #[test]
    fn test_custom_patterns() {
        let matcher = RegexBillMatcher::new(&["^acerto mensal"]).unwrap();
        assert!(matcher.is_bill_like("ACERTO MENSAL 12/2025"));
        assert!(!matcher.is_bill_like("Pagamento de fatura"));
    }

    #[test]
    fn test_invalid_pattern_is_an_error() {
        assert!(RegexBillMatcher::new(&["fatura("]).is_err());
    }
}
