//! Credit-card statement CSV parser
//!
//! Statements only need three columns: a date, a title and an amount. Column
//! names are matched case-insensitively in English or Portuguese, so exports
//! from most Brazilian card issuers (`data,lançamento,valor`) and the common
//! `date,title,amount` layout both work. Positive amounts are purchases and
//! negative amounts are refunds. Credits for the previous bill's payment
//! ("Pagamento recebido") are dropped: they settle another statement.

use std::collections::HashMap;
use std::io::Read;
use std::str::FromStr;

use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord};
use regex::{Regex, RegexBuilder};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{NewTransaction, TransactionKind};
use crate::reconcile::BillingCycle;

const DATE_HEADERS: &[&str] = &["date", "data"];
const TITLE_HEADERS: &[&str] = &[
    "title",
    "description",
    "descrição",
    "descricao",
    "lançamento",
    "lancamento",
];
const AMOUNT_HEADERS: &[&str] = &["amount", "valor"];
const CATEGORY_HEADERS: &[&str] = &["category", "categoria"];

/// Credit rows that record the payment of an earlier bill
const PAYMENT_CREDIT_PATTERNS: &[&str] = &[
    r"^pagamento\s+(recebido|efetuado)",
    r"^pgto\.?\s+(recebido|efetuado)",
    r"^pagamento\s+(de\s+|da\s+)?fatura",
    r"^payment\s+(received|thank\s+you)",
    r"^payment\s*-\s*thank\s+you",
];

fn payment_credit_matchers() -> Result<Vec<Regex>> {
    PAYMENT_CREDIT_PATTERNS
        .iter()
        .map(|p| {
            RegexBuilder::new(p)
                .case_insensitive(true)
                .build()
                .map_err(Error::from)
        })
        .collect()
}

/// Convert a CSV record to a JSON object using headers as keys
fn record_to_json(headers: &StringRecord, record: &StringRecord) -> String {
    let mut map = serde_json::Map::new();
    for (i, header) in headers.iter().enumerate() {
        if let Some(value) = record.get(i) {
            map.insert(header.to_string(), Value::String(value.to_string()));
        }
    }
    json!(map).to_string()
}

fn find_column(headers: &StringRecord, names: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| names.contains(&h.trim().trim_start_matches('\u{feff}').to_lowercase().as_str()))
}

/// Parse a statement CSV into pending statement rows
///
/// Rows come back without a billing cycle or import hash; both are assigned
/// by [`Database::import_statement`](crate::db::Database::import_statement).
pub fn parse_statement<R: Read>(reader: R) -> Result<Vec<NewTransaction>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let date_col = find_column(&headers, DATE_HEADERS)
        .ok_or_else(|| Error::Import("Missing date column (date/data)".into()))?;
    let title_col = find_column(&headers, TITLE_HEADERS)
        .ok_or_else(|| Error::Import("Missing title column (title/description/lançamento)".into()))?;
    let amount_col = find_column(&headers, AMOUNT_HEADERS)
        .ok_or_else(|| Error::Import("Missing amount column (amount/valor)".into()))?;
    let category_col = find_column(&headers, CATEGORY_HEADERS);
    let payment_credits = payment_credit_matchers()?;

    let mut transactions = Vec::new();
    let mut skipped_payments = 0;

    for (line, result) in rdr.records().enumerate() {
        let record = result?;

        // Skip blank trailer lines some issuers append
        if record.iter().all(|f| f.is_empty()) {
            continue;
        }

        let row = line + 2; // 1-based, after the header
        let date_str = record
            .get(date_col)
            .ok_or_else(|| Error::Import(format!("Row {}: missing date", row)))?;
        let date = parse_date(date_str)
            .ok_or_else(|| Error::Import(format!("Row {}: unable to parse date '{}'", row, date_str)))?;

        let description = record
            .get(title_col)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::Import(format!("Row {}: missing title", row)))?
            .to_string();

        let amount_str = record
            .get(amount_col)
            .ok_or_else(|| Error::Import(format!("Row {}: missing amount", row)))?;
        let amount = parse_amount(amount_str).ok_or_else(|| {
            Error::Import(format!("Row {}: unable to parse amount '{}'", row, amount_str))
        })?;

        let category = category_col
            .and_then(|i| record.get(i))
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string());

        let kind = if amount.is_sign_negative() {
            if payment_credits.iter().any(|re| re.is_match(description.trim())) {
                skipped_payments += 1;
                continue;
            }
            TransactionKind::Income
        } else {
            TransactionKind::Expense
        };

        transactions.push(NewTransaction {
            date,
            description,
            amount: amount.abs(),
            kind,
            category,
            billing_cycle: None,
            is_credit_card_payment: false,
            import_hash: None,
            original_data: Some(record_to_json(&headers, &record)),
        });
    }

    debug!(
        rows = transactions.len(),
        skipped_payments,
        "Parsed statement rows"
    );
    Ok(transactions)
}

/// Deduplication hash of a statement row
///
/// `occurrence` numbers identical rows within one statement so two equal
/// purchases on the same day both survive.
pub fn statement_row_hash(
    owner_id: &str,
    cycle: BillingCycle,
    tx: &NewTransaction,
    occurrence: usize,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(owner_id.as_bytes());
    hasher.update(cycle.to_string().as_bytes());
    hasher.update(tx.date.to_string().as_bytes());
    hasher.update(tx.description.as_bytes());
    hasher.update(tx.amount.normalize().to_string().as_bytes());
    hasher.update(tx.kind.as_str().as_bytes());
    hasher.update((occurrence as u64).to_be_bytes());
    hex::encode(hasher.finalize())
}

/// Assign cycle and import hash to parsed rows
pub(crate) fn stamp_statement_rows(
    owner_id: &str,
    cycle: BillingCycle,
    rows: &[NewTransaction],
) -> Vec<NewTransaction> {
    let mut seen: HashMap<(NaiveDate, &str, Decimal, TransactionKind), usize> = HashMap::new();
    rows.iter()
        .map(|tx| {
            let key = (tx.date, tx.description.as_str(), tx.amount.normalize(), tx.kind);
            let occurrence = seen.entry(key).or_insert(0);
            let hash = statement_row_hash(owner_id, cycle, tx, *occurrence);
            *occurrence += 1;

            let mut stamped = tx.clone();
            stamped.billing_cycle = Some(cycle);
            stamped.is_credit_card_payment = false;
            stamped.import_hash = Some(hash);
            stamped
        })
        .collect()
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();

    let formats = [
        "%Y-%m-%d", // 2025-12-03
        "%d/%m/%Y", // 03/12/2025
    ];

    formats
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

/// Parse an amount, accepting `R$`, thousands separators and decimal comma
fn parse_amount(s: &str) -> Option<Decimal> {
    let mut cleaned: String = s
        .trim()
        .replace("R$", "")
        .replace(['$', ' ', '\u{a0}'], "")
        .replace('(', "-")
        .replace(')', "");

    match (cleaned.rfind(','), cleaned.rfind('.')) {
        // 1.234,56 -> comma is the decimal separator
        (Some(comma), Some(dot)) if comma > dot => {
            cleaned = cleaned.replace('.', "").replace(',', ".");
        }
        // 1,234.56
        (Some(_), Some(_)) => {
            cleaned = cleaned.replace(',', "");
        }
        (Some(comma), None) => {
            let decimals = cleaned.len() - comma - 1;
            if cleaned.matches(',').count() == 1 && decimals <= 2 {
                // 49,90
                cleaned = cleaned.replace(',', ".");
            } else {
                // 1,234,567
                cleaned = cleaned.replace(',', "");
            }
        }
        (None, Some(_)) if cleaned.matches('.').count() > 1 => {
            // 1.234.567
            cleaned = cleaned.replace('.', "");
        }
        _ => {}
    }

    Decimal::from_str(&cleaned).ok().map(|d| d.round_dp(2))
}
