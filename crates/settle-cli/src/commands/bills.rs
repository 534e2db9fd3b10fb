//! Bill command implementations (record, details, unlink)

use anyhow::Result;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use settle_core::db::Database;
use settle_core::models::{NewTransaction, Transaction, UnlinkResult};
use settle_core::reconcile::Reconciler;
use settle_core::ReconcileConfig;

use super::{print_outcome, truncate};

/// Record a bill payment and run the bill trigger
pub fn cmd_bill(
    db: &Database,
    config: &ReconcileConfig,
    owner: &str,
    date: NaiveDate,
    amount: Decimal,
    description: &str,
    flag: bool,
) -> Result<Transaction> {
    let reconciler = Reconciler::with_config(db, config)?;

    let mut new_tx = NewTransaction::expense(date, description, amount);
    if flag {
        new_tx = new_tx.flagged_as_bill();
    }
    let new_tx = reconciler.classify(new_tx);

    let bill = db.create_transaction(owner, &new_tx)?;
    db.log_audit(
        owner,
        "create",
        Some("transaction"),
        Some(bill.id),
        Some(&format!("bill={}", bill.is_credit_card_payment)),
    )?;

    println!(
        "💳 Recorded #{} {} R$ {:.2} {}",
        bill.id, bill.date, bill.amount, bill.description
    );
    if !bill.is_credit_card_payment {
        println!("   Not recognised as a card bill; use --flag to mark it explicitly.");
        return Ok(bill);
    }

    let outcomes = reconciler.after_bill_created(owner, &bill)?;
    if outcomes.is_empty() {
        println!("   No pending statement in range.");
    }
    for outcome in &outcomes {
        print_outcome(outcome);
    }

    Ok(bill)
}

pub fn cmd_details(db: &Database, owner: &str, bill_id: i64) -> Result<()> {
    let bill = db
        .get_transaction(owner, bill_id)?
        .ok_or_else(|| anyhow::anyhow!("Transaction {} not found", bill_id))?;

    println!();
    println!("💳 Bill #{} │ {} │ {}", bill.id, bill.date, bill.description);
    match bill.bill_state.original_amount() {
        Some(original) => println!("   Paid: R$ {:.2} (expanded into statement detail)", original),
        None => println!("   Paid: R$ {:.2}", bill.amount),
    }

    let rows = db.linked_rows(owner, bill_id)?;
    if rows.is_empty() {
        println!("   No statement rows linked.");
        return Ok(());
    }

    println!("   ─────────────────────────────────────────────────────────────");
    let mut total = Decimal::ZERO;
    for row in &rows {
        total += row.amount;
        println!(
            "   {} │ R$ {:>10.2} │ {}",
            row.date,
            row.amount,
            truncate(&row.description, 40)
        );
    }
    println!("   ─────────────────────────────────────────────────────────────");
    println!("   {} row(s), R$ {:.2}", rows.len(), total);

    Ok(())
}

pub fn cmd_unlink(
    db: &Database,
    config: &ReconcileConfig,
    owner: &str,
    bill_id: i64,
) -> Result<UnlinkResult> {
    let reconciler = Reconciler::with_config(db, config)?;
    let result = reconciler.unlink(owner, bill_id)?;

    let cycle = result
        .billing_cycle
        .map(|c| c.to_string())
        .unwrap_or_else(|| "-".to_string());
    println!(
        "✂️  Unlinked bill #{}: {} row(s) of {} are pending again",
        result.bill_id, result.restored_count, cycle
    );
    println!("   Bill amount restored to R$ {:.2}", result.restored_amount);

    Ok(result)
}
