//! Transaction and audit command implementations (list, archive, delete, audit)

use anyhow::Result;
use settle_core::db::Database;
use settle_core::models::TransactionKind;

use super::truncate;

pub fn cmd_transactions_list(db: &Database, owner: &str, limit: i64) -> Result<()> {
    let transactions = db.list_transactions(owner, limit, 0)?;

    if transactions.is_empty() {
        println!("No transactions found. Import a statement with:");
        println!("  settle import --file fatura.csv");
        return Ok(());
    }

    println!();
    println!("📝 Recent Transactions");
    println!("   ─────────────────────────────────────────────────────────────");

    for tx in transactions {
        let amount_str = match tx.kind {
            TransactionKind::Expense => format!("\x1b[31m{:.2}\x1b[0m", tx.amount), // Red for expenses
            TransactionKind::Income => format!("\x1b[32m+{:.2}\x1b[0m", tx.amount), // Green for income
        };

        let marker = if let Some(cycle) = tx.billing_cycle {
            if tx.card_link.is_linked() {
                format!("🔗 {}", cycle)
            } else {
                format!("⏳ {}", cycle)
            }
        } else if tx.bill_state.is_expanded() {
            "💳 expanded".to_string()
        } else if tx.is_credit_card_payment {
            "💳".to_string()
        } else {
            String::new()
        };

        println!(
            "   [{}] {} │ {:>10} │ {:<40} │ {}",
            tx.id,
            tx.date,
            amount_str,
            truncate(&tx.description, 40),
            marker
        );
    }

    Ok(())
}

pub fn cmd_archive(db: &Database, owner: &str, id: i64, archived: bool) -> Result<()> {
    db.set_transaction_archived(owner, id, archived)?;

    let action = if archived { "archive" } else { "unarchive" };
    db.log_audit(owner, action, Some("transaction"), Some(id), None)?;

    if archived {
        println!("📦 Archived transaction #{}", id);
    } else {
        println!("📤 Unarchived transaction #{}", id);
    }
    Ok(())
}

pub fn cmd_delete(db: &Database, owner: &str, id: i64) -> Result<()> {
    db.delete_transaction(owner, id)?;
    db.log_audit(owner, "delete", Some("transaction"), Some(id), None)?;

    println!("🗑️  Deleted transaction #{}", id);
    Ok(())
}

pub fn cmd_audit(db: &Database, owner: &str, limit: i64) -> Result<()> {
    let entries = db.list_audit_log(owner, limit)?;

    if entries.is_empty() {
        println!("No audit entries.");
        return Ok(());
    }

    println!();
    println!("📜 Audit Log");
    println!("   ─────────────────────────────────────────────────────────────");
    for entry in entries {
        let entity = match (entry.entity_type.as_deref(), entry.entity_id) {
            (Some(kind), Some(id)) => format!("{} #{}", kind, id),
            (Some(kind), None) => kind.to_string(),
            _ => String::new(),
        };
        println!(
            "   {} │ {:<12} │ {:<18} │ {}",
            entry.timestamp,
            entry.action,
            entity,
            truncate(entry.details.as_deref().unwrap_or(""), 50)
        );
    }

    Ok(())
}
