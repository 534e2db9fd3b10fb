//! Reconciliation command implementations

use anyhow::{Context, Result};
use settle_core::db::Database;
use settle_core::reconcile::{BillingCycle, Reconciler, Tier, TriggerOutcome};
use settle_core::ReconcileConfig;

use super::truncate;

pub fn cmd_pending(db: &Database, owner: &str) -> Result<()> {
    let cycles = db.list_pending_cycles(owner)?;

    if cycles.is_empty() {
        println!("✅ No pending statements. Everything is reconciled.");
        return Ok(());
    }

    println!();
    println!("⏳ Pending Statements");
    println!("   ─────────────────────────────");
    for cycle in cycles {
        println!(
            "   {} │ {:>3} rows │ R$ {:>10.2}",
            cycle.billing_cycle, cycle.transaction_count, cycle.total
        );
    }
    println!();
    println!("   Record the bill with 'settle bill' or run 'settle reconcile --cycle YYYY-MM'.");

    Ok(())
}

/// Manual reconcile; returns the outcome for callers that chain on it
pub fn cmd_reconcile(
    db: &Database,
    config: &ReconcileConfig,
    owner: &str,
    cycle: &str,
    bill_id: Option<i64>,
    force: bool,
) -> Result<TriggerOutcome> {
    let cycle: BillingCycle = cycle
        .parse()
        .with_context(|| format!("Invalid billing cycle '{}', expected YYYY-MM", cycle))?;
    if force && bill_id.is_none() {
        anyhow::bail!("--force requires --bill");
    }

    let (forced, confirmed) = if force { (bill_id, None) } else { (None, bill_id) };

    let reconciler = Reconciler::with_config(db, config)?;
    let outcome = reconciler.reconcile_on_demand(owner, cycle, forced, confirmed)?;

    print_outcome(&outcome);
    Ok(outcome)
}

/// Human summary of what a trigger did
pub fn print_outcome(outcome: &TriggerOutcome) {
    match outcome {
        TriggerOutcome::Linked(link) if link.already_linked => {
            println!(
                "✅ {} is already linked to bill #{} ({} row(s))",
                link.billing_cycle, link.bill_id, link.total_linked
            );
        }
        TriggerOutcome::Linked(link) => {
            println!(
                "🔗 Linked {} row(s) of {} to bill #{}",
                link.linked_count, link.billing_cycle, link.bill_id
            );
            match (link.tier, link.amount_delta) {
                (Some(Tier::ExactMatch), _) | (None, _) => {}
                (Some(Tier::NoMatch), Some(delta)) => {
                    println!("   ⚠️  Amounts differ by R$ {:.2} (outside tolerance)", delta)
                }
                (Some(tier), Some(delta)) => {
                    println!("   Δ R$ {:.2} ({})", delta, tier)
                }
                (Some(_), None) => {}
            }
        }
        TriggerOutcome::NeedsSelection(decision) => {
            println!(
                "🤔 {} needs a bill: statement total R$ {:.2}",
                decision.billing_cycle, decision.cc_total
            );
            println!("   ─────────────────────────────────────────────────────────────");
            for candidate in &decision.candidates {
                println!(
                    "   [{}] {} │ R$ {:>10.2} │ Δ {:>8.2} │ {:<17} │ {}",
                    candidate.bill.id,
                    candidate.bill.date,
                    candidate.bill.amount,
                    candidate.comparison.delta_abs,
                    candidate.comparison.tier,
                    truncate(&candidate.bill.description, 30)
                );
            }
            println!();
            println!(
                "   Pick one with 'settle reconcile --cycle {} --bill <id>'",
                decision.billing_cycle
            );
        }
        TriggerOutcome::StillPending {
            billing_cycle,
            pending_count,
        } => {
            println!(
                "⏳ {} row(s) of {} wait for a bill payment",
                pending_count, billing_cycle
            );
        }
        TriggerOutcome::NothingToDo { billing_cycle } => {
            println!("✅ Nothing pending for {}", billing_cycle);
        }
    }
}
