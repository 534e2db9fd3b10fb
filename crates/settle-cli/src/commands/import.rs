//! Statement import command

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::json;
use settle_core::db::Database;
use settle_core::import::parse_statement;
use settle_core::models::ImportSummary;
use settle_core::reconcile::{BillingCycle, Reconciler, TriggerOutcome};
use settle_core::ReconcileConfig;

use super::print_outcome;

pub fn cmd_import(
    db: &Database,
    config: &ReconcileConfig,
    owner: &str,
    file: &Path,
    cycle: Option<&str>,
) -> Result<(ImportSummary, TriggerOutcome)> {
    let cycle = cycle
        .map(|c| {
            c.parse::<BillingCycle>()
                .with_context(|| format!("Invalid billing cycle '{}', expected YYYY-MM", c))
        })
        .transpose()?;

    println!("📥 Importing statement from {}...", file.display());

    let reader =
        File::open(file).with_context(|| format!("Failed to open {}", file.display()))?;
    let rows = parse_statement(reader).context("Failed to parse statement")?;
    println!("   Parsed {} rows", rows.len());

    let summary = db.import_statement(owner, cycle, &rows)?;

    let details = json!({
        "billing_cycle": summary.billing_cycle,
        "imported": summary.imported,
        "skipped": summary.skipped,
        "file": file.display().to_string(),
    });
    db.log_audit(owner, "import", Some("statement"), None, Some(&details.to_string()))?;

    println!();
    println!("📊 Import Results ({})", summary.billing_cycle);
    println!("   ─────────────────────────────");
    println!("   Imported: {}", summary.imported);
    if summary.skipped > 0 {
        println!("   Skipped (already imported): {}", summary.skipped);
    }
    println!();

    let reconciler = Reconciler::with_config(db, config)?;
    let outcome = reconciler.after_statement_import(owner, summary.billing_cycle)?;
    print_outcome(&outcome);

    Ok((summary, outcome))
}
