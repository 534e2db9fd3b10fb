//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `load_config` - Reconciliation config resolution
//! - `cmd_init` - Initialize the database

use std::path::Path;

use anyhow::{Context, Result};
use settle_core::db::Database;
use settle_core::ReconcileConfig;

/// Open database with encryption by default, or unencrypted if --no-encrypt
pub fn open_db(db_path: &Path, no_encrypt: bool) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .context("Database path is not valid UTF-8")?;
    if no_encrypt {
        Database::new_unencrypted(path_str).context("Failed to open database (unencrypted)")
    } else {
        Database::new(path_str).context("Failed to open database")
    }
}

/// Explicit --config path, else the data dir override, else built-in defaults
pub fn load_config(path: Option<&Path>) -> Result<ReconcileConfig> {
    match path {
        Some(path) => ReconcileConfig::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => ReconcileConfig::load().context("Failed to load reconciliation config"),
    }
}

pub fn cmd_init(db_path: &Path, no_encrypt: bool) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    open_db(db_path, no_encrypt)?;

    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else {
        println!("   🔒 Encryption: ENABLED");
    }

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Import a card statement: settle import --file fatura.csv");
    println!("  2. Record the bill payment: settle bill --date 2026-01-13 --amount 1124.77 --description \"Pagamento de fatura\"");
    println!("  3. Start web API: settle serve");

    Ok(())
}
