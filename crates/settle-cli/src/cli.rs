//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

/// Settle - Reconcile credit-card statements with the bills that paid them
#[derive(Parser)]
#[command(name = "settle")]
#[command(about = "Credit-card statement reconciliation", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "settle.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set SETTLE_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    /// Owner whose data is read and written
    #[arg(long, default_value = "local-dev", global = true)]
    pub owner: String,

    /// Reconciliation config file (defaults to the data dir override, then built-in defaults)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Import a credit-card statement CSV and reconcile its cycle
    Import {
        /// CSV file to import
        #[arg(short, long)]
        file: PathBuf,

        /// Billing cycle (YYYY-MM); defaults to the month of the latest row
        #[arg(short, long)]
        cycle: Option<String>,
    },

    /// Record a bill payment and reconcile pending statements
    Bill {
        /// Payment date (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,

        /// Amount paid
        #[arg(long)]
        amount: Decimal,

        /// Description as shown on the bank statement
        #[arg(long)]
        description: String,

        /// Mark as a credit-card bill even if the description does not look like one
        #[arg(long)]
        flag: bool,
    },

    /// List recent transactions
    Transactions {
        /// Number of transactions to show
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },

    /// Hide a transaction from listings and reconciliation
    Archive {
        /// Transaction ID
        id: i64,

        /// Unarchive instead
        #[arg(long)]
        undo: bool,
    },

    /// Delete a transaction (unlink an expanded bill first)
    Delete {
        /// Transaction ID
        id: i64,
    },

    /// Show cycles with statement rows waiting for a bill
    Pending,

    /// Reconcile a billing cycle
    Reconcile {
        /// Billing cycle (YYYY-MM)
        #[arg(short, long)]
        cycle: String,

        /// Bill to link (one of the listed candidates unless --force)
        #[arg(short, long)]
        bill: Option<i64>,

        /// Link --bill regardless of amount tolerance
        #[arg(long, requires = "bill")]
        force: bool,
    },

    /// Unlink a bill from its statement rows ("Desvincular")
    Unlink {
        /// Bill transaction ID
        bill_id: i64,
    },

    /// Show the statement rows absorbed by a bill
    Details {
        /// Bill transaction ID
        bill_id: i64,
    },

    /// Show the audit log
    Audit {
        /// Number of entries to show
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },

    /// Start the web server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },
}
