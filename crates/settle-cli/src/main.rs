//! Settle CLI - Credit-card statement reconciliation
//!
//! Usage:
//!   settle init                                  Initialize database
//!   settle import --file fatura.csv              Import a statement and reconcile it
//!   settle bill --date D --amount A --description T
//!                                                Record a bill payment
//!   settle reconcile --cycle 2025-12 [--bill ID] Reconcile a cycle
//!   settle unlink ID                             Undo a link
//!   settle archive ID [--undo]                   Hide or restore a transaction
//!   settle serve --port 3000                     Start web server

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let owner = cli.owner.as_str();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db, cli.no_encrypt),
        Commands::Import { file, cycle } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let config = commands::load_config(cli.config.as_deref())?;
            commands::cmd_import(&db, &config, owner, &file, cycle.as_deref()).map(|_| ())
        }
        Commands::Bill {
            date,
            amount,
            description,
            flag,
        } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let config = commands::load_config(cli.config.as_deref())?;
            commands::cmd_bill(&db, &config, owner, date, amount, &description, flag).map(|_| ())
        }
        Commands::Transactions { limit } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_transactions_list(&db, owner, limit)
        }
        Commands::Archive { id, undo } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_archive(&db, owner, id, !undo)
        }
        Commands::Delete { id } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_delete(&db, owner, id)
        }
        Commands::Pending => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_pending(&db, owner)
        }
        Commands::Reconcile { cycle, bill, force } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let config = commands::load_config(cli.config.as_deref())?;
            commands::cmd_reconcile(&db, &config, owner, &cycle, bill, force).map(|_| ())
        }
        Commands::Unlink { bill_id } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let config = commands::load_config(cli.config.as_deref())?;
            commands::cmd_unlink(&db, &config, owner, bill_id).map(|_| ())
        }
        Commands::Details { bill_id } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_details(&db, owner, bill_id)
        }
        Commands::Audit { limit } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_audit(&db, owner, limit)
        }
        Commands::Serve { port, host } => {
            let config = commands::load_config(cli.config.as_deref())?;
            commands::cmd_serve(&cli.db, &host, port, cli.no_encrypt, config).await
        }
    }
}
