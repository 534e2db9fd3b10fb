//! Server command implementation

use std::path::Path;

use anyhow::Result;
use rust_decimal::Decimal;
use settle_core::ReconcileConfig;
use settle_server::ServerConfig;

use super::open_db;

pub async fn cmd_serve(
    db_path: &Path,
    host: &str,
    port: u16,
    no_encrypt: bool,
    reconcile: ReconcileConfig,
) -> Result<()> {
    println!("🚀 Starting Settle web server...");
    println!("   Database: {}", db_path.display());
    println!("   Listening: http://{}:{}", host, port);

    // Allowed CORS origins (comma-separated)
    let allowed_origins: Vec<String> = std::env::var("SETTLE_ALLOWED_ORIGINS")
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if !allowed_origins.is_empty() {
        println!("   CORS origins: {}", allowed_origins.join(", "));
    }

    println!(
        "   Tolerances: ±{}% / R$ {} (high), ±{}% / R$ {} (medium), window ±{} days",
        (reconcile.tolerances.high_pct * Decimal::ONE_HUNDRED).normalize(),
        reconcile.tolerances.high_floor,
        (reconcile.tolerances.medium_pct * Decimal::ONE_HUNDRED).normalize(),
        reconcile.tolerances.medium_floor,
        reconcile.window_days
    );
    println!();

    let db = open_db(db_path, no_encrypt)?;
    let config = ServerConfig {
        allowed_origins,
        reconcile,
    };

    settle_server::serve_with_config(db, host, port, config).await
}
