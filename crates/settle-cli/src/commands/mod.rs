//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `bills` - Bill commands (record, details, unlink)
//! - `core` - Core commands (init) and shared utilities (open_db, load_config)
//! - `import` - Statement import
//! - `reconcile` - Pending cycles and manual reconcile
//! - `serve` - Web server command
//! - `transactions` - Transaction and audit listings

pub mod bills;
pub mod core;
pub mod import;
pub mod reconcile;
pub mod serve;
pub mod transactions;

// Re-export command functions for main.rs
pub use bills::*;
pub use core::*;
pub use import::*;
pub use reconcile::*;
pub use serve::*;
pub use transactions::*;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
