//! HTTP request handlers organized by domain
//!
//! Each submodule contains handlers for a specific API area.

pub mod audit;
pub mod bills;
pub mod reconcile;
pub mod statements;
pub mod transactions;

// Re-export all handlers for use in router
pub use audit::*;
pub use bills::*;
pub use reconcile::*;
pub use statements::*;
pub use transactions::*;
