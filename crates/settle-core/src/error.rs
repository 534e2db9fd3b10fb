//! Error types for Settle

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Import error: {0}")]
    Import(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// Unlink requested for a bill that has no active expansion
    #[error("Bill {bill_id} is not expanded, nothing to unlink")]
    NotExpanded { bill_id: i64 },

    /// Another writer changed the cycle or bill first; safe to retry
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A link was requested from a decision that never picked a bill
    #[error("Decision has no chosen bill")]
    NoBillChosen,
}

impl Error {
    /// Storage-class failures (the read/write layer itself broke)
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Pool(_) | Self::Io(_))
    }

    /// Errors the caller can fix by changing the request
    pub fn is_user_correctable(&self) -> bool {
        matches!(
            self,
            Self::NotExpanded { .. }
                | Self::InvalidData(_)
                | Self::NoBillChosen
                | Self::Import(_)
                | Self::Csv(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
