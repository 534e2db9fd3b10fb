//! Reconciliation configuration
//!
//! ## Configuration Resolution
//!
//! Config is loaded with a two-layer resolution:
//! 1. Check for override in data dir (~/.local/share/settle/config/reconcile.toml)
//! 2. Fall back to embedded defaults (compiled into binary)
//!
//! A path passed explicitly (`--config`) must exist.
//!
//! Keys missing from an override keep their default values.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::reconcile::candidates::DEFAULT_BILL_PATTERNS;
use crate::reconcile::{RegexBillMatcher, Tolerances, DEFAULT_WINDOW_DAYS, MAX_WINDOW_DAYS};

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/reconcile.toml");

/// Reconciliation policy
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileConfig {
    pub tolerances: Tolerances,
    /// Days of padding around the cycle month when searching for bills
    pub window_days: i64,
    /// Case-insensitive regexes for bill-payment descriptions
    pub bill_patterns: Vec<String>,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            tolerances: Tolerances::default(),
            window_days: DEFAULT_WINDOW_DAYS,
            bill_patterns: DEFAULT_BILL_PATTERNS.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl ReconcileConfig {
    /// Load from the default override location, else the embedded defaults
    pub fn load() -> Result<Self> {
        load_config(None)
    }

    /// Load from an explicit path, which must exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        load_config(Some(path))
    }

    /// Compile the configured bill patterns
    pub fn bill_matcher(&self) -> Result<RegexBillMatcher> {
        RegexBillMatcher::new(&self.bill_patterns)
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("settle").join("config").join("reconcile.toml"))
}

/// Load configuration (override first, then default)
fn load_config(override_path: Option<&Path>) -> Result<ReconcileConfig> {
    let path = override_path
        .map(Path::to_path_buf)
        .or_else(default_config_path)
        .filter(|p| p.exists());

    let content = match path {
        Some(path) => {
            debug!("Loading reconcile config from {}", path.display());
            fs::read_to_string(&path)
                .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?
        }
        None => DEFAULT_CONFIG.to_string(),
    };

    parse_config(&content)
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
struct RawConfig {
    tolerances: Option<RawTolerances>,
    window: Option<RawWindow>,
    bills: Option<RawBills>,
}

#[derive(Debug, Deserialize)]
struct RawTolerances {
    high_pct: Option<f64>,
    high_floor: Option<f64>,
    medium_pct: Option<f64>,
    medium_floor: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawWindow {
    days: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawBills {
    patterns: Option<Vec<String>>,
}

/// TOML floats go through their shortest decimal form so 0.005 stays 0.005
fn to_decimal(key: &str, value: f64) -> Result<Decimal> {
    if !value.is_finite() || value < 0.0 {
        return Err(Error::Config(format!("{} must be a non-negative number", key)));
    }
    Decimal::from_str(&value.to_string())
        .map_err(|e| Error::Config(format!("Invalid {}: {}", key, e)))
}

/// Parse config from TOML content
fn parse_config(content: &str) -> Result<ReconcileConfig> {
    let raw: RawConfig = toml::from_str(content)
        .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

    let mut config = ReconcileConfig::default();

    if let Some(tolerances) = raw.tolerances {
        if let Some(v) = tolerances.high_pct {
            config.tolerances.high_pct = to_decimal("high_pct", v)?;
        }
        if let Some(v) = tolerances.high_floor {
            config.tolerances.high_floor = to_decimal("high_floor", v)?;
        }
        if let Some(v) = tolerances.medium_pct {
            config.tolerances.medium_pct = to_decimal("medium_pct", v)?;
        }
        if let Some(v) = tolerances.medium_floor {
            config.tolerances.medium_floor = to_decimal("medium_floor", v)?;
        }
    }

    let t = &config.tolerances;
    if t.high_pct > t.medium_pct || t.high_floor > t.medium_floor {
        return Err(Error::Config(
            "High-confidence tolerances must not exceed medium-confidence ones".to_string(),
        ));
    }

    if let Some(days) = raw.window.and_then(|w| w.days) {
        if !(0..=MAX_WINDOW_DAYS).contains(&days) {
            return Err(Error::Config(format!(
                "window days must be between 0 and {}",
                MAX_WINDOW_DAYS
            )));
        }
        config.window_days = days;
    }

    if let Some(patterns) = raw.bills.and_then(|b| b.patterns) {
        config.bill_patterns = patterns;
    }

    // Fail at load time rather than on the first reconcile
    config.bill_matcher()?;

    Ok(config)
}
