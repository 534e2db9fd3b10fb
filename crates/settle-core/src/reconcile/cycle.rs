//! Billing cycle keys and candidate date windows
//!
//! A billing cycle is the `YYYY-MM` month a credit-card statement belongs to.
//! Bill payments usually land a couple of weeks after (or sometimes before)
//! the statement month, so bills are searched in the calendar month padded
//! on both sides by a tolerance in days.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Default padding (in days) around the cycle month when searching for bills
pub const DEFAULT_WINDOW_DAYS: i64 = 15;

/// Largest accepted padding; wider windows would span several statements
pub const MAX_WINDOW_DAYS: i64 = 366;

/// A `YYYY-MM` billing cycle key
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BillingCycle {
    year: i32,
    month: u32,
}

impl BillingCycle {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        // Round-trip through a real date so year/month bounds match chrono's
        NaiveDate::from_ymd_opt(year, month, 1).map(|_| Self { year, month })
    }

    /// The cycle a transaction date falls into
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn last_day(&self) -> NaiveDate {
        self.next().first_day().pred_opt().unwrap_or(NaiveDate::MAX)
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// Inclusive date range searched for bill payments of this cycle
    ///
    /// `window_days` is clamped to `0..=MAX_WINDOW_DAYS`; the range saturates
    /// at chrono's date limits.
    pub fn candidate_window(&self, window_days: i64) -> (NaiveDate, NaiveDate) {
        let pad = window_pad(window_days);
        (
            self.first_day().checked_sub_signed(pad).unwrap_or(NaiveDate::MIN),
            self.last_day().checked_add_signed(pad).unwrap_or(NaiveDate::MAX),
        )
    }

    /// Whether `date` lies inside this cycle's candidate window
    pub fn window_contains(&self, date: NaiveDate, window_days: i64) -> bool {
        let (start, end) = self.candidate_window(window_days);
        date >= start && date <= end
    }

    /// Every cycle whose candidate window contains `date`
    ///
    /// Used when a bill is created: it may pay the statement of its own month
    /// or of a neighbouring one.
    pub fn cycles_covering(date: NaiveDate, window_days: i64) -> Vec<Self> {
        let pad = window_pad(window_days);
        let mut cycles = Vec::new();
        let mut cycle = Self::of(date.checked_sub_signed(pad).unwrap_or(NaiveDate::MIN));
        let last = Self::of(date.checked_add_signed(pad).unwrap_or(NaiveDate::MAX));
        while cycle <= last {
            if cycle.window_contains(date, window_days) {
                cycles.push(cycle);
            }
            cycle = cycle.next();
        }
        cycles
    }
}

fn window_pad(window_days: i64) -> Duration {
    Duration::days(window_days.clamp(0, MAX_WINDOW_DAYS))
}

impl fmt::Display for BillingCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for BillingCycle {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let invalid = || Error::InvalidData(format!("Invalid billing cycle (use YYYY-MM): {}", s));
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(invalid());
        }
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        Self::new(year, month).ok_or_else(invalid)
    }
}

impl TryFrom<String> for BillingCycle {
    type Error = Error;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BillingCycle> for String {
    fn from(cycle: BillingCycle) -> Self {
        cycle.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_cycle_of_date() {
        assert_eq!(BillingCycle::of(date(2025, 12, 31)).to_string(), "2025-12");
        assert_eq!(BillingCycle::of(date(2024, 2, 29)).to_string(), "2024-02");
    }

    #[test]
    fn test_parse_cycle() {
        let cycle: BillingCycle = "2025-03".parse().unwrap();
        assert_eq!(cycle.year(), 2025);
        assert_eq!(cycle.month(), 3);

        assert!("2025-13".parse::<BillingCycle>().is_err());
        assert!("2025-3".parse::<BillingCycle>().is_err());
        assert!("202503".parse::<BillingCycle>().is_err());
        assert!("abcd-ef".parse::<BillingCycle>().is_err());
    }

    #[test]
    fn test_candidate_window_pads_calendar_month() {
        let cycle: BillingCycle = "2025-12".parse().unwrap();
        let (start, end) = cycle.candidate_window(DEFAULT_WINDOW_DAYS);
        assert_eq!(start, date(2025, 11, 16));
        assert_eq!(end, date(2026, 1, 15));
    }

    #[test]
    fn test_candidate_window_leap_february() {
        let cycle: BillingCycle = "2024-02".parse().unwrap();
        assert_eq!(cycle.last_day(), date(2024, 2, 29));
        let (start, end) = cycle.candidate_window(15);
        assert_eq!(start, date(2024, 1, 17));
        assert_eq!(end, date(2024, 3, 15));
    }

    #[test]
    fn test_candidate_window_clamps_padding() {
        let cycle: BillingCycle = "2025-12".parse().unwrap();
        let (start, end) = cycle.candidate_window(i64::MAX);
        assert_eq!(start, date(2024, 11, 30));
        assert_eq!(end, date(2027, 1, 1));

        assert_eq!(cycle.candidate_window(-5), (date(2025, 12, 1), date(2025, 12, 31)));

        // Saturates at the edge of the calendar instead of overflowing
        let last = BillingCycle::of(NaiveDate::MAX);
        let (_, end) = last.candidate_window(MAX_WINDOW_DAYS);
        assert_eq!(end, NaiveDate::MAX);
    }

    #[test]
    fn test_window_contains_edges() {
        let cycle: BillingCycle = "2025-06".parse().unwrap();
        assert!(cycle.window_contains(date(2025, 5, 17), 15));
        assert!(!cycle.window_contains(date(2025, 5, 16), 15));
        assert!(cycle.window_contains(date(2025, 7, 15), 15));
        assert!(!cycle.window_contains(date(2025, 7, 16), 15));
    }

    #[test]
    fn test_cycles_covering_bill_date() {
        // Jan 10 is inside the padded windows of December and January
        let cycles = BillingCycle::cycles_covering(date(2026, 1, 10), 15);
        let keys: Vec<String> = cycles.iter().map(|c| c.to_string()).collect();
        assert_eq!(keys, vec!["2025-12", "2026-01"]);

        // Jan 16 sits between December's and February's padded windows
        let cycles = BillingCycle::cycles_covering(date(2026, 1, 16), 15);
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].to_string(), "2026-01");
    }

    #[test]
    fn test_serde_as_string() {
        let cycle: BillingCycle = "2025-12".parse().unwrap();
        let json = serde_json::to_string(&cycle).unwrap();
        assert_eq!(json, "\"2025-12\"");
        let back: BillingCycle = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cycle);
        assert!(serde_json::from_str::<BillingCycle>("\"2025-1\"").is_err());
    }
}
