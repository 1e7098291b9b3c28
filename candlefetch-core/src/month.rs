//! Month addressing for archive files.
//!
//! One archive file covers one calendar month; the walk steps backward one
//! month at a time, so `MonthKey` only needs truncation, decrement, and the
//! `yyyymm` form used in URLs and filenames.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A (year, month) pair addressing one archive file.
///
/// Derived `Ord` is chronological because `year` precedes `month`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MonthKey {
    pub year: i32,
    /// 1-based calendar month.
    pub month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    /// Truncate a date to its (year, month).
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// The month the walk starts from: `offset_days` before `today`.
    pub fn start(today: NaiveDate, offset_days: i64) -> Self {
        Self::from_date(today - Duration::days(offset_days))
    }

    /// The previous calendar month (January wraps to December of the prior year).
    pub fn prev(&self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    /// Zero-padded `yyyymm` form used in archive URLs and filenames.
    pub fn yyyymm(&self) -> String {
        format!("{:04}{:02}", self.year, self.month)
    }

    /// Iterate from `from` backward to `floor` inclusive, one month at a time.
    ///
    /// Yields nothing if `from` is before `floor`. Strictly descending with no
    /// gaps — the walk's termination detection depends on this ordering.
    pub fn walk_back(from: MonthKey, floor: MonthKey) -> WalkBack {
        WalkBack {
            next: if from >= floor { Some(from) } else { None },
            floor,
        }
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.yyyymm())
    }
}

/// Descending month iterator with an enforced earliest boundary.
#[derive(Debug, Clone)]
pub struct WalkBack {
    next: Option<MonthKey>,
    floor: MonthKey,
}

impl Iterator for WalkBack {
    type Item = MonthKey;

    fn next(&mut self) -> Option<MonthKey> {
        let current = self.next?;
        self.next = if current > self.floor {
            Some(current.prev())
        } else {
            None
        };
        Some(current)
    }
}
