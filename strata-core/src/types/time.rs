//! Time units and bucket-date truncation.
//!
//! Every materialized metric value is keyed by a date truncated to the start
//! of its time unit's period. Truncation is idempotent and uses fixed
//! calendar conventions: ISO weeks start Monday, month/quarter/year use
//! calendar boundaries.

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};

/// Granularity of a materialized metric bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

/// Roll-up targets, each derived directly from day granularity.
/// There is no week→month or month→quarter chaining: deriving every coarser
/// unit from day avoids compounding partial-bucket errors.
pub const ROLLUP_UNITS: [TimeUnit; 4] =
    [TimeUnit::Week, TimeUnit::Month, TimeUnit::Quarter, TimeUnit::Year];

impl TimeUnit {
    /// Stable single-letter abbreviation used in storage keys.
    pub fn abbrev(&self) -> &'static str {
        match self {
            TimeUnit::Day => "d",
            TimeUnit::Week => "w",
            TimeUnit::Month => "m",
            TimeUnit::Quarter => "q",
            TimeUnit::Year => "y",
        }
    }

    /// Inverse of [`abbrev`](Self::abbrev). Returns `None` for unknown input.
    pub fn from_abbrev(s: &str) -> Option<Self> {
        match s {
            "d" => Some(TimeUnit::Day),
            "w" => Some(TimeUnit::Week),
            "m" => Some(TimeUnit::Month),
            "q" => Some(TimeUnit::Quarter),
            "y" => Some(TimeUnit::Year),
            _ => None,
        }
    }

    /// Truncate `date` to the start of the period containing it.
    ///
    /// Idempotent: truncating an already-truncated date is a no-op.
    pub fn truncate(&self, date: NaiveDate) -> NaiveDate {
        match self {
            TimeUnit::Day => date,
            TimeUnit::Week => {
                let back = date.weekday().num_days_from_monday() as u64;
                date - Days::new(back)
            }
            TimeUnit::Month => first_of_month(date.year(), date.month()),
            TimeUnit::Quarter => {
                let quarter_start_month = ((date.month0() / 3) * 3) + 1;
                first_of_month(date.year(), quarter_start_month)
            }
            TimeUnit::Year => first_of_month(date.year(), 1),
        }
    }

    /// Start of the period immediately following the one containing `date`.
    pub fn next_period_start(&self, date: NaiveDate) -> NaiveDate {
        let start = self.truncate(date);
        match self {
            TimeUnit::Day => start + Days::new(1),
            TimeUnit::Week => start + Days::new(7),
            TimeUnit::Month => add_months(start, 1),
            TimeUnit::Quarter => add_months(start, 3),
            TimeUnit::Year => add_months(start, 12),
        }
    }

    /// Last day of the period containing `date` (inclusive).
    pub fn period_end(&self, date: NaiveDate) -> NaiveDate {
        self.next_period_start(date) - Days::new(1)
    }
}

impl std::fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TimeUnit::Day => "day",
            TimeUnit::Week => "week",
            TimeUnit::Month => "month",
            TimeUnit::Quarter => "quarter",
            TimeUnit::Year => "year",
        };
        f.write_str(s)
    }
}

fn first_of_month(year: i32, month: u32) -> NaiveDate {
    // month is always 1..=12 here; construction cannot fail.
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN)
}

fn add_months(date: NaiveDate, months: u32) -> NaiveDate {
    let zero_based = date.month0() + months;
    let year = date.year() + (zero_based / 12) as i32;
    let month = (zero_based % 12) + 1;
    first_of_month(year, month)
}

/// An inclusive day-granularity date window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Self {
        Self { from, to }
    }

    /// Extend both ends to full `unit` boundaries, so partial periods are
    /// never aggregated.
    pub fn widen(&self, unit: TimeUnit) -> DateRange {
        DateRange {
            from: unit.truncate(self.from),
            to: unit.period_end(self.to),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.from && date <= self.to
    }

    /// Iterate every day in the window, inclusive.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        let mut current = self.from;
        let to = self.to;
        std::iter::from_fn(move || {
            if current > to {
                return None;
            }
            let d = current;
            current = current + Days::new(1);
            Some(d)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn week_truncates_to_monday() {
        // 2024-01-15 is a Monday; the following Sunday truncates back to it.
        assert_eq!(TimeUnit::Week.truncate(d(2024, 1, 15)), d(2024, 1, 15));
        assert_eq!(TimeUnit::Week.truncate(d(2024, 1, 21)), d(2024, 1, 15));
        assert_eq!(TimeUnit::Week.truncate(d(2024, 1, 17)), d(2024, 1, 15));
    }

    #[test]
    fn quarter_boundaries() {
        assert_eq!(TimeUnit::Quarter.truncate(d(2024, 2, 29)), d(2024, 1, 1));
        assert_eq!(TimeUnit::Quarter.truncate(d(2024, 6, 30)), d(2024, 4, 1));
        assert_eq!(TimeUnit::Quarter.truncate(d(2024, 12, 31)), d(2024, 10, 1));
    }

    #[test]
    fn truncation_is_idempotent() {
        for unit in [TimeUnit::Day, TimeUnit::Week, TimeUnit::Month, TimeUnit::Quarter, TimeUnit::Year] {
            let once = unit.truncate(d(2023, 11, 17));
            assert_eq!(unit.truncate(once), once, "{unit} truncation not idempotent");
        }
    }

    #[test]
    fn period_end_is_inclusive_last_day() {
        assert_eq!(TimeUnit::Month.period_end(d(2024, 2, 10)), d(2024, 2, 29));
        assert_eq!(TimeUnit::Year.period_end(d(2023, 5, 1)), d(2023, 12, 31));
        assert_eq!(TimeUnit::Week.period_end(d(2024, 1, 17)), d(2024, 1, 21));
    }

    #[test]
    fn widen_covers_full_periods() {
        let range = DateRange::new(d(2024, 1, 15), d(2024, 2, 3));
        let widened = range.widen(TimeUnit::Month);
        assert_eq!(widened.from, d(2024, 1, 1));
        assert_eq!(widened.to, d(2024, 2, 29));
    }

    #[test]
    fn days_iterates_inclusive() {
        let range = DateRange::new(d(2024, 1, 30), d(2024, 2, 2));
        let days: Vec<_> = range.days().collect();
        assert_eq!(days, vec![d(2024, 1, 30), d(2024, 1, 31), d(2024, 2, 1), d(2024, 2, 2)]);
    }

    #[test]
    fn year_rollover_in_add_months() {
        assert_eq!(TimeUnit::Quarter.next_period_start(d(2024, 11, 5)), d(2025, 1, 1));
        assert_eq!(TimeUnit::Month.next_period_start(d(2024, 12, 31)), d(2025, 1, 1));
    }
}
