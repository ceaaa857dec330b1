//! Calendar math for scoping queries to a period.
//!
//! All ranges are half-open `[start, end)` in UTC. Weeks start on Monday.

use chrono::{DateTime, Datelike, Days, Duration, Months, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateRangeError {
    #[error("range start must be before range end")]
    InvalidOrder,
    #[error("custom filter requires both start and end")]
    MissingBounds,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, DateRangeError> {
        if start >= end {
            return Err(DateRangeError::InvalidOrder);
        }
        Ok(Self { start, end })
    }

    /// The Monday-to-Monday week containing `t`.
    pub fn week_of(t: DateTime<Utc>) -> Self {
        let start = start_of_week(t);
        Self {
            start,
            end: start + Duration::days(7),
        }
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        t >= self.start && t < self.end
    }

    /// Monday starts of every week that overlaps the range.
    pub fn weeks(&self) -> Vec<DateTime<Utc>> {
        let mut weeks = Vec::new();
        let mut cursor = start_of_week(self.start);
        while cursor < self.end {
            weeks.push(cursor);
            cursor += Duration::days(7);
        }
        weeks
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimeFilter {
    Today,
    Yesterday,
    ThisWeek,
    LastWeek,
    ThisMonth,
    LastMonth,
    ThisQuarter,
    ThisYear,
    #[serde(rename = "last_7_days")]
    Last7Days,
    #[serde(rename = "last_30_days")]
    Last30Days,
    #[serde(rename = "last_90_days")]
    Last90Days,
    #[default]
    AllTime,
    Custom,
}

impl TimeFilter {
    /// Resolve a preset against `now`. `AllTime` and `Custom` have no preset range.
    pub fn range(self, now: DateTime<Utc>) -> Option<DateRange> {
        let day = start_of_day(now);
        let week = start_of_week(now);
        let month = start_of_month(now);
        let (start, end) = match self {
            TimeFilter::Today => (day, day + Duration::days(1)),
            TimeFilter::Yesterday => (day - Duration::days(1), day),
            TimeFilter::ThisWeek => (week, week + Duration::days(7)),
            TimeFilter::LastWeek => (week - Duration::days(7), week),
            TimeFilter::ThisMonth => (month, add_months(month, 1)),
            TimeFilter::LastMonth => (sub_months(month, 1), month),
            TimeFilter::ThisQuarter => {
                let quarter = start_of_quarter(now);
                (quarter, add_months(quarter, 3))
            }
            TimeFilter::ThisYear => {
                let year = start_of_year(now);
                (year, add_months(year, 12))
            }
            TimeFilter::Last7Days => (now - Duration::days(7), now),
            TimeFilter::Last30Days => (now - Duration::days(30), now),
            TimeFilter::Last90Days => (now - Duration::days(90), now),
            TimeFilter::AllTime | TimeFilter::Custom => return None,
        };
        Some(DateRange { start, end })
    }
}

/// Query-string shape accepted by list and report routes.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct TimeFilterQuery {
    pub filter: Option<TimeFilter>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeFilterQuery {
    /// `Ok(None)` means unbounded. Explicit bounds without a filter are treated as `custom`.
    pub fn resolve(&self, now: DateTime<Utc>) -> Result<Option<DateRange>, DateRangeError> {
        let filter = match self.filter {
            Some(filter) => filter,
            None if self.start.is_some() || self.end.is_some() => TimeFilter::Custom,
            None => TimeFilter::AllTime,
        };

        match filter {
            TimeFilter::Custom => match (self.start, self.end) {
                (Some(start), Some(end)) => DateRange::new(start, end).map(Some),
                _ => Err(DateRangeError::MissingBounds),
            },
            other => Ok(other.range(now)),
        }
    }
}

pub fn start_of_day(t: DateTime<Utc>) -> DateTime<Utc> {
    midnight(t.date_naive())
}

pub fn start_of_week(t: DateTime<Utc>) -> DateTime<Utc> {
    let date = t.date_naive();
    let offset = u64::from(date.weekday().num_days_from_monday());
    midnight(date - Days::new(offset))
}

pub fn start_of_month(t: DateTime<Utc>) -> DateTime<Utc> {
    midnight(first_of_month(t.date_naive()))
}

pub fn start_of_quarter(t: DateTime<Utc>) -> DateTime<Utc> {
    let date = t.date_naive();
    let first = first_of_month(date) - Months::new(date.month0() % 3);
    midnight(first)
}

pub fn start_of_year(t: DateTime<Utc>) -> DateTime<Utc> {
    let date = t.date_naive();
    midnight(date - Days::new(u64::from(date.ordinal0())))
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date - Days::new(u64::from(date.day0()))
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

// Only applied to month starts, so day-of-month clamping never kicks in.
fn add_months(t: DateTime<Utc>, months: u32) -> DateTime<Utc> {
    t + Months::new(months)
}

fn sub_months(t: DateTime<Utc>, months: u32) -> DateTime<Utc> {
    t - Months::new(months)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn week_starts_on_monday() {
        // 2026-10-17 is a Saturday
        assert_eq!(start_of_week(at(2026, 10, 17, 15)), at(2026, 10, 12, 0));
        assert_eq!(start_of_week(at(2026, 10, 12, 0)), at(2026, 10, 12, 0));
        // Sunday belongs to the week that started six days earlier
        assert_eq!(start_of_week(at(2026, 10, 18, 23)), at(2026, 10, 12, 0));
    }

    #[test]
    fn last_month_crosses_year_boundary() {
        let range = TimeFilter::LastMonth.range(at(2026, 1, 15, 9)).unwrap();
        assert_eq!(range.start, at(2025, 12, 1, 0));
        assert_eq!(range.end, at(2026, 1, 1, 0));
    }

    #[test]
    fn this_quarter_and_year() {
        let now = at(2026, 8, 20, 12);
        let quarter = TimeFilter::ThisQuarter.range(now).unwrap();
        assert_eq!(quarter.start, at(2026, 7, 1, 0));
        assert_eq!(quarter.end, at(2026, 10, 1, 0));

        let year = TimeFilter::ThisYear.range(now).unwrap();
        assert_eq!(year.start, at(2026, 1, 1, 0));
        assert_eq!(year.end, at(2027, 1, 1, 0));
    }

    #[test]
    fn rolling_windows_end_now() {
        let now = at(2026, 3, 10, 8);
        let range = TimeFilter::Last7Days.range(now).unwrap();
        assert_eq!(range.end, now);
        assert_eq!(range.start, at(2026, 3, 3, 8));
        assert!(range.contains(at(2026, 3, 3, 8)));
        assert!(!range.contains(now));
    }

    #[test]
    fn all_time_is_unbounded() {
        assert!(TimeFilter::AllTime.range(Utc::now()).is_none());
        let query = TimeFilterQuery::default();
        assert_eq!(query.resolve(Utc::now()), Ok(None));
    }

    #[test]
    fn custom_requires_ordered_bounds() {
        let now = at(2026, 5, 5, 5);
        let missing = TimeFilterQuery {
            filter: Some(TimeFilter::Custom),
            start: Some(now),
            end: None,
        };
        assert_eq!(missing.resolve(now), Err(DateRangeError::MissingBounds));

        let reversed = TimeFilterQuery {
            filter: None,
            start: Some(now),
            end: Some(now - Duration::hours(1)),
        };
        assert_eq!(reversed.resolve(now), Err(DateRangeError::InvalidOrder));

        let ok = TimeFilterQuery {
            filter: None,
            start: Some(now - Duration::days(2)),
            end: Some(now),
        };
        assert_eq!(ok.resolve(now).unwrap().unwrap().duration(), Duration::days(2));
    }

    #[test]
    fn weeks_cover_partial_weeks() {
        // Wednesday to the following-but-one Tuesday spans three weeks
        let range = DateRange::new(at(2026, 10, 14, 0), at(2026, 10, 27, 0)).unwrap();
        assert_eq!(
            range.weeks(),
            vec![at(2026, 10, 12, 0), at(2026, 10, 19, 0), at(2026, 10, 26, 0)]
        );
    }

    #[test]
    fn filter_names_deserialize() {
        let filter: TimeFilter = serde_json::from_str("\"last_30_days\"").unwrap();
        assert_eq!(filter, TimeFilter::Last30Days);
        let filter: TimeFilter = serde_json::from_str("\"this_week\"").unwrap();
        assert_eq!(filter, TimeFilter::ThisWeek);
    }
}
