use crate::error::{Result, StoreError};
use chrono::{DateTime, Datelike, Days, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use std::fmt;
use std::str::FromStr;

/// Named calendar interval, resolved in the local time zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Today,
    Yesterday,
    ThisWeek,
    LastWeek,
}

impl Bucket {
    pub const ALL: [Bucket; 4] = [Bucket::Today, Bucket::Yesterday, Bucket::ThisWeek, Bucket::LastWeek];

    /// Inclusive wall-clock bounds of the bucket relative to `today`.
    pub fn naive_bounds(self, today: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
        let (first, last) = match self {
            Bucket::Today => (today, today),
            Bucket::Yesterday => {
                let day = today - Days::new(1);
                (day, day)
            }
            Bucket::ThisWeek => week_of(today),
            Bucket::LastWeek => {
                let (monday, sunday) = week_of(today);
                (monday - Days::new(7), sunday - Days::new(7))
            }
        };
        (first.and_time(start_of_day()), last.and_time(end_of_day()))
    }

    /// Inclusive `[start, end]` unix seconds for the bucket containing `now`.
    pub fn range(self, now: DateTime<Local>) -> (i64, i64) {
        let (start, end) = self.naive_bounds(now.date_naive());
        (local_timestamp(start), local_timestamp(end))
    }

    pub fn name(self) -> &'static str {
        match self {
            Bucket::Today => "today",
            Bucket::Yesterday => "yesterday",
            Bucket::ThisWeek => "this-week",
            Bucket::LastWeek => "last-week",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Bucket {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        Bucket::ALL
            .into_iter()
            .find(|b| b.name() == s.trim())
            .ok_or_else(|| {
                StoreError::usage(format!(
                    "unknown bucket {:?}: expected today, yesterday, this-week or last-week",
                    s
                ))
            })
    }
}

// Monday..Sunday containing `day`; Sunday counts as day 7.
fn week_of(day: NaiveDate) -> (NaiveDate, NaiveDate) {
    let since_monday = u64::from(day.weekday().number_from_monday() - 1);
    let monday = day - Days::new(since_monday);
    (monday, monday + Days::new(6))
}

fn start_of_day() -> NaiveTime {
    NaiveTime::default()
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 59).unwrap_or_default()
}

// A wall-clock time skipped by a DST jump has no local instant; treat it as UTC.
fn local_timestamp(naive: NaiveDateTime) -> i64 {
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.timestamp())
        .unwrap_or_else(|| naive.and_utc().timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(d: NaiveDate, h: u32, m: u32, s: u32) -> NaiveDateTime {
        d.and_hms_opt(h, m, s).unwrap()
    }

    #[test]
    fn today_and_yesterday() {
        let wed = date(2024, 5, 15);
        assert_eq!(Bucket::Today.naive_bounds(wed), (at(wed, 0, 0, 0), at(wed, 23, 59, 59)));
        let tue = date(2024, 5, 14);
        assert_eq!(Bucket::Yesterday.naive_bounds(wed), (at(tue, 0, 0, 0), at(tue, 23, 59, 59)));
        // Across a month boundary.
        let mar1 = date(2024, 3, 1);
        assert_eq!(Bucket::Yesterday.naive_bounds(mar1).0, at(date(2024, 2, 29), 0, 0, 0));
    }

    #[test]
    fn week_runs_monday_to_sunday() {
        let monday = date(2024, 5, 13);
        let sunday = date(2024, 5, 19);
        for day in 13..=19 {
            let (start, end) = Bucket::ThisWeek.naive_bounds(date(2024, 5, day));
            assert_eq!(start, at(monday, 0, 0, 0), "day {}", day);
            assert_eq!(end, at(sunday, 23, 59, 59), "day {}", day);
        }
    }

    #[test]
    fn last_week_is_seven_days_earlier() {
        let (start, end) = Bucket::LastWeek.naive_bounds(date(2024, 5, 19));
        assert_eq!(start, at(date(2024, 5, 6), 0, 0, 0));
        assert_eq!(end, at(date(2024, 5, 12), 23, 59, 59));
    }

    #[test]
    fn local_range_is_ordered_and_inclusive() {
        let now = Local::now();
        for bucket in Bucket::ALL {
            let (start, end) = bucket.range(now);
            assert!(start < end, "{}", bucket);
        }
        let (start, end) = Bucket::Today.range(now);
        assert!(start <= now.timestamp() && now.timestamp() <= end);
    }

    #[test]
    fn parses_bucket_names() {
        assert_eq!("this-week".parse::<Bucket>().unwrap(), Bucket::ThisWeek);
        assert_eq!("last-week".parse::<Bucket>().unwrap(), Bucket::LastWeek);
        assert!(matches!("fortnight".parse::<Bucket>(), Err(StoreError::Usage(_))));
    }
}
