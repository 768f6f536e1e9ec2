//! Business calendar and timer splitting.
//!
//! Timer entries are recorded as UTC instants. Costing needs them in business
//! local time, cut at midnight and at the edges of the weekday work window, so
//! each piece can be priced in its own [`Bucket`].

use std::collections::HashSet;

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc, Weekday,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::{CalendarConfig, business_offset};
use crate::models::Bucket;

const SECONDS_PER_HOUR: i64 = 3600;

/// A piece of a timer that falls on one local date and in one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSegment {
    /// The business-local date of the segment.
    pub date: NaiveDate,
    /// The bucket the segment is priced in.
    pub bucket: Bucket,
    /// Length of the segment in whole seconds.
    pub seconds: i64,
}

impl TimeSegment {
    /// Length of the segment in hours.
    pub fn hours(&self) -> Decimal {
        Decimal::from(self.seconds) / Decimal::from(SECONDS_PER_HOUR)
    }
}

/// The business calendar: local offset, weekday work window and holidays.
///
/// # Example
///
/// ```
/// use job_cost_engine::calculation::BusinessCalendar;
/// use job_cost_engine::config::CostConfig;
/// use job_cost_engine::models::Bucket;
/// use chrono::{TimeZone, Utc};
///
/// let calendar = BusinessCalendar::from_config(&CostConfig::default().calendar);
///
/// // Monday 2025-03-03, 15:00 to 19:00 local (UTC+3)
/// let start = Utc.with_ymd_and_hms(2025, 3, 3, 12, 0, 0).unwrap();
/// let finish = Utc.with_ymd_and_hms(2025, 3, 3, 16, 0, 0).unwrap();
///
/// let segments = calendar.split(start, finish);
/// assert_eq!(segments.len(), 2);
/// assert_eq!(segments[0].bucket, Bucket::Regular);
/// assert_eq!(segments[0].seconds, 2 * 3600);
/// assert_eq!(segments[1].bucket, Bucket::AfterHours);
/// assert_eq!(segments[1].seconds, 2 * 3600);
/// ```
#[derive(Debug, Clone)]
pub struct BusinessCalendar {
    offset: FixedOffset,
    work_start: NaiveTime,
    work_end: NaiveTime,
    holidays: HashSet<NaiveDate>,
}

impl BusinessCalendar {
    /// Builds the calendar from configuration.
    pub fn from_config(config: &CalendarConfig) -> Self {
        Self {
            offset: business_offset(config),
            work_start: config.work_window.start,
            work_end: config.work_window.end,
            holidays: config.holidays.iter().map(|h| h.date).collect(),
        }
    }

    /// Returns true if the date is a configured public holiday.
    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holidays.contains(&date)
    }

    /// The business-local date of an instant.
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.offset).date_naive()
    }

    /// Splits `[start, finish)` into per-day, per-bucket segments.
    ///
    /// Sundays and holidays are entirely [`Bucket::Holiday`], Saturdays are
    /// entirely [`Bucket::AfterHours`]. On other days the work window is
    /// [`Bucket::Regular`] and the rest is after hours. Segments are ordered
    /// by date, then bucket, and their seconds sum to the whole span. An
    /// empty or inverted span yields no segments.
    pub fn split(&self, start: DateTime<Utc>, finish: DateTime<Utc>) -> Vec<TimeSegment> {
        let end = finish.with_timezone(&self.offset).naive_local();
        let mut cursor = start.with_timezone(&self.offset).naive_local();
        let mut segments = Vec::new();

        while cursor < end {
            let date = cursor.date();
            let next_midnight = date
                .succ_opt()
                .map(|d| d.and_time(NaiveTime::MIN))
                .unwrap_or(end);
            let day_end = next_midnight.min(end);
            let span = (day_end - cursor).num_seconds();

            match self.day_bucket(date) {
                Some(bucket) => push(&mut segments, date, bucket, span),
                None => {
                    let regular = overlap(
                        cursor,
                        day_end,
                        date.and_time(self.work_start),
                        date.and_time(self.work_end),
                    );
                    push(&mut segments, date, Bucket::Regular, regular);
                    push(&mut segments, date, Bucket::AfterHours, span - regular);
                }
            }

            cursor = day_end;
        }

        segments
    }

    /// The bucket covering a whole day, or `None` for a working weekday.
    fn day_bucket(&self, date: NaiveDate) -> Option<Bucket> {
        if self.is_holiday(date) {
            return Some(Bucket::Holiday);
        }
        match date.weekday() {
            Weekday::Sun => Some(Bucket::Holiday),
            Weekday::Sat => Some(Bucket::AfterHours),
            _ => None,
        }
    }
}

fn overlap(
    start: NaiveDateTime,
    end: NaiveDateTime,
    window_start: NaiveDateTime,
    window_end: NaiveDateTime,
) -> i64 {
    let from = start.max(window_start);
    let to = end.min(window_end);
    (to - from).max(Duration::zero()).num_seconds()
}

fn push(segments: &mut Vec<TimeSegment>, date: NaiveDate, bucket: Bucket, seconds: i64) {
    if seconds > 0 {
        segments.push(TimeSegment {
            date,
            bucket,
            seconds,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CostConfig, Holiday};
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn calendar() -> BusinessCalendar {
        let mut config = CostConfig::default().calendar;
        config.holidays.push(Holiday {
            date: NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
            name: "Labour Day".to_string(),
        });
        BusinessCalendar::from_config(&config)
    }

    /// Local wall-clock time at UTC+3.
    fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        FixedOffset::east_opt(3 * 3600)
            .unwrap()
            .with_ymd_and_hms(y, m, d, h, min, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn seconds_in(segments: &[TimeSegment], bucket: Bucket) -> i64 {
        segments
            .iter()
            .filter(|s| s.bucket == bucket)
            .map(|s| s.seconds)
            .sum()
    }

    #[test]
    fn test_weekday_inside_window_is_regular() {
        // Monday
        let segments = calendar().split(local(2025, 3, 3, 8, 0), local(2025, 3, 3, 16, 0));
        assert_eq!(
            segments,
            vec![TimeSegment {
                date: NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
                bucket: Bucket::Regular,
                seconds: 8 * 3600,
            }]
        );
        assert_eq!(segments[0].hours(), Decimal::from(8));
    }

    #[test]
    fn test_early_start_is_after_hours() {
        let segments = calendar().split(local(2025, 3, 4, 6, 0), local(2025, 3, 4, 9, 0));
        assert_eq!(seconds_in(&segments, Bucket::AfterHours), 90 * 60);
        assert_eq!(seconds_in(&segments, Bucket::Regular), 90 * 60);
    }

    #[test]
    fn test_saturday_is_after_hours() {
        let segments = calendar().split(local(2025, 3, 8, 9, 0), local(2025, 3, 8, 13, 0));
        assert_eq!(seconds_in(&segments, Bucket::AfterHours), 4 * 3600);
        assert_eq!(seconds_in(&segments, Bucket::Regular), 0);
    }

    #[test]
    fn test_sunday_and_holiday_are_holiday() {
        let sunday = calendar().split(local(2025, 3, 9, 9, 0), local(2025, 3, 9, 11, 0));
        assert_eq!(seconds_in(&sunday, Bucket::Holiday), 2 * 3600);

        // Thursday 2025-05-01 is configured as a holiday
        let labour_day = calendar().split(local(2025, 5, 1, 9, 0), local(2025, 5, 1, 12, 0));
        assert_eq!(seconds_in(&labour_day, Bucket::Holiday), 3 * 3600);
    }

    #[test]
    fn test_span_is_cut_at_local_midnight() {
        // Friday 22:00 to Saturday 02:00 local
        let segments = calendar().split(local(2025, 3, 7, 22, 0), local(2025, 3, 8, 2, 0));
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].date, NaiveDate::from_ymd_opt(2025, 3, 7).unwrap());
        assert_eq!(segments[0].seconds, 2 * 3600);
        assert_eq!(segments[1].date, NaiveDate::from_ymd_opt(2025, 3, 8).unwrap());
        assert_eq!(segments[1].seconds, 2 * 3600);
    }

    #[test]
    fn test_local_date_differs_from_utc_date() {
        // 22:30 UTC on Sunday is already Monday 01:30 local
        let start = Utc.with_ymd_and_hms(2025, 3, 9, 22, 30, 0).unwrap();
        assert_eq!(
            calendar().local_date(start),
            NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
        );
    }

    #[test]
    fn test_inverted_span_has_no_segments() {
        let start = local(2025, 3, 3, 10, 0);
        assert!(calendar().split(start, start).is_empty());
        assert!(calendar().split(start, local(2025, 3, 3, 9, 0)).is_empty());
    }

    proptest! {
        #[test]
        fn prop_split_conserves_seconds(
            start_offset in 0i64..(60 * 24 * 3600),
            length in 0i64..(10 * 24 * 3600),
        ) {
            let base = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
            let start = base + Duration::seconds(start_offset);
            let finish = start + Duration::seconds(length);

            let segments = calendar().split(start, finish);
            let total: i64 = segments.iter().map(|s| s.seconds).sum();

            prop_assert_eq!(total, length);
            prop_assert!(segments.iter().all(|s| s.seconds > 0));
        }
    }
}
