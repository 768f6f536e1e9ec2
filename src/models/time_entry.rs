//! Time entry model.
//!
//! Time entries are the source of truth for labor cost. They are owned by the
//! external time-tracking component; this crate only reads them.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Bucket;

/// How the worked time of an entry is recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntryKind {
    /// Hours booked by hand against a date, already classified into a bucket.
    Manual {
        /// The date the work was performed.
        date: NaiveDate,
        /// Number of hours worked.
        hours: Decimal,
        /// The overtime / shift classification of the hours.
        bucket: Bucket,
    },
    /// A start/stop timer. The span is split into buckets by the business calendar.
    Timer {
        /// When the timer was started.
        start: DateTime<Utc>,
        /// When the timer was stopped. `None` while it is still running.
        #[serde(default)]
        finish: Option<DateTime<Utc>>,
    },
}

/// A single unit of labor booked by an employee against a job.
///
/// # Example
///
/// ```
/// use job_cost_engine::models::{Bucket, EntryKind, TimeEntry};
/// use chrono::NaiveDate;
/// use rust_decimal::Decimal;
///
/// let entry = TimeEntry {
///     id: "te_001".to_string(),
///     employee_id: "emp_a".to_string(),
///     job_key: "J-1".to_string(),
///     kind: EntryKind::Manual {
///         date: NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
///         hours: Decimal::new(80, 1),
///         bucket: Bucket::Regular,
///     },
///     void: false,
/// };
/// assert!(entry.counts_toward("J-1"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeEntry {
    /// Unique identifier of the entry.
    pub id: String,
    /// The employee who did the work.
    pub employee_id: String,
    /// The job (work order) the time is booked against.
    pub job_key: String,
    /// The recorded time.
    #[serde(flatten)]
    pub kind: EntryKind,
    /// Voided entries are kept for history but never costed.
    #[serde(default)]
    pub void: bool,
}

impl TimeEntry {
    /// Returns true if the entry belongs to the job and is not void.
    pub fn counts_toward(&self, job_key: &str) -> bool {
        !self.void && self.job_key == job_key
    }

    /// The last business-local date the entry touches. A running timer is
    /// treated as open-ended.
    ///
    /// Timers are priced per local day, so their finish instant is read in
    /// the business time zone `offset`.
    pub fn last_date(&self, offset: FixedOffset) -> Option<NaiveDate> {
        match &self.kind {
            EntryKind::Manual { date, .. } => Some(*date),
            EntryKind::Timer { finish, .. } => {
                finish.map(|f| f.with_timezone(&offset).date_naive())
            }
        }
    }

    /// Returns true if the entry has work on or after the business-local date.
    pub fn touches_on_or_after(&self, date: NaiveDate, offset: FixedOffset) -> bool {
        self.last_date(offset).is_none_or(|last| last >= date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn manual(job_key: &str, void: bool) -> TimeEntry {
        TimeEntry {
            id: "te_1".to_string(),
            employee_id: "emp_1".to_string(),
            job_key: job_key.to_string(),
            kind: EntryKind::Manual {
                date: NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
                hours: Decimal::new(25, 1),
                bucket: Bucket::Regular,
            },
            void,
        }
    }

    #[test]
    fn test_void_entry_does_not_count() {
        assert!(manual("J-1", false).counts_toward("J-1"));
        assert!(!manual("J-1", true).counts_toward("J-1"));
        assert!(!manual("J-2", false).counts_toward("J-1"));
    }

    #[test]
    fn test_deserialize_manual_entry() {
        let json = r#"{
            "id": "te_9",
            "employee_id": "emp_3",
            "job_key": "001-23",
            "kind": "manual",
            "date": "2025-04-01",
            "hours": "2.5",
            "bucket": "holiday"
        }"#;

        let entry: TimeEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.job_key, "001-23");
        assert!(!entry.void);
        match entry.kind {
            EntryKind::Manual { hours, bucket, .. } => {
                assert_eq!(hours, Decimal::new(25, 1));
                assert_eq!(bucket, Bucket::Holiday);
            }
            other => panic!("Expected manual entry, got {:?}", other),
        }
    }

    #[test]
    fn test_deserialize_running_timer() {
        let json = r#"{
            "id": "te_10",
            "employee_id": "emp_3",
            "job_key": "001-23",
            "kind": "timer",
            "start": "2025-04-01T06:00:00Z"
        }"#;

        let entry: TimeEntry = serde_json::from_str(json).unwrap();
        assert_eq!(
            entry.kind,
            EntryKind::Timer {
                start: Utc.with_ymd_and_hms(2025, 4, 1, 6, 0, 0).unwrap(),
                finish: None,
            }
        );
        assert_eq!(entry.last_date(istanbul()), None);
    }

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn istanbul() -> FixedOffset {
        FixedOffset::east_opt(3 * 3600).unwrap()
    }

    #[test]
    fn test_touches_on_or_after() {
        let entry = manual("J-1", false);
        let offset = istanbul();
        assert!(entry.touches_on_or_after(NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(), offset));
        assert!(!entry.touches_on_or_after(NaiveDate::from_ymd_opt(2025, 3, 4).unwrap(), offset));
    }

    #[test]
    fn test_timer_last_date_is_business_local() {
        // 22:00-23:59 UTC is 01:00-02:59 on the next day in UTC+3
        let entry = TimeEntry {
            kind: EntryKind::Timer {
                start: Utc.with_ymd_and_hms(2025, 3, 2, 22, 0, 0).unwrap(),
                finish: Some(Utc.with_ymd_and_hms(2025, 3, 2, 23, 59, 0).unwrap()),
            },
            ..manual("J-1", false)
        };
        let local_day = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();

        assert_eq!(entry.last_date(istanbul()), Some(local_day));
        assert!(entry.touches_on_or_after(local_day, istanbul()));
        assert!(!entry.touches_on_or_after(local_day, utc()));
    }

    #[test]
    fn test_running_timer_touches_every_later_date() {
        let entry = TimeEntry {
            kind: EntryKind::Timer {
                start: Utc.with_ymd_and_hms(2025, 4, 1, 6, 0, 0).unwrap(),
                finish: None,
            },
            ..manual("J-1", false)
        };
        assert!(entry.touches_on_or_after(NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(), istanbul()));
    }
}
