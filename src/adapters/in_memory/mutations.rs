//! Time entry writes that keep the recalculation queue in step.

use std::sync::Arc;

use crate::error::CostResult;
use crate::hooks::RecalcTrigger;
use crate::models::TimeEntry;

use super::source_tables::InMemorySourceTables;

/// Creates, updates, deletes and voids time entries, enqueueing every job a
/// change touches.
///
/// Moving an entry to another job dirties both the old and the new job.
#[derive(Clone)]
pub struct TimeEntryMutations {
    tables: Arc<InMemorySourceTables>,
    trigger: RecalcTrigger,
}

impl TimeEntryMutations {
    /// Wraps the tables with the trigger to notify.
    pub fn new(tables: Arc<InMemorySourceTables>, trigger: RecalcTrigger) -> Self {
        Self { tables, trigger }
    }

    /// Stores a new entry.
    pub async fn create(&self, entry: TimeEntry) -> CostResult<()> {
        self.update(entry).await
    }

    /// Stores an entry, replacing any previous version with the same id.
    pub async fn update(&self, entry: TimeEntry) -> CostResult<()> {
        let job_key = entry.job_key.clone();
        let previous = self.tables.upsert_entry(entry).await;

        self.trigger.on_time_entry_changed(&job_key).await?;
        if let Some(previous) = previous.filter(|p| p.job_key != job_key) {
            self.trigger.on_time_entry_changed(&previous.job_key).await?;
        }
        Ok(())
    }

    /// Deletes an entry. Returns false if it did not exist.
    pub async fn delete(&self, id: &str) -> CostResult<bool> {
        match self.tables.remove_entry(id).await {
            Some(removed) => {
                self.trigger.on_time_entry_changed(&removed.job_key).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Marks an entry void. Returns false if it did not exist.
    pub async fn void(&self, id: &str) -> CostResult<bool> {
        let Some(mut entry) = self.tables.entry(id).await else {
            return Ok(false);
        };
        entry.void = true;
        self.update(entry).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::in_memory::InMemoryCostStore;
    use crate::config::CostConfig;
    use crate::models::{Bucket, EntryKind};
    use crate::ports::RecalcQueue;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn entry(id: &str, job_key: &str) -> TimeEntry {
        TimeEntry {
            id: id.to_string(),
            employee_id: "emp_a".to_string(),
            job_key: job_key.to_string(),
            kind: EntryKind::Manual {
                date: NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
                hours: Decimal::ONE,
                bucket: Bucket::Regular,
            },
            void: false,
        }
    }

    fn setup() -> (TimeEntryMutations, Arc<InMemorySourceTables>, Arc<InMemoryCostStore>) {
        let tables = Arc::new(InMemorySourceTables::new());
        let config = CostConfig::default();
        let store = Arc::new(InMemoryCostStore::new(&config.queue));
        let trigger = RecalcTrigger::new(store.clone(), tables.clone(), tables.clone(), &config);
        (
            TimeEntryMutations::new(tables.clone(), trigger),
            tables,
            store,
        )
    }

    #[tokio::test]
    async fn test_moving_entry_dirties_both_jobs() {
        let (mutations, _tables, store) = setup();
        mutations.create(entry("te_1", "J-1")).await.unwrap();
        store.remove("J-1").await.unwrap();

        mutations.update(entry("te_1", "J-2")).await.unwrap();

        assert!(store.queue_entry("J-1").await.is_some());
        assert!(store.queue_entry("J-2").await.is_some());
    }

    #[tokio::test]
    async fn test_delete_dirties_job() {
        let (mutations, tables, store) = setup();
        mutations.create(entry("te_1", "J-1")).await.unwrap();
        store.remove("J-1").await.unwrap();

        assert!(mutations.delete("te_1").await.unwrap());
        assert!(store.queue_entry("J-1").await.is_some());
        assert!(tables.entry("te_1").await.is_none());
        assert!(!mutations.delete("te_1").await.unwrap());
    }

    #[tokio::test]
    async fn test_void_marks_entry_and_dirties_job() {
        let (mutations, tables, store) = setup();
        mutations.create(entry("te_1", "J-1")).await.unwrap();
        store.remove("J-1").await.unwrap();

        assert!(mutations.void("te_1").await.unwrap());
        assert!(tables.entry("te_1").await.unwrap().void);
        assert!(store.queue_entry("J-1").await.is_some());
        assert!(!mutations.void("te_9").await.unwrap());
    }
}
