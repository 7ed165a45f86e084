// Scheduler Job Store Port
// Persisted job state keyed by experiment (one live job each)

use crate::domain::{EntityId, JobRecord};
use crate::error::Result;
use async_trait::async_trait;

/// Repository interface for scheduler job persistence
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert or atomically replace the job row for the record's experiment
    async fn upsert(&self, record: &JobRecord) -> Result<()>;

    /// Remove a job row. Missing ids are a no-op; the flag reports whether
    /// an actual removal occurred.
    async fn remove(&self, job_id: &str) -> Result<bool>;

    /// Advance the persisted next firing time
    async fn update_next_fire(&self, job_id: &str, next_fire: i64) -> Result<()>;

    /// Load every persisted job for startup reconciliation
    async fn load_all(&self) -> Result<Vec<JobRecord>>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory JobStore keyed by experiment id
    #[derive(Default)]
    pub struct MemoryJobStore {
        rows: Mutex<HashMap<EntityId, JobRecord>>,
    }

    impl MemoryJobStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn row_count(&self) -> usize {
            self.rows.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl JobStore for MemoryJobStore {
        async fn upsert(&self, record: &JobRecord) -> Result<()> {
            self.rows
                .lock()
                .unwrap()
                .insert(record.experiment_id, record.clone());
            Ok(())
        }

        async fn remove(&self, job_id: &str) -> Result<bool> {
            let mut rows = self.rows.lock().unwrap();
            let key = rows
                .iter()
                .find(|(_, record)| record.job_id == job_id)
                .map(|(key, _)| *key);
            Ok(match key {
                Some(key) => rows.remove(&key).is_some(),
                None => false,
            })
        }

        async fn update_next_fire(&self, job_id: &str, next_fire: i64) -> Result<()> {
            let mut rows = self.rows.lock().unwrap();
            if let Some(record) = rows.values_mut().find(|record| record.job_id == job_id) {
                record.next_fire = next_fire;
            }
            Ok(())
        }

        async fn load_all(&self) -> Result<Vec<JobRecord>> {
            let mut records: Vec<JobRecord> = self.rows.lock().unwrap().values().cloned().collect();
            records.sort_by_key(|record| record.experiment_id);
            Ok(records)
        }
    }
}
