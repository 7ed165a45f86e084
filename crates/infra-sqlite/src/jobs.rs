// SQLite JobStore Implementation
// Persisted scheduler jobs, keyed by experiment id

use async_trait::async_trait;
use havoc_core::domain::JobRecord;
use havoc_core::error::Result;
use havoc_core::port::JobStore;
use sqlx::SqlitePool;

use crate::store::{map_sqlx_error, schedule_columns, schedule_from_columns};

pub struct SqliteJobStore {
    pool: SqlitePool,
}

impl SqliteJobStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn upsert(&self, record: &JobRecord) -> Result<()> {
        let (schedule_kind, scheduled_at, cron_pattern) = schedule_columns(&record.schedule);

        // One live job per experiment: conflicting rows are replaced in place
        sqlx::query(
            r#"
            INSERT INTO scheduled_jobs (experiment_id, job_id, schedule_kind, scheduled_at,
                cron_pattern, next_fire, fallback_trigger, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(experiment_id) DO UPDATE SET
                job_id = excluded.job_id,
                schedule_kind = excluded.schedule_kind,
                scheduled_at = excluded.scheduled_at,
                cron_pattern = excluded.cron_pattern,
                next_fire = excluded.next_fire,
                fallback_trigger = excluded.fallback_trigger,
                created_at = excluded.created_at
            "#,
        )
        .bind(record.experiment_id)
        .bind(&record.job_id)
        .bind(schedule_kind)
        .bind(scheduled_at)
        .bind(&cron_pattern)
        .bind(record.next_fire)
        .bind(record.fallback_trigger)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn remove(&self, job_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM scheduled_jobs WHERE job_id = ?")
            .bind(job_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_next_fire(&self, job_id: &str, next_fire: i64) -> Result<()> {
        sqlx::query("UPDATE scheduled_jobs SET next_fire = ? WHERE job_id = ?")
            .bind(next_fire)
            .bind(job_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<JobRecord>> {
        let rows: Vec<JobRow> =
            sqlx::query_as("SELECT * FROM scheduled_jobs ORDER BY experiment_id ASC")
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        rows.into_iter().map(|r| r.into_record()).collect()
    }
}

/// SQLite row representation of a persisted job
#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    experiment_id: i64,
    job_id: String,
    schedule_kind: String,
    scheduled_at: Option<i64>,
    cron_pattern: Option<String>,
    next_fire: i64,
    fallback_trigger: bool,
    created_at: i64,
}

impl JobRow {
    fn into_record(self) -> Result<JobRecord> {
        Ok(JobRecord {
            job_id: self.job_id,
            experiment_id: self.experiment_id,
            schedule: schedule_from_columns(
                &self.schedule_kind,
                self.scheduled_at,
                self.cron_pattern,
            )?,
            next_fire: self.next_fire,
            fallback_trigger: self.fallback_trigger,
            created_at: self.created_at,
        })
    }
}
