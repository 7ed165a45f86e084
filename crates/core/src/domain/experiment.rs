// Experiment Domain Model

use serde::{Deserialize, Serialize};

use super::action::Action;
use super::target::{EntityId, TargetKind};

/// When an experiment fires
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Schedule {
    /// Single firing at an absolute time (epoch ms)
    OneTime { at: i64 },
    /// Standard five-field cron pattern
    Recurring { pattern: String },
}

/// A named binding of target + action + schedule.
///
/// Invariant: `job_id` is present iff the experiment is active and owns a
/// live scheduled job. An experiment owns at most one live job at a time;
/// re-scheduling replaces, never duplicates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experiment {
    pub id: EntityId,
    pub name: String,
    pub description: Option<String>,
    pub target_kind: TargetKind,
    pub target_id: EntityId,
    pub action: Action,
    pub schedule: Schedule,
    pub active: bool,
    pub job_id: Option<String>,
    pub created_at: i64,
}

/// New-experiment payload (id and bookkeeping assigned by the store)
#[derive(Debug, Clone)]
pub struct NewExperiment {
    pub name: String,
    pub description: Option<String>,
    pub target_kind: TargetKind,
    pub target_id: EntityId,
    pub action: Action,
    pub schedule: Schedule,
    pub active: bool,
}

/// Terminal outcome of one dispatch attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    Success,
    Failure,
}

impl LogStatus {
    /// Lenient parse for values read back from the store
    pub fn parse(s: &str) -> LogStatus {
        match s {
            "success" => LogStatus::Success,
            _ => LogStatus::Failure,
        }
    }
}

impl std::fmt::Display for LogStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogStatus::Success => write!(f, "success"),
            LogStatus::Failure => write!(f, "failure"),
        }
    }
}

/// Immutable audit record of one dispatch attempt. Written exactly once,
/// never mutated; deleted only as a cascade of experiment deletion.
/// `experiment_id` is None for ad hoc dispatches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentLog {
    pub id: EntityId,
    pub experiment_id: Option<EntityId>,
    pub target_kind: TargetKind,
    pub target_id: EntityId,
    pub target_name: String,
    pub action: Action,
    pub status: LogStatus,
    pub details: String,
    pub execution_time: i64,
}

/// Audit record payload before the store assigns its id
#[derive(Debug, Clone)]
pub struct NewExperimentLog {
    pub experiment_id: Option<EntityId>,
    pub target_kind: TargetKind,
    pub target_id: EntityId,
    pub target_name: String,
    pub action: Action,
    pub status: LogStatus,
    pub details: String,
    pub execution_time: i64,
}

/// Persisted scheduler job state, keyed by experiment (one live job each).
/// Survives process restarts; reconciled against in-memory timers at startup.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub job_id: String,
    pub experiment_id: EntityId,
    pub schedule: Schedule,
    pub next_fire: i64,
    /// True when a malformed recurring pattern was replaced by the hourly default
    pub fallback_trigger: bool,
    pub created_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_status_parse_is_lenient() {
        assert_eq!(LogStatus::parse("success"), LogStatus::Success);
        assert_eq!(LogStatus::parse("failure"), LogStatus::Failure);
        assert_eq!(LogStatus::parse("garbled"), LogStatus::Failure);
    }

    #[test]
    fn schedule_serializes_with_kind_tag() {
        let one_time = serde_json::to_value(Schedule::OneTime { at: 42 }).unwrap();
        assert_eq!(one_time["kind"], "one_time");

        let recurring = serde_json::to_value(Schedule::Recurring {
            pattern: "0 2 * * *".to_string(),
        })
        .unwrap();
        assert_eq!(recurring["kind"], "recurring");
    }
}
