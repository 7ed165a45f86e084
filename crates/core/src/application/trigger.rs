// Trigger Resolution
// One-time timestamps and five-field cron patterns -> firing times

use crate::application::constants::FALLBACK_HOURLY_PATTERN;
use crate::domain::Schedule;
use chrono::{DateTime, TimeZone, Utc};
use cron::Schedule as CronSchedule;
use std::str::FromStr;
use tracing::warn;

/// Computed firing source for a scheduled job
#[derive(Debug, Clone)]
pub enum Trigger {
    /// Single absolute firing time (epoch ms)
    At(i64),
    /// Recurring cron occurrences
    Cron(Box<CronSchedule>),
}

/// A trigger plus scheduling metadata
#[derive(Debug, Clone)]
pub struct ResolvedTrigger {
    pub trigger: Trigger,
    /// First firing time (epoch ms)
    pub first_fire: i64,
    /// True when a malformed recurring pattern was replaced by the hourly default
    pub fallback: bool,
}

impl Trigger {
    /// Build a trigger from an experiment schedule without pinning a first
    /// firing time. Used at restore, where the persisted `next_fire` must
    /// be preserved so missed occurrences replay.
    ///
    /// A recurring pattern that fails to parse falls back to the hourly
    /// default; the substitution is reported through the returned flag and
    /// a warning, never an error.
    pub fn from_schedule(schedule: &Schedule) -> (Trigger, bool) {
        match schedule {
            Schedule::OneTime { at } => (Trigger::At(*at), false),
            Schedule::Recurring { pattern } => match parse_crontab(pattern) {
                Ok(parsed) => (Trigger::Cron(Box::new(parsed)), false),
                Err(reason) => {
                    warn!(
                        pattern = %pattern,
                        reason = %reason,
                        "Invalid cron pattern, falling back to hourly trigger"
                    );
                    let hourly = parse_crontab(FALLBACK_HOURLY_PATTERN)
                        .expect("hourly fallback pattern parses");
                    (Trigger::Cron(Box::new(hourly)), true)
                }
            },
        }
    }

    /// Resolve a schedule at `now`, pinning the first firing time.
    ///
    /// A one-time schedule already in the past resolves to an immediate
    /// firing rather than a rejection; missed experiments are never
    /// silently dropped.
    pub fn resolve(schedule: &Schedule, now_millis: i64) -> ResolvedTrigger {
        let (trigger, fallback) = Self::from_schedule(schedule);
        let first_fire = match &trigger {
            Trigger::At(at) => {
                if *at < now_millis {
                    warn!(
                        scheduled_at = *at,
                        "One-time schedule is in the past, firing immediately"
                    );
                }
                (*at).max(now_millis)
            }
            Trigger::Cron(parsed) => next_occurrence(parsed, now_millis).unwrap_or(now_millis),
        };
        ResolvedTrigger {
            trigger,
            first_fire,
            fallback,
        }
    }

    /// Next occurrence strictly after `after_millis`, if any
    pub fn next_after(&self, after_millis: i64) -> Option<i64> {
        match self {
            Trigger::At(at) => (*at > after_millis).then_some(*at),
            Trigger::Cron(parsed) => next_occurrence(parsed, after_millis),
        }
    }
}

/// Parse a standard five-field crontab pattern. The `cron` crate expects a
/// seconds field, so one is prefixed before parsing.
fn parse_crontab(pattern: &str) -> Result<CronSchedule, String> {
    let fields = pattern.split_whitespace().count();
    if fields != 5 {
        return Err(format!("expected 5 fields, got {fields}"));
    }
    CronSchedule::from_str(&format!("0 {pattern}")).map_err(|e| e.to_string())
}

fn next_occurrence(schedule: &CronSchedule, after_millis: i64) -> Option<i64> {
    let after: DateTime<Utc> = Utc.timestamp_millis_opt(after_millis).single()?;
    schedule
        .after(&after)
        .next()
        .map(|occurrence| occurrence.timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000_000;
    const HOUR_MS: i64 = 3_600_000;

    #[test]
    fn one_time_in_the_future_fires_at_its_time() {
        let at = NOW + HOUR_MS;
        let resolved = Trigger::resolve(&Schedule::OneTime { at }, NOW);
        assert_eq!(resolved.first_fire, at);
        assert!(!resolved.fallback);
    }

    #[test]
    fn one_time_in_the_past_fires_immediately() {
        let resolved = Trigger::resolve(&Schedule::OneTime { at: NOW - HOUR_MS }, NOW);
        assert_eq!(resolved.first_fire, NOW);
        assert!(!resolved.fallback);
    }

    #[test]
    fn one_time_trigger_yields_no_further_occurrences() {
        let at = NOW + HOUR_MS;
        let trigger = Trigger::At(at);
        assert_eq!(trigger.next_after(NOW), Some(at));
        assert_eq!(trigger.next_after(at), None);
    }

    #[test]
    fn recurring_pattern_resolves_without_fallback() {
        let resolved = Trigger::resolve(
            &Schedule::Recurring {
                pattern: "*/5 * * * *".to_string(),
            },
            NOW,
        );
        assert!(!resolved.fallback);
        assert!(resolved.first_fire > NOW);
        assert!(resolved.first_fire - NOW <= 5 * 60 * 1000);
    }

    #[test]
    fn malformed_pattern_falls_back_to_hourly() {
        let resolved = Trigger::resolve(
            &Schedule::Recurring {
                pattern: "not-a-cron".to_string(),
            },
            NOW,
        );
        assert!(resolved.fallback);
        // Hourly default: next firing is on the hour, within one hour
        assert!(resolved.first_fire > NOW);
        assert!(resolved.first_fire - NOW <= HOUR_MS);
        assert_eq!(resolved.first_fire % HOUR_MS, 0);
    }

    #[test]
    fn six_field_pattern_is_rejected_to_fallback() {
        let (_, fallback) = Trigger::from_schedule(&Schedule::Recurring {
            pattern: "0 0 2 * * *".to_string(),
        });
        assert!(fallback);
    }

    #[test]
    fn cron_occurrences_advance_strictly() {
        let (trigger, fallback) = Trigger::from_schedule(&Schedule::Recurring {
            pattern: "0 * * * *".to_string(),
        });
        assert!(!fallback);
        let first = trigger.next_after(NOW).unwrap();
        let second = trigger.next_after(first).unwrap();
        assert_eq!(second - first, HOUR_MS);
    }
}
