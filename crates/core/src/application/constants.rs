// Scheduler and adapter constants (no magic values)

use std::time::Duration;

/// Trigger evaluation interval
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Sleep after a tick error before the loop resumes
pub const ERROR_RECOVERY_SLEEP_DURATION: Duration = Duration::from_secs(1);

/// Concurrent firings allowed per job id; excess firings are skipped
pub const MAX_CONCURRENT_FIRINGS: usize = 3;

/// Bound on simultaneously executing firings across all jobs
pub const WORKER_POOL_SIZE: usize = 20;

/// Substitute trigger when a recurring pattern cannot be parsed
/// (hourly, on the hour)
pub const FALLBACK_HOURLY_PATTERN: &str = "0 * * * *";

// Server lifecycle commands: privileged first, one unprivileged fallback
pub const SHUTDOWN_COMMAND: &str = "sudo shutdown -h now";
pub const SHUTDOWN_FALLBACK_COMMAND: &str = "shutdown -h now";
pub const REBOOT_COMMAND: &str = "sudo reboot";
pub const REBOOT_FALLBACK_COMMAND: &str = "reboot";
