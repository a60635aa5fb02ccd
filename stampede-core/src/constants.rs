use std::time::Duration;

/// How often the scheduler re-targets the VU count and drains samples.
pub const SCHEDULER_INTERVAL: Duration = Duration::from_millis(100);

/// Time retiring VUs are given to finish their current iteration once the ramp profile ends.
pub const DEFAULT_GRACEFUL_STOP: Duration = Duration::from_secs(30);

/// Per-request timeout used when the scenario does not set one.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
