//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Name under which the supervisor advertises itself. The run flag and
    /// the singleton identity are both keyed by this name.
    pub supervisor_name: String,
    /// Number of worker slots in the pool.
    pub pool_size: usize,
    /// Root directory for run-flag markers (`None` = OS temp dir).
    pub flag_root: Option<PathBuf>,
    /// How often the launcher polls the run flag while waiting for the
    /// supervisor to signal readiness.
    pub readiness_poll: Duration,
    /// How long the launcher waits for readiness before giving up.
    pub startup_timeout: Duration,
    /// How often the supervisor re-checks its run flag for a shutdown
    /// request.
    pub flag_check_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            supervisor_name: "jobpool-supervisor".to_string(),
            pool_size: default_pool_size(),
            flag_root: None,
            readiness_poll: Duration::from_millis(100),
            startup_timeout: Duration::from_secs(5),
            flag_check_interval: Duration::from_secs(1),
        }
    }
}

/// Default pool size: one slot per available core.
pub fn default_pool_size() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}
