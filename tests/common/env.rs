//! Serialized changes to the test process environment.

use env_lock::{EnvGuard, lock_env};
use tracing::trace;

/// Point the per-user config directory at `dir` until the guard drops.
///
/// Holds the process-wide env lock, so tests using it never interleave.
#[must_use]
pub fn with_config_home(dir: &str) -> EnvGuard<'static> {
    trace!(dir, "Redirecting XDG_CONFIG_HOME");
    lock_env([("XDG_CONFIG_HOME", Some(dir))])
}
