//! Interpreter configuration and resource ceilings

use serde::{Deserialize, Serialize};

/// Maximum number of keys in the application's global store
pub const MAX_GLOBAL_STATE_SIZE: usize = 64;
/// Maximum number of keys in the account-local store
pub const MAX_LOCAL_STATE_SIZE: usize = 16;
/// Maximum number of `log` calls per invocation
pub const MAX_LOG_CALLS: usize = 32;
/// Maximum cumulative size of logged bytes
pub const MAX_LOG_SIZE: usize = 1024;
/// Maximum length of a produced byte string
pub const MAX_STRING_SIZE: usize = 4096;
/// Maximum width of a big-integer byte operand
pub const MAX_BIGINT_BYTES: usize = 64;
/// Hard cap on a produced byte string, enforced even with bounds checking off
pub const HARD_MAX_STRING_SIZE: usize = 1 << 20;

/// Resource ceilings mirroring a deployed network
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Global store entry count
    pub max_global_keys: usize,
    /// Local store entry count
    pub max_local_keys: usize,
    /// `log` call count
    pub max_log_calls: usize,
    /// Cumulative `log` bytes
    pub max_log_size: usize,
    /// Length of byte strings produced by `concat`, `bzero` and friends
    pub max_string_size: usize,
    /// Width of big-integer byte operands
    pub max_bigint_bytes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_global_keys: MAX_GLOBAL_STATE_SIZE,
            max_local_keys: MAX_LOCAL_STATE_SIZE,
            max_log_calls: MAX_LOG_CALLS,
            max_log_size: MAX_LOG_SIZE,
            max_string_size: MAX_STRING_SIZE,
            max_bigint_bytes: MAX_BIGINT_BYTES,
        }
    }
}

/// Per-invocation interpreter settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// `return` yields the whole stack instead of just its top
    pub return_full_stack: bool,
    /// Enforce the resource ceilings in [`Limits`]
    ///
    /// Numeric traps (overflow, underflow, division by zero, type checks,
    /// slice bounds) are always enforced.
    pub bounds_checking: bool,
    /// Ceilings applied when `bounds_checking` is on
    pub limits: Limits,
}

impl ExecutionConfig {
    /// Default settings with `return` yielding only the top value
    pub fn top_only() -> Self {
        Self {
            return_full_stack: false,
            ..Self::default()
        }
    }

    /// Disable or enable resource ceilings
    pub fn with_bounds_checking(mut self, enabled: bool) -> Self {
        self.bounds_checking = enabled;
        self
    }

    /// Replace the ceilings
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Ceilings to enforce, `None` when bounds checking is off
    pub fn active_limits(&self) -> Option<&Limits> {
        self.bounds_checking.then_some(&self.limits)
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            return_full_stack: true,
            bounds_checking: true,
            limits: Limits::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = Limits::default();
        assert_eq!(limits.max_global_keys, 64);
        assert_eq!(limits.max_local_keys, 16);
        assert_eq!(limits.max_log_calls, 32);
        assert_eq!(limits.max_log_size, 1024);
        assert_eq!(limits.max_string_size, 4096);
        assert_eq!(limits.max_bigint_bytes, 64);
    }

    #[test]
    fn test_default_config() {
        let config = ExecutionConfig::default();
        assert!(config.return_full_stack);
        assert!(config.bounds_checking);
        assert!(config.active_limits().is_some());
        assert!(!ExecutionConfig::top_only().return_full_stack);
    }

    #[test]
    fn test_bounds_checking_off() {
        let config = ExecutionConfig::default().with_bounds_checking(false);
        assert!(config.active_limits().is_none());
    }

    #[test]
    fn test_partial_toml() {
        let config: ExecutionConfig = toml::from_str(
            r#"
            return_full_stack = false

            [limits]
            max_log_calls = 4
            "#,
        )
        .unwrap();
        assert!(!config.return_full_stack);
        assert!(config.bounds_checking);
        assert_eq!(config.limits.max_log_calls, 4);
        assert_eq!(config.limits.max_global_keys, 64);
    }
}
