//! Runtime configuration
//!
//! Provides compile-time defaults with runtime environment overrides.
//!
//! # Configuration Priority (highest wins)
//!
//! 1. Builder calls
//! 2. Environment variables (runtime, `from_env` only)
//! 3. User's ut_config.rs (compile-time, via `UT_CONFIG_RS`)
//! 4. Library defaults
//!
//! # Example
//!
//! ```rust,ignore
//! use uthread_runtime::config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_env()
//!     .stack_size(512 * 1024)
//!     .preempt_hz(250);
//! ```

pub mod defaults;

use uthread_core::constants::MIN_STACK_SIZE;
use uthread_core::env::{env_get, env_get_bool, env_get_size};
use uthread_core::kprintln;

/// Highest timer frequency accepted for preemption
pub const MAX_PREEMPT_HZ: u32 = 10_000;

/// Runtime configuration with builder pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Ceiling on thread identities handed out by `create` in one `run`
    pub max_threads: usize,
    /// Usable stack bytes per logical thread (guard page not included)
    pub stack_size: usize,
    /// Timer interrupts per second when preemption is enabled
    pub preempt_hz: u32,
    /// Raise the log level to Debug for the duration of `run`
    pub debug_logging: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl RuntimeConfig {
    /// Create config from compile-time defaults with environment overrides.
    ///
    /// Environment variables (all optional):
    /// - `UT_MAX_THREADS` - Thread identity ceiling
    /// - `UT_STACK_SIZE` - Stack bytes per thread, K/M/G suffix accepted
    /// - `UT_PREEMPT_HZ` - Preemption timer frequency
    /// - `UT_DEBUG` - Enable debug logging (0/1)
    pub fn from_env() -> Self {
        Self {
            max_threads: env_get("UT_MAX_THREADS", defaults::MAX_THREADS),
            stack_size: env_get_size("UT_STACK_SIZE", defaults::STACK_SIZE),
            preempt_hz: env_get("UT_PREEMPT_HZ", defaults::PREEMPT_HZ),
            debug_logging: env_get_bool("UT_DEBUG", defaults::DEBUG_LOGGING),
        }
    }

    /// Create config with explicit defaults (no env override).
    /// Useful for testing or when you want full control.
    pub fn new() -> Self {
        Self {
            max_threads: defaults::MAX_THREADS,
            stack_size: defaults::STACK_SIZE,
            preempt_hz: defaults::PREEMPT_HZ,
            debug_logging: defaults::DEBUG_LOGGING,
        }
    }

    // Builder methods

    pub fn max_threads(mut self, n: usize) -> Self {
        self.max_threads = n;
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.stack_size = size;
        self
    }

    pub fn preempt_hz(mut self, hz: u32) -> Self {
        self.preempt_hz = hz;
        self
    }

    pub fn debug_logging(mut self, enable: bool) -> Self {
        self.debug_logging = enable;
        self
    }

    /// Timer period in microseconds
    pub fn preempt_period_us(&self) -> u64 {
        1_000_000 / u64::from(self.preempt_hz.max(1))
    }

    /// Validate configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_threads == 0 {
            return Err(ConfigError::InvalidValue("max_threads must be > 0"));
        }
        if self.max_threads >= u32::MAX as usize {
            return Err(ConfigError::InvalidValue("max_threads must fit a thread id"));
        }
        if self.stack_size < MIN_STACK_SIZE {
            return Err(ConfigError::InvalidValue("stack_size must be >= 16KB"));
        }
        if self.preempt_hz == 0 || self.preempt_hz > MAX_PREEMPT_HZ {
            return Err(ConfigError::InvalidValue("preempt_hz must be in 1..=10000"));
        }
        Ok(())
    }

    /// Print configuration (for debugging)
    pub fn print(&self) {
        kprintln!("uthread configuration:");
        kprintln!("  max_threads:    {}", self.max_threads);
        kprintln!("  stack_size:     {}", self.stack_size);
        kprintln!("  preempt_hz:     {}", self.preempt_hz);
        kprintln!("  debug_logging:  {}", self.debug_logging);
    }
}

/// Configuration error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue(&'static str),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for uthread_core::SchedError {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::InvalidValue(msg) => uthread_core::SchedError::InvalidConfig(msg),
        }
    }
}
