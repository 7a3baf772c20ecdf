//! Arbiter configuration
//!
//! Compile-time defaults with runtime environment overrides.
//!
//! # Configuration Priority (highest wins)
//!
//! 1. Builder calls
//! 2. Environment variables
//! 3. Library defaults (`defaults.rs`)
//!
//! # Example
//!
//! ```rust,ignore
//! use vspin_runtime::config::SpinConfig;
//!
//! let config = SpinConfig::from_env().max_threads(64);
//! config.validate()?;
//! ```

pub mod defaults;

use vspin_core::constants::MAX_THREADS_LIMIT;
use vspin_core::env::{env_get, env_get_bool};
use vspin_core::SpinError;

/// Arbiter configuration with builder pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpinConfig {
    /// Fixed thread table capacity; tids must be below it
    pub max_threads: usize,
    /// Spin rounds on the arbitration lock before yielding
    pub lock_spins: u32,
    /// Polls of a wake slot before sleeping in the kernel
    pub wake_spins: u32,
    /// Log every hand-off at debug level
    pub debug_logging: bool,
}

impl Default for SpinConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl SpinConfig {
    /// Create config from compile-time defaults with environment overrides.
    ///
    /// Environment variables (all optional):
    /// - `VSPIN_MAX_THREADS` - Thread table capacity
    /// - `VSPIN_LOCK_SPINS` - Lock spin rounds before yielding
    /// - `VSPIN_WAKE_SPINS` - Wake slot polls before sleeping
    /// - `VSPIN_DEBUG` - Log hand-offs (0/1)
    pub fn from_env() -> Self {
        Self {
            max_threads: env_get("VSPIN_MAX_THREADS", defaults::MAX_THREADS),
            lock_spins: env_get("VSPIN_LOCK_SPINS", defaults::LOCK_SPINS),
            wake_spins: env_get("VSPIN_WAKE_SPINS", defaults::WAKE_SPINS),
            debug_logging: env_get_bool("VSPIN_DEBUG", defaults::DEBUG_LOGGING),
        }
    }

    /// Create config with explicit defaults (no env override).
    pub fn new() -> Self {
        Self {
            max_threads: defaults::MAX_THREADS,
            lock_spins: defaults::LOCK_SPINS,
            wake_spins: defaults::WAKE_SPINS,
            debug_logging: defaults::DEBUG_LOGGING,
        }
    }

    // Builder methods

    pub fn max_threads(mut self, n: usize) -> Self {
        self.max_threads = n;
        self
    }

    pub fn lock_spins(mut self, n: u32) -> Self {
        self.lock_spins = n;
        self
    }

    pub fn wake_spins(mut self, n: u32) -> Self {
        self.wake_spins = n;
        self
    }

    pub fn debug_logging(mut self, enable: bool) -> Self {
        self.debug_logging = enable;
        self
    }

    /// Validate configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_threads == 0 {
            return Err(ConfigError::InvalidValue("max_threads must be > 0"));
        }
        if self.max_threads > MAX_THREADS_LIMIT {
            return Err(ConfigError::InvalidValue("max_threads must be <= 65536"));
        }
        Ok(())
    }

    /// Print configuration (for debugging)
    pub fn print(&self) {
        eprintln!("vspin Configuration:");
        eprintln!("  max_threads:    {}", self.max_threads);
        eprintln!("  lock_spins:     {}", self.lock_spins);
        eprintln!("  wake_spins:     {}", self.wake_spins);
        eprintln!("  debug_logging:  {}", self.debug_logging);
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

impl From<ConfigError> for SpinError {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::InvalidValue(msg) => SpinError::Config(msg),
        }
    }
}
