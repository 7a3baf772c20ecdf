//! Compiled-in configuration defaults

use vspin_core::constants::DEFAULT_MAX_THREADS;

/// Thread table capacity
pub const MAX_THREADS: usize = DEFAULT_MAX_THREADS;

/// Spin rounds on the arbitration lock before yielding
pub const LOCK_SPINS: u32 = vspin_core::spinlock::DEFAULT_SPIN_LIMIT;

/// Polls of a wake slot before sleeping in the kernel
pub const WAKE_SPINS: u32 = 64;

/// Log every hand-off at debug level
pub const DEBUG_LOGGING: bool = false;
