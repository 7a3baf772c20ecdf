//! # vspin - single-runner thread arbitration
//!
//! Serializes a multithreaded program so that at most one of its threads
//! runs controlled code at any instant, while threads blocked in system
//! calls keep making progress on their own OS threads.
//!
//! An instrumentation substrate (see [`Substrate`]) calls the arbiter at
//! three kinds of points: capture guards at unit entry, syscall guards
//! before blocking calls, and switch hooks where the scheduler asked for
//! them. A scheduler (see [`SchedulerHooks`]) decides who runs next.
//!
//! ## Quick Start
//!
//! ```ignore
//! use vspin::sim::{Op, RoundRobin, SimSubstrate};
//! use vspin::{Spin, SpinConfig};
//!
//! let substrate = SimSubstrate::new();
//! let policy = RoundRobin::new();
//! let spin = Spin::initialize(&substrate, Box::new(policy.clone()), SpinConfig::default())?;
//!
//! let report = substrate.run(vec![vec![Op::Compute; 4]; 3], &policy)?;
//! assert_eq!(report.peak_runners, 1);
//! println!("{}", spin.stats().snapshot());
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │           Substrate (instrumented program)                │
//! │   capture guard · syscall guard · switch hook · Resume    │
//! └───────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌───────────────────────────────────────────────────────────┐
//! │                   vspin-runtime: Arbiter                  │
//! │  thread table · executor/runner · wake slots · admin API  │
//! └───────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌───────────────────────────────────────────────────────────┐
//! │                    SchedulerHooks (policy)                │
//! └───────────────────────────────────────────────────────────┘
//! ```

use std::ops::Deref;
use std::sync::Arc;

// Re-export core types
pub use vspin_core::{
    ThreadId,
    ThreadState,
    ThreadContext,
    RegSlot,
    Resume,
    Role,
    UnitDesc,
    OpKind,
    IPoint,
    TraceInfo,
    SwitchPlacement,
    InstrumentationPlan,
    Substrate,
    SchedulerHooks,
    PointHandlers,
    SpinError,
    SpinResult,
    Violation,
    fatal,
};

// Re-export kprint macros for debug logging
pub use vspin_core::{kprint, kprintln, kerror, kwarn, kinfo, kdebug, ktrace};
pub use vspin_core::kprint::{LogLevel, init as init_logging, set_log_level, set_flush_enabled, set_time_enabled};

// Re-export env utilities
pub use vspin_core::{env_get, env_get_bool, env_get_opt, env_get_str};

// Re-export runtime types
pub use vspin_runtime::{
    Arbiter,
    ArbiterSnapshot,
    SpinConfig,
    ConfigError,
    Stats,
    StatsSnapshot,
};

#[cfg(feature = "sim")]
pub use vspin_runtime::sim;

/// Handle to an arbiter attached to a substrate
///
/// Dereferences to the [`Arbiter`], so the administrative API is called
/// directly on the handle.
pub struct Spin<C: ThreadContext> {
    arbiter: Arc<Arbiter<C>>,
}

impl<C: ThreadContext> Spin<C> {
    /// Initialize logging, build the arbiter and attach it to `substrate`
    ///
    /// Fails with `AlreadyInitialized` if the substrate already has
    /// handlers attached.
    pub fn initialize<S>(
        substrate: &S,
        hooks: Box<dyn SchedulerHooks<C>>,
        config: SpinConfig,
    ) -> SpinResult<Self>
    where
        S: Substrate<Context = C> + ?Sized,
    {
        init_logging();
        if config.debug_logging {
            config.print();
        }
        let arbiter = Arbiter::initialize(substrate, hooks, config)?;
        Ok(Self { arbiter })
    }

    /// Shared handle to the arbiter
    pub fn arbiter(&self) -> &Arc<Arbiter<C>> {
        &self.arbiter
    }
}

impl<C: ThreadContext> Deref for Spin<C> {
    type Target = Arbiter<C>;

    fn deref(&self) -> &Arbiter<C> {
        &self.arbiter
    }
}

impl<C: ThreadContext> Clone for Spin<C> {
    fn clone(&self) -> Self {
        Self {
            arbiter: Arc::clone(&self.arbiter),
        }
    }
}

#[cfg(all(test, feature = "sim"))]
mod tests {
    use super::*;
    use sim::{RoundRobin, SimSubstrate};

    #[test]
    fn test_initialize_once() {
        let substrate = SimSubstrate::new();
        let config = SpinConfig::new().max_threads(8);
        let spin = Spin::initialize(&substrate, Box::new(RoundRobin::new()), config.clone()).unwrap();
        assert_eq!(spin.capacity(), 8);
        assert!(substrate.handlers().is_some());

        let again = Spin::initialize(&substrate, Box::new(RoundRobin::new()), config);
        assert!(matches!(again, Err(SpinError::AlreadyInitialized)));
    }
}
