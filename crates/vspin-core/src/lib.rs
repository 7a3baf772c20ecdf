//! # vspin-core
//!
//! Core types and traits for the vspin arbitration core.
//!
//! vspin imposes a single-runner-at-a-time execution order over a set of
//! OS threads running instrumented code. This crate holds everything that is
//! independent of how threads are parked and how contexts are redirected:
//! identifiers, thread states, errors, the collaborator traits and the
//! instrumentation plan types. The arbiter itself lives in `vspin-runtime`.
//!
//! ## Modules
//!
//! - `id` - Virtual thread identifier type
//! - `state` - Capture state of a virtual thread
//! - `context` - Register slots, context trait and resume instructions
//! - `unit` - Code unit descriptions and instrumentation plans
//! - `traits` - Substrate, scheduler and handler traits
//! - `error` - Error types and fatal reporting
//! - `spinlock` - Arbitration lock primitive
//! - `kprint` - Kernel-style debug printing macros
//! - `env` - Environment variable utilities

pub mod id;
pub mod state;
pub mod context;
pub mod unit;
pub mod traits;
pub mod error;
pub mod spinlock;
pub mod kprint;
pub mod env;

// Re-exports for convenience
pub use id::ThreadId;
pub use state::ThreadState;
pub use context::{RegSlot, Resume, Role, ThreadContext};
pub use unit::{InstrumentationPlan, IPoint, OpKind, SwitchPlacement, TraceInfo, UnitDesc};
pub use traits::{PointHandlers, SchedulerHooks, Substrate};
pub use error::{fatal, SpinError, SpinResult, Violation};
pub use spinlock::SpinLock;
pub use env::{env_get, env_get_bool, env_get_opt, env_get_str};

/// Shared constants
pub mod constants {
    /// Default maximum number of virtual threads
    pub const DEFAULT_MAX_THREADS: usize = 2048;

    /// Hard upper bound on the configured capacity
    pub const MAX_THREADS_LIMIT: usize = 1 << 16;

    /// No thread sentinel value
    pub const THREAD_NONE: u32 = u32::MAX;
}
