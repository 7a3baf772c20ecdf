//! # vspin-runtime
//!
//! The arbitration core: one [`Arbiter`] owns the thread table, the
//! executor and runner designations, and one wake slot per thread. The
//! substrate calls its three handlers at instrumentation points:
//!
//! - capture point (`capture`) - a thread re-enters controlled code
//! - syscall point (`syscall`) - the executor is about to block in the kernel
//! - switch point (`switch`) - a switch decision named a different thread
//!
//! plus the administrative API (`admin`) used by scheduler code outside the
//! hot path.
//!
//! Exclusivity of execution comes from parking every captured thread that
//! is not the executor on its own wake slot; the arbitration lock only
//! protects metadata and is never held across a park or a resume.

pub mod config;
pub mod parking;
pub mod table;
pub mod stats;
pub mod arbiter;
pub mod capture;
pub mod syscall;
pub mod switch;
pub mod admin;
pub mod instrument;
mod handlers;

#[cfg(feature = "sim")]
pub mod sim;

// Re-exports
pub use config::{ConfigError, SpinConfig};
pub use arbiter::{Arbiter, ArbiterSnapshot};
pub use parking::{new_wake_slot, WakePrimitive, WakeSlot};
pub use stats::{Stats, StatsSnapshot};
pub use table::ThreadTable;
