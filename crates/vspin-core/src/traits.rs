//! Collaborator traits
//!
//! These traits define the seams between the arbitration core and the two
//! external collaborators: the instrumentation substrate (which owns real
//! machine state) and the scheduler (which owns policy).

use std::sync::Arc;

use crate::context::{RegSlot, Resume, ThreadContext};
use crate::error::SpinResult;
use crate::id::ThreadId;
use crate::unit::{InstrumentationPlan, TraceInfo, UnitDesc};

/// Instrumentation substrate
///
/// Discovers code units, installs guards where the arbiter's plan says,
/// snapshots contexts, and performs the redirection named by each `Resume`.
pub trait Substrate: Send + Sync {
    /// Opaque per-thread execution snapshot
    type Context: ThreadContext;

    /// Allocate a substrate-managed per-thread register slot
    fn claim_register(&self) -> SpinResult<RegSlot>;

    /// Wire the point handlers into the instrumentation points
    ///
    /// Called once from initialization; a second attach is an error.
    fn attach(&self, handlers: Arc<dyn PointHandlers<Self::Context>>) -> SpinResult<()>;
}

/// Scheduler policy callbacks
///
/// Every method runs with the arbitration lock held, so implementations
/// must not call back into the blocking administrative API.
pub trait SchedulerHooks<C>: Send {
    /// Called once per discovered unit; may request switch points
    fn on_trace_unit(&mut self, unit: &UnitDesc, info: &mut TraceInfo) {
        let _ = (unit, info);
    }

    /// A thread came into existence
    fn on_thread_start(&mut self, tid: ThreadId) {
        let _ = tid;
    }

    /// A thread exited
    fn on_thread_end(&mut self, tid: ThreadId) {
        let _ = tid;
    }

    /// `tid` became captured; `is_first` when it is the only captured thread
    fn on_capture(&mut self, tid: ThreadId, is_first: bool);

    /// `tid` must give up captured status (it is about to run a syscall)
    ///
    /// Must return an `Idle` thread to run next. The context belongs to
    /// `tid` and may be modified before it runs its syscall.
    fn on_uncapture(&mut self, tid: ThreadId, context: &mut C) -> ThreadId;
}

/// Entry points the substrate calls at instrumentation points
///
/// The `try_*` forms report contract violations as errors. The plain forms
/// are what a substrate should wire up: they terminate the process on any
/// error, since continuing would break the single-runner invariant.
pub trait PointHandlers<C: ThreadContext>: Send + Sync {
    /// Cheap pre-check for the capture guard (outside the lock)
    fn should_capture(&self, executor_reg: u64) -> bool;

    /// Cheap pre-check for the syscall guard (outside the lock)
    fn should_guard_syscall(&self, executor_reg: u64) -> bool;

    /// Cheap pre-check for the switch hook (outside the lock)
    fn needs_switch(&self, next: ThreadId) -> bool;

    fn try_thread_start(&self, tid: ThreadId, context: &mut C) -> SpinResult<()>;
    fn try_thread_end(&self, tid: ThreadId) -> SpinResult<()>;
    fn try_instrument_unit(&self, unit: &UnitDesc) -> SpinResult<InstrumentationPlan>;
    fn try_capture_point(&self, tid: ThreadId, context: &C) -> SpinResult<Resume<C>>;
    fn try_syscall_point(&self, tid: ThreadId, context: &C) -> SpinResult<Resume<C>>;
    fn try_switch_point(&self, tid: ThreadId, context: &C) -> SpinResult<Resume<C>>;

    fn thread_start(&self, tid: ThreadId, context: &mut C) {
        self.try_thread_start(tid, context)
            .unwrap_or_else(|e| crate::error::fatal(&e))
    }

    fn thread_end(&self, tid: ThreadId) {
        self.try_thread_end(tid)
            .unwrap_or_else(|e| crate::error::fatal(&e))
    }

    fn instrument_unit(&self, unit: &UnitDesc) -> InstrumentationPlan {
        self.try_instrument_unit(unit)
            .unwrap_or_else(|e| crate::error::fatal(&e))
    }

    fn capture_point(&self, tid: ThreadId, context: &C) -> Resume<C> {
        self.try_capture_point(tid, context)
            .unwrap_or_else(|e| crate::error::fatal(&e))
    }

    fn syscall_point(&self, tid: ThreadId, context: &C) -> Resume<C> {
        self.try_syscall_point(tid, context)
            .unwrap_or_else(|e| crate::error::fatal(&e))
    }

    fn switch_point(&self, tid: ThreadId, context: &C) -> Resume<C> {
        self.try_switch_point(tid, context)
            .unwrap_or_else(|e| crate::error::fatal(&e))
    }
}
