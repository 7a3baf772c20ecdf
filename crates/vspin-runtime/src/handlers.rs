//! `PointHandlers` wiring for the arbiter

use vspin_core::{
    InstrumentationPlan, PointHandlers, Resume, SpinResult, ThreadContext, ThreadId, UnitDesc,
};

use crate::arbiter::Arbiter;

impl<C: ThreadContext> PointHandlers<C> for Arbiter<C> {
    #[inline]
    fn should_capture(&self, executor_reg: u64) -> bool {
        Arbiter::should_capture(self, executor_reg)
    }

    #[inline]
    fn should_guard_syscall(&self, executor_reg: u64) -> bool {
        Arbiter::should_guard_syscall(self, executor_reg)
    }

    #[inline]
    fn needs_switch(&self, next: ThreadId) -> bool {
        Arbiter::needs_switch(self, next)
    }

    fn try_thread_start(&self, tid: ThreadId, context: &mut C) -> SpinResult<()> {
        Arbiter::thread_start(self, tid, context)
    }

    fn try_thread_end(&self, tid: ThreadId) -> SpinResult<()> {
        Arbiter::thread_end(self, tid)
    }

    fn try_instrument_unit(&self, unit: &UnitDesc) -> SpinResult<InstrumentationPlan> {
        Arbiter::instrument_unit(self, unit)
    }

    fn try_capture_point(&self, tid: ThreadId, context: &C) -> SpinResult<Resume<C>> {
        Arbiter::capture_point(self, tid, context)
    }

    fn try_syscall_point(&self, tid: ThreadId, context: &C) -> SpinResult<Resume<C>> {
        Arbiter::syscall_point(self, tid, context)
    }

    fn try_switch_point(&self, tid: ThreadId, context: &C) -> SpinResult<Resume<C>> {
        Arbiter::switch_point(self, tid, context)
    }
}
