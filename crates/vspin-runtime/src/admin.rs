//! Administrative API
//!
//! Called by scheduler code outside the handler hot path. Every operation
//! takes the arbitration lock, so none of them may be called from inside a
//! `SchedulerHooks` callback.

use vspin_core::{
    kdebug, RegSlot, SpinError, SpinResult, ThreadContext, ThreadId, ThreadState, Violation,
};

use crate::arbiter::{Arbiter, Shared};

impl<C: ThreadContext> Arbiter<C> {
    /// Request that the runner switched away from next becomes `Blocked`
    /// instead of `Idle`
    pub fn arm_block_after_switch(&self) -> SpinResult<()> {
        let mut s = self.lock();
        if s.block_after_switch {
            return Err(Violation::AlreadyArmed.into());
        }
        self.set_block_after_switch(&mut s, true);
        Ok(())
    }

    /// Move an `Idle` thread to `Blocked`
    ///
    /// Refused when it would leave no runnable captured thread.
    pub fn block_idle_thread(&self, tid: ThreadId) -> SpinResult<()> {
        let mut s = self.lock();
        Self::expect_state(&s, tid, ThreadState::Idle, "block_idle_thread")?;
        if s.captured <= 1 {
            return Err(SpinError::LastRunnable(tid));
        }
        s.table.set_state(tid, ThreadState::Blocked)?;
        s.captured -= 1;
        self.stats().block();
        if self.config().debug_logging {
            kdebug!("blocked idle thread {}", tid);
        }
        Ok(())
    }

    /// Move a `Blocked` thread back to `Idle`
    pub fn unblock(&self, tid: ThreadId) -> SpinResult<()> {
        let mut s = self.lock();
        Self::expect_state(&s, tid, ThreadState::Blocked, "unblock")?;
        s.table.set_state(tid, ThreadState::Idle)?;
        s.captured += 1;
        self.stats().unblock();
        if self.config().debug_logging {
            kdebug!("unblocked thread {}", tid);
        }
        Ok(())
    }

    /// Run `f` on the saved context of an `Idle` or `Blocked` thread
    pub fn with_context<R>(&self, tid: ThreadId, f: impl FnOnce(&mut C) -> R) -> SpinResult<R> {
        let mut s = self.lock();
        let state = s.table.state(tid)?;
        if !state.context_accessible() {
            return Err(SpinError::InvalidState {
                tid,
                state,
                op: "context access",
            });
        }
        Ok(f(s.table.context_mut(tid)?))
    }

    /// Read a register from a parked thread's saved context
    pub fn reg(&self, tid: ThreadId, slot: RegSlot) -> SpinResult<u64> {
        self.with_context(tid, |ctx| ctx.reg(slot))
    }

    /// Write a register in a parked thread's saved context
    pub fn set_reg(&self, tid: ThreadId, slot: RegSlot, value: u64) -> SpinResult<()> {
        self.with_context(tid, |ctx| ctx.set_reg(slot, value))
    }

    /// Copy out a parked thread's whole saved context
    pub fn save_context(&self, tid: ThreadId) -> SpinResult<C> {
        self.with_context(tid, |ctx| ctx.clone())
    }

    /// Replace a parked thread's whole saved context
    pub fn load_context(&self, tid: ThreadId, context: &C) -> SpinResult<()> {
        self.with_context(tid, |ctx| *ctx = context.clone())
    }

    fn expect_state(
        s: &Shared<C>,
        tid: ThreadId,
        expected: ThreadState,
        op: &'static str,
    ) -> SpinResult<()> {
        let state = s.table.state(tid)?;
        if state != expected {
            return Err(SpinError::InvalidState { tid, state, op });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::sim::{test_arbiter, SimContext};
    use vspin_core::{SpinError, ThreadId, ThreadState, Violation};

    fn tid(n: u32) -> ThreadId {
        ThreadId::new(n)
    }

    #[test]
    fn test_arm_twice() {
        let arb = test_arbiter(2);
        arb.arm_block_after_switch().unwrap();
        assert_eq!(
            arb.arm_block_after_switch(),
            Err(SpinError::ContractViolation(Violation::AlreadyArmed))
        );
        assert!(arb.snapshot().block_after_switch);
    }

    #[test]
    fn test_block_requires_idle() {
        let arb = test_arbiter(2);
        assert!(matches!(
            arb.block_idle_thread(tid(1)),
            Err(SpinError::InvalidState { state: ThreadState::Uncaptured, .. })
        ));
        assert!(matches!(
            arb.unblock(tid(1)),
            Err(SpinError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_block_last_runnable_refused() {
        let arb = test_arbiter(2);
        arb.capture_point(tid(0), &SimContext::new(tid(0))).unwrap();
        // tid 0 is Running, not Idle
        assert!(matches!(
            arb.block_idle_thread(tid(0)),
            Err(SpinError::InvalidState { state: ThreadState::Running, .. })
        ));
    }

    #[test]
    fn test_context_access_on_running_refused() {
        let arb = test_arbiter(2);
        arb.capture_point(tid(0), &SimContext::new(tid(0))).unwrap();
        assert!(arb.save_context(tid(0)).is_err());
        assert!(arb.save_context(tid(1)).is_err());
    }
}
