//! Switch point handler
//!
//! Runs on the executor when the scheduler's decision (left in the switch
//! register) names a thread other than the current runner, or whenever a
//! block-after-switch is armed. The executor keeps its role and its OS
//! thread; only the virtual thread whose context it runs changes.

use vspin_core::{
    ensure, ktrace, Resume, SpinError, SpinResult, ThreadContext, ThreadId, ThreadState, Violation,
};

use crate::arbiter::Arbiter;

impl<C: ThreadContext> Arbiter<C> {
    pub fn switch_point(&self, tid: ThreadId, context: &C) -> SpinResult<Resume<C>> {
        let next = ThreadId::from_reg(context.reg(self.switch_reg()));
        let mut s = self.lock();

        if context.reg(self.executor_reg()) != 1 {
            return Err(Violation::NotExecutor {
                tid,
                executor: s.executor,
            }
            .into());
        }
        if s.block_after_switch && next == s.current {
            return Err(Violation::SameThreadWhileArmed(next).into());
        }
        ensure!(s.executor == tid, "switch point reached by a non-executor");
        ensure!(next != s.current, "switch point without a thread change");
        Self::validate_choice(&s, next)?;

        let cur = s.current;
        let mut saved = context.clone();
        saved.set_reg(self.executor_reg(), 0);
        saved.set_reg(self.switch_reg(), ThreadId::NONE.to_reg());
        s.table.store(cur, saved)?;

        if s.block_after_switch {
            s.table.transition(cur, ThreadState::Running, ThreadState::Blocked)?;
            s.captured = s
                .captured
                .checked_sub(1)
                .ok_or(SpinError::InvariantBroken("blocked a runner with nothing captured"))?;
            self.set_block_after_switch(&mut s, false);
            self.stats().block();
        } else {
            s.table.transition(cur, ThreadState::Running, ThreadState::Idle)?;
        }

        self.set_current(&mut s, next);
        s.table.transition(next, ThreadState::Idle, ThreadState::Running)?;
        self.stats().switch();
        ktrace!("[{}] switch: {} -> {}", tid, cur, next);
        self.resume_executor(&mut s)
    }
}
