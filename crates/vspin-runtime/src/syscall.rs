//! Syscall point handler
//!
//! Runs on the executor just before a genuine blocking operation. The
//! thread whose code reached the syscall leaves the captured set and runs
//! the syscall on its own OS thread. Three cases:
//!
//! - the executor is running someone else's code: that thread is uncaptured
//!   and woken to perform its own syscall, the executor carries on with the
//!   scheduler's next choice
//! - the executor is running its own code with others captured: it gives up
//!   the role and wakes the next runner
//! - it is the only captured thread: it keeps the role and enters the
//!   syscall, leaving a delayed-uncapture obligation for the next capture

use vspin_core::{ensure, kdebug, ktrace, Resume, SpinResult, ThreadContext, ThreadId};

use crate::arbiter::Arbiter;

impl<C: ThreadContext> Arbiter<C> {
    pub fn syscall_point(&self, tid: ThreadId, context: &C) -> SpinResult<Resume<C>> {
        let mut s = self.lock();
        ensure!(s.executor == tid, "syscall point reached by a non-executor");

        let cur = s.current;
        s.table.store(cur, context.clone())?;

        if cur != tid {
            ensure!(s.captured >= 2, "shipped syscall with a lone runner");
            self.uncapture_and_switch(&mut s)?;
            self.wake(cur);
            self.stats().shipped_syscall();
            ktrace!("[{}] syscall: shipped to {}, now running {}", tid, cur, s.current);
            return self.resume_executor(&mut s);
        }

        if s.captured >= 2 {
            self.uncapture_and_switch(&mut s)?;
            self.set_executor(&mut s, ThreadId::NONE);
            let next = s.current;
            self.wake(next);
            if self.config().debug_logging {
                kdebug!("[{}] syscall: handed the executor role to {}", tid, next);
            }
        } else {
            ensure!(!s.executor_in_syscall, "executor entered a syscall twice");
            s.executor_in_syscall = true;
            ktrace!("[{}] syscall: sole thread keeps the executor role", tid);
        }
        self.resume_uncaptured(&mut s, tid)
    }
}

#[cfg(test)]
mod tests {
    use crate::sim::{test_arbiter, SimContext};
    use vspin_core::{Role, ThreadContext, ThreadId, ThreadState};

    fn tid(n: u32) -> ThreadId {
        ThreadId::new(n)
    }

    #[test]
    fn test_sole_thread_keeps_role() {
        let arb = test_arbiter(2);
        let exec = arb.capture_point(tid(0), &SimContext::new(tid(0))).unwrap();
        let out = arb.syscall_point(tid(0), &exec.context).unwrap();
        assert_eq!(out.role, Role::Uncaptured);
        assert_eq!(out.tid, tid(0));
        assert_eq!(out.context.reg(arb.executor_reg()), 0);

        let snap = arb.snapshot();
        assert_eq!(snap.executor, tid(0));
        assert_eq!(snap.state(tid(0)), Some(ThreadState::Running));
        assert_eq!(snap.captured, 1);
        assert!(snap.executor_in_syscall);
    }

    #[test]
    fn test_non_executor_rejected() {
        let arb = test_arbiter(2);
        arb.capture_point(tid(0), &SimContext::new(tid(0))).unwrap();
        assert!(arb.syscall_point(tid(1), &SimContext::new(tid(1))).is_err());
    }
}
