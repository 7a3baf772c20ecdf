//! Capture point handler
//!
//! Runs whenever a non-executor context enters controlled code. The thread
//! joins the captured set, settles any delayed uncapture left behind by an
//! executor that entered a syscall alone, then either claims the vacant
//! executor role or parks on its wake slot until someone hands it a role.

use vspin_core::{ensure, kdebug, ktrace, Resume, SpinResult, ThreadContext, ThreadId, ThreadState};

use crate::arbiter::Arbiter;

impl<C: ThreadContext> Arbiter<C> {
    pub fn capture_point(&self, tid: ThreadId, context: &C) -> SpinResult<Resume<C>> {
        let mut s = self.lock();
        s.table.store(tid, context.clone())?;

        // Sole captured thread back from its syscall: it never gave up the
        // executor role, so it simply carries on.
        if s.table.state(tid)? == ThreadState::Running {
            ensure!(s.executor == tid, "running thread re-captured without the executor role");
            ensure!(s.current == tid, "running thread is not the current runner");
            ensure!(s.captured == 1, "running thread re-captured alongside others");
            s.executor_in_syscall = false;
            ktrace!("[{}] capture: sole thread keeps the executor role", tid);
            return self.resume_executor(&mut s);
        }

        ensure!(
            s.table.state(tid)? == ThreadState::Uncaptured,
            "capture point reached by a captured thread"
        );

        let is_first = s.captured == 0;
        s.hooks.on_capture(tid, is_first);
        s.captured += 1;
        s.table.set_state(tid, ThreadState::Idle)?;
        self.stats().capture();

        if is_first {
            ensure!(s.current.is_none(), "first capture with a runner already set");
            s.table.set_state(tid, ThreadState::Running)?;
            self.set_current(&mut s, tid);
        }

        // The executor went into a syscall as the only captured thread. Now
        // that there is someone to run, settle the uncapture it skipped.
        if s.executor_in_syscall {
            ensure!(s.current == s.executor, "delayed uncapture with a foreign runner");
            ensure!(s.captured == 2, "delayed uncapture with more than one newcomer");
            self.uncapture_and_switch(&mut s)?;
            self.set_executor(&mut s, ThreadId::NONE);
            s.executor_in_syscall = false;
            self.stats().delayed_uncapture();
            if self.config().debug_logging {
                kdebug!("[{}] capture: settled delayed uncapture", tid);
            }
        }

        while s.executor.is_some() {
            drop(s);
            self.park(tid);
            s = self.lock();

            if s.table.state(tid)? == ThreadState::Uncaptured {
                // Our syscall was shipped; run it on our own OS thread
                ktrace!("[{}] capture: woken uncaptured", tid);
                return self.resume_uncaptured(&mut s, tid);
            } else if s.executor.is_none() {
                break;
            }
            self.stats().spurious_wakeup();
        }

        self.set_executor(&mut s, tid);
        if self.config().debug_logging {
            kdebug!("[{}] capture: took executor role, running {}", tid, s.current);
        }
        self.resume_executor(&mut s)
    }
}
