//! The arbiter: shared scheduling metadata and the helpers every handler
//! uses.
//!
//! All metadata sits in [`Shared`] behind one `SpinLock`. Two fields are
//! mirrored into atomics so the substrate's pre-checks can run without
//! taking the lock; the mirrors are written only while the lock is held.
//!
//! The handlers themselves live in `capture.rs`, `syscall.rs` and
//! `switch.rs`; the administrative API in `admin.rs`.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use vspin_core::{
    ensure, kdebug, kinfo, PointHandlers, RegSlot, Resume, Role, SchedulerHooks, SpinError,
    SpinLock, SpinResult, Substrate, ThreadContext, ThreadId, ThreadState, Violation,
};
use vspin_core::spinlock::SpinLockGuard;

use crate::config::SpinConfig;
use crate::parking::{new_wake_slot, WakePrimitive, WakeSlot};
use crate::stats::Stats;
use crate::table::ThreadTable;

/// Metadata protected by the arbitration lock
pub(crate) struct Shared<C> {
    pub(crate) table: ThreadTable<C>,
    /// Virtual thread designated `Running`
    pub(crate) current: ThreadId,
    /// OS thread holding the executor role
    pub(crate) executor: ThreadId,
    /// Threads in `{Idle, Running}`
    pub(crate) captured: usize,
    /// Delayed-uncapture obligation: the sole captured thread went into a
    /// syscall without giving up the executor role
    pub(crate) executor_in_syscall: bool,
    /// One-shot request consumed by the next switch
    pub(crate) block_after_switch: bool,
    pub(crate) hooks: Box<dyn SchedulerHooks<C>>,
}

pub(crate) type Guard<'a, C> = SpinLockGuard<'a, Shared<C>>;

/// Single-runner arbitration core
pub struct Arbiter<C: ThreadContext> {
    shared: SpinLock<Shared<C>>,
    wake: Box<[WakeSlot]>,
    current_hint: AtomicU32,
    block_hint: AtomicBool,
    executor_reg: RegSlot,
    switch_reg: RegSlot,
    config: SpinConfig,
    stats: Stats,
}

/// Copy of the arbiter's metadata at one instant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArbiterSnapshot {
    pub states: Vec<ThreadState>,
    pub current: ThreadId,
    pub executor: ThreadId,
    pub captured: usize,
    pub executor_in_syscall: bool,
    pub block_after_switch: bool,
}

impl ArbiterSnapshot {
    /// State of `tid`, or `None` past the table's capacity
    pub fn state(&self, tid: ThreadId) -> Option<ThreadState> {
        self.states.get(tid.as_usize()).copied()
    }
}

impl<C: ThreadContext> Arbiter<C> {
    /// Build an arbiter with every thread `Uncaptured` and every wake slot
    /// parked, claiming the executor and switch registers from `substrate`.
    pub fn new<S>(
        substrate: &S,
        hooks: Box<dyn SchedulerHooks<C>>,
        config: SpinConfig,
    ) -> SpinResult<Self>
    where
        S: Substrate<Context = C> + ?Sized,
    {
        config.validate()?;

        let executor_reg = substrate.claim_register()?;
        let switch_reg = substrate.claim_register()?;
        ensure!(executor_reg != switch_reg, "substrate handed out the same register twice");

        let wake: Vec<WakeSlot> = (0..config.max_threads)
            .map(|_| new_wake_slot(config.wake_spins))
            .collect();

        let shared = Shared {
            table: ThreadTable::new(config.max_threads),
            current: ThreadId::NONE,
            executor: ThreadId::NONE,
            captured: 0,
            executor_in_syscall: false,
            block_after_switch: false,
            hooks,
        };

        kinfo!(
            "arbiter up: {} thread slots, executor reg {}, switch reg {}",
            config.max_threads,
            executor_reg.0,
            switch_reg.0
        );

        Ok(Self {
            shared: SpinLock::with_spin_limit(shared, config.lock_spins),
            wake: wake.into_boxed_slice(),
            current_hint: AtomicU32::new(ThreadId::NONE.as_u32()),
            block_hint: AtomicBool::new(false),
            executor_reg,
            switch_reg,
            config,
            stats: Stats::new(),
        })
    }

    /// Build an arbiter and attach its handlers to the substrate
    pub fn initialize<S>(
        substrate: &S,
        hooks: Box<dyn SchedulerHooks<C>>,
        config: SpinConfig,
    ) -> SpinResult<Arc<Self>>
    where
        S: Substrate<Context = C> + ?Sized,
    {
        let arbiter = Arc::new(Self::new(substrate, hooks, config)?);
        substrate.attach(Arc::clone(&arbiter) as Arc<dyn PointHandlers<C>>)?;
        Ok(arbiter)
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Register carrying the executor flag
    #[inline]
    pub fn executor_reg(&self) -> RegSlot {
        self.executor_reg
    }

    /// Register carrying the next-thread hint
    #[inline]
    pub fn switch_reg(&self) -> RegSlot {
        self.switch_reg
    }

    #[inline]
    pub fn config(&self) -> &SpinConfig {
        &self.config
    }

    #[inline]
    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.config.max_threads
    }

    /// Current runner as last published (no lock)
    #[inline]
    pub fn current_hint(&self) -> ThreadId {
        ThreadId::new(self.current_hint.load(Ordering::Acquire))
    }

    pub fn snapshot(&self) -> ArbiterSnapshot {
        let s = self.shared.lock();
        ArbiterSnapshot {
            states: s.table.states(),
            current: s.current,
            executor: s.executor,
            captured: s.captured,
            executor_in_syscall: s.executor_in_syscall,
            block_after_switch: s.block_after_switch,
        }
    }

    // ------------------------------------------------------------------
    // Pre-checks (outside the lock)
    // ------------------------------------------------------------------

    /// Capture guard runs only on contexts that are not the executor
    #[inline]
    pub fn should_capture(&self, executor_reg: u64) -> bool {
        executor_reg == 0
    }

    /// Syscall guard runs only on the executor
    #[inline]
    pub fn should_guard_syscall(&self, executor_reg: u64) -> bool {
        executor_reg != 0
    }

    /// Switch hook runs when the decision names another thread, or when a
    /// block-after-switch is armed (which must then fail if it does not)
    #[inline]
    pub fn needs_switch(&self, next: ThreadId) -> bool {
        next.as_u32() != self.current_hint.load(Ordering::Acquire)
            || self.block_hint.load(Ordering::Acquire)
    }

    // ------------------------------------------------------------------
    // Invariants
    // ------------------------------------------------------------------

    /// Check the invariants that hold whenever the lock is free
    pub fn check_invariants(&self) -> SpinResult<()> {
        let s = self.shared.lock();
        Self::check_locked(&s)
    }

    /// Like `check_invariants`, and additionally require that no hand-off
    /// is in flight: an executor exists iff some thread is captured.
    pub fn check_quiescent(&self) -> SpinResult<()> {
        let s = self.shared.lock();
        Self::check_locked(&s)?;
        ensure!(
            (s.captured == 0) == s.executor.is_none(),
            "executor present without captured threads, or missing with them"
        );
        Ok(())
    }

    fn check_locked(s: &Shared<C>) -> SpinResult<()> {
        ensure!(
            s.captured == s.table.count_captured(),
            "captured count disagrees with the table"
        );
        let running: Vec<ThreadId> = s.table.in_state(ThreadState::Running).collect();
        if s.captured == 0 {
            ensure!(running.is_empty(), "running thread with nothing captured");
        } else {
            ensure!(running == [s.current], "current runner is not the one running thread");
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Helpers for the handlers (lock held by the caller)
    // ------------------------------------------------------------------

    #[inline]
    pub(crate) fn lock(&self) -> Guard<'_, C> {
        self.shared.lock()
    }

    pub(crate) fn set_executor(&self, s: &mut Shared<C>, tid: ThreadId) {
        s.executor = tid;
    }

    pub(crate) fn set_current(&self, s: &mut Shared<C>, tid: ThreadId) {
        s.current = tid;
        self.current_hint.store(tid.as_u32(), Ordering::Release);
    }

    pub(crate) fn set_block_after_switch(&self, s: &mut Shared<C>, armed: bool) {
        s.block_after_switch = armed;
        self.block_hint.store(armed, Ordering::Release);
    }

    /// Scheduler-chosen next thread must exist and be `Idle`
    pub(crate) fn validate_choice(s: &Shared<C>, next: ThreadId) -> SpinResult<()> {
        if !s.table.contains(next) {
            return Err(Violation::TidOutOfRange {
                tid: next,
                max: s.table.capacity(),
            }
            .into());
        }
        let state = s.table.state(next)?;
        if state != ThreadState::Idle {
            return Err(Violation::NotIdle { tid: next, state }.into());
        }
        Ok(())
    }

    /// Take the current runner out of the captured set and install the
    /// scheduler's choice as the new runner
    pub(crate) fn uncapture_and_switch(&self, s: &mut Shared<C>) -> SpinResult<()> {
        let cur = s.current;
        let next = {
            let Shared { table, hooks, .. } = &mut *s;
            hooks.on_uncapture(cur, table.context_mut(cur)?)
        };
        Self::validate_choice(s, next)?;

        ensure!(s.captured > 0, "uncapture with nothing captured");
        s.captured -= 1;
        s.table.transition(cur, ThreadState::Running, ThreadState::Uncaptured)?;
        self.set_current(s, next);
        s.table.transition(next, ThreadState::Idle, ThreadState::Running)?;
        self.stats.uncapture();
        Ok(())
    }

    /// Resume the current runner's saved context as executor
    pub(crate) fn resume_executor(&self, s: &mut Shared<C>) -> SpinResult<Resume<C>> {
        let cur = s.current;
        ensure!(cur.is_some(), "executor resume with no current runner");
        let context = s.table.context_mut(cur)?;
        context.set_reg(self.executor_reg, 1);
        context.set_reg(self.switch_reg, cur.to_reg());
        Ok(Resume {
            tid: cur,
            role: Role::Executor,
            context: context.clone(),
        })
    }

    /// Resume `tid`'s own saved context uninstrumented
    pub(crate) fn resume_uncaptured(
        &self,
        s: &mut Shared<C>,
        tid: ThreadId,
    ) -> SpinResult<Resume<C>> {
        let context = s.table.context_mut(tid)?;
        context.set_reg(self.executor_reg, 0);
        context.set_reg(self.switch_reg, ThreadId::NONE.to_reg());
        Ok(Resume {
            tid,
            role: Role::Uncaptured,
            context: context.clone(),
        })
    }

    /// Release `tid` from its wake slot
    pub(crate) fn wake(&self, tid: ThreadId) {
        if self.config.debug_logging {
            kdebug!("waking thread {}", tid);
        }
        self.wake[tid.as_usize()].post();
    }

    /// Park the calling thread on its own wake slot (lock not held)
    pub(crate) fn park(&self, tid: ThreadId) {
        self.wake[tid.as_usize()].wait();
    }

    // ------------------------------------------------------------------
    // Thread lifecycle
    // ------------------------------------------------------------------

    /// A new OS thread exists; it starts `Uncaptured` and will trip a
    /// capture point on its first unit
    pub fn thread_start(&self, tid: ThreadId, context: &mut C) -> SpinResult<()> {
        let mut s = self.lock();
        s.table.check(tid)?;
        if self.config.debug_logging {
            kdebug!("thread {} started", tid);
        }
        s.hooks.on_thread_start(tid);
        self.stats.thread_start();
        ensure!(
            s.table.state(tid)? == ThreadState::Uncaptured,
            "thread started in a captured state"
        );
        context.set_reg(self.executor_reg, 0);
        Ok(())
    }

    /// An OS thread exited
    ///
    /// Only the sole captured thread may exit while `Running` (it kept the
    /// executor role through its exit syscall); the arbiter then returns to
    /// its empty state. Every other thread must exit `Uncaptured`.
    pub fn thread_end(&self, tid: ThreadId) -> SpinResult<()> {
        let mut s = self.lock();
        if self.config.debug_logging {
            kdebug!("thread {} finished", tid);
        }
        match s.table.state(tid)? {
            ThreadState::Running => {
                ensure!(s.captured == 1, "running thread exited with others captured");
                ensure!(s.executor == tid, "running thread exited without the executor role");
                s.table.set_state(tid, ThreadState::Uncaptured)?;
                s.captured = 0;
                s.executor_in_syscall = false;
                self.set_current(&mut s, ThreadId::NONE);
                self.set_executor(&mut s, ThreadId::NONE);
            }
            ThreadState::Uncaptured => {}
            _ => return Err(SpinError::InvariantBroken("thread exited while captured")),
        }
        s.hooks.on_thread_end(tid);
        self.stats.thread_end();
        Ok(())
    }
}
