//! Simulated substrate
//!
//! A software stand-in for a binary-instrumentation substrate. Each virtual
//! thread is a real OS thread running a tiny program of [`Op`]s; a
//! [`SimContext`] is just the owner's program counter plus the scheduler
//! registers. Each program is one unit. Before it runs, the arbiter's plan
//! for it is fetched through `instrument_unit`; switch decisions are made
//! only at the hooks that plan lists. Compute ops reached uncaptured go
//! through the capture guard and syscall ops through the syscall guard.
//!
//! Handlers are called in their fatal form: a contract violation ends the
//! process instead of leaving the other threads parked forever.
//!
//! Because a context names its owner's program, an executor OS thread can
//! resume any thread's context, which is exactly what the arbiter's
//! `Resume` asks the substrate to do.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread;
use std::time::Duration;

use vspin_core::{
    kdebug, IPoint, InstrumentationPlan, OpKind, PointHandlers, RegSlot, SchedulerHooks,
    SpinError, SpinResult, Substrate, ThreadContext, ThreadId, TraceInfo, UnitDesc,
};

/// Register slots a `SimContext` carries
pub const SIM_REGISTERS: usize = 4;

/// Saved state of one simulated thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimContext {
    /// Thread whose program this context runs
    pub owner: ThreadId,
    /// Index of the next op in the owner's program
    pub pc: usize,
    /// The switch hook before `pc` already ran
    pub hooked: bool,
    pub regs: [u64; SIM_REGISTERS],
}

impl SimContext {
    pub fn new(owner: ThreadId) -> Self {
        Self {
            owner,
            pc: 0,
            hooked: false,
            regs: [0; SIM_REGISTERS],
        }
    }

    /// Move past the current op
    fn advance(&mut self) {
        self.pc += 1;
        self.hooked = false;
    }
}

impl ThreadContext for SimContext {
    fn reg(&self, slot: RegSlot) -> u64 {
        self.regs.get(slot.index()).copied().unwrap_or(0)
    }

    fn set_reg(&mut self, slot: RegSlot, value: u64) {
        if let Some(r) = self.regs.get_mut(slot.index()) {
            *r = value;
        }
    }
}

/// One operation of a simulated program
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// Controlled code; only ever executed by the executor
    Compute,
    /// Blocking call, performed uncaptured on the owner's OS thread
    Syscall(Duration),
}

impl Op {
    fn kind(self) -> OpKind {
        match self {
            Op::Compute => OpKind::Plain,
            Op::Syscall(_) => OpKind::Syscall,
        }
    }
}

/// Unit describing program `index`
pub fn program_unit(index: usize, program: &[Op]) -> UnitDesc {
    UnitDesc::new(index as u64, program.iter().map(|op| op.kind()).collect())
}

/// A compute op as it was executed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    /// OS thread that executed it
    pub os_thread: ThreadId,
    /// Thread whose program it belongs to
    pub owner: ThreadId,
    pub pc: usize,
}

/// Outcome of a simulated run
#[derive(Debug, Clone, Default)]
pub struct SimReport {
    /// Compute ops in execution order
    pub steps: Vec<Step>,
    /// Most compute ops ever observed in flight at once
    pub peak_runners: usize,
}

impl SimReport {
    /// Compute ops belonging to `owner`, in program order
    pub fn steps_of(&self, owner: ThreadId) -> Vec<usize> {
        self.steps
            .iter()
            .filter(|s| s.owner == owner)
            .map(|s| s.pc)
            .collect()
    }

    /// Compute ops of `owner` executed on some other OS thread
    pub fn foreign_steps(&self, owner: ThreadId) -> usize {
        self.steps
            .iter()
            .filter(|s| s.owner == owner && s.os_thread != owner)
            .count()
    }
}

/// Switch decision made on the executor at each switch hook
pub trait SwitchPolicy: Send + Sync {
    /// Thread to run next; returning `current` means no switch
    fn decide(&self, current: ThreadId) -> ThreadId;
}

/// Round-robin scheduler over the `Idle` threads
///
/// The ready queue holds exactly the `Idle` set: newcomers join at the
/// back, uncaptures take the front, and a switch rotates the runner to the
/// back. Clones share one queue, so the same policy serves as both the
/// arbiter's hooks and the substrate's switch decision.
///
/// Every op that is not a syscall gets a switch hook in front of it.
#[derive(Debug, Clone, Default)]
pub struct RoundRobin {
    ready: Arc<Mutex<VecDeque<ThreadId>>>,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    fn ready(&self) -> MutexGuard<'_, VecDeque<ThreadId>> {
        self.ready.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Threads waiting to run, front first
    pub fn queued(&self) -> Vec<ThreadId> {
        self.ready().iter().copied().collect()
    }
}

impl<C> SchedulerHooks<C> for RoundRobin {
    fn on_trace_unit(&mut self, unit: &UnitDesc, info: &mut TraceInfo) {
        for index in (0..unit.len()).filter(|&i| !unit.is_syscall(i)) {
            info.insert_switch_call(index, IPoint::Before);
        }
    }

    fn on_capture(&mut self, tid: ThreadId, is_first: bool) {
        if !is_first {
            self.ready().push_back(tid);
        }
    }

    fn on_uncapture(&mut self, _tid: ThreadId, _context: &mut C) -> ThreadId {
        self.ready().pop_front().unwrap_or(ThreadId::NONE)
    }
}

impl SwitchPolicy for RoundRobin {
    fn decide(&self, current: ThreadId) -> ThreadId {
        let mut ready = self.ready();
        match ready.pop_front() {
            Some(next) => {
                ready.push_back(current);
                next
            }
            None => current,
        }
    }
}

/// Substrate that interprets simulated programs on real OS threads
#[derive(Default)]
pub struct SimSubstrate {
    claimed: Mutex<Vec<RegSlot>>,
    handlers: OnceLock<Arc<dyn PointHandlers<SimContext>>>,
}

impl SimSubstrate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handlers(&self) -> Option<&Arc<dyn PointHandlers<SimContext>>> {
        self.handlers.get()
    }

    /// Executor and switch registers, in the order the arbiter claims them
    fn scheduler_regs(&self) -> SpinResult<(RegSlot, RegSlot)> {
        let claimed = self.claimed.lock().unwrap_or_else(PoisonError::into_inner);
        match claimed.as_slice() {
            [executor, switch, ..] => Ok((*executor, *switch)),
            _ => Err(SpinError::InvariantBroken("scheduler registers not claimed")),
        }
    }

    /// Run one OS thread per program (program `i` is thread `i`) until all
    /// of them exit
    pub fn run(&self, programs: Vec<Vec<Op>>, policy: &dyn SwitchPolicy) -> SpinResult<SimReport> {
        let handlers = self
            .handlers()
            .ok_or(SpinError::InvariantBroken("substrate not attached"))?;
        let regs = self.scheduler_regs()?;
        let plans: Vec<InstrumentationPlan> = programs
            .iter()
            .enumerate()
            .map(|(i, program)| handlers.instrument_unit(&program_unit(i, program)))
            .collect();
        let steps = Mutex::new(Vec::new());
        let active = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);

        let run = Interpreter {
            handlers: handlers.as_ref(),
            policy,
            programs: &programs,
            plans: &plans,
            executor_reg: regs.0,
            switch_reg: regs.1,
            steps: &steps,
            active: &active,
            peak: &peak,
        };

        thread::scope(|scope| {
            let workers: Vec<_> = (0..programs.len())
                .map(|i| {
                    let run = &run;
                    scope.spawn(move || run.thread(ThreadId::new(i as u32)))
                })
                .collect();
            workers.into_iter().try_for_each(|w| {
                w.join()
                    .map_err(|_| SpinError::InvariantBroken("simulated thread panicked"))
            })
        })?;

        Ok(SimReport {
            steps: steps.into_inner().unwrap_or_else(PoisonError::into_inner),
            peak_runners: peak.load(Ordering::Relaxed),
        })
    }
}

impl Substrate for SimSubstrate {
    type Context = SimContext;

    fn claim_register(&self) -> SpinResult<RegSlot> {
        let mut claimed = self.claimed.lock().unwrap_or_else(PoisonError::into_inner);
        if claimed.len() >= SIM_REGISTERS {
            return Err(SpinError::RegisterExhausted);
        }
        let slot = RegSlot(claimed.len() as u16);
        claimed.push(slot);
        Ok(slot)
    }

    fn attach(&self, handlers: Arc<dyn PointHandlers<SimContext>>) -> SpinResult<()> {
        self.handlers
            .set(handlers)
            .map_err(|_| SpinError::AlreadyInitialized)
    }
}

struct Interpreter<'a> {
    handlers: &'a dyn PointHandlers<SimContext>,
    policy: &'a dyn SwitchPolicy,
    programs: &'a [Vec<Op>],
    plans: &'a [InstrumentationPlan],
    executor_reg: RegSlot,
    switch_reg: RegSlot,
    steps: &'a Mutex<Vec<Step>>,
    active: &'a AtomicUsize,
    peak: &'a AtomicUsize,
}

impl Interpreter<'_> {
    fn op_at(&self, ctx: &SimContext) -> Option<Op> {
        self.programs
            .get(ctx.owner.as_usize())
            .and_then(|p| p.get(ctx.pc))
            .copied()
    }

    /// A switch hook sits before `pc` and has not run yet
    fn hook_due(&self, ctx: &SimContext) -> bool {
        !ctx.hooked
            && self
                .plans
                .get(ctx.owner.as_usize())
                .is_some_and(|plan| plan.switch_hooks.binary_search(&ctx.pc).is_ok())
    }

    /// Body of OS thread `me`; `None` ops stand for the implicit exit call
    fn thread(&self, me: ThreadId) {
        let h = self.handlers;
        let mut ctx = SimContext::new(me);
        h.thread_start(me, &mut ctx);

        loop {
            let op = self.op_at(&ctx);
            let flag = ctx.reg(self.executor_reg);

            match op {
                Some(Op::Compute) if h.should_capture(flag) => {
                    // Arriving counts as this op's switch decision
                    ctx.hooked = true;
                    ctx = h.capture_point(me, &ctx).context;
                }
                Some(_) if !h.should_capture(flag) && self.hook_due(&ctx) => {
                    let next = self.policy.decide(ctx.owner);
                    ctx.set_reg(self.switch_reg, next.to_reg());
                    ctx.hooked = true;
                    if h.needs_switch(next) {
                        ctx = h.switch_point(me, &ctx).context;
                    }
                }
                Some(Op::Compute) => {
                    self.compute(me, &ctx);
                    ctx.advance();
                }
                _ if h.should_guard_syscall(flag) => {
                    ctx = h.syscall_point(me, &ctx).context;
                }
                Some(Op::Syscall(d)) => {
                    thread::sleep(d);
                    ctx.advance();
                }
                None => {
                    h.thread_end(me);
                    kdebug!("sim thread {} exited", me);
                    return;
                }
            }
        }
    }

    fn compute(&self, me: ThreadId, ctx: &SimContext) {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.steps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Step {
                os_thread: me,
                owner: ctx.owner,
                pc: ctx.pc,
            });
        for _ in 0..64 {
            std::hint::spin_loop();
        }
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Arbiter over a fresh, unattached sim substrate with round-robin hooks
#[cfg(test)]
pub(crate) fn test_arbiter(capacity: usize) -> crate::Arbiter<SimContext> {
    test_arbiter_with(capacity, Box::new(RoundRobin::new()))
}

#[cfg(test)]
pub(crate) fn test_arbiter_with(
    capacity: usize,
    hooks: Box<dyn SchedulerHooks<SimContext>>,
) -> crate::Arbiter<SimContext> {
    let config = crate::SpinConfig::new().max_threads(capacity);
    crate::Arbiter::new(&SimSubstrate::new(), hooks, config).unwrap()
}
