//! End-to-end arbitration scenarios
//!
//! Each test plays the substrate by hand: it calls the handlers with
//! simulated contexts from real OS threads and inspects the arbiter
//! between steps. Threads that must park are spawned and released by a
//! later hand-off.

use std::collections::VecDeque;
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use vspin_core::{
    Resume, Role, SchedulerHooks, SpinError, ThreadContext, ThreadId, ThreadState, Violation,
};
use vspin_runtime::sim::{Op, RoundRobin, SimContext, SimSubstrate};
use vspin_runtime::{Arbiter, SpinConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Event {
    Start(ThreadId),
    End(ThreadId),
    Capture(ThreadId, bool),
    Uncapture(ThreadId),
}

/// Records every hook call; uncaptures take the next scripted pick
#[derive(Clone, Default)]
struct Recorder {
    events: Arc<Mutex<Vec<Event>>>,
    picks: Arc<Mutex<VecDeque<ThreadId>>>,
}

impl Recorder {
    fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    fn pick(&self, tid: ThreadId) {
        self.picks.lock().unwrap().push_back(tid);
    }
}

impl SchedulerHooks<SimContext> for Recorder {
    fn on_thread_start(&mut self, tid: ThreadId) {
        self.events.lock().unwrap().push(Event::Start(tid));
    }

    fn on_thread_end(&mut self, tid: ThreadId) {
        self.events.lock().unwrap().push(Event::End(tid));
    }

    fn on_capture(&mut self, tid: ThreadId, is_first: bool) {
        self.events.lock().unwrap().push(Event::Capture(tid, is_first));
    }

    fn on_uncapture(&mut self, tid: ThreadId, _context: &mut SimContext) -> ThreadId {
        self.events.lock().unwrap().push(Event::Uncapture(tid));
        self.picks.lock().unwrap().pop_front().unwrap_or(ThreadId::NONE)
    }
}

fn tid(n: u32) -> ThreadId {
    ThreadId::new(n)
}

fn setup(capacity: usize) -> (Arc<Arbiter<SimContext>>, Recorder) {
    let recorder = Recorder::default();
    let config = SpinConfig::new().max_threads(capacity).wake_spins(0);
    let arb = Arbiter::initialize(&SimSubstrate::new(), Box::new(recorder.clone()), config).unwrap();
    (arb, recorder)
}

/// Enter controlled code as `n` from a fresh OS thread (parks until released)
fn spawn_capture(
    arb: &Arc<Arbiter<SimContext>>,
    n: u32,
) -> thread::JoinHandle<Resume<SimContext>> {
    let arb = Arc::clone(arb);
    thread::spawn(move || arb.capture_point(tid(n), &SimContext::new(tid(n))).unwrap())
}

fn wait_captured(arb: &Arbiter<SimContext>, captured: usize) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while arb.snapshot().captured != captured {
        assert!(Instant::now() < deadline, "timed out waiting for {} captured", captured);
        thread::sleep(Duration::from_millis(1));
    }
}

/// Point the executor context at `next`
fn decide(arb: &Arbiter<SimContext>, ctx: &SimContext, next: u32) -> SimContext {
    let mut ctx = ctx.clone();
    ctx.set_reg(arb.switch_reg(), tid(next).to_reg());
    ctx
}

#[test]
fn test_single_thread_enters() {
    let (arb, rec) = setup(4);
    let mut ctx = SimContext::new(tid(0));
    arb.thread_start(tid(0), &mut ctx).unwrap();

    assert!(arb.should_capture(ctx.reg(arb.executor_reg())));
    let resume = arb.capture_point(tid(0), &ctx).unwrap();
    assert_eq!(resume.role, Role::Executor);
    assert_eq!(resume.tid, tid(0));

    let snap = arb.snapshot();
    assert_eq!(snap.state(tid(0)), Some(ThreadState::Running));
    assert_eq!(snap.executor, tid(0));
    assert_eq!(snap.current, tid(0));
    assert_eq!(rec.events(), vec![Event::Start(tid(0)), Event::Capture(tid(0), true)]);
    assert_eq!(arb.stats().snapshot().switches, 0);
    assert!(!arb.needs_switch(tid(0)));
    arb.check_quiescent().unwrap();
}

#[test]
fn test_two_threads_enter_sequentially() {
    let (arb, rec) = setup(4);
    let r0 = arb.capture_point(tid(0), &SimContext::new(tid(0))).unwrap();
    let t1 = spawn_capture(&arb, 1);
    wait_captured(&arb, 2);

    let snap = arb.snapshot();
    assert_eq!(snap.state(tid(0)), Some(ThreadState::Running));
    assert_eq!(snap.state(tid(1)), Some(ThreadState::Idle));
    assert_eq!(snap.executor, tid(0));
    assert_eq!(
        rec.events(),
        vec![Event::Capture(tid(0), true), Event::Capture(tid(1), false)]
    );
    arb.check_quiescent().unwrap();

    // Executor's own syscall hands the role to thread 1
    rec.pick(tid(1));
    let out = arb.syscall_point(tid(0), &r0.context).unwrap();
    assert_eq!(out.role, Role::Uncaptured);
    assert_eq!(out.tid, tid(0));

    let r1 = t1.join().unwrap();
    assert_eq!(r1.role, Role::Executor);
    assert_eq!(r1.tid, tid(1));
    assert_eq!(r1.context.owner, tid(1));

    let snap = arb.snapshot();
    assert_eq!(snap.state(tid(0)), Some(ThreadState::Uncaptured));
    assert_eq!(snap.executor, tid(1));
    assert_eq!(snap.captured, 1);
    arb.check_quiescent().unwrap();
}

#[test]
fn test_switch_to_idle_peer() {
    let (arb, rec) = setup(4);
    let r0 = arb.capture_point(tid(0), &SimContext::new(tid(0))).unwrap();
    let t1 = spawn_capture(&arb, 1);
    wait_captured(&arb, 2);

    let mut ctx0 = r0.context;
    ctx0.pc = 3;
    let ctx0 = decide(&arb, &ctx0, 1);
    assert!(arb.needs_switch(tid(1)));
    let r = arb.switch_point(tid(0), &ctx0).unwrap();
    assert_eq!(r.role, Role::Executor);
    assert_eq!(r.tid, tid(1));
    assert_eq!(r.context.owner, tid(1));
    assert_eq!(r.context.reg(arb.switch_reg()), tid(1).to_reg());

    let snap = arb.snapshot();
    assert_eq!(snap.current, tid(1));
    assert_eq!(snap.executor, tid(0));
    assert_eq!(snap.state(tid(0)), Some(ThreadState::Idle));
    assert_eq!(snap.state(tid(1)), Some(ThreadState::Running));
    assert_eq!(arb.current_hint(), tid(1));
    arb.check_quiescent().unwrap();

    // The saved runner context is parked as a non-executor
    let saved = arb.save_context(tid(0)).unwrap();
    assert_eq!(saved.pc, 3);
    assert_eq!(saved.reg(arb.executor_reg()), 0);
    assert_eq!(saved.reg(arb.switch_reg()), ThreadId::NONE.to_reg());

    // Thread 1's syscall is shipped back to its own OS thread
    rec.pick(tid(0));
    let r = arb.syscall_point(tid(0), &r.context).unwrap();
    assert_eq!(r.role, Role::Executor);
    assert_eq!(r.tid, tid(0));
    assert_eq!(r.context.pc, 3);

    let r1 = t1.join().unwrap();
    assert_eq!(r1.role, Role::Uncaptured);
    assert_eq!(r1.tid, tid(1));
    assert_eq!(r1.context.reg(arb.executor_reg()), 0);

    let stats = arb.stats().snapshot();
    assert_eq!(stats.switches, 1);
    assert_eq!(stats.shipped_syscalls, 1);
    assert_eq!(arb.snapshot().state(tid(1)), Some(ThreadState::Uncaptured));
    arb.check_quiescent().unwrap();
}

#[test]
fn test_delayed_uncapture() {
    let (arb, rec) = setup(4);
    let r0 = arb.capture_point(tid(0), &SimContext::new(tid(0))).unwrap();

    // Sole captured thread enters a syscall and keeps the role
    let out = arb.syscall_point(tid(0), &r0.context).unwrap();
    assert_eq!(out.role, Role::Uncaptured);
    let snap = arb.snapshot();
    assert!(snap.executor_in_syscall);
    assert_eq!(snap.captured, 1);
    assert_eq!(snap.executor, tid(0));

    // A newcomer settles the obligation and takes over
    rec.pick(tid(1));
    let r1 = arb.capture_point(tid(1), &SimContext::new(tid(1))).unwrap();
    assert_eq!(r1.role, Role::Executor);
    assert_eq!(r1.tid, tid(1));
    assert_eq!(
        rec.events(),
        vec![
            Event::Capture(tid(0), true),
            Event::Capture(tid(1), false),
            Event::Uncapture(tid(0)),
        ]
    );
    let snap = arb.snapshot();
    assert!(!snap.executor_in_syscall);
    assert_eq!(snap.state(tid(0)), Some(ThreadState::Uncaptured));
    assert_eq!(snap.executor, tid(1));
    assert_eq!(arb.stats().snapshot().delayed_uncaptures, 1);
    arb.check_quiescent().unwrap();

    // Thread 0 returns from its syscall and waits behind thread 1
    let t0 = spawn_capture(&arb, 0);
    wait_captured(&arb, 2);
    rec.pick(tid(0));
    arb.syscall_point(tid(1), &r1.context).unwrap();
    let r0 = t0.join().unwrap();
    assert_eq!(r0.role, Role::Executor);
    assert_eq!(r0.tid, tid(0));
    arb.check_quiescent().unwrap();
}

#[test]
fn test_block_then_unblock() {
    let (arb, rec) = setup(4);
    let r0 = arb.capture_point(tid(0), &SimContext::new(tid(0))).unwrap();
    let t1 = spawn_capture(&arb, 1);
    wait_captured(&arb, 2);

    arb.block_idle_thread(tid(1)).unwrap();
    let snap = arb.snapshot();
    assert_eq!(snap.state(tid(1)), Some(ThreadState::Blocked));
    assert_eq!(snap.captured, 1);
    assert!(matches!(
        arb.block_idle_thread(tid(1)),
        Err(SpinError::InvalidState { .. })
    ));
    // Blocked threads cannot be switched to
    assert!(arb.switch_point(tid(0), &decide(&arb, &r0.context, 1)).is_err());

    arb.unblock(tid(1)).unwrap();
    let snap = arb.snapshot();
    assert_eq!(snap.state(tid(1)), Some(ThreadState::Idle));
    assert_eq!(snap.captured, 2);
    arb.check_quiescent().unwrap();

    let r = arb.switch_point(tid(0), &decide(&arb, &r0.context, 1)).unwrap();
    assert_eq!(r.tid, tid(1));

    rec.pick(tid(0));
    arb.syscall_point(tid(0), &r.context).unwrap();
    assert_eq!(t1.join().unwrap().role, Role::Uncaptured);
    let stats = arb.stats().snapshot();
    assert_eq!(stats.blocks, 1);
    assert_eq!(stats.unblocks, 1);
}

#[test]
fn test_same_thread_while_armed_fails() {
    let (arb, _rec) = setup(4);
    let r0 = arb.capture_point(tid(0), &SimContext::new(tid(0))).unwrap();
    arb.arm_block_after_switch().unwrap();

    let ctx = decide(&arb, &r0.context, 0);
    assert!(arb.needs_switch(tid(0)));
    assert_eq!(
        arb.switch_point(tid(0), &ctx).unwrap_err(),
        SpinError::ContractViolation(Violation::SameThreadWhileArmed(tid(0)))
    );
}

#[test]
fn test_switch_with_block_consumes_arm() {
    let (arb, rec) = setup(4);
    let r0 = arb.capture_point(tid(0), &SimContext::new(tid(0))).unwrap();
    let t1 = spawn_capture(&arb, 1);
    wait_captured(&arb, 2);

    arb.arm_block_after_switch().unwrap();
    let r = arb.switch_point(tid(0), &decide(&arb, &r0.context, 1)).unwrap();
    assert_eq!(r.tid, tid(1));
    let snap = arb.snapshot();
    assert_eq!(snap.state(tid(0)), Some(ThreadState::Blocked));
    assert_eq!(snap.captured, 1);
    assert!(!snap.block_after_switch);
    arb.check_quiescent().unwrap();

    // Blocked contexts stay accessible and round-trip unchanged
    let saved = arb.save_context(tid(0)).unwrap();
    arb.load_context(tid(0), &saved).unwrap();
    assert_eq!(arb.save_context(tid(0)).unwrap(), saved);
    arb.set_reg(tid(0), arb.switch_reg(), 42).unwrap();
    assert_eq!(arb.reg(tid(0), arb.switch_reg()).unwrap(), 42);

    arb.unblock(tid(0)).unwrap();
    rec.pick(tid(0));
    arb.syscall_point(tid(0), &r.context).unwrap();
    assert_eq!(t1.join().unwrap().role, Role::Uncaptured);
    arb.check_quiescent().unwrap();
}

#[test]
fn test_scheduler_returns_bad_tid() {
    let (arb, rec) = setup(4);
    let r0 = arb.capture_point(tid(0), &SimContext::new(tid(0))).unwrap();
    let t1 = spawn_capture(&arb, 1);
    wait_captured(&arb, 2);

    rec.pick(tid(9));
    assert_eq!(
        arb.syscall_point(tid(0), &r0.context).unwrap_err(),
        SpinError::ContractViolation(Violation::TidOutOfRange { tid: tid(9), max: 4 })
    );

    // Nothing changed: hand over properly to release thread 1
    rec.pick(tid(1));
    arb.syscall_point(tid(0), &r0.context).unwrap();
    assert_eq!(t1.join().unwrap().role, Role::Executor);
}

#[test]
fn test_thread_end_resets_sole_runner() {
    let (arb, rec) = setup(2);
    let mut ctx = SimContext::new(tid(0));
    arb.thread_start(tid(0), &mut ctx).unwrap();
    let r0 = arb.capture_point(tid(0), &ctx).unwrap();
    arb.syscall_point(tid(0), &r0.context).unwrap();
    arb.thread_end(tid(0)).unwrap();

    let snap = arb.snapshot();
    assert_eq!(snap.captured, 0);
    assert!(snap.executor.is_none());
    assert!(snap.current.is_none());
    assert!(!snap.executor_in_syscall);
    assert_eq!(rec.events().last(), Some(&Event::End(tid(0))));
    let stats = arb.stats().snapshot();
    assert_eq!((stats.thread_starts, stats.thread_ends), (1, 1));
    arb.check_quiescent().unwrap();

    // The next arrival is a first capture again
    let r1 = arb.capture_point(tid(1), &SimContext::new(tid(1))).unwrap();
    assert_eq!(r1.tid, tid(1));
    assert_eq!(rec.events().last(), Some(&Event::Capture(tid(1), true)));
}

/// One hand-off race: thread 0 gives the role up by entering a syscall
/// while thread 2 captures. Returns the spurious wakeups it produced.
fn handoff_race() -> u64 {
    let (arb, rec) = setup(3);
    let r0 = arb.capture_point(tid(0), &SimContext::new(tid(0))).unwrap();
    let t1 = spawn_capture(&arb, 1);
    wait_captured(&arb, 2);

    let gate = Arc::new(Barrier::new(2));
    let t2 = {
        let arb = Arc::clone(&arb);
        let gate = Arc::clone(&gate);
        thread::spawn(move || {
            gate.wait();
            arb.capture_point(tid(2), &SimContext::new(tid(2))).unwrap()
        })
    };

    // Thread 0 runs its own syscall with 1 next; 1 is woken to take the
    // role, racing the newcomer
    rec.pick(tid(1));
    gate.wait();
    let out = arb.syscall_point(tid(0), &r0.context).unwrap();
    assert_eq!(out.role, Role::Uncaptured);

    let deadline = Instant::now() + Duration::from_secs(5);
    while !t1.is_finished() && !t2.is_finished() {
        assert!(Instant::now() < deadline, "nobody took the executor role");
        thread::sleep(Duration::from_micros(50));
    }
    let (winner, loser) = if t2.is_finished() { (t2, t1) } else { (t1, t2) };
    let r = winner.join().unwrap();
    assert_eq!(r.role, Role::Executor);
    assert_eq!(r.tid, tid(1));
    let executor = arb.snapshot().executor;
    arb.check_quiescent().unwrap();

    // Thread 1 enters a syscall with 2 next
    wait_captured(&arb, 2);
    rec.pick(tid(2));
    let r = arb.syscall_point(executor, &r.context).unwrap();
    let last = loser.join().unwrap();
    let r2 = if executor == tid(2) {
        // Shipped: 1 re-parked after losing and now runs its syscall
        assert_eq!(last.role, Role::Uncaptured);
        assert_eq!(last.tid, tid(1));
        assert_eq!(r.role, Role::Executor);
        r
    } else {
        assert_eq!(r.role, Role::Uncaptured);
        assert_eq!(last.role, Role::Executor);
        last
    };
    assert_eq!(r2.tid, tid(2));
    assert_eq!(arb.snapshot().state(tid(1)), Some(ThreadState::Uncaptured));

    // Thread 2 exits as the sole runner
    let out = arb.syscall_point(tid(2), &r2.context).unwrap();
    assert_eq!(out.role, Role::Uncaptured);
    arb.thread_end(tid(2)).unwrap();
    arb.check_quiescent().unwrap();
    assert_eq!(arb.snapshot().captured, 0);

    arb.stats().snapshot().spurious_wakeups
}

#[test]
fn test_woken_thread_loses_role_to_newcomer() {
    let mut spurious = 0;
    for _ in 0..500 {
        spurious += handoff_race();
        if spurious > 0 {
            break;
        }
    }
    assert!(spurious > 0, "the newcomer never won the hand-off race");
}

#[test]
fn test_capacity_exceeded() {
    let (arb, _rec) = setup(2);
    let mut ctx = SimContext::new(tid(2));
    assert_eq!(
        arb.thread_start(tid(2), &mut ctx),
        Err(SpinError::CapacityExceeded { tid: tid(2), max: 2 })
    );
}

#[test]
fn test_simulated_round_robin_run() {
    let substrate = SimSubstrate::new();
    let policy = RoundRobin::new();
    let config = SpinConfig::new().max_threads(8);
    let arb = Arbiter::initialize(&substrate, Box::new(policy.clone()), config).unwrap();

    let syscall = Op::Syscall(Duration::from_millis(1));
    let programs = vec![
        vec![Op::Compute, Op::Compute, syscall, Op::Compute],
        vec![Op::Compute, syscall, Op::Compute, Op::Compute],
        vec![Op::Compute; 5],
        vec![syscall, Op::Compute],
    ];
    let report = substrate.run(programs, &policy).unwrap();

    assert_eq!(report.peak_runners, 1);
    assert_eq!(report.steps_of(tid(0)), vec![0, 1, 3]);
    assert_eq!(report.steps_of(tid(1)), vec![0, 2, 3]);
    assert_eq!(report.steps_of(tid(2)), vec![0, 1, 2, 3, 4]);
    assert_eq!(report.steps_of(tid(3)), vec![1]);

    let snap = arb.snapshot();
    assert_eq!(snap.captured, 0);
    assert!(snap.states.iter().all(|s| *s == ThreadState::Uncaptured));
    assert!(policy.queued().is_empty());
    let stats = arb.stats().snapshot();
    assert_eq!(stats.thread_starts, 4);
    assert_eq!(stats.thread_ends, 4);
    assert_eq!(stats.units, 4);
    arb.check_quiescent().unwrap();
}
