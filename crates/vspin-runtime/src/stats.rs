//! Arbiter event counters
//!
//! Relaxed atomics bumped on each protocol event. They are diagnostics
//! only; nothing in the protocol reads them.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters owned by the arbiter
#[derive(Debug, Default)]
pub struct Stats {
    thread_starts: AtomicU64,
    thread_ends: AtomicU64,
    captures: AtomicU64,
    uncaptures: AtomicU64,
    switches: AtomicU64,
    shipped_syscalls: AtomicU64,
    delayed_uncaptures: AtomicU64,
    spurious_wakeups: AtomicU64,
    blocks: AtomicU64,
    unblocks: AtomicU64,
    units: AtomicU64,
}

/// Point-in-time copy of [`Stats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub thread_starts: u64,
    pub thread_ends: u64,
    pub captures: u64,
    pub uncaptures: u64,
    pub switches: u64,
    pub shipped_syscalls: u64,
    pub delayed_uncaptures: u64,
    pub spurious_wakeups: u64,
    pub blocks: u64,
    pub unblocks: u64,
    pub units: u64,
}

macro_rules! counter {
    ($($name:ident => $field:ident),* $(,)?) => {
        $(
            #[inline]
            pub(crate) fn $name(&self) {
                self.$field.fetch_add(1, Ordering::Relaxed);
            }
        )*
    };
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    counter! {
        thread_start => thread_starts,
        thread_end => thread_ends,
        capture => captures,
        uncapture => uncaptures,
        switch => switches,
        shipped_syscall => shipped_syscalls,
        delayed_uncapture => delayed_uncaptures,
        spurious_wakeup => spurious_wakeups,
        block => blocks,
        unblock => unblocks,
        unit => units,
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            thread_starts: self.thread_starts.load(Ordering::Relaxed),
            thread_ends: self.thread_ends.load(Ordering::Relaxed),
            captures: self.captures.load(Ordering::Relaxed),
            uncaptures: self.uncaptures.load(Ordering::Relaxed),
            switches: self.switches.load(Ordering::Relaxed),
            shipped_syscalls: self.shipped_syscalls.load(Ordering::Relaxed),
            delayed_uncaptures: self.delayed_uncaptures.load(Ordering::Relaxed),
            spurious_wakeups: self.spurious_wakeups.load(Ordering::Relaxed),
            blocks: self.blocks.load(Ordering::Relaxed),
            unblocks: self.unblocks.load(Ordering::Relaxed),
            units: self.units.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            " threads: {} starts, {} ends",
            self.thread_starts, self.thread_ends
        )?;
        writeln!(f, " units instrumented: {}", self.units)?;
        writeln!(f, " captures: {}, uncaptures: {}", self.captures, self.uncaptures)?;
        writeln!(f, " switches: {}", self.switches)?;
        writeln!(
            f,
            " syscalls: {} shipped, {} delayed uncaptures",
            self.shipped_syscalls, self.delayed_uncaptures
        )?;
        writeln!(f, " blocks: {}, unblocks: {}", self.blocks, self.unblocks)?;
        write!(f, " spurious wakeups: {}", self.spurious_wakeups)
    }
}
