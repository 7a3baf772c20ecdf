//! Saved contexts, scheduler register slots and resume instructions
//!
//! The core never touches machine state directly. A substrate snapshots a
//! thread into a value implementing [`ThreadContext`], and the core hands
//! back a [`Resume`] naming the context the calling OS thread must continue
//! from. Two substrate-managed register slots travel with every context:
//!
//! - the *executor* slot: 1 when the context resumes as executor, 0 otherwise
//! - the *switch* slot: the next-thread hint written by switch decisions

use crate::id::ThreadId;

/// Handle to a substrate-managed per-thread register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegSlot(pub u16);

impl RegSlot {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Opaque snapshot of a thread's execution state
///
/// Cloning must produce an independent copy: the arbiter keeps one per
/// thread and hands clones back to the substrate.
pub trait ThreadContext: Clone + Send + 'static {
    /// Read a register slot
    fn reg(&self, slot: RegSlot) -> u64;

    /// Write a register slot
    fn set_reg(&mut self, slot: RegSlot, value: u64);
}

/// How the OS thread continues after a handler returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Continues as the executor, running the current runner's code
    Executor,
    /// Continues uninstrumented from its own context (into a syscall)
    Uncaptured,
}

/// Redirection instruction returned by every handler
///
/// `tid` names the virtual thread whose saved context is being resumed.
/// For an executor this is the current runner, which need not be the OS
/// thread that called the handler.
#[derive(Debug, Clone)]
pub struct Resume<C> {
    pub tid: ThreadId,
    pub role: Role,
    pub context: C,
}
