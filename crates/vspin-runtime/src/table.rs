//! Thread state table
//!
//! Fixed-capacity arena indexed by `ThreadId`. Each slot holds the thread's
//! capture state and its saved context. The table is sized once at
//! initialization and never grows; a tid past the end is reported as
//! `CapacityExceeded` rather than indexing out of bounds.

use vspin_core::{ensure, SpinError, SpinResult, ThreadId, ThreadState};

/// One thread's entry
#[derive(Debug, Clone)]
pub struct Slot<C> {
    pub state: ThreadState,
    /// Last snapshot; owned by the arbiter while the thread is not running
    pub context: Option<C>,
}

impl<C> Default for Slot<C> {
    fn default() -> Self {
        Self {
            state: ThreadState::Uncaptured,
            context: None,
        }
    }
}

/// Fixed-capacity per-thread state
pub struct ThreadTable<C> {
    slots: Box<[Slot<C>]>,
}

impl<C> ThreadTable<C> {
    /// Create a table with every slot `Uncaptured`
    pub fn new(capacity: usize) -> Self {
        let slots: Vec<Slot<C>> = (0..capacity).map(|_| Slot::default()).collect();
        Self {
            slots: slots.into_boxed_slice(),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn contains(&self, tid: ThreadId) -> bool {
        tid.is_some() && tid.as_usize() < self.slots.len()
    }

    fn slot(&self, tid: ThreadId) -> SpinResult<&Slot<C>> {
        self.slots.get(tid.as_usize()).ok_or(SpinError::CapacityExceeded {
            tid,
            max: self.slots.len(),
        })
    }

    fn slot_mut(&mut self, tid: ThreadId) -> SpinResult<&mut Slot<C>> {
        let max = self.slots.len();
        self.slots
            .get_mut(tid.as_usize())
            .ok_or(SpinError::CapacityExceeded { tid, max })
    }

    /// Fail with `CapacityExceeded` unless `tid` fits
    pub fn check(&self, tid: ThreadId) -> SpinResult<()> {
        self.slot(tid).map(|_| ())
    }

    pub fn state(&self, tid: ThreadId) -> SpinResult<ThreadState> {
        Ok(self.slot(tid)?.state)
    }

    pub fn set_state(&mut self, tid: ThreadId, state: ThreadState) -> SpinResult<()> {
        self.slot_mut(tid)?.state = state;
        Ok(())
    }

    /// Move `tid` from `from` to `to`; any other current state is a defect
    pub fn transition(
        &mut self,
        tid: ThreadId,
        from: ThreadState,
        to: ThreadState,
    ) -> SpinResult<()> {
        let slot = self.slot_mut(tid)?;
        ensure!(slot.state == from, "unexpected thread state in transition");
        slot.state = to;
        Ok(())
    }

    /// Replace the saved context
    pub fn store(&mut self, tid: ThreadId, context: C) -> SpinResult<()> {
        self.slot_mut(tid)?.context = Some(context);
        Ok(())
    }

    pub fn context_mut(&mut self, tid: ThreadId) -> SpinResult<&mut C> {
        self.slot_mut(tid)?
            .context
            .as_mut()
            .ok_or(SpinError::InvariantBroken("no saved context for thread"))
    }

    /// Number of threads in `{Idle, Running}`
    pub fn count_captured(&self) -> usize {
        self.slots.iter().filter(|s| s.state.is_captured()).count()
    }

    /// Threads currently in `state`
    pub fn in_state(&self, state: ThreadState) -> impl Iterator<Item = ThreadId> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(move |(_, s)| s.state == state)
            .map(|(i, _)| ThreadId::new(i as u32))
    }

    /// State of every slot, indexed by tid
    pub fn states(&self) -> Vec<ThreadState> {
        self.slots.iter().map(|s| s.state).collect()
    }
}
