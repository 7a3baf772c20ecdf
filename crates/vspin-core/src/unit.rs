//! Code units and instrumentation plans
//!
//! The substrate discovers schedulable code units (straight-line runs of
//! operations) and asks the arbiter where to place its guards. The
//! scheduler gets a look at each unit through [`TraceInfo`] and may ask for
//! switch points inside it.

/// Kind of a single operation inside a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    /// Ordinary instruction
    Plain,
    /// Genuine blocking operation (system call)
    Syscall,
}

/// Description of a code unit handed over by the substrate
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitDesc {
    /// Substrate address of the unit entry, for diagnostics
    pub address: u64,
    pub ops: Vec<OpKind>,
}

impl UnitDesc {
    pub fn new(address: u64, ops: Vec<OpKind>) -> Self {
        Self { address, ops }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    #[inline]
    pub fn is_syscall(&self, index: usize) -> bool {
        matches!(self.ops.get(index), Some(OpKind::Syscall))
    }

    /// Indices of every syscall operation
    pub fn syscalls(&self) -> impl Iterator<Item = usize> + '_ {
        self.ops
            .iter()
            .enumerate()
            .filter(|(_, op)| **op == OpKind::Syscall)
            .map(|(i, _)| i)
    }
}

/// Where, relative to an operation, a switch hook runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IPoint {
    Before,
    After,
    TakenBranch,
}

/// A switch point requested by the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchPlacement {
    pub index: usize,
    pub point: IPoint,
}

/// Per-unit view handed to the scheduler's trace callback
#[derive(Debug, Clone, Default)]
pub struct TraceInfo {
    len: usize,
    skip_leading_switch_call: bool,
    switch_points: Vec<SwitchPlacement>,
}

impl TraceInfo {
    pub fn new(unit: &UnitDesc) -> Self {
        Self {
            len: unit.len(),
            skip_leading_switch_call: unit.is_syscall(0),
            switch_points: Vec::new(),
        }
    }

    /// Number of operations in the unit
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The unit starts with a syscall, so a switch hook at op 0 is dropped
    #[inline]
    pub fn skip_leading_switch_call(&self) -> bool {
        self.skip_leading_switch_call
    }

    /// Request a switch point at `index`
    pub fn insert_switch_call(&mut self, index: usize, point: IPoint) {
        self.switch_points.push(SwitchPlacement { index, point });
    }

    pub fn switch_points(&self) -> &[SwitchPlacement] {
        &self.switch_points
    }
}

/// Guard placements the substrate must install for one unit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstrumentationPlan {
    /// Capture guard before op 0
    pub capture_guard: bool,
    /// Syscall guards, one before each listed op
    pub syscall_guards: Vec<usize>,
    /// Switch hooks, one before each listed op
    pub switch_hooks: Vec<usize>,
}
