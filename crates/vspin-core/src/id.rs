//! Virtual thread identifier type

use core::fmt;

use crate::constants::THREAD_NONE;

/// Identifier of a virtual thread
///
/// A small integer handle that indexes into the thread table. The value
/// `u32::MAX` is reserved as the sentinel for "no thread", which is how the
/// executor and current-runner fields express absence.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ThreadId(u32);

impl ThreadId {
    /// Sentinel value indicating no thread
    pub const NONE: ThreadId = ThreadId(THREAD_NONE);

    /// Create a new ThreadId from a raw value
    #[inline]
    pub const fn new(id: u32) -> Self {
        ThreadId(id)
    }

    /// Get the raw u32 value
    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Get as usize for indexing
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Check if this is the NONE sentinel
    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == THREAD_NONE
    }

    /// Check if this names a thread
    #[inline]
    pub const fn is_some(self) -> bool {
        self.0 != THREAD_NONE
    }

    /// Raw register encoding (the sentinel maps to `u64::MAX`)
    #[inline]
    pub const fn to_reg(self) -> u64 {
        if self.is_none() {
            u64::MAX
        } else {
            self.0 as u64
        }
    }

    /// Decode a register value written by a switch decision
    ///
    /// Values that do not fit a `u32` decode to `NONE`, which the switch
    /// handler then rejects as out of range.
    #[inline]
    pub const fn from_reg(raw: u64) -> Self {
        if raw >= THREAD_NONE as u64 {
            ThreadId::NONE
        } else {
            ThreadId(raw as u32)
        }
    }
}

impl From<u32> for ThreadId {
    #[inline]
    fn from(id: u32) -> Self {
        ThreadId(id)
    }
}

impl From<ThreadId> for u32 {
    #[inline]
    fn from(id: ThreadId) -> Self {
        id.0
    }
}

impl fmt::Debug for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "ThreadId(NONE)")
        } else {
            write!(f, "ThreadId({})", self.0)
        }
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "none")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl Default for ThreadId {
    fn default() -> Self {
        ThreadId::NONE
    }
}
