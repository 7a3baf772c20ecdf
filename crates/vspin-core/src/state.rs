//! Capture state of a virtual thread

use core::fmt;

/// State of a virtual thread as seen by the arbiter
///
/// Transitions:
/// - start: `Uncaptured`
/// - capture point: `Uncaptured -> {Idle, Running}`
/// - switch point: `Idle <-> Running` (or `Running -> Blocked` when a
///   block-after-switch request is armed)
/// - syscall hand-off: `Running -> Uncaptured`
/// - block / unblock: `Idle <-> Blocked`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ThreadState {
    /// Outside our control (in a syscall, or not yet entered). Trips a
    /// capture point when it comes back.
    Uncaptured = 0,

    /// In program code, but excluded from the runnable pool by the scheduler
    Blocked = 1,

    /// Captured and runnable, but not running
    Idle = 2,

    /// The one thread executing target code
    Running = 3,
}

impl ThreadState {
    /// Counted in the captured-thread total
    #[inline]
    pub const fn is_captured(&self) -> bool {
        matches!(self, ThreadState::Idle | ThreadState::Running)
    }

    /// Saved context may be inspected and modified by the scheduler
    #[inline]
    pub const fn context_accessible(&self) -> bool {
        matches!(self, ThreadState::Idle | ThreadState::Blocked)
    }
}

impl From<u8> for ThreadState {
    fn from(v: u8) -> Self {
        match v {
            1 => ThreadState::Blocked,
            2 => ThreadState::Idle,
            3 => ThreadState::Running,
            _ => ThreadState::Uncaptured,
        }
    }
}

impl From<ThreadState> for u8 {
    fn from(state: ThreadState) -> u8 {
        state as u8
    }
}

impl Default for ThreadState {
    fn default() -> Self {
        ThreadState::Uncaptured
    }
}

impl fmt::Display for ThreadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreadState::Uncaptured => write!(f, "UNCAPTURED"),
            ThreadState::Blocked => write!(f, "BLOCKED"),
            ThreadState::Idle => write!(f, "IDLE"),
            ThreadState::Running => write!(f, "RUNNING"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_captured_states() {
        assert!(ThreadState::Idle.is_captured());
        assert!(ThreadState::Running.is_captured());
        assert!(!ThreadState::Blocked.is_captured());
        assert!(!ThreadState::Uncaptured.is_captured());
    }

    #[test]
    fn test_context_accessible() {
        assert!(ThreadState::Idle.context_accessible());
        assert!(ThreadState::Blocked.context_accessible());
        assert!(!ThreadState::Running.context_accessible());
        assert!(!ThreadState::Uncaptured.context_accessible());
    }

    #[test]
    fn test_u8_conversion() {
        for state in [
            ThreadState::Uncaptured,
            ThreadState::Blocked,
            ThreadState::Idle,
            ThreadState::Running,
        ] {
            assert_eq!(ThreadState::from(u8::from(state)), state);
        }
        assert_eq!(ThreadState::from(200), ThreadState::Uncaptured);
    }
}
