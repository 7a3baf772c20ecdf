//! Per-thread wake slots
//!
//! Every virtual thread owns one binary semaphore. Only its owner ever
//! waits on it, and only the arbiter posts to it, always while holding the
//! arbitration lock and always naming one specific thread. There is no
//! broadcast: a post wakes exactly the thread it was meant for, and a post
//! that lands before the owner waits is kept rather than lost.
//!
//! Slots start out empty ("parked"), so the first `wait` blocks until the
//! first `post`.

/// Directed binary park/unpark signal
pub trait WakePrimitive: Send + Sync {
    /// Block until a permit is available, then consume it
    ///
    /// Callers still re-check arbiter state after waking since the permit
    /// may be stale.
    fn wait(&self);

    /// Make a permit available, waking the owner if it is waiting
    ///
    /// Posting to a slot that already holds a permit is a no-op.
    fn post(&self);
}

// Platform-specific implementations
cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        mod futex_linux;
        pub use futex_linux::FutexWake as WakeSlot;
    } else {
        mod fallback;
        pub use fallback::FallbackWake as WakeSlot;
    }
}

/// Create a platform-appropriate wake slot in the parked state
pub fn new_wake_slot(spins: u32) -> WakeSlot {
    WakeSlot::new(spins)
}
