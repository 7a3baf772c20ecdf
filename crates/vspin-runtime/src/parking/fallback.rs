//! Fallback wake slot using std::sync::Condvar
//!
//! Used on platforms without futex support. Each slot has its own condvar
//! with a single waiter (the owner), so `notify_one` is directed.

use super::WakePrimitive;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Condvar-based binary semaphore (fallback)
pub struct FallbackWake {
    /// Permit pending
    permit: Mutex<bool>,

    /// Signalled on post
    condvar: Condvar,
}

impl FallbackWake {
    /// Create a parked slot; spinning is not used by the fallback
    pub fn new(_spins: u32) -> Self {
        Self {
            permit: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    fn guard(&self) -> MutexGuard<'_, bool> {
        self.permit.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for FallbackWake {
    fn default() -> Self {
        Self::new(0)
    }
}

impl WakePrimitive for FallbackWake {
    fn wait(&self) {
        let mut guard = self.guard();
        while !*guard {
            guard = self
                .condvar
                .wait(guard)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *guard = false;
    }

    fn post(&self) {
        *self.guard() = true;
        self.condvar.notify_one();
    }
}
