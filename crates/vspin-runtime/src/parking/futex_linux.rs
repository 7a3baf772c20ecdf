//! Linux futex-based wake slot
//!
//! Futex word semantics:
//! - 0 = no permit (owner sleeps on it)
//! - 1 = permit pending
//!
//! The owner consumes a permit with a 1 -> 0 CAS. It polls a few times
//! before sleeping in FUTEX_WAIT, which returns immediately if the word is
//! no longer 0. Posting stores 1 then issues FUTEX_WAKE for one waiter.

use super::WakePrimitive;
use std::sync::atomic::{AtomicU32, Ordering};

/// Linux futex-based binary semaphore
pub struct FutexWake {
    /// Futex word: 0 = parked, 1 = permit pending
    word: AtomicU32,

    /// Polls before sleeping in the kernel
    spins: u32,
}

impl FutexWake {
    /// Create a parked slot
    pub fn new(spins: u32) -> Self {
        Self {
            word: AtomicU32::new(0),
            spins,
        }
    }

    #[inline]
    fn try_take(&self) -> bool {
        self.word
            .compare_exchange(1, 0, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    fn poll(&self) -> bool {
        for _ in 0..self.spins {
            if self.try_take() {
                return true;
            }
            core::hint::spin_loop();
        }
        self.try_take()
    }

    /// FUTEX_WAIT while the word is 0; any return is re-checked by the caller
    fn futex_wait(&self) {
        // Result ignored: woken, EAGAIN (word changed) and EINTR all lead
        // back to a CAS attempt.
        unsafe {
            libc::syscall(
                libc::SYS_futex,
                self.word.as_ptr(),
                libc::FUTEX_WAIT | libc::FUTEX_PRIVATE_FLAG,
                0u32,
                std::ptr::null::<libc::timespec>(),
                std::ptr::null::<u32>(),
                0u32,
            );
        }
    }

    fn futex_wake(&self) {
        unsafe {
            libc::syscall(
                libc::SYS_futex,
                self.word.as_ptr(),
                libc::FUTEX_WAKE | libc::FUTEX_PRIVATE_FLAG,
                1i32,
                std::ptr::null::<libc::timespec>(),
                std::ptr::null::<u32>(),
                0u32,
            );
        }
    }
}

impl Default for FutexWake {
    fn default() -> Self {
        Self::new(0)
    }
}

impl WakePrimitive for FutexWake {
    fn wait(&self) {
        loop {
            if self.poll() {
                return;
            }
            self.futex_wait();
        }
    }

    fn post(&self) {
        self.word.store(1, Ordering::Release);
        self.futex_wake();
    }
}
