//! Arbitration lock
//!
//! Guards all shared scheduling metadata. Critical sections are short (a
//! few table updates plus a scheduler callback), so waiters spin first and
//! fall back to `yield_now` once their spin budget runs out.

use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, Ordering};

/// Spin rounds before a waiter starts yielding
pub const DEFAULT_SPIN_LIMIT: u32 = 1000;

/// Spin-then-yield mutual exclusion lock
pub struct SpinLock<T> {
    locked: AtomicBool,
    spin_limit: u32,
    data: UnsafeCell<T>,
}

// Safety: SpinLock provides exclusive access to T
unsafe impl<T: Send> Send for SpinLock<T> {}
unsafe impl<T: Send> Sync for SpinLock<T> {}

impl<T> SpinLock<T> {
    /// Create a new lock containing the given value
    #[inline]
    pub const fn new(value: T) -> Self {
        Self::with_spin_limit(value, DEFAULT_SPIN_LIMIT)
    }

    /// Create a lock that yields after `spin_limit` failed rounds
    #[inline]
    pub const fn with_spin_limit(value: T, spin_limit: u32) -> Self {
        SpinLock {
            locked: AtomicBool::new(false),
            spin_limit,
            data: UnsafeCell::new(value),
        }
    }

    /// Acquire the lock
    #[inline]
    pub fn lock(&self) -> SpinLockGuard<'_, T> {
        let mut rounds = 0u32;
        loop {
            if self
                .locked
                .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                return SpinLockGuard { lock: self };
            }

            while self.locked.load(Ordering::Relaxed) {
                if rounds < self.spin_limit {
                    rounds += 1;
                    core::hint::spin_loop();
                } else {
                    std::thread::yield_now();
                }
            }
        }
    }

    /// Try to acquire the lock without waiting
    #[inline]
    pub fn try_lock(&self) -> Option<SpinLockGuard<'_, T>> {
        if self
            .locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            Some(SpinLockGuard { lock: self })
        } else {
            None
        }
    }

    /// Check if the lock is currently held
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }

    /// Exclusive access through `&mut self`; no locking needed
    #[inline]
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }
}

impl<T: Default> Default for SpinLock<T> {
    fn default() -> Self {
        SpinLock::new(T::default())
    }
}

/// Guard that releases the lock when dropped
pub struct SpinLockGuard<'a, T> {
    lock: &'a SpinLock<T>,
}

impl<'a, T> Deref for SpinLockGuard<'a, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // Safety: We hold the lock
        unsafe { &*self.lock.data.get() }
    }
}

impl<'a, T> DerefMut for SpinLockGuard<'a, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        // Safety: We hold the lock
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<'a, T> Drop for SpinLockGuard<'a, T> {
    #[inline]
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
    }
}
