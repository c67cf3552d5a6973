use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, Ordering};

use embedded_hal::delay::DelayNs;

use crate::constants::POLL_INTERVAL_US;

/// Number of poll ticks that cover `timeout_ms`.
pub(crate) fn poll_ticks(timeout_ms: u32) -> u32 {
    let us = u64::from(timeout_ms) * 1000;
    us.div_ceil(u64::from(POLL_INTERVAL_US)) as u32
}

/// Poll `ready` every tick until it returns true or `timeout_ms` elapses.
///
/// Checks once before the first delay, so a zero timeout is a single probe.
pub(crate) fn wait_until<D, F>(timeout_ms: u32, delay: &mut D, mut ready: F) -> bool
where
    D: DelayNs,
    F: FnMut() -> bool,
{
    if ready() {
        return true;
    }
    for _ in 0..poll_ticks(timeout_ms) {
        delay.delay_us(POLL_INTERVAL_US);
        if ready() {
            return true;
        }
    }
    false
}

/// Mutual exclusion with bounded waits.
///
/// A spin flag guarding an `UnsafeCell`. Waiting is done by polling through
/// a caller-supplied [`DelayNs`], so on an RTOS the delay yields the core
/// and in tests it can be a no-op or a real sleep.
pub struct TimedLock<T> {
    locked: AtomicBool,
    value: UnsafeCell<T>,
}

// SAFETY: access to `value` only happens through a `TimedGuard`, and at most
// one guard exists at a time (the `locked` flag is taken with Acquire and
// released with Release), so `T: Send` is enough to share the lock.
unsafe impl<T: Send> Sync for TimedLock<T> {}
unsafe impl<T: Send> Send for TimedLock<T> {}

impl<T> TimedLock<T> {
    pub const fn new(value: T) -> Self {
        TimedLock {
            locked: AtomicBool::new(false),
            value: UnsafeCell::new(value),
        }
    }

    /// Take the lock if it is free right now.
    pub fn try_lock(&self) -> Option<TimedGuard<'_, T>> {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| TimedGuard { lock: self })
    }

    /// Take the lock, waiting at most `timeout_ms`.
    pub fn try_lock_for<D: DelayNs>(
        &self,
        timeout_ms: u32,
        delay: &mut D,
    ) -> Option<TimedGuard<'_, T>> {
        if let Some(guard) = self.try_lock() {
            return Some(guard);
        }
        for _ in 0..poll_ticks(timeout_ms) {
            delay.delay_us(POLL_INTERVAL_US);
            if let Some(guard) = self.try_lock() {
                return Some(guard);
            }
        }
        None
    }

    /// Take the lock, yielding through `delay` for as long as it takes.
    pub fn lock_yielding<D: DelayNs>(&self, delay: &mut D) -> TimedGuard<'_, T> {
        loop {
            if let Some(guard) = self.try_lock() {
                return guard;
            }
            delay.delay_us(POLL_INTERVAL_US);
        }
    }

    /// Take the lock by spinning. Only for short critical sections.
    pub fn lock(&self) -> TimedGuard<'_, T> {
        loop {
            if let Some(guard) = self.try_lock() {
                return guard;
            }
            core::hint::spin_loop();
        }
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.value.get_mut()
    }
}

/// Exclusive access to a [`TimedLock`]'s value; unlocks on drop.
pub struct TimedGuard<'a, T> {
    lock: &'a TimedLock<T>,
}

impl<T> Deref for TimedGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the guard exists only while `locked` is held by us.
        unsafe { &*self.lock.value.get() }
    }
}

impl<T> DerefMut for TimedGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the guard exists only while `locked` is held by us.
        unsafe { &mut *self.lock.value.get() }
    }
}

impl<T> Drop for TimedGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
    }
}
