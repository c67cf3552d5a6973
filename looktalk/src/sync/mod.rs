//! Synchronization primitives with bounded waits.
//!
//! - [`TimedLock`]: mutual exclusion whose acquisition can time out.
//! - [`PeripheralMutex`]: the single lock that serializes every camera or
//!   audio driver init/deinit.
//! - [`TaskGroup`] / [`CancelToken`] / [`TaskGuard`]: cooperative stop and
//!   quiescence acknowledgement for the voice tasks.

mod cancel;
mod timed_lock;

pub use cancel::{CancelToken, FaultCode, TaskGroup, TaskGuard};
pub use timed_lock::{TimedGuard, TimedLock};
pub(crate) use timed_lock::wait_until;

use embedded_hal::delay::DelayNs;
use log::warn;

/// The lock every peripheral init/deinit must hold.
///
/// Its lifetime equals the arbiter's; nothing else creates one.
pub struct PeripheralMutex {
    lock: TimedLock<()>,
}

/// Proof of holding the [`PeripheralMutex`]. Released on drop.
pub struct PeripheralLease<'a> {
    _guard: TimedGuard<'a, ()>,
}

impl PeripheralMutex {
    pub const fn new() -> Self {
        PeripheralMutex {
            lock: TimedLock::new(()),
        }
    }

    /// Acquire within `timeout_ms`, or `None` if another holder kept it.
    pub fn acquire<D: DelayNs>(&self, timeout_ms: u32, delay: &mut D) -> Option<PeripheralLease<'_>> {
        match self.lock.try_lock_for(timeout_ms, delay) {
            Some(guard) => Some(PeripheralLease { _guard: guard }),
            None => {
                warn!(target: "arbiter", "peripheral mutex not acquired within {} ms", timeout_ms);
                None
            }
        }
    }

    pub fn try_acquire(&self) -> Option<PeripheralLease<'_>> {
        self.lock
            .try_lock()
            .map(|guard| PeripheralLease { _guard: guard })
    }

    pub fn is_held(&self) -> bool {
        self.lock.is_locked()
    }
}

impl Default for PeripheralMutex {
    fn default() -> Self {
        Self::new()
    }
}
