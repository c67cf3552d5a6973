use alloc::sync::Arc;
use core::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};

use embedded_hal::delay::DelayNs;
use log::{debug, warn};

use super::timed_lock::wait_until;

/// Why a task gave up on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FaultCode {
    /// The driver kept failing reads.
    CaptureStalled = 1,
    /// The network kept rejecting frames.
    StreamFailed = 2,
    /// The driver kept failing writes.
    PlaybackFailed = 3,
}

impl FaultCode {
    fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            1 => Some(FaultCode::CaptureStalled),
            2 => Some(FaultCode::StreamFailed),
            3 => Some(FaultCode::PlaybackFailed),
            _ => None,
        }
    }
}

struct GroupShared {
    cancelled: AtomicBool,
    ending_session: AtomicBool,
    live: AtomicUsize,
    fault: AtomicU8,
}

/// The set of tasks serving one voice session.
///
/// Each task is enlisted to get a [`CancelToken`] it polls and a
/// [`TaskGuard`] it keeps alive for as long as it runs. Dropping the guard is
/// the task's acknowledgement that it has stopped touching shared buffers.
pub struct TaskGroup {
    shared: Arc<GroupShared>,
}

/// Handle a task polls to learn it should stop.
#[derive(Clone)]
pub struct CancelToken {
    shared: Arc<GroupShared>,
}

/// Held by a running task; dropping it marks the task quiescent.
pub struct TaskGuard {
    shared: Arc<GroupShared>,
}

impl TaskGroup {
    pub fn new() -> Self {
        TaskGroup {
            shared: Arc::new(GroupShared {
                cancelled: AtomicBool::new(false),
                ending_session: AtomicBool::new(false),
                live: AtomicUsize::new(0),
                fault: AtomicU8::new(0),
            }),
        }
    }

    /// Register one more task.
    pub fn enlist(&self) -> (CancelToken, TaskGuard) {
        self.shared.live.fetch_add(1, Ordering::AcqRel);
        (
            CancelToken {
                shared: Arc::clone(&self.shared),
            },
            TaskGuard {
                shared: Arc::clone(&self.shared),
            },
        )
    }

    /// Ask every task to stop. `ending_session` tells the streaming task to
    /// send its end-of-stream marker after flushing.
    pub fn cancel(&self, ending_session: bool) {
        self.shared
            .ending_session
            .store(ending_session, Ordering::Release);
        self.shared.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::Acquire)
    }

    /// Tasks that have not yet dropped their guard.
    pub fn live(&self) -> usize {
        self.shared.live.load(Ordering::Acquire)
    }

    /// The first fault any task reported, cleared by this call.
    pub fn take_fault(&self) -> Option<FaultCode> {
        FaultCode::from_u8(self.shared.fault.swap(0, Ordering::AcqRel))
    }

    /// Cancel and wait for every task to acknowledge.
    ///
    /// Returns the number of tasks still running on timeout.
    pub fn quiesce<D: DelayNs>(
        &self,
        ending_session: bool,
        timeout_ms: u32,
        delay: &mut D,
    ) -> Result<(), usize> {
        self.cancel(ending_session);
        if wait_until(timeout_ms, delay, || self.live() == 0) {
            debug!(target: "arbiter", "task group quiesced");
            Ok(())
        } else {
            let remaining = self.live();
            warn!(
                target: "arbiter",
                "{} task(s) still running after {} ms", remaining, timeout_ms
            );
            Err(remaining)
        }
    }
}

impl Default for TaskGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::Acquire)
    }

    /// Whether the cancellation also ends the voice session.
    pub fn session_ending(&self) -> bool {
        self.shared.ending_session.load(Ordering::Acquire)
    }

    /// Record a fault for the arbiter to pick up. The first one wins.
    pub fn report_fault(&self, code: FaultCode) {
        let _ = self
            .shared
            .fault
            .compare_exchange(0, code as u8, Ordering::AcqRel, Ordering::Acquire);
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.shared.live.fetch_sub(1, Ordering::AcqRel);
    }
}
