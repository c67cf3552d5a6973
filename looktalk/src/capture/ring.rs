use alloc::sync::Arc;
use core::sync::atomic::{AtomicUsize, Ordering};

use embedded_hal::delay::DelayNs;
use log::warn;

use crate::memory::{MemoryError, RegionBudget, RegionBuffer, RING_BODY_REGION};
use crate::sync::TimedLock;

use super::RingError;

/// Result of a [`RingBuffer::write`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteOutcome {
    /// Bytes now stored from this write.
    pub written: usize,
    /// Bytes lost to make room: older data evicted plus any prefix of an
    /// oversized write.
    pub evicted: usize,
}

/// Counters kept by a [`RingBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RingStats {
    pub bytes_written: usize,
    pub bytes_read: usize,
    pub bytes_dropped: usize,
    pub overflow_events: usize,
    pub lock_timeouts: usize,
    pub peak_occupancy: usize,
}

struct RingState {
    body: RegionBuffer,
    write_pos: usize,
    read_pos: usize,
    len: usize,
}

impl RingState {
    fn copy_in(&mut self, src: &[u8]) {
        let cap = self.body.len();
        let first = src.len().min(cap - self.write_pos);
        self.body[self.write_pos..self.write_pos + first].copy_from_slice(&src[..first]);
        self.body[..src.len() - first].copy_from_slice(&src[first..]);
        self.write_pos = (self.write_pos + src.len()) % cap;
        self.len += src.len();
    }

    fn copy_out(&mut self, dst: &mut [u8]) {
        let cap = self.body.len();
        let first = dst.len().min(cap - self.read_pos);
        let rest = dst.len() - first;
        dst[..first].copy_from_slice(&self.body[self.read_pos..self.read_pos + first]);
        dst[first..].copy_from_slice(&self.body[..rest]);
        self.read_pos = (self.read_pos + dst.len()) % cap;
        self.len -= dst.len();
    }
}

/// Byte FIFO between the capture task (producer) and the streaming task
/// (consumer).
///
/// Both sides take the same lock with a bounded wait and get
/// [`RingError::Busy`] on timeout. When a write does not fit, the oldest
/// bytes are evicted: live audio is worth more than stale audio. Every byte
/// that is not evicted comes out exactly once, in order.
pub struct RingBuffer {
    state: TimedLock<RingState>,
    capacity: usize,
    lock_timeout_ms: u32,
    occupancy: AtomicUsize,
    bytes_written: AtomicUsize,
    bytes_read: AtomicUsize,
    bytes_dropped: AtomicUsize,
    overflow_events: AtomicUsize,
    lock_timeouts: AtomicUsize,
    peak_occupancy: AtomicUsize,
}

impl RingBuffer {
    /// Reserve a `capacity`-byte body from the bulk region.
    pub fn new(
        budget: &Arc<RegionBudget>,
        capacity: usize,
        lock_timeout_ms: u32,
    ) -> Result<Self, MemoryError> {
        let body = budget.reserve(RING_BODY_REGION, capacity)?;
        Ok(RingBuffer {
            state: TimedLock::new(RingState {
                body,
                write_pos: 0,
                read_pos: 0,
                len: 0,
            }),
            capacity,
            lock_timeout_ms,
            occupancy: AtomicUsize::new(0),
            bytes_written: AtomicUsize::new(0),
            bytes_read: AtomicUsize::new(0),
            bytes_dropped: AtomicUsize::new(0),
            overflow_events: AtomicUsize::new(0),
            lock_timeouts: AtomicUsize::new(0),
            peak_occupancy: AtomicUsize::new(0),
        })
    }

    /// Append `data`, evicting the oldest bytes if it does not fit.
    pub fn write<D: DelayNs>(&self, data: &[u8], delay: &mut D) -> Result<WriteOutcome, RingError> {
        if data.is_empty() {
            return Ok(WriteOutcome::default());
        }
        let mut st = self.acquire(delay)?;

        let skipped = data.len().saturating_sub(self.capacity);
        let src = &data[skipped..];
        let free = self.capacity - st.len;
        let evict = src.len().saturating_sub(free);
        if evict > 0 {
            st.read_pos = (st.read_pos + evict) % self.capacity;
            st.len -= evict;
        }
        st.copy_in(src);
        let len = st.len;
        drop(st);

        self.occupancy.store(len, Ordering::Release);
        self.peak_occupancy.fetch_max(len, Ordering::Relaxed);
        self.bytes_written.fetch_add(src.len(), Ordering::Relaxed);

        let dropped = evict + skipped;
        if dropped > 0 {
            self.overflow_events.fetch_add(1, Ordering::Relaxed);
            self.bytes_dropped.fetch_add(dropped, Ordering::Relaxed);
            warn!(target: "capture", "{}", RingError::Overflow { dropped });
        }
        Ok(WriteOutcome {
            written: src.len(),
            evicted: dropped,
        })
    }

    /// Move up to `out.len()` of the oldest bytes into `out`.
    pub fn read<D: DelayNs>(&self, out: &mut [u8], delay: &mut D) -> Result<usize, RingError> {
        if out.is_empty() {
            return Ok(0);
        }
        let mut st = self.acquire(delay)?;
        let n = out.len().min(st.len);
        st.copy_out(&mut out[..n]);
        let len = st.len;
        drop(st);

        self.occupancy.store(len, Ordering::Release);
        self.bytes_read.fetch_add(n, Ordering::Relaxed);
        Ok(n)
    }

    /// Drop everything buffered.
    pub fn clear<D: DelayNs>(&self, delay: &mut D) -> Result<(), RingError> {
        let mut st = self.acquire(delay)?;
        st.read_pos = 0;
        st.write_pos = 0;
        st.len = 0;
        self.occupancy.store(0, Ordering::Release);
        Ok(())
    }

    /// Bytes buffered as of the last completed read or write.
    pub fn occupancy(&self) -> usize {
        self.occupancy.load(Ordering::Acquire)
    }

    pub fn free_space(&self) -> usize {
        self.capacity - self.occupancy()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> RingStats {
        RingStats {
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            bytes_dropped: self.bytes_dropped.load(Ordering::Relaxed),
            overflow_events: self.overflow_events.load(Ordering::Relaxed),
            lock_timeouts: self.lock_timeouts.load(Ordering::Relaxed),
            peak_occupancy: self.peak_occupancy.load(Ordering::Relaxed),
        }
    }

    fn acquire<D: DelayNs>(
        &self,
        delay: &mut D,
    ) -> Result<crate::sync::TimedGuard<'_, RingState>, RingError> {
        match self.state.try_lock_for(self.lock_timeout_ms, delay) {
            Some(guard) => Ok(guard),
            None => {
                self.lock_timeouts.fetch_add(1, Ordering::Relaxed);
                warn!(target: "capture", "ring lock not acquired within {} ms", self.lock_timeout_ms);
                Err(RingError::Busy)
            }
        }
    }
}
