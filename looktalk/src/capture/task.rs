use alloc::sync::Arc;

use embedded_hal::delay::DelayNs;
use log::{debug, error, info, warn};

use crate::audio::{AudioChannel, AudioHal};
use crate::config::StartupConfig;
use crate::constants::{ERROR_BACKOFF_MS, IDLE_POLL_MS, LINK_POLL_MS, MAX_CONSECUTIVE_SEND_ERRORS};
use crate::memory::{
    MemoryError, RegionBudget, RegionBuffer, CAPTURE_SCRATCH_REGION, STREAM_SCRATCH_REGION,
};
use crate::net::{LinkState, NetworkTransport, EOS_MESSAGE};
use crate::sync::{CancelToken, FaultCode};

use super::RingBuffer;

// ── Capture ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CaptureStats {
    pub reads: usize,
    pub bytes_captured: usize,
    pub read_errors: usize,
    /// Captured bytes lost because the ring lock timed out.
    pub bytes_dropped_busy: usize,
    /// Older ring bytes evicted to make room for new capture.
    pub bytes_evicted: usize,
}

/// Reads the microphone into the capture ring.
///
/// Reads go through interrupt-reachable scratch. The task never blocks on
/// the network: if the ring is full, older audio is evicted.
pub struct CaptureTask<H: AudioHal> {
    channel: Arc<AudioChannel<H>>,
    ring: Arc<RingBuffer>,
    scratch: RegionBuffer,
    io_timeout_ms: u32,
    max_consecutive_errors: u32,
    consecutive_errors: u32,
    stats: CaptureStats,
}

impl<H: AudioHal> CaptureTask<H> {
    pub fn new(
        channel: Arc<AudioChannel<H>>,
        ring: Arc<RingBuffer>,
        budget: &Arc<RegionBudget>,
        cfg: &StartupConfig,
    ) -> Result<Self, MemoryError> {
        let scratch = budget.reserve(CAPTURE_SCRATCH_REGION, cfg.capture_chunk_bytes)?;
        Ok(CaptureTask {
            channel,
            ring,
            scratch,
            io_timeout_ms: cfg.audio_io_timeout_ms,
            max_consecutive_errors: cfg.max_consecutive_read_errors.max(1),
            consecutive_errors: 0,
            stats: CaptureStats::default(),
        })
    }

    /// One read-and-store cycle. Returns the bytes captured, or the fault
    /// to report once reads have failed too many times in a row.
    pub fn step<D: DelayNs>(&mut self, delay: &mut D) -> Result<usize, FaultCode> {
        match self.channel.read(&mut self.scratch, self.io_timeout_ms, delay) {
            Ok(0) => {
                self.consecutive_errors = 0;
                delay.delay_ms(IDLE_POLL_MS);
                Ok(0)
            }
            Ok(n) => {
                self.consecutive_errors = 0;
                self.stats.reads += 1;
                self.stats.bytes_captured += n;
                match self.ring.write(&self.scratch[..n], delay) {
                    Ok(outcome) => self.stats.bytes_evicted += outcome.evicted,
                    Err(e) => {
                        self.stats.bytes_dropped_busy += n;
                        warn!(target: "capture", "{} captured bytes dropped: {}", n, e);
                    }
                }
                Ok(n)
            }
            Err(e) => {
                self.stats.read_errors += 1;
                self.consecutive_errors += 1;
                if self.consecutive_errors >= self.max_consecutive_errors {
                    error!(
                        target: "capture",
                        "{} consecutive read failures, last: {}", self.consecutive_errors, e
                    );
                    return Err(FaultCode::CaptureStalled);
                }
                warn!(target: "capture", "read failed: {}", e);
                delay.delay_ms(ERROR_BACKOFF_MS);
                Ok(0)
            }
        }
    }

    /// Capture until cancelled or stalled.
    pub fn run<D: DelayNs>(mut self, token: CancelToken, mut delay: D) -> CaptureStats {
        info!(target: "capture", "capture task started");
        while !token.is_cancelled() {
            if let Err(code) = self.step(&mut delay) {
                token.report_fault(code);
                break;
            }
        }
        info!(
            target: "capture",
            "capture task stopped: {} bytes in {} reads", self.stats.bytes_captured, self.stats.reads
        );
        self.stats
    }

    pub fn stats(&self) -> CaptureStats {
        self.stats
    }
}

// ── Streaming ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamStats {
    pub frames_sent: usize,
    pub bytes_sent: usize,
    pub send_errors: usize,
    /// Bytes taken from the ring but rejected by the network.
    pub bytes_lost: usize,
    pub eos_sent: bool,
}

/// Drains the capture ring into fixed-size binary frames.
///
/// Waits for the link before sending anything. On cancel it flushes what
/// is left in the ring, then sends the end-of-stream marker if the session
/// is ending rather than pausing.
pub struct StreamTask<N: NetworkTransport> {
    ring: Arc<RingBuffer>,
    net: Arc<N>,
    link: LinkState,
    scratch: RegionBuffer,
    chunk_bytes: usize,
    consecutive_errors: u32,
    stats: StreamStats,
}

impl<N: NetworkTransport> StreamTask<N> {
    pub fn new(
        ring: Arc<RingBuffer>,
        net: Arc<N>,
        link: LinkState,
        budget: &Arc<RegionBudget>,
        cfg: &StartupConfig,
    ) -> Result<Self, MemoryError> {
        let scratch = budget.reserve(STREAM_SCRATCH_REGION, cfg.stream_chunk_bytes)?;
        Ok(StreamTask {
            ring,
            net,
            link,
            scratch,
            chunk_bytes: cfg.stream_chunk_bytes,
            consecutive_errors: 0,
            stats: StreamStats::default(),
        })
    }

    fn link_ready(&self) -> bool {
        self.link.is_up() && self.net.is_connected()
    }

    /// Send one full frame if the link is up and a frame's worth is buffered.
    pub fn step<D: DelayNs>(&mut self, delay: &mut D) -> Result<usize, FaultCode> {
        if !self.link_ready() {
            delay.delay_ms(LINK_POLL_MS);
            return Ok(0);
        }
        if self.ring.occupancy() < self.chunk_bytes {
            delay.delay_ms(IDLE_POLL_MS);
            return Ok(0);
        }
        self.send_frame(delay)
    }

    fn send_frame<D: DelayNs>(&mut self, delay: &mut D) -> Result<usize, FaultCode> {
        let n = match self.ring.read(&mut self.scratch[..self.chunk_bytes], delay) {
            Ok(n) => n,
            Err(e) => {
                debug!(target: "capture", "stream read skipped: {}", e);
                return Ok(0);
            }
        };
        if n == 0 {
            return Ok(0);
        }
        match self.net.send_binary(&self.scratch[..n]) {
            Ok(()) => {
                self.consecutive_errors = 0;
                self.stats.frames_sent += 1;
                self.stats.bytes_sent += n;
                Ok(n)
            }
            Err(e) => {
                self.stats.send_errors += 1;
                self.stats.bytes_lost += n;
                self.consecutive_errors += 1;
                if self.consecutive_errors >= MAX_CONSECUTIVE_SEND_ERRORS {
                    error!(
                        target: "capture",
                        "{} consecutive send failures, last: {:?}", self.consecutive_errors, e
                    );
                    return Err(FaultCode::StreamFailed);
                }
                warn!(target: "capture", "send of {} bytes failed: {:?}", n, e);
                delay.delay_ms(ERROR_BACKOFF_MS);
                Ok(0)
            }
        }
    }

    /// Send whatever remains in the ring, including a short final frame.
    pub fn flush<D: DelayNs>(&mut self, delay: &mut D) -> usize {
        let mut flushed = 0;
        while self.ring.occupancy() > 0 {
            if !self.link_ready() {
                warn!(
                    target: "capture",
                    "link down, {} buffered bytes not flushed", self.ring.occupancy()
                );
                break;
            }
            let errors_before = self.stats.send_errors;
            match self.send_frame(delay) {
                Ok(n) if n > 0 => flushed += n,
                _ => {
                    if self.stats.send_errors > errors_before {
                        break;
                    }
                }
            }
        }
        flushed
    }

    /// Tell the server no more audio follows.
    pub fn finish(&mut self) {
        if !self.link_ready() {
            warn!(target: "capture", "link down, end-of-stream not sent");
            return;
        }
        match self.net.send_text(EOS_MESSAGE) {
            Ok(()) => {
                self.stats.eos_sent = true;
                info!(target: "capture", "end-of-stream sent");
            }
            Err(e) => warn!(target: "capture", "end-of-stream send failed: {:?}", e),
        }
    }

    /// Stream until cancelled, then flush and optionally end the stream.
    pub fn run<D: DelayNs>(mut self, token: CancelToken, mut delay: D) -> StreamStats {
        info!(target: "capture", "stream task started");
        while !token.is_cancelled() {
            if let Err(code) = self.step(&mut delay) {
                token.report_fault(code);
                break;
            }
        }
        let flushed = self.flush(&mut delay);
        if flushed > 0 {
            debug!(target: "capture", "flushed {} bytes on stop", flushed);
        }
        if token.session_ending() {
            self.finish();
        }
        info!(
            target: "capture",
            "stream task stopped: {} bytes in {} frames", self.stats.bytes_sent, self.stats.frames_sent
        );
        self.stats
    }

    pub fn stats(&self) -> StreamStats {
        self.stats
    }
}
