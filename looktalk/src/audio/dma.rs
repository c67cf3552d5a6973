//! DMA descriptor sizing.
//!
//! The RX and TX rings each hold `descriptor_count` buffers of
//! `frame_len` frames:
//!
//! ```text
//!   ┌──────┬──────┬──────┬──────┐
//!   │ d0   │ d1   │ d2   │ d3   │   one direction, frame_len × bytes_per_frame each
//!   └──────┴──────┴──────┴──────┘
//!      ▲ hardware fills        ▲ software reads
//! ```
//!
//! The ring must never wrap onto a descriptor software is still reading. One
//! read chunk can span several descriptors, one more is being filled by
//! hardware, and one more is kept as a guard, so the count is at least
//! `ceil(read_chunk / descriptor_bytes) + 2` (and never below the hardware
//! floor). Under memory pressure the frame length shrinks before the
//! descriptor count does.

use log::{info, warn};

use crate::constants::{
    DMA_FRAME_LEN_STEP, DMA_MAX_DESCRIPTOR_BYTES, DMA_MIN_DESCRIPTORS, DMA_MIN_FRAME_LEN,
};
use crate::memory::{MemoryError, DMA_DESCRIPTOR_REGION};

/// What the driver asks for before memory pressure is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmaRequest {
    pub descriptor_count: usize,
    pub frame_len: usize,
    pub bytes_per_frame: usize,
    /// Largest single read the capture task issues.
    pub read_chunk_bytes: usize,
}

/// A DMA layout that fits the available interrupt-reachable memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmaPlan {
    descriptor_count: usize,
    frame_len: usize,
    bytes_per_frame: usize,
}

impl DmaPlan {
    pub fn descriptor_count(&self) -> usize {
        self.descriptor_count
    }

    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    pub fn bytes_per_frame(&self) -> usize {
        self.bytes_per_frame
    }

    pub fn descriptor_bytes(&self) -> usize {
        self.frame_len * self.bytes_per_frame
    }

    /// Ring size for one direction.
    pub fn bytes_per_direction(&self) -> usize {
        self.descriptor_count * self.descriptor_bytes()
    }

    /// RX plus TX.
    pub fn total_bytes(&self) -> usize {
        2 * self.bytes_per_direction()
    }

    /// Descriptors needed so a `read_chunk`-byte read never races a wrap.
    pub fn min_descriptors(descriptor_bytes: usize, read_chunk: usize) -> usize {
        (read_chunk.div_ceil(descriptor_bytes) + 2).max(DMA_MIN_DESCRIPTORS)
    }

    /// Whether a read of `read_chunk` bytes is safe against wrap-around.
    pub fn is_wrap_safe(&self, read_chunk: usize) -> bool {
        self.descriptor_count >= Self::min_descriptors(self.descriptor_bytes(), read_chunk)
    }

    /// Size RX and TX rings for `request` within `available` bytes.
    pub fn size(request: DmaRequest, available: usize) -> Result<Self, MemoryError> {
        let bpf = request.bytes_per_frame.max(1);
        let max_frames = DMA_MAX_DESCRIPTOR_BYTES / bpf;
        let mut frame_len = request.frame_len.min(max_frames);
        frame_len -= frame_len % DMA_FRAME_LEN_STEP;
        frame_len = frame_len.max(DMA_MIN_FRAME_LEN);

        loop {
            let descriptor_count = request
                .descriptor_count
                .max(Self::min_descriptors(frame_len * bpf, request.read_chunk_bytes));
            let plan = DmaPlan {
                descriptor_count,
                frame_len,
                bytes_per_frame: bpf,
            };

            if plan.total_bytes() <= available {
                if frame_len < request.frame_len {
                    warn!(
                        target: "audio",
                        "DMA frame length reduced {} -> {} to fit {} bytes",
                        request.frame_len, frame_len, available
                    );
                }
                info!(
                    target: "audio",
                    "DMA plan: {} x {} frames per direction ({} bytes total)",
                    plan.descriptor_count, plan.frame_len, plan.total_bytes()
                );
                return Ok(plan);
            }

            if frame_len <= DMA_MIN_FRAME_LEN {
                return Err(MemoryError::Exhausted {
                    class: DMA_DESCRIPTOR_REGION,
                    requested: plan.total_bytes(),
                    available,
                });
            }
            frame_len = (frame_len - DMA_FRAME_LEN_STEP).max(DMA_MIN_FRAME_LEN);
        }
    }
}
