//! Region-classed buffer accounting.
//!
//! Two memory regions matter on the target:
//!
//! | Class | Backing | Used for |
//! |-------|---------|----------|
//! | [`InterruptReachable`](MemoryRegionClass::InterruptReachable) | internal SRAM, DMA capable | DMA descriptors, capture scratch |
//! | [`Bulk`](MemoryRegionClass::Bulk) | external PSRAM | capture ring body, stream scratch, playback chunks |
//!
//! A buffer reached from DMA or from an interrupt must come from the
//! interrupt-reachable class. [`RegionBudget`] tracks how much of each class
//! is reserved; every reservation is an owned [`RegionBuffer`] (or, for
//! memory allocated piecemeal, a [`RegionCharge`]) that returns its bytes to
//! the budget when dropped, so a subsystem cannot leak its share.

mod budget;
mod buffer;

pub use budget::{BudgetHealth, RegionBudget, RegionUsage, Watermarks};
pub use buffer::{RegionBuffer, RegionCharge};

use thiserror::Error;

use crate::error::ErrorClass;

/// Which physical region a buffer must live in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryRegionClass {
    InterruptReachable,
    Bulk,
}

// Fixed class assignments.

/// DMA descriptor memory.
pub const DMA_DESCRIPTOR_REGION: MemoryRegionClass = MemoryRegionClass::InterruptReachable;
/// Scratch the capture task reads the driver into.
pub const CAPTURE_SCRATCH_REGION: MemoryRegionClass = MemoryRegionClass::InterruptReachable;
/// Capture ring body.
pub const RING_BODY_REGION: MemoryRegionClass = MemoryRegionClass::Bulk;
/// Scratch the streaming task frames network sends from.
pub const STREAM_SCRATCH_REGION: MemoryRegionClass = MemoryRegionClass::Bulk;
/// Decoded PCM waiting in the playback queue.
pub const PLAYBACK_QUEUE_REGION: MemoryRegionClass = MemoryRegionClass::Bulk;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MemoryError {
    #[error("{class:?} region cannot fit {requested} bytes ({available} available)")]
    Exhausted {
        class: MemoryRegionClass,
        requested: usize,
        available: usize,
    },
}

impl MemoryError {
    pub fn class(&self) -> ErrorClass {
        ErrorClass::AllocationFailure
    }
}
