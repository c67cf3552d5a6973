//! Microphone capture and upstream streaming.
//!
//! ```text
//!   AudioChannel::read ──► CaptureTask ──► RingBuffer ──► StreamTask ──► NetworkTransport
//!        (IR scratch)                    (bulk body)     (bulk scratch)
//! ```
//!
//! The capture task never waits on the network; the ring absorbs jitter and
//! sheds its oldest bytes when the link falls behind.

mod ring;
mod task;

pub use ring::{RingBuffer, RingStats, WriteOutcome};
pub use task::{CaptureStats, CaptureTask, StreamStats, StreamTask};

use thiserror::Error;

use crate::error::ErrorClass;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RingError {
    #[error("ring buffer lock timed out")]
    Busy,
    #[error("ring buffer full, {dropped} oldest bytes dropped")]
    Overflow { dropped: usize },
}

impl RingError {
    pub fn class(&self) -> ErrorClass {
        match self {
            RingError::Busy => ErrorClass::HardwareBusy,
            RingError::Overflow { .. } => ErrorClass::OverflowCondition,
        }
    }
}
