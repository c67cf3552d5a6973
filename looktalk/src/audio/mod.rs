//! Full-duplex audio channel.
//!
//! | Item | Purpose |
//! |------|---------|
//! | [`AudioHal`] | Board I2S driver the channel wraps |
//! | [`DmaPlan`] | Descriptor sizing under memory pressure |
//! | [`AudioChannel`] | Lock-guarded read/write shared by capture and playback |

mod channel;
mod dma;
mod hal;

pub use channel::{AudioChannel, BufferLevel, ChannelConfig, ChannelStats};
pub use dma::{DmaPlan, DmaRequest};
pub use hal::AudioHal;

use thiserror::Error;

use crate::error::ErrorClass;
use crate::memory::MemoryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DriverError {
    #[error("audio channel not initialized")]
    NotInitialized,
    #[error("audio channel busy, write dropped")]
    Busy,
    #[error("DMA allocation failed: {0}")]
    Allocation(#[from] MemoryError),
    #[error("I2S not ready within {timeout_ms} ms")]
    InitTimeout { timeout_ms: u32 },
    #[error("I2S {op} failed")]
    Hal { op: &'static str },
    #[error("I2S deinit incomplete")]
    DeinitFailed,
    #[error("unsupported output rate {0} Hz")]
    UnsupportedRate(u32),
}

impl DriverError {
    pub fn class(&self) -> ErrorClass {
        match self {
            DriverError::Busy => ErrorClass::HardwareBusy,
            DriverError::Allocation(_) => ErrorClass::AllocationFailure,
            DriverError::UnsupportedRate(_) => ErrorClass::ProtocolError,
            DriverError::NotInitialized
            | DriverError::InitTimeout { .. }
            | DriverError::Hal { .. }
            | DriverError::DeinitFailed => ErrorClass::TransitionFailure,
        }
    }
}
