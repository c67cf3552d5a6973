//! Resource arbitration between the camera and the audio channel.
//!
//! The camera and the I2S audio channel share DMA channels, clocks and
//! pins. [`ResourceArbiter`] is the only thing allowed to bring either one
//! up or down, always while holding the peripheral mutex, so the two are
//! never initialized at the same time.
//!
//! ```text
//!                 start            Single                 Single
//!   Init ─────────────► CameraStandby ───────► VoiceActive ───────► CameraStandby
//!     │                   │    ▲  Double         │    ▲  Double
//!     │                   └────┘ (capture)       └────┘ (pause, capture, resume)
//!     │
//!     └─ any failure ──► Error ──Tick──► CameraStandby   (or Shutdown after repeated failures)
//!                              LongPress from anywhere ──► Shutdown
//! ```
//!
//! Every swap goes through `Transitioning`, follows the order
//! *stop tasks → release old peripheral → settle → init new peripheral →
//! start tasks*, and rolls back to the previous peripheral when the new one
//! fails to come up.

mod context;
mod events;
mod fsm;
mod platform;
mod session;
mod state;


pub use context::ArbiterContext;
pub use events::{ButtonEvent, Event, Indicator, StatusIndicator};
pub use fsm::ResourceArbiter;
pub use platform::{
    CameraDriver, Collaborators, Core, Platform, TaskSpawner, TaskSpec, CAPTURE_TASK,
    PLAYBACK_TASK, STREAM_TASK,
};
pub use session::{playback_footprint, VoiceSession};
pub use state::{Peripheral, PeripheralLedger, StateHandle, SystemState};

use thiserror::Error;

use crate::error::ErrorClass;
use crate::memory::MemoryError;
use crate::sync::FaultCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("peripheral mutex not acquired within {timeout_ms} ms")]
    MutexTimeout { timeout_ms: u32 },
    #[error("{remaining} voice task(s) still running after {timeout_ms} ms")]
    QuiesceTimeout { timeout_ms: u32, remaining: usize },
    #[error("{peripheral} init failed (previous peripheral restored: {rolled_back})")]
    InitFailed {
        peripheral: Peripheral,
        rolled_back: bool,
    },
    #[error("{peripheral} init timed out")]
    InitTimeout { peripheral: Peripheral },
    #[error("{peripheral} deinit failed after {attempts} attempt(s)")]
    DeinitFailed { peripheral: Peripheral, attempts: u8 },
    #[error("{requested} init refused while {active} is initialized")]
    Overlap {
        requested: Peripheral,
        active: Peripheral,
    },
    #[error("voice session allocation failed: {0}")]
    Allocation(#[from] MemoryError),
    #[error("could not start the {task} task")]
    Spawn { task: &'static str },
    #[error("voice task fault: {0:?}")]
    TaskFault(FaultCode),
    #[error("request not allowed in {0:?}")]
    NotAllowed(SystemState),
}

impl TransitionError {
    pub fn class(&self) -> ErrorClass {
        match self {
            TransitionError::MutexTimeout { .. } | TransitionError::QuiesceTimeout { .. } => {
                ErrorClass::HardwareBusy
            }
            TransitionError::Allocation(_) | TransitionError::Spawn { .. } => {
                ErrorClass::AllocationFailure
            }
            TransitionError::InitFailed { .. }
            | TransitionError::InitTimeout { .. }
            | TransitionError::DeinitFailed { .. }
            | TransitionError::Overlap { .. }
            | TransitionError::TaskFault(_)
            | TransitionError::NotAllowed(_) => ErrorClass::TransitionFailure,
        }
    }
}
