//! Crate-wide error type and its coarse classification.
//!
//! Each component owns a precise error enum; [`Error`] wraps them so callers
//! that only care about the category can match on [`Error::class()`].
//!
//! | Class | Raised by | Typical handling |
//! |-------|-----------|------------------|
//! | `HardwareBusy` | lock and quiescence timeouts, dropped writes | retry later |
//! | `AllocationFailure` | region budget, task spawn | abort that subsystem's startup |
//! | `ProtocolError` | WAV header, unsupported rate | abort that stream only |
//! | `OverflowCondition` | capture ring eviction | logged; oldest data dropped |
//! | `TransitionFailure` | peripheral init/deinit, overlap | rollback or `Error` state |

use thiserror::Error;

use crate::arbiter::TransitionError;
use crate::audio::DriverError;
use crate::capture::RingError;
use crate::memory::MemoryError;
use crate::playback::DecodeError;

/// Coarse category shared by every error in the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    HardwareBusy,
    AllocationFailure,
    ProtocolError,
    OverflowCondition,
    TransitionFailure,
}

/// Any error produced by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error(transparent)]
    Memory(#[from] MemoryError),
    #[error(transparent)]
    Driver(#[from] DriverError),
    #[error(transparent)]
    Ring(#[from] RingError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

impl Error {
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::Memory(e) => e.class(),
            Error::Driver(e) => e.class(),
            Error::Ring(e) => e.class(),
            Error::Decode(e) => e.class(),
            Error::Transition(e) => e.class(),
        }
    }
}
