use alloc::sync::Arc;
use core::fmt;
use core::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};

use log::error;

use super::TransitionError;

/// Top-level system state. Exactly one at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SystemState {
    Init = 0,
    CameraStandby = 1,
    VoiceActive = 2,
    Transitioning = 3,
    Error = 4,
    Shutdown = 5,
}

impl SystemState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => SystemState::CameraStandby,
            2 => SystemState::VoiceActive,
            3 => SystemState::Transitioning,
            4 => SystemState::Error,
            5 => SystemState::Shutdown,
            _ => SystemState::Init,
        }
    }
}

/// Read-only view of the arbiter's state for other contexts.
#[derive(Debug, Clone)]
pub struct StateHandle(Arc<AtomicU8>);

impl StateHandle {
    pub(crate) fn new(initial: SystemState) -> Self {
        StateHandle(Arc::new(AtomicU8::new(initial as u8)))
    }

    pub fn get(&self) -> SystemState {
        SystemState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, state: SystemState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// The two peripherals sharing the DMA/clock/pin resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Peripheral {
    Camera,
    Audio,
}

impl Peripheral {
    pub fn other(self) -> Self {
        match self {
            Peripheral::Camera => Peripheral::Audio,
            Peripheral::Audio => Peripheral::Camera,
        }
    }
}

impl fmt::Display for Peripheral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Peripheral::Camera => "camera",
            Peripheral::Audio => "audio",
        })
    }
}

/// Which peripheral drivers are initialized.
///
/// Refuses to mark one up while the other is, so the pair can never both
/// read as initialized.
#[derive(Debug, Default)]
pub struct PeripheralLedger {
    camera: AtomicBool,
    audio: AtomicBool,
    refusals: AtomicUsize,
}

impl PeripheralLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn flag(&self, p: Peripheral) -> &AtomicBool {
        match p {
            Peripheral::Camera => &self.camera,
            Peripheral::Audio => &self.audio,
        }
    }

    /// Check `p` may be initialized now.
    pub fn ensure_free_for(&self, p: Peripheral) -> Result<(), TransitionError> {
        if self.is_up(p.other()) {
            self.refusals.fetch_add(1, Ordering::Relaxed);
            error!(
                target: "arbiter",
                "refusing {} init while {} is initialized", p, p.other()
            );
            return Err(TransitionError::Overlap {
                requested: p,
                active: p.other(),
            });
        }
        Ok(())
    }

    pub fn mark_up(&self, p: Peripheral) -> Result<(), TransitionError> {
        self.ensure_free_for(p)?;
        self.flag(p).store(true, Ordering::Release);
        Ok(())
    }

    pub fn mark_down(&self, p: Peripheral) {
        self.flag(p).store(false, Ordering::Release);
    }

    pub fn is_up(&self, p: Peripheral) -> bool {
        self.flag(p).load(Ordering::Acquire)
    }

    pub fn active(&self) -> Option<Peripheral> {
        if self.is_up(Peripheral::Camera) {
            Some(Peripheral::Camera)
        } else if self.is_up(Peripheral::Audio) {
            Some(Peripheral::Audio)
        } else {
            None
        }
    }

    pub fn both_up(&self) -> bool {
        self.is_up(Peripheral::Camera) && self.is_up(Peripheral::Audio)
    }

    /// Inits refused because the other peripheral was up.
    pub fn refusals(&self) -> usize {
        self.refusals.load(Ordering::Relaxed)
    }
}
