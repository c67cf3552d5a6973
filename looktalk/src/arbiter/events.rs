use crate::sync::FaultCode;

use super::SystemState;

/// Gestures decoded from the single user button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEvent {
    /// Toggle between camera standby and voice.
    Single,
    /// Capture a photo.
    Double,
    /// Shut down.
    LongPress,
    /// Release after a long press. Ignored.
    LongRelease,
}

/// Input to [`ResourceArbiter::dispatch`](super::ResourceArbiter::dispatch).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Button(ButtonEvent),
    /// The voice link came up (`true`) or went down.
    LinkStatus(bool),
    /// Capture requested by something other than the button.
    CaptureRequest,
    /// A voice task gave up.
    TaskFault(FaultCode),
    /// Periodic housekeeping: fault polling and recovery.
    Tick,
}

/// Visual states the status indicator can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indicator {
    Booting,
    CameraReady,
    Listening,
    Busy,
    Capturing,
    UploadFailed,
    Fault,
    Off,
}

impl Indicator {
    pub fn for_state(state: SystemState) -> Self {
        match state {
            SystemState::Init => Indicator::Booting,
            SystemState::CameraStandby => Indicator::CameraReady,
            SystemState::VoiceActive => Indicator::Listening,
            SystemState::Transitioning => Indicator::Busy,
            SystemState::Error => Indicator::Fault,
            SystemState::Shutdown => Indicator::Off,
        }
    }
}

/// LED or similar, driven by the arbiter.
pub trait StatusIndicator {
    fn show(&mut self, indicator: Indicator);
}
