//! Downstream audio: WAV stream decoding and playback.
//!
//! ```text
//!   network bytes ──► StreamDecoder ──► PlaybackQueue ──► PlaybackTask ──► AudioChannel::write
//!                     (header, align)    (SPSC, bounded)   (rate, underrun)
//! ```
//!
//! | Item | Purpose |
//! |------|---------|
//! | [`wav`] | RIFF/WAVE header scan and format checks |
//! | [`StreamDecoder`] | Incremental decoder with back-pressure |
//! | [`PlaybackQueue`] | Bounded hand-off of sample-aligned PCM |
//! | [`PlaybackTask`] | Writes PCM, fills underruns with silence, restores the rate |
//! | [`tone`] | Confirmation beeps queued as local clips |

mod decoder;
mod player;
mod queue;
mod spsc;
pub mod tone;
pub mod wav;

pub use decoder::{DecoderState, DecoderStats, StreamDecoder};
pub use player::{PlaybackStats, PlaybackTask};
pub use queue::{PlaybackItem, PlaybackQueue};
pub use tone::Cue;
pub use wav::WavFormat;

use thiserror::Error;

use crate::error::ErrorClass;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("missing RIFF/WAVE signature")]
    BadSignature,
    #[error("fmt chunk too short ({0} bytes)")]
    MalformedFmt(u32),
    #[error("data chunk before fmt chunk")]
    MissingFmt,
    #[error("header longer than {limit} bytes")]
    HeaderTooLarge { limit: usize },
    #[error("unsupported {field}: {value}")]
    Unsupported { field: &'static str, value: u32 },
    #[error("stream ended after {received} header bytes")]
    Truncated { received: usize },
    #[error("stream was aborted")]
    Aborted,
    #[error("decoder not accepting data while {0:?}")]
    NotAccepting(DecoderState),
    #[error("playback queue full, {unconsumed} bytes not taken")]
    QueueFull { unconsumed: usize },
}

impl DecodeError {
    pub fn class(&self) -> ErrorClass {
        match self {
            DecodeError::QueueFull { .. } => ErrorClass::OverflowCondition,
            _ => ErrorClass::ProtocolError,
        }
    }
}
