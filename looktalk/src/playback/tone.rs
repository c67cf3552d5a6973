//! Confirmation beeps.
//!
//! ```text
//!   Single:  ▂▇▇▇▇▇▇▂
//!   Double:  ▂▇▇▇▇▇▇▂ ........ ▂▇▇▇▇▇▇▂
//!            |<beep>| |<gap>|
//! ```
//!
//! A cue is rendered as 16-bit mono PCM and queued through
//! [`StreamDecoder::play_clip`](super::StreamDecoder::play_clip), so it
//! shares the playback task and rate handling with network audio.

use alloc::vec::Vec;

use crate::constants::{CUE_AMPLITUDE, CUE_BEEP_MS, CUE_GAP_MS, CUE_TONE_HZ};

/// Audible confirmation patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    /// Recording started or resumed, or a frame was captured.
    Single,
    /// Recording stopped, or a frame was uploaded.
    Double,
}

impl Cue {
    pub fn beeps(self) -> usize {
        match self {
            Cue::Single => 1,
            Cue::Double => 2,
        }
    }

    /// Little-endian PCM for the whole pattern at `sample_rate`.
    pub fn render(self, sample_rate: u32) -> Vec<u8> {
        let beep = samples_for(CUE_BEEP_MS, sample_rate);
        let gap = samples_for(CUE_GAP_MS, sample_rate);
        let count = self.beeps();
        let mut pcm = Vec::with_capacity((beep * count + gap * (count - 1)) * 2);
        for n in 0..count {
            if n > 0 {
                pcm.resize(pcm.len() + gap * 2, 0);
            }
            for i in 0..beep {
                pcm.extend_from_slice(&beep_sample(i, beep, sample_rate).to_le_bytes());
            }
        }
        pcm
    }
}

fn samples_for(ms: u32, sample_rate: u32) -> usize {
    (u64::from(sample_rate) * u64::from(ms) / 1000) as usize
}

/// Square wave at `CUE_TONE_HZ` with a 2 ms linear fade at each end so the
/// beep starts and stops without a click.
fn beep_sample(i: usize, len: usize, sample_rate: u32) -> i16 {
    let half_periods = i as u64 * u64::from(CUE_TONE_HZ) * 2 / u64::from(sample_rate);
    let level = if half_periods % 2 == 0 {
        i32::from(CUE_AMPLITUDE)
    } else {
        -i32::from(CUE_AMPLITUDE)
    };
    let ramp = (sample_rate / 500).max(1) as usize;
    let edge = i.min(len - 1 - i);
    if edge < ramp {
        (level * edge as i32 / ramp as i32) as i16
    } else {
        level as i16
    }
}
