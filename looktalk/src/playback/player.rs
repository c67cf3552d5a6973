use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;

use embedded_hal::delay::DelayNs;
use log::{debug, error, info, warn};

use crate::audio::{AudioChannel, AudioHal, DriverError};
use crate::config::StartupConfig;
use crate::constants::{ERROR_BACKOFF_MS, IDLE_POLL_MS, MAX_CONSECUTIVE_WRITE_ERRORS};
use crate::sync::{CancelToken, FaultCode};

use super::{DecoderState, PlaybackItem, StreamDecoder};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlaybackStats {
    pub chunks_played: usize,
    pub bytes_played: usize,
    pub silence_bytes: usize,
    pub underruns: usize,
    /// Chunks (or their remainders) skipped because the channel was busy
    /// or the output stayed full.
    pub dropped_chunks: usize,
    pub dropped_bytes: usize,
    pub write_errors: usize,
    pub rate_changes: usize,
    pub streams_completed: usize,
}

/// Plays decoded PCM through the audio channel.
///
/// A `Start` item reprograms the output rate for the stream. When the queue
/// runs dry mid-stream a frame of silence keeps the amplifier fed. Once a
/// draining stream has fully played out, the output rate goes back to the
/// capture rate.
pub struct PlaybackTask<H: AudioHal> {
    channel: Arc<AudioChannel<H>>,
    decoder: Arc<StreamDecoder>,
    silence: Vec<u8>,
    default_rate: u32,
    io_timeout_ms: u32,
    consecutive_errors: u32,
    stats: PlaybackStats,
}

impl<H: AudioHal> PlaybackTask<H> {
    pub fn new(
        channel: Arc<AudioChannel<H>>,
        decoder: Arc<StreamDecoder>,
        cfg: &StartupConfig,
    ) -> Self {
        PlaybackTask {
            channel,
            decoder,
            silence: vec![0u8; cfg.silence_frame_bytes],
            default_rate: cfg.sample_rate,
            io_timeout_ms: cfg.audio_io_timeout_ms,
            consecutive_errors: 0,
            stats: PlaybackStats::default(),
        }
    }

    /// Pick up a stream that was already under way when this task was
    /// built. The previous task restored the capture rate on its way out,
    /// and the stream's `Start` item has long been consumed.
    pub fn resume<D: DelayNs>(&mut self, delay: &mut D) {
        if !matches!(
            self.decoder.state(),
            DecoderState::HeaderValidated | DecoderState::Streaming | DecoderState::Draining
        ) {
            return;
        }
        if let Some(format) = self.decoder.format() {
            debug!(target: "playback", "resuming stream at {} Hz", format.sample_rate);
            self.apply_rate(format.sample_rate, delay);
        }
    }

    /// Handle one queue item, underrun, or drain check.
    pub fn step<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), FaultCode> {
        self.decoder.pump();
        match self.decoder.queue().pop() {
            Some(PlaybackItem::Start { sample_rate }) => {
                self.apply_rate(sample_rate, delay);
            }
            Some(PlaybackItem::Pcm(bytes)) => {
                let written = self.write_all(&bytes, delay)?;
                self.stats.chunks_played += 1;
                self.stats.bytes_played += written;
            }
            None => match self.decoder.state() {
                DecoderState::HeaderValidated | DecoderState::Streaming => {
                    self.stats.underruns += 1;
                    debug!(target: "playback", "underrun, writing silence");
                    let silence = core::mem::take(&mut self.silence);
                    let written = self.write_all(&silence, delay);
                    self.silence = silence;
                    self.stats.silence_bytes += written?;
                }
                DecoderState::Draining => {
                    let idle = self.channel.buffer_level().is_empty();
                    if self.decoder.poll_drain(idle) {
                        self.stats.streams_completed += 1;
                        self.apply_rate(self.default_rate, delay);
                    } else {
                        delay.delay_ms(IDLE_POLL_MS);
                    }
                }
                _ => delay.delay_ms(IDLE_POLL_MS),
            },
        }
        Ok(())
    }

    fn apply_rate<D: DelayNs>(&mut self, rate: u32, delay: &mut D) {
        if self.channel.output_rate() == rate {
            return;
        }
        match self.channel.set_output_rate(rate, delay) {
            Ok(()) => self.stats.rate_changes += 1,
            Err(e) => warn!(target: "playback", "output rate {} Hz not applied: {}", rate, e),
        }
    }

    /// Write `bytes`, returning how many reached the channel. A busy
    /// channel or a full output drops the remainder.
    fn write_all<D: DelayNs>(&mut self, bytes: &[u8], delay: &mut D) -> Result<usize, FaultCode> {
        let mut offset = 0;
        while offset < bytes.len() {
            match self.channel.write(&bytes[offset..], self.io_timeout_ms, delay) {
                Ok(0) => {
                    self.drop_rest(bytes.len() - offset, "output full");
                    break;
                }
                Ok(n) => {
                    self.consecutive_errors = 0;
                    offset += n;
                }
                Err(DriverError::Busy) => {
                    self.drop_rest(bytes.len() - offset, "channel busy");
                    break;
                }
                Err(e) => {
                    self.stats.write_errors += 1;
                    self.consecutive_errors += 1;
                    if self.consecutive_errors >= MAX_CONSECUTIVE_WRITE_ERRORS {
                        error!(
                            target: "playback",
                            "{} consecutive write failures, last: {}", self.consecutive_errors, e
                        );
                        return Err(FaultCode::PlaybackFailed);
                    }
                    warn!(target: "playback", "write failed: {}", e);
                    self.drop_rest(bytes.len() - offset, "write error");
                    delay.delay_ms(ERROR_BACKOFF_MS);
                    break;
                }
            }
        }
        Ok(offset)
    }

    fn drop_rest(&mut self, remaining: usize, why: &str) {
        self.stats.dropped_chunks += 1;
        self.stats.dropped_bytes += remaining;
        warn!(target: "playback", "{} bytes dropped: {}", remaining, why);
    }

    /// Play until cancelled or faulted.
    pub fn run<D: DelayNs>(mut self, token: CancelToken, mut delay: D) -> PlaybackStats {
        info!(target: "playback", "playback task started");
        while !token.is_cancelled() {
            if let Err(code) = self.step(&mut delay) {
                token.report_fault(code);
                break;
            }
        }
        let unplayed = self.decoder.pending_bytes();
        if unplayed > 0 {
            warn!(target: "playback", "stopping with {} bytes unplayed", unplayed);
        }
        self.apply_rate(self.default_rate, &mut delay);
        info!(
            target: "playback",
            "playback task stopped: {} bytes in {} chunks, {} underruns",
            self.stats.bytes_played, self.stats.chunks_played, self.stats.underruns
        );
        self.stats
    }

    pub fn stats(&self) -> PlaybackStats {
        self.stats
    }
}
