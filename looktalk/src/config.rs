//! Startup configuration.
//!
//! [`StartupConfig`] gathers every size, timeout, and settle delay the
//! pipeline uses. It is built once at boot (usually via `Default`), checked
//! with [`validate()`](StartupConfig::validate), and then handed to
//! [`ArbiterContext::new`](crate::arbiter::ArbiterContext::new). With the
//! `serde` feature both structs serialize to and deserialize from any serde
//! format, with missing fields falling back to the defaults in
//! [`constants`](crate::constants).

use thiserror::Error;

use crate::constants::*;

/// Quiet periods observed while peripherals change hands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SettleDelays {
    /// After the camera is deinitialized, before audio init.
    pub after_camera_release_ms: u32,
    /// After the audio driver is deinitialized, before camera init.
    pub after_audio_release_ms: u32,
    /// Before restoring a peripheral when a swap failed.
    pub before_restore_ms: u32,
    /// Between stopping and uninstalling the audio driver.
    pub dma_drain_ms: u32,
}

impl Default for SettleDelays {
    fn default() -> Self {
        SettleDelays {
            after_camera_release_ms: SETTLE_AFTER_CAMERA_MS,
            after_audio_release_ms: SETTLE_AFTER_AUDIO_MS,
            before_restore_ms: SETTLE_BEFORE_RESTORE_MS,
            dma_drain_ms: DMA_DRAIN_MS,
        }
    }
}

/// Boot-time configuration for the whole pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct StartupConfig {
    pub sample_rate: u32,
    pub dma_descriptor_count: usize,
    pub dma_frame_len: usize,
    pub interrupt_pool_bytes: usize,
    /// `None` tracks bulk usage without a cap.
    pub bulk_pool_bytes: Option<usize>,
    pub ring_capacity: usize,
    pub capture_chunk_bytes: usize,
    pub stream_chunk_bytes: usize,
    pub playback_chunk_bytes: usize,
    pub playback_queue_depth: usize,
    pub silence_frame_bytes: usize,
    pub settle: SettleDelays,
    pub peripheral_mutex_timeout_ms: u32,
    pub write_lock_timeout_ms: u32,
    pub ring_lock_timeout_ms: u32,
    pub quiesce_timeout_ms: u32,
    pub playback_drain_timeout_ms: u32,
    pub audio_init_timeout_ms: u32,
    pub audio_io_timeout_ms: u32,
    pub deinit_retries: u8,
    pub max_recovery_attempts: u8,
    pub max_consecutive_read_errors: u32,
}

impl Default for StartupConfig {
    fn default() -> Self {
        StartupConfig {
            sample_rate: AUDIO_SAMPLE_RATE,
            dma_descriptor_count: DMA_DESCRIPTOR_COUNT,
            dma_frame_len: DMA_FRAME_LEN,
            interrupt_pool_bytes: INTERRUPT_POOL_BYTES,
            bulk_pool_bytes: None,
            ring_capacity: RING_BUFFER_CAPACITY,
            capture_chunk_bytes: CAPTURE_CHUNK_BYTES,
            stream_chunk_bytes: STREAM_CHUNK_BYTES,
            playback_chunk_bytes: PLAYBACK_CHUNK_BYTES,
            playback_queue_depth: PLAYBACK_QUEUE_DEPTH,
            silence_frame_bytes: SILENCE_FRAME_BYTES,
            settle: SettleDelays::default(),
            peripheral_mutex_timeout_ms: PERIPHERAL_MUTEX_TIMEOUT_MS,
            write_lock_timeout_ms: WRITE_LOCK_TIMEOUT_MS,
            ring_lock_timeout_ms: RING_LOCK_TIMEOUT_MS,
            quiesce_timeout_ms: QUIESCE_TIMEOUT_MS,
            playback_drain_timeout_ms: PLAYBACK_DRAIN_TIMEOUT_MS,
            audio_init_timeout_ms: AUDIO_INIT_TIMEOUT_MS,
            audio_io_timeout_ms: AUDIO_IO_TIMEOUT_MS,
            deinit_retries: DEINIT_RETRIES,
            max_recovery_attempts: MAX_RECOVERY_ATTEMPTS,
            max_consecutive_read_errors: MAX_CONSECUTIVE_READ_ERRORS,
        }
    }
}

/// A [`StartupConfig`] field is out of range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{field} must be non-zero")]
    Zero { field: &'static str },
    #[error("{field} must be a whole number of frames")]
    Unaligned { field: &'static str },
    #[error("sample rate {0} Hz is outside the supported range")]
    SampleRate(u32),
    #[error("{count} DMA descriptors is below the hardware floor")]
    TooFewDescriptors { count: usize },
    #[error("{field} ({chunk} bytes) exceeds the ring capacity ({capacity} bytes)")]
    ChunkExceedsRing {
        field: &'static str,
        chunk: usize,
        capacity: usize,
    },
}

impl StartupConfig {
    /// Check the sizes for internal consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_STREAM_RATE..=MAX_STREAM_RATE).contains(&self.sample_rate) {
            return Err(ConfigError::SampleRate(self.sample_rate));
        }
        if self.dma_descriptor_count < DMA_MIN_DESCRIPTORS {
            return Err(ConfigError::TooFewDescriptors {
                count: self.dma_descriptor_count,
            });
        }

        let nonzero = [
            ("dma_frame_len", self.dma_frame_len),
            ("ring_capacity", self.ring_capacity),
            ("capture_chunk_bytes", self.capture_chunk_bytes),
            ("stream_chunk_bytes", self.stream_chunk_bytes),
            ("playback_chunk_bytes", self.playback_chunk_bytes),
            ("playback_queue_depth", self.playback_queue_depth),
            ("silence_frame_bytes", self.silence_frame_bytes),
        ];
        for (field, value) in nonzero {
            if value == 0 {
                return Err(ConfigError::Zero { field });
            }
        }

        let framed = [
            ("ring_capacity", self.ring_capacity),
            ("capture_chunk_bytes", self.capture_chunk_bytes),
            ("stream_chunk_bytes", self.stream_chunk_bytes),
            ("playback_chunk_bytes", self.playback_chunk_bytes),
            ("silence_frame_bytes", self.silence_frame_bytes),
        ];
        for (field, value) in framed {
            if value % BYTES_PER_FRAME != 0 {
                return Err(ConfigError::Unaligned { field });
            }
        }

        for (field, chunk) in [
            ("capture_chunk_bytes", self.capture_chunk_bytes),
            ("stream_chunk_bytes", self.stream_chunk_bytes),
        ] {
            if chunk > self.ring_capacity {
                return Err(ConfigError::ChunkExceedsRing {
                    field,
                    chunk,
                    capacity: self.ring_capacity,
                });
            }
        }
        Ok(())
    }
}
