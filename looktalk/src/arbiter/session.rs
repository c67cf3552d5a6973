use alloc::sync::Arc;

use log::debug;

use crate::capture::RingBuffer;
use crate::config::StartupConfig;
use crate::constants::WAV_MAX_HEADER_BYTES;
use crate::memory::{MemoryError, RegionCharge, PLAYBACK_QUEUE_REGION};
use crate::playback::{PlaybackQueue, StreamDecoder};
use crate::sync::TaskGroup;

use super::ArbiterContext;

/// Buffers and tasks that exist only while voice mode is active.
///
/// Created before the audio driver comes up and dropped after it goes
/// down. Dropping the session frees the capture ring and the playback
/// charge.
pub struct VoiceSession {
    ring: Arc<RingBuffer>,
    queue: Arc<PlaybackQueue>,
    decoder: Arc<StreamDecoder>,
    _playback: RegionCharge,
    pub(super) tasks: Option<TaskGroup>,
}

impl VoiceSession {
    pub fn new(ctx: &ArbiterContext) -> Result<Self, MemoryError> {
        let cfg = ctx.config();
        let ring = Arc::new(RingBuffer::new(
            ctx.budget(),
            cfg.ring_capacity,
            cfg.ring_lock_timeout_ms,
        )?);
        let playback = ctx
            .budget()
            .charge(PLAYBACK_QUEUE_REGION, playback_footprint(cfg))?;
        let queue = Arc::new(PlaybackQueue::new(cfg.playback_queue_depth));
        let decoder = Arc::new(StreamDecoder::new(
            Arc::clone(&queue),
            cfg.playback_chunk_bytes,
        ));
        debug!(target: "arbiter", "voice session buffers allocated");
        Ok(VoiceSession {
            ring,
            queue,
            decoder,
            _playback: playback,
            tasks: None,
        })
    }

    pub fn ring(&self) -> &Arc<RingBuffer> {
        &self.ring
    }

    pub fn queue(&self) -> &Arc<PlaybackQueue> {
        &self.queue
    }

    /// Where the network layer feeds inbound audio.
    pub fn decoder(&self) -> &Arc<StreamDecoder> {
        &self.decoder
    }

    pub fn tasks_running(&self) -> bool {
        self.tasks.as_ref().is_some_and(|g| g.live() > 0)
    }
}

/// Most decoded PCM a session can hold: a full queue, one refused chunk
/// in the decoder backlog, and payload that arrived with the header.
pub fn playback_footprint(cfg: &StartupConfig) -> usize {
    (cfg.playback_queue_depth + 1) * cfg.playback_chunk_bytes + WAV_MAX_HEADER_BYTES
}

impl Drop for VoiceSession {
    fn drop(&mut self) {
        debug!(target: "arbiter", "voice session released");
    }
}
