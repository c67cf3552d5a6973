use alloc::vec::Vec;
use core::sync::atomic::{AtomicUsize, Ordering};

use super::spsc::SpscRing;

/// One entry handed from the decoder to the playback task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackItem {
    /// A new stream begins at this output rate.
    Start { sample_rate: u32 },
    /// Sample-aligned PCM.
    Pcm(Vec<u8>),
}

impl PlaybackItem {
    fn pcm_len(&self) -> usize {
        match self {
            PlaybackItem::Start { .. } => 0,
            PlaybackItem::Pcm(bytes) => bytes.len(),
        }
    }
}

/// Bounded hand-off between the stream decoder (producer) and the playback
/// task (consumer).
///
/// A full queue hands the item back, which the decoder turns into
/// back-pressure on the network reader.
pub struct PlaybackQueue {
    ring: SpscRing<PlaybackItem>,
    queued_bytes: AtomicUsize,
}

impl PlaybackQueue {
    pub fn new(depth: usize) -> Self {
        PlaybackQueue {
            ring: SpscRing::with_capacity(depth),
            queued_bytes: AtomicUsize::new(0),
        }
    }

    /// Producer side. Returns the item if the queue is full.
    pub fn push(&self, item: PlaybackItem) -> Result<(), PlaybackItem> {
        let len = item.pcm_len();
        self.ring.push(item)?;
        self.queued_bytes.fetch_add(len, Ordering::AcqRel);
        Ok(())
    }

    /// Consumer side.
    pub fn pop(&self) -> Option<PlaybackItem> {
        let item = self.ring.pop()?;
        self.queued_bytes.fetch_sub(item.pcm_len(), Ordering::AcqRel);
        Some(item)
    }

    /// Consumer side: discard everything queued, returning the PCM bytes dropped.
    pub fn drain(&self) -> usize {
        let mut dropped = 0;
        while let Some(item) = self.pop() {
            dropped += item.pcm_len();
        }
        dropped
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.ring.is_full()
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// PCM bytes queued and not yet popped.
    pub fn queued_bytes(&self) -> usize {
        self.queued_bytes.load(Ordering::Acquire)
    }
}
