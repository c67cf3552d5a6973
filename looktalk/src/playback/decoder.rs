use alloc::collections::VecDeque;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

use embedded_hal::delay::DelayNs;
use log::{debug, error, info, warn};

use crate::constants::WAV_MAX_HEADER_BYTES;
use crate::sync::{wait_until, TimedGuard, TimedLock};

use super::wav::{scan_header, HeaderScan, WavFormat};
use super::{DecodeError, PlaybackItem, PlaybackQueue};

/// Where the decoder is within the current playback stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DecoderState {
    /// No stream in progress. The next byte starts one.
    Idle = 0,
    AccumulatingHeader = 1,
    HeaderValidated = 2,
    Streaming = 3,
    /// End of stream seen; waiting for queued audio to play out.
    Draining = 4,
    /// The stream was rejected; its remaining bytes are refused until
    /// end of stream or reset.
    Aborted = 5,
}

impl DecoderState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => DecoderState::AccumulatingHeader,
            2 => DecoderState::HeaderValidated,
            3 => DecoderState::Streaming,
            4 => DecoderState::Draining,
            5 => DecoderState::Aborted,
            _ => DecoderState::Idle,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecoderStats {
    pub streams_started: usize,
    pub streams_completed: usize,
    pub streams_aborted: usize,
    pub payload_bytes: usize,
    /// Payload past the declared data length, or trailing half-samples.
    pub bytes_discarded: usize,
}

#[derive(Default)]
struct Inner {
    header: Vec<u8>,
    format: Option<WavFormat>,
    /// Bytes short of a whole sample, carried into the next piece.
    carry: Vec<u8>,
    /// Items accepted but refused by a full queue.
    backlog: VecDeque<PlaybackItem>,
    payload_accepted: usize,
    payload_limit: Option<usize>,
}

impl Inner {
    fn clear(&mut self) {
        self.header.clear();
        self.format = None;
        self.carry.clear();
        self.backlog.clear();
        self.payload_accepted = 0;
        self.payload_limit = None;
    }

    fn backlog_bytes(&self) -> usize {
        self.backlog
            .iter()
            .map(|item| match item {
                PlaybackItem::Pcm(bytes) => bytes.len(),
                PlaybackItem::Start { .. } => 0,
            })
            .sum()
    }
}

/// Incremental WAV decoder feeding the playback queue.
///
/// ```text
///   Idle ──feed──► AccumulatingHeader ──valid header──► HeaderValidated ──► Streaming
///                        │                                                    │
///                 bad/oversized header                                  end_of_stream
///                        ▼                                                    ▼
///                     Aborted ──end_of_stream/reset──► Idle ◄──drained── Draining
/// ```
///
/// Input arrives in arbitrary chunks. The header is buffered until the
/// `data` chunk is found and validated; nothing is queued before that, so
/// a rejected stream plays no audio. Payload is cut into sample-aligned
/// pieces of at most `chunk_bytes`, and a sample split across input chunks
/// is carried over.
///
/// [`feed()`](Self::feed) returns how many bytes it took. Fewer than
/// offered means the playback queue is full and the caller should retry
/// the rest later.
pub struct StreamDecoder {
    inner: TimedLock<Inner>,
    state: AtomicU8,
    queue: Arc<PlaybackQueue>,
    chunk_bytes: usize,
    streams_started: AtomicUsize,
    streams_completed: AtomicUsize,
    streams_aborted: AtomicUsize,
    payload_bytes: AtomicUsize,
    bytes_discarded: AtomicUsize,
}

impl StreamDecoder {
    pub fn new(queue: Arc<PlaybackQueue>, chunk_bytes: usize) -> Self {
        StreamDecoder {
            inner: TimedLock::new(Inner::default()),
            state: AtomicU8::new(DecoderState::Idle as u8),
            queue,
            chunk_bytes: chunk_bytes.max(2),
            streams_started: AtomicUsize::new(0),
            streams_completed: AtomicUsize::new(0),
            streams_aborted: AtomicUsize::new(0),
            payload_bytes: AtomicUsize::new(0),
            bytes_discarded: AtomicUsize::new(0),
        }
    }

    pub fn state(&self) -> DecoderState {
        DecoderState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: DecoderState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Offer the next bytes of the stream. Returns how many were taken.
    pub fn feed(&self, chunk: &[u8]) -> Result<usize, DecodeError> {
        if chunk.is_empty() {
            return Ok(0);
        }
        let mut inner = self.inner.lock();
        match self.state() {
            DecoderState::Aborted => return Err(DecodeError::Aborted),
            DecoderState::Draining => {
                return Err(DecodeError::NotAccepting(DecoderState::Draining))
            }
            DecoderState::Idle => {
                inner.clear();
                self.set_state(DecoderState::AccumulatingHeader);
                self.streams_started.fetch_add(1, Ordering::Relaxed);
                debug!(target: "playback", "playback stream started");
            }
            _ => {}
        }
        if !self.pump_locked(&mut inner) {
            return Ok(0);
        }

        let mut consumed = 0;
        if self.state() == DecoderState::AccumulatingHeader {
            let room = WAV_MAX_HEADER_BYTES - inner.header.len();
            let take = chunk.len().min(room);
            inner.header.extend_from_slice(&chunk[..take]);
            consumed = take;

            match scan_header(&inner.header) {
                Ok(HeaderScan::Incomplete) => {
                    if inner.header.len() >= WAV_MAX_HEADER_BYTES {
                        return Err(self.abort(
                            &mut inner,
                            DecodeError::HeaderTooLarge {
                                limit: WAV_MAX_HEADER_BYTES,
                            },
                        ));
                    }
                    return Ok(consumed);
                }
                Ok(HeaderScan::Complete { format, header_len }) => {
                    if let Err(e) = format.validate() {
                        return Err(self.abort(&mut inner, e));
                    }
                    self.set_state(DecoderState::HeaderValidated);
                    info!(
                        target: "playback",
                        "WAV stream: {} Hz, {} ch, {} bit", format.sample_rate, format.channels, format.bits_per_sample
                    );
                    inner.format = Some(format);
                    inner.payload_limit = format.declared_payload();
                    let leftover = inner.header.split_off(header_len);
                    inner.backlog.push_back(PlaybackItem::Start {
                        sample_rate: format.sample_rate,
                    });
                    self.set_state(DecoderState::Streaming);
                    self.take_payload(&mut inner, &leftover, true);
                    self.pump_locked(&mut inner);
                }
                Err(e) => return Err(self.abort(&mut inner, e)),
            }
        }

        consumed += self.take_payload(&mut inner, &chunk[consumed..], false);
        Ok(consumed)
    }

    /// Feed all of `chunk`, waiting up to `timeout_ms` each time the queue
    /// is full.
    pub fn feed_blocking<D: DelayNs>(
        &self,
        chunk: &[u8],
        timeout_ms: u32,
        delay: &mut D,
    ) -> Result<(), DecodeError> {
        let mut offset = 0;
        while offset < chunk.len() {
            let n = self.feed(&chunk[offset..])?;
            offset += n;
            if n == 0 && !wait_until(timeout_ms, delay, || !self.queue.is_full()) {
                warn!(
                    target: "playback",
                    "playback queue stayed full for {} ms", timeout_ms
                );
                return Err(DecodeError::QueueFull {
                    unconsumed: chunk.len() - offset,
                });
            }
        }
        Ok(())
    }

    /// Mark the end of the current stream.
    ///
    /// A stream that ends before its header was complete is rejected with
    /// [`DecodeError::Truncated`].
    pub fn end_of_stream(&self) -> Result<(), DecodeError> {
        let mut inner = self.inner.lock();
        match self.state() {
            DecoderState::Idle | DecoderState::Draining => Ok(()),
            DecoderState::AccumulatingHeader => {
                let received = inner.header.len();
                inner.clear();
                self.set_state(DecoderState::Idle);
                self.streams_aborted.fetch_add(1, Ordering::Relaxed);
                error!(
                    target: "playback",
                    "stream ended after {} header bytes, nothing played", received
                );
                Err(DecodeError::Truncated { received })
            }
            DecoderState::HeaderValidated | DecoderState::Streaming => {
                if !inner.carry.is_empty() {
                    debug!(
                        target: "playback",
                        "dropping {} trailing byte(s) of a partial sample", inner.carry.len()
                    );
                    self.bytes_discarded
                        .fetch_add(inner.carry.len(), Ordering::Relaxed);
                    inner.carry.clear();
                }
                self.set_state(DecoderState::Draining);
                debug!(target: "playback", "end of stream, draining");
                Ok(())
            }
            DecoderState::Aborted => {
                inner.clear();
                self.set_state(DecoderState::Idle);
                Ok(())
            }
        }
    }

    /// Queue locally generated 16-bit mono PCM as a complete stream.
    ///
    /// Only starts when no stream is in progress, so a clip never lands in
    /// the middle of a network stream. Returns whether it was queued.
    pub fn play_clip(&self, sample_rate: u32, pcm: &[u8]) -> bool {
        let mut inner = self.inner.lock();
        if self.state() != DecoderState::Idle {
            return false;
        }
        inner.clear();
        let data_len = u32::try_from(pcm.len()).unwrap_or(u32::MAX);
        inner.format = Some(WavFormat::pcm16_mono(sample_rate, data_len));
        // Already ended: the playback task must not pad it with silence.
        self.set_state(DecoderState::Draining);
        self.streams_started.fetch_add(1, Ordering::Relaxed);
        inner.backlog.push_back(PlaybackItem::Start { sample_rate });
        self.take_payload(&mut inner, pcm, true);
        self.pump_locked(&mut inner);
        debug!(target: "playback", "clip of {} bytes queued", pcm.len());
        true
    }

    /// Move any backlog into the queue. Returns `false` if some is left.
    pub fn pump(&self) -> bool {
        let mut inner = self.inner.lock();
        self.pump_locked(&mut inner)
    }

    /// Called by the playback task when it has nothing to play. Completes
    /// a draining stream once the queue is empty and the output is idle.
    pub fn poll_drain(&self, output_idle: bool) -> bool {
        if self.state() != DecoderState::Draining {
            return false;
        }
        let mut inner = self.inner.lock();
        if !self.pump_locked(&mut inner) || !self.queue.is_empty() || !output_idle {
            return false;
        }
        inner.clear();
        self.set_state(DecoderState::Idle);
        self.streams_completed.fetch_add(1, Ordering::Relaxed);
        info!(target: "playback", "playback stream complete");
        true
    }

    /// Drop the current stream and anything queued.
    ///
    /// Pops the queue, so only call this while the playback task is stopped.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        let dropped = inner.backlog_bytes() + self.queue.drain();
        inner.clear();
        self.set_state(DecoderState::Idle);
        if dropped > 0 {
            warn!(target: "playback", "reset discarded {} queued bytes", dropped);
        }
    }

    /// Audio still to be played for the current stream.
    pub fn has_pending_audio(&self) -> bool {
        matches!(
            self.state(),
            DecoderState::HeaderValidated | DecoderState::Streaming | DecoderState::Draining
        ) || !self.queue.is_empty()
    }

    /// Wait until the current stream has played out.
    pub fn wait_idle<D: DelayNs>(&self, timeout_ms: u32, delay: &mut D) -> bool {
        wait_until(timeout_ms, delay, || !self.has_pending_audio())
    }

    /// PCM bytes accepted but not yet played.
    pub fn pending_bytes(&self) -> usize {
        let inner = self.inner.lock();
        self.queue.queued_bytes() + inner.backlog_bytes()
    }

    pub fn format(&self) -> Option<WavFormat> {
        self.inner.lock().format
    }

    pub fn queue(&self) -> &Arc<PlaybackQueue> {
        &self.queue
    }

    pub fn stats(&self) -> DecoderStats {
        DecoderStats {
            streams_started: self.streams_started.load(Ordering::Relaxed),
            streams_completed: self.streams_completed.load(Ordering::Relaxed),
            streams_aborted: self.streams_aborted.load(Ordering::Relaxed),
            payload_bytes: self.payload_bytes.load(Ordering::Relaxed),
            bytes_discarded: self.bytes_discarded.load(Ordering::Relaxed),
        }
    }

    fn abort(&self, inner: &mut TimedGuard<'_, Inner>, err: DecodeError) -> DecodeError {
        inner.clear();
        self.set_state(DecoderState::Aborted);
        self.streams_aborted.fetch_add(1, Ordering::Relaxed);
        error!(target: "playback", "playback stream aborted: {}", err);
        err
    }

    fn pump_locked(&self, inner: &mut TimedGuard<'_, Inner>) -> bool {
        while let Some(item) = inner.backlog.pop_front() {
            if let Err(item) = self.queue.push(item) {
                inner.backlog.push_front(item);
                return false;
            }
        }
        true
    }

    /// Cut payload into aligned pieces and queue them. With `force`, pieces
    /// refused by a full queue go to the backlog and everything is taken;
    /// otherwise taking stops at the first refusal.
    fn take_payload(&self, inner: &mut TimedGuard<'_, Inner>, data: &[u8], force: bool) -> usize {
        let align = inner
            .format
            .map(|f| usize::from(f.block_align).max(1))
            .unwrap_or(2);

        let keep = match inner.payload_limit {
            Some(limit) => data.len().min(limit.saturating_sub(inner.payload_accepted)),
            None => data.len(),
        };

        let mut used = 0;
        while used < keep {
            if !force && !inner.backlog.is_empty() {
                return used;
            }
            let take = self
                .chunk_bytes
                .saturating_sub(inner.carry.len())
                .max(1)
                .min(keep - used);

            let mut piece = Vec::with_capacity(inner.carry.len() + take);
            piece.append(&mut inner.carry);
            piece.extend_from_slice(&data[used..used + take]);
            let rem = piece.len() % align;
            if rem > 0 {
                let split = piece.len() - rem;
                inner.carry.extend_from_slice(&piece[split..]);
                piece.truncate(split);
            }
            used += take;
            inner.payload_accepted += take;
            self.payload_bytes.fetch_add(take, Ordering::Relaxed);

            if piece.is_empty() {
                continue;
            }
            let item = PlaybackItem::Pcm(piece);
            if inner.backlog.is_empty() {
                if let Err(item) = self.queue.push(item) {
                    inner.backlog.push_back(item);
                }
            } else {
                inner.backlog.push_back(item);
            }
        }

        if keep < data.len() {
            let extra = data.len() - keep;
            self.bytes_discarded.fetch_add(extra, Ordering::Relaxed);
            debug!(
                target: "playback",
                "{} bytes past the declared data length ignored", extra
            );
        }
        data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{wav_header, wav_stream, MockDelay};
    use alloc::vec;

    fn decoder(depth: usize, chunk: usize) -> StreamDecoder {
        StreamDecoder::new(Arc::new(PlaybackQueue::new(depth)), chunk)
    }

    /// Pop everything, returning the Start rates and the concatenated PCM.
    fn collect(dec: &StreamDecoder) -> (Vec<u32>, Vec<u8>) {
        let mut rates = Vec::new();
        let mut pcm = Vec::new();
        loop {
            dec.pump();
            match dec.queue().pop() {
                Some(PlaybackItem::Start { sample_rate }) => rates.push(sample_rate),
                Some(PlaybackItem::Pcm(bytes)) => {
                    assert_eq!(bytes.len() % 2, 0, "piece not sample aligned");
                    pcm.extend_from_slice(&bytes);
                }
                None => break,
            }
        }
        (rates, pcm)
    }

    #[test]
    fn clip_queues_as_an_ended_stream() {
        let dec = decoder(2, 64);
        let pcm: Vec<u8> = (0..300u32).map(|i| i as u8).collect();
        assert!(dec.play_clip(16_000, &pcm));
        assert_eq!(dec.state(), DecoderState::Draining);
        assert_eq!(dec.format().map(|f| f.sample_rate), Some(16_000));
        assert_eq!(
            dec.feed(&wav_header(16_000, 1, 16, 0)),
            Err(DecodeError::NotAccepting(DecoderState::Draining))
        );

        let (rates, played) = collect(&dec);
        assert_eq!(rates, [16_000]);
        assert_eq!(played, pcm);
        assert!(dec.poll_drain(true));
        assert_eq!(dec.state(), DecoderState::Idle);
        assert_eq!(dec.stats().streams_completed, 1);
    }

    #[test]
    fn clip_never_interrupts_a_stream() {
        let dec = decoder(8, 64);
        dec.feed(&wav_header(24_000, 1, 16, 0)).unwrap();
        assert!(!dec.play_clip(16_000, &[1, 2, 3, 4]));
        assert_eq!(dec.state(), DecoderState::Streaming);
        let (rates, played) = collect(&dec);
        assert_eq!(rates, [24_000]);
        assert!(played.is_empty());
    }

    #[test]
    fn whole_stream_in_one_chunk() {
        let payload: Vec<u8> = (0..1000u32).map(|i| (i * 7) as u8).collect();
        let stream = wav_stream(22_050, &payload);
        let dec = decoder(64, 256);
        assert_eq!(dec.feed(&stream), Ok(stream.len()));
        assert_eq!(dec.state(), DecoderState::Streaming);
        assert_eq!(dec.format().map(|f| f.sample_rate), Some(22_050));
        dec.end_of_stream().unwrap();
        assert_eq!(dec.state(), DecoderState::Draining);

        let (rates, pcm) = collect(&dec);
        assert_eq!(rates, [22_050]);
        assert_eq!(pcm, payload);
    }

    #[test]
    fn byte_at_a_time_matches_whole_chunk() {
        let payload: Vec<u8> = (0..777u32).map(|i| (i * 13 + 5) as u8).collect();
        let stream = wav_stream(16_000, &payload);

        let whole = decoder(1024, 100);
        whole.feed(&stream).unwrap();
        whole.end_of_stream().unwrap();

        let single = decoder(1024, 100);
        for b in &stream {
            assert_eq!(single.feed(core::slice::from_ref(b)), Ok(1));
        }
        single.end_of_stream().unwrap();

        let a = collect(&whole);
        let b = collect(&single);
        assert_eq!(a, b);
        // 777 is odd: the last half-sample is dropped.
        assert_eq!(a.1.len(), 776);
        assert_eq!(&a.1[..], &payload[..776]);
    }

    #[test]
    fn truncated_header_queues_nothing() {
        let h = wav_header(16_000, 1, 16, 0);
        let dec = decoder(8, 256);
        assert_eq!(dec.feed(&h[..30]), Ok(30));
        assert_eq!(dec.state(), DecoderState::AccumulatingHeader);
        assert_eq!(
            dec.end_of_stream(),
            Err(DecodeError::Truncated { received: 30 })
        );
        assert!(dec.queue().is_empty());
        assert_eq!(dec.state(), DecoderState::Idle);
        assert_eq!(dec.stats().streams_aborted, 1);
    }

    #[test]
    fn unsupported_format_aborts_only_this_stream() {
        let mut stereo = wav_header(16_000, 2, 16, 0);
        stereo.extend_from_slice(&[1, 2, 3, 4]);
        let dec = decoder(8, 256);
        assert_eq!(
            dec.feed(&stereo),
            Err(DecodeError::Unsupported {
                field: "channels",
                value: 2
            })
        );
        assert_eq!(dec.state(), DecoderState::Aborted);
        assert!(dec.queue().is_empty());
        assert_eq!(dec.feed(&[0, 0]), Err(DecodeError::Aborted));

        // The next stream is fine.
        dec.end_of_stream().unwrap();
        let good = wav_stream(16_000, &[9, 9, 8, 8]);
        assert_eq!(dec.feed(&good), Ok(good.len()));
        let (rates, pcm) = collect(&dec);
        assert_eq!(rates, [16_000]);
        assert_eq!(pcm, [9, 9, 8, 8]);
    }

    #[test]
    fn oversized_header_is_rejected() {
        let mut h = Vec::new();
        h.extend_from_slice(b"RIFF");
        h.extend_from_slice(&0u32.to_le_bytes());
        h.extend_from_slice(b"WAVE");
        h.extend_from_slice(b"junk");
        h.extend_from_slice(&20_000u32.to_le_bytes());
        h.resize(WAV_MAX_HEADER_BYTES + 100, 0);
        let dec = decoder(8, 256);
        assert_eq!(
            dec.feed(&h),
            Err(DecodeError::HeaderTooLarge {
                limit: WAV_MAX_HEADER_BYTES
            })
        );
        assert!(dec.queue().is_empty());
    }

    #[test]
    fn full_queue_applies_back_pressure() {
        let payload = vec![0x11u8; 400];
        let stream = wav_stream(16_000, &payload);
        let dec = decoder(2, 100);

        // The start marker fills one slot and the first piece the other;
        // the second piece is taken into the backlog and then feeding stops.
        assert_eq!(dec.feed(&stream[..44]), Ok(44));
        assert_eq!(dec.feed(&stream[44..]), Ok(200));
        assert!(dec.queue().is_full());
        assert_eq!(dec.feed(&stream[244..]), Ok(0));
        assert_eq!(dec.pending_bytes(), 200);

        let mut played = Vec::new();
        let mut offset = 244;
        while offset < stream.len() || !dec.queue().is_empty() {
            if let Some(PlaybackItem::Pcm(bytes)) = dec.queue().pop() {
                played.extend_from_slice(&bytes);
            }
            if offset < stream.len() {
                offset += dec.feed(&stream[offset..]).unwrap();
            }
            dec.pump();
        }
        assert_eq!(played, payload);
    }

    #[test]
    fn declared_length_limits_payload() {
        let mut stream = wav_header(16_000, 1, 16, 6);
        stream.extend_from_slice(&[1, 2, 3, 4, 5, 6, 0xEE, 0xEE]);
        let dec = decoder(8, 256);
        assert_eq!(dec.feed(&stream), Ok(stream.len()));
        let (_, pcm) = collect(&dec);
        assert_eq!(pcm, [1, 2, 3, 4, 5, 6]);
        assert_eq!(dec.stats().bytes_discarded, 2);
    }

    #[test]
    fn drain_completes_when_output_is_idle() {
        let dec = decoder(8, 256);
        dec.feed(&wav_stream(16_000, &[1, 2])).unwrap();
        dec.end_of_stream().unwrap();
        assert!(dec.has_pending_audio());
        assert!(!dec.poll_drain(true)); // queue still holds items
        collect(&dec);
        assert!(!dec.poll_drain(false));
        assert!(dec.poll_drain(true));
        assert_eq!(dec.state(), DecoderState::Idle);
        assert!(!dec.has_pending_audio());
        assert_eq!(dec.stats().streams_completed, 1);
    }

    #[test]
    fn draining_refuses_new_bytes() {
        let dec = decoder(8, 256);
        dec.feed(&wav_stream(16_000, &[1, 2])).unwrap();
        dec.end_of_stream().unwrap();
        assert_eq!(
            dec.feed(&[0]),
            Err(DecodeError::NotAccepting(DecoderState::Draining))
        );
    }

    #[test]
    fn wait_idle_times_out_while_streaming() {
        let dec = decoder(8, 256);
        dec.feed(&wav_stream(16_000, &[1, 2])).unwrap();
        let mut delay = MockDelay::new();
        assert!(!dec.wait_idle(20, &mut delay));
        assert_eq!(delay.elapsed_ms(), 20);
        dec.reset();
        assert!(dec.wait_idle(20, &mut delay));
        assert!(dec.queue().is_empty());
    }

    #[test]
    fn feed_blocking_gives_up_on_a_stuck_queue() {
        let stream = wav_stream(16_000, &[0u8; 1000]);
        let dec = decoder(1, 64);
        let mut delay = MockDelay::new();
        // The start marker alone fills the queue and nobody pops it.
        assert_eq!(dec.feed(&stream[..44]), Ok(44));
        assert!(matches!(
            dec.feed_blocking(&stream[44..], 10, &mut delay),
            Err(DecodeError::QueueFull { .. })
        ));
    }
}
