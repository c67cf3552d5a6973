//! Compile-time defaults and fixed hardware limits.
//!
//! Tunables seed the matching field of
//! [`StartupConfig`](crate::config::StartupConfig); the rest (frame size,
//! descriptor limits, poll intervals, error thresholds) are used directly.

// ── Audio format ──────────────────────────────────────────────────────

/// Capture rate and default playback rate in Hz.
pub const AUDIO_SAMPLE_RATE: u32 = 16_000;

/// Bytes per mono 16-bit frame.
pub const BYTES_PER_FRAME: usize = 2;

/// Lowest playback rate a stream may request.
pub const MIN_STREAM_RATE: u32 = 8_000;

/// Highest playback rate a stream may request.
pub const MAX_STREAM_RATE: u32 = 48_000;

// ── DMA ───────────────────────────────────────────────────────────────

/// Requested DMA descriptors per direction.
pub const DMA_DESCRIPTOR_COUNT: usize = 4;

/// The driver refuses fewer descriptors than this per direction.
pub const DMA_MIN_DESCRIPTORS: usize = 4;

/// Requested frames per DMA descriptor.
pub const DMA_FRAME_LEN: usize = 1200;

/// Floor for the frame length when sizing under memory pressure.
pub const DMA_MIN_FRAME_LEN: usize = 64;

/// Step by which the frame length shrinks under memory pressure.
pub const DMA_FRAME_LEN_STEP: usize = 8;

/// Largest byte length a single descriptor can describe.
pub const DMA_MAX_DESCRIPTOR_BYTES: usize = 4092;

/// Silent bytes written after init to prime the TX path.
pub const TX_PRIME_BYTES: usize = 128;

// ── Memory ────────────────────────────────────────────────────────────

/// Interrupt-reachable pool size handed to the budget at boot.
pub const INTERRUPT_POOL_BYTES: usize = 96 * 1024;

/// Free interrupt-reachable bytes below which health reports `Warning`.
pub const INTERRUPT_POOL_WARNING_BYTES: usize = 35 * 1024;

/// Free interrupt-reachable bytes below which health reports `Critical`.
pub const INTERRUPT_POOL_CRITICAL_BYTES: usize = 20 * 1024;

// ── Capture / streaming ───────────────────────────────────────────────

/// Capture ring capacity.
pub const RING_BUFFER_CAPACITY: usize = 64 * 1024;

/// Bytes requested per driver read.
pub const CAPTURE_CHUNK_BYTES: usize = 1024;

/// Bytes per outbound binary frame.
pub const STREAM_CHUNK_BYTES: usize = 4096;

/// Consecutive failed driver reads before capture reports a stall.
pub const MAX_CONSECUTIVE_READ_ERRORS: u32 = 50;

/// Consecutive failed sends before streaming reports a fault.
pub const MAX_CONSECUTIVE_SEND_ERRORS: u32 = 20;

/// Consecutive failed driver writes before playback reports a fault.
pub const MAX_CONSECUTIVE_WRITE_ERRORS: u32 = 50;

// ── Playback ──────────────────────────────────────────────────────────

/// Largest PCM chunk handed to the playback queue.
pub const PLAYBACK_CHUNK_BYTES: usize = 4096;

/// Playback queue depth in chunks.
pub const PLAYBACK_QUEUE_DEPTH: usize = 10;

/// Silence written per underrun (256 frames, 16 ms at 16 kHz).
pub const SILENCE_FRAME_BYTES: usize = 512;

/// A WAV header can never be shorter than this.
pub const WAV_MIN_HEADER_BYTES: usize = 44;

/// Header bytes buffered before the stream is rejected.
pub const WAV_MAX_HEADER_BYTES: usize = 8192;

// ── Feedback cues ─────────────────────────────────────────────────────

/// Pitch of a confirmation beep.
pub const CUE_TONE_HZ: u32 = 1_400;

pub const CUE_BEEP_MS: u32 = 120;

/// Silence between the beeps of a multi-beep cue.
pub const CUE_GAP_MS: u32 = 90;

/// Peak level, about 45 % of full scale.
pub const CUE_AMPLITUDE: i16 = 14_745;

/// How long a cue waits for earlier playback before it is skipped.
pub const CUE_WAIT_MS: u32 = 400;

// ── Timeouts (milliseconds) ───────────────────────────────────────────

pub const PERIPHERAL_MUTEX_TIMEOUT_MS: u32 = 5_000;
pub const WRITE_LOCK_TIMEOUT_MS: u32 = 100;
pub const RING_LOCK_TIMEOUT_MS: u32 = 100;
pub const QUIESCE_TIMEOUT_MS: u32 = 2_000;
pub const PLAYBACK_DRAIN_TIMEOUT_MS: u32 = 5_000;
pub const AUDIO_INIT_TIMEOUT_MS: u32 = 1_000;
pub const AUDIO_IO_TIMEOUT_MS: u32 = 100;

// ── Settle delays (milliseconds) ──────────────────────────────────────

/// Camera DMA and clocks need this long after release before I2S may start.
pub const SETTLE_AFTER_CAMERA_MS: u32 = 250;

/// Quiet time after the audio driver is uninstalled.
pub const SETTLE_AFTER_AUDIO_MS: u32 = 100;

/// Quiet time before a peripheral is restored after a failed swap.
pub const SETTLE_BEFORE_RESTORE_MS: u32 = 50;

/// Wait between stopping the audio driver and uninstalling it.
pub const DMA_DRAIN_MS: u32 = 50;

// ── Retry policy ──────────────────────────────────────────────────────

/// Extra deinit attempts after the first one fails.
pub const DEINIT_RETRIES: u8 = 2;

/// Failed recoveries from `Error` before the arbiter shuts down.
pub const MAX_RECOVERY_ATTEMPTS: u8 = 3;

// ── Polling ───────────────────────────────────────────────────────────

/// Granularity of every bounded wait.
pub const POLL_INTERVAL_US: u32 = 1_000;

/// Sleep when a task loop has nothing to do.
pub const IDLE_POLL_MS: u32 = 5;

/// Sleep between link checks while streaming waits for the network.
pub const LINK_POLL_MS: u32 = 20;

/// Back-off after a failed driver read or network send.
pub const ERROR_BACKOFF_MS: u32 = 10;
