//! Host-side fakes for unit and scenario tests.
//!
//! The fakes share their state through `Arc<Mutex<_>>` so a test can keep
//! a probe after handing the fake itself to the code under test.

use std::string::String;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use std::vec::Vec;

use alloc::boxed::Box;
use embedded_hal::delay::DelayNs;

use crate::arbiter::{
    CameraDriver, Indicator, Platform, StatusIndicator, TaskSpawner, TaskSpec,
};
use crate::audio::{AudioHal, DmaPlan};
use crate::net::{ImageUploader, NetworkTransport};

// ── Delays ────────────────────────────────────────────────────────────

/// Delay that only counts. Never sleeps.
#[derive(Debug, Clone, Default)]
pub struct MockDelay {
    elapsed_ns: u64,
}

impl MockDelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ns / 1_000_000
    }
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.elapsed_ns += u64::from(ns);
    }
}

/// Delay backed by `thread::sleep`, for tests with real threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct SleepDelay;

impl DelayNs for SleepDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(Duration::from_nanos(u64::from(ns)));
    }
}

// ── Shared board ──────────────────────────────────────────────────────

/// Pins shared by the fake camera and fake I2S driver. Counts every time
/// one came up while the other was still up.
#[derive(Debug, Default)]
pub struct Board {
    camera_up: AtomicBool,
    audio_up: AtomicBool,
    overlaps: AtomicUsize,
}

impl Board {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn claim(&self, mine: &AtomicBool, other: &AtomicBool) {
        if other.load(Ordering::SeqCst) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        mine.store(true, Ordering::SeqCst);
    }

    pub fn overlapped(&self) -> bool {
        self.overlaps.load(Ordering::SeqCst) > 0
    }

    pub fn camera_up(&self) -> bool {
        self.camera_up.load(Ordering::SeqCst)
    }

    pub fn audio_up(&self) -> bool {
        self.audio_up.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FakeError(pub &'static str);

// ── Audio ─────────────────────────────────────────────────────────────

/// The capture byte at absolute position `i`.
pub fn rx_pattern(i: usize) -> u8 {
    (i % 251) as u8
}

#[derive(Debug, Default)]
struct HalState {
    installed: bool,
    installs: usize,
    never_ready: bool,
    fail_uninstalls: usize,
    fail_reads: bool,
    fail_writes: bool,
    rx_available: usize,
    rx_pos: usize,
    rx_rate: u32,
    tx_rate: u32,
    tx: Vec<u8>,
    tx_pending: usize,
}

/// In-memory I2S driver. Capture data is scripted with
/// [`HalProbe::script_rx`]; everything written is recorded.
pub struct FakeAudioHal {
    board: Arc<Board>,
    state: Arc<Mutex<HalState>>,
}

/// Test-side handle onto a [`FakeAudioHal`].
#[derive(Clone)]
pub struct HalProbe {
    state: Arc<Mutex<HalState>>,
}

impl FakeAudioHal {
    pub fn new(board: Arc<Board>) -> Self {
        FakeAudioHal {
            board,
            state: Arc::new(Mutex::new(HalState::default())),
        }
    }

    pub fn probe(&self) -> HalProbe {
        HalProbe {
            state: Arc::clone(&self.state),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, HalState> {
        self.state.lock().unwrap()
    }
}

impl AudioHal for FakeAudioHal {
    type Error = FakeError;

    fn install(&mut self, _plan: &DmaPlan, sample_rate: u32) -> Result<(), FakeError> {
        self.board.claim(&self.board.audio_up, &self.board.camera_up);
        let mut s = self.state();
        s.installed = true;
        s.installs += 1;
        s.rx_rate = sample_rate;
        s.tx_rate = sample_rate;
        Ok(())
    }

    fn is_ready(&mut self) -> bool {
        !self.state().never_ready
    }

    fn stop(&mut self) -> Result<(), FakeError> {
        Ok(())
    }

    fn uninstall(&mut self) -> Result<(), FakeError> {
        let mut s = self.state();
        if s.fail_uninstalls > 0 {
            s.fail_uninstalls -= 1;
            return Err(FakeError("uninstall"));
        }
        s.installed = false;
        self.board.audio_up.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8], _timeout_ms: u32) -> Result<usize, FakeError> {
        let mut s = self.state();
        if s.fail_reads {
            return Err(FakeError("read"));
        }
        let n = buf.len().min(s.rx_available);
        for (i, b) in buf[..n].iter_mut().enumerate() {
            *b = rx_pattern(s.rx_pos + i);
        }
        s.rx_pos += n;
        s.rx_available -= n;
        Ok(n)
    }

    fn write(&mut self, buf: &[u8], _timeout_ms: u32) -> Result<usize, FakeError> {
        let mut s = self.state();
        if s.fail_writes {
            return Err(FakeError("write"));
        }
        s.tx.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn set_tx_rate(&mut self, sample_rate: u32) -> Result<(), FakeError> {
        self.state().tx_rate = sample_rate;
        Ok(())
    }

    fn zero_dma(&mut self) -> Result<(), FakeError> {
        Ok(())
    }

    fn tx_pending(&self) -> usize {
        self.state.lock().unwrap().tx_pending
    }
}

impl HalProbe {
    fn state(&self) -> std::sync::MutexGuard<'_, HalState> {
        self.state.lock().unwrap()
    }

    /// Make `n` more capture bytes available.
    pub fn script_rx(&self, n: usize) {
        self.state().rx_available += n;
    }

    pub fn rx_consumed(&self) -> usize {
        self.state().rx_pos
    }

    pub fn tx_bytes(&self) -> Vec<u8> {
        self.state().tx.clone()
    }

    pub fn clear_tx(&self) {
        self.state().tx.clear();
    }

    pub fn rx_rate(&self) -> u32 {
        self.state().rx_rate
    }

    pub fn tx_rate(&self) -> u32 {
        self.state().tx_rate
    }

    pub fn installs(&self) -> usize {
        self.state().installs
    }

    pub fn installed(&self) -> bool {
        self.state().installed
    }

    pub fn fail_next_uninstalls(&self, n: usize) {
        self.state().fail_uninstalls = n;
    }

    pub fn set_never_ready(&self, never: bool) {
        self.state().never_ready = never;
    }

    pub fn fail_reads(&self, fail: bool) {
        self.state().fail_reads = fail;
    }

    pub fn fail_writes(&self, fail: bool) {
        self.state().fail_writes = fail;
    }

    pub fn set_tx_pending(&self, bytes: usize) {
        self.state().tx_pending = bytes;
    }
}

// ── Camera ────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct CameraState {
    fail_inits: usize,
    inits: usize,
    captures: usize,
}

pub struct FakeCamera {
    board: Arc<Board>,
    state: Arc<Mutex<CameraState>>,
}

#[derive(Clone)]
pub struct CameraProbe {
    state: Arc<Mutex<CameraState>>,
}

impl FakeCamera {
    pub fn new(board: Arc<Board>) -> Self {
        FakeCamera {
            board,
            state: Arc::new(Mutex::new(CameraState::default())),
        }
    }

    pub fn probe(&self) -> CameraProbe {
        CameraProbe {
            state: Arc::clone(&self.state),
        }
    }
}

impl CameraDriver for FakeCamera {
    type Error = FakeError;

    fn init(&mut self) -> Result<(), FakeError> {
        let mut s = self.state.lock().unwrap();
        if s.fail_inits > 0 {
            s.fail_inits -= 1;
            return Err(FakeError("camera init"));
        }
        s.inits += 1;
        self.board.claim(&self.board.camera_up, &self.board.audio_up);
        Ok(())
    }

    fn deinit(&mut self) -> Result<(), FakeError> {
        self.board.camera_up.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn capture_frame(&mut self) -> Option<Vec<u8>> {
        let mut s = self.state.lock().unwrap();
        s.captures += 1;
        let mut jpeg = vec![0xAB; 1024];
        jpeg[..2].copy_from_slice(&[0xFF, 0xD8]);
        Some(jpeg)
    }
}

impl CameraProbe {
    pub fn fail_next_inits(&self, n: usize) {
        self.state.lock().unwrap().fail_inits = n;
    }

    pub fn inits(&self) -> usize {
        self.state.lock().unwrap().inits
    }

    pub fn captures(&self) -> usize {
        self.state.lock().unwrap().captures
    }
}

// ── Network ───────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct NetState {
    connected: bool,
    fail_sends: usize,
    frames: Vec<Vec<u8>>,
    texts: Vec<String>,
}

#[derive(Debug, Default)]
pub struct FakeNetwork {
    state: Mutex<NetState>,
}

impl FakeNetwork {
    pub fn connected() -> Self {
        let net = Self::default();
        net.set_connected(true);
        net
    }

    pub fn set_connected(&self, up: bool) {
        self.state.lock().unwrap().connected = up;
    }

    pub fn fail_next_sends(&self, n: usize) {
        self.state.lock().unwrap().fail_sends = n;
    }

    /// Lengths of the binary frames sent so far.
    pub fn frames(&self) -> Vec<usize> {
        self.state.lock().unwrap().frames.iter().map(Vec::len).collect()
    }

    pub fn sent_bytes(&self) -> Vec<u8> {
        self.state.lock().unwrap().frames.concat()
    }

    pub fn texts(&self) -> Vec<String> {
        self.state.lock().unwrap().texts.clone()
    }
}

impl NetworkTransport for FakeNetwork {
    type Error = FakeError;

    fn send_binary(&self, bytes: &[u8]) -> Result<(), FakeError> {
        let mut s = self.state.lock().unwrap();
        if s.fail_sends > 0 {
            s.fail_sends -= 1;
            return Err(FakeError("send"));
        }
        s.frames.push(bytes.to_vec());
        Ok(())
    }

    fn send_text(&self, text: &str) -> Result<(), FakeError> {
        let mut s = self.state.lock().unwrap();
        if !s.connected {
            return Err(FakeError("send_text"));
        }
        s.texts.push(String::from(text));
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state.lock().unwrap().connected
    }
}

/// Records upload sizes. Clones share the record.
#[derive(Clone, Default)]
pub struct FakeUploader {
    uploads: Arc<Mutex<Vec<usize>>>,
    fail: Arc<AtomicBool>,
}

impl FakeUploader {
    pub fn uploads(&self) -> Vec<usize> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl ImageUploader for FakeUploader {
    type Error = FakeError;

    fn upload_image(&mut self, jpeg: &[u8]) -> Result<(), FakeError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(FakeError("upload"));
        }
        self.uploads.lock().unwrap().push(jpeg.len());
        Ok(())
    }
}

// ── Status and tasks ──────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct FakeStatus {
    shown: Arc<Mutex<Vec<Indicator>>>,
}

impl FakeStatus {
    pub fn history(&self) -> Vec<Indicator> {
        self.shown.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<Indicator> {
        self.shown.lock().unwrap().last().copied()
    }
}

impl StatusIndicator for FakeStatus {
    fn show(&mut self, indicator: Indicator) {
        self.shown.lock().unwrap().push(indicator);
    }
}

/// Runs each task on its own OS thread.
#[derive(Clone, Default)]
pub struct ThreadSpawner {
    specs: Arc<Mutex<Vec<TaskSpec>>>,
    handles: Arc<Mutex<Vec<JoinHandle<()>>>>,
    refuse: Arc<AtomicUsize>,
}

impl ThreadSpawner {
    /// Refuse the next `n` spawns.
    pub fn refuse_next(&self, n: usize) {
        self.refuse.store(n, Ordering::SeqCst);
    }

    pub fn spawned(&self) -> Vec<TaskSpec> {
        self.specs.lock().unwrap().clone()
    }

    /// Join every thread started so far.
    pub fn join_all(&self) {
        let handles: Vec<_> = self.handles.lock().unwrap().drain(..).collect();
        for h in handles {
            h.join().unwrap();
        }
    }
}

impl TaskSpawner for ThreadSpawner {
    type Error = FakeError;

    fn spawn(
        &mut self,
        spec: TaskSpec,
        job: Box<dyn FnOnce() + Send + 'static>,
    ) -> Result<(), FakeError> {
        let refused = self
            .refuse
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(FakeError("spawn"));
        }
        self.specs.lock().unwrap().push(spec);
        let handle = std::thread::Builder::new()
            .name(String::from(spec.name))
            .spawn(job)
            .map_err(|_| FakeError("spawn"))?;
        self.handles.lock().unwrap().push(handle);
        Ok(())
    }
}

pub struct FakePlatform;

impl Platform for FakePlatform {
    type Camera = FakeCamera;
    type Audio = FakeAudioHal;
    type Net = FakeNetwork;
    type Uploader = FakeUploader;
    type Spawner = ThreadSpawner;
    type Status = FakeStatus;
    type Delay = SleepDelay;
}

// ── Data ──────────────────────────────────────────────────────────────

/// Small deterministic generator for model tests.
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Lcg(seed)
    }

    pub fn next_u32(&mut self) -> u32 {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        (self.0 >> 33) as u32
    }
}

/// Canonical 44-byte PCM WAV header.
pub fn wav_header(sample_rate: u32, channels: u16, bits: u16, data_len: u32) -> Vec<u8> {
    let block_align = channels * bits / 8;
    let byte_rate = sample_rate * u32::from(block_align);
    let mut h = Vec::with_capacity(44);
    h.extend_from_slice(b"RIFF");
    h.extend_from_slice(&(36 + data_len).to_le_bytes());
    h.extend_from_slice(b"WAVE");
    h.extend_from_slice(b"fmt ");
    h.extend_from_slice(&16u32.to_le_bytes());
    h.extend_from_slice(&1u16.to_le_bytes());
    h.extend_from_slice(&channels.to_le_bytes());
    h.extend_from_slice(&sample_rate.to_le_bytes());
    h.extend_from_slice(&byte_rate.to_le_bytes());
    h.extend_from_slice(&block_align.to_le_bytes());
    h.extend_from_slice(&bits.to_le_bytes());
    h.extend_from_slice(b"data");
    h.extend_from_slice(&data_len.to_le_bytes());
    h
}

/// Mono 16-bit WAV stream carrying `payload`.
pub fn wav_stream(sample_rate: u32, payload: &[u8]) -> Vec<u8> {
    let mut s = wav_header(sample_rate, 1, 16, payload.len() as u32);
    s.extend_from_slice(payload);
    s
}
