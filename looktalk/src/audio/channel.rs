use alloc::sync::Arc;
use core::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

use embedded_hal::delay::DelayNs;
use log::{debug, error, info, warn};

use crate::config::StartupConfig;
use crate::constants::{BYTES_PER_FRAME, MAX_STREAM_RATE, MIN_STREAM_RATE, TX_PRIME_BYTES};
use crate::memory::{RegionBudget, RegionBuffer, DMA_DESCRIPTOR_REGION};
use crate::sync::{wait_until, TimedLock};

use super::{AudioHal, DmaPlan, DmaRequest, DriverError};

/// Channel settings derived from the startup config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelConfig {
    pub sample_rate: u32,
    pub dma_descriptor_count: usize,
    pub dma_frame_len: usize,
    pub read_chunk_bytes: usize,
    pub init_timeout_ms: u32,
    pub write_lock_timeout_ms: u32,
    pub io_timeout_ms: u32,
    pub dma_drain_ms: u32,
}

impl ChannelConfig {
    pub fn from_startup(cfg: &StartupConfig) -> Self {
        ChannelConfig {
            sample_rate: cfg.sample_rate,
            dma_descriptor_count: cfg.dma_descriptor_count,
            dma_frame_len: cfg.dma_frame_len,
            read_chunk_bytes: cfg.capture_chunk_bytes,
            init_timeout_ms: cfg.audio_init_timeout_ms,
            write_lock_timeout_ms: cfg.write_lock_timeout_ms,
            io_timeout_ms: cfg.audio_io_timeout_ms,
            dma_drain_ms: cfg.settle.dma_drain_ms,
        }
    }
}

/// DMA memory held for one direction while the driver is installed.
struct DirectionHandle {
    _descriptors: RegionBuffer,
}

struct Installed {
    plan: DmaPlan,
    _tx: DirectionHandle,
    _rx: DirectionHandle,
}

struct ChannelInner<H> {
    hal: H,
    installed: Option<Installed>,
    output_rate: u32,
}

/// TX occupancy as last observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferLevel {
    pub pending_bytes: usize,
    pub capacity_bytes: usize,
}

impl BufferLevel {
    pub fn is_empty(&self) -> bool {
        self.pending_bytes == 0
    }
}

/// Counters kept by an [`AudioChannel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelStats {
    pub bytes_read: usize,
    pub bytes_written: usize,
    pub read_errors: usize,
    pub write_errors: usize,
    /// Writes skipped because the lock stayed held past the write timeout.
    pub dropped_writes: usize,
    pub inits: usize,
}

#[derive(Default)]
struct Counters {
    bytes_read: AtomicUsize,
    bytes_written: AtomicUsize,
    read_errors: AtomicUsize,
    write_errors: AtomicUsize,
    dropped_writes: AtomicUsize,
    inits: AtomicUsize,
}

/// Full-duplex audio channel shared by the capture and playback tasks.
///
/// One lock guards the driver. Reads wait for it without bound, since
/// capture has nothing better to do. Writes wait at most
/// `write_lock_timeout_ms` and are dropped (and counted) on timeout, so
/// playback never stalls capture.
///
/// The DMA memory for both directions is reserved from the
/// interrupt-reachable budget at init and returned at deinit.
pub struct AudioChannel<H: AudioHal> {
    inner: TimedLock<ChannelInner<H>>,
    config: ChannelConfig,
    budget: Arc<RegionBudget>,
    initialized: AtomicBool,
    output_rate: AtomicU32,
    tx_pending: AtomicUsize,
    tx_capacity: AtomicUsize,
    counters: Counters,
}

fn hal_fault<E: core::fmt::Debug>(op: &'static str) -> impl FnOnce(E) -> DriverError {
    move |e| {
        error!(target: "audio", "I2S {} failed: {:?}", op, e);
        DriverError::Hal { op }
    }
}

impl<H: AudioHal> AudioChannel<H> {
    pub fn new(hal: H, config: ChannelConfig, budget: Arc<RegionBudget>) -> Self {
        AudioChannel {
            inner: TimedLock::new(ChannelInner {
                hal,
                installed: None,
                output_rate: config.sample_rate,
            }),
            config,
            budget,
            initialized: AtomicBool::new(false),
            output_rate: AtomicU32::new(config.sample_rate),
            tx_pending: AtomicUsize::new(0),
            tx_capacity: AtomicUsize::new(0),
            counters: Counters::default(),
        }
    }

    /// Install the driver, wait for the hardware, and prime TX with silence.
    ///
    /// Initializing an initialized channel is a no-op. If the hardware never
    /// reports ready within `init_timeout_ms` the driver is uninstalled
    /// again and [`DriverError::InitTimeout`] is returned. When that
    /// uninstall also fails the channel is left initialized, holding its DMA
    /// memory, so [`deinit()`](Self::deinit) must succeed before the pins
    /// can be handed to anything else.
    pub fn init<D: DelayNs>(&self, delay: &mut D) -> Result<DmaPlan, DriverError> {
        let mut inner = self.inner.lock_yielding(delay);
        if let Some(installed) = &inner.installed {
            warn!(target: "audio", "init on an initialized channel ignored");
            return Ok(installed.plan);
        }

        let request = DmaRequest {
            descriptor_count: self.config.dma_descriptor_count,
            frame_len: self.config.dma_frame_len,
            bytes_per_frame: BYTES_PER_FRAME,
            read_chunk_bytes: self.config.read_chunk_bytes,
        };
        let plan = DmaPlan::size(request, self.budget.available(DMA_DESCRIPTOR_REGION))?;
        let tx = self
            .budget
            .reserve(DMA_DESCRIPTOR_REGION, plan.bytes_per_direction())?;
        let rx = self
            .budget
            .reserve(DMA_DESCRIPTOR_REGION, plan.bytes_per_direction())?;

        inner
            .hal
            .install(&plan, self.config.sample_rate)
            .map_err(hal_fault("install"))?;

        let ready = wait_until(self.config.init_timeout_ms, delay, || inner.hal.is_ready());
        if !ready {
            error!(
                target: "audio",
                "I2S not ready within {} ms, uninstalling", self.config.init_timeout_ms
            );
            if let Err(e) = inner.hal.uninstall() {
                // Still driving the pins: stay initialized so deinit retries.
                error!(target: "audio", "uninstall after failed init: {:?}", e);
                self.mark_installed(&mut inner, plan, tx, rx);
            }
            return Err(DriverError::InitTimeout {
                timeout_ms: self.config.init_timeout_ms,
            });
        }

        if let Err(e) = inner.hal.zero_dma() {
            warn!(target: "audio", "zeroing DMA after install failed: {:?}", e);
        }
        let silence = [0u8; TX_PRIME_BYTES];
        match inner.hal.write(&silence, self.config.io_timeout_ms) {
            Ok(n) => debug!(target: "audio", "TX primed with {} bytes", n),
            Err(e) => warn!(target: "audio", "TX priming write failed: {:?}", e),
        }

        self.mark_installed(&mut inner, plan, tx, rx);
        self.counters.inits.fetch_add(1, Ordering::Relaxed);
        info!(
            target: "audio",
            "I2S up: {} Hz, {} x {} frames", self.config.sample_rate, plan.descriptor_count(), plan.frame_len()
        );
        Ok(plan)
    }

    fn mark_installed(
        &self,
        inner: &mut ChannelInner<H>,
        plan: DmaPlan,
        tx: RegionBuffer,
        rx: RegionBuffer,
    ) {
        inner.output_rate = self.config.sample_rate;
        inner.installed = Some(Installed {
            plan,
            _tx: DirectionHandle { _descriptors: tx },
            _rx: DirectionHandle { _descriptors: rx },
        });
        self.output_rate.store(self.config.sample_rate, Ordering::Release);
        self.tx_capacity
            .store(plan.bytes_per_direction(), Ordering::Release);
        self.tx_pending.store(0, Ordering::Release);
        self.initialized.store(true, Ordering::Release);
    }

    /// Stop DMA, let it drain, and uninstall.
    ///
    /// If uninstall fails the channel stays initialized and keeps its DMA
    /// memory: the pins are still driven and another peripheral must not
    /// take them.
    pub fn deinit<D: DelayNs>(&self, delay: &mut D) -> Result<(), DriverError> {
        let mut inner = self.inner.lock_yielding(delay);
        if inner.installed.is_none() {
            return Ok(());
        }
        if let Err(e) = inner.hal.stop() {
            warn!(target: "audio", "I2S stop failed: {:?}", e);
        }
        delay.delay_ms(self.config.dma_drain_ms);
        if let Err(e) = inner.hal.uninstall() {
            error!(target: "audio", "I2S uninstall failed: {:?}", e);
            return Err(DriverError::DeinitFailed);
        }
        inner.installed = None;
        inner.output_rate = self.config.sample_rate;
        self.initialized.store(false, Ordering::Release);
        self.output_rate
            .store(self.config.sample_rate, Ordering::Release);
        self.tx_pending.store(0, Ordering::Release);
        self.tx_capacity.store(0, Ordering::Release);
        info!(target: "audio", "I2S released");
        Ok(())
    }

    /// Read captured audio. Waits for the driver lock without bound.
    pub fn read<D: DelayNs>(
        &self,
        buf: &mut [u8],
        timeout_ms: u32,
        delay: &mut D,
    ) -> Result<usize, DriverError> {
        if buf.is_empty() {
            return Ok(0);
        }
        let mut inner = self.inner.lock_yielding(delay);
        if inner.installed.is_none() {
            return Err(DriverError::NotInitialized);
        }
        match inner.hal.read(buf, timeout_ms) {
            Ok(n) => {
                self.counters.bytes_read.fetch_add(n, Ordering::Relaxed);
                Ok(n)
            }
            Err(e) => {
                self.counters.read_errors.fetch_add(1, Ordering::Relaxed);
                Err(hal_fault("read")(e))
            }
        }
    }

    /// Queue audio for output. Gives up with [`DriverError::Busy`] if the
    /// driver lock is not free within `write_lock_timeout_ms`.
    pub fn write<D: DelayNs>(
        &self,
        buf: &[u8],
        timeout_ms: u32,
        delay: &mut D,
    ) -> Result<usize, DriverError> {
        if buf.is_empty() {
            return Ok(0);
        }
        let Some(mut inner) = self
            .inner
            .try_lock_for(self.config.write_lock_timeout_ms, delay)
        else {
            self.counters.dropped_writes.fetch_add(1, Ordering::Relaxed);
            warn!(target: "audio", "write of {} bytes dropped: channel busy", buf.len());
            return Err(DriverError::Busy);
        };
        if inner.installed.is_none() {
            return Err(DriverError::NotInitialized);
        }
        let result = inner.hal.write(buf, timeout_ms);
        self.tx_pending
            .store(inner.hal.tx_pending(), Ordering::Release);
        match result {
            Ok(n) => {
                self.counters.bytes_written.fetch_add(n, Ordering::Relaxed);
                Ok(n)
            }
            Err(e) => {
                self.counters.write_errors.fetch_add(1, Ordering::Relaxed);
                Err(hal_fault("write")(e))
            }
        }
    }

    /// Change the TX rate for the next playback stream. RX keeps running
    /// at the capture rate.
    pub fn set_output_rate<D: DelayNs>(&self, rate: u32, delay: &mut D) -> Result<(), DriverError> {
        if !(MIN_STREAM_RATE..=MAX_STREAM_RATE).contains(&rate) {
            return Err(DriverError::UnsupportedRate(rate));
        }
        let mut inner = self.inner.lock_yielding(delay);
        if inner.installed.is_none() {
            return Err(DriverError::NotInitialized);
        }
        if inner.output_rate == rate {
            return Ok(());
        }
        inner.hal.set_tx_rate(rate).map_err(hal_fault("set_tx_rate"))?;
        inner.output_rate = rate;
        self.output_rate.store(rate, Ordering::Release);
        info!(target: "audio", "TX rate set to {} Hz", rate);
        Ok(())
    }

    /// TX occupancy. Refreshed from the driver when the lock is free,
    /// otherwise the value seen by the last write.
    pub fn buffer_level(&self) -> BufferLevel {
        if let Some(inner) = self.inner.try_lock() {
            self.tx_pending
                .store(inner.hal.tx_pending(), Ordering::Release);
        }
        BufferLevel {
            pending_bytes: self.tx_pending.load(Ordering::Acquire),
            capacity_bytes: self.tx_capacity.load(Ordering::Acquire),
        }
    }

    /// Zero both DMA rings.
    pub fn clear_buffers<D: DelayNs>(&self, delay: &mut D) -> Result<(), DriverError> {
        let mut inner = self.inner.lock_yielding(delay);
        if inner.installed.is_none() {
            return Err(DriverError::NotInitialized);
        }
        inner.hal.zero_dma().map_err(hal_fault("zero_dma"))?;
        self.tx_pending.store(0, Ordering::Release);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Capture rate. Fixed for the lifetime of the channel.
    pub fn input_rate(&self) -> u32 {
        self.config.sample_rate
    }

    pub fn output_rate(&self) -> u32 {
        self.output_rate.load(Ordering::Acquire)
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn stats(&self) -> ChannelStats {
        ChannelStats {
            bytes_read: self.counters.bytes_read.load(Ordering::Relaxed),
            bytes_written: self.counters.bytes_written.load(Ordering::Relaxed),
            read_errors: self.counters.read_errors.load(Ordering::Relaxed),
            write_errors: self.counters.write_errors.load(Ordering::Relaxed),
            dropped_writes: self.counters.dropped_writes.load(Ordering::Relaxed),
            inits: self.counters.inits.load(Ordering::Relaxed),
        }
    }
}
