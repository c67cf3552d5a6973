use core::fmt::Debug;

use super::DmaPlan;

/// Board-level full-duplex I2S driver.
///
/// One implementation drives both directions of the shared I2S port:
/// microphone on RX, amplifier on TX. Only [`AudioChannel`](super::AudioChannel)
/// calls these methods, always under its own lock, so implementations need
/// no internal synchronization.
pub trait AudioHal {
    /// Error type for driver operations.
    type Error: Debug;

    /// Install the driver with the given DMA layout. RX runs at `sample_rate`
    /// for the whole installation; TX starts there too.
    fn install(&mut self, plan: &DmaPlan, sample_rate: u32) -> Result<(), Self::Error>;

    /// Whether the hardware has come up after `install`.
    fn is_ready(&mut self) -> bool;

    /// Stop both DMA directions without releasing them.
    fn stop(&mut self) -> Result<(), Self::Error>;

    /// Release the driver and its interrupt.
    fn uninstall(&mut self) -> Result<(), Self::Error>;

    /// Read captured bytes, waiting at most `timeout_ms`. May return fewer
    /// bytes than `buf.len()`, including zero.
    fn read(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, Self::Error>;

    /// Queue bytes for output, waiting at most `timeout_ms` for DMA space.
    fn write(&mut self, buf: &[u8], timeout_ms: u32) -> Result<usize, Self::Error>;

    /// Reprogram the TX clock. RX is unaffected.
    fn set_tx_rate(&mut self, sample_rate: u32) -> Result<(), Self::Error>;

    /// Zero both DMA rings.
    fn zero_dma(&mut self) -> Result<(), Self::Error>;

    /// Bytes written but not yet clocked out.
    fn tx_pending(&self) -> usize;
}
