//! # looktalk
//!
//! A `no_std` + `alloc` pipeline for dual-core camera boards that also do
//! full-duplex voice. The camera and the I2S audio channel share DMA
//! channels, clocks and pins, so only one of them may be initialized at a
//! time; this crate owns the arbitration between them and everything that
//! runs while voice is active.
//!
//! ## Architecture
//!
//! | Layer | Module | Purpose |
//! |-------|--------|---------|
//! | Memory | [`memory`] | Interrupt-reachable vs. bulk region budgets |
//! | Sync | [`sync`] | Bounded locks, peripheral mutex, cooperative cancellation |
//! | Audio | [`audio`] | DMA-safe full-duplex I2S channel over an [`audio::AudioHal`] |
//! | Capture | [`capture`] | Overwrite-oldest ring, capture and uplink tasks |
//! | Playback | [`playback`] | Incremental WAV decoder and speaker task |
//! | Control | [`arbiter`] | Camera ↔ voice state machine |
//! | Glue | [`net`] / [`config`] / [`error`] | Network traits, startup config, error classes |
//!
//! ## Data flow in voice mode
//!
//! ```text
//!   mic ─► AudioChannel::read ─► CaptureTask ─► RingBuffer ─► StreamTask ─► NetworkTransport
//!
//!   network WAV bytes ─► StreamDecoder::feed ─► PlaybackQueue ─► PlaybackTask ─► AudioChannel::write ─► speaker
//! ```
//!
//! ## Quick start
//!
//! ```ignore
//! use looktalk::arbiter::{ArbiterContext, ButtonEvent, Collaborators, Event, ResourceArbiter};
//! use looktalk::config::StartupConfig;
//!
//! let ctx = ArbiterContext::new(StartupConfig::default())?;
//! let mut arbiter = ResourceArbiter::<Board>::new(ctx, collaborators);
//! arbiter.start()?;
//!
//! loop {
//!     let event = next_event();
//!     if let Err(e) = arbiter.dispatch(event) {
//!         log::warn!("{} ({:?})", e, e.class());
//!     }
//! }
//! ```
//!
//! ## Features
//!
//! | Feature | Default | Enables |
//! |---------|---------|---------|
//! | `serde` | no | `Deserialize`/`Serialize` on [`config::StartupConfig`] |
//!
//! ## Audio parameters
//!
//! - **Capture rate:** 16 000 Hz ([`constants::AUDIO_SAMPLE_RATE`]), mono `i16`
//! - **Playback rate:** per stream, 8 000 – 48 000 Hz
//! - **Capture ring:** 64 KiB ([`constants::RING_BUFFER_CAPACITY`])

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod constants;
pub mod config;
pub mod error;
pub mod memory;
pub mod sync;
pub mod audio;
pub mod capture;
pub mod playback;
pub mod net;
pub mod arbiter;

#[cfg(test)]
mod testing;

pub use error::{Error, ErrorClass};
