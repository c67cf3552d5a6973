use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt::Debug;

use embedded_hal::delay::DelayNs;

use crate::audio::AudioHal;
use crate::net::{ImageUploader, NetworkTransport};

use super::StatusIndicator;

/// Camera driver. Shares DMA, clocks and pins with the audio channel.
pub trait CameraDriver {
    type Error: Debug;

    fn init(&mut self) -> Result<(), Self::Error>;

    fn deinit(&mut self) -> Result<(), Self::Error>;

    /// Grab one JPEG frame. `None` if the sensor produced nothing.
    fn capture_frame(&mut self) -> Option<Vec<u8>>;
}

/// Which core a task is pinned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Core {
    /// The core that also runs the radio stack. All I/O tasks go here.
    Radio,
    /// The application core: arbiter and camera.
    App,
}

/// Where and how to run a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskSpec {
    pub name: &'static str,
    pub core: Core,
    /// Higher runs first.
    pub priority: u8,
    pub stack_bytes: usize,
}

pub const CAPTURE_TASK: TaskSpec = TaskSpec {
    name: "capture",
    core: Core::Radio,
    priority: 7,
    stack_bytes: 4096,
};

pub const STREAM_TASK: TaskSpec = TaskSpec {
    name: "stream",
    core: Core::Radio,
    priority: 6,
    stack_bytes: 4096,
};

pub const PLAYBACK_TASK: TaskSpec = TaskSpec {
    name: "playback",
    core: Core::Radio,
    priority: 5,
    stack_bytes: 4096,
};

/// Starts a task on the requested core. The job runs to completion once.
pub trait TaskSpawner {
    type Error: Debug;

    fn spawn(
        &mut self,
        spec: TaskSpec,
        job: Box<dyn FnOnce() + Send + 'static>,
    ) -> Result<(), Self::Error>;
}

/// Binds the board-specific collaborators into one type parameter.
pub trait Platform {
    type Camera: CameraDriver;
    type Audio: AudioHal + Send + 'static;
    type Net: NetworkTransport + Send + Sync + 'static;
    type Uploader: ImageUploader;
    type Spawner: TaskSpawner;
    type Status: StatusIndicator;
    type Delay: DelayNs + Clone + Send + 'static;
}

/// Everything the arbiter drives, handed over at construction.
pub struct Collaborators<P: Platform> {
    pub camera: P::Camera,
    pub audio: P::Audio,
    pub net: Arc<P::Net>,
    pub uploader: P::Uploader,
    pub spawner: P::Spawner,
    pub status: P::Status,
    pub delay: P::Delay,
}
