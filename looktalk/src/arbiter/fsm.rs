use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;

use embedded_hal::delay::DelayNs;
use log::{debug, error, info, warn};

use crate::audio::{AudioChannel, ChannelConfig, DriverError};
use crate::capture::{CaptureTask, StreamTask};
use crate::error::Error;
use crate::net::ImageUploader;
use crate::constants::CUE_WAIT_MS;
use crate::playback::{Cue, PlaybackTask, StreamDecoder};
use crate::sync::{CancelToken, FaultCode, TaskGroup};

use super::{
    ArbiterContext, ButtonEvent, CameraDriver, Collaborators, Event, Indicator, Peripheral,
    Platform, StatusIndicator, SystemState, TaskSpawner, TaskSpec, TransitionError,
    VoiceSession, CAPTURE_TASK, PLAYBACK_TASK, STREAM_TASK,
};

/// Owns both peripherals and moves the system between camera and voice mode.
///
/// Runs on a single context; every event goes through [`dispatch`](Self::dispatch).
/// Each transition holds the peripheral mutex for the whole
/// release/settle/init sequence.
pub struct ResourceArbiter<P: Platform> {
    ctx: ArbiterContext,
    camera: P::Camera,
    audio: Arc<AudioChannel<P::Audio>>,
    net: Arc<P::Net>,
    uploader: P::Uploader,
    spawner: P::Spawner,
    status: P::Status,
    delay: P::Delay,
    session: Option<VoiceSession>,
    recovery_failures: u8,
    last_error: Option<Error>,
}

impl<P: Platform> ResourceArbiter<P> {
    pub fn new(ctx: ArbiterContext, parts: Collaborators<P>) -> Self {
        let audio = Arc::new(AudioChannel::new(
            parts.audio,
            ChannelConfig::from_startup(ctx.config()),
            Arc::clone(ctx.budget()),
        ));
        ResourceArbiter {
            ctx,
            camera: parts.camera,
            audio,
            net: parts.net,
            uploader: parts.uploader,
            spawner: parts.spawner,
            status: parts.status,
            delay: parts.delay,
            session: None,
            recovery_failures: 0,
            last_error: None,
        }
    }

    pub fn state(&self) -> SystemState {
        self.ctx.state()
    }

    pub fn context(&self) -> &ArbiterContext {
        &self.ctx
    }

    pub fn audio(&self) -> &Arc<AudioChannel<P::Audio>> {
        &self.audio
    }

    pub fn voice_session(&self) -> Option<&VoiceSession> {
        self.session.as_ref()
    }

    /// Where inbound voice audio goes while a session is active.
    pub fn decoder(&self) -> Option<Arc<StreamDecoder>> {
        self.session.as_ref().map(|s| Arc::clone(s.decoder()))
    }

    /// The error that last sent the system to `Error`.
    pub fn last_error(&self) -> Option<&Error> {
        self.last_error.as_ref()
    }

    // ── Entry points ──────────────────────────────────────────────────

    /// Bring the camera up. `Init → CameraStandby`.
    pub fn start(&mut self) -> Result<SystemState, Error> {
        let state = self.state();
        if state != SystemState::Init {
            return Err(TransitionError::NotAllowed(state).into());
        }
        self.status.show(Indicator::Booting);

        let timeout = self.mutex_timeout();
        let mutex = Arc::clone(self.ctx.peripheral_mutex());
        let Some(lease) = mutex.acquire(timeout, &mut self.delay) else {
            return Err(self.enter_error(TransitionError::MutexTimeout { timeout_ms: timeout }.into()));
        };
        let result = self.init_camera();
        drop(lease);

        match result {
            Ok(()) => {
                self.set_state(SystemState::CameraStandby);
                Ok(SystemState::CameraStandby)
            }
            Err(e) => Err(self.enter_error(e.into())),
        }
    }

    /// Handle one event and return the state it left the system in.
    pub fn dispatch(&mut self, event: Event) -> Result<SystemState, Error> {
        let state = self.state();
        if state == SystemState::Shutdown {
            debug!(target: "arbiter", "{:?} ignored after shutdown", event);
            return Ok(state);
        }
        debug!(target: "arbiter", "{:?} in {:?}", event, state);

        let result = match event {
            Event::LinkStatus(up) => {
                self.ctx.link().set(up);
                info!(target: "arbiter", "voice link {}", if up { "up" } else { "down" });
                Ok(())
            }
            Event::Tick => {
                self.tick();
                Ok(())
            }
            Event::TaskFault(code) => self.on_task_fault(code),
            Event::Button(ButtonEvent::LongPress) => {
                self.shutdown();
                Ok(())
            }
            Event::Button(ButtonEvent::LongRelease) => Ok(()),
            Event::Button(ButtonEvent::Single) => match state {
                SystemState::CameraStandby => self.enter_voice(),
                SystemState::VoiceActive => self.leave_voice(),
                other => Err(TransitionError::NotAllowed(other).into()),
            },
            Event::Button(ButtonEvent::Double) | Event::CaptureRequest => match state {
                SystemState::CameraStandby => self.capture_in_standby(),
                SystemState::VoiceActive => self.capture_during_voice(),
                other => Err(TransitionError::NotAllowed(other).into()),
            },
        };
        result.map(|()| self.state())
    }

    /// Periodic housekeeping: pick up task faults and retry recovery.
    pub fn tick(&mut self) -> SystemState {
        let fault = self
            .session
            .as_ref()
            .and_then(|s| s.tasks.as_ref())
            .and_then(|g| g.take_fault());
        if let Some(code) = fault {
            // Recorded in `last_error`; recovery starts on the next tick.
            let _ = self.on_task_fault(code);
        } else if self.state() == SystemState::Error {
            self.recover();
        }
        self.state()
    }

    // ── Transitions ───────────────────────────────────────────────────

    /// `CameraStandby → VoiceActive`.
    fn enter_voice(&mut self) -> Result<(), Error> {
        let session = match VoiceSession::new(&self.ctx) {
            Ok(s) => s,
            Err(e) => {
                error!(target: "arbiter", "voice session allocation failed: {}", e);
                return Err(TransitionError::Allocation(e).into());
            }
        };
        self.set_state(SystemState::Transitioning);

        let timeout = self.mutex_timeout();
        let mutex = Arc::clone(self.ctx.peripheral_mutex());
        let Some(lease) = mutex.acquire(timeout, &mut self.delay) else {
            warn!(target: "arbiter", "peripheral mutex busy, staying in camera mode");
            self.set_state(SystemState::CameraStandby);
            return Err(TransitionError::MutexTimeout { timeout_ms: timeout }.into());
        };

        if let Err(e) = self.deinit_camera() {
            drop(lease);
            return Err(self.enter_error(e.into()));
        }
        let settle = self.ctx.settle();
        self.settle(settle.after_camera_release_ms);

        if let Err(e) = self.init_audio() {
            if let TransitionError::InitTimeout { .. } = e {
                drop(lease);
                return Err(self.enter_error(e.into()));
            }
            self.settle(settle.before_restore_ms);
            let restored = self.init_camera();
            drop(lease);
            return match restored {
                Ok(()) => {
                    warn!(target: "arbiter", "audio init failed ({}), camera restored", e);
                    self.set_state(SystemState::CameraStandby);
                    Err(rolled_back(e).into())
                }
                Err(restore) => {
                    error!(target: "arbiter", "camera restore failed: {}", restore);
                    Err(self.enter_error(
                        TransitionError::InitFailed {
                            peripheral: Peripheral::Audio,
                            rolled_back: false,
                        }
                        .into(),
                    ))
                }
            };
        }
        drop(lease);

        self.session = Some(session);
        if let Err(e) = self.start_voice_tasks() {
            return Err(self.abandon_voice(e));
        }
        self.set_state(SystemState::VoiceActive);
        self.cue(Cue::Single);
        Ok(())
    }

    /// `VoiceActive → CameraStandby`.
    fn leave_voice(&mut self) -> Result<(), Error> {
        self.set_state(SystemState::Transitioning);
        self.cue(Cue::Double);
        self.drain_playback();
        if let Err(e) = self.quiesce_tasks(true) {
            return Err(self.enter_error(e.into()));
        }

        let timeout = self.mutex_timeout();
        let mutex = Arc::clone(self.ctx.peripheral_mutex());
        let Some(lease) = mutex.acquire(timeout, &mut self.delay) else {
            warn!(target: "arbiter", "peripheral mutex busy, resuming voice");
            return self.resume_voice(TransitionError::MutexTimeout { timeout_ms: timeout });
        };

        if let Err(e) = self.deinit_audio() {
            drop(lease);
            return Err(self.enter_error(e.into()));
        }
        let settle = self.ctx.settle();
        self.settle(settle.after_audio_release_ms);

        if let Err(e) = self.init_camera() {
            self.settle(settle.before_restore_ms);
            let restored = self.init_audio();
            drop(lease);
            return match restored {
                Ok(()) => {
                    warn!(target: "arbiter", "camera init failed ({}), audio restored", e);
                    self.resume_voice(rolled_back(e))
                }
                Err(restore) => {
                    error!(target: "arbiter", "audio restore failed: {}", restore);
                    Err(self.enter_error(
                        TransitionError::InitFailed {
                            peripheral: Peripheral::Camera,
                            rolled_back: false,
                        }
                        .into(),
                    ))
                }
            };
        }
        drop(lease);

        self.release_session();
        self.set_state(SystemState::CameraStandby);
        Ok(())
    }

    /// Photo in camera mode: capture under the mutex, upload after.
    fn capture_in_standby(&mut self) -> Result<(), Error> {
        let timeout = self.mutex_timeout();
        let mutex = Arc::clone(self.ctx.peripheral_mutex());
        let Some(lease) = mutex.acquire(timeout, &mut self.delay) else {
            return Err(TransitionError::MutexTimeout { timeout_ms: timeout }.into());
        };
        self.status.show(Indicator::Capturing);
        let frame = self.camera.capture_frame();
        drop(lease);
        self.status.show(Indicator::for_state(self.state()));
        self.upload(frame);
        Ok(())
    }

    /// Photo in voice mode: pause voice, swap to the camera, capture, swap
    /// back, resume voice, then upload.
    fn capture_during_voice(&mut self) -> Result<(), Error> {
        self.set_state(SystemState::Transitioning);
        if let Err(e) = self.quiesce_tasks(false) {
            return Err(self.enter_error(e.into()));
        }

        let timeout = self.mutex_timeout();
        let mutex = Arc::clone(self.ctx.peripheral_mutex());
        let Some(lease) = mutex.acquire(timeout, &mut self.delay) else {
            warn!(target: "arbiter", "peripheral mutex busy, capture skipped");
            return self.resume_voice(TransitionError::MutexTimeout { timeout_ms: timeout });
        };

        if let Err(e) = self.deinit_audio() {
            drop(lease);
            return Err(self.enter_error(e.into()));
        }
        let settle = self.ctx.settle();
        self.settle(settle.after_audio_release_ms);

        let mut frame = None;
        let mut camera_error = None;
        match self.init_camera() {
            Ok(()) => {
                self.status.show(Indicator::Capturing);
                frame = self.camera.capture_frame();
                if let Err(e) = self.deinit_camera() {
                    drop(lease);
                    return Err(self.enter_error(e.into()));
                }
                self.settle(settle.after_camera_release_ms);
            }
            Err(e) => {
                warn!(target: "arbiter", "camera unavailable for capture: {}", e);
                camera_error = Some(rolled_back(e));
                self.settle(settle.before_restore_ms);
            }
        }

        if let Err(e) = self.init_audio() {
            drop(lease);
            return Err(self.enter_error(e.into()));
        }
        drop(lease);

        if let Err(e) = self.start_voice_tasks() {
            return Err(self.enter_error(e.into()));
        }
        self.set_state(SystemState::VoiceActive);

        if let Some(e) = camera_error {
            self.status.show(Indicator::UploadFailed);
            return Err(e.into());
        }
        if frame.is_some() {
            self.cue(Cue::Single);
        }
        if self.upload(frame) {
            self.cue(Cue::Double);
        }
        Ok(())
    }

    /// Stop everything and release both peripherals. Terminal.
    fn shutdown(&mut self) {
        info!(target: "arbiter", "shutting down");
        self.set_state(SystemState::Transitioning);
        self.drain_playback();
        if let Err(e) = self.quiesce_tasks(true) {
            warn!(target: "arbiter", "{}", e);
        }

        let timeout = self.mutex_timeout();
        let mutex = Arc::clone(self.ctx.peripheral_mutex());
        let lease = mutex.acquire(timeout, &mut self.delay);
        if lease.is_none() {
            error!(target: "arbiter", "shutting down without the peripheral mutex");
        }
        if self.audio.is_initialized() {
            if let Err(e) = self.deinit_audio() {
                error!(target: "arbiter", "{}", e);
            }
        }
        if let Err(e) = self.deinit_camera() {
            error!(target: "arbiter", "{}", e);
        }
        self.release_session();
        drop(lease);
        self.set_state(SystemState::Shutdown);
    }

    // ── Failure handling ──────────────────────────────────────────────

    fn on_task_fault(&mut self, code: FaultCode) -> Result<(), Error> {
        if self.state() != SystemState::VoiceActive {
            debug!(target: "arbiter", "{:?} outside voice mode ignored", code);
            return Ok(());
        }
        error!(target: "arbiter", "voice task fault: {:?}", code);
        self.set_state(SystemState::Transitioning);
        // Recovery lands in camera mode, so the server hears the end of the
        // utterance now while the stream task can still send it.
        if let Err(e) = self.quiesce_tasks(true) {
            warn!(target: "arbiter", "{}", e);
        }
        Err(self.enter_error(TransitionError::TaskFault(code).into()))
    }

    /// One recovery attempt from `Error`: back to camera standby.
    fn recover(&mut self) {
        let max = self.ctx.config().max_recovery_attempts;
        if self.recovery_failures >= max {
            error!(
                target: "arbiter",
                "recovery failed {} times in a row, giving up", self.recovery_failures
            );
            self.shutdown();
            return;
        }
        info!(
            target: "arbiter",
            "recovery attempt {}/{}", self.recovery_failures + 1, max
        );
        self.set_state(SystemState::Transitioning);
        match self.restore_camera_mode() {
            Ok(()) => {
                self.recovery_failures = 0;
                self.last_error = None;
                self.set_state(SystemState::CameraStandby);
            }
            Err(e) => {
                self.recovery_failures = self.recovery_failures.saturating_add(1);
                self.enter_error(e);
            }
        }
    }

    /// Stop voice, release audio if it is up, and bring the camera up.
    fn restore_camera_mode(&mut self) -> Result<(), Error> {
        self.quiesce_tasks(true)?;

        let timeout = self.mutex_timeout();
        let mutex = Arc::clone(self.ctx.peripheral_mutex());
        let lease = mutex
            .acquire(timeout, &mut self.delay)
            .ok_or(TransitionError::MutexTimeout { timeout_ms: timeout })?;

        if self.audio.is_initialized() || self.ctx.ledger().is_up(Peripheral::Audio) {
            self.deinit_audio()?;
            let settle = self.ctx.settle();
            self.settle(settle.after_audio_release_ms);
        }
        if !self.ctx.ledger().is_up(Peripheral::Camera) {
            self.init_camera()?;
        }
        drop(lease);

        self.release_session();
        Ok(())
    }

    /// Voice tasks would not start: hand the hardware back to the camera.
    fn abandon_voice(&mut self, cause: TransitionError) -> Error {
        error!(target: "arbiter", "voice startup abandoned: {}", cause);
        match self.restore_camera_mode() {
            Ok(()) => {
                self.set_state(SystemState::CameraStandby);
                cause.into()
            }
            Err(e) => self.enter_error(e),
        }
    }

    /// Restart voice tasks after an aborted swap. `cause` is still reported.
    fn resume_voice(&mut self, cause: TransitionError) -> Result<(), Error> {
        match self.start_voice_tasks() {
            Ok(()) => {
                self.set_state(SystemState::VoiceActive);
                Err(cause.into())
            }
            Err(e) => Err(self.enter_error(e.into())),
        }
    }

    fn enter_error(&mut self, err: Error) -> Error {
        error!(target: "arbiter", "entering error state: {} ({:?})", err, err.class());
        self.last_error = Some(err.clone());
        self.set_state(SystemState::Error);
        err
    }

    // ── Helpers ───────────────────────────────────────────────────────

    fn set_state(&mut self, next: SystemState) {
        let prev = self.ctx.state();
        self.ctx.set_state(next);
        if prev != next {
            info!(target: "arbiter", "{:?} -> {:?}", prev, next);
        }
        self.status.show(Indicator::for_state(next));
    }

    fn mutex_timeout(&self) -> u32 {
        self.ctx.config().peripheral_mutex_timeout_ms
    }

    fn settle(&mut self, ms: u32) {
        if ms > 0 {
            debug!(target: "arbiter", "settling {} ms", ms);
            self.delay.delay_ms(ms);
        }
    }

    fn init_camera(&mut self) -> Result<(), TransitionError> {
        self.ctx.ledger().ensure_free_for(Peripheral::Camera)?;
        match self.camera.init() {
            Ok(()) => {
                info!(target: "arbiter", "camera up");
                self.ctx.ledger().mark_up(Peripheral::Camera)
            }
            Err(e) => {
                error!(target: "arbiter", "camera init failed: {:?}", e);
                Err(TransitionError::InitFailed {
                    peripheral: Peripheral::Camera,
                    rolled_back: false,
                })
            }
        }
    }

    fn init_audio(&mut self) -> Result<(), TransitionError> {
        self.ctx.ledger().ensure_free_for(Peripheral::Audio)?;
        let err = match self.audio.init(&mut self.delay) {
            Ok(_) => return self.ctx.ledger().mark_up(Peripheral::Audio),
            Err(e) => e,
        };
        if self.audio.is_initialized() {
            // The driver could not be torn down after the failure; the
            // camera stays locked out until a deinit succeeds.
            error!(target: "arbiter", "audio init failed with the driver still installed");
            self.ctx.ledger().mark_up(Peripheral::Audio)?;
        }
        match err {
            DriverError::InitTimeout { .. } => Err(TransitionError::InitTimeout {
                peripheral: Peripheral::Audio,
            }),
            DriverError::Allocation(e) => Err(TransitionError::Allocation(e)),
            e => {
                error!(target: "arbiter", "audio init failed: {}", e);
                Err(TransitionError::InitFailed {
                    peripheral: Peripheral::Audio,
                    rolled_back: false,
                })
            }
        }
    }

    fn deinit_camera(&mut self) -> Result<(), TransitionError> {
        if !self.ctx.ledger().is_up(Peripheral::Camera) {
            return Ok(());
        }
        let attempts = self.ctx.config().deinit_retries.saturating_add(1);
        for attempt in 1..=attempts {
            match self.camera.deinit() {
                Ok(()) => {
                    self.ctx.ledger().mark_down(Peripheral::Camera);
                    info!(target: "arbiter", "camera released");
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        target: "arbiter",
                        "camera deinit attempt {}/{} failed: {:?}", attempt, attempts, e
                    );
                    let drain = self.ctx.settle().dma_drain_ms;
                    self.settle(drain);
                }
            }
        }
        Err(TransitionError::DeinitFailed {
            peripheral: Peripheral::Camera,
            attempts,
        })
    }

    fn deinit_audio(&mut self) -> Result<(), TransitionError> {
        let attempts = self.ctx.config().deinit_retries.saturating_add(1);
        for attempt in 1..=attempts {
            match self.audio.deinit(&mut self.delay) {
                Ok(()) => {
                    self.ctx.ledger().mark_down(Peripheral::Audio);
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        target: "arbiter",
                        "audio deinit attempt {}/{} failed: {}", attempt, attempts, e
                    );
                    let drain = self.ctx.settle().dma_drain_ms;
                    self.settle(drain);
                }
            }
        }
        Err(TransitionError::DeinitFailed {
            peripheral: Peripheral::Audio,
            attempts,
        })
    }

    /// Let queued speech finish before the speaker goes away.
    fn drain_playback(&mut self) {
        let Some(decoder) = self.decoder() else {
            return;
        };
        if !decoder.has_pending_audio() {
            return;
        }
        let timeout = self.ctx.config().playback_drain_timeout_ms;
        info!(target: "arbiter", "waiting up to {} ms for playback to finish", timeout);
        if !decoder.wait_idle(timeout, &mut self.delay) {
            warn!(
                target: "arbiter",
                "{} bytes of playback abandoned", decoder.pending_bytes()
            );
        }
    }

    /// Cancel the voice tasks and wait for all of them to acknowledge.
    fn quiesce_tasks(&mut self, end_session: bool) -> Result<(), TransitionError> {
        let timeout = self.ctx.config().quiesce_timeout_ms;
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };
        let Some(group) = session.tasks.take() else {
            return Ok(());
        };
        match group.quiesce(end_session, timeout, &mut self.delay) {
            Ok(()) => Ok(()),
            Err(remaining) => {
                session.tasks = Some(group);
                Err(TransitionError::QuiesceTimeout {
                    timeout_ms: timeout,
                    remaining,
                })
            }
        }
    }

    fn start_voice_tasks(&mut self) -> Result<(), TransitionError> {
        let state = self.state();
        let Some(session) = self.session.as_mut() else {
            return Err(TransitionError::NotAllowed(state));
        };
        let cfg = self.ctx.config();
        let budget = self.ctx.budget();

        let capture = CaptureTask::new(
            Arc::clone(&self.audio),
            Arc::clone(session.ring()),
            budget,
            cfg,
        )?;
        let stream = StreamTask::new(
            Arc::clone(session.ring()),
            Arc::clone(&self.net),
            self.ctx.link().clone(),
            budget,
            cfg,
        )?;
        let mut player =
            PlaybackTask::new(Arc::clone(&self.audio), Arc::clone(session.decoder()), cfg);
        player.resume(&mut self.delay);

        let group = TaskGroup::new();
        let spawned = spawn_task(
            &mut self.spawner,
            &group,
            CAPTURE_TASK,
            self.delay.clone(),
            move |token, delay| {
                capture.run(token, delay);
            },
        )
        .and_then(|()| {
            spawn_task(
                &mut self.spawner,
                &group,
                STREAM_TASK,
                self.delay.clone(),
                move |token, delay| {
                    stream.run(token, delay);
                },
            )
        })
        .and_then(|()| {
            spawn_task(
                &mut self.spawner,
                &group,
                PLAYBACK_TASK,
                self.delay.clone(),
                move |token, delay| {
                    player.run(token, delay);
                },
            )
        });

        if let Err(e) = spawned {
            let timeout = cfg.quiesce_timeout_ms;
            if group.quiesce(false, timeout, &mut self.delay).is_err() {
                session.tasks = Some(group);
            }
            return Err(e);
        }
        session.tasks = Some(group);
        debug!(target: "arbiter", "voice tasks started");
        Ok(())
    }

    fn release_session(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        // Only safe to touch the playback queue once its consumer is gone.
        if session.tasks.is_none() {
            session.decoder().reset();
        } else {
            warn!(target: "arbiter", "releasing voice session with tasks still running");
        }
    }

    fn upload(&mut self, frame: Option<Vec<u8>>) -> bool {
        let Some(jpeg) = frame else {
            warn!(target: "arbiter", "camera returned no frame");
            self.status.show(Indicator::UploadFailed);
            return false;
        };
        match self.uploader.upload_image(&jpeg) {
            Ok(()) => {
                info!(target: "arbiter", "uploaded {} byte frame", jpeg.len());
                true
            }
            Err(e) => {
                warn!(target: "arbiter", "image upload failed: {:?}", e);
                self.status.show(Indicator::UploadFailed);
                false
            }
        }
    }

    /// Beep through the speaker if voice tasks are running. Earlier
    /// playback gets `CUE_WAIT_MS` to finish; a reply still playing after
    /// that wins and the cue is skipped.
    fn cue(&mut self, cue: Cue) {
        if !self.session.as_ref().is_some_and(VoiceSession::tasks_running) {
            return;
        }
        let Some(decoder) = self.decoder() else {
            return;
        };
        let rate = self.ctx.config().sample_rate;
        if decoder.wait_idle(CUE_WAIT_MS, &mut self.delay)
            && decoder.play_clip(rate, &cue.render(rate))
        {
            debug!(target: "arbiter", "{:?} cue queued", cue);
        } else {
            debug!(target: "arbiter", "{:?} cue skipped, playback busy", cue);
        }
    }
}

/// The same failure, now reported with the previous peripheral restored.
fn rolled_back(e: TransitionError) -> TransitionError {
    match e {
        TransitionError::InitFailed { peripheral, .. } => TransitionError::InitFailed {
            peripheral,
            rolled_back: true,
        },
        other => other,
    }
}

fn spawn_task<S, D, F>(
    spawner: &mut S,
    group: &TaskGroup,
    spec: TaskSpec,
    delay: D,
    body: F,
) -> Result<(), TransitionError>
where
    S: TaskSpawner,
    D: DelayNs + Send + 'static,
    F: FnOnce(CancelToken, D) + Send + 'static,
{
    let (token, guard) = group.enlist();
    let job = Box::new(move || {
        let _guard = guard;
        body(token, delay);
    });
    spawner.spawn(spec, job).map_err(|e| {
        error!(target: "arbiter", "spawning the {} task failed: {:?}", spec.name, e);
        TransitionError::Spawn { task: spec.name }
    })
}
