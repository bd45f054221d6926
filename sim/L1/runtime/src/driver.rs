//! Frame driver: the per-frame callback that ties everything together.
//!
//! The driver starts [`DriverState::Idle`] and enters
//! [`DriverState::Running`] on its first frame. There is no stopped state;
//! the host just stops calling [`FrameDriver::frame`].
//!
//! One frame, in order:
//!
//! 1. run the commands queued since the last frame
//! 2. step the world to catch up with wall-clock time, draining contact
//!    events into the audio sink after every single step
//! 3. copy body poses into their proxies
//! 4. move the camera to the position held by the control state
//! 5. draw once from an immutable [`FrameView`]
//! 6. update frame statistics
//!
//! Nothing that goes wrong inside a frame stops the loop. A failed step is
//! logged and reported in [`FrameReport::step_error`], the frame still
//! draws, and the next frame tries again.

use std::sync::Arc;
use std::time::Instant;

use clatter_core::{SimError, Stepper, StepperConfig, World};
use tracing::{debug, info, warn};

use crate::audio::AudioSink;
use crate::camera::Camera;
use crate::control::{Command, CommandReceiver, ControlState};
use crate::diagnostics::{DiagnosticsLog, FrameStats, IssueKind};
use crate::events::{BusReport, CollisionEventBus};
use crate::scene::Scene;
use crate::sync::{SyncReport, Synchronizer, VisualProxy};

/// Lifecycle state of a [`FrameDriver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DriverState {
    /// Assembled, no frame run yet.
    #[default]
    Idle,
    /// At least one frame has run.
    Running,
}

/// Output surface size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Viewport {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// Frame driver configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DriverConfig {
    /// Catch-up loop settings.
    pub stepper: StepperConfig,
    /// Initial output size.
    pub viewport: Viewport,
}

impl DriverConfig {
    /// Set the catch-up loop settings.
    #[must_use]
    pub fn with_stepper(mut self, stepper: StepperConfig) -> Self {
        self.stepper = stepper;
        self
    }

    /// Set the initial output size.
    #[must_use]
    pub fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport = Viewport { width, height };
        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the stepper config is invalid or the viewport is
    /// empty.
    pub fn validate(&self) -> clatter_core::Result<()> {
        self.stepper.validate()?;
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(SimError::invalid_config("viewport must be non-empty"));
        }
        Ok(())
    }
}

/// Source of frame timestamps, in seconds.
pub trait FrameClock {
    /// Current time. Must not go backwards.
    fn now(&mut self) -> f64;
}

/// Clock that advances by a fixed interval each time it is read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ManualClock {
    time: f64,
    interval: f64,
}

impl ManualClock {
    /// Start at zero and advance `interval` seconds per read.
    #[must_use]
    pub fn new(interval: f64) -> Self {
        Self {
            time: 0.0,
            interval,
        }
    }

    /// A clock ticking at `fps` frames per second.
    #[must_use]
    pub fn at_fps(fps: f64) -> Self {
        Self::new(1.0 / fps)
    }

    /// Add extra time before the next read, e.g. to simulate a stall.
    pub fn advance(&mut self, seconds: f64) {
        self.time += seconds;
    }

    /// Change the per-read interval.
    pub fn set_interval(&mut self, interval: f64) {
        self.interval = interval;
    }
}

impl FrameClock for ManualClock {
    fn now(&mut self) -> f64 {
        let now = self.time;
        self.time += self.interval;
        now
    }
}

/// Wall clock measured from construction.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    /// Start counting from now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameClock for SystemClock {
    fn now(&mut self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

/// Read-only view handed to the renderer.
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    /// Proxies with this frame's transforms.
    pub proxies: &'a [VisualProxy],
    /// Camera for this frame.
    pub camera: &'a Camera,
    /// Frame number, starting at 0.
    pub frame: u64,
    /// Simulated time.
    pub time: f64,
}

/// Something that draws a frame.
pub trait Renderer {
    /// Draw one frame. Must not mutate simulation state.
    fn draw(&mut self, view: &FrameView<'_>);

    /// The output surface changed size.
    fn resize(&mut self, _width: u32, _height: u32) {}
}

/// Renderer that draws nothing and remembers what it was asked to draw.
#[derive(Debug, Clone, Default)]
pub struct HeadlessRenderer {
    /// Frames drawn.
    pub draws: u64,
    /// Camera of the last frame drawn.
    pub last_camera: Option<Camera>,
    /// Proxies in the last frame drawn.
    pub last_proxies: Vec<VisualProxy>,
}

impl HeadlessRenderer {
    /// Create a headless renderer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Renderer for HeadlessRenderer {
    fn draw(&mut self, view: &FrameView<'_>) {
        self.draws += 1;
        self.last_camera = Some(*view.camera);
        self.last_proxies.clear();
        self.last_proxies.extend_from_slice(view.proxies);
    }
}

/// What one frame did.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    /// Frame number, starting at 0.
    pub frame: u64,
    /// Wall-clock seconds since the previous frame (0 for the first).
    pub elapsed: f64,
    /// Fixed steps taken.
    pub substeps: usize,
    /// Commands executed.
    pub commands: usize,
    /// Contact events dispatched across all substeps.
    pub bus: BusReport,
    /// Proxy synchronization result.
    pub sync: SyncReport,
    /// Error that cut the catch-up loop short, if any.
    pub step_error: Option<SimError>,
}

/// Totals over several frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    /// Frames run.
    pub frames: u64,
    /// Fixed steps taken.
    pub substeps: usize,
    /// Commands executed.
    pub commands: usize,
    /// Contact events dispatched.
    pub bus: BusReport,
    /// Frames whose catch-up loop failed.
    pub step_errors: usize,
}

/// The per-frame callback and everything it owns.
#[derive(Debug)]
pub struct FrameDriver<S: AudioSink, R: Renderer> {
    state: DriverState,
    world: World,
    synchronizer: Synchronizer,
    bus: CollisionEventBus,
    control: Arc<ControlState>,
    commands: CommandReceiver,
    sink: S,
    renderer: R,
    stepper: Stepper,
    camera: Camera,
    viewport: Viewport,
    diagnostics: DiagnosticsLog,
    stats: FrameStats,
    last_time: Option<f64>,
    frame: u64,
}

impl<S: AudioSink, R: Renderer> FrameDriver<S, R> {
    /// Assemble a driver around a scene.
    ///
    /// Material pairs that can collide but have no table entry are recorded
    /// as configuration issues up front; they fall back to the default
    /// material at run time.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` or the world's configuration is invalid.
    pub fn new(
        scene: Scene,
        control: Arc<ControlState>,
        commands: CommandReceiver,
        sink: S,
        renderer: R,
        config: DriverConfig,
    ) -> clatter_core::Result<Self> {
        config.validate()?;
        let Scene {
            world,
            synchronizer,
            router,
            materials,
        } = scene;
        world.validate()?;

        let mut diagnostics = DiagnosticsLog::new();
        for pair in world.missing_material_pairs() {
            let (a, b) = pair.ids();
            let detail = format!(
                "no contact material for {} / {}, using default",
                materials.name(a).unwrap_or("?"),
                materials.name(b).unwrap_or("?")
            );
            diagnostics.record(IssueKind::Configuration, &pair.to_string(), &detail);
        }

        let mut camera = Camera::for_viewport(config.viewport.width, config.viewport.height);
        camera.update_from(&control);

        Ok(Self {
            state: DriverState::Idle,
            world,
            synchronizer,
            bus: CollisionEventBus::new(router),
            control,
            commands,
            sink,
            renderer,
            stepper: Stepper::with_config(config.stepper),
            camera,
            viewport: config.viewport,
            diagnostics,
            stats: FrameStats::default(),
            last_time: None,
            frame: 0,
        })
    }

    /// Run one frame for the frame-clock timestamp `now` (seconds).
    pub fn frame(&mut self, now: f64) -> FrameReport {
        if self.state == DriverState::Idle {
            self.state = DriverState::Running;
            info!(
                bodies = self.world.body_count(),
                proxies = self.synchronizer.proxies().len(),
                "frame driver running"
            );
        }

        // f64::max discards NaN
        let elapsed = self.last_time.map_or(0.0, |prev| (now - prev).max(0.0));
        self.last_time = Some(now);

        let commands = self.run_commands();

        let mut bus = BusReport::default();
        let Self {
            world,
            stepper,
            bus: event_bus,
            control,
            sink,
            diagnostics,
            ..
        } = &mut *self;
        let stepped = stepper.advance(world, elapsed, |world, _| {
            bus += event_bus.drain(
                world,
                control.velocity_threshold(),
                &mut *sink,
                &mut *diagnostics,
            );
        });
        let (substeps, step_error) = match stepped {
            Ok(n) => (n, None),
            Err(err) => {
                warn!(frame = self.frame, error = %err, "catch-up loop failed, frame continues");
                (0, Some(err))
            }
        };

        let sync = self.synchronizer.sync(&self.world);
        self.camera.update_from(&self.control);

        let view = FrameView {
            proxies: self.synchronizer.proxies(),
            camera: &self.camera,
            frame: self.frame,
            time: self.world.time(),
        };
        self.renderer.draw(&view);

        self.stats.record_frame(elapsed, substeps);
        debug!(
            frame = self.frame,
            elapsed,
            substeps,
            fired = bus.fired,
            alpha = self.stepper.alpha(),
            "frame"
        );

        let report = FrameReport {
            frame: self.frame,
            elapsed,
            substeps,
            commands,
            bus,
            sync,
            step_error,
        };
        self.frame += 1;
        report
    }

    /// Run `frames` frames, reading a timestamp from `clock` for each.
    pub fn run_frames<C: FrameClock + ?Sized>(&mut self, clock: &mut C, frames: u64) -> RunSummary {
        let mut summary = RunSummary::default();
        for _ in 0..frames {
            let report = self.frame(clock.now());
            summary.frames += 1;
            summary.substeps += report.substeps;
            summary.commands += report.commands;
            summary.bus += report.bus;
            if report.step_error.is_some() {
                summary.step_errors += 1;
            }
        }
        summary
    }

    /// The output surface changed size. Only the aspect ratio follows.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.viewport = Viewport { width, height };
        self.camera.set_aspect(width, height);
        self.renderer.resize(width, height);
        debug!(width, height, aspect = self.camera.aspect, "viewport resized");
    }

    fn run_commands(&mut self) -> usize {
        let mut executed = 0;
        for command in self.commands.drain() {
            executed += 1;
            match command {
                Command::PlayCue { cue, rate } => {
                    let played = self
                        .sink
                        .play(&cue)
                        .and_then(|handle| self.sink.set_rate(handle, rate));
                    if let Err(err) = played {
                        self.diagnostics
                            .record(IssueKind::Playback, &cue, &err.to_string());
                    } else {
                        debug!(cue = cue.as_str(), rate, "command cue played");
                    }
                }
            }
        }
        executed
    }

    /// Lifecycle state.
    #[must_use]
    pub fn state(&self) -> DriverState {
        self.state
    }

    /// The physics world.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Mutable access to the world, e.g. to push a body between frames.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Proxies and their bindings.
    #[must_use]
    pub fn synchronizer(&self) -> &Synchronizer {
        &self.synchronizer
    }

    /// The event bus.
    #[must_use]
    pub fn bus(&self) -> &CollisionEventBus {
        &self.bus
    }

    /// Shared control state.
    #[must_use]
    pub fn control(&self) -> &Arc<ControlState> {
        &self.control
    }

    /// The audio sink.
    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Mutable access to the audio sink.
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// The renderer.
    #[must_use]
    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Camera as of the last frame.
    #[must_use]
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Current output size.
    #[must_use]
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// The catch-up loop.
    #[must_use]
    pub fn stepper(&self) -> &Stepper {
        &self.stepper
    }

    /// Recorded issues.
    #[must_use]
    pub fn diagnostics(&self) -> &DiagnosticsLog {
        &self.diagnostics
    }

    /// Frame statistics.
    #[must_use]
    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    /// Frames run so far.
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame
    }
}
