//! Frame-loop runtime for clatter.
//!
//! This crate is **Layer 1**: it wraps a Layer 0 [`World`](clatter_core::World)
//! in the per-frame callback a host application calls once per display
//! refresh, and connects it to the outside world through three boundaries:
//! an audio sink, a renderer, and a shared control state.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────── FrameDriver::frame ────────────────────────────┐
//! │                                                                            │
//! │  commands ─▶ Stepper::advance ─────────────▶ Synchronizer ─▶ Camera ─▶ draw │
//! │     │          │ after every step                 │             ▲          │
//! │     │          ▼                                  ▼             │          │
//! │     │   CollisionEventBus ─▶ CueRouter     VisualProxy[]        │          │
//! │     ▼          │                                                │          │
//! │  AudioSink ◀───┘                                                │          │
//! └─────────────────────────────────────────────────────────────────┼──────────┘
//!        ▲                                                          │
//!        │ command channel            ControlState (atomics) ───────┘
//!        └────────────── control surface (any thread) ──────────────┘
//! ```
//!
//! # Design Philosophy
//!
//! - The world stays the source of truth; proxies are copies, never inputs
//! - No interpolation: a proxy shows the latest fixed step
//! - Nothing inside a frame is fatal; issues are recorded once and counted
//!
//! # Example
//!
//! ```
//! use clatter_runtime::prelude::*;
//!
//! let scene = Scene::build(SceneKind::Drop).unwrap();
//! let control = ControlState::shared();
//! let (commands, receiver) = command_channel();
//! let mut driver = FrameDriver::new(
//!     scene,
//!     control.clone(),
//!     receiver,
//!     RecordingSink::new(),
//!     HeadlessRenderer::new(),
//!     DriverConfig::default(),
//! )
//! .unwrap();
//!
//! commands.invoke("play_double").unwrap();
//! let summary = driver.run_frames(&mut ManualClock::at_fps(60.0), 300);
//!
//! assert_eq!(summary.commands, 1);
//! assert!(summary.bus.fired > 0, "the box hit the ground at least once");
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(clippy::missing_const_for_fn, clippy::module_name_repetitions)]

pub mod audio;
pub mod camera;
pub mod control;
pub mod convert;
pub mod diagnostics;
pub mod driver;
pub mod events;
pub mod scene;
pub mod sync;

pub use audio::{AudioSink, NullSink, PlaybackError, PlaybackHandle, RecordingSink, Voice};
pub use camera::Camera;
pub use control::{
    Command, CommandReceiver, CommandSender, ControlError, ControlState, Field, FieldSpec,
    command_channel,
};
pub use diagnostics::{DiagnosticsLog, FrameStats, IssueKind};
pub use driver::{
    DriverConfig, DriverState, FrameClock, FrameDriver, FrameReport, FrameView,
    HeadlessRenderer, ManualClock, Renderer, RunSummary, SystemClock, Viewport,
};
pub use events::{BusReport, CollisionEventBus, CueRouter, trigger_gain};
pub use scene::{Scene, SceneKind};
pub use sync::{ProxyBindings, ProxyId, ProxyShape, SyncReport, Synchronizer, Transform, VisualProxy};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::audio::{AudioSink, NullSink, RecordingSink};
    pub use crate::camera::Camera;
    pub use crate::control::{ControlState, Field, command_channel};
    pub use crate::driver::{
        DriverConfig, DriverState, FrameClock, FrameDriver, HeadlessRenderer, ManualClock,
        Renderer, SystemClock,
    };
    pub use crate::events::{CollisionEventBus, CueRouter};
    pub use crate::scene::{Scene, SceneKind};
    pub use crate::sync::Synchronizer;
}
