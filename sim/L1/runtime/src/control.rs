//! Live-tunable parameters and one-shot commands.
//!
//! [`ControlState`] is a blackboard of independent `f64` fields, each with a
//! declared range and step for whatever control surface edits it. Values are
//! stored as bits in `AtomicU64`s, so a control surface on another thread
//! writes without locking and the frame loop reads the latest value at the
//! start of each use. Ranges are advisory: the store accepts any value.
//!
//! Commands (`play_half`, `play_normal`, `play_double`) go through a
//! single-writer/single-reader channel and run once, at the start of the
//! next frame.
//!
//! ```text
//!  control surface thread          frame loop thread
//!  ──────────────────────          ─────────────────
//!  set_field("camera_y", 4.0) ──▶  ControlState (atomics) ──▶ camera, bus
//!  invoke("play_half")        ──▶  CommandReceiver::drain ──▶ audio sink
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};

use glam::Vec3;
use thiserror::Error;

/// Errors from the control surface.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ControlError {
    /// No field has this name.
    #[error("unknown control field: {0}")]
    UnknownField(String),

    /// No command has this name.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// The frame loop dropped its command receiver.
    #[error("command channel closed")]
    Disconnected,
}

/// Declared range of a control field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec {
    /// Field name as control surfaces see it.
    pub name: &'static str,
    /// Lower end of the suggested range.
    pub min: f64,
    /// Upper end of the suggested range.
    pub max: f64,
    /// Suggested increment.
    pub step: f64,
    /// Initial value.
    pub default: f64,
}

/// A control field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// Camera position X.
    CameraX,
    /// Camera position Y.
    CameraY,
    /// Camera position Z.
    CameraZ,
    /// Impact speed (m/s) a contact must exceed to play a cue.
    VelocityThreshold,
}

static FIELD_SPECS: [FieldSpec; 4] = [
    FieldSpec {
        name: "camera_x",
        min: -10.0,
        max: 10.0,
        step: 0.01,
        default: 3.0,
    },
    FieldSpec {
        name: "camera_y",
        min: -10.0,
        max: 10.0,
        step: 0.01,
        default: 10.0,
    },
    FieldSpec {
        name: "camera_z",
        min: -10.0,
        max: 10.0,
        step: 0.01,
        default: 4.0,
    },
    FieldSpec {
        name: "velocity_threshold",
        min: 0.0,
        max: 20.0,
        step: 0.01,
        default: 1.0,
    },
];

impl Field {
    /// Every field, in declaration order.
    pub const ALL: [Self; 4] = [
        Self::CameraX,
        Self::CameraY,
        Self::CameraZ,
        Self::VelocityThreshold,
    ];

    const fn index(self) -> usize {
        match self {
            Self::CameraX => 0,
            Self::CameraY => 1,
            Self::CameraZ => 2,
            Self::VelocityThreshold => 3,
        }
    }

    /// Declared range and default.
    #[must_use]
    pub fn spec(self) -> &'static FieldSpec {
        &FIELD_SPECS[self.index()]
    }

    /// Field name.
    #[must_use]
    pub fn name(self) -> &'static str {
        self.spec().name
    }

    /// Look up a field by name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }
}

/// A one-shot action requested by the control surface.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Play a cue at a playback rate.
    PlayCue {
        /// Cue name.
        cue: String,
        /// Playback rate (1.0 is normal speed).
        rate: f32,
    },
}

/// Cue the playback commands use.
pub const COMMAND_CUE: &str = "bigben";

/// Names of the built-in commands.
pub const COMMAND_NAMES: [&str; 3] = ["play_half", "play_normal", "play_double"];

impl Command {
    /// Built-in command by name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let rate = match name {
            "play_half" => 0.5,
            "play_normal" => 1.0,
            "play_double" => 2.0,
            _ => return None,
        };
        Some(Self::PlayCue {
            cue: COMMAND_CUE.to_owned(),
            rate,
        })
    }
}

/// Shared parameter store.
#[derive(Debug)]
pub struct ControlState {
    values: [AtomicU64; 4],
}

impl Default for ControlState {
    fn default() -> Self {
        Self {
            values: Field::ALL.map(|f| AtomicU64::new(f.spec().default.to_bits())),
        }
    }
}

impl ControlState {
    /// Create a store holding every field's default.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store ready to share between threads.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Declared fields.
    #[must_use]
    pub fn fields() -> &'static [FieldSpec] {
        &FIELD_SPECS
    }

    /// Current value of a field.
    #[must_use]
    pub fn get(&self, field: Field) -> f64 {
        f64::from_bits(self.values[field.index()].load(Ordering::Relaxed))
    }

    /// Write a field. Any value is accepted, including out-of-range ones.
    pub fn set(&self, field: Field, value: f64) {
        self.values[field.index()].store(value.to_bits(), Ordering::Relaxed);
    }

    /// Read a field by name.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::UnknownField`] for an unknown name.
    pub fn field(&self, name: &str) -> Result<f64, ControlError> {
        Field::from_name(name)
            .map(|f| self.get(f))
            .ok_or_else(|| ControlError::UnknownField(name.to_owned()))
    }

    /// Write a field by name.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::UnknownField`] for an unknown name.
    pub fn set_field(&self, name: &str, value: f64) -> Result<(), ControlError> {
        let field =
            Field::from_name(name).ok_or_else(|| ControlError::UnknownField(name.to_owned()))?;
        self.set(field, value);
        Ok(())
    }

    /// Camera position from `camera_x/y/z`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn camera_position(&self) -> Vec3 {
        Vec3::new(
            self.get(Field::CameraX) as f32,
            self.get(Field::CameraY) as f32,
            self.get(Field::CameraZ) as f32,
        )
    }

    /// Impact speed a contact must exceed to play a cue.
    #[must_use]
    pub fn velocity_threshold(&self) -> f64 {
        self.get(Field::VelocityThreshold)
    }

    /// Set the impact threshold.
    pub fn set_velocity_threshold(&self, value: f64) {
        self.set(Field::VelocityThreshold, value);
    }

    /// Restore every default.
    pub fn reset(&self) {
        for field in Field::ALL {
            self.set(field, field.spec().default);
        }
    }
}

/// Create the command channel: the sender goes to the control surface, the
/// receiver to the frame driver.
#[must_use]
pub fn command_channel() -> (CommandSender, CommandReceiver) {
    let (tx, rx) = mpsc::channel();
    (CommandSender { tx }, CommandReceiver { rx })
}

/// Writing end of the command channel.
#[derive(Debug)]
pub struct CommandSender {
    tx: Sender<Command>,
}

impl CommandSender {
    /// Queue a command for the next frame.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::Disconnected`] if the receiver is gone.
    pub fn send(&self, command: Command) -> Result<(), ControlError> {
        self.tx.send(command).map_err(|_| ControlError::Disconnected)
    }

    /// Queue a built-in command by name.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::UnknownCommand`] for an unknown name, or
    /// [`ControlError::Disconnected`] if the receiver is gone.
    pub fn invoke(&self, name: &str) -> Result<(), ControlError> {
        let command =
            Command::from_name(name).ok_or_else(|| ControlError::UnknownCommand(name.to_owned()))?;
        self.send(command)
    }
}

/// Reading end of the command channel.
#[derive(Debug)]
pub struct CommandReceiver {
    rx: Receiver<Command>,
}

impl CommandReceiver {
    /// Take every queued command without blocking, oldest first.
    pub fn drain(&self) -> impl Iterator<Item = Command> + '_ {
        self.rx.try_iter()
    }
}
