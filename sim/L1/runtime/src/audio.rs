//! Audio boundary.
//!
//! The runtime never decodes or mixes audio itself. It talks to an
//! [`AudioSink`]: start a cue, get a handle, then adjust gain and rate on
//! that handle. Playback is fire-and-forget and voices may overlap freely.
//!
//! Two sinks ship with the crate: [`NullSink`], which accepts everything and
//! plays nothing, and [`RecordingSink`], which remembers every voice for
//! tests and the headless binary.

use hashbrown::HashSet;
use thiserror::Error;

/// Handle to one playing voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlaybackHandle(pub u64);

impl std::fmt::Display for PlaybackHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Voice({})", self.0)
    }
}

/// Errors from an audio sink.
///
/// None of these are fatal to the frame loop; they are recorded once and
/// otherwise ignored.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    /// No asset is loaded under this cue name.
    #[error("missing audio cue: {0}")]
    MissingCue(String),

    /// The output device refused a new voice.
    #[error("audio device busy")]
    DeviceBusy,

    /// The handle does not refer to a voice this sink started.
    #[error("invalid playback handle: {0}")]
    InvalidHandle(PlaybackHandle),
}

/// Something that can play named cues.
pub trait AudioSink {
    /// Start playing `cue` from the beginning.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybackError::MissingCue`] or [`PlaybackError::DeviceBusy`].
    fn play(&mut self, cue: &str) -> Result<PlaybackHandle, PlaybackError>;

    /// Set the gain of a voice, in `[0, 1]`.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybackError::InvalidHandle`] for an unknown handle.
    fn set_gain(&mut self, handle: PlaybackHandle, gain: f32) -> Result<(), PlaybackError>;

    /// Set the playback rate of a voice (1.0 is normal speed).
    ///
    /// # Errors
    ///
    /// Returns [`PlaybackError::InvalidHandle`] for an unknown handle.
    fn set_rate(&mut self, handle: PlaybackHandle, rate: f32) -> Result<(), PlaybackError>;
}

impl<S: AudioSink + ?Sized> AudioSink for &mut S {
    fn play(&mut self, cue: &str) -> Result<PlaybackHandle, PlaybackError> {
        (**self).play(cue)
    }

    fn set_gain(&mut self, handle: PlaybackHandle, gain: f32) -> Result<(), PlaybackError> {
        (**self).set_gain(handle, gain)
    }

    fn set_rate(&mut self, handle: PlaybackHandle, rate: f32) -> Result<(), PlaybackError> {
        (**self).set_rate(handle, rate)
    }
}

/// Sink that accepts every request and plays nothing.
#[derive(Debug, Clone, Default)]
pub struct NullSink {
    next: u64,
}

impl NullSink {
    /// Create a null sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl AudioSink for NullSink {
    fn play(&mut self, _cue: &str) -> Result<PlaybackHandle, PlaybackError> {
        let handle = PlaybackHandle(self.next);
        self.next += 1;
        Ok(handle)
    }

    fn set_gain(&mut self, _handle: PlaybackHandle, _gain: f32) -> Result<(), PlaybackError> {
        Ok(())
    }

    fn set_rate(&mut self, _handle: PlaybackHandle, _rate: f32) -> Result<(), PlaybackError> {
        Ok(())
    }
}

/// A voice started on a [`RecordingSink`].
#[derive(Debug, Clone, PartialEq)]
pub struct Voice {
    /// Handle returned by `play`.
    pub handle: PlaybackHandle,
    /// Cue name.
    pub cue: String,
    /// Last gain set (1.0 until changed).
    pub gain: f32,
    /// Last rate set (1.0 until changed).
    pub rate: f32,
}

/// Sink that records every voice.
///
/// By default any cue name plays. [`with_cues`](Self::with_cues) restricts
/// it to a known set so missing assets can be exercised, and
/// [`set_busy`](Self::set_busy) makes every `play` fail.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    known: Option<HashSet<String>>,
    busy: bool,
    voices: Vec<Voice>,
}

impl RecordingSink {
    /// Create a sink that plays any cue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Only play these cues; others fail with [`PlaybackError::MissingCue`].
    #[must_use]
    pub fn with_cues<I, S>(mut self, cues: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known = Some(cues.into_iter().map(Into::into).collect());
        self
    }

    /// Make every `play` fail with [`PlaybackError::DeviceBusy`].
    pub fn set_busy(&mut self, busy: bool) {
        self.busy = busy;
    }

    /// Every voice started so far, oldest first.
    #[must_use]
    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    /// Voices started for one cue.
    pub fn voices_for<'a>(&'a self, cue: &'a str) -> impl Iterator<Item = &'a Voice> + 'a {
        self.voices.iter().filter(move |v| v.cue == cue)
    }

    /// Forget recorded voices.
    pub fn clear(&mut self) {
        self.voices.clear();
    }

    fn voice_mut(&mut self, handle: PlaybackHandle) -> Result<&mut Voice, PlaybackError> {
        usize::try_from(handle.0)
            .ok()
            .and_then(|i| self.voices.get_mut(i))
            .filter(|v| v.handle == handle)
            .ok_or(PlaybackError::InvalidHandle(handle))
    }
}

impl AudioSink for RecordingSink {
    fn play(&mut self, cue: &str) -> Result<PlaybackHandle, PlaybackError> {
        if self.busy {
            return Err(PlaybackError::DeviceBusy);
        }
        if self.known.as_ref().is_some_and(|known| !known.contains(cue)) {
            return Err(PlaybackError::MissingCue(cue.to_owned()));
        }

        let handle = PlaybackHandle(self.voices.len() as u64);
        self.voices.push(Voice {
            handle,
            cue: cue.to_owned(),
            gain: 1.0,
            rate: 1.0,
        });
        Ok(handle)
    }

    fn set_gain(&mut self, handle: PlaybackHandle, gain: f32) -> Result<(), PlaybackError> {
        self.voice_mut(handle)?.gain = gain;
        Ok(())
    }

    fn set_rate(&mut self, handle: PlaybackHandle, rate: f32) -> Result<(), PlaybackError> {
        self.voice_mut(handle)?.rate = rate;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn recording_sink_tracks_voices() {
        let mut sink = RecordingSink::new();
        let a = sink.play("hit1").unwrap();
        let b = sink.play("hit1").unwrap();
        sink.set_gain(a, 0.25).unwrap();
        sink.set_rate(b, 2.0).unwrap();

        assert_ne!(a, b, "overlapping voices get their own handles");
        assert_eq!(sink.voices().len(), 2);
        assert_eq!(sink.voices()[0].gain, 0.25);
        assert_eq!(sink.voices()[1].rate, 2.0);
        assert_eq!(sink.voices_for("hit1").count(), 2);
    }

    #[test]
    fn recording_sink_failures() {
        let mut sink = RecordingSink::new().with_cues(["hit1"]);
        assert_eq!(
            sink.play("hit2"),
            Err(PlaybackError::MissingCue("hit2".into()))
        );
        assert_eq!(
            sink.set_gain(PlaybackHandle(7), 0.5),
            Err(PlaybackError::InvalidHandle(PlaybackHandle(7)))
        );

        sink.set_busy(true);
        assert_eq!(sink.play("hit1"), Err(PlaybackError::DeviceBusy));
        assert!(sink.voices().is_empty());
    }

    #[test]
    fn null_sink_accepts_everything() {
        let mut sink = NullSink::new();
        let h = sink.play("anything").unwrap();
        assert!(sink.set_gain(h, 0.3).is_ok());
        assert!(sink.set_rate(PlaybackHandle(999), 0.3).is_ok());
        assert_ne!(sink.play("anything").unwrap(), h);
    }

    #[test]
    fn sinks_work_through_mutable_references() {
        let mut sink = RecordingSink::new();
        {
            let mut borrowed: &mut RecordingSink = &mut sink;
            borrowed.play("bigben").unwrap();
        }
        assert_eq!(sink.voices().len(), 1);
    }
}
