//! Frame statistics and record-once issue log.

use hashbrown::HashMap;
use tracing::warn;

/// Category of a non-fatal issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IssueKind {
    /// Missing contact-material entry; the default material was used.
    Configuration,
    /// An audio cue could not be played.
    Playback,
}

impl std::fmt::Display for IssueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration => write!(f, "configuration"),
            Self::Playback => write!(f, "playback"),
        }
    }
}

/// Record-once registry of non-fatal issues.
///
/// The first occurrence of each `(kind, key)` logs a warning. Every
/// occurrence is counted. Nothing is retried.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticsLog {
    counts: HashMap<(IssueKind, String), u64>,
}

impl DiagnosticsLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an occurrence. Returns `true` the first time `(kind, key)` is
    /// seen.
    pub fn record(&mut self, kind: IssueKind, key: &str, detail: &str) -> bool {
        let count = self.counts.entry((kind, key.to_owned())).or_insert(0);
        *count += 1;
        let first = *count == 1;
        if first {
            warn!(%kind, key, detail, "issue recorded");
        }
        first
    }

    /// Occurrences of one issue.
    #[must_use]
    pub fn count(&self, kind: IssueKind, key: &str) -> u64 {
        self.counts
            .get(&(kind, key.to_owned()))
            .copied()
            .unwrap_or(0)
    }

    /// Occurrences of every issue of a kind.
    #[must_use]
    pub fn total(&self, kind: IssueKind) -> u64 {
        self.counts
            .iter()
            .filter(|((k, _), _)| *k == kind)
            .map(|(_, n)| n)
            .sum()
    }

    /// Number of distinct issues recorded.
    #[must_use]
    pub fn distinct(&self) -> usize {
        self.counts.len()
    }
}

/// Smoothing factor for the FPS moving average.
const FPS_SMOOTHING: f64 = 0.1;

/// Per-frame counters.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameStats {
    /// Frames recorded.
    pub frames: u64,
    /// Fixed steps taken across all frames.
    pub total_substeps: u64,
    /// Fixed steps taken by the last frame.
    pub last_substeps: usize,
    /// Exponentially smoothed frames per second. Zero until a frame with a
    /// positive elapsed time is recorded.
    pub fps: f64,
}

impl FrameStats {
    /// Record a frame that took `elapsed` seconds and ran `substeps` steps.
    pub fn record_frame(&mut self, elapsed: f64, substeps: usize) {
        self.frames += 1;
        self.total_substeps += substeps as u64;
        self.last_substeps = substeps;

        if elapsed.is_finite() && elapsed > 0.0 {
            let instant = 1.0 / elapsed;
            self.fps = if self.fps == 0.0 {
                instant
            } else {
                self.fps + FPS_SMOOTHING * (instant - self.fps)
            };
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn issues_are_counted_but_reported_once() {
        let mut log = DiagnosticsLog::new();
        assert!(log.record(IssueKind::Playback, "hit1", "missing"));
        assert!(!log.record(IssueKind::Playback, "hit1", "missing"));
        assert!(log.record(IssueKind::Configuration, "hit1", "same key, other kind"));
        assert!(log.record(IssueKind::Playback, "hit2", "busy"));

        assert_eq!(log.count(IssueKind::Playback, "hit1"), 2);
        assert_eq!(log.total(IssueKind::Playback), 3);
        assert_eq!(log.count(IssueKind::Configuration, "nope"), 0);
        assert_eq!(log.distinct(), 3);
    }

    #[test]
    fn fps_is_smoothed() {
        let mut stats = FrameStats::default();
        stats.record_frame(0.0, 1);
        assert_eq!(stats.fps, 0.0);

        stats.record_frame(1.0 / 60.0, 1);
        assert_relative_eq!(stats.fps, 60.0, epsilon = 1e-9);

        stats.record_frame(1.0 / 30.0, 2);
        assert_relative_eq!(stats.fps, 57.0, epsilon = 1e-9);

        assert_eq!(stats.frames, 3);
        assert_eq!(stats.total_substeps, 4);
        assert_eq!(stats.last_substeps, 2);
    }
}
