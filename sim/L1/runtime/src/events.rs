//! Collision event bus: contact events in, audio cues out.
//!
//! Every [`ContactEvent`] the world queues is checked against the live
//! velocity threshold. An event whose impact speed is strictly above the
//! threshold plays one cue with gain `min(impact - threshold, 1)`. The check
//! is a pure function of `(impact, threshold)`: no debouncing, no coalescing,
//! and overlapping cues are fine.
//!
//! ```text
//!  World::drain_events ─▶ trigger_gain(impact, threshold) ─▶ CueRouter ─▶ AudioSink
//!                              │ None                                     │ Err
//!                              ▼                                          ▼
//!                       below_threshold += 1                 DiagnosticsLog (Playback)
//! ```

use std::ops::AddAssign;

use clatter_core::{ContactEvent, MaterialId, World};
use hashbrown::HashMap;
use tracing::trace;

use crate::audio::{AudioSink, PlaybackError};
use crate::diagnostics::{DiagnosticsLog, IssueKind};

/// Gain for an impact, or `None` if it does not fire.
///
/// Fires only when `impact > threshold`; the boundary does not fire. The
/// gain is `impact - threshold` clamped to `[0, 1]`. A NaN on either side
/// never fires.
#[must_use]
pub fn trigger_gain(impact: f64, threshold: f64) -> Option<f64> {
    (impact > threshold).then(|| (impact - threshold).clamp(0.0, 1.0))
}

/// Chooses a cue for each contact event.
///
/// A contact that involves a registered surface material plays that
/// surface's cue; every other contact plays the default cue. When both
/// sides are surfaces, the first body's material wins.
#[derive(Debug, Clone)]
pub struct CueRouter {
    default_cue: String,
    surfaces: HashMap<MaterialId, String>,
}

impl CueRouter {
    /// Route everything to `default_cue`.
    #[must_use]
    pub fn new(default_cue: impl Into<String>) -> Self {
        Self {
            default_cue: default_cue.into(),
            surfaces: HashMap::new(),
        }
    }

    /// Route contacts involving `material` to `cue`.
    #[must_use]
    pub fn with_surface(mut self, material: MaterialId, cue: impl Into<String>) -> Self {
        self.surfaces.insert(material, cue.into());
        self
    }

    /// Cue used when no surface matches.
    #[must_use]
    pub fn default_cue(&self) -> &str {
        &self.default_cue
    }

    /// Cue for an event.
    #[must_use]
    pub fn route(&self, event: &ContactEvent) -> &str {
        self.surfaces
            .get(&event.material_a)
            .or_else(|| self.surfaces.get(&event.material_b))
            .map_or(self.default_cue.as_str(), String::as_str)
    }
}

impl Default for CueRouter {
    fn default() -> Self {
        Self::new("hit")
    }
}

/// Outcome of dispatching a batch of events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BusReport {
    /// Cues started.
    pub fired: usize,
    /// Events at or below the threshold.
    pub below_threshold: usize,
    /// Events whose cue could not be played.
    pub failed: usize,
}

impl BusReport {
    /// Events seen.
    #[must_use]
    pub fn total(&self) -> usize {
        self.fired + self.below_threshold + self.failed
    }
}

impl AddAssign for BusReport {
    fn add_assign(&mut self, rhs: Self) {
        self.fired += rhs.fired;
        self.below_threshold += rhs.below_threshold;
        self.failed += rhs.failed;
    }
}

/// Turns contact events into audio cues.
#[derive(Debug, Clone, Default)]
pub struct CollisionEventBus {
    router: CueRouter,
}

impl CollisionEventBus {
    /// Create a bus with a cue router.
    #[must_use]
    pub fn new(router: CueRouter) -> Self {
        Self { router }
    }

    /// The cue router.
    #[must_use]
    pub fn router(&self) -> &CueRouter {
        &self.router
    }

    /// Play a cue for each event above `threshold`.
    ///
    /// Playback errors are recorded in `log` and never stop the batch.
    #[allow(clippy::cast_possible_truncation)]
    pub fn dispatch<'a, I>(
        &self,
        events: I,
        threshold: f64,
        sink: &mut dyn AudioSink,
        log: &mut DiagnosticsLog,
    ) -> BusReport
    where
        I: IntoIterator<Item = &'a ContactEvent>,
    {
        let mut report = BusReport::default();

        for event in events {
            let impact = event.impact();
            let Some(gain) = trigger_gain(impact, threshold) else {
                report.below_threshold += 1;
                continue;
            };

            let cue = self.router.route(event);
            trace!(
                a = %event.body_a,
                b = %event.body_b,
                impact,
                gain,
                cue,
                "impact cue"
            );

            match play_with_gain(sink, cue, gain as f32) {
                Ok(()) => report.fired += 1,
                Err(err) => {
                    log.record(IssueKind::Playback, cue, &err.to_string());
                    report.failed += 1;
                }
            }
        }

        report
    }

    /// Take every event the world has queued and dispatch it.
    pub fn drain(
        &self,
        world: &mut World,
        threshold: f64,
        sink: &mut dyn AudioSink,
        log: &mut DiagnosticsLog,
    ) -> BusReport {
        let events: Vec<ContactEvent> = world.drain_events().collect();
        self.dispatch(&events, threshold, sink, log)
    }
}

fn play_with_gain(sink: &mut dyn AudioSink, cue: &str, gain: f32) -> Result<(), PlaybackError> {
    let handle = sink.play(cue)?;
    sink.set_gain(handle, gain)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::audio::RecordingSink;
    use approx::assert_relative_eq;
    use clatter_core::BodyId;

    const GROUND: MaterialId = MaterialId(0);
    const BOX: MaterialId = MaterialId(1);

    fn event(material_a: MaterialId, material_b: MaterialId, impact_velocity: f64) -> ContactEvent {
        ContactEvent {
            body_a: BodyId::new(0),
            body_b: BodyId::new(1),
            material_a,
            material_b,
            impact_velocity,
            step_index: 0,
        }
    }

    fn router() -> CueRouter {
        CueRouter::new("hit2").with_surface(GROUND, "hit1")
    }

    #[test]
    fn gain_formula() {
        assert_relative_eq!(trigger_gain(1.3, 1.0).unwrap(), 0.3, epsilon = 1e-12);
        assert_eq!(trigger_gain(3.0, 1.0), Some(1.0));
        assert_eq!(trigger_gain(1.0, 1.0), None);
        assert_eq!(trigger_gain(0.5, 1.0), None);
        assert_eq!(trigger_gain(f64::NAN, 1.0), None);
    }

    #[test]
    fn negative_threshold_fires_resting_contacts() {
        assert_eq!(trigger_gain(0.0, -0.5), Some(0.5));
    }

    #[test]
    fn router_prefers_surfaces() {
        let router = router();
        assert_eq!(router.route(&event(GROUND, BOX, -3.0)), "hit1");
        assert_eq!(router.route(&event(BOX, GROUND, -3.0)), "hit1");
        assert_eq!(router.route(&event(BOX, MaterialId(2), -3.0)), "hit2");
        assert_eq!(router.default_cue(), "hit2");
    }

    #[test]
    fn dispatch_plays_cues_above_threshold() {
        let bus = CollisionEventBus::new(router());
        let mut sink = RecordingSink::new();
        let mut log = DiagnosticsLog::new();

        let events = [
            event(GROUND, BOX, -1.25),
            event(BOX, MaterialId(2), -0.4),
            event(BOX, MaterialId(2), -8.0),
        ];
        let report = bus.dispatch(&events, 1.0, &mut sink, &mut log);

        assert_eq!(
            report,
            BusReport {
                fired: 2,
                below_threshold: 1,
                failed: 0
            }
        );
        let voices = sink.voices();
        assert_eq!(voices[0].cue, "hit1");
        assert_relative_eq!(voices[0].gain, 0.25, epsilon = 1e-6);
        assert_eq!(voices[1].cue, "hit2");
        assert_eq!(voices[1].gain, 1.0);
    }

    #[test]
    fn playback_failures_are_recorded_not_fatal() {
        let bus = CollisionEventBus::new(router());
        let mut sink = RecordingSink::new().with_cues(["hit2"]);
        let mut log = DiagnosticsLog::new();

        let events = [
            event(GROUND, BOX, -5.0),
            event(GROUND, BOX, -5.0),
            event(BOX, BOX, -5.0),
        ];
        let report = bus.dispatch(&events, 1.0, &mut sink, &mut log);

        assert_eq!(report.failed, 2);
        assert_eq!(report.fired, 1);
        assert_eq!(report.total(), 3);
        assert_eq!(log.count(IssueKind::Playback, "hit1"), 2);
        assert_eq!(log.distinct(), 1);
    }

    #[test]
    fn reports_accumulate() {
        let mut total = BusReport::default();
        total += BusReport {
            fired: 1,
            below_threshold: 2,
            failed: 0,
        };
        total += BusReport {
            fired: 3,
            below_threshold: 0,
            failed: 1,
        };
        assert_eq!(total.total(), 7);
        assert_eq!(total.fired, 4);
    }
}
