//! Fixed-step catch-up loop.
//!
//! A render callback runs at whatever rate the display allows, but the world
//! only ever advances by its fixed timestep. The [`Stepper`] keeps the
//! leftover wall-clock time in an accumulator and converts it into a whole
//! number of [`World::step`] calls.
//!
//! # Example
//!
//! ```
//! use clatter_core::{Stepper, World};
//!
//! let mut world = World::default();
//! let mut stepper = Stepper::new();
//!
//! // The first frame always takes exactly one step
//! assert_eq!(stepper.advance(&mut world, 0.0, |_, _| {}).unwrap(), 1);
//!
//! // 2.5 increments of wall-clock time: two steps, half an increment left over
//! let dt = world.timestep();
//! assert_eq!(stepper.advance(&mut world, 2.5 * dt, |_, _| {}).unwrap(), 2);
//! assert!((stepper.alpha() - 0.5).abs() < 1e-9);
//! ```

use tracing::debug;

use crate::world::{StepReport, World};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration for the stepper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StepperConfig {
    /// Most steps a single [`Stepper::advance`] may take.
    ///
    /// Time beyond this is dropped rather than carried into later frames,
    /// so a long stall cannot snowball into ever larger catch-up loops.
    pub max_substeps: usize,
}

impl Default for StepperConfig {
    fn default() -> Self {
        Self { max_substeps: 10 }
    }
}

impl StepperConfig {
    /// Set the substep cap.
    #[must_use]
    pub fn with_max_substeps(mut self, max_substeps: usize) -> Self {
        self.max_substeps = max_substeps;
        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidConfig`](crate::SimError::InvalidConfig)
    /// if `max_substeps` is zero.
    pub fn validate(&self) -> crate::Result<()> {
        if self.max_substeps == 0 {
            return Err(crate::SimError::invalid_config(
                "max_substeps must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Converts variable frame times into fixed world steps.
#[derive(Debug, Clone, Default)]
pub struct Stepper {
    config: StepperConfig,
    accumulator: f64,
    dt: f64,
    started: bool,
}

impl Stepper {
    /// Create a stepper with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a stepper with a custom configuration.
    #[must_use]
    pub fn with_config(config: StepperConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Stepper configuration.
    #[must_use]
    pub fn config(&self) -> &StepperConfig {
        &self.config
    }

    /// Wall-clock time not yet consumed by a step, in seconds.
    #[must_use]
    pub fn accumulator(&self) -> f64 {
        self.accumulator
    }

    /// Fraction of a step sitting in the accumulator.
    ///
    /// Reported for diagnostics only; proxies always show the latest step.
    #[must_use]
    pub fn alpha(&self) -> f64 {
        if self.dt > 0.0 {
            self.accumulator / self.dt
        } else {
            0.0
        }
    }

    /// Whether [`advance`](Self::advance) has run at least once.
    #[must_use]
    pub fn has_started(&self) -> bool {
        self.started
    }

    /// Forget accumulated time; the next advance behaves like the first.
    pub fn reset(&mut self) {
        self.accumulator = 0.0;
        self.started = false;
    }

    /// Step `world` to catch up with `elapsed` seconds of wall-clock time.
    ///
    /// The first call takes exactly one step whatever `elapsed` is. Later
    /// calls add `elapsed` to the accumulator and step while a whole
    /// increment is available, up to `max_substeps`. Negative or non-finite
    /// `elapsed` counts as zero.
    ///
    /// `on_substep` runs after every step, before the next one starts, so
    /// that step's events can be drained in order.
    ///
    /// Returns the number of steps taken.
    ///
    /// # Errors
    ///
    /// Returns an error if the world or stepper configuration is invalid, or
    /// if a step diverges. Steps already taken stay applied.
    pub fn advance<F>(
        &mut self,
        world: &mut World,
        elapsed: f64,
        mut on_substep: F,
    ) -> crate::Result<usize>
    where
        F: FnMut(&mut World, StepReport),
    {
        self.config.validate()?;
        world.config().validate()?;
        self.dt = world.timestep();

        if !self.started {
            self.started = true;
            let report = world.step()?;
            on_substep(world, report);
            return Ok(1);
        }

        if elapsed.is_finite() && elapsed > 0.0 {
            self.accumulator += elapsed;
        }

        let mut substeps = 0;
        while self.accumulator >= self.dt && substeps < self.config.max_substeps {
            let report = world.step()?;
            self.accumulator -= self.dt;
            substeps += 1;
            on_substep(world, report);
        }

        if self.accumulator >= self.dt {
            let dropped = self.accumulator - self.accumulator % self.dt;
            debug!(dropped, substeps, "substep cap reached, dropping time");
        }
        self.accumulator %= self.dt;

        Ok(substeps)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::world::CollisionShape;
    use approx::assert_relative_eq;
    use clatter_contact::MaterialRegistry;
    use clatter_types::{Pose, SimulationConfig};
    use nalgebra::Point3;

    fn falling_world() -> World {
        let mut registry = MaterialRegistry::new();
        let m = registry.register("ball");
        let mut world = World::new(SimulationConfig::default());
        world.add_dynamic_body(
            CollisionShape::sphere(0.5),
            1.0,
            Pose::from_position(Point3::new(0.0, 50.0, 0.0)),
            m,
        );
        world
    }

    #[test]
    fn test_first_advance_takes_one_step() {
        let mut world = falling_world();
        let mut stepper = Stepper::new();

        assert!(!stepper.has_started());
        assert_eq!(stepper.advance(&mut world, 5.0, |_, _| {}).unwrap(), 1);
        assert_eq!(world.step_index(), 1);
        // The first frame's elapsed time is not banked
        assert_eq!(stepper.accumulator(), 0.0);
    }

    #[test]
    fn test_catch_up_keeps_remainder() {
        let mut world = falling_world();
        let mut stepper = Stepper::new();
        let dt = world.timestep();
        stepper.advance(&mut world, 0.0, |_, _| {}).unwrap();

        assert_eq!(stepper.advance(&mut world, 0.4 * dt, |_, _| {}).unwrap(), 0);
        assert_eq!(stepper.advance(&mut world, 0.4 * dt, |_, _| {}).unwrap(), 0);
        assert_eq!(stepper.advance(&mut world, 0.4 * dt, |_, _| {}).unwrap(), 1);
        assert_relative_eq!(stepper.alpha(), 0.2, epsilon = 1e-9);
        assert_eq!(world.step_index(), 2);
    }

    #[test]
    fn test_substep_cap_drops_excess_time() {
        let mut world = falling_world();
        let mut stepper = Stepper::with_config(StepperConfig::default().with_max_substeps(4));
        let dt = world.timestep();
        stepper.advance(&mut world, 0.0, |_, _| {}).unwrap();

        let taken = stepper.advance(&mut world, 100.5 * dt, |_, _| {}).unwrap();
        assert_eq!(taken, 4);
        assert!(stepper.accumulator() < dt);
        assert_relative_eq!(stepper.alpha(), 0.5, epsilon = 1e-6);

        // Nothing left to catch up on
        assert_eq!(stepper.advance(&mut world, 0.0, |_, _| {}).unwrap(), 0);
    }

    #[test]
    fn test_invalid_elapsed_counts_as_zero() {
        let mut world = falling_world();
        let mut stepper = Stepper::new();
        stepper.advance(&mut world, 0.0, |_, _| {}).unwrap();

        for elapsed in [-1.0, f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert_eq!(stepper.advance(&mut world, elapsed, |_, _| {}).unwrap(), 0);
            assert_eq!(stepper.accumulator(), 0.0);
        }
    }

    #[test]
    fn test_on_substep_sees_every_step_in_order() {
        let mut world = falling_world();
        let mut stepper = Stepper::new();
        let dt = world.timestep();

        let mut seen = Vec::new();
        stepper
            .advance(&mut world, 0.0, |w, r| seen.push((r.step_index, w.step_index())))
            .unwrap();
        stepper
            .advance(&mut world, 3.0 * dt + 1e-9, |w, r| {
                seen.push((r.step_index, w.step_index()));
            })
            .unwrap();

        assert_eq!(seen, vec![(0, 1), (1, 2), (2, 3), (3, 4)]);
    }

    #[test]
    fn test_frame_pattern_matches_direct_stepping() {
        let mut driven = falling_world();
        let mut stepper = Stepper::new();
        let frames = [0.0, 0.013, 0.021, 0.0, 0.05, 0.016, 0.2, 0.001, 0.033];

        let mut total = 0;
        for elapsed in frames {
            total += stepper.advance(&mut driven, elapsed, |_, _| {}).unwrap();
        }

        let mut direct = falling_world();
        direct.run_steps(total).unwrap();

        let a: Vec<_> = driven.bodies().map(|b| b.state).collect();
        let b: Vec<_> = direct.bodies().map(|b| b.state).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_zero_substep_cap_is_rejected() {
        let mut world = falling_world();
        let mut stepper = Stepper::with_config(StepperConfig::default().with_max_substeps(0));
        assert!(stepper.advance(&mut world, 1.0, |_, _| {}).is_err());
        assert_eq!(world.step_index(), 0);
    }

    #[test]
    fn test_reset() {
        let mut world = falling_world();
        let dt = world.timestep();
        let mut stepper = Stepper::new();
        stepper.advance(&mut world, 0.0, |_, _| {}).unwrap();
        stepper.advance(&mut world, 0.5 * dt, |_, _| {}).unwrap();
        assert!(stepper.accumulator() > 0.0);

        stepper.reset();
        assert!(!stepper.has_started());
        assert_eq!(stepper.accumulator(), 0.0);
        assert_eq!(stepper.advance(&mut world, 0.0, |_, _| {}).unwrap(), 1);
    }
}
