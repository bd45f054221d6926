//! Configuration types for simulation.
//!
//! This module provides configuration types that control how the world
//! steps: fixed timestep, gravity, damping, velocity limits and the contact
//! solver.

use crate::dynamics::Gravity;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Main configuration for a simulation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SimulationConfig {
    /// Fixed timestep for physics integration (seconds).
    pub timestep: f64,
    /// Gravity configuration.
    pub gravity: Gravity,
    /// Solver configuration.
    pub solver: SolverConfig,
    /// Linear velocity damping (fraction lost per second).
    pub linear_damping: f64,
    /// Angular velocity damping (fraction lost per second).
    pub angular_damping: f64,
    /// Maximum linear speed (m/s).
    pub max_linear_velocity: f64,
    /// Maximum angular speed (rad/s).
    pub max_angular_velocity: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            timestep: 1.0 / 60.0,
            gravity: Gravity::earth(),
            solver: SolverConfig::default(),
            linear_damping: 0.01,
            angular_damping: 0.01,
            max_linear_velocity: 100.0,
            max_angular_velocity: 100.0,
        }
    }
}

impl SimulationConfig {
    /// Create a new simulation config with the given timestep.
    #[must_use]
    pub fn with_timestep(timestep: f64) -> Self {
        Self {
            timestep,
            ..Default::default()
        }
    }

    /// Create a configuration for display-rate simulation (60 Hz).
    #[must_use]
    pub fn realtime() -> Self {
        Self::default()
    }

    /// Create a configuration for high-fidelity simulation (240 Hz).
    #[must_use]
    pub fn high_fidelity() -> Self {
        Self {
            timestep: 1.0 / 240.0,
            solver: SolverConfig::high_accuracy(),
            ..Default::default()
        }
    }

    /// Set the gravity.
    #[must_use]
    pub fn gravity(mut self, gravity: Gravity) -> Self {
        self.gravity = gravity;
        self
    }

    /// Disable gravity (zero-G environment).
    #[must_use]
    pub fn zero_gravity(mut self) -> Self {
        self.gravity = Gravity::zero();
        self
    }

    /// Set the solver configuration.
    #[must_use]
    pub fn solver(mut self, solver: SolverConfig) -> Self {
        self.solver = solver;
        self
    }

    /// Set linear and angular damping.
    #[must_use]
    pub fn damping(mut self, linear: f64, angular: f64) -> Self {
        self.linear_damping = linear;
        self.angular_damping = angular;
        self
    }

    /// Disable damping entirely.
    #[must_use]
    pub fn undamped(self) -> Self {
        self.damping(0.0, 0.0)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> crate::Result<()> {
        if self.timestep <= 0.0 || !self.timestep.is_finite() {
            return Err(crate::SimError::InvalidTimestep(self.timestep));
        }

        if !self.gravity.is_finite() {
            return Err(crate::SimError::invalid_config("gravity must be finite"));
        }

        if self.linear_damping < 0.0 || self.angular_damping < 0.0 {
            return Err(crate::SimError::invalid_config(
                "damping cannot be negative",
            ));
        }

        if self.max_linear_velocity <= 0.0 || self.max_angular_velocity <= 0.0 {
            return Err(crate::SimError::invalid_config(
                "velocity limits must be positive",
            ));
        }

        self.solver.validate()
    }
}

/// Configuration for the contact solver.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SolverConfig {
    /// Number of sequential-impulse passes over all contacts per step.
    pub velocity_iterations: usize,
    /// Approach speed below which restitution is ignored (m/s).
    ///
    /// Without it a resting body keeps bouncing on the gravity it gains
    /// in a single step.
    pub restitution_threshold: f64,
    /// Penetration left in place by the penetration push (m).
    pub contact_slop: f64,
    /// Fraction of the remaining penetration pushed out per step.
    pub correction_factor: f64,
    /// Largest push at a contact point in one step (m).
    pub max_correction: f64,
    /// Separation under which shapes already count as touching (m).
    pub contact_margin: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            velocity_iterations: 10,
            restitution_threshold: 0.5,
            contact_slop: 0.005,
            correction_factor: 0.2,
            max_correction: 0.2,
            contact_margin: 0.0,
        }
    }
}

impl SolverConfig {
    /// Create a high-accuracy solver configuration.
    #[must_use]
    pub fn high_accuracy() -> Self {
        Self {
            velocity_iterations: 30,
            contact_slop: 0.001,
            ..Default::default()
        }
    }

    /// Create a fast solver configuration.
    #[must_use]
    pub fn fast() -> Self {
        Self {
            velocity_iterations: 4,
            ..Default::default()
        }
    }

    /// Set the number of velocity iterations.
    #[must_use]
    pub fn iterations(mut self, velocity: usize) -> Self {
        self.velocity_iterations = velocity;
        self
    }

    /// Set the restitution threshold.
    #[must_use]
    pub fn restitution_threshold(mut self, threshold: f64) -> Self {
        self.restitution_threshold = threshold.max(0.0);
        self
    }

    /// Set penetration push parameters.
    #[must_use]
    pub fn correction(mut self, factor: f64, max: f64) -> Self {
        self.correction_factor = factor.clamp(0.0, 1.0);
        self.max_correction = max.max(0.0);
        self
    }

    /// Validate the solver configuration.
    pub fn validate(&self) -> crate::Result<()> {
        if self.velocity_iterations == 0 {
            return Err(crate::SimError::invalid_config(
                "velocity_iterations must be at least 1",
            ));
        }

        if self.restitution_threshold < 0.0 {
            return Err(crate::SimError::invalid_config(
                "restitution_threshold cannot be negative",
            ));
        }

        if self.contact_slop < 0.0 || self.contact_margin < 0.0 {
            return Err(crate::SimError::invalid_config(
                "contact_slop and contact_margin cannot be negative",
            ));
        }

        if !(0.0..=1.0).contains(&self.correction_factor) {
            return Err(crate::SimError::invalid_config(
                "correction_factor must be between 0 and 1",
            ));
        }

        if self.max_correction < 0.0 {
            return Err(crate::SimError::invalid_config(
                "max_correction cannot be negative",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_config() {
        let config = SimulationConfig::default();
        assert_relative_eq!(config.timestep, 1.0 / 60.0);
        assert_relative_eq!(config.gravity.acceleration.y, -9.82);
        assert_relative_eq!(config.linear_damping, 0.01);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_presets() {
        let hf = SimulationConfig::high_fidelity();
        assert!(hf.timestep < SimulationConfig::realtime().timestep);
        assert_eq!(hf.solver.velocity_iterations, 30);

        let fast = SolverConfig::fast();
        assert_eq!(fast.velocity_iterations, 4);
    }

    #[test]
    fn test_config_validation() {
        assert!(SimulationConfig::with_timestep(0.0).validate().is_err());
        assert!(SimulationConfig::with_timestep(f64::NAN).validate().is_err());
        assert!(
            SimulationConfig::default()
                .damping(-1.0, 0.0)
                .validate()
                .is_err()
        );

        let solver = SolverConfig::default().iterations(0);
        let err = SimulationConfig::default().solver(solver).validate();
        assert!(err.unwrap_err().is_config_error());
    }

    #[test]
    fn test_builders_clamp() {
        let solver = SolverConfig::default()
            .restitution_threshold(-3.0)
            .correction(4.0, -1.0);
        assert_eq!(solver.restitution_threshold, 0.0);
        assert_eq!(solver.correction_factor, 1.0);
        assert_eq!(solver.max_correction, 0.0);
        assert!(solver.validate().is_ok());
    }
}
