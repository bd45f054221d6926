//! Gravity.

use nalgebra::Vector3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Standard gravitational acceleration used by the default world (m/s²).
pub const STANDARD_GRAVITY: f64 = 9.82;

/// Gravity configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Gravity {
    /// Acceleration due to gravity (m/s²).
    pub acceleration: Vector3<f64>,
}

impl Default for Gravity {
    fn default() -> Self {
        Self::earth()
    }
}

impl Gravity {
    /// Earth gravity (9.82 m/s² in -Y direction).
    #[must_use]
    pub fn earth() -> Self {
        Self {
            acceleration: Vector3::new(0.0, -STANDARD_GRAVITY, 0.0),
        }
    }

    /// Moon gravity (1.62 m/s² in -Y direction).
    #[must_use]
    pub fn moon() -> Self {
        Self {
            acceleration: Vector3::new(0.0, -1.62, 0.0),
        }
    }

    /// Zero gravity (microgravity).
    #[must_use]
    pub fn zero() -> Self {
        Self {
            acceleration: Vector3::zeros(),
        }
    }

    /// Custom gravity vector.
    #[must_use]
    pub fn custom(acceleration: Vector3<f64>) -> Self {
        Self { acceleration }
    }

    /// Compute the gravitational force on a body.
    #[must_use]
    pub fn force_on_mass(&self, mass: f64) -> Vector3<f64> {
        self.acceleration * mass
    }

    /// Check that every component is finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.acceleration.iter().all(|x| x.is_finite())
    }
}
