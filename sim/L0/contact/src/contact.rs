//! Contact geometry and contact events.

use clatter_types::BodyId;
use nalgebra::{Point3, Vector3};

use crate::MaterialId;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A single point where two shapes overlap.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ContactPoint {
    /// Contact position in world coordinates.
    pub position: Point3<f64>,
    /// Penetration depth (positive when overlapping).
    pub penetration: f64,
}

impl ContactPoint {
    /// Create a contact point.
    #[must_use]
    pub const fn new(position: Point3<f64>, penetration: f64) -> Self {
        Self {
            position,
            penetration,
        }
    }
}

/// All contact points between one pair of bodies, sharing one normal.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ContactManifold {
    /// First body.
    pub body_a: BodyId,
    /// Second body.
    pub body_b: BodyId,
    /// Unit contact normal, pointing from A to B.
    pub normal: Vector3<f64>,
    /// Contact points (at least one).
    pub points: Vec<ContactPoint>,
}

impl ContactManifold {
    /// Create a manifold.
    #[must_use]
    pub fn new(
        body_a: BodyId,
        body_b: BodyId,
        normal: Vector3<f64>,
        points: Vec<ContactPoint>,
    ) -> Self {
        Self {
            body_a,
            body_b,
            normal,
            points,
        }
    }

    /// Same contact seen from B's side: bodies swapped, normal negated.
    #[must_use]
    pub fn flipped(self) -> Self {
        Self {
            body_a: self.body_b,
            body_b: self.body_a,
            normal: -self.normal,
            points: self.points,
        }
    }

    /// The deepest point, if any.
    #[must_use]
    pub fn deepest(&self) -> Option<&ContactPoint> {
        self.points
            .iter()
            .max_by(|a, b| a.penetration.total_cmp(&b.penetration))
    }

    /// Largest penetration depth over all points (0 if empty).
    #[must_use]
    pub fn max_penetration(&self) -> f64 {
        self.deepest().map_or(0.0, |p| p.penetration)
    }

    /// Body pair with the smaller id first.
    #[must_use]
    pub fn key(&self) -> (BodyId, BodyId) {
        if self.body_a <= self.body_b {
            (self.body_a, self.body_b)
        } else {
            (self.body_b, self.body_a)
        }
    }
}

/// A pair of bodies coming into contact during one step.
///
/// Emitted once per pair on the step where the pair starts touching. A pair
/// that stays in contact does not emit again until it separates.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ContactEvent {
    /// First body.
    pub body_a: BodyId,
    /// Second body.
    pub body_b: BodyId,
    /// Material of the first body.
    pub material_a: MaterialId,
    /// Material of the second body.
    pub material_b: MaterialId,
    /// Relative velocity along the normal before resolution, `(v_b - v_a) · n`.
    ///
    /// Negative while the bodies approach.
    pub impact_velocity: f64,
    /// Index of the step that produced the event.
    pub step_index: u64,
}

impl ContactEvent {
    /// Closing speed magnitude.
    #[must_use]
    pub fn impact(&self) -> f64 {
        self.impact_velocity.abs()
    }

    /// Whether either body has material `id`.
    #[must_use]
    pub fn involves_material(&self, id: MaterialId) -> bool {
        self.material_a == id || self.material_b == id
    }

    /// Whether `body` takes part in the event.
    #[must_use]
    pub fn involves_body(&self, body: BodyId) -> bool {
        self.body_a == body || self.body_b == body
    }
}
