//! Body identity, pose, velocity and mass.
//!
//! Everything here is plain data in world coordinates. The world owns the
//! bodies; the solver and the renderer only ever read these values or write
//! whole new ones.

use nalgebra::{Matrix3, Point3, UnitQuaternion, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Handle of a body inside one world.
///
/// Ids are handed out in registration order and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BodyId(pub u64);

impl BodyId {
    /// Wrap a raw id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// The raw id.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for BodyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Body({})", self.0)
    }
}

/// Where a body is and which way it faces.
///
/// The position is the center of mass; shapes are centered on it.
///
/// # Example
///
/// ```
/// use clatter_types::Pose;
/// use nalgebra::{Point3, UnitQuaternion, Vector3};
///
/// let turned = Pose::from_position_rotation(
///     Point3::new(0.0, 10.0, 0.0),
///     UnitQuaternion::from_axis_angle(&Vector3::y_axis(), std::f64::consts::FRAC_PI_2),
/// );
///
/// // A box corner at local +X ends up at world -Z
/// let corner = turned.transform_point(&Point3::new(0.5, 0.0, 0.0));
/// assert!((corner - Point3::new(0.0, 10.0, -0.5)).norm() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Pose {
    /// Center of mass in world coordinates.
    pub position: Point3<f64>,
    /// Orientation.
    pub rotation: UnitQuaternion<f64>,
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

impl Pose {
    /// At the origin, unrotated.
    #[must_use]
    pub fn identity() -> Self {
        Self::from_position(Point3::origin())
    }

    /// At `position`, unrotated.
    #[must_use]
    pub fn from_position(position: Point3<f64>) -> Self {
        Self {
            position,
            rotation: UnitQuaternion::identity(),
        }
    }

    /// At `position`, turned by `rotation`.
    #[must_use]
    pub const fn from_position_rotation(
        position: Point3<f64>,
        rotation: UnitQuaternion<f64>,
    ) -> Self {
        Self { position, rotation }
    }

    /// Body-local point to world coordinates.
    #[must_use]
    pub fn transform_point(&self, local: &Point3<f64>) -> Point3<f64> {
        self.position + self.rotation * local.coords
    }

    /// Body-local direction to world coordinates.
    #[must_use]
    pub fn transform_vector(&self, local: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * local
    }

    /// World point to body-local coordinates.
    #[must_use]
    pub fn inverse_transform_point(&self, world: &Point3<f64>) -> Point3<f64> {
        Point3::from(self.rotation.inverse_transform_vector(&(world - self.position)))
    }

    /// False if any coordinate is `NaN` or infinite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.position.coords.iter().all(|x| x.is_finite())
            && self.rotation.coords.iter().all(|x| x.is_finite())
    }
}

/// Linear and angular velocity, both in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Twist {
    /// Velocity of the center of mass (m/s).
    pub linear: Vector3<f64>,
    /// Angular velocity (rad/s).
    pub angular: Vector3<f64>,
}

impl Default for Twist {
    fn default() -> Self {
        Self::zero()
    }
}

impl Twist {
    /// From both parts.
    #[must_use]
    pub const fn new(linear: Vector3<f64>, angular: Vector3<f64>) -> Self {
        Self { linear, angular }
    }

    /// Not moving.
    #[must_use]
    pub fn zero() -> Self {
        Self::linear(Vector3::zeros())
    }

    /// Moving without spin.
    #[must_use]
    pub fn linear(v: Vector3<f64>) -> Self {
        Self {
            linear: v,
            angular: Vector3::zeros(),
        }
    }

    /// Velocity of the material point at `offset` from the center of mass,
    /// `v + ω × r`.
    #[must_use]
    pub fn velocity_at_point(&self, offset: &Vector3<f64>) -> Vector3<f64> {
        self.linear + self.angular.cross(offset)
    }

    /// `½·m·|v|² + ½·ωᵀ·I·ω`, with `inertia` in world coordinates.
    #[must_use]
    pub fn kinetic_energy(&self, mass: f64, inertia: &Matrix3<f64>) -> f64 {
        0.5 * mass * self.linear.norm_squared() + 0.5 * self.angular.dot(&(inertia * self.angular))
    }

    /// False if any component is `NaN` or infinite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.linear.iter().chain(self.angular.iter()).all(|x| x.is_finite())
    }
}

/// Pose plus velocity: everything a step changes about a body.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RigidBodyState {
    /// Position and orientation.
    pub pose: Pose,
    /// Linear and angular velocity.
    pub twist: Twist,
}

impl RigidBodyState {
    /// From both parts.
    #[must_use]
    pub const fn new(pose: Pose, twist: Twist) -> Self {
        Self { pose, twist }
    }

    /// At `pose`, not moving.
    #[must_use]
    pub fn at_rest(pose: Pose) -> Self {
        Self::new(pose, Twist::zero())
    }

    /// False if the pose or the velocity holds a `NaN` or infinity.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.pose.is_finite() && self.twist.is_finite()
    }
}

/// Mass and body-local inertia.
///
/// A mass that is zero, negative, infinite or `NaN` marks the body static:
/// inverse mass and inverse inertia are both zero, so no impulse moves it.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MassProperties {
    /// Mass (kg).
    pub mass: f64,
    /// Inertia about the center of mass, body-local (kg·m²).
    pub inertia: Matrix3<f64>,
}

impl MassProperties {
    /// From explicit values.
    #[must_use]
    pub const fn new(mass: f64, inertia: Matrix3<f64>) -> Self {
        Self { mass, inertia }
    }

    /// Mass properties of an immovable body.
    #[must_use]
    pub fn static_body() -> Self {
        Self::new(0.0, Matrix3::zeros())
    }

    /// Solid sphere, `I = 2/5·m·r²` about every axis.
    #[must_use]
    pub fn sphere(mass: f64, radius: f64) -> Self {
        let i = 0.4 * mass * radius * radius;
        Self::new(mass, Matrix3::from_diagonal_element(i))
    }

    /// Solid box given by its half-extents, `I_xx = m·(h_y² + h_z²)/3` and
    /// likewise for the other axes.
    #[must_use]
    pub fn box_shape(mass: f64, half_extents: Vector3<f64>) -> Self {
        let sq = half_extents.component_mul(&half_extents);
        let diagonal = Vector3::new(sq.y + sq.z, sq.x + sq.z, sq.x + sq.y) * (mass / 3.0);
        Self::new(mass, Matrix3::from_diagonal(&diagonal))
    }

    /// True for anything impulses cannot move.
    #[must_use]
    pub fn is_static(&self) -> bool {
        !(self.mass.is_finite() && self.mass > 0.0)
    }

    /// `1/m`, or zero for a static body.
    #[must_use]
    pub fn inverse_mass(&self) -> f64 {
        if self.is_static() { 0.0 } else { 1.0 / self.mass }
    }

    /// Body-local inverse inertia.
    ///
    /// Zero for static bodies and for singular tensors, which freezes
    /// rotation instead of producing infinities.
    #[must_use]
    pub fn inverse_inertia(&self) -> Matrix3<f64> {
        if self.is_static() {
            return Matrix3::zeros();
        }
        self.inertia.try_inverse().unwrap_or_else(Matrix3::zeros)
    }

    /// Inverse inertia in world coordinates, `R·I⁻¹·Rᵀ`.
    #[must_use]
    pub fn world_inverse_inertia(&self, rotation: &UnitQuaternion<f64>) -> Matrix3<f64> {
        let r = rotation.to_rotation_matrix();
        r.matrix() * self.inverse_inertia() * r.matrix().transpose()
    }

    /// Check that the values describe a real body.
    ///
    /// Zero and positive infinity are accepted as "static"; negative or
    /// `NaN` mass and an inertia tensor with a negative eigenvalue are not.
    pub fn validate(&self) -> crate::Result<()> {
        if self.mass.is_nan() || self.mass < 0.0 {
            return Err(crate::SimError::invalid_mass(format!(
                "mass must be zero, positive or infinite, got {}",
                self.mass
            )));
        }

        if !self.inertia.iter().all(|x| x.is_finite()) {
            return Err(crate::SimError::invalid_mass("inertia must be finite"));
        }

        if self
            .inertia
            .symmetric_eigenvalues()
            .iter()
            .any(|&e| e < -1e-10)
        {
            return Err(crate::SimError::invalid_mass(
                "inertia tensor must be positive semi-definite",
            ));
        }

        Ok(())
    }
}
