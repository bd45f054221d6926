//! Sequential-impulse contact solver with fixed iteration counts.
//!
//! Each step the world turns its contact manifolds into [`PairConstraint`]s
//! and hands them, together with a flat slice of [`SolverBody`] views, to
//! [`ContactSolver::solve`]. The solver runs exactly
//! `velocity_iterations` passes, so the same inputs always give the same
//! velocities.
//!
//! Per contact point:
//!
//! ```text
//! normal:   λn ← max(λn + m_n (v_target − v_n), 0)
//! friction: λt ← clamp(λt − m_t v_t, −μ λn, μ λn)    (two tangents)
//! push:     λp ← max(λp + m_n (v_bias − u_n), 0)     (pseudo-velocity u)
//! ```
//!
//! `v_target` is `−e · v_n⁰` when the approach speed `v_n⁰` exceeds the
//! restitution threshold, and zero otherwise. `v_n⁰` is read from the
//! bodies the constraint is built from; the world builds constraints before
//! it applies gravity, so a bounce never reflects the velocity gravity added
//! during the same step.
//!
//! Penetration is removed by [`ContactSolver::solve_penetration`], a second
//! pass over the same constraints that drives a separate pseudo-velocity
//! ([`SolverBody::push`]) towards the Baumgarte bias
//!
//! ```text
//! v_bias = min(β · max(depth − slop, 0), max_correction) / dt
//! ```
//!
//! The push moves poses for one step and is then discarded, so it never
//! shows up as kinetic energy.

use clatter_types::{SolverConfig, Twist};
use nalgebra::{Matrix3, Point3, Vector3};

use crate::{ContactManifold, ContactMaterial};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Effective masses below this are treated as "both bodies immovable".
const MIN_EFFECTIVE_MASS_DENOM: f64 = 1e-12;

/// Configuration for the contact solver.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ContactSolverConfig {
    /// Number of passes over all constraints.
    pub velocity_iterations: usize,
    /// Approach speed below which contacts do not bounce (m/s).
    pub restitution_threshold: f64,
    /// Penetration left alone by the push pass (m).
    pub contact_slop: f64,
    /// Fraction of the remaining penetration pushed out per step.
    pub correction_factor: f64,
    /// Largest push per step (m).
    pub max_correction: f64,
}

impl Default for ContactSolverConfig {
    fn default() -> Self {
        Self::from(&SolverConfig::default())
    }
}

impl From<&SolverConfig> for ContactSolverConfig {
    fn from(config: &SolverConfig) -> Self {
        Self {
            velocity_iterations: config.velocity_iterations.max(1),
            restitution_threshold: config.restitution_threshold,
            contact_slop: config.contact_slop,
            correction_factor: config.correction_factor,
            max_correction: config.max_correction,
        }
    }
}

/// The solver's view of one body: where it is, how it moves, how hard it is
/// to push.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverBody {
    /// Center of mass in world coordinates.
    pub position: Point3<f64>,
    /// Current velocity, updated in place by the solver.
    pub twist: Twist,
    /// Pseudo-velocity from penetration recovery. Moves the pose for one
    /// step, never kept as velocity.
    pub push: Twist,
    /// Inverse mass (0 for static bodies).
    pub inv_mass: f64,
    /// Inverse inertia in world coordinates (zero for static bodies).
    pub inv_inertia: Matrix3<f64>,
}

impl SolverBody {
    /// A body that impulses never move.
    #[must_use]
    pub fn fixed(position: Point3<f64>) -> Self {
        Self {
            position,
            twist: Twist::zero(),
            push: Twist::zero(),
            inv_mass: 0.0,
            inv_inertia: Matrix3::zeros(),
        }
    }

    /// Velocity of the material point at offset `r` from the center.
    #[must_use]
    pub fn velocity_at(&self, r: &Vector3<f64>) -> Vector3<f64> {
        self.twist.velocity_at_point(r)
    }

    /// Velocity plus push: what the pose should move with this step.
    #[must_use]
    pub fn motion(&self) -> Twist {
        Twist::new(
            self.twist.linear + self.push.linear,
            self.twist.angular + self.push.angular,
        )
    }

    fn apply_impulse(&mut self, impulse: &Vector3<f64>, r: &Vector3<f64>) {
        self.twist.linear += impulse * self.inv_mass;
        self.twist.angular += self.inv_inertia * r.cross(impulse);
    }

    fn apply_push(&mut self, impulse: &Vector3<f64>, r: &Vector3<f64>) {
        self.push.linear += impulse * self.inv_mass;
        self.push.angular += self.inv_inertia * r.cross(impulse);
    }

    fn angular_term(&self, r: &Vector3<f64>, dir: &Vector3<f64>) -> f64 {
        (self.inv_inertia * r.cross(dir)).cross(r).dot(dir)
    }
}

#[derive(Debug, Clone, Copy)]
struct PointConstraint {
    ra: Vector3<f64>,
    rb: Vector3<f64>,
    penetration: f64,
    initial_normal_velocity: f64,
    normal_mass: f64,
    tangent_mass: [f64; 2],
    target_velocity: f64,
    normal_impulse: f64,
    tangent_impulse: [f64; 2],
    push_impulse: f64,
}

/// Contact constraint between two bodies, built from one manifold.
#[derive(Debug, Clone)]
pub struct PairConstraint {
    body_a: usize,
    body_b: usize,
    normal: Vector3<f64>,
    tangents: [Vector3<f64>; 2],
    friction: f64,
    points: Vec<PointConstraint>,
}

impl PairConstraint {
    /// Build the constraint for `manifold`.
    ///
    /// `body_a` and `body_b` index into `bodies` and must match the
    /// manifold's A and B. Returns `None` for an empty manifold, a self
    /// pair or an out-of-range index.
    #[must_use]
    pub fn new(
        manifold: &ContactManifold,
        body_a: usize,
        body_b: usize,
        bodies: &[SolverBody],
        material: ContactMaterial,
        restitution_threshold: f64,
    ) -> Option<Self> {
        if body_a == body_b || manifold.points.is_empty() {
            return None;
        }
        let a = bodies.get(body_a)?;
        let b = bodies.get(body_b)?;

        let normal = manifold.normal;
        let tangents = tangent_basis(&normal);

        let points = manifold
            .points
            .iter()
            .map(|cp| {
                let ra = cp.position - a.position;
                let rb = cp.position - b.position;

                let relative = b.velocity_at(&rb) - a.velocity_at(&ra);
                let vn = relative.dot(&normal);

                let target_velocity = if vn < -restitution_threshold {
                    -material.restitution * vn
                } else {
                    0.0
                };

                PointConstraint {
                    ra,
                    rb,
                    penetration: cp.penetration,
                    initial_normal_velocity: vn,
                    normal_mass: effective_mass(a, b, &ra, &rb, &normal),
                    tangent_mass: [
                        effective_mass(a, b, &ra, &rb, &tangents[0]),
                        effective_mass(a, b, &ra, &rb, &tangents[1]),
                    ],
                    target_velocity,
                    normal_impulse: 0.0,
                    tangent_impulse: [0.0; 2],
                    push_impulse: 0.0,
                }
            })
            .collect();

        Some(Self {
            body_a,
            body_b,
            normal,
            tangents,
            friction: material.friction,
            points,
        })
    }

    /// Pre-solve relative normal velocity at the deepest point.
    ///
    /// Negative while the bodies approach.
    #[must_use]
    pub fn approach_velocity(&self) -> f64 {
        self.points
            .iter()
            .max_by(|p, q| p.penetration.total_cmp(&q.penetration))
            .map_or(0.0, |p| p.initial_normal_velocity)
    }

    /// Sum of accumulated normal impulses (N·s).
    #[must_use]
    pub fn normal_impulse(&self) -> f64 {
        self.points.iter().map(|p| p.normal_impulse).sum()
    }

    /// Indices of the two bodies.
    #[must_use]
    pub const fn bodies(&self) -> (usize, usize) {
        (self.body_a, self.body_b)
    }

    fn solve_once(&mut self, bodies: &mut [SolverBody]) {
        let (Some(&a0), Some(&b0)) = (bodies.get(self.body_a), bodies.get(self.body_b)) else {
            return;
        };
        let (mut a, mut b) = (a0, b0);

        for point in &mut self.points {
            // Friction first, bounded by the normal impulse of the last pass.
            let max_friction = self.friction * point.normal_impulse;
            for (k, tangent) in self.tangents.iter().enumerate() {
                let relative = b.velocity_at(&point.rb) - a.velocity_at(&point.ra);
                let vt = relative.dot(tangent);
                let lambda = -point.tangent_mass[k] * vt;

                let old = point.tangent_impulse[k];
                point.tangent_impulse[k] = (old + lambda).clamp(-max_friction, max_friction);
                let applied = point.tangent_impulse[k] - old;

                let impulse = tangent * applied;
                a.apply_impulse(&-impulse, &point.ra);
                b.apply_impulse(&impulse, &point.rb);
            }

            let relative = b.velocity_at(&point.rb) - a.velocity_at(&point.ra);
            let vn = relative.dot(&self.normal);
            let lambda = point.normal_mass * (point.target_velocity - vn);

            let old = point.normal_impulse;
            point.normal_impulse = (old + lambda).max(0.0);
            let applied = point.normal_impulse - old;

            let impulse = self.normal * applied;
            a.apply_impulse(&-impulse, &point.ra);
            b.apply_impulse(&impulse, &point.rb);
        }

        if let Some(slot) = bodies.get_mut(self.body_a) {
            *slot = a;
        }
        if let Some(slot) = bodies.get_mut(self.body_b) {
            *slot = b;
        }
    }

    fn push_once(&mut self, bodies: &mut [SolverBody], config: &ContactSolverConfig, dt: f64) {
        let (Some(&a0), Some(&b0)) = (bodies.get(self.body_a), bodies.get(self.body_b)) else {
            return;
        };
        let (mut a, mut b) = (a0, b0);

        for point in &mut self.points {
            let excess = (point.penetration - config.contact_slop).max(0.0);
            let bias = (excess * config.correction_factor).min(config.max_correction) / dt;

            let relative = b.push.velocity_at_point(&point.rb) - a.push.velocity_at_point(&point.ra);
            let un = relative.dot(&self.normal);
            let lambda = point.normal_mass * (bias - un);

            let old = point.push_impulse;
            point.push_impulse = (old + lambda).max(0.0);
            let applied = point.push_impulse - old;

            let impulse = self.normal * applied;
            a.apply_push(&-impulse, &point.ra);
            b.apply_push(&impulse, &point.rb);
        }

        if let Some(slot) = bodies.get_mut(self.body_a) {
            *slot = a;
        }
        if let Some(slot) = bodies.get_mut(self.body_b) {
            *slot = b;
        }
    }
}

/// Fixed-iteration sequential-impulse solver.
#[derive(Debug, Clone, Default)]
pub struct ContactSolver {
    config: ContactSolverConfig,
}

impl ContactSolver {
    /// Create a solver.
    #[must_use]
    pub fn new(config: ContactSolverConfig) -> Self {
        Self { config }
    }

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> &ContactSolverConfig {
        &self.config
    }

    /// Resolve all constraints, updating body velocities in place.
    pub fn solve(&self, bodies: &mut [SolverBody], constraints: &mut [PairConstraint]) {
        if constraints.is_empty() {
            return;
        }
        for _ in 0..self.config.velocity_iterations {
            for constraint in constraints.iter_mut() {
                constraint.solve_once(bodies);
            }
        }
    }

    /// Push overlapping bodies apart through [`SolverBody::push`].
    ///
    /// Velocities are left untouched. Each point is pushed by at most
    /// `max_correction` over a step of length `dt`; a non-positive or
    /// non-finite `dt` pushes nothing.
    pub fn solve_penetration(
        &self,
        bodies: &mut [SolverBody],
        constraints: &mut [PairConstraint],
        dt: f64,
    ) {
        if constraints.is_empty() || !(dt > 0.0 && dt.is_finite()) {
            return;
        }
        for _ in 0..self.config.velocity_iterations {
            for constraint in constraints.iter_mut() {
                constraint.push_once(bodies, &self.config, dt);
            }
        }
    }
}

fn effective_mass(
    a: &SolverBody,
    b: &SolverBody,
    ra: &Vector3<f64>,
    rb: &Vector3<f64>,
    dir: &Vector3<f64>,
) -> f64 {
    let k = a.inv_mass + b.inv_mass + a.angular_term(ra, dir) + b.angular_term(rb, dir);
    if k > MIN_EFFECTIVE_MASS_DENOM {
        1.0 / k
    } else {
        0.0
    }
}

fn tangent_basis(normal: &Vector3<f64>) -> [Vector3<f64>; 2] {
    let t1 = if normal.x.abs() > 0.57 {
        Vector3::new(normal.y, -normal.x, 0.0)
    } else {
        Vector3::new(0.0, normal.z, -normal.y)
    };
    let t1 = t1.try_normalize(1e-12).unwrap_or_else(Vector3::x);
    let t2 = normal.cross(&t1);
    [t1, t2]
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::ContactPoint;
    use approx::assert_relative_eq;
    use clatter_types::BodyId;

    fn ball(position: Point3<f64>, velocity: Vector3<f64>) -> SolverBody {
        SolverBody {
            position,
            twist: Twist::linear(velocity),
            push: Twist::zero(),
            inv_mass: 1.0,
            inv_inertia: Matrix3::identity() * 2.5,
        }
    }

    fn ground_manifold(point: Point3<f64>) -> ContactManifold {
        // A = ground, B = ball; normal from ground up into ball
        ContactManifold::new(
            BodyId::new(0),
            BodyId::new(1),
            Vector3::y(),
            vec![ContactPoint::new(point, 0.01)],
        )
    }

    fn solve_single(
        mut bodies: Vec<SolverBody>,
        material: ContactMaterial,
        threshold: f64,
    ) -> Vec<SolverBody> {
        let manifold = ground_manifold(Point3::new(0.0, 0.0, 0.0));
        let mut constraints =
            vec![PairConstraint::new(&manifold, 0, 1, &bodies, material, threshold).unwrap()];
        ContactSolver::default().solve(&mut bodies, &mut constraints);
        bodies
    }

    #[test]
    fn test_inelastic_contact_stops_approach() {
        let bodies = vec![
            SolverBody::fixed(Point3::new(0.0, -1.0, 0.0)),
            ball(Point3::new(0.0, 0.5, 0.0), Vector3::new(0.0, -3.0, 0.0)),
        ];
        let out = solve_single(bodies, ContactMaterial::new(0.0, 0.0), 0.5);

        // Point is directly under the centre, so no spin and no bounce
        assert_relative_eq!(out[1].twist.linear.y, 0.0, epsilon = 1e-9);
        assert_relative_eq!(out[1].twist.angular.norm(), 0.0, epsilon = 1e-9);
        // Static side untouched
        assert_eq!(out[0].twist, Twist::zero());
    }

    #[test]
    fn test_restitution_bounces() {
        let bodies = vec![
            SolverBody::fixed(Point3::new(0.0, -1.0, 0.0)),
            ball(Point3::new(0.0, 0.5, 0.0), Vector3::new(0.0, -4.0, 0.0)),
        ];
        let out = solve_single(bodies, ContactMaterial::new(0.0, 0.9), 0.5);
        assert_relative_eq!(out[1].twist.linear.y, 3.6, epsilon = 1e-9);
    }

    #[test]
    fn test_restitution_threshold_suppresses_small_bounce() {
        let bodies = vec![
            SolverBody::fixed(Point3::new(0.0, -1.0, 0.0)),
            ball(Point3::new(0.0, 0.5, 0.0), Vector3::new(0.0, -0.2, 0.0)),
        ];
        let out = solve_single(bodies, ContactMaterial::new(0.0, 0.9), 0.5);
        assert_relative_eq!(out[1].twist.linear.y, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_separating_contact_is_left_alone() {
        let bodies = vec![
            SolverBody::fixed(Point3::new(0.0, -1.0, 0.0)),
            ball(Point3::new(0.0, 0.5, 0.0), Vector3::new(0.0, 2.0, 0.0)),
        ];
        let out = solve_single(bodies, ContactMaterial::new(0.5, 0.5), 0.5);
        assert_relative_eq!(out[1].twist.linear.y, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_friction_is_bounded_by_coulomb() {
        // Sliding fast with low friction: tangential speed drops by at most μ·Δvn
        let bodies = vec![
            SolverBody::fixed(Point3::new(0.0, -1.0, 0.0)),
            SolverBody {
                inv_inertia: Matrix3::zeros(),
                ..ball(Point3::new(0.0, 0.5, 0.0), Vector3::new(5.0, -1.0, 0.0))
            },
        ];
        let out = solve_single(bodies, ContactMaterial::new(0.2, 0.0), 0.5);

        assert_relative_eq!(out[1].twist.linear.y, 0.0, epsilon = 1e-9);
        assert_relative_eq!(out[1].twist.linear.x, 4.8, epsilon = 1e-6);
    }

    #[test]
    fn test_approach_velocity_reports_pre_solve_value() {
        let bodies = vec![
            SolverBody::fixed(Point3::new(0.0, -1.0, 0.0)),
            ball(Point3::new(0.0, 0.5, 0.0), Vector3::new(0.0, -6.0, 0.0)),
        ];
        let manifold = ground_manifold(Point3::origin());
        let mut constraint =
            PairConstraint::new(&manifold, 0, 1, &bodies, ContactMaterial::DEFAULT, 0.5).unwrap();
        let mut bodies = bodies;
        ContactSolver::default().solve(&mut bodies, std::slice::from_mut(&mut constraint));

        assert_relative_eq!(constraint.approach_velocity(), -6.0);
        assert!(constraint.normal_impulse() > 0.0);
        assert_eq!(constraint.bodies(), (0, 1));
    }

    #[test]
    fn test_rejects_degenerate_pairs() {
        let bodies = vec![SolverBody::fixed(Point3::origin())];
        let manifold = ground_manifold(Point3::origin());
        assert!(PairConstraint::new(&manifold, 0, 0, &bodies, ContactMaterial::DEFAULT, 0.5).is_none());
        assert!(PairConstraint::new(&manifold, 0, 3, &bodies, ContactMaterial::DEFAULT, 0.5).is_none());
    }

    /// Ball resting on the ground at the origin, `depth` into it.
    fn push_single(depth: f64, inv_mass_a: f64, dt: f64) -> Vec<SolverBody> {
        let mut bodies = vec![
            SolverBody {
                inv_mass: inv_mass_a,
                inv_inertia: Matrix3::zeros(),
                ..SolverBody::fixed(Point3::new(0.0, -1.0, 0.0))
            },
            SolverBody {
                inv_inertia: Matrix3::zeros(),
                ..ball(Point3::new(0.0, 0.5, 0.0), Vector3::zeros())
            },
        ];
        let manifold = ContactManifold::new(
            BodyId::new(0),
            BodyId::new(1),
            Vector3::y(),
            vec![ContactPoint::new(Point3::origin(), depth)],
        );
        let mut constraints = vec![
            PairConstraint::new(&manifold, 0, 1, &bodies, ContactMaterial::DEFAULT, 0.5).unwrap(),
        ];
        ContactSolver::default().solve_penetration(&mut bodies, &mut constraints, dt);
        bodies
    }

    #[test]
    fn test_penetration_push_is_split_by_inverse_mass() {
        let dt = 0.01;
        // (0.105 - 0.005) * 0.2 = 0.02 m over the step
        let out = push_single(0.105, 0.0, dt);
        assert_relative_eq!(out[1].push.linear.y * dt, 0.02, epsilon = 1e-12);

        let out = push_single(0.105, 1.0, dt);
        assert_relative_eq!(out[0].push.linear.y * dt, -0.01, epsilon = 1e-12);
        assert_relative_eq!(out[1].push.linear.y * dt, 0.01, epsilon = 1e-12);
    }

    #[test]
    fn test_penetration_push_is_clamped() {
        let dt = 0.01;
        let config = ContactSolverConfig::default();
        let out = push_single(50.0, 0.0, dt);
        assert_relative_eq!(out[1].push.linear.y * dt, config.max_correction, epsilon = 1e-12);

        assert_eq!(push_single(0.004, 0.0, dt)[1].push, Twist::zero());
        assert_eq!(push_single(f64::NAN, 0.0, dt)[1].push, Twist::zero());
        assert_eq!(push_single(1.0, 0.0, 0.0)[1].push, Twist::zero());
    }

    #[test]
    fn test_penetration_push_leaves_velocity_alone() {
        let out = push_single(0.3, 0.0, 1.0 / 60.0);
        assert_eq!(out[1].twist, Twist::zero());
        assert!(out[1].push.linear.y > 0.0);
        assert_relative_eq!(out[1].motion().linear, out[1].push.linear);
    }

    #[test]
    fn test_restitution_uses_velocity_at_construction() {
        // Built before gravity: bounce reflects -4, not the later -4.1
        let mut bodies = vec![
            SolverBody::fixed(Point3::new(0.0, -1.0, 0.0)),
            ball(Point3::new(0.0, 0.5, 0.0), Vector3::new(0.0, -4.0, 0.0)),
        ];
        let manifold = ground_manifold(Point3::origin());
        let mut constraints = vec![
            PairConstraint::new(&manifold, 0, 1, &bodies, ContactMaterial::new(0.0, 0.5), 0.5)
                .unwrap(),
        ];
        bodies[1].twist.linear.y -= 0.1;
        ContactSolver::default().solve(&mut bodies, &mut constraints);

        assert_relative_eq!(bodies[1].twist.linear.y, 2.0, epsilon = 1e-9);
        assert_relative_eq!(constraints[0].approach_velocity(), -4.0);
    }

    #[test]
    fn test_tangent_basis_is_orthonormal() {
        for n in [Vector3::x(), Vector3::y(), Vector3::new(1.0, 1.0, 1.0).normalize()] {
            let [t1, t2] = tangent_basis(&n);
            assert_relative_eq!(t1.norm(), 1.0, epsilon = 1e-12);
            assert_relative_eq!(t2.norm(), 1.0, epsilon = 1e-12);
            assert_relative_eq!(t1.dot(&n), 0.0, epsilon = 1e-12);
            assert_relative_eq!(t2.dot(&t1), 0.0, epsilon = 1e-12);
        }
    }
}
