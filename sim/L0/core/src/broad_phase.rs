//! Broad-phase collision detection.
//!
//! Reduces the O(n²) set of body pairs to the ones whose axis-aligned
//! bounding boxes overlap. Small scenes use a brute-force sweep; larger ones
//! switch to Sweep-and-Prune on the axis with the widest spread of bodies.
//!
//! Both algorithms return pairs ordered by body insertion order, first body
//! earlier than second, so the narrow phase always sees the same pairs in the
//! same order for the same world.
//!
//! # Example
//!
//! ```
//! use clatter_core::broad_phase::{BroadPhase, SweepAndPrune};
//! use clatter_core::{Body, CollisionShape, MaterialId};
//! use clatter_types::{BodyId, Pose, RigidBodyState};
//! use nalgebra::Point3;
//!
//! let sphere = |id, x| {
//!     let shape = CollisionShape::sphere(1.0);
//!     let mass = shape.mass_properties(1.0);
//!     let pose = Pose::from_position(Point3::new(x, 0.0, 0.0));
//!     Body::new(BodyId::new(id), shape, RigidBodyState::at_rest(pose), mass, MaterialId(0))
//! };
//! let bodies = vec![sphere(1, 0.0), sphere(2, 1.5)];
//!
//! let mut sap = SweepAndPrune::new();
//! assert_eq!(sap.find_potential_pairs(&bodies).len(), 1);
//! ```

use clatter_types::BodyId;
use nalgebra::{Point3, Vector3};

use crate::world::{Body, CollisionShape};

/// Stand-in for infinity on unbounded shapes.
const LARGE: f64 = 1e6;

/// An axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner.
    pub min: Point3<f64>,
    /// Maximum corner.
    pub max: Point3<f64>,
}

impl Aabb {
    /// Create an AABB from its corners.
    #[must_use]
    pub const fn new(min: Point3<f64>, max: Point3<f64>) -> Self {
        Self { min, max }
    }

    /// Create an AABB centered at a point with the given half-extents.
    #[must_use]
    pub fn from_center(center: Point3<f64>, half_extents: Vector3<f64>) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    /// Smallest AABB containing every point.
    ///
    /// Returns `None` for an empty iterator.
    #[must_use]
    pub fn from_points(points: impl IntoIterator<Item = Point3<f64>>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        Some(points.fold(Self::new(first, first), |aabb, p| Self {
            min: aabb.min.inf(&p),
            max: aabb.max.sup(&p),
        }))
    }

    /// Check if this AABB overlaps another. Touching boxes overlap.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Expand by a margin on all sides.
    #[must_use]
    pub fn expanded(&self, margin: f64) -> Self {
        let m = Vector3::repeat(margin);
        Self {
            min: self.min - m,
            max: self.max + m,
        }
    }

    /// Minimum value along an axis.
    #[must_use]
    pub fn min_on_axis(&self, axis: Axis) -> f64 {
        self.min[axis.index()]
    }

    /// Maximum value along an axis.
    #[must_use]
    pub fn max_on_axis(&self, axis: Axis) -> f64 {
        self.max[axis.index()]
    }

    /// World-space bounds of a body's collision shape.
    ///
    /// Planes are half-spaces: their box is unbounded everywhere except on
    /// the outward side of an axis-aligned normal, so bodies sunk deep below
    /// the ground still pair with it.
    #[must_use]
    pub fn of_body(body: &Body) -> Self {
        let pose = &body.state.pose;
        let center = pose.position;

        match &body.shape {
            CollisionShape::Sphere { radius } => {
                Self::from_center(center, Vector3::repeat(*radius))
            }
            CollisionShape::Box { half_extents } => {
                // Rotated box: bound all 8 world-space corners
                let r = pose.rotation.to_rotation_matrix();
                let extent = r.matrix().abs() * half_extents;
                Self::from_center(center, extent)
            }
            CollisionShape::Plane { normal, offset } => {
                let n = pose.transform_vector(normal);
                let surface = center + n * *offset;

                let mut aabb = Self::from_center(Point3::origin(), Vector3::repeat(LARGE));
                for axis in Axis::all() {
                    let i = axis.index();
                    if n[i] > 0.999 {
                        aabb.max[i] = surface[i];
                    } else if n[i] < -0.999 {
                        aabb.min[i] = surface[i];
                    }
                }
                aabb
            }
        }
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::new(Point3::origin(), Point3::origin())
    }
}

/// Coordinate axis for the sweep direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// X-axis.
    X,
    /// Y-axis (up).
    Y,
    /// Z-axis.
    Z,
}

impl Axis {
    /// All three axes.
    #[must_use]
    pub const fn all() -> [Self; 3] {
        [Self::X, Self::Y, Self::Z]
    }

    const fn index(self) -> usize {
        match self {
            Self::X => 0,
            Self::Y => 1,
            Self::Z => 2,
        }
    }
}

/// A broad-phase algorithm.
pub trait BroadPhase {
    /// Pairs of bodies whose bounds overlap.
    ///
    /// Static/static pairs are never returned. Each pair appears once, the
    /// body earlier in `bodies` first, and pairs are sorted by position in
    /// `bodies`.
    fn find_potential_pairs(&mut self, bodies: &[Body]) -> Vec<(BodyId, BodyId)>;
}

/// Sweep-and-Prune (Sort-and-Sweep) broad phase.
///
/// Projects body bounds onto one axis, sorts by minimum endpoint and sweeps
/// for overlapping intervals, then confirms each candidate on all three
/// axes.
#[derive(Debug, Clone)]
pub struct SweepAndPrune {
    intervals: Vec<Interval>,
    sweep_axis: Axis,
    margin: f64,
}

#[derive(Debug, Clone, Copy)]
struct Interval {
    body_index: usize,
    aabb: Aabb,
    min: f64,
    max: f64,
    is_static: bool,
}

impl Default for SweepAndPrune {
    fn default() -> Self {
        Self::new()
    }
}

impl SweepAndPrune {
    /// Create a sweep-and-prune broad phase.
    #[must_use]
    pub fn new() -> Self {
        Self {
            intervals: Vec::new(),
            sweep_axis: Axis::X,
            margin: 0.0,
        }
    }

    /// Expand every bound by `margin`.
    #[must_use]
    pub fn with_margin(mut self, margin: f64) -> Self {
        self.margin = margin;
        self
    }

    /// Axis the last sweep ran along.
    #[must_use]
    pub fn sweep_axis(&self) -> Axis {
        self.sweep_axis
    }

    /// Pick the axis with the widest spread of bounded body centers.
    fn choose_sweep_axis(bodies: &[Body]) -> Axis {
        let centers = bodies
            .iter()
            .filter(|b| !b.shape.is_unbounded())
            .map(|b| b.state.pose.position);
        let Some(spread) = Aabb::from_points(centers) else {
            return Axis::X;
        };

        let extent = spread.max - spread.min;
        if extent.x >= extent.y && extent.x >= extent.z {
            Axis::X
        } else if extent.y >= extent.z {
            Axis::Y
        } else {
            Axis::Z
        }
    }
}

impl BroadPhase for SweepAndPrune {
    fn find_potential_pairs(&mut self, bodies: &[Body]) -> Vec<(BodyId, BodyId)> {
        self.sweep_axis = Self::choose_sweep_axis(bodies);
        let axis = self.sweep_axis;
        let margin = self.margin;

        self.intervals.clear();
        self.intervals
            .extend(bodies.iter().enumerate().map(|(body_index, body)| {
                let aabb = Aabb::of_body(body).expanded(margin);
                Interval {
                    body_index,
                    aabb,
                    min: aabb.min_on_axis(axis),
                    max: aabb.max_on_axis(axis),
                    is_static: body.is_static,
                }
            }));

        // Stable sort keeps ties in insertion order
        self.intervals.sort_by(|a, b| a.min.total_cmp(&b.min));

        let mut pairs = Vec::new();
        for (i, first) in self.intervals.iter().enumerate() {
            for second in &self.intervals[i + 1..] {
                if second.min > first.max {
                    break;
                }
                if first.is_static && second.is_static {
                    continue;
                }
                if first.aabb.overlaps(&second.aabb) {
                    pairs.push(if first.body_index < second.body_index {
                        (first.body_index, second.body_index)
                    } else {
                        (second.body_index, first.body_index)
                    });
                }
            }
        }

        pairs.sort_unstable();
        pairs
            .into_iter()
            .map(|(a, b)| (bodies[a].id, bodies[b].id))
            .collect()
    }
}

/// O(n²) broad phase for small scenes.
#[derive(Debug, Clone, Default)]
pub struct BruteForce {
    margin: f64,
}

impl BruteForce {
    /// Create a brute-force broad phase.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Expand every bound by `margin`.
    #[must_use]
    pub fn with_margin(mut self, margin: f64) -> Self {
        self.margin = margin;
        self
    }
}

impl BroadPhase for BruteForce {
    fn find_potential_pairs(&mut self, bodies: &[Body]) -> Vec<(BodyId, BodyId)> {
        let bounds: Vec<Aabb> = bodies
            .iter()
            .map(|b| Aabb::of_body(b).expanded(self.margin))
            .collect();

        let mut pairs = Vec::new();
        for (i, body_a) in bodies.iter().enumerate() {
            for (j, body_b) in bodies.iter().enumerate().skip(i + 1) {
                if body_a.is_static && body_b.is_static {
                    continue;
                }
                if bounds[i].overlaps(&bounds[j]) {
                    pairs.push((body_a.id, body_b.id));
                }
            }
        }
        pairs
    }
}

/// Broad-phase algorithm selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BroadPhaseAlgorithm {
    /// Brute force below the threshold, Sweep-and-Prune above.
    #[default]
    Auto,
    /// Always brute force.
    BruteForce,
    /// Always Sweep-and-Prune.
    SweepAndPrune,
}

/// Configuration for the broad phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BroadPhaseConfig {
    /// Algorithm to use.
    pub algorithm: BroadPhaseAlgorithm,
    /// Margin added to every bound.
    pub margin: f64,
    /// Body count at which `Auto` switches to Sweep-and-Prune.
    pub brute_force_threshold: usize,
}

impl Default for BroadPhaseConfig {
    fn default() -> Self {
        Self {
            algorithm: BroadPhaseAlgorithm::Auto,
            margin: 0.0,
            brute_force_threshold: 32,
        }
    }
}

impl BroadPhaseConfig {
    /// Set the bound margin.
    #[must_use]
    pub fn with_margin(mut self, margin: f64) -> Self {
        self.margin = margin;
        self
    }

    /// Force an algorithm.
    #[must_use]
    pub fn with_algorithm(mut self, algorithm: BroadPhaseAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }
}

/// Broad phase used by the world: algorithm selection over one interface.
#[derive(Debug, Clone)]
pub struct BroadPhaseDetector {
    config: BroadPhaseConfig,
    sap: SweepAndPrune,
    brute: BruteForce,
}

impl Default for BroadPhaseDetector {
    fn default() -> Self {
        Self::new(BroadPhaseConfig::default())
    }
}

impl BroadPhaseDetector {
    /// Create a detector.
    #[must_use]
    pub fn new(config: BroadPhaseConfig) -> Self {
        Self {
            sap: SweepAndPrune::new().with_margin(config.margin),
            brute: BruteForce::new().with_margin(config.margin),
            config,
        }
    }

    /// Find all potentially colliding pairs.
    pub fn find_potential_pairs(&mut self, bodies: &[Body]) -> Vec<(BodyId, BodyId)> {
        match self.config.algorithm {
            BroadPhaseAlgorithm::Auto => {
                if bodies.len() < self.config.brute_force_threshold {
                    self.brute.find_potential_pairs(bodies)
                } else {
                    self.sap.find_potential_pairs(bodies)
                }
            }
            BroadPhaseAlgorithm::BruteForce => self.brute.find_potential_pairs(bodies),
            BroadPhaseAlgorithm::SweepAndPrune => self.sap.find_potential_pairs(bodies),
        }
    }

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> &BroadPhaseConfig {
        &self.config
    }

    /// Replace the configuration.
    pub fn set_config(&mut self, config: BroadPhaseConfig) {
        *self = Self::new(config);
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::float_cmp,
    clippy::cast_precision_loss
)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use clatter_contact::MaterialId;
    use clatter_types::{Pose, RigidBodyState};
    use nalgebra::UnitQuaternion;

    fn make_sphere_body(id: u64, pos: Point3<f64>, radius: f64) -> Body {
        let shape = CollisionShape::sphere(radius);
        let mass = shape.mass_properties(1.0);
        Body::new(
            BodyId::new(id),
            shape,
            RigidBodyState::at_rest(Pose::from_position(pos)),
            mass,
            MaterialId(1),
        )
    }

    fn make_static_ground(id: u64) -> Body {
        Body::new_static(
            BodyId::new(id),
            CollisionShape::ground_plane(),
            Pose::identity(),
            MaterialId(0),
        )
    }

    #[test]
    fn test_aabb_overlaps() {
        let a = Aabb::from_center(Point3::origin(), Vector3::new(1.0, 1.0, 1.0));
        let b = Aabb::from_center(Point3::new(1.5, 0.0, 0.0), Vector3::new(1.0, 1.0, 1.0));
        let c = Aabb::from_center(Point3::new(5.0, 0.0, 0.0), Vector3::new(1.0, 1.0, 1.0));

        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a), "overlap should be symmetric");
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn test_aabb_expanded() {
        let aabb = Aabb::from_center(Point3::origin(), Vector3::new(1.0, 1.0, 1.0));
        let expanded = aabb.expanded(0.5);
        assert_eq!(expanded.min.x, -1.5);
        assert_eq!(expanded.max.z, 1.5);
    }

    #[test]
    fn test_rotated_box_bounds() {
        let shape = CollisionShape::cuboid(Vector3::new(0.5, 0.5, 0.5));
        let mass = shape.mass_properties(1.0);
        let pose = Pose::from_position_rotation(
            Point3::origin(),
            UnitQuaternion::from_axis_angle(&Vector3::y_axis(), std::f64::consts::FRAC_PI_4),
        );
        let body = Body::new(BodyId::new(1), shape, RigidBodyState::at_rest(pose), mass, MaterialId(1));

        let aabb = Aabb::of_body(&body);
        let reach = 0.5 * std::f64::consts::SQRT_2;
        assert_relative_eq!(aabb.max.x, reach, epsilon = 1e-12);
        assert_relative_eq!(aabb.max.y, 0.5, epsilon = 1e-12);
        assert_relative_eq!(aabb.min.z, -reach, epsilon = 1e-12);
    }

    #[test]
    fn test_ground_bounds_cover_everything_below() {
        let aabb = Aabb::of_body(&make_static_ground(0));
        assert_eq!(aabb.max.y, 0.0);
        assert_eq!(aabb.min.y, -LARGE);

        let buried = make_sphere_body(1, Point3::new(3.0, -50.0, 2.0), 0.5);
        assert!(aabb.overlaps(&Aabb::of_body(&buried)));

        let above = make_sphere_body(2, Point3::new(0.0, 2.0, 0.0), 0.5);
        assert!(!aabb.overlaps(&Aabb::of_body(&above)));
    }

    #[test]
    fn test_sweep_and_prune_finds_overlapping_spheres() {
        let bodies = vec![
            make_sphere_body(1, Point3::new(0.0, 0.0, 0.0), 1.0),
            make_sphere_body(2, Point3::new(1.5, 0.0, 0.0), 1.0),
        ];
        let mut sap = SweepAndPrune::new();
        assert_eq!(
            sap.find_potential_pairs(&bodies),
            vec![(BodyId::new(1), BodyId::new(2))]
        );
    }

    #[test]
    fn test_sweep_and_prune_no_overlap() {
        let bodies = vec![
            make_sphere_body(1, Point3::new(0.0, 0.0, 0.0), 1.0),
            make_sphere_body(2, Point3::new(5.0, 0.0, 0.0), 1.0),
        ];
        let mut sap = SweepAndPrune::new();
        assert!(sap.find_potential_pairs(&bodies).is_empty());
    }

    #[test]
    fn test_static_static_skipped_static_dynamic_kept() {
        let statics = vec![make_static_ground(1), make_static_ground(2)];
        assert!(SweepAndPrune::new().find_potential_pairs(&statics).is_empty());
        assert!(BruteForce::new().find_potential_pairs(&statics).is_empty());

        let mixed = vec![
            make_static_ground(1),
            make_sphere_body(2, Point3::new(0.0, 0.5, 0.0), 1.0),
        ];
        assert_eq!(SweepAndPrune::new().find_potential_pairs(&mixed).len(), 1);
    }

    #[test]
    fn test_pairs_follow_insertion_order() {
        // Inserted right to left so the sweep order is the reverse
        let bodies = vec![
            make_sphere_body(7, Point3::new(3.0, 0.0, 0.0), 1.0),
            make_sphere_body(3, Point3::new(1.5, 0.0, 0.0), 1.0),
            make_sphere_body(5, Point3::new(0.0, 0.0, 0.0), 1.0),
        ];
        let expected = vec![
            (BodyId::new(7), BodyId::new(3)),
            (BodyId::new(3), BodyId::new(5)),
        ];
        assert_eq!(SweepAndPrune::new().find_potential_pairs(&bodies), expected);
        assert_eq!(BruteForce::new().find_potential_pairs(&bodies), expected);
    }

    #[test]
    fn test_brute_force_matches_sap() {
        let mut bodies = vec![make_static_ground(0)];
        bodies.extend((1..60).map(|i| {
            let f = i as f64;
            make_sphere_body(
                i,
                Point3::new((f * 0.37).sin() * 4.0, 0.3 + (f * 0.11) % 3.0, (f * 0.71).cos() * 4.0),
                0.5,
            )
        }));

        let sap_pairs = SweepAndPrune::new().find_potential_pairs(&bodies);
        let brute_pairs = BruteForce::new().find_potential_pairs(&bodies);
        assert!(!sap_pairs.is_empty());
        assert_eq!(sap_pairs, brute_pairs);
    }

    #[test]
    fn test_broad_phase_detector_auto() {
        let mut detector = BroadPhaseDetector::default();

        let small: Vec<_> = (0..10)
            .map(|i| make_sphere_body(i, Point3::new(i as f64 * 1.5, 0.0, 0.0), 1.0))
            .collect();
        assert_eq!(detector.find_potential_pairs(&small).len(), 9);

        let large: Vec<_> = (0..100)
            .map(|i| make_sphere_body(i, Point3::new(i as f64 * 1.5, 0.0, 0.0), 1.0))
            .collect();
        assert_eq!(detector.find_potential_pairs(&large).len(), 99);
    }

    #[test]
    fn test_margin_widens_bounds() {
        let bodies = vec![
            make_sphere_body(1, Point3::new(0.0, 0.0, 0.0), 1.0),
            make_sphere_body(2, Point3::new(2.2, 0.0, 0.0), 1.0),
        ];
        assert!(BruteForce::new().find_potential_pairs(&bodies).is_empty());

        let mut detector = BroadPhaseDetector::new(BroadPhaseConfig::default().with_margin(0.15));
        assert_eq!(detector.find_potential_pairs(&bodies).len(), 1);
        assert_eq!(detector.config().margin, 0.15);
    }
}
