//! The simulation world: bodies, the contact-material table and the step.

use clatter_contact::{
    ContactEvent, ContactManifold, ContactMaterial, ContactMaterialTable, ContactSolver,
    ContactSolverConfig, MaterialId, MaterialPair, PairConstraint, SolverBody,
};
use clatter_types::{
    BodyId, MassProperties, Pose, RigidBodyState, SimError, SimulationConfig, Twist,
};
use hashbrown::{HashMap, HashSet};
use nalgebra::{Matrix3, Point3, Vector3};
use tracing::{debug, trace, warn};

use crate::broad_phase::{BroadPhaseConfig, BroadPhaseDetector};
use crate::integrators::{apply_damping, clamp_velocities, integrate_pose, integrate_velocity};
use crate::narrow_phase;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Collision shape for contact detection, in body-local coordinates.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CollisionShape {
    /// Sphere with given radius.
    Sphere {
        /// Sphere radius in meters.
        radius: f64,
    },
    /// Box with given half-extents.
    Box {
        /// Half-extents along each local axis.
        half_extents: Vector3<f64>,
    },
    /// Infinite half-space. Everything behind the plane counts as inside.
    ///
    /// The surface is the set of local points `x` with `normal · x = offset`.
    Plane {
        /// Unit outward normal in local coordinates.
        normal: Vector3<f64>,
        /// Distance of the surface from the body origin along the normal.
        offset: f64,
    },
}

impl CollisionShape {
    /// Create a sphere collision shape.
    #[must_use]
    pub fn sphere(radius: f64) -> Self {
        Self::Sphere { radius }
    }

    /// Create a box collision shape.
    #[must_use]
    pub fn cuboid(half_extents: Vector3<f64>) -> Self {
        Self::Box { half_extents }
    }

    /// Create a plane collision shape.
    ///
    /// A zero normal falls back to +Y.
    #[must_use]
    pub fn plane(normal: Vector3<f64>, offset: f64) -> Self {
        Self::Plane {
            normal: normal.try_normalize(1e-12).unwrap_or_else(Vector3::y),
            offset,
        }
    }

    /// Horizontal ground plane through the body origin, facing +Y.
    #[must_use]
    pub fn ground_plane() -> Self {
        Self::Plane {
            normal: Vector3::y(),
            offset: 0.0,
        }
    }

    /// Radius of a sphere enclosing the shape (infinite for planes).
    #[must_use]
    pub fn bounding_radius(&self) -> f64 {
        match self {
            Self::Sphere { radius } => *radius,
            Self::Box { half_extents } => half_extents.norm(),
            Self::Plane { .. } => f64::INFINITY,
        }
    }

    /// Uniform-density mass properties for this shape.
    ///
    /// Planes have no volume and come back static.
    #[must_use]
    pub fn mass_properties(&self, mass: f64) -> MassProperties {
        match self {
            Self::Sphere { radius } => MassProperties::sphere(mass, *radius),
            Self::Box { half_extents } => MassProperties::box_shape(mass, *half_extents),
            Self::Plane { .. } => MassProperties::static_body(),
        }
    }

    /// Whether the shape can only belong to a static body.
    #[must_use]
    pub fn is_unbounded(&self) -> bool {
        matches!(self, Self::Plane { .. })
    }
}

/// A rigid body in the simulation.
#[derive(Debug, Clone)]
pub struct Body {
    /// Unique identifier.
    pub id: BodyId,
    /// Optional name for debugging.
    pub name: Option<String>,
    /// Current state (pose and velocity).
    pub state: RigidBodyState,
    /// Mass properties (mass 0 for static bodies).
    pub mass_props: MassProperties,
    /// Collision shape.
    pub shape: CollisionShape,
    /// Material identity used for contact-material lookups.
    pub material: MaterialId,
    /// Whether this body is static (immovable).
    pub is_static: bool,
    /// Accumulated external force for this step (world frame).
    pub accumulated_force: Vector3<f64>,
    /// Accumulated external torque for this step (world frame).
    pub accumulated_torque: Vector3<f64>,
}

impl Body {
    /// Create a new dynamic body.
    #[must_use]
    pub fn new(
        id: BodyId,
        shape: CollisionShape,
        state: RigidBodyState,
        mass_props: MassProperties,
        material: MaterialId,
    ) -> Self {
        Self {
            id,
            name: None,
            state,
            is_static: mass_props.is_static(),
            mass_props,
            shape,
            material,
            accumulated_force: Vector3::zeros(),
            accumulated_torque: Vector3::zeros(),
        }
    }

    /// Create a static (immovable) body.
    #[must_use]
    pub fn new_static(id: BodyId, shape: CollisionShape, pose: Pose, material: MaterialId) -> Self {
        Self {
            id,
            name: None,
            state: RigidBodyState::at_rest(pose),
            mass_props: MassProperties::static_body(),
            shape,
            material,
            is_static: true,
            accumulated_force: Vector3::zeros(),
            accumulated_torque: Vector3::zeros(),
        }
    }

    /// Set the body name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Apply a force at the center of mass.
    pub fn apply_force(&mut self, force: Vector3<f64>) {
        if !self.is_static {
            self.accumulated_force += force;
        }
    }

    /// Apply a torque.
    pub fn apply_torque(&mut self, torque: Vector3<f64>) {
        if !self.is_static {
            self.accumulated_torque += torque;
        }
    }

    /// Apply a force at a world-space point.
    pub fn apply_force_at_point(&mut self, force: Vector3<f64>, point: Point3<f64>) {
        if !self.is_static {
            self.accumulated_force += force;
            let r = point - self.state.pose.position;
            self.accumulated_torque += r.cross(&force);
        }
    }

    /// Clear accumulated forces and torques.
    pub fn clear_forces(&mut self) {
        self.accumulated_force = Vector3::zeros();
        self.accumulated_torque = Vector3::zeros();
    }

    /// Inverse mass (0 for static bodies).
    #[must_use]
    pub fn inverse_mass(&self) -> f64 {
        if self.is_static {
            0.0
        } else {
            self.mass_props.inverse_mass()
        }
    }

    /// Inverse inertia in world coordinates (zero for static bodies).
    #[must_use]
    pub fn world_inverse_inertia(&self) -> Matrix3<f64> {
        if self.is_static {
            Matrix3::zeros()
        } else {
            self.mass_props
                .world_inverse_inertia(&self.state.pose.rotation)
        }
    }

    /// Kinetic energy (0 for static bodies).
    #[must_use]
    pub fn kinetic_energy(&self) -> f64 {
        if self.is_static {
            return 0.0;
        }
        let r = self.state.pose.rotation.to_rotation_matrix();
        let world_inertia = r.matrix() * self.mass_props.inertia * r.matrix().transpose();
        self.state
            .twist
            .kinetic_energy(self.mass_props.mass, &world_inertia)
    }

    fn solver_view(&self) -> SolverBody {
        SolverBody {
            position: self.state.pose.position,
            twist: self.state.twist,
            push: Twist::zero(),
            inv_mass: self.inverse_mass(),
            inv_inertia: self.world_inverse_inertia(),
        }
    }
}

/// Summary of one [`World::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepReport {
    /// Index of the step just taken (0 for the first step).
    pub step_index: u64,
    /// Body pairs in contact during the step.
    pub contacts: usize,
    /// Contact events queued by the step.
    pub events: usize,
    /// Contacts resolved with the fallback material.
    pub fallback_lookups: usize,
    /// Events from the previous step that nobody drained.
    pub discarded_events: usize,
}

/// The simulation world containing all bodies.
///
/// Bodies are kept in insertion order, and every pass over them (broad
/// phase, solver, integration) follows that order, so two worlds built the
/// same way produce bit-identical states step for step.
#[derive(Debug, Clone)]
pub struct World {
    config: SimulationConfig,
    bodies: Vec<Body>,
    index: HashMap<BodyId, usize>,
    next_body_id: u64,
    materials: ContactMaterialTable,
    solver: ContactSolver,
    broad_phase: BroadPhaseDetector,
    time: f64,
    step_index: u64,
    events: Vec<ContactEvent>,
    touching: HashSet<(BodyId, BodyId)>,
    contacts: Vec<ContactManifold>,
    unregistered: HashSet<MaterialPair>,
    fallback_lookups: u64,
}

impl Default for World {
    fn default() -> Self {
        Self::new(SimulationConfig::default())
    }
}

impl World {
    /// Create an empty world.
    #[must_use]
    pub fn new(config: SimulationConfig) -> Self {
        let solver = ContactSolver::new(ContactSolverConfig::from(&config.solver));
        Self {
            bodies: Vec::new(),
            index: HashMap::new(),
            next_body_id: 0,
            materials: ContactMaterialTable::new(),
            solver,
            broad_phase: BroadPhaseDetector::new(
                BroadPhaseConfig::default().with_margin(config.solver.contact_margin),
            ),
            time: 0.0,
            step_index: 0,
            events: Vec::new(),
            touching: HashSet::new(),
            contacts: Vec::new(),
            unregistered: HashSet::new(),
            fallback_lookups: 0,
            config,
        }
    }

    /// Simulation configuration.
    #[must_use]
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Replace the configuration. Takes effect on the next step.
    pub fn set_config(&mut self, config: SimulationConfig) {
        self.solver = ContactSolver::new(ContactSolverConfig::from(&config.solver));
        self.broad_phase
            .set_config(BroadPhaseConfig::default().with_margin(config.solver.contact_margin));
        self.config = config;
    }

    /// Fixed increment each step advances by.
    #[must_use]
    pub fn timestep(&self) -> f64 {
        self.config.timestep
    }

    /// Simulated time in seconds.
    #[must_use]
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Number of steps taken so far.
    #[must_use]
    pub fn step_index(&self) -> u64 {
        self.step_index
    }

    // =========================================================================
    // Body Management
    // =========================================================================

    /// Register a dynamic body and return its ID.
    ///
    /// A mass that is zero, negative or not finite registers a static body
    /// instead.
    pub fn add_dynamic_body(
        &mut self,
        shape: CollisionShape,
        mass: f64,
        pose: Pose,
        material: MaterialId,
    ) -> BodyId {
        let id = self.allocate_id();
        if !(mass.is_finite() && mass > 0.0) || shape.is_unbounded() {
            warn!(body = %id, mass, "non-positive mass or unbounded shape, registering as static");
            return self.insert(Body::new_static(id, shape, pose, material));
        }

        let mass_props = shape.mass_properties(mass);
        self.insert(Body::new(
            id,
            shape,
            RigidBodyState::at_rest(pose),
            mass_props,
            material,
        ))
    }

    /// Register a static collider at the origin and return its ID.
    pub fn add_static_body(&mut self, shape: CollisionShape, material: MaterialId) -> BodyId {
        self.add_static_body_at(shape, Pose::identity(), material)
    }

    /// Register a static collider at `pose` and return its ID.
    pub fn add_static_body_at(
        &mut self,
        shape: CollisionShape,
        pose: Pose,
        material: MaterialId,
    ) -> BodyId {
        let id = self.allocate_id();
        self.insert(Body::new_static(id, shape, pose, material))
    }

    /// Register a fully built body under a fresh ID.
    ///
    /// Mass properties that fail [`MassProperties::validate`] make the body
    /// static.
    pub fn add_body(&mut self, mut body: Body) -> BodyId {
        body.id = self.allocate_id();
        if let Err(err) = body.mass_props.validate() {
            warn!(body = %body.id, %err, "registering as static");
            body.mass_props = MassProperties::static_body();
        }
        if body.mass_props.is_static() {
            body.is_static = true;
        }
        self.insert(body)
    }

    fn allocate_id(&mut self) -> BodyId {
        let id = BodyId::new(self.next_body_id);
        self.next_body_id += 1;
        id
    }

    fn insert(&mut self, body: Body) -> BodyId {
        let id = body.id;
        debug!(body = %id, is_static = body.is_static, material = %body.material, "body added");
        self.index.insert(id, self.bodies.len());
        self.bodies.push(body);
        id
    }

    /// Get a body by ID.
    #[must_use]
    pub fn body(&self, id: BodyId) -> Option<&Body> {
        self.index.get(&id).and_then(|&i| self.bodies.get(i))
    }

    /// Get a mutable body by ID, e.g. to apply forces before a step.
    pub fn body_mut(&mut self, id: BodyId) -> Option<&mut Body> {
        let i = *self.index.get(&id)?;
        self.bodies.get_mut(i)
    }

    /// Iterate over all bodies in insertion order.
    pub fn bodies(&self) -> impl Iterator<Item = &Body> {
        self.bodies.iter()
    }

    /// Number of bodies.
    #[must_use]
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Number of dynamic bodies.
    #[must_use]
    pub fn dynamic_body_count(&self) -> usize {
        self.bodies.iter().filter(|b| !b.is_static).count()
    }

    /// Apply a force to a body's center of mass for the next step.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidBodyId`] if the body does not exist.
    pub fn apply_force(&mut self, id: BodyId, force: Vector3<f64>) -> crate::Result<()> {
        self.body_mut(id)
            .ok_or(SimError::InvalidBodyId(id.raw()))?
            .apply_force(force);
        Ok(())
    }

    // =========================================================================
    // Contact Materials
    // =========================================================================

    /// Contact-material table.
    #[must_use]
    pub fn contact_materials(&self) -> &ContactMaterialTable {
        &self.materials
    }

    /// Mutable contact-material table.
    pub fn contact_materials_mut(&mut self) -> &mut ContactMaterialTable {
        &mut self.materials
    }

    /// Register the contact material for a pair of materials.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidConfig`] if the coefficients are invalid.
    pub fn set_contact_material(
        &mut self,
        a: MaterialId,
        b: MaterialId,
        entry: ContactMaterial,
    ) -> crate::Result<Option<ContactMaterial>> {
        self.materials.insert(a, b, entry)
    }

    /// Distinct materials used by registered bodies, sorted.
    #[must_use]
    pub fn materials_in_use(&self) -> Vec<MaterialId> {
        let mut ids: Vec<_> = self.bodies.iter().map(|b| b.material).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Material pairs that could collide but have no table entry.
    ///
    /// Pairs of two static bodies never collide and are not reported.
    #[must_use]
    pub fn missing_material_pairs(&self) -> Vec<MaterialPair> {
        let mut missing: Vec<_> = self
            .materials
            .missing_pairs(&self.materials_in_use())
            .into_iter()
            .filter(|pair| {
                let (a, b) = pair.ids();
                self.bodies.iter().any(|x| {
                    self.bodies.iter().any(|y| {
                        x.id != y.id
                            && !(x.is_static && y.is_static)
                            && x.material == a
                            && y.material == b
                    })
                })
            })
            .collect();
        missing.sort_unstable();
        missing
    }

    /// Pairs that fell back to the default material at least once.
    pub fn unregistered_pairs(&self) -> impl Iterator<Item = &MaterialPair> {
        self.unregistered.iter()
    }

    /// Total contacts resolved with the fallback material.
    #[must_use]
    pub fn fallback_lookups(&self) -> u64 {
        self.fallback_lookups
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Events queued by the last step, in detection order.
    #[must_use]
    pub fn pending_events(&self) -> &[ContactEvent] {
        &self.events
    }

    /// Take the events queued by the last step.
    pub fn drain_events(&mut self) -> std::vec::Drain<'_, ContactEvent> {
        self.events.drain(..)
    }

    /// Contact manifolds found during the last step.
    #[must_use]
    pub fn contacts(&self) -> &[ContactManifold] {
        &self.contacts
    }

    // =========================================================================
    // Simulation Control
    // =========================================================================

    /// Advance every dynamic body by exactly one fixed timestep.
    ///
    /// Order of work:
    /// 1. Discard undrained events from the previous step
    /// 2. Broad and narrow phase
    /// 3. Contact-material lookup (fallback recorded once per pair)
    /// 4. One [`ContactEvent`] per pair that was not touching last step
    /// 5. Gravity and accumulated forces into velocities
    /// 6. Impulse solve, then the clamped penetration push
    /// 7. Poses from the solved velocities plus the push
    /// 8. Damping and velocity limits
    /// 9. Clear forces, advance time
    ///
    /// Constraints are built before gravity is applied, so approach speeds
    /// and restitution targets use the velocities the step started with.
    ///
    /// Deep penetration and missing materials never fail a step.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, or
    /// [`SimError::Diverged`] if a body ends the step with a non-finite state.
    pub fn step(&mut self) -> crate::Result<StepReport> {
        self.config.validate()?;
        let dt = self.config.timestep;

        let discarded_events = self.events.len();
        if discarded_events > 0 {
            debug!(discarded_events, step = self.step_index, "dropping undrained contact events");
            self.events.clear();
        }

        let manifolds = self.detect_contacts();
        let (mut constraints, touching, fallback_lookups) = self.build_constraints(&manifolds);

        self.integrate_forces(dt);

        let mut views: Vec<SolverBody> = self.bodies.iter().map(Body::solver_view).collect();
        self.solver.solve(&mut views, &mut constraints);
        self.solver.solve_penetration(&mut views, &mut constraints, dt);
        for (body, view) in self.bodies.iter_mut().zip(&views) {
            if !body.is_static {
                body.state.twist = view.twist;
                integrate_pose(&mut body.state.pose, &view.motion(), dt);
            }
        }

        self.damp_and_clamp(dt);

        for body in &mut self.bodies {
            body.clear_forces();
        }

        let report = StepReport {
            step_index: self.step_index,
            contacts: manifolds.len(),
            events: self.events.len(),
            fallback_lookups,
            discarded_events,
        };

        self.touching = touching;
        self.contacts = manifolds;
        self.time += dt;
        self.step_index += 1;

        trace!(?report, "step complete");
        self.validate()?;
        Ok(report)
    }

    /// Run `steps` fixed steps, keeping only the events of the last one.
    ///
    /// # Errors
    ///
    /// Stops at the first failing step.
    pub fn run_steps(&mut self, steps: usize) -> crate::Result<()> {
        for _ in 0..steps {
            self.step()?;
        }
        Ok(())
    }

    /// Check that every body has a finite state.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Diverged`] naming the first offending body.
    pub fn validate(&self) -> crate::Result<()> {
        if let Some(body) = self.bodies.iter().find(|b| !b.state.is_finite()) {
            return Err(SimError::diverged(format!(
                "{} has non-finite state at t={:.4}",
                body.id, self.time
            )));
        }
        Ok(())
    }

    /// Total kinetic energy of all dynamic bodies.
    #[must_use]
    pub fn total_kinetic_energy(&self) -> f64 {
        self.bodies.iter().map(Body::kinetic_energy).sum()
    }

    fn integrate_forces(&mut self, dt: f64) {
        let gravity = self.config.gravity.acceleration;
        for body in self.bodies.iter_mut().filter(|b| !b.is_static) {
            let linear = gravity + body.accumulated_force * body.inverse_mass();
            let angular = body.world_inverse_inertia() * body.accumulated_torque;
            integrate_velocity(&mut body.state.twist, linear, angular, dt);
        }
    }

    fn damp_and_clamp(&mut self, dt: f64) {
        let config = &self.config;
        for body in self.bodies.iter_mut().filter(|b| !b.is_static) {
            let damped = apply_damping(
                &body.state.twist,
                config.linear_damping,
                config.angular_damping,
                dt,
            );
            body.state.twist = clamp_velocities(
                &damped,
                config.max_linear_velocity,
                config.max_angular_velocity,
            );
        }
    }

    // =========================================================================
    // Contact Detection and Resolution
    // =========================================================================

    /// Find all touching body pairs at the current poses.
    #[must_use]
    pub fn detect_contacts(&mut self) -> Vec<ContactManifold> {
        let margin = self.config.solver.contact_margin;
        let pairs = self.broad_phase.find_potential_pairs(&self.bodies);

        pairs
            .into_iter()
            .filter_map(|(a, b)| {
                let body_a = self.body(a)?;
                let body_b = self.body(b)?;
                narrow_phase::collide(body_a, body_b, margin)
            })
            .collect()
    }

    fn build_constraints(
        &mut self,
        manifolds: &[ContactManifold],
    ) -> (Vec<PairConstraint>, HashSet<(BodyId, BodyId)>, usize) {
        let threshold = self.config.solver.restitution_threshold;
        let views: Vec<SolverBody> = self.bodies.iter().map(Body::solver_view).collect();

        let mut constraints = Vec::with_capacity(manifolds.len());
        let mut touching = HashSet::with_capacity(manifolds.len());
        let mut fallback = 0;

        for manifold in manifolds {
            let (Some(&ia), Some(&ib)) = (
                self.index.get(&manifold.body_a),
                self.index.get(&manifold.body_b),
            ) else {
                continue;
            };
            let (Some(body_a), Some(body_b)) = (self.bodies.get(ia), self.bodies.get(ib)) else {
                continue;
            };
            let (material_a, material_b) = (body_a.material, body_b.material);

            let lookup = self.materials.resolve(material_a, material_b);
            if !lookup.is_registered() {
                fallback += 1;
                self.record_fallback(material_a, material_b);
            }

            let Some(constraint) =
                PairConstraint::new(manifold, ia, ib, &views, lookup.material(), threshold)
            else {
                continue;
            };

            let key = manifold.key();
            if !self.touching.contains(&key) {
                let event = ContactEvent {
                    body_a: manifold.body_a,
                    body_b: manifold.body_b,
                    material_a,
                    material_b,
                    impact_velocity: constraint.approach_velocity(),
                    step_index: self.step_index,
                };
                trace!(
                    body_a = %event.body_a,
                    body_b = %event.body_b,
                    impact = event.impact(),
                    "contact began"
                );
                self.events.push(event);
            }

            touching.insert(key);
            constraints.push(constraint);
        }

        (constraints, touching, fallback)
    }

    fn record_fallback(&mut self, a: MaterialId, b: MaterialId) {
        self.fallback_lookups += 1;
        let pair = MaterialPair::new(a, b);
        if self.unregistered.insert(pair) {
            let default = self.materials.default_material();
            warn!(
                %pair,
                friction = default.friction,
                restitution = default.restitution,
                "no contact material registered for pair, using default"
            );
        }
    }
}
