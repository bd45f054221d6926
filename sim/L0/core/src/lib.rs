//! Fixed-step rigid-body world.
//!
//! This crate owns the physics half of clatter: bodies, collision detection,
//! the contact solve and time integration. A [`World`] advances by exactly
//! one fixed increment per [`World::step`]; the [`Stepper`] turns variable
//! frame times into a whole number of those increments.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────── World::step ─────────────────────────────┐
//! │                                                                      │
//! │  broad phase ─▶ narrow phase ─▶ material lookup ─▶ ContactEvent      │
//! │    (AABB)        (manifolds)     (pair table)      (first contact)   │
//! │                                        │                             │
//! │                                        ▼                             │
//! │  gravity + forces ─▶ impulse solve ─▶ penetration push               │
//! │     (v += a·dt)       (velocities)     (pseudo-velocity)             │
//! │                                              │                       │
//! │                                              ▼                       │
//! │            damping/clamp ◀─ x += (v + push)·dt                       │
//! │                                                                      │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Events queue on the world and are taken with [`World::drain_events`].
//! Whatever the caller leaves behind is discarded at the start of the next
//! step, so an event never outlives the step after the one that produced it.
//!
//! # Example
//!
//! ```
//! use clatter_contact::{ContactMaterial, MaterialRegistry};
//! use clatter_core::{CollisionShape, World};
//! use clatter_types::{Pose, SimulationConfig};
//! use nalgebra::{Point3, Vector3};
//!
//! let mut materials = MaterialRegistry::new();
//! let ground = materials.register("ground");
//! let block = materials.register("box");
//!
//! let mut world = World::new(SimulationConfig::default());
//! world
//!     .set_contact_material(ground, block, ContactMaterial::new(0.9, 0.9))
//!     .unwrap();
//! world.add_static_body(CollisionShape::ground_plane(), ground);
//! let id = world.add_dynamic_body(
//!     CollisionShape::cuboid(Vector3::new(0.5, 0.5, 0.5)),
//!     1.0,
//!     Pose::from_position(Point3::new(0.0, 10.0, 0.0)),
//!     block,
//! );
//!
//! for _ in 0..60 {
//!     world.step().unwrap();
//! }
//!
//! // One second of free fall
//! let y = world.body(id).unwrap().state.pose.position.y;
//! assert!(y < 6.0 && y > 4.0);
//! ```
//!
//! # Layer 0 Crate
//!
//! This is a Layer 0 crate with no windowing or audio dependencies. It can
//! run headless in tests, benchmarks and servers.

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,
    clippy::suboptimal_flops,
    clippy::cast_precision_loss,
    clippy::missing_errors_doc,
    clippy::similar_names
)]

pub mod broad_phase;
pub mod integrators;
pub mod narrow_phase;
mod stepper;
mod world;

pub use stepper::{Stepper, StepperConfig};
pub use world::{Body, CollisionShape, StepReport, World};

// Re-export the types callers need alongside a world
pub use clatter_contact::{ContactEvent, ContactManifold, ContactMaterial, MaterialId};
pub use clatter_types::{
    BodyId, Gravity, MassProperties, Pose, RigidBodyState, SimError, SimulationConfig,
    SolverConfig, Twist,
};

/// Result type for world operations.
pub type Result<T> = std::result::Result<T, SimError>;
