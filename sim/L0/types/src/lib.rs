//! Core types for the clatter rigid-body loop.
//!
//! This crate provides the foundational data the other crates speak:
//!
//! - [`BodyId`] - Stable handle for a body registered in a world
//! - [`RigidBodyState`] - Position, orientation, velocity of rigid bodies
//! - [`MassProperties`] - Mass and inertia, with `0` meaning static
//! - [`SimulationConfig`] - Timestep, gravity, damping, solver settings
//! - [`SimError`] - The error type shared by every Layer 0 crate
//!
//! # Layer 0
//!
//! This is a Layer 0 crate with **no windowing, audio or GPU dependencies**.
//! Everything here is plain data that can be logged, serialized (with the
//! `serde` feature) and compared in tests.
//!
//! # Coordinate System
//!
//! Matches the render side so transforms copy across without swizzling:
//!
//! - X: right
//! - Y: up
//! - Z: toward the viewer
//! - Right-handed
//!
//! # Example
//!
//! ```
//! use clatter_types::{Pose, RigidBodyState, Twist};
//! use nalgebra::Point3;
//!
//! let state = RigidBodyState::new(
//!     Pose::from_position(Point3::new(0.0, 10.0, 0.0)),
//!     Twist::zero(),
//! );
//!
//! assert_eq!(state.pose.position.y, 10.0);
//! assert!(state.twist.linear.norm() < 1e-10);
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,     // Many methods can't be const due to nalgebra
    clippy::suboptimal_flops,          // mul_add style changes aren't always clearer
    clippy::cast_precision_loss,       // usize to f64 is fine for counts
    clippy::missing_errors_doc,        // Error docs added where non-obvious
)]

mod body;
mod config;
mod dynamics;
mod error;

pub use body::{BodyId, MassProperties, Pose, RigidBodyState, Twist};
pub use config::{SimulationConfig, SolverConfig};
pub use dynamics::Gravity;
pub use error::SimError;

// Re-export math types for convenience
pub use nalgebra::{Point3, UnitQuaternion, Vector3};

/// Result type for simulation operations.
pub type Result<T> = std::result::Result<T, SimError>;
