//! Contact materials and impulse-based contact resolution.
//!
//! Friction and restitution in clatter are properties of a *pair* of
//! materials, never of a single material. A material on its own is only an
//! identity ([`MaterialId`]); what happens when two bodies touch is looked up
//! in a [`ContactMaterialTable`] keyed by the unordered pair.
//!
//! ```text
//!   MaterialRegistry          ContactMaterialTable
//!   ┌──────────────┐          ┌───────────────────────────────┐
//!   │ 0 "ground"   │          │ (0,1) → friction 0.9, e 0.9   │
//!   │ 1 "box"      │   ──▶    │ (1,1) → friction 0.3, e 0.5   │
//!   │ 2 "box"      │          │ (0,2) → …                     │
//!   └──────────────┘          │ missing pair → documented     │
//!                             │ default (0.3, 0.0)            │
//!                             └───────────────────────────────┘
//! ```
//!
//! The crate also defines the contact data produced by narrow phase
//! ([`ContactManifold`]), the event emitted on first contact
//! ([`ContactEvent`]), and the sequential-impulse [`ContactSolver`].
//!
//! # Example
//!
//! ```
//! use clatter_contact::{ContactMaterial, ContactMaterialTable, MaterialRegistry};
//!
//! let mut materials = MaterialRegistry::new();
//! let ground = materials.register("ground");
//! let crate_box = materials.register("box");
//!
//! let mut table = ContactMaterialTable::new();
//! table
//!     .insert(ground, crate_box, ContactMaterial::new(0.9, 0.9))
//!     .unwrap();
//!
//! // Lookup is symmetric
//! assert_eq!(table.get(ground, crate_box), table.get(crate_box, ground));
//!
//! // Unregistered pairs fall back to the default instead of failing
//! let lookup = table.resolve(crate_box, crate_box);
//! assert!(!lookup.is_registered());
//! assert_eq!(lookup.material(), ContactMaterial::DEFAULT);
//! ```
//!
//! # Layer 0 Crate
//!
//! This is a Layer 0 crate with no windowing or audio dependencies.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![warn(missing_docs)]
#![allow(clippy::missing_const_for_fn)]

mod contact;
mod material;
mod solver;

pub use contact::{ContactEvent, ContactManifold, ContactPoint};
pub use material::{
    ContactMaterial, ContactMaterialTable, MaterialId, MaterialLookup, MaterialPair,
    MaterialRegistry,
};
pub use solver::{ContactSolver, ContactSolverConfig, PairConstraint, SolverBody};

// Re-export types needed for contact computation
pub use clatter_types::{BodyId, Twist, Vector3};
