//! Material identities and the pairwise contact-material table.

use clatter_types::{Result, SimError};
use hashbrown::HashMap;
use tracing::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Opaque material identity.
///
/// Two ids are the same material only if they are equal; a material has no
/// friction or restitution of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MaterialId(pub u32);

impl MaterialId {
    /// Create a material id from a raw value.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw id value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for MaterialId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Material({})", self.0)
    }
}

/// Hands out material ids and remembers a name for each, for logs.
///
/// Registering the same name twice yields two distinct materials.
#[derive(Debug, Clone, Default)]
pub struct MaterialRegistry {
    names: Vec<String>,
}

impl MaterialRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new material identity.
    pub fn register(&mut self, name: impl Into<String>) -> MaterialId {
        let id = MaterialId(u32::try_from(self.names.len()).unwrap_or(u32::MAX));
        self.names.push(name.into());
        id
    }

    /// Diagnostic name of a material.
    #[must_use]
    pub fn name(&self, id: MaterialId) -> Option<&str> {
        self.names.get(id.0 as usize).map(String::as_str)
    }

    /// First material registered under `name`.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<MaterialId> {
        self.names
            .iter()
            .position(|n| n == name)
            .and_then(|i| u32::try_from(i).ok())
            .map(MaterialId)
    }

    /// All registered ids in registration order.
    pub fn ids(&self) -> impl Iterator<Item = MaterialId> + '_ {
        (0..self.names.len()).filter_map(|i| u32::try_from(i).ok().map(MaterialId))
    }

    /// Number of registered materials.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether no material has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Friction and restitution for one unordered pair of materials.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ContactMaterial {
    /// Coulomb friction coefficient (μ). Values above 1 are allowed.
    pub friction: f64,
    /// Coefficient of restitution in [0, 1].
    pub restitution: f64,
}

impl Default for ContactMaterial {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl ContactMaterial {
    /// Used for any pair without a registered entry.
    pub const DEFAULT: Self = Self {
        friction: 0.3,
        restitution: 0.0,
    };

    /// Create a contact material.
    #[must_use]
    pub const fn new(friction: f64, restitution: f64) -> Self {
        Self {
            friction,
            restitution,
        }
    }

    /// Frictionless contact with the given restitution.
    #[must_use]
    pub const fn frictionless(restitution: f64) -> Self {
        Self::new(0.0, restitution)
    }

    /// Validate the coefficients.
    pub fn validate(&self) -> Result<()> {
        if !self.friction.is_finite() || self.friction < 0.0 {
            return Err(SimError::invalid_config(
                "friction must be finite and non-negative",
            ));
        }

        if !(0.0..=1.0).contains(&self.restitution) {
            return Err(SimError::invalid_config(
                "restitution must be between 0 and 1",
            ));
        }

        Ok(())
    }
}

/// Order-independent key for a pair of materials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MaterialPair {
    /// Smaller id.
    a: MaterialId,
    /// Larger id.
    b: MaterialId,
}

impl MaterialPair {
    /// Create a new material pair (order-independent).
    #[must_use]
    pub fn new(mat_a: MaterialId, mat_b: MaterialId) -> Self {
        if mat_a <= mat_b {
            Self { a: mat_a, b: mat_b }
        } else {
            Self { a: mat_b, b: mat_a }
        }
    }

    /// Both ids, smaller first.
    #[must_use]
    pub const fn ids(&self) -> (MaterialId, MaterialId) {
        (self.a, self.b)
    }

    /// Whether either side is `id`.
    #[must_use]
    pub fn contains(&self, id: MaterialId) -> bool {
        self.a == id || self.b == id
    }
}

impl std::fmt::Display for MaterialPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.a.0, self.b.0)
    }
}

/// Outcome of resolving a pair against a [`ContactMaterialTable`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MaterialLookup {
    /// The pair had an entry.
    Registered(ContactMaterial),
    /// The pair had no entry and the table default was used.
    Fallback(ContactMaterial),
}

impl MaterialLookup {
    /// The contact material to use, registered or not.
    #[must_use]
    pub const fn material(&self) -> ContactMaterial {
        match self {
            Self::Registered(m) | Self::Fallback(m) => *m,
        }
    }

    /// Whether the pair had an entry.
    #[must_use]
    pub const fn is_registered(&self) -> bool {
        matches!(self, Self::Registered(_))
    }
}

/// Pairwise table of contact materials.
///
/// Holds at most one entry per unordered pair. Filling a table for `n`
/// materials that may all touch takes `n(n+1)/2` entries.
#[derive(Debug, Clone)]
pub struct ContactMaterialTable {
    entries: HashMap<MaterialPair, ContactMaterial>,
    default: ContactMaterial,
}

impl Default for ContactMaterialTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ContactMaterialTable {
    /// Create an empty table using [`ContactMaterial::DEFAULT`] as fallback.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            default: ContactMaterial::DEFAULT,
        }
    }

    /// Replace the fallback used for unregistered pairs.
    #[must_use]
    pub fn with_default(mut self, default: ContactMaterial) -> Self {
        self.default = default;
        self
    }

    /// Fallback used for unregistered pairs.
    #[must_use]
    pub fn default_material(&self) -> ContactMaterial {
        self.default
    }

    /// Register the entry for `(a, b)`, returning the entry it replaced.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidConfig`] if the coefficients are invalid.
    pub fn insert(
        &mut self,
        a: MaterialId,
        b: MaterialId,
        entry: ContactMaterial,
    ) -> Result<Option<ContactMaterial>> {
        entry.validate()?;
        let pair = MaterialPair::new(a, b);
        let previous = self.entries.insert(pair, entry);
        if previous.is_some() {
            debug!(%pair, "replaced contact material entry");
        }
        Ok(previous)
    }

    /// Register an entry for every unordered pair drawn from `materials`,
    /// self pairs included.
    ///
    /// # Errors
    ///
    /// Stops at the first invalid entry `make` produces.
    pub fn insert_all_pairs<F>(&mut self, materials: &[MaterialId], mut make: F) -> Result<()>
    where
        F: FnMut(MaterialId, MaterialId) -> ContactMaterial,
    {
        for (i, &a) in materials.iter().enumerate() {
            for &b in &materials[i..] {
                self.insert(a, b, make(a, b))?;
            }
        }
        Ok(())
    }

    /// Entry registered for the unordered pair, if any.
    #[must_use]
    pub fn get(&self, a: MaterialId, b: MaterialId) -> Option<&ContactMaterial> {
        self.entries.get(&MaterialPair::new(a, b))
    }

    /// Entry for the pair, or the fallback when none is registered.
    #[must_use]
    pub fn resolve(&self, a: MaterialId, b: MaterialId) -> MaterialLookup {
        self.get(a, b).map_or(
            MaterialLookup::Fallback(self.default),
            |entry| MaterialLookup::Registered(*entry),
        )
    }

    /// Remove the entry for the pair.
    pub fn remove(&mut self, a: MaterialId, b: MaterialId) -> Option<ContactMaterial> {
        self.entries.remove(&MaterialPair::new(a, b))
    }

    /// Unordered pairs from `materials` that have no entry, sorted.
    #[must_use]
    pub fn missing_pairs(&self, materials: &[MaterialId]) -> Vec<MaterialPair> {
        let mut missing = Vec::new();
        for (i, &a) in materials.iter().enumerate() {
            for &b in &materials[i..] {
                let pair = MaterialPair::new(a, b);
                if !self.entries.contains_key(&pair) {
                    missing.push(pair);
                }
            }
        }
        missing.sort_unstable();
        missing.dedup();
        missing
    }

    /// Number of registered pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over registered pairs (unspecified order).
    pub fn iter(&self) -> impl Iterator<Item = (&MaterialPair, &ContactMaterial)> {
        self.entries.iter()
    }
}
