//! Error types for simulation operations.

use thiserror::Error;

/// Errors that can occur while assembling or stepping a world.
///
/// Contact-material misses and deep penetration are deliberately absent:
/// both are absorbed by the step (fallback material, clamped correction)
/// and only ever show up in diagnostics.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    /// Invalid body ID referenced.
    #[error("invalid body ID: {0}")]
    InvalidBodyId(u64),

    /// Invalid timestep.
    #[error("invalid timestep: {0} (must be positive and finite)")]
    InvalidTimestep(f64),

    /// Simulation diverged (`NaN` or `Inf` detected).
    #[error("simulation diverged: {reason}")]
    Diverged {
        /// Description of what went wrong.
        reason: String,
    },

    /// Invalid configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },

    /// Invalid mass properties.
    #[error("invalid mass properties: {reason}")]
    InvalidMassProperties {
        /// Description of what's wrong.
        reason: String,
    },
}

impl SimError {
    /// Create a diverged error.
    #[must_use]
    pub fn diverged(reason: impl Into<String>) -> Self {
        Self::Diverged {
            reason: reason.into(),
        }
    }

    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create an invalid mass properties error.
    #[must_use]
    pub fn invalid_mass(reason: impl Into<String>) -> Self {
        Self::InvalidMassProperties {
            reason: reason.into(),
        }
    }

    /// Check if this is a divergence error.
    #[must_use]
    pub fn is_diverged(&self) -> bool {
        matches!(self, Self::Diverged { .. })
    }

    /// Check if this is a configuration error.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::InvalidConfig { .. })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SimError::InvalidBodyId(42);
        assert!(err.to_string().contains("42"));

        let err = SimError::InvalidTimestep(-0.5);
        assert!(err.to_string().contains("-0.5"));

        let err = SimError::diverged("NaN in velocity");
        assert!(err.to_string().contains("NaN"));
    }

    #[test]
    fn test_error_predicates() {
        assert!(SimError::diverged("x").is_diverged());
        assert!(!SimError::diverged("x").is_config_error());
        assert!(SimError::invalid_config("friction cannot be negative").is_config_error());
        assert!(matches!(
            SimError::invalid_mass("negative"),
            SimError::InvalidMassProperties { .. }
        ));
    }
}
