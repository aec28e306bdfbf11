//! Error types for the convection split core.

use thiserror::Error;

/// Errors reported by the convection sub-systems and their coordinator.
#[derive(Error, Debug)]
pub enum ConvectionError {
    /// Mismatch between the sizes of related arrays.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: String, actual: String },

    /// A state variable left the physically meaningful range.
    #[error("invariant violation: {variable} = {value} at node {node}")]
    InvariantViolation {
        variable: &'static str,
        node: usize,
        value: f64,
    },

    /// A setter rejected an inconsistent configuration. State is unchanged.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A continuity boundary condition update could not be applied.
    /// The previous boundary condition is preserved.
    #[error("continuity boundary condition: {0}")]
    BoundaryCondition(String),

    /// The ODE solver failed to reach the requested time.
    #[error("solver failure at t = {t}: {reason}")]
    SolverFailure { t: f64, reason: String },
}

impl ConvectionError {
    /// Create a dimension mismatch error.
    pub fn dimension_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::DimensionMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}
