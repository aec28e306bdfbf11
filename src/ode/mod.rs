//! Narrow ODE capability and the explicit adaptive solver that drives the
//! convection split scheme.
//!
//! A system is anything exposing its packed state size and a right-hand
//! side `ydot = f(t, y)` that reports success or a recoverable failure.
//! The solver is generic over that capability.

pub mod solver;

pub use solver::ExplicitSolver;

/// Outcome of one right-hand-side evaluation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RhsStatus {
    /// Derivatives are valid.
    Ok,
    /// Derivatives could not be evaluated at this state. The solver
    /// retries from the last accepted state with a smaller step; only a
    /// repeated failure propagates as a solver error.
    RecoverableFailure,
}

/// Explicit ODE system y' = f(t, y).
pub trait OdeRhs {
    /// Number of packed state components.
    fn state_size(&self) -> usize;

    /// Evaluate ydot = f(t, y).
    fn rhs(&mut self, t: f64, y: &[f64], ydot: &mut [f64]) -> RhsStatus;
}
