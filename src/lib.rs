//! # flame-rs
//!
//! Operator-split convection core for one-dimensional strained premixed
//! flames.
//!
//! The state variables are the normalized tangential velocity U, the
//! temperature T, the mixture molecular weight Wmx, and the species mass
//! fractions Y_k, all on a shared 1D grid along the flame-normal
//! coordinate. The crate provides:
//! - the coupled (U, T, Wmx) convection sub-system, with the mass flux V
//!   obtained by integrating the continuity equation from a switchable
//!   anchor (left boundary, floating stagnation point, or peak heat
//!   release);
//! - per-species scalar transport on independent node windows, coupled to
//!   the UTW phase through a time-interpolated velocity series (or, on
//!   the quasi-2D path, externally prescribed velocity fields);
//! - the split coordinator that sequences the two phases, distributes
//!   split constants and the density-derivative feedback from the other
//!   operators, and exposes consistent states and time derivatives;
//! - the explicit adaptive ODE solver (one-step mode, per-component
//!   tolerances, dense output) the scheme is built on.
//!
//! Chemistry, diffusion, regridding, and the outer splitting driver are
//! external collaborators; their seams are the [`thermo::MixtureThermo`]
//! trait, the read-only [`grid::OneDimGrid`], and the coordinator's
//! setter surface.

pub mod convection;
pub mod error;
pub mod grid;
pub mod interp;
pub mod ode;
pub mod thermo;

// Re-export main types for convenience
pub use convection::{
    ContinuityBoundary, ContinuityMode, SolverTolerances, SpeciesSystem, SplitConvection,
    UtwSystem, VelocitySource,
};
pub use error::ConvectionError;
pub use grid::{Geometry, OneDimGrid};
pub use interp::{BilinearInterpolator, VelocityTimeSeries};
pub use ode::{ExplicitSolver, OdeRhs, RhsStatus};
pub use thermo::{IdealGasMixture, MixtureThermo, GAS_CONSTANT};
