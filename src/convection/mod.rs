//! The operator-split convection term: coupled (U, T, Wmx) transport with
//! continuity-derived mass flux, per-species scalar transport on shared
//! velocities, and the coordinator that sequences the two phases.

pub mod boundary;
pub mod species;
pub mod split;
pub mod utw;

pub use boundary::{ContinuityBoundary, ContinuityMode};
pub use species::{SpeciesSystem, VelocitySource};
pub use split::{SolverTolerances, SplitConvection};
pub use utw::UtwSystem;
