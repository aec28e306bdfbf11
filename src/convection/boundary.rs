//! Continuity boundary condition: where the integrated continuity
//! equation is anchored along the domain.
//!
//! The anchor is recomputed only between solver steps, through
//! `UtwSystem::update_continuity_boundary_condition`; within one step the
//! variant and its anchor index are constant.

use crate::error::ConvectionError;

/// Anchoring of the integrated continuity equation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ContinuityBoundary {
    /// Integrate rightward from the prescribed mass flux at the left
    /// boundary.
    Left,
    /// Zero mass flux at a floating stagnation point located between
    /// nodes `j_cont_bc` and `j_cont_bc + 1`; integrate outward in both
    /// directions.
    Zero { j_cont_bc: usize, x_vzero: f64 },
    /// Zero mass flux at the node of peak heat release; integrate outward
    /// in both directions.
    Qdot { j_cont_bc: usize },
}

/// Requested anchoring mode, before the anchor data is computed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContinuityMode {
    Left,
    Zero,
    Qdot,
}

impl ContinuityBoundary {
    /// The mode of this boundary condition.
    pub fn mode(&self) -> ContinuityMode {
        match self {
            ContinuityBoundary::Left => ContinuityMode::Left,
            ContinuityBoundary::Zero { .. } => ContinuityMode::Zero,
            ContinuityBoundary::Qdot { .. } => ContinuityMode::Qdot,
        }
    }

    /// Anchor node index, if this condition has one.
    pub fn anchor(&self) -> Option<usize> {
        match *self {
            ContinuityBoundary::Left => None,
            ContinuityBoundary::Zero { j_cont_bc, .. } => Some(j_cont_bc),
            ContinuityBoundary::Qdot { j_cont_bc } => Some(j_cont_bc),
        }
    }
}

/// Locate the stagnation point from the first sign change of rV,
/// scanning from the left. Returns the cell index and the linearly
/// interpolated zero crossing.
pub(crate) fn find_stagnation(x: &[f64], rv: &[f64]) -> Result<(usize, f64), ConvectionError> {
    for j in 0..rv.len() - 1 {
        if rv[j] * rv[j + 1] < 0.0 {
            let frac = rv[j] / (rv[j] - rv[j + 1]);
            return Ok((j, x[j] + frac * (x[j + 1] - x[j])));
        }
    }
    Err(ConvectionError::BoundaryCondition(
        "no sign change in rV; stagnation point not found".into(),
    ))
}

/// Node of peak heat release.
pub(crate) fn peak_heat_release(qdot: &[f64]) -> Result<usize, ConvectionError> {
    if qdot.is_empty() {
        return Err(ConvectionError::BoundaryCondition(
            "empty heat release profile".into(),
        ));
    }
    let mut j_max = 0;
    for (j, &q) in qdot.iter().enumerate() {
        if q > qdot[j_max] {
            j_max = j;
        }
    }
    Ok(j_max)
}
