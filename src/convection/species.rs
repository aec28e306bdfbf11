//! Convection of a single species mass fraction on a prescribed velocity
//! field.
//!
//! Each species integrates on its own node window [start..=stop] and
//! never touches nodes outside it. The velocity comes from the time
//! series published by the UTW phase, or, on the quasi-2D path, from
//! externally supplied (v_z, v_r) fields sampled at (x, t).

use std::sync::Arc;

use crate::error::ConvectionError;
use crate::grid::OneDimGrid;
use crate::interp::{BilinearInterpolator, VelocityTimeSeries};
use crate::ode::{OdeRhs, RhsStatus};

/// Where a species system reads its velocity.
#[derive(Clone)]
pub enum VelocitySource {
    /// Not yet configured; the RHS reports a recoverable failure.
    Unset,
    /// Linear-in-time interpolation of full-grid profiles.
    TimeSeries(Arc<VelocityTimeSeries>),
    /// Externally prescribed quasi-2D fields; v_z drives the normal
    /// transport, v_r is carried for the radial terms of other operators.
    Quasi2d {
        vz: Arc<BilinearInterpolator>,
        vr: Arc<BilinearInterpolator>,
    },
}

/// Single-species convection sub-system.
pub struct SpeciesSystem {
    grid: Arc<OneDimGrid>,
    /// Species index, for identification only.
    pub species_index: usize,
    /// Left boundary mass fraction, applied when the window starts at
    /// the domain boundary.
    pub y_left: f64,

    start: usize,
    stop: usize,
    /// Full-grid split constants, indexed by global node.
    split_const: Vec<f64>,
    velocity: VelocitySource,
    /// Velocity on the active window.
    v: Vec<f64>,
    /// Full-profile scratch for time-series sampling.
    v_full: Vec<f64>,
}

impl SpeciesSystem {
    /// Create a system active on the whole grid.
    pub fn new(grid: Arc<OneDimGrid>, species_index: usize) -> Self {
        let n = grid.n_points();
        Self {
            grid,
            species_index,
            y_left: 0.0,
            start: 0,
            stop: n - 1,
            split_const: vec![0.0; n],
            velocity: VelocitySource::Unset,
            v: vec![0.0; n],
            v_full: vec![0.0; n],
        }
    }

    /// Rebuild for a new grid; the window resets to the whole domain.
    pub fn resize(&mut self, grid: Arc<OneDimGrid>) {
        let n = grid.n_points();
        self.grid = grid;
        self.start = 0;
        self.stop = n - 1;
        self.split_const.clear();
        self.split_const.resize(n, 0.0);
        self.v.clear();
        self.v.resize(n, 0.0);
        self.v_full.clear();
        self.v_full.resize(n, 0.0);
    }

    /// Active window as (start, stop), inclusive.
    pub fn domain(&self) -> (usize, usize) {
        (self.start, self.stop)
    }

    /// Set the active node window.
    pub fn set_domain(&mut self, start: usize, stop: usize) -> Result<(), ConvectionError> {
        let n = self.grid.n_points();
        if start > stop || stop >= n {
            return Err(ConvectionError::InvalidConfig(format!(
                "species {} domain [{}, {}] out of range for {} nodes",
                self.species_index, start, stop, n
            )));
        }
        self.start = start;
        self.stop = stop;
        self.v.clear();
        self.v.resize(stop - start + 1, 0.0);
        Ok(())
    }

    /// Install the velocity source.
    pub fn set_velocity(&mut self, source: VelocitySource) {
        self.velocity = source;
    }

    /// Install the full-grid split constants for this species.
    pub fn set_split_constants(&mut self, split_const: &[f64]) -> Result<(), ConvectionError> {
        if split_const.len() != self.grid.n_points() {
            return Err(ConvectionError::dimension_mismatch(
                format!("{} nodes", self.grid.n_points()),
                format!("{}", split_const.len()),
            ));
        }
        self.split_const.copy_from_slice(split_const);
        Ok(())
    }

    /// Zero the split constants.
    pub fn reset_split_constants(&mut self) {
        self.split_const.fill(0.0);
    }

    /// Sample the velocity source onto the active window.
    fn update_v(&mut self, t: f64) -> Result<(), ()> {
        match &self.velocity {
            VelocitySource::Unset => Err(()),
            VelocitySource::TimeSeries(series) => {
                if series.is_empty() {
                    return Err(());
                }
                series.sample_into(t, &mut self.v_full);
                for i in 0..self.v.len() {
                    self.v[i] = self.v_full[self.start + i];
                }
                Ok(())
            }
            VelocitySource::Quasi2d { vz, .. } => {
                for i in 0..self.v.len() {
                    self.v[i] = vz.eval(self.grid.x[self.start + i], t);
                }
                Ok(())
            }
        }
    }

    /// Upwind transport derivative on the active window against the
    /// currently sampled velocity.
    fn transport_rhs(&self, y: &[f64], ydot: &mut [f64]) {
        let m = y.len();
        let hh = &self.grid.hh;
        // The boundary node is pinned to the Dirichlet value when the
        // window starts at the domain edge.
        let val = |i: usize| {
            if i == 0 && self.start == 0 {
                self.y_left
            } else {
                y[i]
            }
        };

        for i in 0..m {
            let j = self.start + i;
            let v = self.v[i];
            let backward = v >= 0.0;
            let dydx = if (backward && i > 0) || i == m - 1 {
                (val(i) - val(i - 1)) / hh[j - 1]
            } else if !backward || self.start > 0 {
                (val(i + 1) - val(i)) / hh[j]
            } else {
                // Inflow at the true left boundary: the ghost carries the
                // Dirichlet value the node already holds.
                0.0
            };
            ydot[i] = -v * dydx + self.split_const[j];
        }
        if self.start == 0 {
            ydot[0] = self.split_const[0];
        }
    }

    /// Evaluate the transport derivative against an explicit full-grid
    /// velocity profile, without touching the installed source. Used by
    /// the coordinator's `evaluate`.
    pub fn evaluate_with_velocity(&mut self, v_full: &[f64], y: &[f64], ydot: &mut [f64]) {
        if y.len() < 3 {
            ydot.fill(0.0);
            return;
        }
        for i in 0..self.v.len() {
            self.v[i] = v_full[self.start + i];
        }
        self.transport_rhs(y, ydot);
    }
}

impl OdeRhs for SpeciesSystem {
    fn state_size(&self) -> usize {
        self.stop - self.start + 1
    }

    fn rhs(&mut self, t: f64, y: &[f64], ydot: &mut [f64]) -> RhsStatus {
        // A window shorter than three nodes is inert on this step.
        if y.len() < 3 {
            ydot.fill(0.0);
            return RhsStatus::Ok;
        }
        if self.update_v(t).is_err() {
            return RhsStatus::RecoverableFailure;
        }
        self.transport_rhs(y, ydot);
        if ydot.iter().any(|d| !d.is_finite()) {
            return RhsStatus::RecoverableFailure;
        }
        RhsStatus::Ok
    }
}
