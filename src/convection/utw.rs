//! Coupled convection of tangential velocity, temperature, and mixture
//! molecular weight.
//!
//! The three fields share one velocity, produced inside every RHS
//! evaluation by integrating the continuity equation
//!
//!   d(r^a rho)/dt + d(r^a rho V)/dx + a r^a rho U = 0
//!
//! from its anchor (see [`ContinuityBoundary`]), with the density
//! derivative supplied by the other split operators. Transport itself is
//! first-order upwind: d(.)/dt = -V d(.)/dx + splitConst.

use std::sync::Arc;

use log::debug;

use super::boundary::{find_stagnation, peak_heat_release, ContinuityBoundary, ContinuityMode};
use crate::error::ConvectionError;
use crate::grid::OneDimGrid;
use crate::ode::{OdeRhs, RhsStatus};
use crate::thermo::MixtureThermo;

/// Offending variable recorded when an RHS evaluation fails.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Fault {
    pub variable: &'static str,
    pub node: usize,
    pub value: f64,
}

/// The (U, T, Wmx) convection sub-system.
///
/// Packed state layout is per-variable node-major:
/// `[U[0..n], T[0..n], Wmx[0..n]]`.
pub struct UtwSystem {
    grid: Arc<OneDimGrid>,
    gas: Arc<dyn MixtureThermo>,

    /// Normalized tangential velocity [1/s].
    pub u: Vec<f64>,
    /// Temperature [K].
    pub temp: Vec<f64>,
    /// Mixture molecular weight [kg/mol].
    pub wmx: Vec<f64>,

    /// Time derivatives, refreshed by every RHS evaluation.
    pub dudt: Vec<f64>,
    pub dtdt: Vec<f64>,
    pub dwdt: Vec<f64>,

    /// Temperature left boundary value.
    pub t_left: f64,
    /// Molecular weight left boundary value.
    pub w_left: f64,
    /// Mass flux boundary value at j = 0 [kg/m^2 s].
    pub r_vzero: f64,

    /// Mass flux V [kg/m^2 s].
    pub v: Vec<f64>,
    /// Radial mass flux r^a V.
    pub rv: Vec<f64>,
    /// Mixture density [kg/m^3].
    pub rho: Vec<f64>,

    drhodt: Vec<f64>,
    split_const_u: Vec<f64>,
    split_const_t: Vec<f64>,
    split_const_w: Vec<f64>,

    dudx: Vec<f64>,
    dtdx: Vec<f64>,
    dwdx: Vec<f64>,

    continuity_bc: ContinuityBoundary,
    fault: Option<Fault>,
}

impl UtwSystem {
    /// Create a system on `grid` with all fields zeroed.
    pub fn new(grid: Arc<OneDimGrid>, gas: Arc<dyn MixtureThermo>) -> Self {
        let n = grid.n_points();
        Self {
            grid,
            gas,
            u: vec![0.0; n],
            temp: vec![0.0; n],
            wmx: vec![0.0; n],
            dudt: vec![0.0; n],
            dtdt: vec![0.0; n],
            dwdt: vec![0.0; n],
            t_left: 0.0,
            w_left: 0.0,
            r_vzero: 0.0,
            v: vec![0.0; n],
            rv: vec![0.0; n],
            rho: vec![0.0; n],
            drhodt: vec![0.0; n],
            split_const_u: vec![0.0; n],
            split_const_t: vec![0.0; n],
            split_const_w: vec![0.0; n],
            dudx: vec![0.0; n],
            dtdx: vec![0.0; n],
            dwdx: vec![0.0; n],
            continuity_bc: ContinuityBoundary::Left,
            fault: None,
        }
    }

    /// Rebuild every per-node buffer for a new grid. The continuity BC
    /// falls back to `Left`; anchors from the old grid are meaningless.
    pub fn resize(&mut self, grid: Arc<OneDimGrid>) {
        let n = grid.n_points();
        self.grid = grid;
        for buf in [
            &mut self.u,
            &mut self.temp,
            &mut self.wmx,
            &mut self.dudt,
            &mut self.dtdt,
            &mut self.dwdt,
            &mut self.v,
            &mut self.rv,
            &mut self.rho,
            &mut self.drhodt,
            &mut self.split_const_u,
            &mut self.split_const_t,
            &mut self.split_const_w,
            &mut self.dudx,
            &mut self.dtdx,
            &mut self.dwdx,
        ] {
            buf.clear();
            buf.resize(n, 0.0);
        }
        self.continuity_bc = ContinuityBoundary::Left;
        self.fault = None;
    }

    /// Number of grid nodes.
    pub fn n_points(&self) -> usize {
        self.grid.n_points()
    }

    /// The shared grid.
    pub fn grid(&self) -> &Arc<OneDimGrid> {
        &self.grid
    }

    /// The active continuity boundary condition.
    pub fn continuity_bc(&self) -> ContinuityBoundary {
        self.continuity_bc
    }

    pub(crate) fn last_fault(&self) -> Option<Fault> {
        self.fault
    }

    /// Zero the three split-constant arrays.
    pub fn reset_split_constants(&mut self) {
        self.split_const_u.fill(0.0);
        self.split_const_t.fill(0.0);
        self.split_const_w.fill(0.0);
    }

    /// Install the additive forcings carried over from the other split
    /// operators.
    pub fn set_split_constants(
        &mut self,
        u: &[f64],
        t: &[f64],
        w: &[f64],
    ) -> Result<(), ConvectionError> {
        let n = self.n_points();
        for arr in [u, t, w] {
            if arr.len() != n {
                return Err(ConvectionError::dimension_mismatch(
                    format!("{} nodes", n),
                    format!("{}", arr.len()),
                ));
            }
        }
        self.split_const_u.copy_from_slice(u);
        self.split_const_t.copy_from_slice(t);
        self.split_const_w.copy_from_slice(w);
        Ok(())
    }

    /// Install the density derivative contributed by the other split
    /// operators, used inside the continuity integration.
    pub fn set_density_derivative(&mut self, drhodt: &[f64]) -> Result<(), ConvectionError> {
        if drhodt.len() != self.n_points() {
            return Err(ConvectionError::dimension_mismatch(
                format!("{} nodes", self.n_points()),
                format!("{}", drhodt.len()),
            ));
        }
        self.drhodt.copy_from_slice(drhodt);
        Ok(())
    }

    /// The installed density derivative.
    pub fn density_derivative(&self) -> &[f64] {
        &self.drhodt
    }

    /// Re-anchor the continuity equation. On failure the previous
    /// boundary condition is preserved and the state is untouched.
    ///
    /// Must only be called between solver steps.
    pub fn update_continuity_boundary_condition(
        &mut self,
        qdot: &[f64],
        mode: ContinuityMode,
    ) -> Result<(), ConvectionError> {
        match mode {
            ContinuityMode::Left => {
                self.continuity_bc = ContinuityBoundary::Left;
            }
            ContinuityMode::Zero => {
                let (j, xv) = find_stagnation(&self.grid.x, &self.rv)?;
                debug!("continuity anchored at stagnation point x = {:e} (cell {})", xv, j);
                self.continuity_bc = ContinuityBoundary::Zero {
                    j_cont_bc: j,
                    x_vzero: xv,
                };
            }
            ContinuityMode::Qdot => {
                if qdot.len() != self.n_points() {
                    return Err(ConvectionError::dimension_mismatch(
                        format!("{} nodes", self.n_points()),
                        format!("{}", qdot.len()),
                    ));
                }
                let j = peak_heat_release(qdot)?;
                debug!("continuity anchored at peak heat release, node {}", j);
                self.rv[j] = 0.0;
                self.continuity_bc = ContinuityBoundary::Qdot { j_cont_bc: j };
            }
        }
        Ok(())
    }

    /// Pack (U, T, Wmx) into the solver vector.
    pub fn roll_y(&self, y: &mut [f64]) {
        let n = self.n_points();
        y[..n].copy_from_slice(&self.u);
        y[n..2 * n].copy_from_slice(&self.temp);
        y[2 * n..3 * n].copy_from_slice(&self.wmx);
    }

    /// Unpack the solver vector into (U, T, Wmx).
    pub fn unroll_y(&mut self, y: &[f64]) {
        let n = self.n_points();
        self.u.copy_from_slice(&y[..n]);
        self.temp.copy_from_slice(&y[n..2 * n]);
        self.wmx.copy_from_slice(&y[2 * n..3 * n]);
    }

    /// Pack the time derivatives into the solver vector.
    pub fn roll_ydot(&self, ydot: &mut [f64]) {
        let n = self.n_points();
        ydot[..n].copy_from_slice(&self.dudt);
        ydot[n..2 * n].copy_from_slice(&self.dtdt);
        ydot[2 * n..3 * n].copy_from_slice(&self.dwdt);
    }

    /// Evaluate the RHS at the current unpacked state, refreshing
    /// density, mass flux, and all time derivatives without advancing
    /// time.
    pub fn evaluate(&mut self, t: f64) -> Result<(), ConvectionError> {
        let n3 = 3 * self.n_points();
        let mut y = vec![0.0; n3];
        let mut ydot = vec![0.0; n3];
        self.roll_y(&mut y);
        match self.rhs(t, &y, &mut ydot) {
            RhsStatus::Ok => Ok(()),
            RhsStatus::RecoverableFailure => Err(match self.fault {
                Some(Fault {
                    variable,
                    node,
                    value,
                }) => ConvectionError::InvariantViolation {
                    variable,
                    node,
                    value,
                },
                None => ConvectionError::SolverFailure {
                    t,
                    reason: "convection RHS not evaluable at the current state".into(),
                },
            }),
        }
    }

    /// Drop in rV across the cell [x[j], x[j+1]]:
    /// hh r^a (drho/dt + a rho (U[j] + U[j+1]) / 2), with the strain
    /// contribution averaged over the cell.
    fn cell_drop(&self, j: usize) -> f64 {
        let alpha = self.grid.alpha() as f64;
        self.grid.hh[j]
            * self.grid.rm(j)
            * (self.drhodt[j] + alpha * self.rho[j] * 0.5 * (self.u[j] + self.u[j + 1]))
    }

    /// Nodal continuity source r^a (drho/dt + a rho U), used for the
    /// partial cells around a floating anchor.
    fn node_strength(&self, j: usize) -> f64 {
        let alpha = self.grid.alpha() as f64;
        self.grid.rm(j) * (self.drhodt[j] + alpha * self.rho[j] * self.u[j])
    }

    /// Integrate continuity from the anchor to fill rV, then V.
    fn update_continuity(&mut self) {
        let n = self.n_points();
        match self.continuity_bc {
            ContinuityBoundary::Left => {
                self.rv[0] = self.r_vzero;
                for j in 1..n {
                    self.rv[j] = self.rv[j - 1] - self.cell_drop(j - 1);
                }
            }
            ContinuityBoundary::Zero { j_cont_bc: jc, x_vzero } => {
                let x = &self.grid.x;
                self.rv[jc] = (x_vzero - x[jc]) * self.node_strength(jc);
                if jc + 1 < n {
                    self.rv[jc + 1] = -(x[jc + 1] - x_vzero) * self.node_strength(jc + 1);
                }
                for j in (0..jc).rev() {
                    self.rv[j] = self.rv[j + 1] + self.cell_drop(j);
                }
                for j in jc + 2..n {
                    self.rv[j] = self.rv[j - 1] - self.cell_drop(j - 1);
                }
            }
            ContinuityBoundary::Qdot { j_cont_bc: jc } => {
                self.rv[jc] = 0.0;
                for j in (0..jc).rev() {
                    self.rv[j] = self.rv[j + 1] + self.cell_drop(j);
                }
                for j in jc + 1..n {
                    self.rv[j] = self.rv[j - 1] - self.cell_drop(j - 1);
                }
            }
        }
        self.rv_to_v();
    }

    /// V = rV / r^a, with the symmetric limit V = rV at a centerline node
    /// where r = 0.
    fn rv_to_v(&mut self) {
        for j in 0..self.n_points() {
            let rm = self.grid.rm(j);
            self.v[j] = if rm == 0.0 { self.rv[j] } else { self.rv[j] / rm };
        }
    }
}

/// First-order upwind derivative of f at every node, selected by the
/// local velocity sign. The left ghost value serves the backward
/// difference at j = 0; the right boundary falls back to the backward
/// difference.
fn upwind_derivs(grid: &OneDimGrid, v: &[f64], f: &[f64], left_ghost: f64, out: &mut [f64]) {
    let n = f.len();
    for j in 0..n {
        out[j] = if v[j] >= 0.0 || j == n - 1 {
            if j == 0 {
                (f[0] - left_ghost) / grid.hh[0]
            } else {
                (f[j] - f[j - 1]) / grid.hh[j - 1]
            }
        } else {
            (f[j + 1] - f[j]) / grid.hh[j]
        };
    }
}

impl OdeRhs for UtwSystem {
    fn state_size(&self) -> usize {
        3 * self.n_points()
    }

    fn rhs(&mut self, _t: f64, y: &[f64], ydot: &mut [f64]) -> RhsStatus {
        self.fault = None;
        self.unroll_y(y);
        let n = self.n_points();

        // Left Dirichlet values.
        self.temp[0] = self.t_left;
        self.wmx[0] = self.w_left;

        for j in 0..n {
            if !(self.temp[j] > 0.0) {
                self.fault = Some(Fault {
                    variable: "T",
                    node: j,
                    value: self.temp[j],
                });
                return RhsStatus::RecoverableFailure;
            }
            self.rho[j] = self.gas.density(self.temp[j], self.wmx[j]);
            if !self.rho[j].is_finite() || self.rho[j] <= 0.0 {
                self.fault = Some(Fault {
                    variable: "rho",
                    node: j,
                    value: self.rho[j],
                });
                return RhsStatus::RecoverableFailure;
            }
        }

        self.update_continuity();

        upwind_derivs(&self.grid, &self.v, &self.u, self.u[0], &mut self.dudx);
        upwind_derivs(&self.grid, &self.v, &self.temp, self.t_left, &mut self.dtdx);
        upwind_derivs(&self.grid, &self.v, &self.wmx, self.w_left, &mut self.dwdx);

        for j in 1..n {
            self.dudt[j] = -self.v[j] * self.dudx[j] + self.split_const_u[j];
            self.dtdt[j] = -self.v[j] * self.dtdx[j] + self.split_const_t[j];
            self.dwdt[j] = -self.v[j] * self.dwdx[j] + self.split_const_w[j];
        }
        // Dirichlet nodes hold; U at the boundary carries only its split
        // constant.
        self.dudt[0] = self.split_const_u[0];
        self.dtdt[0] = 0.0;
        self.dwdt[0] = 0.0;

        for j in 0..n {
            if !(self.dudt[j].is_finite() && self.dtdt[j].is_finite() && self.dwdt[j].is_finite())
            {
                self.fault = Some(Fault {
                    variable: "ydot",
                    node: j,
                    value: f64::NAN,
                });
                return RhsStatus::RecoverableFailure;
            }
        }

        self.roll_ydot(ydot);
        RhsStatus::Ok
    }
}
