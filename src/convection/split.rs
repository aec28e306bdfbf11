//! Coordinator for the split convection term.
//!
//! Owns the UTW sub-system and one scalar sub-system per species, drives
//! them to a common end time, and carries the velocity coupling between
//! the two phases: the UTW integration publishes a time series of mass
//! flux profiles, and every species integration reads it back through an
//! immutable snapshot.

use std::sync::Arc;
use std::time::Instant;

use log::{debug, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::boundary::{ContinuityBoundary, ContinuityMode};
use super::species::{SpeciesSystem, VelocitySource};
use super::utw::UtwSystem;
use crate::error::ConvectionError;
use crate::grid::OneDimGrid;
use crate::interp::{BilinearInterpolator, VelocityTimeSeries};
use crate::ode::ExplicitSolver;
use crate::thermo::MixtureThermo;

/// Integration tolerances for the split sub-systems. The UTW solver uses
/// per-variable absolute tolerances; every species solver shares the
/// scalar mass-fraction tolerance.
#[derive(Clone, Copy, Debug)]
pub struct SolverTolerances {
    pub reltol: f64,
    pub abstol_u: f64,
    pub abstol_t: f64,
    pub abstol_w: f64,
    pub abstol_y: f64,
}

impl Default for SolverTolerances {
    fn default() -> Self {
        Self {
            reltol: 1e-8,
            abstol_u: 1e-7,
            abstol_t: 1e-8,
            abstol_w: 1e-7,
            abstol_y: 1e-8,
        }
    }
}

/// The complete convection term: one UTW solver plus N species solvers.
pub struct SplitConvection {
    grid: Arc<OneDimGrid>,
    gas: Arc<dyn MixtureThermo>,
    tol: SolverTolerances,

    utw: ExplicitSolver<UtwSystem>,
    species: Vec<ExplicitSolver<SpeciesSystem>>,

    /// Species mass fractions, one row per species.
    y: Vec<Vec<f64>>,
    /// Species time derivatives, refreshed by `evaluate`.
    dydt: Vec<Vec<f64>>,

    t_initial: f64,
    t_current: f64,
    v_interp: Arc<VelocityTimeSeries>,
    quasi2d: bool,
    last_n_steps: usize,
    packed: Vec<f64>,
}

impl SplitConvection {
    /// Create a coordinator for `n_spec` species on `grid`.
    pub fn new(
        grid: Arc<OneDimGrid>,
        gas: Arc<dyn MixtureThermo>,
        n_spec: usize,
        tol: SolverTolerances,
    ) -> Self {
        let n = grid.n_points();
        let utw = ExplicitSolver::new(UtwSystem::new(grid.clone(), gas.clone()));
        let species = (0..n_spec)
            .map(|k| ExplicitSolver::new(SpeciesSystem::new(grid.clone(), k)))
            .collect();
        Self {
            grid,
            gas,
            tol,
            utw,
            species,
            y: vec![vec![0.0; n]; n_spec],
            dydt: vec![vec![0.0; n]; n_spec],
            t_initial: 0.0,
            t_current: 0.0,
            v_interp: Arc::new(VelocityTimeSeries::new()),
            quasi2d: false,
            last_n_steps: 0,
            packed: Vec::new(),
        }
    }

    /// Number of grid nodes.
    pub fn n_points(&self) -> usize {
        self.grid.n_points()
    }

    /// Number of species.
    pub fn n_species(&self) -> usize {
        self.species.len()
    }

    /// The shared grid.
    pub fn grid(&self) -> &Arc<OneDimGrid> {
        &self.grid
    }

    /// Swap in a new grid after a regrid. All per-node state is
    /// reallocated and zeroed; `set_state` must be called before the next
    /// step.
    pub fn resize(&mut self, grid: Arc<OneDimGrid>) {
        let n = grid.n_points();
        self.grid = grid.clone();
        self.utw.system_mut().resize(grid.clone());
        self.utw.resize_to_system();
        for solver in &mut self.species {
            solver.system_mut().resize(grid.clone());
            solver.resize_to_system();
        }
        for row in self.y.iter_mut().chain(self.dydt.iter_mut()) {
            row.clear();
            row.resize(n, 0.0);
        }
        self.v_interp = Arc::new(VelocityTimeSeries::new());
    }

    /// Replace the integration tolerances.
    pub fn set_tolerances(&mut self, tol: SolverTolerances) -> Result<(), ConvectionError> {
        self.tol = tol;
        self.apply_utw_tolerances()
    }

    fn apply_utw_tolerances(&mut self) -> Result<(), ConvectionError> {
        let n = self.grid.n_points();
        let mut abstol = vec![self.tol.abstol_u; 3 * n];
        abstol[n..2 * n].fill(self.tol.abstol_t);
        abstol[2 * n..].fill(self.tol.abstol_w);
        self.utw.set_tolerances(self.tol.reltol, &abstol)
    }

    /// Install the state at the start of a split step.
    pub fn set_state(
        &mut self,
        u: &[f64],
        temp: &[f64],
        y: &[Vec<f64>],
        t_initial: f64,
    ) -> Result<(), ConvectionError> {
        let n = self.grid.n_points();
        let n_spec = self.species.len();
        if u.len() != n || temp.len() != n {
            return Err(ConvectionError::dimension_mismatch(
                format!("{} nodes", n),
                format!("U: {}, T: {}", u.len(), temp.len()),
            ));
        }
        if y.len() != n_spec || y.iter().any(|row| row.len() != n) {
            return Err(ConvectionError::dimension_mismatch(
                format!("{} species rows of {} nodes", n_spec, n),
                format!("{} rows", y.len()),
            ));
        }
        if let Some(j) = temp.iter().position(|&t| !(t > 0.0)) {
            return Err(ConvectionError::InvariantViolation {
                variable: "T",
                node: j,
                value: temp[j],
            });
        }

        let sys = self.utw.system_mut();
        sys.u.copy_from_slice(u);
        sys.temp.copy_from_slice(temp);
        let mut col = vec![0.0; n_spec];
        for j in 0..n {
            for (k, row) in y.iter().enumerate() {
                col[k] = row[j];
            }
            sys.wmx[j] = self.gas.mean_molecular_weight(&col);
        }
        for (dst, src) in self.y.iter_mut().zip(y) {
            dst.copy_from_slice(src);
        }
        self.t_initial = t_initial;
        self.t_current = t_initial;
        Ok(())
    }

    /// Install the left boundary values for temperature and species.
    pub fn set_left_bc(&mut self, t_left: f64, y_left: &[f64]) -> Result<(), ConvectionError> {
        if y_left.len() != self.species.len() {
            return Err(ConvectionError::dimension_mismatch(
                format!("{} species", self.species.len()),
                format!("{}", y_left.len()),
            ));
        }
        if !(t_left > 0.0) {
            return Err(ConvectionError::InvariantViolation {
                variable: "Tleft",
                node: 0,
                value: t_left,
            });
        }
        let w_left = self.gas.mean_molecular_weight(y_left);
        let sys = self.utw.system_mut();
        sys.t_left = t_left;
        sys.w_left = w_left;
        for (solver, &yl) in self.species.iter_mut().zip(y_left) {
            solver.system_mut().y_left = yl;
        }
        Ok(())
    }

    /// Prescribe the mass flux at the left boundary, used by the `Left`
    /// continuity condition.
    pub fn set_rvzero(&mut self, r_vzero: f64) {
        self.utw.system_mut().r_vzero = r_vzero;
    }

    /// Set the active node window of every species. Rejected as a whole
    /// if any window is out of range.
    pub fn set_species_domains(
        &mut self,
        start: &[usize],
        stop: &[usize],
    ) -> Result<(), ConvectionError> {
        let n = self.grid.n_points();
        let n_spec = self.species.len();
        if start.len() != n_spec || stop.len() != n_spec {
            return Err(ConvectionError::dimension_mismatch(
                format!("{} species", n_spec),
                format!("start: {}, stop: {}", start.len(), stop.len()),
            ));
        }
        for k in 0..n_spec {
            if start[k] > stop[k] || stop[k] >= n {
                return Err(ConvectionError::InvalidConfig(format!(
                    "species {} domain [{}, {}] out of range for {} nodes",
                    k, start[k], stop[k], n
                )));
            }
        }
        for (k, solver) in self.species.iter_mut().enumerate() {
            solver.system_mut().set_domain(start[k], stop[k])?;
            solver.resize_to_system();
        }
        Ok(())
    }

    /// Install the density derivative contributed by the other split
    /// operators.
    pub fn set_density_derivative(&mut self, drhodt: &[f64]) -> Result<(), ConvectionError> {
        self.utw.system_mut().set_density_derivative(drhodt)
    }

    /// Install the split constants for U, T, and every species. The
    /// molecular weight constant is derived from the species constants:
    /// since 1/Wmx = sum(Y_k / W_k), dWmx/dt = -Wmx^2 sum(Ydot_k / W_k).
    pub fn set_split_constants(
        &mut self,
        split_u: &[f64],
        split_t: &[f64],
        split_y: &[Vec<f64>],
    ) -> Result<(), ConvectionError> {
        let n = self.grid.n_points();
        let n_spec = self.species.len();
        if split_y.len() != n_spec || split_y.iter().any(|row| row.len() != n) {
            return Err(ConvectionError::dimension_mismatch(
                format!("{} species rows of {} nodes", n_spec, n),
                format!("{} rows", split_y.len()),
            ));
        }

        let mut split_w = vec![0.0; n];
        let mut col = vec![0.0; n_spec];
        {
            let wmx = &self.utw.system().wmx;
            for j in 0..n {
                for (k, row) in split_y.iter().enumerate() {
                    col[k] = row[j];
                }
                split_w[j] =
                    -wmx[j] * wmx[j] * self.gas.inverse_mean_molecular_weight(&col);
            }
        }
        self.utw
            .system_mut()
            .set_split_constants(split_u, split_t, &split_w)?;
        for (solver, row) in self.species.iter_mut().zip(split_y) {
            solver.system_mut().set_split_constants(row)?;
        }
        Ok(())
    }

    /// Zero every split constant.
    pub fn reset_split_constants(&mut self) {
        self.utw.system_mut().reset_split_constants();
        for solver in &mut self.species {
            solver.system_mut().reset_split_constants();
        }
    }

    /// Re-anchor the continuity equation; see
    /// [`UtwSystem::update_continuity_boundary_condition`].
    pub fn update_continuity_boundary_condition(
        &mut self,
        qdot: &[f64],
        mode: ContinuityMode,
    ) -> Result<(), ConvectionError> {
        let result = self
            .utw
            .system_mut()
            .update_continuity_boundary_condition(qdot, mode);
        if let Err(err) = &result {
            warn!("continuity boundary condition update rejected: {}", err);
        }
        result
    }

    /// Install externally prescribed quasi-2D velocity fields and switch
    /// every species system to them.
    pub fn setup_quasi2d(
        &mut self,
        vz: Arc<BilinearInterpolator>,
        vr: Arc<BilinearInterpolator>,
    ) {
        for solver in &mut self.species {
            solver.system_mut().set_velocity(VelocitySource::Quasi2d {
                vz: vz.clone(),
                vr: vr.clone(),
            });
        }
        self.quasi2d = true;
    }

    /// Advance the whole convection term from the installed initial time
    /// to `tf`.
    ///
    /// The UTW system is advanced first, publishing a mass flux sample at
    /// every accepted solver step; each species system then integrates
    /// against the completed series. All state and derivative accessors
    /// are consistent with time `tf` afterwards.
    pub fn integrate_to_time(&mut self, tf: f64) -> Result<(), ConvectionError> {
        let t0 = self.t_initial;
        if tf < t0 {
            return Err(ConvectionError::InvalidConfig(format!(
                "target time {} precedes initial time {}",
                tf, t0
            )));
        }

        // UTW phase: single-step advancement, sampling V as we go.
        let utw_started = Instant::now();
        self.apply_utw_tolerances()?;
        let mut packed = std::mem::take(&mut self.packed);
        packed.clear();
        packed.resize(3 * self.grid.n_points(), 0.0);
        self.utw.system().roll_y(&mut packed);
        self.utw.initialize(t0, &packed)?;
        self.packed = packed;

        self.utw.refresh()?;
        let mut series = VelocityTimeSeries::new();
        series.insert(t0, self.utw.system().v.clone());
        while self.utw.time() < tf {
            let t_i = self.utw.step()?;
            series.insert(t_i, self.utw.system().v.clone());
        }
        self.utw.settle_at(tf)?;
        self.utw.refresh()?;
        series.insert(tf, self.utw.system().v.clone());

        let utw_steps = self.utw.n_steps();
        debug!(
            "UTW phase: {} steps, {} velocity samples in {:.1?}",
            utw_steps,
            series.len(),
            utw_started.elapsed()
        );

        let mut state = std::mem::take(&mut self.packed);
        state.clear();
        state.extend_from_slice(self.utw.state());
        self.utw.system_mut().unroll_y(&state);
        self.packed = state;

        // Species phase: every solver reads the immutable snapshot.
        let snapshot = Arc::new(series);
        self.v_interp = snapshot.clone();
        let species_started = Instant::now();
        let quasi2d = self.quasi2d;
        let reltol = self.tol.reltol;
        let abstol_y = self.tol.abstol_y;

        #[cfg(feature = "parallel")]
        self.species
            .par_iter_mut()
            .zip(self.y.par_iter_mut())
            .try_for_each(|(solver, row)| {
                advance_species(solver, row, &snapshot, quasi2d, t0, tf, reltol, abstol_y)
            })?;

        #[cfg(not(feature = "parallel"))]
        for (solver, row) in self.species.iter_mut().zip(self.y.iter_mut()) {
            advance_species(solver, row, &snapshot, quasi2d, t0, tf, reltol, abstol_y)?;
        }

        self.last_n_steps =
            utw_steps + self.species.iter().map(|s| s.n_steps()).sum::<usize>();
        debug!(
            "species phase: {} solvers in {:.1?}",
            self.species.len(),
            species_started.elapsed()
        );

        self.t_current = tf;
        self.evaluate()
    }

    /// Refresh V, rho, and every time derivative at the current state
    /// without advancing time. Idempotent.
    pub fn evaluate(&mut self) -> Result<(), ConvectionError> {
        let t = self.t_current;
        self.utw.system_mut().evaluate(t)?;
        let v_full = self.utw.system().v.clone();

        for (k, solver) in self.species.iter_mut().enumerate() {
            let sys = solver.system_mut();
            let (start, stop) = sys.domain();
            let dst = &mut self.dydt[k];
            dst.fill(0.0);
            sys.evaluate_with_velocity(&v_full, &self.y[k][start..=stop], &mut dst[start..=stop]);
        }
        Ok(())
    }

    /// Accepted solver steps (UTW plus species) of the last
    /// `integrate_to_time` call.
    pub fn n_steps(&self) -> usize {
        self.last_n_steps
    }

    /// Current time of the installed state.
    pub fn time(&self) -> f64 {
        self.t_current
    }

    /// The velocity series published by the last UTW phase.
    pub fn velocity_series(&self) -> &Arc<VelocityTimeSeries> {
        &self.v_interp
    }

    /// Normalized tangential velocity.
    pub fn u(&self) -> &[f64] {
        &self.utw.system().u
    }

    /// Temperature.
    pub fn temperature(&self) -> &[f64] {
        &self.utw.system().temp
    }

    /// Mixture molecular weight.
    pub fn wmx(&self) -> &[f64] {
        &self.utw.system().wmx
    }

    /// Mass flux.
    pub fn v(&self) -> &[f64] {
        &self.utw.system().v
    }

    /// Radial mass flux r^a V.
    pub fn rv(&self) -> &[f64] {
        &self.utw.system().rv
    }

    /// Mixture density.
    pub fn rho(&self) -> &[f64] {
        &self.utw.system().rho
    }

    pub fn dudt(&self) -> &[f64] {
        &self.utw.system().dudt
    }

    pub fn dtdt(&self) -> &[f64] {
        &self.utw.system().dtdt
    }

    pub fn dwdt(&self) -> &[f64] {
        &self.utw.system().dwdt
    }

    /// Species mass fractions, one row per species.
    pub fn mass_fractions(&self) -> &[Vec<f64>] {
        &self.y
    }

    /// Mutable access to the species mass fractions, for callers that
    /// maintain rows outside the active windows.
    pub fn mass_fractions_mut(&mut self) -> &mut [Vec<f64>] {
        &mut self.y
    }

    /// Species time derivatives, one row per species.
    pub fn dydt(&self) -> &[Vec<f64>] {
        &self.dydt
    }

    /// The active continuity boundary condition.
    pub fn continuity_bc(&self) -> ContinuityBoundary {
        self.utw.system().continuity_bc()
    }

    /// Discrete residual of the continuity operator on every cell at the
    /// current state, using the installed density derivative.
    pub fn continuity_residual(&self) -> Vec<f64> {
        let sys = self.utw.system();
        let grid = &self.grid;
        let alpha = grid.alpha() as f64;
        let drhodt = sys.density_derivative();
        (0..grid.n_points() - 1)
            .map(|j| {
                (sys.rv[j + 1] - sys.rv[j]) / grid.hh[j]
                    + grid.rm(j)
                        * (drhodt[j] + alpha * sys.rho[j] * 0.5 * (sys.u[j] + sys.u[j + 1]))
            })
            .collect()
    }
}

/// Advance one species solver over [t0, tf] and write its window back.
#[allow(clippy::too_many_arguments)]
fn advance_species(
    solver: &mut ExplicitSolver<SpeciesSystem>,
    row: &mut [f64],
    snapshot: &Arc<VelocityTimeSeries>,
    quasi2d: bool,
    t0: f64,
    tf: f64,
    reltol: f64,
    abstol_y: f64,
) -> Result<(), ConvectionError> {
    if !quasi2d {
        solver
            .system_mut()
            .set_velocity(VelocitySource::TimeSeries(snapshot.clone()));
    }
    solver.set_scalar_tolerances(reltol, abstol_y)?;
    let (start, stop) = solver.system().domain();
    solver.initialize(t0, &row[start..=stop])?;
    solver.integrate_to(tf)?;
    row[start..=stop].copy_from_slice(solver.state());
    Ok(())
}
