//! Adaptive explicit integrator with one-step mode and dense output.
//!
//! Bogacki-Shampine 3(2) embedded pair with first-same-as-last reuse.
//! Error control uses a weighted RMS norm with a per-component absolute
//! tolerance vector and a scalar relative tolerance. The driver loop of
//! the split scheme needs three things beyond a plain `integrate_to`:
//! single-step advancement (so the caller can sample after every accepted
//! step), cubic-Hermite interpolation over the last step (to land exactly
//! on the target time after an overshoot), and reinitialization that keeps
//! the allocations between split steps.

use log::warn;

use super::{OdeRhs, RhsStatus};
use crate::error::ConvectionError;

const SAFETY: f64 = 0.9;
const MIN_SCALE: f64 = 0.2;
const MAX_SCALE: f64 = 5.0;
/// Consecutive recoverable RHS failures tolerated within one step attempt.
const MAX_RHS_FAILURES: usize = 10;

/// Explicit adaptive ODE solver owning its system.
pub struct ExplicitSolver<S: OdeRhs> {
    system: S,
    t: f64,
    y: Vec<f64>,
    reltol: f64,
    abstol: Vec<f64>,
    /// Step size to attempt next; 0 means "not yet chosen".
    h: f64,
    n_steps: usize,
    // Last accepted step, for dense output.
    t_prev: f64,
    h_last: f64,
    y_prev: Vec<f64>,
    f_prev: Vec<f64>,
    /// f(t, y) at the current state when `fsal_ready`.
    f_curr: Vec<f64>,
    fsal_ready: bool,
    // Stage scratch.
    k2: Vec<f64>,
    k3: Vec<f64>,
    y_stage: Vec<f64>,
    y_trial: Vec<f64>,
    f_trial: Vec<f64>,
}

enum Attempt {
    /// Error norm of the trial step.
    Evaluated(f64),
    /// The RHS reported a recoverable failure at a stage point.
    RhsFailed,
}

impl<S: OdeRhs> ExplicitSolver<S> {
    /// Create a solver for `system`, sized to its packed state.
    pub fn new(system: S) -> Self {
        let n = system.state_size();
        Self {
            system,
            t: 0.0,
            y: vec![0.0; n],
            reltol: 1e-6,
            abstol: vec![1e-8; n],
            h: 0.0,
            n_steps: 0,
            t_prev: 0.0,
            h_last: 0.0,
            y_prev: vec![0.0; n],
            f_prev: vec![0.0; n],
            f_curr: vec![0.0; n],
            fsal_ready: false,
            k2: vec![0.0; n],
            k3: vec![0.0; n],
            y_stage: vec![0.0; n],
            y_trial: vec![0.0; n],
            f_trial: vec![0.0; n],
        }
    }

    /// The owned system.
    pub fn system(&self) -> &S {
        &self.system
    }

    /// Mutable access to the owned system (for configuration between steps).
    pub fn system_mut(&mut self) -> &mut S {
        &mut self.system
    }

    /// Current internal time.
    pub fn time(&self) -> f64 {
        self.t
    }

    /// Current packed state.
    pub fn state(&self) -> &[f64] {
        &self.y
    }

    /// Accepted steps since the last `initialize`.
    pub fn n_steps(&self) -> usize {
        self.n_steps
    }

    /// Re-size every internal buffer after the system's packed state size
    /// changed (regrid, new species window). State and step history are
    /// discarded; per-component tolerances reset to their first entry.
    pub fn resize_to_system(&mut self) {
        let n = self.system.state_size();
        let abstol = self.abstol.first().copied().unwrap_or(1e-8);
        for buf in [
            &mut self.y,
            &mut self.y_prev,
            &mut self.f_prev,
            &mut self.f_curr,
            &mut self.k2,
            &mut self.k3,
            &mut self.y_stage,
            &mut self.y_trial,
            &mut self.f_trial,
        ] {
            buf.clear();
            buf.resize(n, 0.0);
        }
        self.abstol.clear();
        self.abstol.resize(n, abstol);
        self.h = 0.0;
        self.h_last = 0.0;
        self.n_steps = 0;
        self.fsal_ready = false;
    }

    /// Restart the integration at (t0, y0), keeping tolerances and
    /// allocations.
    pub fn initialize(&mut self, t0: f64, y0: &[f64]) -> Result<(), ConvectionError> {
        if y0.len() != self.y.len() {
            return Err(ConvectionError::dimension_mismatch(
                format!("{} state components", self.y.len()),
                format!("{}", y0.len()),
            ));
        }
        self.t = t0;
        self.y.copy_from_slice(y0);
        self.h = 0.0;
        self.h_last = 0.0;
        self.t_prev = t0;
        self.n_steps = 0;
        self.fsal_ready = false;
        Ok(())
    }

    /// Set the relative tolerance and per-component absolute tolerances.
    pub fn set_tolerances(&mut self, reltol: f64, abstol: &[f64]) -> Result<(), ConvectionError> {
        if abstol.len() != self.y.len() {
            return Err(ConvectionError::dimension_mismatch(
                format!("{} tolerance components", self.y.len()),
                format!("{}", abstol.len()),
            ));
        }
        if !(reltol > 0.0) || abstol.iter().any(|&a| !(a > 0.0)) {
            return Err(ConvectionError::InvalidConfig(
                "tolerances must be positive".into(),
            ));
        }
        self.reltol = reltol;
        self.abstol.copy_from_slice(abstol);
        Ok(())
    }

    /// Set the relative tolerance and a scalar absolute tolerance.
    pub fn set_scalar_tolerances(
        &mut self,
        reltol: f64,
        abstol: f64,
    ) -> Result<(), ConvectionError> {
        let abstol = vec![abstol; self.y.len()];
        self.set_tolerances(reltol, &abstol)
    }

    /// Evaluate the RHS at the current state, refreshing the system's
    /// internal fields. Fails if the system cannot evaluate there.
    pub fn refresh(&mut self) -> Result<(), ConvectionError> {
        match self.system.rhs(self.t, &self.y, &mut self.f_curr) {
            RhsStatus::Ok => {
                self.fsal_ready = true;
                Ok(())
            }
            RhsStatus::RecoverableFailure => Err(ConvectionError::SolverFailure {
                t: self.t,
                reason: "right-hand side not evaluable at the current state".into(),
            }),
        }
    }

    /// Take one accepted internal step and return the new internal time.
    pub fn step(&mut self) -> Result<f64, ConvectionError> {
        if !self.fsal_ready {
            self.refresh()?;
        }
        if self.h <= 0.0 {
            self.h = self.initial_step();
        }

        let mut failures = 0usize;
        loop {
            let h = self.h;
            if !h.is_finite() || self.t + h == self.t {
                return Err(ConvectionError::SolverFailure {
                    t: self.t,
                    reason: format!("step size underflow (h = {:e})", h),
                });
            }

            match self.attempt(h) {
                Attempt::RhsFailed => {
                    failures += 1;
                    if failures > MAX_RHS_FAILURES {
                        return Err(ConvectionError::SolverFailure {
                            t: self.t,
                            reason: format!(
                                "right-hand side failed {} times in one step",
                                failures
                            ),
                        });
                    }
                    warn!(
                        "recoverable RHS failure at t = {:e}, retrying with h = {:e}",
                        self.t,
                        0.5 * h
                    );
                    self.h = 0.5 * h;
                }
                Attempt::Evaluated(err_norm) if err_norm <= 1.0 => {
                    self.accept(h, err_norm);
                    return Ok(self.t);
                }
                Attempt::Evaluated(err_norm) => {
                    let scale = (SAFETY * err_norm.powf(-1.0 / 3.0)).max(0.1);
                    self.h = h * scale;
                }
            }
        }
    }

    /// Advance to exactly `tf`: step past it, then interpolate back.
    pub fn integrate_to(&mut self, tf: f64) -> Result<(), ConvectionError> {
        if tf < self.t {
            return Err(ConvectionError::InvalidConfig(format!(
                "target time {} precedes current time {}",
                tf, self.t
            )));
        }
        while self.t < tf {
            self.step()?;
        }
        self.settle_at(tf)
    }

    /// Move the current state to `tf` by dense-output interpolation over
    /// the last accepted step. `tf` must lie within that step.
    pub fn settle_at(&mut self, tf: f64) -> Result<(), ConvectionError> {
        if tf == self.t {
            return Ok(());
        }
        if tf < self.t_prev || tf > self.t {
            return Err(ConvectionError::InvalidConfig(format!(
                "interpolation target {} outside the last step [{}, {}]",
                tf, self.t_prev, self.t
            )));
        }
        let mut ytf = std::mem::take(&mut self.y_stage);
        self.interpolate(tf, &mut ytf);
        self.y.copy_from_slice(&ytf);
        self.y_stage = ytf;
        self.t = tf;
        self.fsal_ready = false;
        Ok(())
    }

    /// Cubic-Hermite interpolation of the solution at time `t` within the
    /// last accepted step.
    pub fn interpolate(&self, t: f64, out: &mut [f64]) {
        if self.h_last == 0.0 {
            out.copy_from_slice(&self.y);
            return;
        }
        let s = ((t - self.t_prev) / self.h_last).clamp(0.0, 1.0);
        let s2 = s * s;
        let s3 = s2 * s;
        let h00 = 2.0 * s3 - 3.0 * s2 + 1.0;
        let h10 = s3 - 2.0 * s2 + s;
        let h01 = -2.0 * s3 + 3.0 * s2;
        let h11 = s3 - s2;
        let h = self.h_last;
        for i in 0..out.len() {
            out[i] = h00 * self.y_prev[i]
                + h10 * h * self.f_prev[i]
                + h01 * self.y[i]
                + h11 * h * self.f_curr[i];
        }
    }

    /// One trial step of size h from the current state.
    fn attempt(&mut self, h: f64) -> Attempt {
        let n = self.y.len();
        let t = self.t;

        // Stage 2 at t + h/2.
        for i in 0..n {
            self.y_stage[i] = self.y[i] + 0.5 * h * self.f_curr[i];
        }
        if self.system.rhs(t + 0.5 * h, &self.y_stage, &mut self.k2) != RhsStatus::Ok {
            return Attempt::RhsFailed;
        }

        // Stage 3 at t + 3h/4.
        for i in 0..n {
            self.y_stage[i] = self.y[i] + 0.75 * h * self.k2[i];
        }
        if self.system.rhs(t + 0.75 * h, &self.y_stage, &mut self.k3) != RhsStatus::Ok {
            return Attempt::RhsFailed;
        }

        // Third-order solution.
        for i in 0..n {
            self.y_trial[i] = self.y[i]
                + h * (2.0 / 9.0 * self.f_curr[i] + 1.0 / 3.0 * self.k2[i]
                    + 4.0 / 9.0 * self.k3[i]);
        }
        if self.system.rhs(t + h, &self.y_trial, &mut self.f_trial) != RhsStatus::Ok {
            return Attempt::RhsFailed;
        }

        // Embedded error estimate against the second-order solution.
        let mut sum = 0.0;
        for i in 0..n {
            let e = h
                * (-5.0 / 72.0 * self.f_curr[i] + 1.0 / 12.0 * self.k2[i]
                    + 1.0 / 9.0 * self.k3[i]
                    - 1.0 / 8.0 * self.f_trial[i]);
            if !e.is_finite() || !self.y_trial[i].is_finite() {
                return Attempt::RhsFailed;
            }
            let w = self.abstol[i] + self.reltol * self.y[i].abs().max(self.y_trial[i].abs());
            sum += (e / w) * (e / w);
        }
        Attempt::Evaluated((sum / n as f64).sqrt())
    }

    fn accept(&mut self, h: f64, err_norm: f64) {
        self.t_prev = self.t;
        self.h_last = h;
        std::mem::swap(&mut self.y_prev, &mut self.y);
        std::mem::swap(&mut self.f_prev, &mut self.f_curr);
        self.y.copy_from_slice(&self.y_trial);
        self.f_curr.copy_from_slice(&self.f_trial);
        self.t += h;
        self.fsal_ready = true;
        self.n_steps += 1;

        let scale = if err_norm > 0.0 {
            (SAFETY * err_norm.powf(-1.0 / 3.0)).clamp(MIN_SCALE, MAX_SCALE)
        } else {
            MAX_SCALE
        };
        self.h = h * scale;
    }

    /// First step size: small enough that the explicit update stays well
    /// inside the error weights.
    fn initial_step(&self) -> f64 {
        let mut inv = 0.0f64;
        for i in 0..self.y.len() {
            let w = self.abstol[i] + self.reltol * self.y[i].abs();
            inv = inv.max(self.f_curr[i].abs() / w);
        }
        if inv > 0.0 {
            0.01 / inv
        } else {
            1.0
        }
    }
}
