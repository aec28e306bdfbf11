//! Grid geometry and finite-difference coefficients.
//!
//! A grid is an ordered sequence of node positions x[0..n-1] along the
//! flame-normal coordinate, together with every derived coefficient the
//! convection operators consume: cell widths, the radial metric for
//! cylindrical geometry, and centered first-derivative weights on the
//! (generally nonuniform) node spacing.

use crate::error::ConvectionError;

/// Flame geometry selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Geometry {
    /// Planar flame: metric r = 1, curvature exponent alpha = 0.
    Planar,
    /// Cylindrical flame: metric r = x, curvature exponent alpha = 1.
    Cylindrical,
}

impl Geometry {
    /// Curvature exponent: 0 planar, 1 cylindrical.
    pub fn alpha(self) -> u32 {
        match self {
            Geometry::Planar => 0,
            Geometry::Cylindrical => 1,
        }
    }
}

/// One-dimensional grid of node positions with derived coefficients.
///
/// Shared by reference across all sub-systems of one split step; the
/// coordinator-level `resize` swaps in a fresh grid and rebuilds every
/// per-node buffer.
#[derive(Clone, Debug)]
pub struct OneDimGrid {
    /// Geometry of the flame-normal coordinate.
    pub geometry: Geometry,
    /// Node positions, strictly increasing. Length n.
    pub x: Vec<f64>,
    /// Cell widths: hh[j] = x[j+1] - x[j]. Length n-1.
    pub hh: Vec<f64>,
    /// Radial metric at nodes: r[j] = x[j] cylindrical, 1 planar. Length n.
    pub r: Vec<f64>,
    /// Radial metric at cell midpoints: rphalf[j] = (r[j] + r[j+1]) / 2.
    /// Length n-1.
    pub rphalf: Vec<f64>,
    /// Centered first-derivative weight on f[j-1]. Valid at interior nodes.
    pub cfm: Vec<f64>,
    /// Centered first-derivative weight on f[j]. Valid at interior nodes.
    pub cf: Vec<f64>,
    /// Centered first-derivative weight on f[j+1]. Valid at interior nodes.
    pub cfp: Vec<f64>,
}

impl OneDimGrid {
    /// Build a grid from node positions.
    ///
    /// Requires at least three nodes (the convection operators need an
    /// interior) and strictly increasing positions.
    pub fn new(x: Vec<f64>, geometry: Geometry) -> Result<Self, ConvectionError> {
        let n = x.len();
        if n < 3 {
            return Err(ConvectionError::InvalidConfig(format!(
                "grid needs at least 3 nodes, got {}",
                n
            )));
        }
        for j in 1..n {
            if !(x[j] > x[j - 1]) {
                return Err(ConvectionError::InvariantViolation {
                    variable: "x",
                    node: j,
                    value: x[j],
                });
            }
        }

        let hh: Vec<f64> = (0..n - 1).map(|j| x[j + 1] - x[j]).collect();

        let r: Vec<f64> = match geometry {
            Geometry::Planar => vec![1.0; n],
            Geometry::Cylindrical => x.clone(),
        };
        let rphalf: Vec<f64> = (0..n - 1).map(|j| 0.5 * (r[j] + r[j + 1])).collect();

        // Centered first-derivative weights on a nonuniform grid:
        // df/dx|_j = cfm[j] f[j-1] + cf[j] f[j] + cfp[j] f[j+1]
        let mut cfm = vec![0.0; n];
        let mut cf = vec![0.0; n];
        let mut cfp = vec![0.0; n];
        for j in 1..n - 1 {
            let hm = hh[j - 1];
            let hp = hh[j];
            cfm[j] = -hp / (hm * (hm + hp));
            cf[j] = (hp - hm) / (hm * hp);
            cfp[j] = hm / (hp * (hm + hp));
        }

        Ok(Self {
            geometry,
            x,
            hh,
            r,
            rphalf,
            cfm,
            cf,
            cfp,
        })
    }

    /// Build a uniform grid of n nodes on [x_min, x_max].
    pub fn uniform(
        x_min: f64,
        x_max: f64,
        n: usize,
        geometry: Geometry,
    ) -> Result<Self, ConvectionError> {
        if n < 2 || !(x_max > x_min) {
            return Err(ConvectionError::InvalidConfig(format!(
                "uniform grid requires n >= 2 and x_max > x_min, got n = {}, [{}, {}]",
                n, x_min, x_max
            )));
        }
        let h = (x_max - x_min) / (n - 1) as f64;
        let x = (0..n).map(|j| x_min + j as f64 * h).collect();
        Self::new(x, geometry)
    }

    /// Number of grid nodes.
    pub fn n_points(&self) -> usize {
        self.x.len()
    }

    /// Curvature exponent of the geometry: 0 planar, 1 cylindrical.
    pub fn alpha(&self) -> u32 {
        self.geometry.alpha()
    }

    /// Metric factor r^alpha at node j.
    pub fn rm(&self, j: usize) -> f64 {
        match self.geometry {
            Geometry::Planar => 1.0,
            Geometry::Cylindrical => self.r[j],
        }
    }

    /// Centered first derivative of f at interior node j.
    pub fn centered_deriv(&self, f: &[f64], j: usize) -> f64 {
        self.cfm[j] * f[j - 1] + self.cf[j] * f[j] + self.cfp[j] * f[j + 1]
    }

    /// Minimum cell width.
    pub fn h_min(&self) -> f64 {
        self.hh.iter().copied().fold(f64::INFINITY, f64::min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_grid() {
        let grid = OneDimGrid::uniform(0.0, 0.01, 11, Geometry::Planar).unwrap();

        assert_eq!(grid.n_points(), 11);
        assert_eq!(grid.hh.len(), 10);
        assert!((grid.h_min() - 0.001).abs() < 1e-15);
        assert_eq!(grid.alpha(), 0);
        for j in 0..11 {
            assert_eq!(grid.rm(j), 1.0);
        }
    }

    #[test]
    fn test_cylindrical_metric() {
        let grid = OneDimGrid::uniform(0.0, 1.0, 5, Geometry::Cylindrical).unwrap();

        assert_eq!(grid.alpha(), 1);
        for j in 0..5 {
            assert!((grid.r[j] - grid.x[j]).abs() < 1e-15);
            assert!((grid.rm(j) - grid.x[j]).abs() < 1e-15);
        }
        for j in 0..4 {
            let mid = 0.5 * (grid.x[j] + grid.x[j + 1]);
            assert!((grid.rphalf[j] - mid).abs() < 1e-15);
        }
    }

    #[test]
    fn test_centered_weights_exact_for_quadratic() {
        // The three-point weights differentiate quadratics exactly,
        // including on a stretched grid.
        let x: Vec<f64> = vec![0.0, 0.1, 0.25, 0.45, 0.7, 1.0];
        let grid = OneDimGrid::new(x, Geometry::Planar).unwrap();

        let f: Vec<f64> = grid.x.iter().map(|&x| 3.0 * x * x - 2.0 * x + 1.0).collect();
        for j in 1..grid.n_points() - 1 {
            let exact = 6.0 * grid.x[j] - 2.0;
            let numeric = grid.centered_deriv(&f, j);
            assert!(
                (numeric - exact).abs() < 1e-12,
                "node {}: expected {}, got {}",
                j,
                exact,
                numeric
            );
        }
    }

    #[test]
    fn test_rejects_non_monotone() {
        let err = OneDimGrid::new(vec![0.0, 0.2, 0.1, 0.3], Geometry::Planar).unwrap_err();
        match err {
            ConvectionError::InvariantViolation { variable, node, .. } => {
                assert_eq!(variable, "x");
                assert_eq!(node, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_rejects_too_small() {
        assert!(OneDimGrid::new(vec![0.0, 1.0], Geometry::Planar).is_err());
    }
}
