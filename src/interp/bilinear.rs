//! Bilinear interpolation of a field on a rectilinear (x, t) grid.
//!
//! Used on the quasi-2D path, where externally prescribed velocity fields
//! v_z(x, t) and v_r(x, t) replace the continuity-derived mass flux.

use crate::error::ConvectionError;

/// A field sampled on a rectilinear (x, t) grid, interpolated bilinearly.
///
/// Queries outside the grid are clamped to the nearest edge.
#[derive(Clone, Debug)]
pub struct BilinearInterpolator {
    x: Vec<f64>,
    t: Vec<f64>,
    /// Row-major: values[i_t * x.len() + i_x].
    values: Vec<f64>,
}

impl BilinearInterpolator {
    /// Build an interpolator from grid axes and row-major values
    /// (one row of x-values per time).
    pub fn new(x: Vec<f64>, t: Vec<f64>, values: Vec<f64>) -> Result<Self, ConvectionError> {
        if x.is_empty() || t.is_empty() {
            return Err(ConvectionError::InvalidConfig(
                "bilinear interpolator needs at least one point per axis".into(),
            ));
        }
        if values.len() != x.len() * t.len() {
            return Err(ConvectionError::dimension_mismatch(
                format!("{} values", x.len() * t.len()),
                format!("{}", values.len()),
            ));
        }
        for axis in [&x, &t] {
            for i in 1..axis.len() {
                if !(axis[i] > axis[i - 1]) {
                    return Err(ConvectionError::InvalidConfig(
                        "bilinear interpolator axes must be strictly increasing".into(),
                    ));
                }
            }
        }
        Ok(Self { x, t, values })
    }

    /// A field with the same value everywhere.
    pub fn constant(value: f64) -> Self {
        Self {
            x: vec![0.0],
            t: vec![0.0],
            values: vec![value],
        }
    }

    /// Interpolated value at (x, t).
    pub fn eval(&self, x: f64, t: f64) -> f64 {
        let (ix, sx) = bracket(&self.x, x);
        let (it, st) = bracket(&self.t, t);
        let nx = self.x.len();

        let v00 = self.values[it * nx + ix];
        let v01 = self.values[it * nx + (ix + 1).min(nx - 1)];
        let row1 = (it + 1).min(self.t.len() - 1);
        let v10 = self.values[row1 * nx + ix];
        let v11 = self.values[row1 * nx + (ix + 1).min(nx - 1)];

        let a = v00 + sx * (v01 - v00);
        let b = v10 + sx * (v11 - v10);
        a + st * (b - a)
    }
}

/// Lower bracket index and interpolation fraction for a clamped query.
fn bracket(axis: &[f64], q: f64) -> (usize, f64) {
    let n = axis.len();
    if n == 1 || q <= axis[0] {
        return (0, 0.0);
    }
    if q >= axis[n - 1] {
        return (n - 2, 1.0);
    }
    let i = axis.partition_point(|&a| a <= q) - 1;
    (i, (q - axis[i]) / (axis[i + 1] - axis[i]))
}
