//! Time-keyed velocity profiles with linear interpolation in time.
//!
//! The UTW phase of a split step records a full velocity profile at every
//! accepted solver step; the species phase reads the series back at
//! arbitrary times through linear interpolation. Outside the covered time
//! interval the nearest sample is used.

/// An ordered sequence of (time, velocity profile) samples.
#[derive(Clone, Debug, Default)]
pub struct VelocityTimeSeries {
    samples: Vec<(f64, Vec<f64>)>,
}

impl VelocityTimeSeries {
    /// Create an empty series.
    pub fn new() -> Self {
        Self {
            samples: Vec::new(),
        }
    }

    /// Remove all samples.
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Number of stored samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the series holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Insert a profile at time t, replacing an existing sample at the
    /// same time. Samples may arrive in any order.
    pub fn insert(&mut self, t: f64, profile: Vec<f64>) {
        match self.samples.binary_search_by(|(ti, _)| ti.total_cmp(&t)) {
            Ok(i) => self.samples[i].1 = profile,
            Err(i) => self.samples.insert(i, (t, profile)),
        }
    }

    /// Earliest sample time.
    pub fn first_time(&self) -> Option<f64> {
        self.samples.first().map(|(t, _)| *t)
    }

    /// Latest sample time.
    pub fn last_time(&self) -> Option<f64> {
        self.samples.last().map(|(t, _)| *t)
    }

    /// Interpolate the velocity profile at time t into `out`.
    ///
    /// Linear in time between the two bracketing samples; clamped to the
    /// first/last sample outside the covered interval.
    ///
    /// # Panics
    ///
    /// Panics if the series is empty or `out` does not match the profile
    /// length. Callers configure a populated series before integration.
    pub fn sample_into(&self, t: f64, out: &mut [f64]) {
        assert!(!self.samples.is_empty(), "empty velocity series");

        let i = self.samples.partition_point(|(ti, _)| *ti < t);
        if i == 0 {
            out.copy_from_slice(&self.samples[0].1);
            return;
        }
        if i == self.samples.len() {
            out.copy_from_slice(&self.samples[i - 1].1);
            return;
        }

        let (t0, v0) = &self.samples[i - 1];
        let (t1, v1) = &self.samples[i];
        let s = (t - t0) / (t1 - t0);
        for (o, (a, b)) in out.iter_mut().zip(v0.iter().zip(v1.iter())) {
            *o = a + s * (b - a);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_interpolation() {
        let mut series = VelocityTimeSeries::new();
        series.insert(0.0, vec![0.0, 1.0]);
        series.insert(1.0, vec![2.0, 3.0]);

        let mut out = [0.0; 2];
        series.sample_into(0.5, &mut out);
        assert!((out[0] - 1.0).abs() < 1e-15);
        assert!((out[1] - 2.0).abs() < 1e-15);
    }

    #[test]
    fn test_clamping() {
        let mut series = VelocityTimeSeries::new();
        series.insert(1.0, vec![5.0]);
        series.insert(2.0, vec![7.0]);

        let mut out = [0.0];
        series.sample_into(0.0, &mut out);
        assert_eq!(out[0], 5.0);
        series.sample_into(3.0, &mut out);
        assert_eq!(out[0], 7.0);
    }

    #[test]
    fn test_exact_sample_times() {
        let mut series = VelocityTimeSeries::new();
        series.insert(0.0, vec![1.0]);
        series.insert(0.5, vec![2.0]);
        series.insert(1.0, vec![4.0]);

        let mut out = [0.0];
        series.sample_into(0.5, &mut out);
        assert_eq!(out[0], 2.0);
    }

    #[test]
    fn test_replace_duplicate_time() {
        let mut series = VelocityTimeSeries::new();
        series.insert(0.0, vec![1.0]);
        series.insert(0.0, vec![9.0]);

        assert_eq!(series.len(), 1);
        let mut out = [0.0];
        series.sample_into(0.0, &mut out);
        assert_eq!(out[0], 9.0);
    }

    #[test]
    fn test_out_of_order_insert() {
        let mut series = VelocityTimeSeries::new();
        series.insert(1.0, vec![10.0]);
        series.insert(0.0, vec![0.0]);

        assert_eq!(series.first_time(), Some(0.0));
        assert_eq!(series.last_time(), Some(1.0));
        let mut out = [0.0];
        series.sample_into(0.25, &mut out);
        assert!((out[0] - 2.5).abs() < 1e-15);
    }
}
