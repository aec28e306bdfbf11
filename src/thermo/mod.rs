//! Mixture thermodynamic properties consumed by the convection core.
//!
//! The convection operators need exactly two properties from the gas
//! model: the mixture mean molecular weight of a mass-fraction column, and
//! the ideal-gas density. Everything else (species thermo, kinetics,
//! transport) belongs to the external provider behind this seam.

use crate::error::ConvectionError;

/// Universal gas constant [J/(mol K)].
pub const GAS_CONSTANT: f64 = 8.314462618;

/// The mixture properties the convection core consumes.
pub trait MixtureThermo: Send + Sync {
    /// The linear form sum(y_k / W_k) [mol/kg]. Defined for any real
    /// coefficient vector, which lets callers apply it to time
    /// derivatives of mass fractions as well as to mass fractions.
    fn inverse_mean_molecular_weight(&self, y: &[f64]) -> f64;

    /// Mean molecular weight of a mixture from species mass fractions
    /// [kg/mol].
    fn mean_molecular_weight(&self, y: &[f64]) -> f64 {
        1.0 / self.inverse_mean_molecular_weight(y)
    }

    /// Thermodynamic pressure of the system [Pa].
    fn pressure(&self) -> f64;

    /// Mixture density from the ideal gas law [kg/m^3].
    fn density(&self, temperature: f64, wmx: f64) -> f64 {
        self.pressure() * wmx / (GAS_CONSTANT * temperature)
    }
}

/// An ideal-gas mixture with fixed species molar masses and pressure.
#[derive(Clone, Debug)]
pub struct IdealGasMixture {
    molar_masses: Vec<f64>,
    pressure: f64,
}

impl IdealGasMixture {
    /// Create a mixture from species molar masses [kg/mol] and a
    /// thermodynamic pressure [Pa].
    pub fn new(molar_masses: Vec<f64>, pressure: f64) -> Result<Self, ConvectionError> {
        if molar_masses.is_empty() {
            return Err(ConvectionError::InvalidConfig(
                "mixture needs at least one species".into(),
            ));
        }
        if let Some(k) = molar_masses.iter().position(|&w| !(w > 0.0)) {
            return Err(ConvectionError::InvariantViolation {
                variable: "molar mass",
                node: k,
                value: molar_masses[k],
            });
        }
        if !(pressure > 0.0) {
            return Err(ConvectionError::InvalidConfig(format!(
                "pressure must be positive, got {}",
                pressure
            )));
        }
        Ok(Self {
            molar_masses,
            pressure,
        })
    }

    /// Number of species in the mixture.
    pub fn n_species(&self) -> usize {
        self.molar_masses.len()
    }
}

impl MixtureThermo for IdealGasMixture {
    fn inverse_mean_molecular_weight(&self, y: &[f64]) -> f64 {
        debug_assert_eq!(y.len(), self.molar_masses.len());
        y.iter()
            .zip(&self.molar_masses)
            .map(|(y, w)| y / w)
            .sum()
    }

    fn pressure(&self) -> f64 {
        self.pressure
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_species_weight() {
        let gas = IdealGasMixture::new(vec![0.029], 101325.0).unwrap();
        let w = gas.mean_molecular_weight(&[1.0]);
        assert!((w - 0.029).abs() < 1e-15);
    }

    #[test]
    fn test_mixture_weight_harmonic_mean() {
        // Equal mass fractions of W = 0.002 and W = 0.004 [kg/mol].
        let gas = IdealGasMixture::new(vec![0.002, 0.004], 101325.0).unwrap();
        let w = gas.mean_molecular_weight(&[0.5, 0.5]);
        assert!((w - 1.0 / (250.0 + 125.0)).abs() < 1e-15);
    }

    #[test]
    fn test_ideal_gas_density_near_air() {
        let gas = IdealGasMixture::new(vec![0.029], 101325.0).unwrap();
        let rho = gas.density(300.0, 0.029);
        // Air-like density at ambient conditions.
        assert!((rho - 1.178).abs() < 0.01);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(IdealGasMixture::new(vec![], 101325.0).is_err());
        assert!(IdealGasMixture::new(vec![-1.0], 101325.0).is_err());
        assert!(IdealGasMixture::new(vec![0.029], 0.0).is_err());
    }
}
