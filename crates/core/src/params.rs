//! Privacy targets and mechanism descriptions.

use crate::{DpError, Result};

/// Target `(epsilon, delta)` guarantee for a sequence of releases.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PrivacyBudget {
    epsilon: f64,
    delta: f64,
}

impl PrivacyBudget {
    /// Create a budget, rejecting negative epsilon and delta outside `[0, 1]`.
    pub fn new(epsilon: f64, delta: f64) -> Result<Self> {
        if epsilon.is_nan() || epsilon < 0.0 {
            return Err(DpError::invalid(format!(
                "epsilon must be >= 0, got {epsilon}"
            )));
        }
        if !(0.0..=1.0).contains(&delta) {
            return Err(DpError::invalid(format!(
                "delta must be in [0, 1], got {delta}"
            )));
        }
        Ok(Self { epsilon, delta })
    }

    /// Pure `epsilon`-DP budget (`delta = 0`).
    pub fn pure(epsilon: f64) -> Result<Self> {
        Self::new(epsilon, 0.0)
    }

    /// Target epsilon.
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Target delta.
    pub fn delta(&self) -> f64 {
        self.delta
    }
}

/// Noise distribution family of a mechanism.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MechanismFamily {
    /// Laplace noise; the noise parameter is the scale `b`.
    Laplace,
    /// Discrete Laplace noise on the integers, pmf proportional to
    /// `exp(-a |k|)`; the noise parameter is `a`. Larger `a` means less noise.
    DiscreteLaplace,
    /// Gaussian noise; the noise parameter is the standard deviation.
    Gaussian,
}

impl MechanismFamily {
    /// Short lowercase name used in logs and messages.
    pub fn name(&self) -> &'static str {
        match self {
            MechanismFamily::Laplace => "laplace",
            MechanismFamily::DiscreteLaplace => "discrete_laplace",
            MechanismFamily::Gaussian => "gaussian",
        }
    }
}

impl std::fmt::Display for MechanismFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A mechanism instance repeated `num_compositions` times.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MechanismSpec {
    /// Noise family.
    pub family: MechanismFamily,
    /// Scale, discrete Laplace parameter, or standard deviation.
    pub noise_parameter: f64,
    /// Maximum change of the query answer between adjacent datasets.
    pub sensitivity: f64,
    /// Number of times the mechanism is applied.
    pub num_compositions: usize,
}

impl MechanismSpec {
    /// Create a validated mechanism description.
    pub fn new(
        family: MechanismFamily,
        noise_parameter: f64,
        sensitivity: f64,
        num_compositions: usize,
    ) -> Result<Self> {
        let spec = Self {
            family,
            noise_parameter,
            sensitivity,
            num_compositions,
        };
        spec.validate()?;
        Ok(spec)
    }

    /// Check the invariants expected by composition oracles.
    pub fn validate(&self) -> Result<()> {
        if self.noise_parameter.is_nan() || self.noise_parameter < 0.0 {
            return Err(DpError::invalid(format!(
                "noise parameter must be >= 0, got {}",
                self.noise_parameter
            )));
        }
        if !self.sensitivity.is_finite() || self.sensitivity <= 0.0 {
            return Err(DpError::invalid(format!(
                "sensitivity must be finite and > 0, got {}",
                self.sensitivity
            )));
        }
        if self.num_compositions == 0 {
            return Err(DpError::invalid("number of compositions must be >= 1"));
        }
        Ok(())
    }

    /// Pure-DP epsilon of a single application, if the family has one.
    ///
    /// Gaussian noise has no finite pure-DP guarantee and returns `None`.
    pub fn single_query_epsilon(&self) -> Option<f64> {
        match self.family {
            MechanismFamily::Laplace => {
                if self.noise_parameter == 0.0 {
                    Some(f64::INFINITY)
                } else {
                    Some(self.sensitivity / self.noise_parameter)
                }
            }
            MechanismFamily::DiscreteLaplace => Some(self.noise_parameter * self.sensitivity),
            MechanismFamily::Gaussian => None,
        }
    }

    /// Epsilon under basic (linear) composition of the pure-DP guarantee.
    pub fn basic_composition_epsilon(&self) -> Option<f64> {
        self.single_query_epsilon()
            .map(|eps| eps * self.num_compositions as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_rejects_out_of_range_values() {
        assert!(PrivacyBudget::new(-0.1, 0.0).is_err());
        assert!(PrivacyBudget::new(f64::NAN, 0.0).is_err());
        assert!(PrivacyBudget::new(1.0, 1.5).is_err());
        assert!(PrivacyBudget::new(1.0, -1e-9).is_err());
        assert!(PrivacyBudget::new(1.0, f64::NAN).is_err());
        let budget = PrivacyBudget::new(0.0, 1.0).expect("edge values are valid");
        assert_eq!(budget.epsilon(), 0.0);
        assert_eq!(budget.delta(), 1.0);
    }

    #[test]
    fn spec_validation() {
        assert!(MechanismSpec::new(MechanismFamily::Laplace, -1.0, 1.0, 1).is_err());
        assert!(MechanismSpec::new(MechanismFamily::Laplace, 1.0, 0.0, 1).is_err());
        assert!(MechanismSpec::new(MechanismFamily::Laplace, 1.0, 1.0, 0).is_err());
        assert!(MechanismSpec::new(MechanismFamily::Gaussian, 0.0, 2.0, 3).is_ok());
    }

    #[test]
    fn basic_composition_is_linear() {
        let spec = MechanismSpec::new(MechanismFamily::Laplace, 70.0, 21.0, 10).expect("spec");
        let eps = spec.basic_composition_epsilon().expect("laplace is pure");
        assert!((eps - 3.0).abs() < 1e-12);

        let spec =
            MechanismSpec::new(MechanismFamily::DiscreteLaplace, 0.3, 2.0, 5).expect("spec");
        let eps = spec.basic_composition_epsilon().expect("discrete laplace is pure");
        assert!((eps - 3.0).abs() < 1e-12);

        let spec = MechanismSpec::new(MechanismFamily::Gaussian, 1.0, 1.0, 5).expect("spec");
        assert!(spec.basic_composition_epsilon().is_none());
    }

    #[test]
    fn zero_laplace_scale_is_not_private() {
        let spec = MechanismSpec::new(MechanismFamily::Laplace, 0.0, 1.0, 1).expect("spec");
        assert_eq!(spec.single_query_epsilon(), Some(f64::INFINITY));
    }
}
