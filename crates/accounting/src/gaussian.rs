//! Analytic privacy profile of the Gaussian mechanism.
//!
//! `N` runs of a Gaussian mechanism with standard deviation `sigma` and
//! sensitivity `s` are equivalent to one run with sensitivity `s * sqrt(N)`,
//! so composition reduces to a single closed-form profile. Epsilon for a given
//! delta has no closed form and is found by inverting the (decreasing) delta
//! curve.

use statrs::distribution::{ContinuousCDF, Normal};

use dpnoise_core::{inverse_monotone_function, DpError, Result, SearchBounds, SearchOutcome};

/// Default tolerance when inverting the delta curve.
pub const DEFAULT_EPSILON_TOLERANCE: f64 = 1e-12;

/// `(epsilon, delta)` trade-off of a (composed) Gaussian mechanism.
#[derive(Clone, Debug)]
pub struct GaussianPrivacyProfile {
    noise_multiplier: f64,
    normal: Normal,
}

impl GaussianPrivacyProfile {
    /// Profile of `num_compositions` runs with the given standard deviation
    /// and sensitivity.
    pub fn new(standard_deviation: f64, sensitivity: f64, num_compositions: usize) -> Result<Self> {
        if !standard_deviation.is_finite() || standard_deviation <= 0.0 {
            return Err(DpError::invalid(format!(
                "standard deviation must be finite and > 0, got {standard_deviation}"
            )));
        }
        if !sensitivity.is_finite() || sensitivity <= 0.0 {
            return Err(DpError::invalid(format!(
                "sensitivity must be finite and > 0, got {sensitivity}"
            )));
        }
        if num_compositions == 0 {
            return Err(DpError::invalid("number of compositions must be >= 1"));
        }
        let effective_sensitivity = sensitivity * (num_compositions as f64).sqrt();
        Self::from_noise_multiplier(standard_deviation / effective_sensitivity)
    }

    /// Profile of a single run with `sigma / sensitivity = noise_multiplier`.
    pub fn from_noise_multiplier(noise_multiplier: f64) -> Result<Self> {
        if !noise_multiplier.is_finite() || noise_multiplier <= 0.0 {
            return Err(DpError::invalid(format!(
                "noise multiplier must be finite and > 0, got {noise_multiplier}"
            )));
        }
        let normal = Normal::new(0.0, 1.0)
            .map_err(|e| DpError::numerical(format!("standard normal: {e}")))?;
        Ok(Self {
            noise_multiplier,
            normal,
        })
    }

    /// Ratio of standard deviation to effective sensitivity.
    pub fn noise_multiplier(&self) -> f64 {
        self.noise_multiplier
    }

    /// Smallest delta such that the mechanism is `(epsilon, delta)`-DP.
    pub fn delta_for_epsilon(&self, epsilon: f64) -> f64 {
        if epsilon == f64::INFINITY {
            return 0.0;
        }
        let sigma = self.noise_multiplier;
        let term1 = self.normal.cdf(-epsilon * sigma + 1.0 / (2.0 * sigma));
        let tail = self.normal.cdf(-epsilon * sigma - 1.0 / (2.0 * sigma));
        // e^eps * tail, without overflowing e^eps for large eps.
        let term2 = if tail > 0.0 {
            (epsilon + tail.ln()).exp()
        } else {
            0.0
        };
        (term1 - term2).clamp(0.0, 1.0)
    }

    /// Smallest epsilon such that the mechanism is `(epsilon, delta)`-DP,
    /// rounded up to within `tolerance`.
    pub fn epsilon_for_delta(&self, delta: f64, tolerance: f64) -> Result<f64> {
        if !(0.0..=1.0).contains(&delta) {
            return Err(DpError::invalid(format!(
                "delta must be in [0, 1], got {delta}"
            )));
        }
        if delta == 0.0 {
            return Ok(f64::INFINITY);
        }
        if self.delta_for_epsilon(0.0) <= delta {
            return Ok(0.0);
        }

        let bounds = SearchBounds::unbounded_above(0.0)?.with_tolerance(tolerance)?;
        let outcome =
            inverse_monotone_function(|eps| Ok(self.delta_for_epsilon(eps)), delta, &bounds)?;
        Ok(match outcome {
            SearchOutcome::Found(eps) => eps,
            SearchOutcome::Infeasible => f64::INFINITY,
        })
    }
}
