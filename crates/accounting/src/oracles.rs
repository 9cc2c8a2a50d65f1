//! Composition oracles: epsilon achieved by a mechanism repeated N times.
//!
//! Calibration only needs one number from an oracle, the epsilon reached at a
//! fixed delta, and relies on it being monotone in the noise parameter. How
//! that number is derived is up to the implementation.

use tracing::trace;

use dpnoise_core::{DpError, MechanismFamily, MechanismSpec, Result};

use crate::gaussian::{GaussianPrivacyProfile, DEFAULT_EPSILON_TOLERANCE};
use crate::pld::{
    PrivacyLossDistribution, DEFAULT_TAIL_MASS_TRUNCATION, DEFAULT_VALUE_DISCRETIZATION_INTERVAL,
};

/// Largest composed loss grid the PLD oracle will build before falling back
/// to basic composition.
pub const MAX_COMPOSED_GRID_POINTS: f64 = (1u64 << 20) as f64;

/// Epsilon achieved at a fixed delta after composing a mechanism.
pub trait CompositionOracle {
    /// Epsilon such that `mechanism.num_compositions` runs of the mechanism
    /// are `(epsilon, delta)`-DP. May be `f64::INFINITY`.
    fn epsilon(&self, mechanism: &MechanismSpec, delta: f64) -> Result<f64>;
}

impl<T: CompositionOracle + ?Sized> CompositionOracle for &T {
    fn epsilon(&self, mechanism: &MechanismSpec, delta: f64) -> Result<f64> {
        (**self).epsilon(mechanism, delta)
    }
}

fn check_delta(delta: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&delta) {
        return Err(DpError::invalid(format!(
            "delta must be in [0, 1], got {delta}"
        )));
    }
    Ok(())
}

/// Configuration for constructing an oracle.
pub trait OracleConfig {
    /// Oracle type created by this config.
    type Oracle: CompositionOracle;

    /// Create a new oracle, validating the configuration.
    fn create_oracle(&self) -> Result<Self::Oracle>;
}

/// Linear composition of pure-DP guarantees: `N * single_query_epsilon`.
///
/// Valid for every delta but loose when `delta > 0`. Gaussian noise has no
/// pure-DP guarantee and is unsupported.
#[derive(Clone, Copy, Debug, Default)]
pub struct BasicCompositionOracle;

impl CompositionOracle for BasicCompositionOracle {
    fn epsilon(&self, mechanism: &MechanismSpec, delta: f64) -> Result<f64> {
        mechanism.validate()?;
        check_delta(delta)?;
        mechanism.basic_composition_epsilon().ok_or_else(|| {
            DpError::unsupported(format!(
                "basic composition has no pure-DP bound for {}",
                mechanism.family
            ))
        })
    }
}

/// Configuration for the PLD oracle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PldOracleConfig {
    /// Grid width for discretized privacy losses.
    pub value_discretization_interval: f64,
    /// Probability mass dropped from the tails after each convolution.
    pub tail_mass_truncation: f64,
    /// Tolerance of the epsilon inversion for Gaussian noise.
    pub gaussian_tolerance: f64,
}

impl Default for PldOracleConfig {
    fn default() -> Self {
        Self {
            value_discretization_interval: DEFAULT_VALUE_DISCRETIZATION_INTERVAL,
            tail_mass_truncation: DEFAULT_TAIL_MASS_TRUNCATION,
            gaussian_tolerance: DEFAULT_EPSILON_TOLERANCE,
        }
    }
}

impl PldOracleConfig {
    /// Create a config with an explicit discretization interval.
    pub fn new(value_discretization_interval: f64) -> Self {
        Self {
            value_discretization_interval,
            ..Self::default()
        }
    }

    /// Set the tail mass dropped after each convolution.
    pub fn with_tail_mass_truncation(mut self, tail_mass_truncation: f64) -> Self {
        self.tail_mass_truncation = tail_mass_truncation;
        self
    }

    /// Set the tolerance of the Gaussian epsilon inversion.
    pub fn with_gaussian_tolerance(mut self, gaussian_tolerance: f64) -> Self {
        self.gaussian_tolerance = gaussian_tolerance;
        self
    }

    fn validate(&self) -> Result<()> {
        if !self.value_discretization_interval.is_finite()
            || self.value_discretization_interval <= 0.0
        {
            return Err(DpError::config(format!(
                "value_discretization_interval must be finite and > 0, got {}",
                self.value_discretization_interval
            )));
        }
        if !(0.0..1.0).contains(&self.tail_mass_truncation) {
            return Err(DpError::config(format!(
                "tail_mass_truncation must be in [0, 1), got {}",
                self.tail_mass_truncation
            )));
        }
        if !self.gaussian_tolerance.is_finite() || self.gaussian_tolerance <= 0.0 {
            return Err(DpError::config(format!(
                "gaussian_tolerance must be finite and > 0, got {}",
                self.gaussian_tolerance
            )));
        }
        Ok(())
    }
}

impl OracleConfig for PldOracleConfig {
    type Oracle = PldOracle;

    fn create_oracle(&self) -> Result<Self::Oracle> {
        self.validate()?;
        Ok(PldOracle { config: *self })
    }
}

/// Tight composition accounting.
///
/// Gaussian noise uses the analytic profile; Laplace and discrete Laplace
/// noise use pessimistic discretized privacy loss distributions when
/// `delta > 0` and basic composition when `delta = 0`, where it is exact.
#[derive(Clone, Copy, Debug, Default)]
pub struct PldOracle {
    config: PldOracleConfig,
}

impl PldOracle {
    /// Oracle with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Active configuration.
    pub fn config(&self) -> &PldOracleConfig {
        &self.config
    }

    /// Delta such that the composed mechanism is `(epsilon, delta)`-DP.
    pub fn delta(&self, mechanism: &MechanismSpec, epsilon: f64) -> Result<f64> {
        mechanism.validate()?;
        if epsilon.is_nan() || epsilon < 0.0 {
            return Err(DpError::invalid(format!(
                "epsilon must be >= 0, got {epsilon}"
            )));
        }
        match mechanism.family {
            MechanismFamily::Gaussian => {
                if mechanism.noise_parameter == 0.0 {
                    return Ok(1.0);
                }
                let profile = GaussianPrivacyProfile::new(
                    mechanism.noise_parameter,
                    mechanism.sensitivity,
                    mechanism.num_compositions,
                )?;
                Ok(profile.delta_for_epsilon(epsilon))
            }
            MechanismFamily::Laplace | MechanismFamily::DiscreteLaplace => {
                let basic = mechanism
                    .basic_composition_epsilon()
                    .unwrap_or(f64::INFINITY);
                if epsilon >= basic {
                    return Ok(0.0);
                }
                if basic.is_infinite() {
                    return Ok(1.0);
                }
                match self.composed_pld(mechanism)? {
                    Some(pld) => Ok(pld.get_delta_for_epsilon(epsilon)),
                    None => Err(DpError::unsupported(format!(
                        "{} loss grid too large to compute delta",
                        mechanism.family
                    ))),
                }
            }
        }
    }

    /// Composed PLD, or `None` when the grid would be too large or the noise
    /// is degenerate.
    fn composed_pld(&self, mechanism: &MechanismSpec) -> Result<Option<PrivacyLossDistribution>> {
        let Some(single) = mechanism.single_query_epsilon() else {
            return Ok(None);
        };
        if single == 0.0 || !single.is_finite() {
            return Ok(None);
        }
        let interval = self.config.value_discretization_interval;
        let grid_points = 2.0 * single / interval * mechanism.num_compositions as f64;
        if grid_points > MAX_COMPOSED_GRID_POINTS {
            trace!(
                family = %mechanism.family,
                grid_points,
                "loss grid too large, using basic composition"
            );
            return Ok(None);
        }

        let pld = match mechanism.family {
            MechanismFamily::Laplace => PrivacyLossDistribution::from_laplace_mechanism(
                mechanism.noise_parameter,
                mechanism.sensitivity,
                interval,
            )?,
            MechanismFamily::DiscreteLaplace => {
                let sensitivity = integer_sensitivity(mechanism.sensitivity)?;
                PrivacyLossDistribution::from_discrete_laplace_mechanism(
                    mechanism.noise_parameter,
                    sensitivity,
                    interval,
                )?
            }
            MechanismFamily::Gaussian => return Ok(None),
        };
        Ok(Some(pld.self_compose(
            mechanism.num_compositions,
            self.config.tail_mass_truncation,
        )))
    }
}

fn integer_sensitivity(sensitivity: f64) -> Result<u64> {
    if sensitivity.fract() != 0.0 || sensitivity < 1.0 || sensitivity > u32::MAX as f64 {
        return Err(DpError::invalid(format!(
            "discrete laplace sensitivity must be a positive integer, got {sensitivity}"
        )));
    }
    Ok(sensitivity as u64)
}

impl CompositionOracle for PldOracle {
    fn epsilon(&self, mechanism: &MechanismSpec, delta: f64) -> Result<f64> {
        mechanism.validate()?;
        check_delta(delta)?;

        let eps = match mechanism.family {
            MechanismFamily::Gaussian => {
                if mechanism.noise_parameter == 0.0 || delta == 0.0 {
                    f64::INFINITY
                } else {
                    GaussianPrivacyProfile::new(
                        mechanism.noise_parameter,
                        mechanism.sensitivity,
                        mechanism.num_compositions,
                    )?
                    .epsilon_for_delta(delta, self.config.gaussian_tolerance)?
                }
            }
            MechanismFamily::Laplace | MechanismFamily::DiscreteLaplace => {
                let basic = mechanism
                    .basic_composition_epsilon()
                    .unwrap_or(f64::INFINITY);
                if delta == 0.0 {
                    basic
                } else {
                    match self.composed_pld(mechanism)? {
                        // Both are valid bounds; keep the tighter one.
                        Some(pld) => pld.get_epsilon_for_delta(delta).min(basic),
                        None => basic,
                    }
                }
            }
        };
        trace!(
            family = %mechanism.family,
            noise = mechanism.noise_parameter,
            delta,
            eps,
            "oracle epsilon"
        );
        Ok(eps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(family: MechanismFamily, noise: f64, sensitivity: f64, n: usize) -> MechanismSpec {
        MechanismSpec::new(family, noise, sensitivity, n).expect("spec")
    }

    #[test]
    fn default_config_creates_oracle() {
        let oracle = PldOracleConfig::default().create_oracle().expect("oracle");
        assert_eq!(
            oracle.config().value_discretization_interval,
            DEFAULT_VALUE_DISCRETIZATION_INTERVAL
        );
    }

    #[test]
    fn invalid_config_is_rejected() {
        let err = PldOracleConfig::new(0.0).create_oracle().expect_err("interval");
        assert!(matches!(err, DpError::ConfigError { .. }));
        assert!(PldOracleConfig::default()
            .with_tail_mass_truncation(1.0)
            .create_oracle()
            .is_err());
        assert!(PldOracleConfig::default()
            .with_gaussian_tolerance(-1.0)
            .create_oracle()
            .is_err());
    }

    #[test]
    fn basic_oracle_is_linear() {
        let eps = BasicCompositionOracle
            .epsilon(&spec(MechanismFamily::Laplace, 70.0, 21.0, 10), 0.0)
            .expect("epsilon");
        assert!((eps - 3.0).abs() < 1e-12);
        let err = BasicCompositionOracle
            .epsilon(&spec(MechanismFamily::Gaussian, 1.0, 1.0, 1), 1e-5)
            .expect_err("gaussian");
        assert!(matches!(err, DpError::UnsupportedFeature { .. }));
    }

    #[test]
    fn zero_noise_edges() {
        let oracle = PldOracle::new();
        let laplace = oracle
            .epsilon(&spec(MechanismFamily::Laplace, 0.0, 1.0, 3), 1e-5)
            .expect("epsilon");
        assert_eq!(laplace, f64::INFINITY);
        let gaussian = oracle
            .epsilon(&spec(MechanismFamily::Gaussian, 0.0, 1.0, 3), 1e-5)
            .expect("epsilon");
        assert_eq!(gaussian, f64::INFINITY);
        let discrete = oracle
            .epsilon(&spec(MechanismFamily::DiscreteLaplace, 0.0, 1.0, 3), 1e-5)
            .expect("epsilon");
        assert_eq!(discrete, 0.0);
    }

    #[test]
    fn gaussian_without_delta_is_not_private() {
        let eps = PldOracle::new()
            .epsilon(&spec(MechanismFamily::Gaussian, 5.0, 1.0, 1), 0.0)
            .expect("epsilon");
        assert_eq!(eps, f64::INFINITY);
    }

    #[test]
    fn tight_accounting_beats_basic_composition() {
        let mech = spec(MechanismFamily::Laplace, 13.6, 1.0, 20);
        let tight = PldOracle::new().epsilon(&mech, 1e-4).expect("epsilon");
        let basic = BasicCompositionOracle.epsilon(&mech, 1e-4).expect("epsilon");
        assert!(tight < basic);
        assert!((tight - 1.0).abs() < 0.05, "tight = {tight}");
    }

    #[test]
    fn laplace_epsilon_decreases_with_scale() {
        let oracle = PldOracle::new();
        let mut prev = f64::INFINITY;
        for scale in [2.0, 4.0, 8.0, 16.0, 32.0] {
            let eps = oracle
                .epsilon(&spec(MechanismFamily::Laplace, scale, 1.0, 10), 1e-5)
                .expect("epsilon");
            assert!(eps <= prev);
            prev = eps;
        }
    }

    #[test]
    fn discrete_laplace_epsilon_increases_with_parameter() {
        let oracle = PldOracle::new();
        let mut prev = 0.0;
        for a in [0.01, 0.02, 0.05, 0.1] {
            let eps = oracle
                .epsilon(&spec(MechanismFamily::DiscreteLaplace, a, 2.0, 10), 1e-5)
                .expect("epsilon");
            assert!(eps >= prev);
            prev = eps;
        }
    }

    #[test]
    fn discrete_laplace_needs_integer_sensitivity() {
        let err = PldOracle::new()
            .epsilon(&spec(MechanismFamily::DiscreteLaplace, 0.1, 1.5, 2), 1e-5)
            .expect_err("fractional sensitivity");
        assert!(matches!(err, DpError::InvalidParameters { .. }));
    }

    #[test]
    fn huge_grids_fall_back_to_basic_composition() {
        let mech = spec(MechanismFamily::Laplace, 1e-3, 1.0, 50);
        let eps = PldOracle::new().epsilon(&mech, 1e-5).expect("epsilon");
        assert!((eps - 50_000.0).abs() < 1e-6);
    }

    #[test]
    fn delta_matches_epsilon() {
        let oracle = PldOracle::new();
        let mech = spec(MechanismFamily::Laplace, 5.0, 1.0, 10);
        let eps = oracle.epsilon(&mech, 1e-3).expect("epsilon");
        let delta = oracle.delta(&mech, eps).expect("delta");
        assert!(delta <= 1e-3 + 1e-9);

        let mech = spec(MechanismFamily::Gaussian, 2.0, 1.0, 4);
        let eps = oracle.epsilon(&mech, 1e-6).expect("epsilon");
        let delta = oracle.delta(&mech, eps).expect("delta");
        assert!((delta - 1e-6).abs() < 1e-9);
    }

    #[test]
    fn oracle_by_reference() {
        fn eps_of<O: CompositionOracle>(oracle: O) -> f64 {
            oracle
                .epsilon(&spec(MechanismFamily::Laplace, 1.0, 1.0, 2), 0.0)
                .expect("epsilon")
        }
        let oracle = PldOracle::new();
        assert!((eps_of(&oracle) - 2.0).abs() < 1e-12);
    }
}
