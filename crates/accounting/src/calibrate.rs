//! Calibration of the smallest noise meeting a privacy budget over repeated
//! queries.
//!
//! Each routine turns "epsilon achieved after `num_queries` runs" into a
//! function of the noise parameter and inverts it with
//! [`inverse_monotone_function`] on `[0, inf)`. Only monotonicity is assumed,
//! not its direction: Laplace and Gaussian epsilons fall as the noise
//! parameter grows, discrete Laplace epsilon rises with its parameter `a`.

use tracing::{debug, warn};

use dpnoise_core::{
    inverse_monotone_function, DpError, MechanismFamily, MechanismSpec, PrivacyBudget, Result,
    SearchBounds, SearchOutcome,
};

use crate::oracles::{CompositionOracle, PldOracle};

fn validate_request(budget: &PrivacyBudget, num_queries: usize, sensitivity: f64) -> Result<()> {
    if num_queries == 0 {
        return Err(DpError::invalid("num_queries must be >= 1"));
    }
    if !sensitivity.is_finite() || sensitivity <= 0.0 {
        return Err(DpError::invalid(format!(
            "sensitivity must be finite and > 0, got {sensitivity}"
        )));
    }
    if !budget.epsilon().is_finite() {
        return Err(DpError::invalid("target epsilon must be finite"));
    }
    Ok(())
}

/// Smallest-noise parameter of `family` meeting `budget` over `num_queries`
/// runs, according to `oracle`.
///
/// For Laplace and Gaussian this is the smallest scale or standard deviation;
/// for discrete Laplace the largest parameter `a`. The returned parameter never
/// exceeds the budget (up to the solver tolerance on the conservative side).
pub fn smallest_parameter<O: CompositionOracle + ?Sized>(
    oracle: &O,
    family: MechanismFamily,
    budget: PrivacyBudget,
    num_queries: usize,
    sensitivity: f64,
) -> Result<SearchOutcome> {
    validate_request(&budget, num_queries, sensitivity)?;
    debug!(
        %family,
        epsilon = budget.epsilon(),
        delta = budget.delta(),
        num_queries,
        sensitivity,
        "calibrating noise"
    );

    let mut warned = false;
    let achieved_epsilon = |noise_parameter: f64| -> Result<f64> {
        let mechanism = MechanismSpec::new(family, noise_parameter, sensitivity, num_queries)?;
        let eps = oracle.epsilon(&mechanism, budget.delta())?;
        if eps.is_infinite() && noise_parameter > 0.0 && !warned {
            warned = true;
            warn!(
                %family,
                noise_parameter,
                delta = budget.delta(),
                "oracle reports infinite epsilon for positive noise"
            );
        }
        Ok(eps)
    };

    let bounds = SearchBounds::unbounded_above(0.0)?;
    let outcome = inverse_monotone_function(achieved_epsilon, budget.epsilon(), &bounds)?;
    debug!(%family, ?outcome, "calibration finished");
    Ok(outcome)
}

/// Smallest Laplace scale meeting `budget` over `num_queries` queries.
pub fn smallest_laplace_noise_with<O: CompositionOracle + ?Sized>(
    oracle: &O,
    budget: PrivacyBudget,
    num_queries: usize,
    sensitivity: f64,
) -> Result<SearchOutcome> {
    smallest_parameter(
        oracle,
        MechanismFamily::Laplace,
        budget,
        num_queries,
        sensitivity,
    )
}

/// Largest discrete Laplace parameter `a` (i.e. smallest noise) meeting
/// `budget` over `num_queries` queries.
pub fn smallest_discrete_laplace_noise_with<O: CompositionOracle + ?Sized>(
    oracle: &O,
    budget: PrivacyBudget,
    num_queries: usize,
    sensitivity: f64,
) -> Result<SearchOutcome> {
    smallest_parameter(
        oracle,
        MechanismFamily::DiscreteLaplace,
        budget,
        num_queries,
        sensitivity,
    )
}

/// Smallest Gaussian standard deviation meeting `budget` over `num_queries`
/// queries.
pub fn smallest_gaussian_noise_with<O: CompositionOracle + ?Sized>(
    oracle: &O,
    budget: PrivacyBudget,
    num_queries: usize,
    sensitivity: f64,
) -> Result<SearchOutcome> {
    smallest_parameter(
        oracle,
        MechanismFamily::Gaussian,
        budget,
        num_queries,
        sensitivity,
    )
}

/// [`smallest_laplace_noise_with`] using the default [`PldOracle`].
pub fn smallest_laplace_noise(
    budget: PrivacyBudget,
    num_queries: usize,
    sensitivity: f64,
) -> Result<SearchOutcome> {
    smallest_laplace_noise_with(&PldOracle::new(), budget, num_queries, sensitivity)
}

/// [`smallest_discrete_laplace_noise_with`] using the default [`PldOracle`].
pub fn smallest_discrete_laplace_noise(
    budget: PrivacyBudget,
    num_queries: usize,
    sensitivity: f64,
) -> Result<SearchOutcome> {
    smallest_discrete_laplace_noise_with(&PldOracle::new(), budget, num_queries, sensitivity)
}

/// [`smallest_gaussian_noise_with`] using the default [`PldOracle`].
pub fn smallest_gaussian_noise(
    budget: PrivacyBudget,
    num_queries: usize,
    sensitivity: f64,
) -> Result<SearchOutcome> {
    smallest_gaussian_noise_with(&PldOracle::new(), budget, num_queries, sensitivity)
}
