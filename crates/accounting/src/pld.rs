//! Privacy Loss Distribution (PLD) accounting for Laplace-family mechanisms.
//!
//! A mechanism's privacy loss is discretized onto a grid of width
//! `value_discretization_interval`, always rounding losses up so that every
//! derived `(epsilon, delta)` pair is an upper bound on the true one.
//! Compositions are FFT convolutions of the discretized pmfs.
//!
//! Laplace and discrete Laplace noise are symmetric, so the loss distribution
//! of the "remove" pair equals that of the "add" pair and a single pmf
//! describes the mechanism.

use std::collections::HashMap;

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use statrs::distribution::{ContinuousCDF, Laplace};

use dpnoise_core::{DpError, Result};

/// Default grid width for discretized privacy losses.
pub const DEFAULT_VALUE_DISCRETIZATION_INTERVAL: f64 = 1e-4;
/// Default probability mass dropped from the tails after each convolution.
pub const DEFAULT_TAIL_MASS_TRUNCATION: f64 = 1e-15;
/// Largest loss grid a single mechanism may be discretized onto.
pub const MAX_GRID_POINTS: f64 = (1u64 << 20) as f64;

#[derive(Clone, Debug)]
struct TailPrivacyLossDistribution {
    lower_x_truncation: f64,
    upper_x_truncation: f64,
    tail_mass: Vec<(f64, f64)>,
}

/// Privacy loss `ln(mu(x) / mu'(x))` that is non-increasing in the outcome `x`.
trait MonotonePrivacyLoss {
    fn privacy_loss(&self, x: f64) -> f64;
    fn inverse_privacy_loss(&self, loss: f64) -> f64;
    fn mu_upper_cdf(&self, x: f64) -> f64;
    fn privacy_loss_tail(&self) -> TailPrivacyLossDistribution;
}

/// Laplace noise centred at 0 against the same noise centred at `sensitivity`.
#[derive(Clone, Debug)]
struct LaplacePrivacyLoss {
    scale: f64,
    sensitivity: f64,
    noise: Laplace,
}

impl LaplacePrivacyLoss {
    fn new(scale: f64, sensitivity: f64) -> Result<Self> {
        let noise = Laplace::new(0.0, scale)
            .map_err(|e| DpError::numerical(format!("laplace(scale={scale}): {e}")))?;
        Ok(Self {
            scale,
            sensitivity,
            noise,
        })
    }
}

impl MonotonePrivacyLoss for LaplacePrivacyLoss {
    fn privacy_loss(&self, x: f64) -> f64 {
        ((x - self.sensitivity).abs() - x.abs()) / self.scale
    }

    fn inverse_privacy_loss(&self, loss: f64) -> f64 {
        // Only meaningful on the linear part, 0 <= x <= sensitivity.
        0.5 * (self.sensitivity - loss * self.scale)
    }

    fn mu_upper_cdf(&self, x: f64) -> f64 {
        self.noise.cdf(x)
    }

    fn privacy_loss_tail(&self) -> TailPrivacyLossDistribution {
        // Outside [0, sensitivity] the loss is constant at +/- sensitivity / scale.
        let max_loss = self.sensitivity / self.scale;
        TailPrivacyLossDistribution {
            lower_x_truncation: 0.0,
            upper_x_truncation: self.sensitivity,
            tail_mass: vec![
                (max_loss, self.mu_upper_cdf(0.0)),
                (-max_loss, 1.0 - self.mu_upper_cdf(self.sensitivity)),
            ],
        }
    }
}

#[derive(Clone, Debug)]
struct PldPmf {
    discretization: f64,
    lower_loss: i64,
    probs: Vec<f64>,
    infinity_mass: f64,
}

impl PldPmf {
    fn identity(discretization: f64) -> Self {
        Self {
            discretization,
            lower_loss: 0,
            probs: vec![1.0],
            infinity_mass: 0.0,
        }
    }

    fn from_map(loss_probs: &HashMap<i64, f64>, discretization: f64, infinity_mass: f64) -> Self {
        let min = *loss_probs.keys().min().unwrap_or(&0);
        let max = *loss_probs.keys().max().unwrap_or(&0);
        let size = (max - min + 1) as usize;
        let mut probs = vec![0.0_f64; size];
        for (k, v) in loss_probs {
            probs[(k - min) as usize] += *v;
        }
        Self {
            discretization,
            lower_loss: min,
            probs,
            infinity_mass,
        }
    }

    fn size(&self) -> usize {
        self.probs.len()
    }

    fn loss_at(&self, idx: usize) -> f64 {
        (self.lower_loss + idx as i64) as f64 * self.discretization
    }

    /// Drop `tail_mass_truncation` mass from the ends. The left tail is folded
    /// into the lowest kept bucket and the right tail into the infinity mass.
    fn truncate_tails(probs: Vec<f64>, tail_mass_truncation: f64) -> (usize, Vec<f64>, f64) {
        if tail_mass_truncation == 0.0 {
            return (0, probs, 0.0);
        }
        let half = tail_mass_truncation / 2.0;

        let mut left_idx = 0usize;
        let mut left_mass = 0.0;
        while left_idx < probs.len() && left_mass + probs[left_idx] <= half {
            left_mass += probs[left_idx];
            left_idx += 1;
        }

        let mut right_idx = probs.len();
        let mut right_mass = 0.0;
        while right_idx > left_idx + 1 && right_mass + probs[right_idx - 1] <= half {
            right_idx -= 1;
            right_mass += probs[right_idx];
        }

        if left_idx >= right_idx {
            return (0, probs, 0.0);
        }

        let mut truncated = probs[left_idx..right_idx].to_vec();
        if let Some(first) = truncated.first_mut() {
            *first += left_mass;
        }
        (left_idx, truncated, right_mass)
    }

    fn convolve(a: &[f64], b: &[f64]) -> Vec<f64> {
        let n = a.len() + b.len() - 1;
        let size = n.next_power_of_two();

        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(size);
        let ifft = planner.plan_fft_inverse(size);

        let mut fa = vec![Complex::new(0.0, 0.0); size];
        let mut fb = vec![Complex::new(0.0, 0.0); size];
        for (slot, &val) in fa.iter_mut().zip(a) {
            slot.re = val;
        }
        for (slot, &val) in fb.iter_mut().zip(b) {
            slot.re = val;
        }
        fft.process(&mut fa);
        fft.process(&mut fb);
        for (a_i, b_i) in fa.iter_mut().zip(fb.iter()) {
            *a_i *= *b_i;
        }
        ifft.process(&mut fa);

        let scale = 1.0 / size as f64;
        // Round-off can leave tiny negative masses.
        fa.iter().take(n).map(|c| (c.re * scale).max(0.0)).collect()
    }

    fn compose(&self, other: &Self, tail_mass_truncation: f64) -> Self {
        debug_assert!((self.discretization - other.discretization).abs() < 1e-12);
        let probs = Self::convolve(&self.probs, &other.probs);
        let infinity_mass =
            self.infinity_mass + other.infinity_mass - self.infinity_mass * other.infinity_mass;
        let (offset, truncated, right_tail) = Self::truncate_tails(probs, tail_mass_truncation);
        Self {
            discretization: self.discretization,
            lower_loss: self.lower_loss + other.lower_loss + offset as i64,
            probs: truncated,
            infinity_mass: (infinity_mass + right_tail).min(1.0),
        }
    }

    /// `num_times = 0` gives the identity (no loss).
    fn self_compose(&self, num_times: usize, tail_mass_truncation: f64) -> Self {
        let mut result: Option<Self> = None;
        let mut base = self.clone();
        let mut n = num_times;
        while n > 0 {
            if n % 2 == 1 {
                result = Some(match result {
                    Some(acc) => acc.compose(&base, tail_mass_truncation),
                    None => base.clone(),
                });
            }
            n /= 2;
            if n > 0 {
                base = base.compose(&base, tail_mass_truncation);
            }
        }
        result.unwrap_or_else(|| Self::identity(self.discretization))
    }

    fn get_delta_for_epsilon(&self, epsilon: f64) -> f64 {
        let mut delta = self.infinity_mass;
        for (i, prob) in self.probs.iter().enumerate() {
            let loss = self.loss_at(i);
            if loss > epsilon {
                delta += -(epsilon - loss).exp_m1() * prob;
            }
        }
        delta.clamp(0.0, 1.0)
    }

    fn get_epsilon_for_delta(&self, delta: f64) -> f64 {
        if self.infinity_mass > delta {
            return f64::INFINITY;
        }
        let mut mass_upper = self.infinity_mass;
        let mut mass_lower = 0.0;

        for idx in (0..self.size()).rev() {
            let loss = self.loss_at(idx);
            let prob = self.probs[idx];
            if mass_upper > delta && mass_lower > 0.0 {
                let eps = ((mass_upper - delta) / mass_lower).ln();
                if eps >= loss {
                    return eps.max(0.0);
                }
            }
            mass_upper += prob;
            mass_lower += prob * (-loss).exp();
            if mass_upper >= delta && mass_lower == 0.0 {
                return loss.max(0.0);
            }
        }

        if mass_upper <= mass_lower + delta {
            return 0.0;
        }
        ((mass_upper - delta) / mass_lower).ln().max(0.0)
    }
}

fn round_loss_up(loss: f64, discretization: f64) -> i64 {
    (loss / discretization).ceil() as i64
}

fn create_pld_pmf_from_monotone_privacy_loss<T: MonotonePrivacyLoss>(
    mpl: &T,
    value_discretization_interval: f64,
) -> PldPmf {
    let tail = mpl.privacy_loss_tail();
    let mut infinity_mass = 0.0;
    let mut loss_probs: HashMap<i64, f64> = HashMap::new();

    for (loss, mass) in tail.tail_mass.iter().copied() {
        if mass <= 0.0 {
            continue;
        }
        if loss.is_infinite() {
            infinity_mass += mass;
            continue;
        }
        let idx = round_loss_up(loss, value_discretization_interval);
        *loss_probs.entry(idx).or_insert(0.0) += mass;
    }

    let lower_pl = mpl.privacy_loss(tail.upper_x_truncation);
    let upper_pl = mpl.privacy_loss(tail.lower_x_truncation);
    let k_min = round_loss_up(lower_pl, value_discretization_interval);
    let k_max = round_loss_up(upper_pl, value_discretization_interval);

    for k in k_min..=k_max {
        let lower_loss = (k as f64 - 1.0) * value_discretization_interval;
        let upper_loss = k as f64 * value_discretization_interval;

        let x_low = mpl
            .inverse_privacy_loss(upper_loss)
            .clamp(tail.lower_x_truncation, tail.upper_x_truncation);
        let x_high = mpl
            .inverse_privacy_loss(lower_loss)
            .clamp(tail.lower_x_truncation, tail.upper_x_truncation);
        if x_high > x_low {
            let mass = mpl.mu_upper_cdf(x_high) - mpl.mu_upper_cdf(x_low);
            if mass > 0.0 {
                *loss_probs.entry(k).or_insert(0.0) += mass;
            }
        }
    }

    PldPmf::from_map(&loss_probs, value_discretization_interval, infinity_mass)
}

fn create_pld_pmf_from_discrete_laplace(
    parameter: f64,
    sensitivity: u64,
    value_discretization_interval: f64,
) -> PldPmf {
    // P(X = k) = tanh(a / 2) * exp(-a |k|); the loss at outcome k is
    // a * (|k - s| - |k|), constant outside 0 < k < s.
    let a = parameter;
    let denom = 1.0 + (-a).exp();
    let mut loss_probs: HashMap<i64, f64> = HashMap::new();
    let mut add = |loss: f64, mass: f64| {
        if mass > 0.0 {
            let idx = round_loss_up(loss, value_discretization_interval);
            *loss_probs.entry(idx).or_insert(0.0) += mass;
        }
    };

    let s = sensitivity as f64;
    add(a * s, 1.0 / denom);
    add(-a * s, (-a * s).exp() / denom);
    let point_mass = (0.5 * a).tanh();
    for k in 1..sensitivity {
        let k = k as f64;
        add(a * (s - 2.0 * k), point_mass * (-a * k).exp());
    }

    PldPmf::from_map(&loss_probs, value_discretization_interval, 0.0)
}

fn check_interval(value_discretization_interval: f64) -> Result<()> {
    if !value_discretization_interval.is_finite() || value_discretization_interval <= 0.0 {
        return Err(DpError::config(format!(
            "value_discretization_interval must be finite and > 0, got {value_discretization_interval}"
        )));
    }
    Ok(())
}

/// Losses span `[-max_loss, max_loss]`.
fn check_grid_size(max_loss: f64, value_discretization_interval: f64) -> Result<()> {
    let grid_points = 2.0 * max_loss / value_discretization_interval;
    if !grid_points.is_finite() || grid_points > MAX_GRID_POINTS {
        return Err(DpError::invalid(format!(
            "loss grid of {grid_points} points exceeds {MAX_GRID_POINTS}; \
             increase the noise or value_discretization_interval"
        )));
    }
    Ok(())
}

/// Discretized, pessimistic privacy loss distribution of a symmetric mechanism.
#[derive(Clone, Debug)]
pub struct PrivacyLossDistribution {
    pmf: PldPmf,
}

impl PrivacyLossDistribution {
    /// PLD of one Laplace mechanism with the given scale and sensitivity.
    pub fn from_laplace_mechanism(
        scale: f64,
        sensitivity: f64,
        value_discretization_interval: f64,
    ) -> Result<Self> {
        check_interval(value_discretization_interval)?;
        if !scale.is_finite() || scale <= 0.0 {
            return Err(DpError::invalid(format!(
                "laplace scale must be finite and > 0, got {scale}"
            )));
        }
        if !sensitivity.is_finite() || sensitivity <= 0.0 {
            return Err(DpError::invalid(format!(
                "sensitivity must be finite and > 0, got {sensitivity}"
            )));
        }
        check_grid_size(sensitivity / scale, value_discretization_interval)?;
        let mpl = LaplacePrivacyLoss::new(scale, sensitivity)?;
        Ok(Self {
            pmf: create_pld_pmf_from_monotone_privacy_loss(&mpl, value_discretization_interval),
        })
    }

    /// PLD of one discrete Laplace mechanism with parameter `a` and integer
    /// sensitivity.
    pub fn from_discrete_laplace_mechanism(
        parameter: f64,
        sensitivity: u64,
        value_discretization_interval: f64,
    ) -> Result<Self> {
        check_interval(value_discretization_interval)?;
        if !parameter.is_finite() || parameter <= 0.0 {
            return Err(DpError::invalid(format!(
                "discrete laplace parameter must be finite and > 0, got {parameter}"
            )));
        }
        if sensitivity == 0 {
            return Err(DpError::invalid("sensitivity must be >= 1"));
        }
        // One atom per outcome in 0..=sensitivity.
        if sensitivity as f64 > MAX_GRID_POINTS {
            return Err(DpError::invalid(format!(
                "sensitivity {sensitivity} exceeds {MAX_GRID_POINTS}"
            )));
        }
        check_grid_size(parameter * sensitivity as f64, value_discretization_interval)?;
        Ok(Self {
            pmf: create_pld_pmf_from_discrete_laplace(
                parameter,
                sensitivity,
                value_discretization_interval,
            ),
        })
    }

    /// PLD of `num_times` independent runs of this mechanism; zero runs leak
    /// nothing.
    pub fn self_compose(&self, num_times: usize, tail_mass_truncation: f64) -> Self {
        Self {
            pmf: self.pmf.self_compose(num_times, tail_mass_truncation),
        }
    }

    /// Smallest epsilon for which the mechanism is `(epsilon, delta)`-DP.
    pub fn get_epsilon_for_delta(&self, delta: f64) -> f64 {
        self.pmf.get_epsilon_for_delta(delta)
    }

    /// Smallest delta for which the mechanism is `(epsilon, delta)`-DP.
    pub fn get_delta_for_epsilon(&self, epsilon: f64) -> f64 {
        self.pmf.get_delta_for_epsilon(epsilon)
    }

    /// Number of grid points carrying finite loss.
    pub fn support_size(&self) -> usize {
        self.pmf.size()
    }

    /// Mass assigned to infinite privacy loss.
    pub fn infinity_mass(&self) -> f64 {
        self.pmf.infinity_mass
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn total_mass(pld: &PrivacyLossDistribution) -> f64 {
        pld.pmf.probs.iter().sum::<f64>() + pld.pmf.infinity_mass
    }

    #[test]
    fn laplace_pmf_is_normalized() {
        let pld = PrivacyLossDistribution::from_laplace_mechanism(2.0, 1.0, 1e-3).expect("pld");
        assert!((total_mass(&pld) - 1.0).abs() < 1e-9);
        assert_eq!(pld.infinity_mass(), 0.0);
    }

    #[test]
    fn single_laplace_is_pure_dp() {
        let pld = PrivacyLossDistribution::from_laplace_mechanism(2.0, 1.0, 1e-4).expect("pld");
        let eps = pld.get_epsilon_for_delta(0.0);
        assert!((eps - 0.5).abs() < 2e-4, "eps = {eps}");
        assert!(pld.get_delta_for_epsilon(0.5 + 1e-3) < 1e-12);
    }

    #[test]
    fn discrete_laplace_pmf_is_normalized() {
        for sensitivity in [1u64, 2, 7] {
            let pld = PrivacyLossDistribution::from_discrete_laplace_mechanism(
                0.3,
                sensitivity,
                1e-4,
            )
            .expect("pld");
            assert!((total_mass(&pld) - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn discrete_laplace_with_unit_sensitivity_is_randomized_response() {
        let a: f64 = 0.5;
        let pld =
            PrivacyLossDistribution::from_discrete_laplace_mechanism(a, 1, 1e-4).expect("pld");
        // Two atoms at +/- a with weights 1 / (1 + e^-a) and e^-a / (1 + e^-a).
        let expected = (0.5 * a).tanh();
        let delta = pld.get_delta_for_epsilon(0.0);
        assert!((delta - expected).abs() < 1e-3, "delta = {delta}, expected {expected}");
        assert!(pld.support_size() >= 10_000);
    }

    #[test]
    fn composition_grows_epsilon() {
        let pld = PrivacyLossDistribution::from_laplace_mechanism(10.0, 1.0, 1e-4).expect("pld");
        let composed = pld.self_compose(20, DEFAULT_TAIL_MASS_TRUNCATION);
        let eps_one = pld.get_epsilon_for_delta(1e-4);
        let eps_many = composed.get_epsilon_for_delta(1e-4);
        assert!(eps_many > eps_one);
        // Tight accounting beats basic composition.
        assert!(eps_many < 20.0 * 0.1);
        assert!((total_mass(&composed) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn self_compose_matches_repeated_compose() {
        let pld = PrivacyLossDistribution::from_laplace_mechanism(3.0, 1.0, 1e-3).expect("pld");
        let fast = pld.self_compose(5, 0.0);
        let mut slow = pld.pmf.clone();
        for _ in 1..5 {
            slow = slow.compose(&pld.pmf, 0.0);
        }
        let eps_fast = fast.get_epsilon_for_delta(1e-5);
        let eps_slow = slow.get_epsilon_for_delta(1e-5);
        assert!((eps_fast - eps_slow).abs() < 1e-9);
    }

    #[test]
    fn epsilon_and_delta_are_consistent() {
        let pld = PrivacyLossDistribution::from_laplace_mechanism(5.0, 1.0, 1e-4)
            .expect("pld")
            .self_compose(10, DEFAULT_TAIL_MASS_TRUNCATION);
        let eps = pld.get_epsilon_for_delta(1e-3);
        let delta = pld.get_delta_for_epsilon(eps);
        assert!(delta <= 1e-3 + 1e-9, "delta = {delta}");
    }

    #[test]
    fn zero_compositions_is_the_identity() {
        let pld = PrivacyLossDistribution::from_laplace_mechanism(2.0, 1.0, 1e-3).expect("pld");
        let none = pld.self_compose(0, DEFAULT_TAIL_MASS_TRUNCATION);
        assert_eq!(none.support_size(), 1);
        assert_eq!(none.get_delta_for_epsilon(0.0), 0.0);
        assert_eq!(none.get_epsilon_for_delta(0.0), 0.0);

        let once = pld.self_compose(1, DEFAULT_TAIL_MASS_TRUNCATION);
        assert_eq!(once.support_size(), pld.support_size());
    }

    #[test]
    fn oversized_grids_are_rejected() {
        let err = PrivacyLossDistribution::from_laplace_mechanism(1e-9, 1.0, 1e-4)
            .expect_err("tiny scale");
        assert!(matches!(err, DpError::InvalidParameters { .. }));
        let err = PrivacyLossDistribution::from_discrete_laplace_mechanism(1e6, 1, 1e-4)
            .expect_err("huge parameter");
        assert!(matches!(err, DpError::InvalidParameters { .. }));
        assert!(
            PrivacyLossDistribution::from_discrete_laplace_mechanism(1e-9, u64::MAX, 1e-4).is_err()
        );
        // Right at the limit still builds.
        assert!(PrivacyLossDistribution::from_laplace_mechanism(1.0, 1.0, 1e-4).is_ok());
    }

    #[test]
    fn rejects_bad_inputs() {
        assert!(PrivacyLossDistribution::from_laplace_mechanism(0.0, 1.0, 1e-4).is_err());
        assert!(PrivacyLossDistribution::from_laplace_mechanism(1.0, 1.0, 0.0).is_err());
        assert!(PrivacyLossDistribution::from_discrete_laplace_mechanism(1.0, 0, 1e-4).is_err());
    }
}
