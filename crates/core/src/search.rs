//! Inversion of monotone functions by bracketing and bisection.
//!
//! [`inverse_monotone_function`] finds where a monotone function crosses a
//! target value. The direction of monotonicity is detected from the probes
//! themselves, so callers never declare it. Semi-infinite domains are handled
//! by growing a candidate point geometrically away from the lower bound until
//! the target is bracketed.
//!
//! The returned point is always the bracket end whose image does not exceed
//! the target, which makes the answer conservative when the function is a
//! privacy loss: the upper end for decreasing functions, the lower end for
//! increasing ones.

use tracing::{debug, trace};

use crate::{DpError, Result};

/// Default bracket width at which bisection stops.
pub const DEFAULT_TOLERANCE: f64 = 1e-9;
/// Factor by which the distance from the lower bound grows per expansion.
pub const GROWTH_FACTOR: f64 = 2.0;
/// Maximum number of expansion steps on an unbounded domain.
pub const MAX_EXPANSIONS: usize = 128;
/// Maximum number of bisection steps.
pub const MAX_BISECTIONS: usize = 256;

const DEFAULT_SEED_OFFSET: f64 = 1.0;

/// Search domain for [`inverse_monotone_function`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SearchBounds {
    lower: f64,
    upper: f64,
    initial_guess: Option<f64>,
    tolerance: f64,
}

impl SearchBounds {
    /// Closed domain `[lower, upper]`. `upper` may be `f64::INFINITY`.
    pub fn new(lower: f64, upper: f64) -> Result<Self> {
        let bounds = Self {
            lower,
            upper,
            initial_guess: None,
            tolerance: DEFAULT_TOLERANCE,
        };
        bounds.validate()?;
        Ok(bounds)
    }

    /// Semi-infinite domain `[lower, inf)`.
    pub fn unbounded_above(lower: f64) -> Result<Self> {
        Self::new(lower, f64::INFINITY)
    }

    /// Start the search from `guess`.
    pub fn with_initial_guess(mut self, guess: f64) -> Result<Self> {
        self.initial_guess = Some(guess);
        self.validate()?;
        Ok(self)
    }

    /// Stop bisecting once the bracket is at most `tolerance` wide.
    pub fn with_tolerance(mut self, tolerance: f64) -> Result<Self> {
        self.tolerance = tolerance;
        self.validate()?;
        Ok(self)
    }

    /// Lower end of the domain.
    pub fn lower(&self) -> f64 {
        self.lower
    }

    /// Upper end of the domain, possibly infinite.
    pub fn upper(&self) -> f64 {
        self.upper
    }

    /// Starting point, if any.
    pub fn initial_guess(&self) -> Option<f64> {
        self.initial_guess
    }

    /// Bisection stopping width.
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Whether the domain has no finite upper end.
    pub fn is_unbounded(&self) -> bool {
        self.upper == f64::INFINITY
    }

    fn validate(&self) -> Result<()> {
        if !self.lower.is_finite() {
            return Err(DpError::invalid(format!(
                "lower bound must be finite, got {}",
                self.lower
            )));
        }
        if self.upper.is_nan() || self.upper < self.lower {
            return Err(DpError::invalid(format!(
                "upper bound {} is below lower bound {}",
                self.upper, self.lower
            )));
        }
        if let Some(guess) = self.initial_guess {
            if !guess.is_finite() || guess < self.lower || guess > self.upper {
                return Err(DpError::invalid(format!(
                    "initial guess {guess} is outside [{}, {}]",
                    self.lower, self.upper
                )));
            }
        }
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(DpError::invalid(format!(
                "tolerance must be finite and > 0, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }
}

/// Result of inverting a monotone function.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SearchOutcome {
    /// A point whose image is within tolerance of, and not above, the target.
    Found(f64),
    /// The target is not attained anywhere in the search domain.
    Infeasible,
}

impl SearchOutcome {
    /// The solution, if one was found.
    pub fn value(&self) -> Option<f64> {
        match self {
            SearchOutcome::Found(x) => Some(*x),
            SearchOutcome::Infeasible => None,
        }
    }

    /// Whether the target was unreachable.
    pub fn is_infeasible(&self) -> bool {
        matches!(self, SearchOutcome::Infeasible)
    }

    /// Convert to a `Result`, mapping infeasibility to `err`.
    pub fn found_or(self, err: DpError) -> Result<f64> {
        self.value().ok_or(err)
    }
}

/// Direction of a monotone function, as observed from two probes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Monotonicity {
    /// Larger inputs give larger outputs.
    Increasing,
    /// Larger inputs give smaller outputs.
    Decreasing,
    /// The probes gave equal outputs.
    Constant,
}

impl Monotonicity {
    /// Direction implied by `f(a)` and `f(b)` with `a < b`.
    pub fn from_probes(f_a: f64, f_b: f64) -> Self {
        if f_b > f_a {
            Monotonicity::Increasing
        } else if f_b < f_a {
            Monotonicity::Decreasing
        } else {
            Monotonicity::Constant
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Bracket {
    lo: f64,
    hi: f64,
    f_lo: f64,
    f_hi: f64,
}

enum Bracketing {
    Done(SearchOutcome),
    Bracket(Bracket),
}

/// Find `x` in `bounds` with `func(x)` equal to `value`.
///
/// `func` must be monotone over the domain, in either direction. Errors
/// returned by `func` propagate unchanged; a NaN output is a
/// [`DpError::NumericalError`].
///
/// Returns [`SearchOutcome::Infeasible`] when `value` lies outside the range
/// of `func` over the domain. On an unbounded domain the expansion phase is
/// capped at [`MAX_EXPANSIONS`] steps; exceeding it (a non-monotone function,
/// or a target beyond the function's asymptote) is a
/// [`DpError::InvalidParameters`].
pub fn inverse_monotone_function<F>(
    mut func: F,
    value: f64,
    bounds: &SearchBounds,
) -> Result<SearchOutcome>
where
    F: FnMut(f64) -> Result<f64>,
{
    if value.is_nan() {
        return Err(DpError::invalid("target value must not be NaN"));
    }

    let mut eval = |x: f64| -> Result<f64> {
        let y = func(x)?;
        trace!(x, y, "evaluated monotone function");
        if y.is_nan() {
            return Err(DpError::numerical(format!(
                "function returned NaN at x = {x}"
            )));
        }
        Ok(y)
    };

    let lower = bounds.lower();
    let f_lower = eval(lower)?;
    if f_lower == value {
        return Ok(SearchOutcome::Found(lower));
    }

    let bracketing = if bounds.is_unbounded() {
        expand_bracket(&mut eval, value, bounds, f_lower)?
    } else {
        finite_bracket(&mut eval, value, bounds, f_lower)?
    };

    match bracketing {
        Bracketing::Done(outcome) => {
            debug!(?outcome, value, "search resolved while bracketing");
            Ok(outcome)
        }
        Bracketing::Bracket(bracket) => {
            debug!(
                lo = bracket.lo,
                hi = bracket.hi,
                direction = ?Monotonicity::from_probes(bracket.f_lo, bracket.f_hi),
                value,
                "bracketed target"
            );
            bisect(&mut eval, value, bracket, bounds.tolerance())
        }
    }
}

fn finite_bracket<F>(
    eval: &mut F,
    value: f64,
    bounds: &SearchBounds,
    f_lower: f64,
) -> Result<Bracketing>
where
    F: FnMut(f64) -> Result<f64>,
{
    let lower = bounds.lower();
    let upper = bounds.upper();
    let f_upper = if upper == lower { f_lower } else { eval(upper)? };
    if f_upper == value {
        return Ok(Bracketing::Done(SearchOutcome::Found(upper)));
    }
    if (f_lower < value) == (f_upper < value) {
        return Ok(Bracketing::Done(SearchOutcome::Infeasible));
    }

    let mut bracket = Bracket {
        lo: lower,
        hi: upper,
        f_lo: f_lower,
        f_hi: f_upper,
    };
    // A guess inside the domain narrows the bracket with one evaluation.
    if let Some(guess) = bounds.initial_guess().filter(|g| *g > lower && *g < upper) {
        let f_guess = eval(guess)?;
        if f_guess == value {
            return Ok(Bracketing::Done(SearchOutcome::Found(guess)));
        }
        if (f_guess < value) == (f_lower < value) {
            bracket.lo = guess;
            bracket.f_lo = f_guess;
        } else {
            bracket.hi = guess;
            bracket.f_hi = f_guess;
        }
    }
    Ok(Bracketing::Bracket(bracket))
}

fn expand_bracket<F>(
    eval: &mut F,
    value: f64,
    bounds: &SearchBounds,
    f_lower: f64,
) -> Result<Bracketing>
where
    F: FnMut(f64) -> Result<f64>,
{
    let lower = bounds.lower();
    let mut lo = lower;
    let mut f_lo = f_lower;
    let mut candidate = bounds
        .initial_guess()
        .filter(|g| *g > lower)
        .unwrap_or(lower + DEFAULT_SEED_OFFSET);
    let mut direction = Monotonicity::Constant;

    for step in 0..MAX_EXPANSIONS {
        let f_candidate = eval(candidate)?;
        if f_candidate == value {
            return Ok(Bracketing::Done(SearchOutcome::Found(candidate)));
        }
        if (f_candidate < value) != (f_lo < value) {
            return Ok(Bracketing::Bracket(Bracket {
                lo,
                hi: candidate,
                f_lo,
                f_hi: f_candidate,
            }));
        }

        if direction == Monotonicity::Constant {
            direction = Monotonicity::from_probes(f_lower, f_candidate);
        }
        // Moving away from the target: nothing on [lower, inf) reaches it.
        let unreachable = match direction {
            Monotonicity::Increasing => f_lower > value,
            Monotonicity::Decreasing => f_lower < value,
            Monotonicity::Constant => false,
        };
        if unreachable {
            return Ok(Bracketing::Done(SearchOutcome::Infeasible));
        }

        trace!(step, candidate, f_candidate, "expanding bracket");
        lo = candidate;
        f_lo = f_candidate;
        candidate = lower + (candidate - lower) * GROWTH_FACTOR;
        if !candidate.is_finite() {
            break;
        }
    }

    Err(DpError::invalid(format!(
        "could not bracket target {value} above {lower} within {MAX_EXPANSIONS} expansions; \
         the function may not be monotone or never reaches the target"
    )))
}

fn bisect<F>(eval: &mut F, value: f64, bracket: Bracket, tolerance: f64) -> Result<SearchOutcome>
where
    F: FnMut(f64) -> Result<f64>,
{
    // `inside` has an image at or below the target, `outside` above it.
    let (mut inside, mut outside) = if bracket.f_lo <= value {
        (bracket.lo, bracket.hi)
    } else {
        (bracket.hi, bracket.lo)
    };

    for _ in 0..MAX_BISECTIONS {
        if (outside - inside).abs() <= tolerance {
            break;
        }
        let mid = 0.5 * (inside + outside);
        if mid == inside || mid == outside {
            break;
        }
        if eval(mid)? <= value {
            inside = mid;
        } else {
            outside = mid;
        }
    }

    Ok(SearchOutcome::Found(inside))
}
