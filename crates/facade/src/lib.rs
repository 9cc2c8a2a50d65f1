//! Facade crate re-exporting stable APIs.
//!
//! ```no_run
//! use dpnoise::{smallest_laplace_noise, PrivacyBudget};
//!
//! let budget = PrivacyBudget::new(1.0, 1e-4)?;
//! let scale = smallest_laplace_noise(budget, 20, 1.0)?;
//! println!("laplace scale: {:?}", scale.value());
//! # Ok::<(), dpnoise::DpError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use dpnoise_accounting as accounting;
pub use dpnoise_core as core;

pub use accounting::{
    smallest_discrete_laplace_noise, smallest_discrete_laplace_noise_with,
    smallest_gaussian_noise, smallest_gaussian_noise_with, smallest_laplace_noise,
    smallest_laplace_noise_with, smallest_parameter, BasicCompositionOracle, CompositionOracle,
    GaussianPrivacyProfile, OracleConfig, PldOracle, PldOracleConfig, PrivacyLossDistribution,
};
pub use dpnoise_core::{
    inverse_monotone_function, DpError, MechanismFamily, MechanismSpec, Monotonicity,
    PrivacyBudget, Result, SearchBounds, SearchOutcome,
};

/// Convenience prelude covering the calibration API.
pub mod prelude {
    pub use dpnoise_accounting::prelude::*;
    pub use dpnoise_core::prelude::*;
}
