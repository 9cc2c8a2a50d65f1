//! Composition accounting and noise calibration for repeated DP queries.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod calibrate;
pub mod gaussian;
pub mod oracles;
pub mod pld;

pub use calibrate::{
    smallest_discrete_laplace_noise, smallest_discrete_laplace_noise_with,
    smallest_gaussian_noise, smallest_gaussian_noise_with, smallest_laplace_noise,
    smallest_laplace_noise_with, smallest_parameter,
};
pub use gaussian::GaussianPrivacyProfile;
pub use oracles::{
    BasicCompositionOracle, CompositionOracle, OracleConfig, PldOracle, PldOracleConfig,
};
pub use pld::PrivacyLossDistribution;

/// Common imports for composition accounting.
pub mod prelude {
    pub use crate::{
        smallest_discrete_laplace_noise, smallest_discrete_laplace_noise_with,
        smallest_gaussian_noise, smallest_gaussian_noise_with, smallest_laplace_noise,
        smallest_laplace_noise_with, smallest_parameter, BasicCompositionOracle,
        CompositionOracle, GaussianPrivacyProfile, OracleConfig, PldOracle, PldOracleConfig,
        PrivacyLossDistribution,
    };
}
