//! Core building blocks for calibrating differential-privacy noise.
//!
//! This crate provides the monotone solver used by every calibration routine,
//! the error type, and the shared parameter types passed between calibration
//! routines and composition oracles.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod params;
pub mod search;

pub use error::{DpError, Result};
pub use params::{MechanismFamily, MechanismSpec, PrivacyBudget};
pub use search::{
    inverse_monotone_function, Monotonicity, SearchBounds, SearchOutcome, DEFAULT_TOLERANCE,
};

/// Common imports for downstream users.
pub mod prelude {
    pub use crate::{
        inverse_monotone_function, DpError, MechanismFamily, MechanismSpec, Monotonicity,
        PrivacyBudget, Result, SearchBounds, SearchOutcome,
    };
}
