//! Error types for noise calibration.

/// Errors that can occur while calibrating noise.
///
/// An unreachable privacy target is not an error: it is reported as
/// [`SearchOutcome::Infeasible`](crate::SearchOutcome::Infeasible).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DpError {
    /// Invalid parameter provided.
    #[error("invalid parameter: {msg}")]
    InvalidParameters {
        /// Human-readable error description.
        msg: String,
    },

    /// Numerical computation error.
    #[error("numerical error: {msg}")]
    NumericalError {
        /// Human-readable error description.
        msg: String,
    },

    /// Configuration error.
    #[error("configuration error: {msg}")]
    ConfigError {
        /// Human-readable error description.
        msg: String,
    },

    /// Unsupported feature or configuration.
    #[error("unsupported feature: {msg}")]
    UnsupportedFeature {
        /// Human-readable error description.
        msg: String,
    },
}

/// Result type for calibration operations.
pub type Result<T> = std::result::Result<T, DpError>;

impl DpError {
    /// Create an invalid parameter error.
    pub fn invalid<S: Into<String>>(msg: S) -> Self {
        Self::InvalidParameters { msg: msg.into() }
    }

    /// Create a numerical error.
    pub fn numerical<S: Into<String>>(msg: S) -> Self {
        Self::NumericalError { msg: msg.into() }
    }

    /// Create a configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::ConfigError { msg: msg.into() }
    }

    /// Create an unsupported feature error.
    pub fn unsupported<S: Into<String>>(msg: S) -> Self {
        Self::UnsupportedFeature { msg: msg.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_the_kind() {
        assert_eq!(
            DpError::invalid("x_lo > x_hi").to_string(),
            "invalid parameter: x_lo > x_hi"
        );
        assert_eq!(
            DpError::unsupported("gaussian").to_string(),
            "unsupported feature: gaussian"
        );
    }
}
