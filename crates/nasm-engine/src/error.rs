//! Error types for the keystream engine

use thiserror::Error;

/// Errors raised while validating or compiling a [`crate::CipherConfig`].
///
/// Always raised before any byte is processed, so a failing config never
/// yields partial output.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Degree must be at least 1
    #[error("degree must be at least 1")]
    ZeroDegree,

    /// Seed window length does not match the degree
    #[error("seed count mismatch: degree is {degree}, got {seeds} seeds")]
    SeedCountMismatch {
        /// Configured degree
        degree: usize,
        /// Number of seeds supplied
        seeds: usize,
    },

    /// No operations configured
    #[error("operation list is empty")]
    EmptyOperations,

    /// No transform coefficients configured
    #[error("transform coefficient list is empty")]
    EmptyTransformCoefficients,

    /// Operation code is an empty string
    #[error("operation {index}: missing operator")]
    MissingOperator {
        /// Position of the operation in the config
        index: usize,
    },

    /// Operation code starts with something other than `+ - * /`
    #[error("operation {index}: unsupported operator '{operator}'")]
    UnsupportedOperator {
        /// Position of the operation in the config
        index: usize,
        /// The offending operator character
        operator: char,
    },

    /// Operand after the operator is not a finite number
    #[error("operation {index}: invalid operand in {code:?}")]
    InvalidOperand {
        /// Position of the operation in the config
        index: usize,
        /// The full operation code
        code: String,
    },

    /// Serialized config could not be decoded
    #[error("malformed config: {reason}")]
    Malformed {
        /// Decoder message
        reason: String,
    },
}

/// Errors from keystream transforms.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Config rejected before processing began
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Transform stopped by its cancel flag
    #[error("transform cancelled after {processed} of {total} bytes")]
    Cancelled {
        /// Bytes processed before the flag was observed
        processed: usize,
        /// Total bytes in the source buffer
        total: usize,
    },

    /// Sealed buffer is too short to hold its header
    #[error("sealed data truncated: header needs {required} bytes, got {actual}")]
    TruncatedHeader {
        /// Header size
        required: usize,
        /// Actual buffer length
        actual: usize,
    },
}

impl EngineError {
    /// Returns true if retrying with the same inputs cannot succeed.
    ///
    /// Cancellation is the only outcome that depends on something other than
    /// the inputs.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Config(_) => true,
            Self::TruncatedHeader { .. } => true,
            Self::Cancelled { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_is_fatal() {
        let err = EngineError::from(ConfigError::EmptyOperations);
        assert!(err.is_fatal());
    }

    #[test]
    fn cancelled_is_not_fatal() {
        let err = EngineError::Cancelled { processed: 4096, total: 10_000 };
        assert!(!err.is_fatal());
    }

    #[test]
    fn config_error_display_is_transparent() {
        let err = EngineError::from(ConfigError::UnsupportedOperator { index: 2, operator: '%' });
        assert_eq!(err.to_string(), "operation 2: unsupported operator '%'");
    }

    #[test]
    fn error_display() {
        let err = ConfigError::SeedCountMismatch { degree: 3, seeds: 2 };
        assert_eq!(err.to_string(), "seed count mismatch: degree is 3, got 2 seeds");
    }
}
