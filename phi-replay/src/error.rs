//! Errors in the library.
use thiserror::Error;

/// Errors raised by [`ReplayMemory`](crate::ReplayMemory).
#[derive(Error, Debug, PartialEq)]
pub enum ReplayMemoryError {
    /// The operation is not defined for the mode of the memory.
    #[error("{op} is not supported when wrap_memory = {wrap_memory}")]
    WrongMode {
        /// Name of the operation.
        op: &'static str,
        /// Mode of the memory.
        wrap_memory: bool,
    },

    /// Not enough history to draw a sample.
    #[error("insufficient history: size = {size}, required = {required}")]
    InsufficientHistory {
        /// Number of stored records.
        size: usize,
        /// Number of records the request needs.
        required: usize,
    },

    /// Rejection sampling gave up.
    #[error("sampling gave up after {attempts} consecutive rejected draws")]
    RetriesExhausted {
        /// Number of consecutive rejected draws.
        attempts: usize,
    },

    /// Invalid argument or configuration.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Persisted data is inconsistent.
    #[error("corrupted replay memory: {0}")]
    Corrupted(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ReplayMemoryError::WrongMode {
            op: "resize",
            wrap_memory: true,
        };
        assert_eq!(
            err.to_string(),
            "resize is not supported when wrap_memory = true"
        );

        let err = ReplayMemoryError::InsufficientHistory {
            size: 2,
            required: 4,
        };
        assert_eq!(err.to_string(), "insufficient history: size = 2, required = 4");
    }
}
