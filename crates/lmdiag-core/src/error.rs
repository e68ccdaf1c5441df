// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use thiserror::Error;

/// Errors surfaced by lmdiag operations.
///
/// Short inputs are not errors: analyzers report them through their own
/// "unknown" results. Inconsistent embedding row lengths panic at
/// construction instead of returning a variant here.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DiagError {
    /// Malformed arguments or configuration.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Values the numeric routines cannot work with (non-finite data,
    /// mismatched vocabulary and matrix lengths).
    #[error("degenerate input: {0}")]
    DegenerateInput(String),
}

impl DiagError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn degenerate_input(msg: impl Into<String>) -> Self {
        Self::DegenerateInput(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::DiagError;

    #[test]
    fn constructors_wrap_messages_in_matching_variants() {
        assert_eq!(
            DiagError::invalid_input("bad step"),
            DiagError::InvalidInput("bad step".to_string())
        );
        assert_eq!(
            DiagError::degenerate_input(String::from("nan in row 3")),
            DiagError::DegenerateInput("nan in row 3".to_string())
        );
    }

    #[test]
    fn display_prefixes_error_class() {
        let err = DiagError::degenerate_input("row 2 contains NaN");
        assert_eq!(err.to_string(), "degenerate input: row 2 contains NaN");
        let err = DiagError::invalid_input("window must be >= 1");
        assert_eq!(err.to_string(), "invalid input: window must be >= 1");
    }

    #[test]
    fn boxes_as_std_error() {
        let boxed: Box<dyn std::error::Error> = Box::new(DiagError::invalid_input("x"));
        assert!(boxed.to_string().contains("invalid input"));
    }
}
