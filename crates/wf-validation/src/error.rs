//! Error types for code validation
//!
//! Provides error handling for:
//! - Safety violations (deny-list and mount-shape failures)
//! - Compile failures (syntax errors in otherwise safe code)

/// Generated code failed the static safety scan
///
/// Fatal for the candidate: it is never executed and never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("safety violation: {}", errors.join("; "))]
pub struct SafetyViolation {
    /// Human-readable errors, one per failed check
    pub errors: Vec<String>,
    /// Exact offending deny-list tokens
    pub tokens: Vec<String>,
}

/// Structural failure of safety-valid code
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    /// Source contains syntax errors
    #[error("syntax errors: {}", .0.join("; "))]
    Syntax(Vec<String>),

    /// TSX grammar could not be loaded
    #[error("parser unavailable: {0}")]
    ParserUnavailable(String),

    /// Parser gave up without producing a tree
    #[error("parse aborted")]
    ParseAborted,
}

impl CompileError {
    /// Human-readable error lines
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        match self {
            Self::Syntax(errors) => errors.clone(),
            other => vec![other.to_string()],
        }
    }
}
