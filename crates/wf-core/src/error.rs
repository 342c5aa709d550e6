//! Error types for the generation engine
//!
//! Provides error handling for:
//! - Configuration failures (fatal, generation never starts)
//! - Model call failures (surfaced, not retried)
//! - Safety violations (candidate never executed)
//! - Compile failures of safety-valid code
//! - Cancellation
//!
//! Interactivity deficiency is not an error: it drives retry and repair and
//! only surfaces as diagnostic text.

use serde::Serialize;
use wf_validation::{CompileError, SafetyViolation};

/// Main engine error type
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Missing credentials, model or prompt
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Model call failed
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    /// Generated code failed the safety scan
    #[error(transparent)]
    Safety(#[from] SafetyViolation),

    /// Generated code does not parse
    #[error("compile error: {0}")]
    Compile(#[from] CompileError),

    /// Generation was cancelled or superseded
    #[error("generation cancelled")]
    Cancelled,
}

impl EngineError {
    /// Failure category for suggestions
    #[must_use]
    pub fn category(&self) -> FailureCategory {
        match self {
            Self::Configuration(_) => FailureCategory::Configuration,
            Self::Model(e) => e.category(),
            Self::Safety(_) => FailureCategory::Safety,
            Self::Compile(_) => FailureCategory::Syntax,
            Self::Cancelled => FailureCategory::Cancelled,
        }
    }

    /// Human-readable error lines for the published result
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        match self {
            Self::Safety(violation) => violation.errors.clone(),
            Self::Compile(e) => e.messages(),
            other => vec![other.to_string()],
        }
    }

    /// Check if the orchestrator may retry this error itself
    ///
    /// Always false: only interactivity deficiency is retried.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        false
    }
}

/// Model call errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// Connection, timeout or stream interruption
    #[error("network error: {0}")]
    Network(String),

    /// Provider throttled the request
    #[error("rate limited: {0}")]
    RateLimit(String),

    /// Credentials rejected
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Model identifier unknown to the provider
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// Any other provider-side failure
    #[error("provider error: {0}")]
    Provider(String),
}

impl ModelError {
    /// Failure category for suggestions
    #[must_use]
    pub fn category(&self) -> FailureCategory {
        match self {
            Self::Network(_) => FailureCategory::Network,
            Self::RateLimit(_) => FailureCategory::RateLimit,
            Self::Auth(_) => FailureCategory::Auth,
            Self::ModelNotFound(_) => FailureCategory::ModelNotFound,
            Self::Provider(_) => FailureCategory::Provider,
        }
    }
}

/// Failure classification keyed to suggestion lists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureCategory {
    /// Missing or invalid configuration
    Configuration,
    /// Network failure
    Network,
    /// Credentials rejected
    Auth,
    /// Provider throttling
    RateLimit,
    /// Unknown model
    ModelNotFound,
    /// Other provider failure
    Provider,
    /// Generated code does not parse
    Syntax,
    /// Generated code failed the safety scan
    Safety,
    /// Generation cancelled
    Cancelled,
}

impl FailureCategory {
    /// Human-actionable suggestions for this category
    #[must_use]
    pub fn suggestions(&self) -> &'static [&'static str] {
        match self {
            Self::Configuration => &[
                "Set WIREFORGE_API_KEY or add api_key to the config file",
                "Choose a model with WIREFORGE_MODEL or the model setting",
                "Enter a non-empty prompt",
            ],
            Self::Network => &[
                "Check your internet connection",
                "Verify the API base URL is reachable",
                "Try again in a moment",
            ],
            Self::Auth => &[
                "Check that your API key is valid and not expired",
                "Confirm the key has access to the selected model",
            ],
            Self::RateLimit => &[
                "Wait a minute before generating again",
                "Switch to a model with a higher rate limit",
            ],
            Self::ModelNotFound => &[
                "Check the model name for typos",
                "Pick a model available to your account",
            ],
            Self::Provider => &[
                "Try again; the provider may be having issues",
                "Shorten the prompt if it is very long",
            ],
            Self::Syntax => &[
                "Regenerate the component",
                "Simplify the prompt to ask for a single component",
                "Ask for plain JSX without TypeScript-only syntax",
            ],
            Self::Safety => &[
                "Rephrase the prompt to avoid network, storage or timer features",
                "Ask for a self-contained component that only uses React state",
                "Regenerate to get a different implementation",
            ],
            Self::Cancelled => &[],
        }
    }
}
