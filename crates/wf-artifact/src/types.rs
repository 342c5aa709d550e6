//! Core data model
//!
//! Defines the request/result pair that flows through the orchestrator and
//! the interactivity assessment attached to every candidate.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One generation request
///
/// Immutable once issued; a newer request supersedes it by cancellation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// User-facing natural-language prompt
    pub prompt: String,
    /// Model identifier
    pub model: String,
    /// Whether to consume the model output as a stream of chunks
    pub streaming: bool,
}

impl GenerationRequest {
    /// Create a non-streaming request
    #[inline]
    #[must_use]
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            streaming: false,
        }
    }

    /// Set streaming mode
    #[inline]
    #[must_use]
    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }
}

/// Three-level interactivity taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractivityLevel {
    /// Hooks, handlers and a score of at least 70
    Interactive,
    /// Some hooks or handlers and a score of at least 30
    Partial,
    /// Everything else
    Static,
}

impl InteractivityLevel {
    /// Lowercase name used in diagnostics and stats
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Interactive => "interactive",
            Self::Partial => "partial",
            Self::Static => "static",
        }
    }

    /// Whether this level is `Static`
    #[inline]
    #[must_use]
    pub fn is_static(&self) -> bool {
        matches!(self, Self::Static)
    }
}

impl fmt::Display for InteractivityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Heuristic interactivity assessment of one candidate code string
///
/// Derived and recomputed on every candidate; never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractivityAssessment {
    /// Classification
    pub level: InteractivityLevel,
    /// Score in `0..=100`
    pub score: u8,
    /// Any state, effect or other hook present
    pub has_hooks: bool,
    /// Any of the recognized event handlers present
    pub has_event_handlers: bool,
    /// A value binding co-occurring with a change handler
    pub has_controlled_inputs: bool,
    /// One entry per failed signal
    pub missing_patterns: Vec<String>,
    /// Actionable counterpart of each missing pattern
    pub suggestions: Vec<String>,
}

impl InteractivityAssessment {
    /// Assessment of empty input
    #[must_use]
    pub fn empty() -> Self {
        Self {
            level: InteractivityLevel::Static,
            score: 0,
            has_hooks: false,
            has_event_handlers: false,
            has_controlled_inputs: false,
            missing_patterns: Vec::new(),
            suggestions: Vec::new(),
        }
    }

    /// One-line summary, e.g. `partial (45/100)`
    #[must_use]
    pub fn summary(&self) -> String {
        format!("{} ({}/100)", self.level, self.score)
    }
}

/// Generation result published to the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResult {
    /// Candidate code
    pub code: String,
    /// Safety and syntax checks passed
    pub compile_ok: bool,
    /// Human-readable compile/safety errors
    pub compile_errors: Vec<String>,
    /// Interactivity assessment of `code`
    pub interactivity: InteractivityAssessment,
    /// Automatic retries performed (never above 2)
    pub retry_count: u8,
    /// Served from the result cache
    pub cache_hit: bool,
}

impl GenerationResult {
    /// Result for a candidate that has not been compiled yet
    #[must_use]
    pub fn candidate(code: impl Into<String>, interactivity: InteractivityAssessment, retry_count: u8) -> Self {
        Self {
            code: code.into(),
            compile_ok: false,
            compile_errors: Vec::new(),
            interactivity,
            retry_count,
            cache_hit: false,
        }
    }

    /// Whether this result qualifies for caching
    #[inline]
    #[must_use]
    pub fn is_cacheable(&self) -> bool {
        self.compile_ok && !self.interactivity.level.is_static()
    }
}
