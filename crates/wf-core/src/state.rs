//! Generation state, snapshots and events

use crate::error::FailureCategory;
use serde::Serialize;
use std::fmt;
use wf_artifact::{GenerationResult, InteractivityAssessment};

/// Orchestrator state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationState {
    /// Nothing in flight
    Idle,
    /// Waiting for a single completion
    Generating,
    /// Receiving streamed chunks
    Streaming,
    /// Extracting and assessing the candidate
    Validating,
    /// Backing off before a follow-up call
    Retrying,
    /// Safety and syntax checks passed
    Compiled,
    /// Generation failed
    Error,
}

impl GenerationState {
    /// Whether the generation has finished
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Compiled | Self::Error)
    }

    /// Lowercase name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Generating => "generating",
            Self::Streaming => "streaming",
            Self::Validating => "validating",
            Self::Retrying => "retrying",
            Self::Compiled => "compiled",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for GenerationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only view published after every transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationSnapshot {
    /// Generation this snapshot belongs to, 0 before the first
    pub generation_id: u64,
    /// Current state
    pub state: GenerationState,
    /// Original user prompt
    pub prompt: Option<String>,
    /// Model identifier
    pub model: Option<String>,
    /// Latest candidate or final result
    pub result: Option<GenerationResult>,
    /// Debounced assessment of the partial stream buffer
    pub interim: Option<InteractivityAssessment>,
    /// Bytes received so far while streaming
    pub streamed_bytes: usize,
    /// Interim assessments published for the current stream
    pub interim_passes: usize,
    /// Informational diagnostics, oldest first
    pub diagnostics: Vec<String>,
    /// Failure message when `state == Error`
    pub error: Option<String>,
    /// Failure category when `state == Error`
    pub failure: Option<FailureCategory>,
    /// Suggestions for the failure category
    pub suggestions: Vec<String>,
}

impl GenerationSnapshot {
    /// Idle snapshot
    #[must_use]
    pub fn idle() -> Self {
        Self {
            generation_id: 0,
            state: GenerationState::Idle,
            prompt: None,
            model: None,
            result: None,
            interim: None,
            streamed_bytes: 0,
            interim_passes: 0,
            diagnostics: Vec::new(),
            error: None,
            failure: None,
            suggestions: Vec::new(),
        }
    }

    /// Fresh snapshot for a new generation
    #[must_use]
    pub fn started(generation_id: u64, prompt: &str, model: &str) -> Self {
        Self {
            generation_id,
            prompt: Some(prompt.to_string()),
            model: Some(model.to_string()),
            ..Self::idle()
        }
    }
}

impl Default for GenerationSnapshot {
    fn default() -> Self {
        Self::idle()
    }
}

/// Fine-grained notifications
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum GenerationEvent {
    /// State transition
    StateChanged {
        /// Generation id
        generation_id: u64,
        /// New state
        state: GenerationState,
    },
    /// Streamed text chunk, in arrival order
    Chunk {
        /// Generation id
        generation_id: u64,
        /// Chunk text
        text: String,
    },
    /// Informational diagnostic
    Diagnostic {
        /// Generation id
        generation_id: u64,
        /// Diagnostic text
        message: String,
    },
}
