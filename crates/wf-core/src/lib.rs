//! Wireforge Core - Generation Orchestrator
//!
//! Turns a natural-language prompt into a validated, interactive UI component:
//! - Calls the model (single completion or stream)
//! - Scores interactivity and retries with enhanced prompts
//! - Falls back to auto-repair when retries are exhausted
//! - Rejects unsafe or unparsable code before it is published
//! - Caches non-static results in a bounded LRU
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use wf_cache::ResultCache;
//! use wf_core::{EngineConfig, GenerationOrchestrator, OpenAiClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = EngineConfig::new().with_env_overrides();
//! let client = Arc::new(OpenAiClient::from_config(&config)?);
//! let cache = Arc::new(ResultCache::new(config.cache_capacity));
//! let orchestrator = GenerationOrchestrator::new(client, cache, config);
//!
//! let result = orchestrator.generate("Create a counter with + and - buttons").await?;
//! println!("{} after {} retries", result.interactivity.summary(), result.retry_count);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod config;
pub mod error;
pub mod model;
pub mod orchestrator;
pub mod prompts;
pub mod state;

pub use config::{ConfigError, EngineConfig};
pub use error::{EngineError, FailureCategory, ModelError};
pub use model::{ChatMessage, ChatRequest, ChunkStream, ModelClient, OpenAiClient, Role};
pub use orchestrator::{backoff_delay, GenerationOrchestrator, MAX_RETRIES, STREAM_DEBOUNCE};
pub use state::{GenerationEvent, GenerationSnapshot, GenerationState};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for driving generations
    pub use crate::{
        EngineConfig, EngineError, GenerationEvent, GenerationOrchestrator, GenerationSnapshot,
        GenerationState, ModelClient, ModelError,
    };
    pub use wf_artifact::{GenerationRequest, GenerationResult, InteractivityAssessment, InteractivityLevel};
    pub use wf_cache::ResultCache;
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
