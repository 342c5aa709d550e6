//! Wireforge Artifact Model
//!
//! Data types shared by every stage of the generation pipeline.
//!
//! # Core Concepts
//!
//! - [`GenerationRequest`]: Immutable description of one generation
//! - [`GenerationResult`]: Snapshot of the candidate code and its assessment
//! - [`InteractivityAssessment`]: Heuristic 0-100 score plus 3-level taxonomy
//! - [`CodeDigest`]: 32-byte Blake3 digest identifying a code payload
//!
//! # Example
//!
//! ```rust,ignore
//! use wf_artifact::{CodeDigest, extract_code};
//!
//! let code = extract_code(model_output);
//! println!("digest: {}", CodeDigest::of(&code).short());
//! ```

#![warn(unreachable_pub)]

mod digest;
mod extract;
mod types;

pub use digest::{CodeDigest, DigestError};
pub use extract::extract_code;
pub use types::{
    GenerationRequest, GenerationResult, InteractivityAssessment, InteractivityLevel,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
