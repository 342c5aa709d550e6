//! Wireforge Sandbox
//!
//! Isolated execution of generated UI code behind an explicit security
//! policy and a validated, typed message channel.
//!
//! # Components
//!
//! - [`SecurityPolicyBuilder`]: fresh-nonce, default-deny CSP policies
//! - [`DocumentBuilder`]: the HTML document loaded into the frame
//! - [`SandboxMessage`]: wire protocol with shape validation
//! - [`SandboxTransport`]: host side of the boundary, [`ChannelTransport`] in-process
//! - [`SandboxRuntime`]: mount and receive sanitized [`SandboxEvent`]s
//!
//! # Example
//!
//! ```rust,ignore
//! use wf_sandbox::{ChannelTransport, SandboxRuntime};
//!
//! let (transport, peer) = ChannelTransport::pair();
//! let runtime = SandboxRuntime::new(transport).with_host_origin("https://app.example");
//! let report = runtime.mount(&code).await?;
//! while let Some(event) = runtime.next_event().await {
//!     println!("{event:?}");
//! }
//! ```

#![warn(unreachable_pub)]

pub mod document;
pub mod error;
pub mod policy;
pub mod protocol;
pub mod runtime;
pub mod sanitize;
pub mod transport;

pub use document::{DocumentBuilder, SandboxDocument};
pub use error::{ProtocolError, SandboxError};
pub use policy::{SecurityPolicy, SecurityPolicyBuilder, PINNED_RUNTIME_SCRIPTS};
pub use protocol::{Envelope, SandboxEvent, SandboxMessage, OPAQUE_ORIGIN};
pub use runtime::{MountReport, SandboxRuntime, DEFAULT_HOST_ORIGIN, NONCE_HISTORY};
pub use transport::{ChannelPeer, ChannelTransport, SandboxTransport};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
