//! Transport between host and isolated context
//!
//! Any isolation primitive that can load a document and deliver
//! origin-tagged messages back satisfies [`SandboxTransport`].
//! [`ChannelTransport`] is the in-process implementation used by tests and
//! by hosts that drive the frame themselves.

use crate::document::SandboxDocument;
use crate::error::SandboxError;
use crate::protocol::{Envelope, SandboxMessage, OPAQUE_ORIGIN};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{mpsc, Mutex};

/// Host side of the sandbox boundary
#[async_trait]
pub trait SandboxTransport: Send + Sync {
    /// Replace the isolated context's document
    async fn load_document(&self, document: SandboxDocument) -> Result<(), SandboxError>;

    /// Next inbound envelope, `None` once the channel is closed
    async fn recv(&self) -> Option<Envelope>;
}

/// In-process transport backed by tokio channels
#[derive(Debug)]
pub struct ChannelTransport {
    documents: mpsc::UnboundedSender<SandboxDocument>,
    inbound: Mutex<mpsc::UnboundedReceiver<Envelope>>,
}

/// Frame side of a [`ChannelTransport`]
#[derive(Debug)]
pub struct ChannelPeer {
    documents: mpsc::UnboundedReceiver<SandboxDocument>,
    outbound: mpsc::UnboundedSender<Envelope>,
    origin: String,
    mount_id: u64,
}

impl ChannelTransport {
    /// Create a connected transport/peer pair
    #[must_use]
    pub fn pair() -> (Self, ChannelPeer) {
        let (doc_tx, doc_rx) = mpsc::unbounded_channel();
        let (env_tx, env_rx) = mpsc::unbounded_channel();
        (
            Self {
                documents: doc_tx,
                inbound: Mutex::new(env_rx),
            },
            ChannelPeer {
                documents: doc_rx,
                outbound: env_tx,
                origin: OPAQUE_ORIGIN.to_string(),
                mount_id: 0,
            },
        )
    }
}

#[async_trait]
impl SandboxTransport for ChannelTransport {
    async fn load_document(&self, document: SandboxDocument) -> Result<(), SandboxError> {
        self.documents.send(document).map_err(|_| SandboxError::Closed)
    }

    async fn recv(&self) -> Option<Envelope> {
        self.inbound.lock().await.recv().await
    }
}

impl ChannelPeer {
    /// Post as a different origin
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    /// Wait for the next document and adopt its mount id
    pub async fn next_document(&mut self) -> Option<SandboxDocument> {
        let document = self.documents.recv().await?;
        self.mount_id = document.mount_id;
        Some(document)
    }

    /// Post a raw payload from the current document
    ///
    /// # Errors
    /// Returns [`SandboxError::Closed`] when the host side is gone
    pub fn post_raw(&self, payload: Value) -> Result<(), SandboxError> {
        self.post_envelope(Envelope::new(self.mount_id, self.origin.clone(), payload))
    }

    /// Post a typed message from the current document
    ///
    /// # Errors
    /// Returns [`SandboxError::Closed`] when the host side is gone
    pub fn post(&self, message: &SandboxMessage) -> Result<(), SandboxError> {
        let payload = serde_json::to_value(message).map_err(|e| SandboxError::Transport(e.to_string()))?;
        self.post_raw(payload)
    }

    /// Post a fully specified envelope
    ///
    /// # Errors
    /// Returns [`SandboxError::Closed`] when the host side is gone
    pub fn post_envelope(&self, envelope: Envelope) -> Result<(), SandboxError> {
        self.outbound.send(envelope).map_err(|_| SandboxError::Closed)
    }
}
