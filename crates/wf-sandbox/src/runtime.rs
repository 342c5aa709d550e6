//! Sandbox runtime
//!
//! Mounts validated code into the isolated context and turns inbound
//! envelopes into sanitized [`SandboxEvent`]s. Envelopes are dropped when
//! they come from another mount or origin, fail shape validation, carry a
//! host-direction message, or repeat `ready`.

use crate::document::DocumentBuilder;
use crate::error::SandboxError;
use crate::policy::{SecurityPolicy, SecurityPolicyBuilder};
use crate::protocol::{Envelope, SandboxEvent, SandboxMessage, OPAQUE_ORIGIN};
use crate::sanitize::{sanitize_message, sanitize_stack, sanitize_text};
use crate::transport::SandboxTransport;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use wf_artifact::CodeDigest;
use wf_validation::{CodeSafetyValidator, MountShape};

/// Default host origin the document posts to
pub const DEFAULT_HOST_ORIGIN: &str = "http://localhost";

/// Number of recent nonces remembered for reuse detection
pub const NONCE_HISTORY: usize = 256;

/// What was mounted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MountReport {
    /// Monotonic mount counter
    pub mount_id: u64,
    /// Digest of the mounted code
    pub digest: CodeDigest,
    /// Nonce of the mount's policy
    pub nonce: String,
    /// How the document mounts the component
    pub mount_shape: MountShape,
    /// Frame `sandbox` attribute for the host
    pub frame_sandbox: &'static str,
}

#[derive(Debug, Default)]
struct MountState {
    mount_id: u64,
    digest: Option<CodeDigest>,
    used_nonces: NonceHistory,
    ready_seen: bool,
}

/// Bounded record of issued nonces, oldest evicted first
#[derive(Debug, Default)]
struct NonceHistory {
    order: VecDeque<String>,
    seen: HashSet<String>,
}

impl NonceHistory {
    /// Record `nonce`; false when it is already present
    fn insert(&mut self, nonce: &str) -> bool {
        if self.seen.contains(nonce) {
            return false;
        }
        if self.order.len() == NONCE_HISTORY {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.order.push_back(nonce.to_string());
        self.seen.insert(nonce.to_string());
        true
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.order.len()
    }
}

/// Host-side controller of one isolated context
#[derive(Debug)]
pub struct SandboxRuntime<T> {
    transport: T,
    policies: SecurityPolicyBuilder,
    documents: DocumentBuilder,
    validator: CodeSafetyValidator,
    sandbox_origin: String,
    state: Mutex<MountState>,
}

impl<T: SandboxTransport> SandboxRuntime<T> {
    /// Create runtime with default policy and host origin
    #[must_use]
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            policies: SecurityPolicyBuilder::new(),
            documents: DocumentBuilder::new(DEFAULT_HOST_ORIGIN),
            validator: CodeSafetyValidator::new(),
            sandbox_origin: OPAQUE_ORIGIN.to_string(),
            state: Mutex::new(MountState::default()),
        }
    }

    /// Use a custom policy builder
    #[must_use]
    pub fn with_policy_builder(mut self, policies: SecurityPolicyBuilder) -> Self {
        self.policies = policies;
        self
    }

    /// Set the host origin embedded in documents
    #[must_use]
    pub fn with_host_origin(mut self, origin: impl Into<String>) -> Self {
        self.documents = DocumentBuilder::new(origin);
        self
    }

    /// Set the origin inbound messages must report
    #[must_use]
    pub fn with_sandbox_origin(mut self, origin: impl Into<String>) -> Self {
        self.sandbox_origin = origin.into();
        self
    }

    /// Underlying transport
    #[inline]
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Digest of the currently mounted code
    #[must_use]
    pub fn mounted_digest(&self) -> Option<CodeDigest> {
        self.state.lock().digest
    }

    /// Mount code under a freshly issued policy
    ///
    /// # Errors
    /// - `SandboxError::Unsafe` when the safety re-check fails
    /// - `SandboxError::Closed`/`Transport` when the document cannot be loaded
    pub async fn mount(&self, code: &str) -> Result<MountReport, SandboxError> {
        let policy = self.policies.issue();
        self.mount_with_policy(code, policy).await
    }

    /// Mount code under a caller-supplied policy
    ///
    /// # Errors
    /// As [`Self::mount`], plus `SandboxError::NonceReuse` when the policy's
    /// nonce was used by any earlier mount
    pub async fn mount_with_policy(
        &self,
        code: &str,
        policy: SecurityPolicy,
    ) -> Result<MountReport, SandboxError> {
        let mount_shape = self.validator.validate(code).into_result()?;

        let document = {
            let mut state = self.state.lock();
            if !state.used_nonces.insert(&policy.nonce) {
                tracing::warn!(nonce = %policy.nonce, "Rejected mount with reused nonce");
                return Err(SandboxError::NonceReuse { nonce: policy.nonce });
            }
            state.mount_id += 1;
            let document = self.documents.build(state.mount_id, code, &mount_shape, &policy);
            state.digest = Some(document.digest);
            state.ready_seen = false;
            document
        };

        let mount_id = document.mount_id;
        let digest = document.digest;
        let frame_sandbox = policy.frame_sandbox_attribute();
        self.transport.load_document(document).await?;

        tracing::info!(mount_id, digest = %digest.short(), "Mounted code in sandbox");

        Ok(MountReport {
            mount_id,
            digest,
            nonce: policy.nonce,
            mount_shape,
            frame_sandbox,
        })
    }

    /// Next accepted event, `None` once the transport closes
    pub async fn next_event(&self) -> Option<SandboxEvent> {
        loop {
            let envelope = self.transport.recv().await?;
            if let Some(event) = self.accept(envelope) {
                return Some(event);
            }
        }
    }

    /// Filter and sanitize one envelope
    fn accept(&self, envelope: Envelope) -> Option<SandboxEvent> {
        let mut state = self.state.lock();

        if state.digest.is_none() || envelope.mount_id != state.mount_id {
            tracing::debug!(
                mount_id = envelope.mount_id,
                current = state.mount_id,
                "Dropped message from stale mount"
            );
            return None;
        }
        if envelope.origin != self.sandbox_origin {
            tracing::warn!(origin = %envelope.origin, "Dropped message with unexpected origin");
            return None;
        }

        let message = match SandboxMessage::from_value(&envelope.payload) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(error = %e, "Dropped malformed sandbox message");
                return None;
            }
        };

        match message {
            SandboxMessage::Load { .. } => {
                tracing::warn!("Dropped host-direction message from sandbox");
                None
            }
            SandboxMessage::Ready if state.ready_seen => {
                tracing::debug!("Dropped duplicate ready");
                None
            }
            SandboxMessage::Ready => {
                state.ready_seen = true;
                Some(SandboxEvent::Ready)
            }
            SandboxMessage::RuntimeError { message, stack } => Some(SandboxEvent::RuntimeError {
                message: sanitize_message(&message),
                stack: stack.as_deref().map(sanitize_stack),
            }),
            SandboxMessage::RuntimeLog { data } => Some(SandboxEvent::RuntimeLog { data }),
            SandboxMessage::SecurityViolation { directive, blocked_uri } => {
                Some(SandboxEvent::SecurityViolation {
                    directive: sanitize_text(&directive),
                    blocked_uri: blocked_uri.as_deref().map(sanitize_text),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::SandboxDocument;
    use crate::transport::ChannelTransport;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    /// Frame that posts `ready` while its document is still being loaded
    struct EagerFrame {
        outbound: mpsc::UnboundedSender<Envelope>,
        inbound: tokio::sync::Mutex<mpsc::UnboundedReceiver<Envelope>>,
    }

    impl EagerFrame {
        fn new() -> Self {
            let (outbound, inbound) = mpsc::unbounded_channel();
            Self {
                outbound,
                inbound: tokio::sync::Mutex::new(inbound),
            }
        }
    }

    #[async_trait]
    impl SandboxTransport for EagerFrame {
        async fn load_document(&self, document: SandboxDocument) -> Result<(), SandboxError> {
            let ready = Envelope::new(document.mount_id, OPAQUE_ORIGIN, json!({ "type": "ready" }));
            self.outbound.send(ready).map_err(|_| SandboxError::Closed)?;
            for _ in 0..4 {
                tokio::task::yield_now().await;
            }
            Ok(())
        }

        async fn recv(&self) -> Option<Envelope> {
            self.inbound.lock().await.recv().await
        }
    }

    const CODE: &str = "function App() { return <p>Hi</p>; }\nReactDOM.render(<App />, document.getElementById('root'));";

    #[tokio::test]
    async fn mount_records_digest_and_loads_document() {
        let (transport, mut peer) = ChannelTransport::pair();
        let runtime = SandboxRuntime::new(transport);

        let report = runtime.mount(CODE).await.unwrap();
        assert_eq!(report.mount_id, 1);
        assert_eq!(report.mount_shape, MountShape::ExplicitRender);
        assert_eq!(report.frame_sandbox, "allow-scripts");
        assert_eq!(runtime.mounted_digest(), Some(CodeDigest::of(CODE)));

        let document = peer.next_document().await.unwrap();
        assert_eq!(document.nonce, report.nonce);
        assert!(document.html.contains(&report.nonce));
    }

    #[tokio::test]
    async fn unsafe_code_is_not_mounted() {
        let (transport, _peer) = ChannelTransport::pair();
        let runtime = SandboxRuntime::new(transport);

        let err = runtime.mount("eval('1'); ReactDOM.render(<App />, root);").await.unwrap_err();
        assert!(matches!(err, SandboxError::Unsafe(_)));
        assert!(runtime.mounted_digest().is_none());
    }

    #[tokio::test]
    async fn reused_nonce_is_rejected() {
        let (transport, _peer) = ChannelTransport::pair();
        let runtime = SandboxRuntime::new(transport);
        let policy = SecurityPolicyBuilder::new().issue();

        runtime.mount_with_policy(CODE, policy.clone()).await.unwrap();
        let other = "function App() { return <b/>; }";
        let err = runtime.mount_with_policy(other, policy).await.unwrap_err();
        assert!(matches!(err, SandboxError::NonceReuse { .. }));
    }

    #[tokio::test]
    async fn each_mount_gets_a_new_nonce() {
        let (transport, _peer) = ChannelTransport::pair();
        let runtime = SandboxRuntime::new(transport);

        let a = runtime.mount(CODE).await.unwrap();
        let b = runtime.mount(CODE).await.unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_eq!(b.mount_id, 2);
    }

    #[tokio::test]
    async fn filters_and_sanitizes_inbound_messages() {
        let (transport, mut peer) = ChannelTransport::pair();
        let runtime = SandboxRuntime::new(transport);
        runtime.mount(CODE).await.unwrap();
        peer.next_document().await.unwrap();

        peer.post_raw(json!({ "type": "bogus" })).unwrap();
        peer.post_raw(json!({ "type": "load", "js": "alert(1)" })).unwrap();
        peer.post_envelope(Envelope::new(1, "https://evil.example", json!({ "type": "ready" })))
            .unwrap();
        peer.post(&SandboxMessage::Ready).unwrap();
        peer.post(&SandboxMessage::Ready).unwrap();
        peer.post(&SandboxMessage::RuntimeError {
            message: "x is undefined at https://cdn.test/app.js:1:2".to_string(),
            stack: Some((0..8).map(|i| format!("at f{i} (/srv/app/src/main.js:{i}:1)")).collect::<Vec<_>>().join("\n")),
        })
        .unwrap();
        drop(peer);

        assert_eq!(runtime.next_event().await, Some(SandboxEvent::Ready));
        match runtime.next_event().await {
            Some(SandboxEvent::RuntimeError { message, stack }) => {
                assert_eq!(message, "x is undefined at <url>");
                let stack = stack.unwrap();
                assert_eq!(stack.lines().count(), 5);
                assert!(!stack.contains("/srv/"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(runtime.next_event().await, None);
    }

    #[tokio::test]
    async fn messages_from_previous_mount_are_dropped() {
        let (transport, mut peer) = ChannelTransport::pair();
        let runtime = SandboxRuntime::new(transport);

        runtime.mount(CODE).await.unwrap();
        peer.next_document().await.unwrap();
        runtime.mount(CODE).await.unwrap();

        // Still posting as mount 1
        peer.post(&SandboxMessage::Ready).unwrap();
        peer.next_document().await.unwrap();
        peer.post(&SandboxMessage::RuntimeLog { data: json!({ "n": 1 }) }).unwrap();
        drop(peer);

        assert_eq!(
            runtime.next_event().await,
            Some(SandboxEvent::RuntimeLog { data: json!({ "n": 1 }) })
        );
        assert_eq!(runtime.next_event().await, None);
    }

    #[tokio::test]
    async fn ready_posted_during_load_is_accepted_for_each_mount() {
        let runtime = Arc::new(SandboxRuntime::new(EagerFrame::new()));

        runtime.mount(CODE).await.unwrap();
        assert_eq!(runtime.next_event().await, Some(SandboxEvent::Ready));

        let listener = tokio::spawn({
            let runtime = runtime.clone();
            async move { runtime.next_event().await }
        });
        tokio::task::yield_now().await;

        let report = runtime.mount(CODE).await.unwrap();
        assert_eq!(report.mount_id, 2);
        assert_eq!(listener.await.unwrap(), Some(SandboxEvent::Ready));
    }

    #[test]
    fn nonce_history_is_bounded() {
        let mut history = NonceHistory::default();
        for i in 0..=NONCE_HISTORY {
            assert!(history.insert(&format!("nonce-{i}")));
        }
        assert_eq!(history.len(), NONCE_HISTORY);

        // Oldest entry was evicted, newest is still remembered
        assert!(!history.insert(&format!("nonce-{NONCE_HISTORY}")));
        assert!(history.insert("nonce-0"));
    }
}
