//! Security policy issuance
//!
//! Every mount gets its own [`SecurityPolicy`] with a fresh nonce. The
//! policy renders to a default-deny CSP directive string and the frame
//! `sandbox` attribute.

use serde::Serialize;

/// Pinned runtime scripts loaded ahead of the generated code
///
/// Served by the host itself, so `script-src` needs no origin beyond
/// `'self'`. A shared CDN origin would let any package on it run in the frame.
pub const PINNED_RUNTIME_SCRIPTS: &[&str] = &[
    "/runtime/react@18.2.0/react.production.min.js",
    "/runtime/react-dom@18.2.0/react-dom.production.min.js",
    "/runtime/babel-standalone@7.23.5/babel.min.js",
];

/// Frame sandbox tokens; no `allow-same-origin`, so the frame origin is opaque
const FRAME_SANDBOX: &str = "allow-scripts";

/// Capability policy for one mount
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecurityPolicy {
    /// Single-use 128-bit hex nonce
    pub nonce: String,
    /// Origins allowed in `script-src`
    pub allowed_script_origins: Vec<String>,
    /// Runtime script URLs; same-origin paths or within `allowed_script_origins`
    pub runtime_scripts: Vec<String>,
    /// `connect-src 'none'`
    pub deny_network: bool,
    /// Always set: the opaque frame origin has no storage
    pub deny_storage: bool,
    /// `form-action`/`base-uri` denied
    pub deny_navigation: bool,
    /// `worker-src`/`child-src` denied
    pub deny_workers: bool,
}

impl SecurityPolicy {
    /// Ordered CSP directives as `(name, value)` pairs
    #[must_use]
    pub fn directives(&self) -> Vec<(&'static str, String)> {
        let none_or_self = |deny: bool| if deny { "'none'" } else { "'self'" }.to_string();

        let mut script_src = vec!["'self'".to_string()];
        script_src.extend(self.allowed_script_origins.iter().cloned());
        script_src.push(format!("'nonce-{}'", self.nonce));

        vec![
            ("default-src", "'none'".to_string()),
            ("script-src", script_src.join(" ")),
            ("style-src", "'self' 'unsafe-inline'".to_string()),
            ("img-src", "'self' data:".to_string()),
            ("font-src", "'self'".to_string()),
            ("connect-src", none_or_self(self.deny_network)),
            ("frame-ancestors", "'none'".to_string()),
            ("form-action", none_or_self(self.deny_navigation)),
            ("base-uri", none_or_self(self.deny_navigation)),
            ("object-src", "'none'".to_string()),
            ("media-src", "'none'".to_string()),
            ("worker-src", none_or_self(self.deny_workers)),
            ("manifest-src", "'none'".to_string()),
            ("child-src", none_or_self(self.deny_workers)),
            ("frame-src", "'none'".to_string()),
        ]
    }

    /// CSP header/meta value
    #[must_use]
    pub fn csp(&self) -> String {
        self.directives()
            .into_iter()
            .map(|(name, value)| format!("{name} {value}"))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Value for the host frame `sandbox` attribute
    #[inline]
    #[must_use]
    pub fn frame_sandbox_attribute(&self) -> &'static str {
        FRAME_SANDBOX
    }
}

/// Issues [`SecurityPolicy`] instances
#[derive(Debug, Clone)]
pub struct SecurityPolicyBuilder {
    runtime_scripts: Vec<String>,
    deny_network: bool,
    deny_navigation: bool,
    deny_workers: bool,
}

impl SecurityPolicyBuilder {
    /// Create builder with pinned runtime scripts and every capability denied
    #[must_use]
    pub fn new() -> Self {
        Self {
            runtime_scripts: PINNED_RUNTIME_SCRIPTS.iter().map(|s| (*s).to_string()).collect(),
            deny_network: true,
            deny_navigation: true,
            deny_workers: true,
        }
    }

    /// Replace the runtime script list
    #[must_use]
    pub fn with_runtime_scripts<I, S>(mut self, scripts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.runtime_scripts = scripts.into_iter().map(Into::into).collect();
        self
    }

    /// Set network denial
    #[inline]
    #[must_use]
    pub fn with_network_denied(mut self, deny: bool) -> Self {
        self.deny_network = deny;
        self
    }

    /// Set navigation denial
    #[inline]
    #[must_use]
    pub fn with_navigation_denied(mut self, deny: bool) -> Self {
        self.deny_navigation = deny;
        self
    }

    /// Set worker denial
    #[inline]
    #[must_use]
    pub fn with_workers_denied(mut self, deny: bool) -> Self {
        self.deny_workers = deny;
        self
    }

    /// Issue a policy with a fresh nonce
    #[must_use]
    pub fn issue(&self) -> SecurityPolicy {
        let mut origins: Vec<String> = Vec::new();
        for origin in self.runtime_scripts.iter().filter_map(|url| script_origin(url)) {
            if !origins.contains(&origin) {
                origins.push(origin);
            }
        }

        SecurityPolicy {
            nonce: generate_nonce(),
            allowed_script_origins: origins,
            runtime_scripts: self.runtime_scripts.clone(),
            deny_network: self.deny_network,
            deny_storage: true,
            deny_navigation: self.deny_navigation,
            deny_workers: self.deny_workers,
        }
    }
}

impl Default for SecurityPolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// 128-bit random nonce, hex encoded
#[must_use]
pub fn generate_nonce() -> String {
    hex::encode(rand::random::<[u8; 16]>())
}

/// `scheme://host[:port]` of an absolute URL
fn script_origin(url: &str) -> Option<String> {
    let (scheme, rest) = url.split_once("://")?;
    let host = rest.split(['/', '?', '#']).next().filter(|h| !h.is_empty())?;
    Some(format!("{scheme}://{host}"))
}
