//! Static code safety validation
//!
//! Two checks run before any generated code is allowed near the sandbox:
//!
//! 1. **Deny-list scan**: capability tokens (module loading, navigation,
//!    storage, network, dynamic evaluation, timers, DOM sinks, workers, file
//!    access, randomness, device access, notifications, messaging, script
//!    injection, console output).
//! 2. **Mount shape**: the code either mounts itself explicitly or follows an
//!    export convention the runtime can auto-mount.
//!
//! The validator rejects; it never rewrites code to make it pass.

use crate::error::SafetyViolation;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;

/// Capability class of a deny-list token
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DenyCategory {
    /// `import` / `require`
    ModuleLoading,
    /// location/history APIs
    Navigation,
    /// local/session/IndexedDB storage and cookies
    Storage,
    /// fetch/XHR/WebSocket/EventSource/beacon
    Network,
    /// eval and the Function constructor
    DynamicEvaluation,
    /// timers and frame callbacks
    Timers,
    /// innerHTML-family sinks and document.write
    DomInjection,
    /// Worker/ServiceWorker APIs
    Workers,
    /// File/Blob/FormData
    FileAccess,
    /// crypto and Math.random
    Randomness,
    /// geolocation/media/bluetooth/usb
    DeviceAccess,
    /// Notification API
    Notifications,
    /// postMessage/MessageChannel/BroadcastChannel
    Messaging,
    /// dynamic script-tag construction
    ScriptInjection,
    /// console output
    DiagnosticIo,
}

impl DenyCategory {
    /// Human-readable label used in error messages
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::ModuleLoading => "module loading",
            Self::Navigation => "navigation",
            Self::Storage => "persistent storage",
            Self::Network => "network I/O",
            Self::DynamicEvaluation => "dynamic evaluation",
            Self::Timers => "timer",
            Self::DomInjection => "DOM injection",
            Self::Workers => "worker/threading",
            Self::FileAccess => "file/blob",
            Self::Randomness => "crypto/random",
            Self::DeviceAccess => "device access",
            Self::Notifications => "notification",
            Self::Messaging => "cross-context messaging",
            Self::ScriptInjection => "dynamic script",
            Self::DiagnosticIo => "diagnostic I/O",
        }
    }
}

/// The deny-list, verbatim
///
/// Every token here must be rejected on its own; the list is a
/// compatibility surface shared with the sandbox runtime.
pub const DENY_LIST: &[(&str, DenyCategory)] = &[
    ("import ", DenyCategory::ModuleLoading),
    ("import(", DenyCategory::ModuleLoading),
    ("require(", DenyCategory::ModuleLoading),
    ("window.location", DenyCategory::Navigation),
    ("document.location", DenyCategory::Navigation),
    ("location.href", DenyCategory::Navigation),
    ("location.assign(", DenyCategory::Navigation),
    ("location.replace(", DenyCategory::Navigation),
    ("location.reload(", DenyCategory::Navigation),
    ("history.pushState(", DenyCategory::Navigation),
    ("history.replaceState(", DenyCategory::Navigation),
    ("history.back(", DenyCategory::Navigation),
    ("history.forward(", DenyCategory::Navigation),
    ("history.go(", DenyCategory::Navigation),
    ("window.open(", DenyCategory::Navigation),
    ("localStorage", DenyCategory::Storage),
    ("sessionStorage", DenyCategory::Storage),
    ("indexedDB", DenyCategory::Storage),
    ("document.cookie", DenyCategory::Storage),
    ("fetch(", DenyCategory::Network),
    ("XMLHttpRequest", DenyCategory::Network),
    ("WebSocket", DenyCategory::Network),
    ("EventSource", DenyCategory::Network),
    ("sendBeacon", DenyCategory::Network),
    ("eval(", DenyCategory::DynamicEvaluation),
    ("new Function", DenyCategory::DynamicEvaluation),
    ("Function(", DenyCategory::DynamicEvaluation),
    ("setTimeout(", DenyCategory::Timers),
    ("setInterval(", DenyCategory::Timers),
    ("setImmediate(", DenyCategory::Timers),
    ("requestAnimationFrame(", DenyCategory::Timers),
    ("requestIdleCallback(", DenyCategory::Timers),
    ("innerHTML", DenyCategory::DomInjection),
    ("outerHTML", DenyCategory::DomInjection),
    ("insertAdjacentHTML", DenyCategory::DomInjection),
    ("dangerouslySetInnerHTML", DenyCategory::DomInjection),
    ("document.write", DenyCategory::DomInjection),
    ("Worker(", DenyCategory::Workers),
    ("SharedWorker", DenyCategory::Workers),
    ("serviceWorker", DenyCategory::Workers),
    ("ServiceWorker", DenyCategory::Workers),
    ("Worklet", DenyCategory::Workers),
    ("FileReader", DenyCategory::FileAccess),
    ("new File(", DenyCategory::FileAccess),
    ("Blob(", DenyCategory::FileAccess),
    ("FormData", DenyCategory::FileAccess),
    ("URL.createObjectURL", DenyCategory::FileAccess),
    ("crypto.", DenyCategory::Randomness),
    ("Math.random", DenyCategory::Randomness),
    ("geolocation", DenyCategory::DeviceAccess),
    ("getUserMedia", DenyCategory::DeviceAccess),
    ("mediaDevices", DenyCategory::DeviceAccess),
    ("bluetooth", DenyCategory::DeviceAccess),
    ("navigator.usb", DenyCategory::DeviceAccess),
    ("Notification", DenyCategory::Notifications),
    ("postMessage", DenyCategory::Messaging),
    ("MessageChannel", DenyCategory::Messaging),
    ("BroadcastChannel", DenyCategory::Messaging),
    ("createElement('script')", DenyCategory::ScriptInjection),
    ("createElement(\"script\")", DenyCategory::ScriptInjection),
    ("console.", DenyCategory::DiagnosticIo),
];

/// One compiled deny-list entry
#[derive(Debug)]
struct DenyRule {
    token: &'static str,
    category: DenyCategory,
    pattern: Regex,
}

impl DenyRule {
    fn compile(token: &'static str, category: DenyCategory) -> Self {
        Self {
            token,
            category,
            pattern: Regex::new(&token_pattern(token)).expect("deny-list token regex"),
        }
    }
}

/// Build the matcher for a token
///
/// Identifier-like tokens anchor on a word boundary so `chatHistory.go(`
/// does not trip `history.go(`; call tokens allow whitespace before `(`.
fn token_pattern(token: &str) -> String {
    let mut pattern = String::new();
    if token.starts_with(|c: char| c.is_ascii_alphanumeric() || c == '_') {
        pattern.push_str(r"\b");
    }

    let (body, call) = match token.strip_suffix('(') {
        Some(body) => (body, true),
        None => (token, false),
    };
    let (body, keyword) = match body.strip_suffix(' ') {
        Some(body) => (body, true),
        None => (body, false),
    };

    pattern.push_str(&regex::escape(body));
    if call {
        pattern.push_str(r"\s*\(");
    }
    if keyword {
        pattern.push_str(r"\s");
    }
    pattern
}

static DENY_RULES: Lazy<Vec<DenyRule>> = Lazy::new(|| {
    DENY_LIST
        .iter()
        .map(|(token, category)| DenyRule::compile(token, *category))
        .collect()
});

static EXPLICIT_MOUNT: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\bReactDOM\s*\.\s*render\s*\(",
        r"\bReactDOM\s*\.\s*createRoot\s*\(",
        r"\bcreateRoot\s*\([^)]*\)\s*\.\s*render\s*\(",
        r"\.\s*render\s*\(\s*<",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("mount regex"))
    .collect()
});

static DEFAULT_EXPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bexport\s+default\s+(?:(?:function|class)\s+)?([A-Za-z_$][\w$]*)").expect("export regex")
});

static GLOBAL_BINDING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)(?:\b(?:window|globalThis)\s*\.\s*(App)\s*=|^\s*function\s+(App)\s*\(|^\s*(?:const|let|var)\s+(App)\s*=)",
    )
    .expect("global binding regex")
});

/// How the runtime will get the component on screen
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "kebab-case")]
pub enum MountShape {
    /// Code calls a render/mount API itself
    ExplicitRender,
    /// `export default <name>`
    DefaultExport(String),
    /// Well-known global binding (`App`)
    GlobalBinding(String),
}

impl MountShape {
    /// Whether the runtime must auto-mount this code
    #[inline]
    #[must_use]
    pub fn needs_auto_mount(&self) -> bool {
        !matches!(self, Self::ExplicitRender)
    }
}

/// Deny-list hits grouped by category
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DenyViolation {
    /// Capability class
    pub category: DenyCategory,
    /// Exact offending tokens, in deny-list order
    pub tokens: Vec<&'static str>,
}

/// Outcome of [`CodeSafetyValidator::validate`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SafetyReport {
    /// All checks passed
    pub valid: bool,
    /// Human-readable errors, one per failed check
    pub errors: Vec<String>,
    /// Deny-list hits
    pub violations: Vec<DenyViolation>,
    /// Recognized mount shape, if any
    pub mount: Option<MountShape>,
}

impl SafetyReport {
    /// Convert into a result carrying the mount shape
    ///
    /// # Errors
    /// Returns [`SafetyViolation`] when any check failed
    pub fn into_result(self) -> Result<MountShape, SafetyViolation> {
        match (self.valid, self.mount) {
            (true, Some(mount)) => Ok(mount),
            _ => Err(SafetyViolation {
                errors: self.errors,
                tokens: self
                    .violations
                    .iter()
                    .flat_map(|v| v.tokens.iter().map(|t| (*t).to_string()))
                    .collect(),
            }),
        }
    }
}

/// Static deny-list and mount-shape validator
#[derive(Debug, Clone, Copy, Default)]
pub struct CodeSafetyValidator;

impl CodeSafetyValidator {
    /// Create new validator instance
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Validate a candidate code string
    #[must_use]
    pub fn validate(&self, code: &str) -> SafetyReport {
        let mut errors = Vec::new();

        if code.trim().is_empty() {
            return SafetyReport {
                valid: false,
                errors: vec!["Generated code is empty".to_string()],
                violations: Vec::new(),
                mount: None,
            };
        }

        let violations = Self::scan_deny_list(code);
        for violation in &violations {
            errors.push(format!(
                "Forbidden {} tokens detected: {}",
                violation.category.label(),
                violation.tokens.join(", ")
            ));
        }

        let mount = Self::detect_mount_shape(code);
        if mount.is_none() {
            errors.push(
                "No mount found: call ReactDOM.render / createRoot(...).render, \
                 use `export default <Component>`, or define a global `App` component"
                    .to_string(),
            );
        }

        if !errors.is_empty() {
            tracing::debug!(errors = errors.len(), "Code rejected by safety validator");
        }

        SafetyReport {
            valid: errors.is_empty(),
            errors,
            violations,
            mount,
        }
    }

    /// Scan for deny-list tokens, grouped by category
    #[must_use]
    pub fn scan_deny_list(code: &str) -> Vec<DenyViolation> {
        let mut grouped: BTreeMap<DenyCategory, Vec<&'static str>> = BTreeMap::new();
        for rule in DENY_RULES.iter() {
            if rule.pattern.is_match(code) {
                grouped.entry(rule.category).or_default().push(rule.token);
            }
        }

        grouped
            .into_iter()
            .map(|(category, tokens)| DenyViolation { category, tokens })
            .collect()
    }

    /// Detect how the code gets mounted
    #[must_use]
    pub fn detect_mount_shape(code: &str) -> Option<MountShape> {
        if EXPLICIT_MOUNT.iter().any(|re| re.is_match(code)) {
            return Some(MountShape::ExplicitRender);
        }

        if let Some(caps) = DEFAULT_EXPORT.captures(code) {
            return Some(MountShape::DefaultExport(caps[1].to_string()));
        }

        GLOBAL_BINDING.captures(code).and_then(|caps| {
            (1..=3)
                .find_map(|i| caps.get(i))
                .map(|m| MountShape::GlobalBinding(m.as_str().to_string()))
        })
    }
}
