//! Sandbox document builder
//!
//! Produces the full HTML document loaded into the isolated frame:
//! - CSP meta tag from the mount's [`SecurityPolicy`]
//! - pinned runtime script tags
//! - a nonce-scoped bootstrap installing error, rejection, CSP-violation and
//!   `load` listeners that scrub what they post
//! - a nonce-scoped script holding the escaped generated code, followed by the
//!   auto-mount fallback and the single `ready` post
//!
//! The nonce authorizes exactly one code payload. A document rendered with
//! embedded code refuses every `load` message; a shell document from
//! [`DocumentBuilder::render_shell`] accepts the first well-formed `load` and
//! refuses the rest.

use crate::policy::SecurityPolicy;
use once_cell::sync::Lazy;
use regex::Regex;
use wf_artifact::CodeDigest;
use wf_validation::MountShape;

static SCRIPT_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)</script").expect("script close regex"));

static DEFAULT_EXPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bexport\s+default\s+(?:(function|class)\s+)?([A-Za-z_$][\w$]*)").expect("default export regex")
});

/// Global the default export is rebound to
const DEFAULT_BINDING: &str = "window.__wfDefault";

const BOOTSTRAP: &str = r#"(function () {
  var HOST_ORIGIN = __HOST_ORIGIN__;
  var NONCE = __NONCE__;
  var loadOpen = __LOAD_OPEN__;
  var readySent = false;
  function scrub(text) {
    return String(text == null ? '' : text)
      .replace(/\b(?:https?|file|blob|data|webpack):[^\s'"()<>]+/g, '<url>')
      .replace(/(?:[A-Za-z]:\\|\/)(?:[\w.@-]+[\\\/])+[\w.@-]*(?::\d+){0,2}/g, '<path>');
  }
  function trimStack(stack) {
    if (!stack) return undefined;
    return String(stack).split('\n').filter(function (l) { return l.trim(); }).slice(0, 5).map(scrub).join('\n');
  }
  function post(message) { window.parent.postMessage(message, HOST_ORIGIN); }
  window.__wfReady = function () {
    if (readySent) return;
    readySent = true;
    post({ type: 'ready' });
  };
  window.__wfReportError = function (message, stack) {
    post({ type: 'runtime-error', message: scrub(message), stack: trimStack(stack) });
  };
  window.addEventListener('error', function (event) {
    window.__wfReportError(event.message, event.error && event.error.stack);
  });
  window.addEventListener('unhandledrejection', function (event) {
    var reason = event.reason || {};
    window.__wfReportError(reason.message || String(event.reason), reason.stack);
  });
  document.addEventListener('securitypolicyviolation', function (event) {
    post({
      type: 'security-violation',
      directive: event.violatedDirective,
      blocked_uri: event.blockedURI ? scrub(event.blockedURI) : undefined
    });
  });
  window.addEventListener('message', function (event) {
    if (event.source !== window.parent || event.origin !== HOST_ORIGIN) return;
    var data = event.data;
    if (!data || typeof data !== 'object' || Array.isArray(data)) return;
    var keys = Object.keys(data);
    if (keys.length !== 2 || data.type !== 'load' || typeof data.js !== 'string') return;
    if (!loadOpen) return;
    loadOpen = false;
    var js = window.Babel ? window.Babel.transform(data.js, { presets: ['react'] }).code : data.js;
    var script = document.createElement('script');
    script.nonce = NONCE;
    script.textContent = js + '\n;window.__wfReady();';
    document.body.appendChild(script);
  });
})();"#;

const AUTO_MOUNT: &str = r#";(function () {
  var root = document.getElementById('root');
  try {
    var Component = __COMPONENT__;
    if (Component && root && !root.hasChildNodes()) {
      if (ReactDOM.createRoot) {
        ReactDOM.createRoot(root).render(React.createElement(Component));
      } else {
        ReactDOM.render(React.createElement(Component), root);
      }
    }
  } catch (err) {
    window.__wfReportError(err && err.message, err && err.stack);
  }
  window.__wfReady();
})();"#;

const READY_ONLY: &str = "\n;window.__wfReady();";

/// Built document plus the identity of the code inside it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxDocument {
    /// Mount this document belongs to
    pub mount_id: u64,
    /// Nonce authorizing the inline scripts
    pub nonce: String,
    /// Digest of the generated code
    pub digest: CodeDigest,
    /// Full HTML source
    pub html: String,
}

/// Renders sandbox documents for a fixed host origin
#[derive(Debug, Clone)]
pub struct DocumentBuilder {
    host_origin: String,
}

impl DocumentBuilder {
    /// Create builder; `host_origin` is the only origin `load` is accepted from
    #[must_use]
    pub fn new(host_origin: impl Into<String>) -> Self {
        Self {
            host_origin: host_origin.into(),
        }
    }

    /// Host origin posted to and accepted from
    #[inline]
    #[must_use]
    pub fn host_origin(&self) -> &str {
        &self.host_origin
    }

    /// Render the HTML document for `code`
    #[must_use]
    pub fn render(&self, code: &str, mount: &MountShape, policy: &SecurityPolicy) -> String {
        let mut body = escape_script(&rewrite_default_export(code));
        body.push('\n');
        match mount {
            MountShape::ExplicitRender => body.push_str(READY_ONLY),
            MountShape::DefaultExport(_) => body.push_str(&AUTO_MOUNT.replace("__COMPONENT__", DEFAULT_BINDING)),
            MountShape::GlobalBinding(name) => {
                let component = format!("(typeof {name} !== 'undefined' ? {name} : undefined)");
                body.push_str(&AUTO_MOUNT.replace("__COMPONENT__", &component));
            }
        }

        let code_tag = format!(
            "  <script nonce=\"{nonce}\" type=\"text/babel\" data-presets=\"react\">\n{body}\n  </script>\n",
            nonce = escape_attr(&policy.nonce),
        );
        self.page(policy, false, &code_tag)
    }

    /// Render a document without code that accepts a single `load` from the host
    #[must_use]
    pub fn render_shell(&self, policy: &SecurityPolicy) -> String {
        self.page(policy, true, "")
    }

    fn page(&self, policy: &SecurityPolicy, load_open: bool, code_tag: &str) -> String {
        let nonce = escape_attr(&policy.nonce);

        let bootstrap = BOOTSTRAP
            .replace("__HOST_ORIGIN__", &js_string(&self.host_origin))
            .replace("__NONCE__", &js_string(&policy.nonce))
            .replace("__LOAD_OPEN__", if load_open { "true" } else { "false" });

        let runtime_tags: String = policy
            .runtime_scripts
            .iter()
            .map(|src| format!("  <script src=\"{}\"></script>\n", escape_attr(src)))
            .collect();

        format!(
            "<!DOCTYPE html>\n<html>\n<head>\n  <meta charset=\"utf-8\">\n  \
             <meta http-equiv=\"Content-Security-Policy\" content=\"{csp}\">\n\
             {runtime_tags}  <script nonce=\"{nonce}\">\n{bootstrap}\n  </script>\n</head>\n<body>\n  \
             <div id=\"root\"></div>\n{code_tag}</body>\n</html>\n",
            csp = escape_attr(&policy.csp()),
        )
    }

    /// Render and wrap into a [`SandboxDocument`]
    #[must_use]
    pub fn build(&self, mount_id: u64, code: &str, mount: &MountShape, policy: &SecurityPolicy) -> SandboxDocument {
        SandboxDocument {
            mount_id,
            nonce: policy.nonce.clone(),
            digest: CodeDigest::of(code),
            html: self.render(code, mount, policy),
        }
    }
}

/// Rewrite `export default X` into a global binding
///
/// `export default function App() {}` keeps the declaration and binds it
/// afterwards; `export default App;` becomes an assignment.
#[must_use]
pub fn rewrite_default_export(code: &str) -> String {
    let Some(caps) = DEFAULT_EXPORT.captures(code) else {
        return code.to_string();
    };
    let (Some(whole), Some(name)) = (caps.get(0), caps.get(2)) else {
        return code.to_string();
    };
    let name = name.as_str();

    let mut out = String::with_capacity(code.len() + 32);
    out.push_str(&code[..whole.start()]);
    match caps.get(1) {
        Some(keyword) => {
            out.push_str(&code[keyword.start()..]);
            out.push_str(&format!("\n{DEFAULT_BINDING} = {name};"));
        }
        None => {
            out.push_str(&format!("{DEFAULT_BINDING} = {name}"));
            out.push_str(&code[whole.end()..]);
        }
    }
    out
}

/// Neutralize sequences that would end the inline script early
#[must_use]
pub fn escape_script(code: &str) -> String {
    SCRIPT_CLOSE.replace_all(code, "<\\/script").replace("<!--", "<\\!--")
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn js_string(value: &str) -> String {
    let quoted = serde_json::Value::String(value.to_string()).to_string();
    escape_script(&quoted)
}
