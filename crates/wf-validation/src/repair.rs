//! Best-effort auto-repair of static code
//!
//! Applied after retries are exhausted. The patch is deliberately minimal:
//! two state bindings, the first unwired button, the first unbound input,
//! and a status line that renders both values.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;

static STATE_HOOK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\buse(?:State|Reducer)\s*\(").expect("state hook regex"));

static COMPONENT_OPENING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:\bfunction\s+([A-Z][\w$]*)\s*\([^)]*\)\s*\{|\b(?:const|let|var)\s+([A-Z][\w$]*)\s*=\s*(?:\([^)]*\)|[A-Za-z_$][\w$]*)\s*=>\s*\{)",
    )
    .expect("component regex")
});

static RETURN_STATEMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\breturn\b").expect("return regex"));

static RETURNED_ROOT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\breturn\s*\(?\s*<").expect("root element regex"));

static BUTTON_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<button\b").expect("button regex"));

static INPUT_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<(input|textarea)\b").expect("input regex"));

const STATE_BINDINGS: &str = "\n  const [autoCount, setAutoCount] = React.useState(0);\n  const [autoText, setAutoText] = React.useState('');";
const BUTTON_HANDLER: &str = " onClick={() => setAutoCount(autoCount + 1)}";
const INPUT_BINDING: &str = " value={autoText} onChange={(e) => setAutoText(e.target.value)}";
const STATUS_ELEMENT: &str =
    "\n      <div data-auto-repair=\"status\">Clicks: {autoCount} | Input: {autoText}</div>";

/// A single patch applied by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RepairAction {
    /// Counter and text state injected into the component
    InjectedState,
    /// First button wired to increment the counter
    WiredButton,
    /// First input bound to the text state
    WiredInput,
    /// Status element prepended to the returned root
    PrependedStatus,
}

impl fmt::Display for RepairAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InjectedState => "injected counter and text state",
            Self::WiredButton => "wired first button to the counter",
            Self::WiredInput => "bound first input to the text state",
            Self::PrependedStatus => "prepended a status display",
        })
    }
}

/// Why the engine left the code untouched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RepairSkip {
    /// Code already declares state
    AlreadyStateful,
    /// No capitalized component function found
    NoComponent,
    /// Component has no return statement
    NoReturn,
}

impl fmt::Display for RepairSkip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AlreadyStateful => "code already declares state",
            Self::NoComponent => "no component function found",
            Self::NoReturn => "component has no return statement",
        })
    }
}

/// Result of a repair attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepairOutcome {
    /// Possibly patched code
    pub code: String,
    /// Patches applied, empty when skipped
    pub actions: Vec<RepairAction>,
    /// Reason for a no-op
    pub skipped: Option<RepairSkip>,
}

impl RepairOutcome {
    fn skipped(code: &str, reason: RepairSkip) -> Self {
        Self {
            code: code.to_string(),
            actions: Vec::new(),
            skipped: Some(reason),
        }
    }

    /// Whether any patch was applied
    #[inline]
    #[must_use]
    pub fn applied(&self) -> bool {
        !self.actions.is_empty()
    }
}

/// Structural patcher for code that failed interactivity validation
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoRepairEngine;

impl AutoRepairEngine {
    /// Create new engine instance
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Attempt a minimal repair
    #[must_use]
    pub fn repair(&self, code: &str) -> RepairOutcome {
        if STATE_HOOK.is_match(code) {
            return RepairOutcome::skipped(code, RepairSkip::AlreadyStateful);
        }

        let Some(opening) = COMPONENT_OPENING.find(code) else {
            return RepairOutcome::skipped(code, RepairSkip::NoComponent);
        };
        let body_start = opening.end();

        if !RETURN_STATEMENT.is_match(&code[body_start..]) {
            return RepairOutcome::skipped(code, RepairSkip::NoReturn);
        }

        let mut patched = String::with_capacity(code.len() + 256);
        patched.push_str(&code[..body_start]);
        patched.push_str(STATE_BINDINGS);
        patched.push_str(&code[body_start..]);
        let mut actions = vec![RepairAction::InjectedState];
        let body_start = body_start + STATE_BINDINGS.len();

        let root_end = RETURNED_ROOT
            .find(&patched[body_start..])
            .and_then(|root| opening_tag_end(&patched, body_start + root.end() - 1));
        if let Some(end) = root_end {
            if !patched[..end].ends_with("/>") {
                patched.insert_str(end, STATUS_ELEMENT);
                actions.push(RepairAction::PrependedStatus);
            }
        }

        let button_at = BUTTON_TAG
            .find_iter(&patched)
            .find(|tag| opening_tag(&patched, tag.start()).is_some_and(|t| !t.contains("onClick")))
            .map(|tag| tag.end());
        if let Some(at) = button_at {
            patched.insert_str(at, BUTTON_HANDLER);
            actions.push(RepairAction::WiredButton);
        }

        let input_at = INPUT_TAG
            .find_iter(&patched)
            .find(|tag| {
                opening_tag(&patched, tag.start())
                    .is_some_and(|t| !t.contains("value=") && !t.contains("onChange="))
            })
            .map(|tag| tag.end());
        if let Some(at) = input_at {
            patched.insert_str(at, INPUT_BINDING);
            actions.push(RepairAction::WiredInput);
        }

        tracing::debug!(actions = actions.len(), "Auto-repair applied");

        RepairOutcome {
            code: patched,
            actions,
            skipped: None,
        }
    }
}

/// Byte offset just past the `>` closing the JSX tag that opens at `start`
///
/// `>` inside `{...}` expressions and quoted attribute values does not count.
fn opening_tag_end(code: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in code[start..].char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' | '`' => quote = Some(c),
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            '>' if depth == 0 => return Some(start + i + 1),
            _ => {}
        }
    }
    None
}

/// Full text of the opening tag at `start`
fn opening_tag(code: &str, start: usize) -> Option<&str> {
    opening_tag_end(code, start).map(|end| &code[start..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interactivity::InteractivityValidator;
    use crate::syntax::SyntaxChecker;
    use wf_artifact::InteractivityLevel;

    const FORM: &str = r#"function App() {
  return (
    <div className="card">
      <input placeholder="Email" />
      <button>Subscribe</button>
    </div>
  );
}
ReactDOM.render(<App />, document.getElementById('root'));"#;

    #[test]
    fn repairs_form_to_interactive() {
        let outcome = AutoRepairEngine::new().repair(FORM);
        assert!(outcome.applied());
        assert_eq!(
            outcome.actions,
            vec![
                RepairAction::InjectedState,
                RepairAction::PrependedStatus,
                RepairAction::WiredButton,
                RepairAction::WiredInput,
            ]
        );
        assert!(outcome.code.contains("<button onClick={() => setAutoCount(autoCount + 1)}>"));
        assert!(outcome.code.contains("<input value={autoText} onChange="));

        let assessment = InteractivityValidator::new().assess(&outcome.code);
        assert_eq!(assessment.level, InteractivityLevel::Interactive);
    }

    #[test]
    fn status_is_first_child_of_root() {
        let outcome = AutoRepairEngine::new().repair(FORM);
        let root = outcome.code.find("<div className=\"card\">").unwrap();
        let status = outcome.code.find("data-auto-repair").unwrap();
        let input = outcome.code.find("<input").unwrap();
        assert!(root < status && status < input);
    }

    #[test]
    fn only_first_button_is_wired() {
        let code = "function App() {\n  return (<div><button>A</button><button>B</button></div>);\n}";
        let outcome = AutoRepairEngine::new().repair(code);
        assert_eq!(outcome.code.matches("onClick").count(), 1);
        assert!(outcome.code.contains("<button onClick={() => setAutoCount(autoCount + 1)}>A"));
    }

    #[test]
    fn already_wired_button_is_skipped() {
        let code = "function App() {\n  return (<div><button onClick={go}>A</button><button>B</button></div>);\n}";
        let outcome = AutoRepairEngine::new().repair(code);
        assert!(outcome.code.contains("<button onClick={() => setAutoCount(autoCount + 1)}>B"));
    }

    #[test]
    fn arrow_component_is_recognized() {
        let code = "const Card = () => {\n  return <section><p>Hi</p></section>;\n};";
        let outcome = AutoRepairEngine::new().repair(code);
        assert!(outcome.applied());
        assert!(outcome.actions.contains(&RepairAction::PrependedStatus));
    }

    #[test]
    fn self_closing_root_gets_state_only() {
        let code = "function App() {\n  return <img alt=\"logo\" />;\n}";
        let outcome = AutoRepairEngine::new().repair(code);
        assert_eq!(outcome.actions, vec![RepairAction::InjectedState]);
    }

    #[test]
    fn stateful_code_is_untouched() {
        let code = "function App() {\n  const [a, setA] = useState(0);\n  return <div/>;\n}";
        let outcome = AutoRepairEngine::new().repair(code);
        assert_eq!(outcome.code, code);
        assert_eq!(outcome.skipped, Some(RepairSkip::AlreadyStateful));
    }

    #[test]
    fn missing_component_is_untouched() {
        let outcome = AutoRepairEngine::new().repair("<div>Hello</div>");
        assert_eq!(outcome.skipped, Some(RepairSkip::NoComponent));
    }

    #[test]
    fn missing_return_is_untouched() {
        let outcome = AutoRepairEngine::new().repair("function App() {\n  render();\n}");
        assert_eq!(outcome.skipped, Some(RepairSkip::NoReturn));
        assert!(!outcome.applied());
    }

    #[test]
    fn root_with_arrow_attribute_stays_parseable() {
        let code = "function App() {\n  return (\n    <div onClick={() => alert('hi')}>\n      <h1>Hi</h1>\n    </div>\n  );\n}";
        let outcome = AutoRepairEngine::new().repair(code);

        assert!(outcome.actions.contains(&RepairAction::PrependedStatus));
        assert!(outcome
            .code
            .contains("<div onClick={() => alert('hi')}>\n      <div data-auto-repair=\"status\">"));
        assert!(SyntaxChecker::new().check(&outcome.code).is_ok());
    }

    #[test]
    fn arrow_handler_counts_as_wired() {
        let code = "function App() {\n  return (<div><button className=\"a\" onClick={() => go(1 > 0)}>A</button><button>B</button></div>);\n}";
        let outcome = AutoRepairEngine::new().repair(code);
        assert!(outcome.code.contains("<button onClick={() => setAutoCount(autoCount + 1)}>B"));
        assert!(SyntaxChecker::new().check(&outcome.code).is_ok());
    }

    #[test]
    fn tag_end_skips_expressions_and_strings() {
        let code = r#"<div title="a > b" onClick={() => f('}')}>x"#;
        assert_eq!(opening_tag_end(code, 0), Some(code.len() - 1));
    }
}
