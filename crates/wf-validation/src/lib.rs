//! Wireforge Validation
//!
//! Static checks applied to generated UI code before it may run.
//!
//! # Components
//!
//! - [`CodeSafetyValidator`]: deny-list scan plus mount-shape check
//! - [`InteractivityValidator`]: 0-100 heuristic score and 3-level taxonomy
//! - [`AutoRepairEngine`]: minimal structural patch for static code
//! - [`SyntaxChecker`]: TSX parse check (the "compile" step)
//!
//! # Example
//!
//! ```rust,ignore
//! use wf_validation::{CodeSafetyValidator, InteractivityValidator};
//!
//! let safety = CodeSafetyValidator::new().validate(code);
//! let assessment = InteractivityValidator::new().assess(code);
//! println!("{} / {}", safety.valid, assessment.summary());
//! ```

#![warn(unreachable_pub)]

pub mod error;
pub mod interactivity;
pub mod repair;
pub mod safety;
pub mod syntax;

pub use error::{CompileError, SafetyViolation};
pub use interactivity::{InteractivitySignals, InteractivityValidator};
pub use repair::{AutoRepairEngine, RepairAction, RepairOutcome, RepairSkip};
pub use safety::{CodeSafetyValidator, DenyCategory, DenyViolation, MountShape, SafetyReport, DENY_LIST};
pub use syntax::SyntaxChecker;

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;
    use wf_artifact::InteractivityLevel;

    fn fragment() -> impl Strategy<Value = &'static str> {
        prop::sample::select(vec![
            "const [count, setCount] = useState(0);",
            "useEffect(() => {}, [count]);",
            "const ref = useRef(null);",
            "<button onClick={inc}>+</button>",
            "<input value={name} onChange={update} />",
            "<form onSubmit={save}></form>",
            "<p>{count}</p>",
            "<div className=\"box\">static</div>",
        ])
    }

    const EXTRA_HANDLERS: [&str; 8] = [
        "<a onClick={f} />",
        "<a onChange={f} />",
        "<a onSubmit={f} />",
        "<a onInput={f} />",
        "<a onKeyDown={f} />",
        "<a onMouseEnter={f} />",
        "<a onFocus={f} />",
        "<a onBlur={f} />",
    ];

    proptest! {
        #[test]
        fn adding_a_handler_never_lowers_score(
            parts in prop::collection::vec(fragment(), 0..6),
            extra in prop::sample::select(EXTRA_HANDLERS.to_vec()),
        ) {
            let base = parts.join("\n");
            let extended = format!("{base}\n{extra}");
            let validator = InteractivityValidator::new();
            prop_assert!(validator.assess(&extended).score >= validator.assess(&base).score);
        }

        #[test]
        fn code_without_signals_is_static(words in prop::collection::vec("[a-z]{1,8}", 0..20)) {
            let code = format!("<div>{}</div>", words.join(" "));
            let a = InteractivityValidator::new().assess(&code);
            prop_assert_eq!(a.level, InteractivityLevel::Static);
            prop_assert!(a.score < 30);
        }

        #[test]
        fn non_noop_repair_raises_score(label in "[A-Za-z ]{1,16}") {
            let code = format!("function App() {{\n  return (\n    <main>\n      <h1>{label}</h1>\n    </main>\n  );\n}}");
            let validator = InteractivityValidator::new();
            let outcome = AutoRepairEngine::new().repair(&code);
            prop_assert!(outcome.applied());
            prop_assert!(validator.assess(&outcome.code).score > validator.assess(&code).score);
        }
    }
}
