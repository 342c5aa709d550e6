//! Interactivity scoring
//!
//! A textual heuristic, not a semantic analysis: each signal is a pattern
//! match over the raw source. The weights and thresholds are fixed because
//! downstream behavior (retry, repair, caching) is keyed on them.

use once_cell::sync::Lazy;
use regex::Regex;
use wf_artifact::{InteractivityAssessment, InteractivityLevel};

/// Points for a state hook
pub const STATE_HOOK_WEIGHT: u32 = 35;
/// Points for an effect hook
pub const EFFECT_HOOK_WEIGHT: u32 = 15;
/// Points for memo/callback/ref/context hooks
pub const OTHER_HOOK_WEIGHT: u32 = 15;
/// Points per distinct event handler pattern
pub const HANDLER_WEIGHT: u32 = 12;
/// Cap on total handler points
pub const HANDLER_CAP: u32 = 35;
/// Points for a controlled input
pub const CONTROLLED_INPUT_WEIGHT: u32 = 25;
/// Points for state interpolated into output
pub const DYNAMIC_CONTENT_WEIGHT: u32 = 10;
/// Minimum score for `Interactive`
pub const INTERACTIVE_THRESHOLD: u8 = 70;
/// Minimum score for `Partial`
pub const PARTIAL_THRESHOLD: u8 = 30;

/// The eight recognized event handler props
pub const HANDLER_PROPS: [&str; 8] = [
    "onClick",
    "onChange",
    "onSubmit",
    "onInput",
    "onKeyDown",
    "onMouseEnter",
    "onFocus",
    "onBlur",
];

static STATE_HOOK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\buse(?:State|Reducer)\s*\(").expect("state hook regex"));

static EFFECT_HOOK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\buse(?:Layout)?Effect\s*\(").expect("effect hook regex"));

static OTHER_HOOK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\buse(?:Memo|Callback|Ref|Context)\s*\(").expect("other hook regex")
});

static HANDLERS: Lazy<Vec<Regex>> = Lazy::new(|| {
    HANDLER_PROPS
        .iter()
        .map(|prop| Regex::new(&format!(r"\b{prop}\s*=\s*\{{")).expect("handler regex"))
        .collect()
});

static VALUE_BINDING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:value|checked)\s*=\s*\{").expect("value binding regex"));

static CHANGE_HANDLER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bonChange\s*=\s*\{").expect("change handler regex"));

static STATE_DECLARATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\[\s*([A-Za-z_$][\w$]*)\s*,\s*[A-Za-z_$][\w$]*\s*\]\s*=\s*(?:React\s*\.\s*)?use(?:State|Reducer)\s*\(",
    )
    .expect("state declaration regex")
});

/// Raw boolean signals extracted from one code string
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InteractivitySignals {
    /// `useState` / `useReducer`
    pub state_hook: bool,
    /// `useEffect` / `useLayoutEffect`
    pub effect_hook: bool,
    /// `useMemo` / `useCallback` / `useRef` / `useContext`
    pub other_hooks: bool,
    /// Handler props found, in [`HANDLER_PROPS`] order
    pub handlers: Vec<&'static str>,
    /// Value binding co-occurring with a change handler
    pub controlled_input: bool,
    /// A state variable interpolated into output
    pub dynamic_content: bool,
}

impl InteractivitySignals {
    /// Extract signals from code
    #[must_use]
    pub fn detect(code: &str) -> Self {
        let state_hook = STATE_HOOK.is_match(code);
        let handlers = HANDLER_PROPS
            .iter()
            .zip(HANDLERS.iter())
            .filter(|(_, re)| re.is_match(code))
            .map(|(prop, _)| *prop)
            .collect();

        Self {
            state_hook,
            effect_hook: EFFECT_HOOK.is_match(code),
            other_hooks: OTHER_HOOK.is_match(code),
            handlers,
            controlled_input: VALUE_BINDING.is_match(code) && CHANGE_HANDLER.is_match(code),
            dynamic_content: state_hook && renders_state(code),
        }
    }

    /// Any hook present
    #[inline]
    #[must_use]
    pub fn has_hooks(&self) -> bool {
        self.state_hook || self.effect_hook || self.other_hooks
    }

    /// Weighted score, clamped to 100
    #[must_use]
    pub fn score(&self) -> u8 {
        let mut score = 0;
        if self.state_hook {
            score += STATE_HOOK_WEIGHT;
        }
        if self.effect_hook {
            score += EFFECT_HOOK_WEIGHT;
        }
        if self.other_hooks {
            score += OTHER_HOOK_WEIGHT;
        }
        let handler_count = u32::try_from(self.handlers.len()).unwrap_or(u32::MAX);
        score += handler_count.saturating_mul(HANDLER_WEIGHT).min(HANDLER_CAP);
        if self.controlled_input {
            score += CONTROLLED_INPUT_WEIGHT;
        }
        if self.dynamic_content {
            score += DYNAMIC_CONTENT_WEIGHT;
        }
        u8::try_from(score.min(100)).unwrap_or(100)
    }
}

/// Whether any declared state variable shows up as `{name` or `${name`
fn renders_state(code: &str) -> bool {
    STATE_DECLARATION.captures_iter(code).any(|caps| {
        let name = regex::escape(&caps[1]);
        Regex::new(&format!(r"(?:\$\{{|\{{)\s*{name}\b"))
            .map(|re| re.is_match(code))
            .unwrap_or(false)
    })
}

/// Heuristic interactivity validator
#[derive(Debug, Clone, Copy, Default)]
pub struct InteractivityValidator;

impl InteractivityValidator {
    /// Create new validator instance
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Score and classify a candidate code string
    #[must_use]
    pub fn assess(&self, code: &str) -> InteractivityAssessment {
        let signals = InteractivitySignals::detect(code);
        let score = signals.score();
        let has_hooks = signals.has_hooks();
        let has_event_handlers = !signals.handlers.is_empty();

        let level = if score >= INTERACTIVE_THRESHOLD && has_hooks && has_event_handlers {
            InteractivityLevel::Interactive
        } else if score >= PARTIAL_THRESHOLD && (has_hooks || has_event_handlers) {
            InteractivityLevel::Partial
        } else {
            InteractivityLevel::Static
        };

        let mut missing_patterns = Vec::new();
        let mut suggestions = Vec::new();
        let mut missing = |pattern: &str, suggestion: &str| {
            missing_patterns.push(pattern.to_string());
            suggestions.push(suggestion.to_string());
        };

        if !signals.state_hook {
            missing(
                "useState hook",
                "Add state management with useState to track values that change on interaction",
            );
        }
        if !signals.effect_hook {
            missing(
                "useEffect hook",
                "Add a useEffect hook to react to state changes (derived values, focus, validation)",
            );
        }
        if !signals.other_hooks {
            missing(
                "useMemo/useCallback/useRef hooks",
                "Use useMemo, useCallback or useRef for derived values, stable handlers or element references",
            );
        }
        if !has_event_handlers {
            missing(
                "event handlers (onClick, onChange, onSubmit)",
                "Attach event handlers such as onClick to buttons and onSubmit to forms",
            );
        }
        if !signals.controlled_input {
            missing(
                "controlled inputs (value + onChange)",
                "Bind inputs with value={state} and onChange={(e) => setState(e.target.value)}",
            );
        }
        if !signals.dynamic_content {
            missing(
                "dynamic content rendering state",
                "Render state variables in the output, e.g. <p>Count: {count}</p>",
            );
        }

        tracing::trace!(score, level = %level, handlers = signals.handlers.len(), "Assessed interactivity");

        InteractivityAssessment {
            level,
            score,
            has_hooks,
            has_event_handlers,
            has_controlled_inputs: signals.controlled_input,
            missing_patterns,
            suggestions,
        }
    }
}
