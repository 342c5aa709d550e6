//! Prompt synthesis
//!
//! The system instruction is fixed; follow-up prompts name exactly the
//! patterns the previous candidate was missing.

use crate::model::ChatMessage;
use wf_artifact::InteractivityAssessment;

/// Fixed system instruction sent with every generation
pub const SYSTEM_INSTRUCTION: &str = "You generate a single self-contained React component in JSX.\n\
Requirements:\n\
- Manage state with hooks (React.useState or React.useReducer).\n\
- Attach event handlers such as onClick, onChange and onSubmit to interactive elements.\n\
- Make every input a controlled input (value={...} together with onChange={...}).\n\
- Render state values in the output so interactions are visible.\n\
- Finish with an explicit mount call: ReactDOM.render(<App />, document.getElementById('root'));\n\
Restrictions: no imports or require, no network, storage, timers, eval, console or innerHTML.\n\
Reply with one ```jsx fenced code block and nothing else.";

const FORM_KEYWORDS: [&str; 5] = ["form", "input", "field", "textbox", "text box"];

/// Whether the prompt asks for forms or inputs
#[must_use]
pub fn mentions_form_input(prompt: &str) -> bool {
    let lowered = prompt.to_lowercase();
    FORM_KEYWORDS.iter().any(|k| lowered.contains(k))
}

/// System + user messages for a model prompt
#[must_use]
pub fn build_messages(prompt: &str) -> Vec<ChatMessage> {
    vec![ChatMessage::system(SYSTEM_INSTRUCTION), ChatMessage::user(prompt)]
}

/// Follow-up prompt demanding the missing patterns
#[must_use]
pub fn enhancement_prompt(original: &str, assessment: &InteractivityAssessment) -> String {
    let mut prompt = format!(
        "{original}\n\nThe previous component was not interactive enough (score {}/100). \
         Regenerate it and include:",
        assessment.score
    );

    for (pattern, suggestion) in assessment.missing_patterns.iter().zip(&assessment.suggestions) {
        prompt.push_str(&format!("\n- {pattern}: {suggestion}"));
    }
    if assessment.missing_patterns.is_empty() {
        prompt.push_str("\n- more state, event handlers and controlled inputs");
    }

    if mentions_form_input(original) {
        prompt.push_str(
            "\n- every input bound with value={state} and onChange={(e) => setState(e.target.value)}\
             \n- a form onSubmit handler that calls e.preventDefault() and updates state",
        );
    }
    prompt
}
