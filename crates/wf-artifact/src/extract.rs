//! Code extraction from raw model output
//!
//! Models frequently wrap code in markdown fences and add prose around it.
//! Only the code is handed to the validators.

const FENCE: &str = "```";

/// Extract the code payload from model output
///
/// Returns the body of the first fenced block when one exists (a trailing
/// unterminated fence is tolerated, which happens mid-stream), otherwise the
/// trimmed input.
#[must_use]
pub fn extract_code(output: &str) -> String {
    let Some(start) = output.find(FENCE) else {
        return output.trim().to_string();
    };

    let after_fence = &output[start + FENCE.len()..];
    // Skip the info string (`jsx`, `tsx`, ...) on the opening line
    let body = match after_fence.find('\n') {
        Some(nl) => &after_fence[nl + 1..],
        None => return String::new(),
    };

    let code = match body.find(FENCE) {
        Some(end) => &body[..end],
        None => body,
    };

    code.trim().to_string()
}
