//! Host-side scrubbing of sandbox error text
//!
//! The document already scrubs before posting; this pass runs again on the
//! host because the sandbox is untrusted.

use once_cell::sync::Lazy;
use regex::Regex;

/// Stack frames kept after truncation
pub const MAX_STACK_LINES: usize = 5;

/// Maximum characters kept from an error message
const MAX_MESSAGE_LEN: usize = 500;

static URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\b(?:https?|file|blob|data|webpack):[^\s'"()<>]+"#).expect("url regex")
});

static PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:[A-Za-z]:\\|/)(?:[\w.@-]+[\\/])+[\w.@-]*(?::\d+){0,2}"#).expect("path regex")
});

/// Replace URLs and file paths with placeholders
#[must_use]
pub fn sanitize_text(text: &str) -> String {
    let without_urls = URL.replace_all(text, "<url>");
    PATH.replace_all(&without_urls, "<path>").into_owned()
}

/// Sanitize and bound an error message
#[must_use]
pub fn sanitize_message(message: &str) -> String {
    let clean = sanitize_text(message.trim());
    if clean.chars().count() <= MAX_MESSAGE_LEN {
        return clean;
    }
    clean.chars().take(MAX_MESSAGE_LEN).collect()
}

/// Sanitize a stack trace and keep its first [`MAX_STACK_LINES`] lines
#[must_use]
pub fn sanitize_stack(stack: &str) -> String {
    stack
        .lines()
        .filter(|line| !line.trim().is_empty())
        .take(MAX_STACK_LINES)
        .map(sanitize_text)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_replaced() {
        let text = "Failed at https://cdn.example.com/app.js:10:4";
        assert_eq!(sanitize_text(text), "Failed at <url>");
    }

    #[test]
    fn unix_and_windows_paths_are_replaced() {
        assert_eq!(
            sanitize_text("at render (/home/alice/project/src/App.jsx:12:5)"),
            "at render (<path>)"
        );
        assert_eq!(
            sanitize_text(r"see C:\Users\alice\app\main.js"),
            "see <path>"
        );
    }

    #[test]
    fn plain_messages_are_untouched() {
        assert_eq!(sanitize_text("count is not defined"), "count is not defined");
    }

    #[test]
    fn stack_is_truncated_to_five_lines() {
        let stack = (0..9)
            .map(|i| format!("at f{i} (https://x.test/a.js:{i}:1)"))
            .collect::<Vec<_>>()
            .join("\n");
        let clean = sanitize_stack(&stack);

        assert_eq!(clean.lines().count(), MAX_STACK_LINES);
        assert!(!clean.contains("x.test"));
        assert!(clean.starts_with("at f0 (<url>)"));
    }

    #[test]
    fn long_messages_are_bounded() {
        let message = "x".repeat(2_000);
        assert_eq!(sanitize_message(&message).len(), 500);
    }
}
