//! Cleanup for text coming back from the language models.

use crate::utils::error::{GreenwardError, Result};
use regex::Regex;
use serde::de::DeserializeOwned;
use std::sync::LazyLock;

static NUMBERED_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[-•]\s*)?(\d+)[.)]\s*(.+)$").expect("valid pattern"));
static BULLET_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-•]\s*(.+)$").expect("valid pattern"));
static CITATION_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:\s*\[\d+\])+").expect("valid pattern"));
static SPACE_BEFORE_PUNCT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+([,.;:)])").expect("valid pattern"));
static MULTI_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s{2,}").expect("valid pattern"));
// Everything Python's str.splitlines treats as a line boundary.
const LINE_BREAKS: [char; 10] = [
    '\n', '\r', '\u{0b}', '\u{0c}', '\u{1c}', '\u{1d}', '\u{1e}', '\u{85}', '\u{2028}', '\u{2029}',
];

static BOLD_NAME_WITH_LATIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\d+[.)]\s*)?\*\*([^*()]+?)\s*\(([^)]+)\)\*\*(.*)$").expect("valid pattern")
});

const INVALID_JSON_SNIPPET_CHARS: usize = 200;

/// Parses a JSON answer that may be wrapped in a markdown code fence.
pub fn clean_json_response<T: DeserializeOwned>(text: &str) -> Result<T> {
    let mut cleaned = text.trim();
    if cleaned.is_empty() {
        return Err(GreenwardError::invalid_ai_response(
            "Gemini returned an empty response.",
        ));
    }

    if let Some(rest) = cleaned.strip_prefix("```") {
        cleaned = rest;
    }
    cleaned = cleaned.trim().trim_matches('`');

    // ```json fences leave the language tag behind
    if let Some(tag) = cleaned.get(..4) {
        if tag.eq_ignore_ascii_case("json") {
            let rest = &cleaned[4..];
            if rest.is_empty() || rest.starts_with(['\n', '\r', ' ']) {
                cleaned = rest.trim_start();
            }
        }
    }

    serde_json::from_str(cleaned).map_err(|_| {
        let snippet: String = cleaned.chars().take(INVALID_JSON_SNIPPET_CHARS).collect();
        GreenwardError::invalid_ai_response(format!("Gemini returned invalid JSON: {}", snippet))
    })
}

/// Extracts the items of a numbered or bulleted list.
///
/// Lines that are neither are dropped. When nothing looks like a list item the
/// whole (trimmed) content is returned as a single item so callers always have
/// something to show.
pub fn parse_numbered_list(content: &str) -> Vec<String> {
    let suggestions: Vec<String> = content
        .split(LINE_BREAKS)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            if let Some(caps) = NUMBERED_ITEM.captures(line) {
                return Some(caps[2].trim().to_string());
            }
            BULLET_ITEM
                .captures(line)
                .map(|caps| caps[1].trim().to_string())
        })
        .collect();

    if suggestions.is_empty() {
        vec![content.trim().to_string()]
    } else {
        suggestions
    }
}

/// Removes reference markers such as `[1]` or `[2][3]`.
pub fn strip_reference_citations(text: &str) -> String {
    let cleaned = CITATION_RUN.replace_all(text, "");
    let cleaned = SPACE_BEFORE_PUNCT.replace_all(&cleaned, "$1");
    let cleaned = MULTI_SPACE.replace_all(&cleaned, " ");
    cleaned.trim().to_string()
}

/// Makes only the common tree name bold.
///
/// `**Jamun (Syzygium cumini)** — rationale` becomes
/// `**Jamun** (Syzygium cumini) — rationale`. Anything else is returned trimmed.
pub fn normalize_tree_bold_markdown(text: &str) -> String {
    let line = text.trim();
    match BOLD_NAME_WITH_LATIN.captures(line) {
        Some(caps) => {
            let name = caps[1].trim();
            let latin = caps[2].trim();
            let tail = &caps[3];
            format!("**{}** ({}){}", name, latin, tail)
        }
        None => line.to_string(),
    }
}

/// The markdown shown for one raw tree suggestion.
pub fn display_tree_suggestion(raw: &str) -> String {
    normalize_tree_bold_markdown(&strip_reference_citations(raw))
}
