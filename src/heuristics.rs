//! Text-classification heuristics shared by the extractor and the validator.
//!
//! Every fixed word list lives here as data and every check is a named
//! predicate, so each one can be tuned and tested on its own.

use once_cell::sync::Lazy;
use regex::Regex;

/// Keywords that can start a diagram, in the order they are searched for.
pub const DIAGRAM_KEYWORDS: [&str; 6] = [
    "flowchart",
    "sequenceDiagram",
    "classDiagram",
    "stateDiagram",
    "erDiagram",
    "graph",
];

/// Declarations accepted on the first line of a diagram.
pub const VALID_DIAGRAM_TYPES: [&str; 9] = [
    "flowchart",
    "graph",
    "sequenceDiagram",
    "classDiagram",
    "stateDiagram",
    "erDiagram",
    "gantt",
    "pie",
    "gitGraph",
];

/// Chatty lead-ins models put in front of an answer.
pub const CONVERSATIONAL_OPENERS: [&str; 14] = [
    "okay",
    "ok",
    "here",
    "here's",
    "here is",
    "let me",
    "i'll",
    "i will",
    "sure",
    "alright",
    "yes",
    "of course",
    "certainly",
    "great",
];

/// Line prefixes (case-insensitive) that mark narration rather than diagram syntax.
pub const REASONING_OPENERS: [&str; 14] = [
    "Features are",
    "The user",
    "This diagram",
    "These should",
    "But maybe",
    "Then ",
    "Looking at",
    "First,",
    "The main",
    "The key",
    "I'll",
    "I will",
    "Note:",
    "Important:",
];

/// Edge operators that make a line diagram syntax on their own.
pub const EDGE_MARKERS: [&str; 5] = ["-->", "---", "==>", "-.->", "-.-"];

/// Characters and operators that never appear in plain prose lines.
pub const DIAGRAM_PUNCTUATION: [&str; 6] = ["[", "(", "{", "-->", "->", "=="];

static FLOWCHART_DECLARATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^flowchart\s+(TD|LR|TB|BT|RL)\b").unwrap());
static FLOWCHART_TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)flowchart\s+(TD|LR|TB|BT|RL)\b").unwrap());
static CODE_FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)```[ \t]*(?:mermaid|md|text)?[ \t]*\r?\n?").unwrap());
static OPENER_RE: Lazy<Regex> = Lazy::new(|| {
    let alternatives = CONVERSATIONAL_OPENERS
        .iter()
        .map(|opener| regex::escape(opener))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)^(?:{alternatives})[\s:,]+")).unwrap()
});
static REASONING_SENTENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z][a-z]+ [a-z]+ [a-z]+").unwrap());
static PROSE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z][a-z]+ [a-z]+").unwrap());
static NODE_DECLARATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]+[\[({>]").unwrap());
static DIRECTIVE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:subgraph|end|style|classDef|class|linkStyle|click|direction)(?:\s|;|$)")
        .unwrap()
});
static ANONYMOUS_NODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\[[^\]]+\]").unwrap());
static LEADING_NODE_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z0-9_ ]+)(?:\[|\(|\{)").unwrap());

/// Byte offset of the first diagram keyword found, trying keywords in
/// [`DIAGRAM_KEYWORDS`] order rather than by position.
pub fn find_diagram_keyword(text: &str) -> Option<usize> {
    let lower = text.to_ascii_lowercase();
    DIAGRAM_KEYWORDS
        .iter()
        .find_map(|keyword| lower.find(&keyword.to_ascii_lowercase()))
}

pub fn strip_code_fences(text: &str) -> String {
    CODE_FENCE_RE.replace_all(text, "").into_owned()
}

/// Removes a single conversational opener anchored at the start of `text`.
pub fn strip_conversational_opener(text: &str) -> &str {
    match OPENER_RE.find(text) {
        Some(found) => &text[found.end()..],
        None => text,
    }
}

/// True for a line that starts with `flowchart <TD|LR|TB|BT|RL>`.
pub fn is_flowchart_declaration(line: &str) -> bool {
    FLOWCHART_DECLARATION_RE.is_match(line.trim())
}

/// Finds a `flowchart <DIR>` token anywhere inside a line.
pub fn find_flowchart_declaration(line: &str) -> Option<&str> {
    FLOWCHART_TOKEN_RE.find(line).map(|found| found.as_str())
}

pub fn mentions_flowchart(line: &str) -> bool {
    line.to_ascii_lowercase().contains("flowchart")
}

/// Edges, node declarations, directives and `%%` comments.
pub fn is_diagram_syntax(line: &str) -> bool {
    EDGE_MARKERS.iter().any(|marker| line.contains(marker))
        || NODE_DECLARATION_RE.is_match(line)
        || DIRECTIVE_RE.is_match(line)
        || line.starts_with("%%")
}

/// Narration such as "Looking at the features..." or "Note: ...".
pub fn is_reasoning_text(line: &str) -> bool {
    REASONING_SENTENCE_RE.is_match(line)
        || REASONING_OPENERS.iter().any(|opener| starts_with_ignore_case(line, opener))
}

/// A capitalised word followed by a lowercase word.
pub fn looks_like_prose(line: &str) -> bool {
    PROSE_RE.is_match(line)
}

pub fn has_diagram_punctuation(line: &str) -> bool {
    DIAGRAM_PUNCTUATION.iter().any(|token| line.contains(token))
}

/// A line that opens with `[label]` instead of `id[label]`.
pub fn starts_with_anonymous_node(line: &str) -> bool {
    ANONYMOUS_NODE_RE.is_match(line)
}

/// Identifier-like text in front of the first `[`, `(` or `{`, trimmed.
pub fn leading_node_id(line: &str) -> Option<&str> {
    LEADING_NODE_ID_RE
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|id| id.as_str().trim())
}

pub fn has_valid_diagram_type(first_line: &str) -> bool {
    let lower = first_line.to_ascii_lowercase();
    VALID_DIAGRAM_TYPES
        .iter()
        .any(|kind| lower.starts_with(&kind.to_ascii_lowercase()))
}

pub fn is_flowchart_family(first_line: &str) -> bool {
    let lower = first_line.to_ascii_lowercase();
    lower.starts_with("flowchart") || lower.starts_with("graph")
}

fn starts_with_ignore_case(line: &str, prefix: &str) -> bool {
    line.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_priority_beats_position() {
        let text = "graph of things, then flowchart TD";
        assert_eq!(find_diagram_keyword(text), Some(22));
        assert_eq!(find_diagram_keyword("GRAPH LR"), Some(0));
        assert_eq!(find_diagram_keyword("no diagram here"), None);
    }

    #[test]
    fn strips_openers_once() {
        assert_eq!(strip_conversational_opener("Sure, flowchart TD"), "flowchart TD");
        assert_eq!(
            strip_conversational_opener("Here's the diagram"),
            "the diagram"
        );
        assert_eq!(strip_conversational_opener("OK: ok flowchart"), "ok flowchart");
        assert_eq!(strip_conversational_opener("Great, flowchart LR"), "flowchart LR");
        assert_eq!(strip_conversational_opener("flowchart TD"), "flowchart TD");
    }

    #[test]
    fn strips_fences() {
        let fenced = "```mermaid\nflowchart TD\n  a --> b\n```";
        assert_eq!(strip_code_fences(fenced), "flowchart TD\n  a --> b\n");
        assert_eq!(strip_code_fences("```\nflowchart LR\n```"), "flowchart LR\n");
    }

    #[test]
    fn declaration_patterns() {
        assert!(is_flowchart_declaration("flowchart TD"));
        assert!(is_flowchart_declaration("  Flowchart lr  "));
        assert!(!is_flowchart_declaration("flowchart"));
        assert!(!is_flowchart_declaration("flowchart TDX"));
        assert!(!is_flowchart_declaration("graph TD"));
        assert_eq!(
            find_flowchart_declaration("This is a flowchart LR for checkout"),
            Some("flowchart LR")
        );
        assert_eq!(find_flowchart_declaration("a flowchart for shops"), None);
    }

    #[test]
    fn classifies_syntax_lines() {
        assert!(is_diagram_syntax("a --> b"));
        assert!(is_diagram_syntax("a --- b"));
        assert!(is_diagram_syntax("a -.-> b"));
        assert!(is_diagram_syntax("start[User Opens App]"));
        assert!(is_diagram_syntax("decide{Paid?}"));
        assert!(is_diagram_syntax("subgraph Checkout"));
        assert!(is_diagram_syntax("end"));
        assert!(is_diagram_syntax("style a fill:#f9f"));
        assert!(is_diagram_syntax("classDef hot fill:#f00"));
        assert!(is_diagram_syntax("%% comment"));
        assert!(!is_diagram_syntax("Then the user pays"));
        assert!(!is_diagram_syntax("endless loop"));
    }

    #[test]
    fn classifies_reasoning_lines() {
        assert!(is_reasoning_text("Looking at the features, we need"));
        assert!(is_reasoning_text("note: ids are camelCase"));
        assert!(is_reasoning_text("Then checkout"));
        assert!(is_reasoning_text("First, the user logs in"));
        assert!(!is_reasoning_text("start --> browse"));
        assert!(!is_reasoning_text("Node1[Label] --> Node2[Other]"));
    }

    #[test]
    fn prose_and_punctuation() {
        assert!(looks_like_prose("The user then proceeds"));
        assert!(!looks_like_prose("userFlow --> done"));
        assert!(has_diagram_punctuation("The user --> done"));
        assert!(!has_diagram_punctuation("The user then proceeds"));
    }

    #[test]
    fn node_identifiers() {
        assert!(starts_with_anonymous_node("[Checkout]"));
        assert!(starts_with_anonymous_node("  [A] --> [B]"));
        assert!(!starts_with_anonymous_node("a[Checkout]"));
        assert_eq!(leading_node_id("user login[Login]"), Some("user login"));
        assert_eq!(leading_node_id("login(Login)"), Some("login"));
        assert_eq!(leading_node_id("a --> b"), None);
    }

    #[test]
    fn diagram_types() {
        assert!(has_valid_diagram_type("gitgraph"));
        assert!(has_valid_diagram_type("flowchart TD"));
        assert!(!has_valid_diagram_type("mindmap"));
        assert!(is_flowchart_family("GRAPH LR"));
        assert!(!is_flowchart_family("pie"));
    }
}
