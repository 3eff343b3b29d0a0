use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static ANONYMOUS_EDGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?P<lead>^|[^A-Za-z0-9_])\[(?P<left>[^\]]+)\]\s*-->\s*\[(?P<right>[^\]]+)\]")
        .unwrap()
});

/// Gives generated identifiers to anonymous nodes on both ends of an edge,
/// turning `[Cart] --> [Pay]` into `Node1[Cart] --> Node2[Pay]`.
///
/// Identifiers are numbered from 1 for every call and never reused within the
/// returned document. Every other line is passed through untouched. The result
/// still has to go through the validator.
pub fn attempt_auto_fix(source: &str) -> String {
    let mut next_id = 1usize;
    let mut fixed = Vec::new();

    for line in source.split('\n') {
        if line.trim().is_empty() || !is_edge_with_brackets(line) {
            fixed.push(line.to_string());
            continue;
        }
        let rewritten = ANONYMOUS_EDGE_RE.replace_all(line, |caps: &Captures| {
            let left_id = next_id;
            let right_id = next_id + 1;
            next_id += 2;
            format!(
                "{}Node{left_id}[{}] --> Node{right_id}[{}]",
                &caps["lead"], &caps["left"], &caps["right"]
            )
        });
        fixed.push(rewritten.into_owned());
    }

    fixed.join("\n")
}

fn is_edge_with_brackets(line: &str) -> bool {
    line.contains('[') && line.contains(']') && line.contains("-->")
}
