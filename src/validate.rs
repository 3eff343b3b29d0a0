use crate::extract::truncate;
use crate::heuristics::{
    VALID_DIAGRAM_TYPES, has_diagram_punctuation, has_valid_diagram_type, is_flowchart_family,
    leading_node_id, looks_like_prose, starts_with_anonymous_node,
};
use serde::{Deserialize, Serialize};

/// Outcome of one validator run. Only `errors` decide validity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    fn from_findings(errors: Vec<String>, warnings: Vec<String>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
            warnings,
        }
    }
}

pub fn validate_mermaid(source: &str) -> ValidationResult {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if source.trim().is_empty() {
        errors.push("Mermaid code is empty".to_string());
        return ValidationResult::from_findings(errors, warnings);
    }

    let lines: Vec<&str> = source
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    let first_line = lines[0];
    if !has_valid_diagram_type(first_line) {
        errors.push(format!(
            "Invalid diagram type. First line must start with one of: {}",
            VALID_DIAGRAM_TYPES.join(", ")
        ));
    }
    let flowchart = is_flowchart_family(first_line);

    for (idx, line) in lines.iter().enumerate().skip(1) {
        let line_no = idx + 1;

        if looks_like_prose(line) && !has_diagram_punctuation(line) {
            warnings.push(format!(
                "Line {line_no} looks like reasoning text, not diagram syntax: \"{}...\"",
                truncate(line, 50)
            ));
        }

        if !flowchart {
            continue;
        }

        if starts_with_anonymous_node(line) && !line.contains("-->") {
            errors.push(format!(
                "Line {line_no}: Invalid node syntax. Nodes must have an ID: \"NodeID[Label]\" not \"[Label]\""
            ));
        }

        if let Some(node_id) = leading_node_id(line)
            && node_id.contains(' ')
            && !node_id.contains('"')
        {
            warnings.push(format!(
                "Line {line_no}: Node ID contains spaces. Consider using underscores or quotes: \"{node_id}\""
            ));
        }
    }

    if lines.len() < 2 {
        warnings.push("Diagram only has diagram type, no content".to_string());
    }

    ValidationResult::from_findings(errors, warnings)
}
