//! Isolates a flowchart from raw model output.
//!
//! Extraction runs in stages: locate the start of the diagram (after the
//! delimiter when the model emitted one, otherwise after stripping fences and
//! chatty openers), anchor on a canonical `flowchart <DIR>` line, drop the
//! narration interleaved with the diagram, and finally check that the filter
//! left the declaration in place.

use crate::heuristics::{
    find_diagram_keyword, find_flowchart_declaration, is_diagram_syntax,
    is_flowchart_declaration, is_reasoning_text, mentions_flowchart, strip_code_fences,
    strip_conversational_opener,
};
use crate::ir::DiagramSource;
use thiserror::Error;
use tracing::debug;

/// Marker the prompt asks the model to print right before the diagram.
pub const MERMAID_DELIMITER: &str = "===MERMAID_CODE===";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("No diagram keyword found {}", keyword_scope(.after_delimiter))]
    NoDiagramKeyword { after_delimiter: bool },
    #[error("No line starts with a valid flowchart declaration (flowchart TD|LR|TB|BT|RL)")]
    InvalidFlowchartStart,
    #[error("Extracted code does not start with valid flowchart syntax")]
    ExtractionFailed,
}

fn keyword_scope(after_delimiter: &bool) -> &'static str {
    if *after_delimiter {
        "after delimiter"
    } else {
        "in response"
    }
}

pub fn extract_mermaid(raw: &str) -> Result<DiagramSource, ExtractError> {
    let candidate = locate_diagram_start(raw)?;
    let anchored = anchor_on_declaration(candidate.trim())?;
    let filtered = filter_noise(&anchored);

    match filtered.lines().next() {
        Some(first) if is_flowchart_declaration(first) => Ok(DiagramSource::new(filtered)),
        _ => Err(ExtractError::ExtractionFailed),
    }
}

fn locate_diagram_start(raw: &str) -> Result<String, ExtractError> {
    if let Some(index) = raw.find(MERMAID_DELIMITER) {
        let after = raw[index + MERMAID_DELIMITER.len()..].trim();
        return match find_diagram_keyword(after) {
            Some(start) => Ok(after[start..].to_string()),
            None => Err(ExtractError::NoDiagramKeyword {
                after_delimiter: true,
            }),
        };
    }

    let unfenced = strip_code_fences(raw.trim());
    let text = strip_conversational_opener(&unfenced);
    match find_diagram_keyword(text) {
        Some(start) => Ok(text[start..].to_string()),
        None => Err(ExtractError::NoDiagramKeyword {
            after_delimiter: false,
        }),
    }
}

/// Drops everything in front of the first `flowchart <DIR>` line. When no line
/// starts with one, a line that embeds it in prose is cut down to the bare
/// declaration instead.
fn anchor_on_declaration(candidate: &str) -> Result<String, ExtractError> {
    let lines: Vec<&str> = candidate.lines().collect();

    if let Some(start) = lines.iter().position(|line| is_flowchart_declaration(line)) {
        return Ok(lines[start..].join("\n").trim().to_string());
    }

    for (idx, line) in lines.iter().enumerate() {
        let line = line.trim();
        if !mentions_flowchart(line) {
            continue;
        }
        if let Some(declaration) = find_flowchart_declaration(line) {
            let mut rest = vec![declaration];
            rest.extend_from_slice(&lines[idx + 1..]);
            return Ok(rest.join("\n").trim().to_string());
        }
    }

    Err(ExtractError::InvalidFlowchartStart)
}

fn filter_noise(source: &str) -> String {
    let mut kept: Vec<&str> = Vec::new();

    for (idx, raw_line) in source.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() {
            kept.push("");
            continue;
        }
        if idx == 0 && is_flowchart_declaration(line) {
            kept.push(line);
            continue;
        }
        if is_reasoning_text(line) {
            debug!(line = %truncate(line, 50), "filtered out reasoning text");
            continue;
        }
        if is_diagram_syntax(line) {
            kept.push(raw_line.trim_end());
        }
    }

    kept.join("\n").trim().to_string()
}

pub(crate) fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}
