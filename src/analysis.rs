//! Sketch analysis returned by the vision model, and the material the diagram
//! prompt is built from.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

const PROMPT_MATERIAL_CHARS: usize = 1000;

static JSON_OBJECT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisResult {
    pub components: Vec<String>,
    pub user_flow: String,
    pub features: Vec<String>,
    pub product_type: String,
    pub target_audience: String,
    pub technical_notes: Vec<String>,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_analysis: Option<String>,
}

impl AnalysisResult {
    pub fn prompt_material(&self) -> String {
        if let Some(raw) = self.raw_analysis.as_deref().filter(|raw| !raw.trim().is_empty()) {
            return truncate_material(raw);
        }
        format!(
            "Product: {}\nFeatures: {}\nComponents: {}",
            or_na(&self.product_type),
            or_na(&self.features.join(", ")),
            or_na(&self.components.join(", ")),
        )
    }
}

/// Structured model output, or the raw text when it could not be parsed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ModelOutput<T> {
    Parsed(T),
    Fallback { raw: String },
}

impl<T> ModelOutput<T> {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }

    pub fn parsed(&self) -> Option<&T> {
        match self {
            Self::Parsed(value) => Some(value),
            Self::Fallback { .. } => None,
        }
    }
}

impl ModelOutput<AnalysisResult> {
    pub fn prompt_material(&self) -> String {
        match self {
            Self::Parsed(analysis) => analysis.prompt_material(),
            Self::Fallback { raw } => truncate_material(raw),
        }
    }
}

/// Parses the outermost `{...}` span of a response as an [`AnalysisResult`].
/// The full response is kept as `raw_analysis` for prompt building.
pub fn parse_analysis(raw: &str) -> ModelOutput<AnalysisResult> {
    let Some(found) = JSON_OBJECT_RE.find(raw) else {
        return ModelOutput::Fallback {
            raw: raw.to_string(),
        };
    };
    match serde_json::from_str::<AnalysisResult>(found.as_str()) {
        Ok(mut analysis) => {
            analysis.raw_analysis = Some(raw.to_string());
            ModelOutput::Parsed(analysis)
        }
        Err(err) => {
            tracing::debug!(error = %err, "analysis response is not valid JSON");
            ModelOutput::Fallback {
                raw: raw.to_string(),
            }
        }
    }
}

fn truncate_material(raw: &str) -> String {
    match raw.char_indices().nth(PROMPT_MATERIAL_CHARS) {
        Some((end, _)) => format!("{}...", &raw[..end]),
        None => raw.to_string(),
    }
}

fn or_na(value: &str) -> &str {
    if value.trim().is_empty() { "N/A" } else { value }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_json_wrapped_in_prose() {
        let raw = "Here is the analysis:\n{\"productType\": \"marketplace\", \"features\": [\"search\", \"cart\"]}\nThanks!";
        let output = parse_analysis(raw);
        let analysis = output.parsed().unwrap();
        assert_eq!(analysis.product_type, "marketplace");
        assert_eq!(analysis.features, vec!["search", "cart"]);
        assert_eq!(analysis.raw_analysis.as_deref(), Some(raw));
        assert_eq!(output.prompt_material(), raw);
    }

    #[test]
    fn plain_text_falls_back() {
        let output = parse_analysis("A whiteboard with a login box and a cart.");
        assert!(output.is_fallback());
        assert_eq!(
            output.prompt_material(),
            "A whiteboard with a login box and a cart."
        );
    }

    #[test]
    fn broken_json_falls_back() {
        let output = parse_analysis("{\"features\": [\"search\",}");
        assert!(output.is_fallback());
    }

    #[test]
    fn summary_without_raw_text() {
        let analysis = AnalysisResult {
            product_type: "marketplace".to_string(),
            components: vec!["web app".to_string()],
            ..AnalysisResult::default()
        };
        assert_eq!(
            analysis.prompt_material(),
            "Product: marketplace\nFeatures: N/A\nComponents: web app"
        );
    }

    #[test]
    fn long_material_is_truncated() {
        let raw = "x".repeat(1500);
        let output: ModelOutput<AnalysisResult> = ModelOutput::Fallback { raw };
        let material = output.prompt_material();
        assert_eq!(material.len(), 1003);
        assert!(material.ends_with("..."));
    }
}
