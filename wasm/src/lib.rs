use mermaid_forge::{ValidationResult, attempt_auto_fix, extract_mermaid, validate_mermaid};
use serde::Serialize;
use wasm_bindgen::prelude::*;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Extraction {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    mermaid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn extraction(raw: &str) -> Extraction {
    match extract_mermaid(raw) {
        Ok(source) => Extraction {
            success: true,
            mermaid: Some(source.into_inner()),
            error: None,
        },
        Err(error) => Extraction {
            success: false,
            mermaid: None,
            error: Some(error.to_string()),
        },
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, JsValue> {
    serde_json::to_string(value).map_err(|error| JsValue::from_str(&error.to_string()))
}

/// Returns `{"success", "mermaid"?, "error"?}` as JSON.
#[wasm_bindgen]
pub fn extract_mermaid_code(raw: &str) -> Result<String, JsValue> {
    to_json(&extraction(raw))
}

/// Returns a `ValidationResult` as JSON.
#[wasm_bindgen]
pub fn validate_mermaid_syntax(code: &str) -> Result<String, JsValue> {
    let result: ValidationResult = validate_mermaid(code);
    to_json(&result)
}

#[wasm_bindgen]
pub fn repair_mermaid_syntax(code: &str) -> String {
    attempt_auto_fix(code)
}
