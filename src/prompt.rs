use crate::extract::MERMAID_DELIMITER;

/// Builds the strict-format flowchart prompt around the product material.
///
/// A previous diagram, when given, is passed along verbatim so the model can
/// expand it instead of starting over.
pub fn base_prompt(material: &str, previous_diagram: Option<&str>) -> String {
    let previous = match previous_diagram {
        Some(diagram) if !diagram.trim().is_empty() => {
            format!("\n\nPrevious diagram to expand:\n{diagram}\n")
        }
        _ => String::new(),
    };

    format!(
        r#"You are a Mermaid flowchart code generator. Generate ONLY valid Mermaid flowchart syntax.

PRODUCT INFO:
{material}{previous}

STRICT OUTPUT FORMAT:
1. First, write "{MERMAID_DELIMITER}" on its own line
2. On the VERY NEXT LINE, write exactly "flowchart TD" or "flowchart LR"
3. Then write the flowchart nodes and connections
4. Use ONLY valid Mermaid syntax - NO explanatory text, NO comments, NO reasoning

SYNTAX RULES:
- Every node needs an ID: nodeId[Label Text]
- Connect nodes with: nodeId1 --> nodeId2
- Node IDs must be camelCase with no spaces
- Labels go inside brackets: [Label Here]

CORRECT EXAMPLE:
{MERMAID_DELIMITER}
flowchart TD
    start[User Opens App]
    browse[Browse Products]
    checkout[Checkout]
    start --> browse
    browse --> checkout

WRONG - DO NOT DO THIS:
{MERMAID_DELIMITER}
flowchart TD
Looking at the features, we need...
[Browse] --> [Checkout]

Generate the flowchart now. Output MUST start with {MERMAID_DELIMITER} followed by flowchart TD on the next line:"#
    )
}

/// Appends the previous attempt's errors to the base prompt.
pub fn retry_prompt(base: &str, feedback: &[String]) -> String {
    if feedback.is_empty() {
        return base.to_string();
    }
    format!(
        "{base}\n\nPREVIOUS ERRORS TO FIX:\n{}\n\nFix these and try again.",
        feedback.join("\n")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn includes_material_and_previous_diagram() {
        let prompt = base_prompt("Product: Shop", Some("flowchart TD\n  a --> b"));
        assert!(prompt.contains("PRODUCT INFO:\nProduct: Shop"));
        assert!(prompt.contains("Previous diagram to expand:\nflowchart TD\n  a --> b\n"));
        assert!(prompt.contains("===MERMAID_CODE==="));
    }

    #[test]
    fn omits_blank_previous_diagram() {
        let prompt = base_prompt("Product: Shop", Some("  "));
        assert!(!prompt.contains("Previous diagram"));
    }

    #[test]
    fn retry_prompt_lists_errors() {
        let feedback = vec!["Line 2: bad".to_string(), "Line 4: worse".to_string()];
        let prompt = retry_prompt("BASE", &feedback);
        assert_eq!(
            prompt,
            "BASE\n\nPREVIOUS ERRORS TO FIX:\nLine 2: bad\nLine 4: worse\n\nFix these and try again."
        );
        assert_eq!(retry_prompt("BASE", &[]), "BASE");
    }
}
