//! Retry loop around generation, extraction and validation.
//!
//! Every attempt is a [`GenerationAttempt`] that is built fresh from the base
//! prompt and the previous attempt's error snapshot, evaluated by [`step`], and
//! then discarded. [`step`] returns the [`Transition`] out of `Attempting(i)`:
//! another attempt, success, or terminal failure.

use crate::config::PipelineConfig;
use crate::extract::{ExtractError, extract_mermaid, truncate};
use crate::generator::{GenerateOptions, GeneratorError, TextGenerator};
use crate::ir::{DiagramKind, DiagramSource, Direction};
use crate::prompt::{base_prompt, retry_prompt};
use crate::repair::attempt_auto_fix;
use crate::validate::{ValidationResult, validate_mermaid};
use serde::Serialize;
use serde::ser::{SerializeStruct, Serializer};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationAttempt {
    pub index: usize,
    pub prompt: String,
    /// `None` when the generator call itself failed.
    pub raw_response: Option<String>,
    pub extraction_error: Option<String>,
    pub validation: Option<ValidationResult>,
}

impl GenerationAttempt {
    pub fn new(index: usize, prompt: String) -> Self {
        Self {
            index,
            prompt,
            raw_response: None,
            extraction_error: None,
            validation: None,
        }
    }
}

/// Most recent candidate that got past extraction but failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedCandidate {
    pub source: String,
    pub errors: Vec<String>,
}

#[derive(Debug)]
pub enum Transition {
    /// Move on to the next attempt, feeding these errors back to the model.
    /// `rejected` is set when this attempt produced a candidate that failed
    /// validation.
    Retry {
        feedback: Vec<String>,
        rejected: Option<RejectedCandidate>,
    },
    Succeeded {
        source: DiagramSource,
        warnings: Vec<String>,
        repaired: bool,
    },
    Failed(DiagramError),
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedDiagram {
    #[serde(rename = "mermaid")]
    pub source: DiagramSource,
    #[serde(rename = "type")]
    pub kind: DiagramKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    pub warnings: Vec<String>,
    pub attempts: usize,
    pub repaired: bool,
}

#[derive(Debug, Error)]
pub enum DiagramError {
    #[error("Failed to extract valid Mermaid code after {attempts} attempts: {source}")]
    Extraction {
        attempts: usize,
        #[source]
        source: ExtractError,
        last_rejected: Option<RejectedCandidate>,
    },
    #[error("{source}")]
    Provider {
        #[source]
        source: GeneratorError,
        last_rejected: Option<RejectedCandidate>,
    },
    #[error("Generated diagram failed validation after {attempts} attempts: {}", .errors.join("; "))]
    Exhausted {
        attempts: usize,
        errors: Vec<String>,
        partial_source: String,
    },
    #[error("Generated diagram failed validation")]
    FinalValidation {
        errors: Vec<String>,
        diagram: String,
    },
}

impl DiagramError {
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Errors of the last candidate that failed validation, if any.
    pub fn validation_errors(&self) -> Option<&[String]> {
        match self {
            Self::Exhausted { errors, .. } | Self::FinalValidation { errors, .. } => Some(errors),
            Self::Extraction { last_rejected, .. } | Self::Provider { last_rejected, .. } => {
                last_rejected.as_ref().map(|rejected| rejected.errors.as_slice())
            }
        }
    }

    /// Best candidate seen before giving up, if one got past extraction.
    pub fn partial_source(&self) -> Option<&str> {
        match self {
            Self::Exhausted { partial_source, .. } => Some(partial_source),
            Self::FinalValidation { diagram, .. } => Some(diagram),
            Self::Extraction { last_rejected, .. } | Self::Provider { last_rejected, .. } => {
                last_rejected.as_ref().map(|rejected| rejected.source.as_str())
            }
        }
    }
}

impl Serialize for DiagramError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("DiagramError", 3)?;
        state.serialize_field("message", &self.message())?;
        match self.validation_errors() {
            Some(errors) => state.serialize_field("validationErrors", errors)?,
            None => state.skip_field("validationErrors")?,
        }
        match self.partial_source() {
            Some(source) => state.serialize_field("partialSource", source)?,
            None => state.skip_field("partialSource")?,
        }
        state.end()
    }
}

/// Evaluates one attempt's generator response.
///
/// Records what happened on `attempt` and decides where the state machine goes
/// next. On the last attempt a failed validation gets one auto-fix pass before
/// the pipeline gives up. `last_rejected` is the newest candidate from earlier
/// attempts that failed validation; terminal extraction and provider failures
/// carry it.
pub fn step(
    attempt: &mut GenerationAttempt,
    response: Result<String, GeneratorError>,
    max_attempts: usize,
    last_rejected: Option<&RejectedCandidate>,
) -> Transition {
    let is_last = attempt.index + 1 >= max_attempts;

    let raw = match response {
        Ok(raw) => raw,
        Err(err) => {
            warn!(attempt = attempt.index + 1, error = %err, "generator call failed");
            attempt.extraction_error = Some(err.to_string());
            if is_last {
                return Transition::Failed(DiagramError::Provider {
                    source: err,
                    last_rejected: last_rejected.cloned(),
                });
            }
            return Transition::Retry {
                feedback: vec![err.to_string()],
                rejected: None,
            };
        }
    };
    debug!(attempt = attempt.index + 1, raw = %truncate(&raw, 200), "raw response");
    let raw = attempt.raw_response.insert(raw).as_str();

    let source = match extract_mermaid(raw) {
        Ok(source) => source,
        Err(err) => {
            warn!(attempt = attempt.index + 1, error = %err, "extraction failed");
            attempt.extraction_error = Some(err.to_string());
            if is_last {
                return Transition::Failed(DiagramError::Extraction {
                    attempts: max_attempts,
                    source: err,
                    last_rejected: last_rejected.cloned(),
                });
            }
            return Transition::Retry {
                feedback: vec![err.to_string()],
                rejected: None,
            };
        }
    };
    debug!(chars = source.as_str().len(), "extracted diagram");

    let validation = validate_mermaid(source.as_str());
    attempt.validation = Some(validation.clone());

    if validation.is_valid {
        return Transition::Succeeded {
            source,
            warnings: validation.warnings,
            repaired: false,
        };
    }
    warn!(attempt = attempt.index + 1, errors = ?validation.errors, "diagram validation failed");

    if !is_last {
        return Transition::Retry {
            feedback: validation.errors.clone(),
            rejected: Some(RejectedCandidate {
                source: source.into_inner(),
                errors: validation.errors,
            }),
        };
    }

    info!("last attempt, trying auto-fix");
    let fixed = attempt_auto_fix(source.as_str());
    let fixed_validation = validate_mermaid(&fixed);
    if fixed_validation.is_valid {
        info!("auto-fix succeeded");
        return Transition::Succeeded {
            source: DiagramSource::new(fixed),
            warnings: fixed_validation.warnings,
            repaired: true,
        };
    }

    Transition::Failed(DiagramError::Exhausted {
        attempts: max_attempts,
        errors: validation.errors,
        partial_source: source.into_inner(),
    })
}

/// Drives a [`TextGenerator`] until it produces a diagram that validates or the
/// attempt budget runs out.
pub struct DiagramPipeline<G> {
    generator: G,
    config: PipelineConfig,
}

impl<G: TextGenerator> DiagramPipeline<G> {
    pub fn new(generator: G) -> Self {
        Self::with_config(generator, PipelineConfig::default())
    }

    pub fn with_config(generator: G, config: PipelineConfig) -> Self {
        Self { generator, config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Builds the base prompt from product material (and an optional diagram to
    /// expand) and runs the loop.
    pub async fn run(
        &self,
        material: &str,
        previous_diagram: Option<&str>,
    ) -> Result<GeneratedDiagram, DiagramError> {
        let base = base_prompt(material, previous_diagram);
        self.run_with_prompt(&base).await
    }

    #[instrument(skip_all, fields(max_attempts = self.config.max_attempts))]
    pub async fn run_with_prompt(&self, base: &str) -> Result<GeneratedDiagram, DiagramError> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut feedback: Vec<String> = Vec::new();
        let mut last_rejected: Option<RejectedCandidate> = None;

        for index in 0..max_attempts {
            let prompt = if index == 0 {
                base.to_string()
            } else {
                retry_prompt(base, &feedback)
            };
            let options = GenerateOptions {
                max_tokens: self.config.max_tokens,
                temperature: self.config.temperature_for_attempt(index),
            };
            info!(
                attempt = index + 1,
                max_attempts,
                temperature = options.temperature,
                "diagram generation attempt"
            );

            let mut attempt = GenerationAttempt::new(index, prompt);
            let response = self.generator.generate(&attempt.prompt, &options).await;

            match step(&mut attempt, response, max_attempts, last_rejected.as_ref()) {
                Transition::Retry {
                    feedback: errors,
                    rejected,
                } => {
                    feedback = errors;
                    if rejected.is_some() {
                        last_rejected = rejected;
                    }
                }
                Transition::Succeeded {
                    source,
                    warnings,
                    repaired,
                } => return finish(source, warnings, index + 1, repaired),
                Transition::Failed(err) => return Err(err),
            }
        }

        unreachable!("the last attempt always ends in success or failure")
    }
}

/// Re-checks the chosen source once more before handing it out.
fn finish(
    source: DiagramSource,
    warnings: Vec<String>,
    attempts: usize,
    repaired: bool,
) -> Result<GeneratedDiagram, DiagramError> {
    let final_check = validate_mermaid(source.as_str());
    if !final_check.is_valid {
        warn!(errors = ?final_check.errors, "final diagram still invalid");
        return Err(DiagramError::FinalValidation {
            errors: final_check.errors,
            diagram: source.into_inner(),
        });
    }
    if !warnings.is_empty() {
        warn!(?warnings, "diagram accepted with warnings");
    }
    info!(attempts, repaired, "diagram validation passed");

    Ok(GeneratedDiagram {
        kind: DiagramKind::detect(source.as_str()),
        direction: source.direction(),
        source,
        warnings,
        attempts,
        repaired,
    })
}
