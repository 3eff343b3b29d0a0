pub mod analysis;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod controller;
pub mod extract;
pub mod generator;
pub mod heuristics;
pub mod ir;
pub mod prompt;
pub mod repair;
pub mod validate;

pub use analysis::{AnalysisResult, ModelOutput, parse_analysis};
#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{Config, GeneratorConfig, MAX_RETRIES, PipelineConfig, load_config};
pub use controller::{
    DiagramError, DiagramPipeline, GeneratedDiagram, GenerationAttempt, Transition, step,
};
pub use extract::{ExtractError, MERMAID_DELIMITER, extract_mermaid};
#[cfg(feature = "http")]
pub use generator::HttpGenerator;
pub use generator::{GenerateOptions, GeneratorError, TextGenerator};
pub use ir::{DiagramKind, DiagramSource, Direction};
pub use repair::attempt_auto_fix;
pub use validate::{ValidationResult, validate_mermaid};

/// Runs the full generate / extract / validate / repair loop with the default
/// attempt budget.
///
/// `material` describes the product; `previous_diagram` is forwarded verbatim
/// as context when expanding an earlier diagram.
pub async fn generate_validated_diagram<G: TextGenerator>(
    generator: G,
    material: &str,
    previous_diagram: Option<&str>,
) -> Result<GeneratedDiagram, DiagramError> {
    DiagramPipeline::new(generator)
        .run(material, previous_diagram)
        .await
}
