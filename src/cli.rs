use crate::analysis::parse_analysis;
use crate::config::{apply_env_overrides, load_config};
use crate::controller::DiagramPipeline;
use crate::extract::extract_mermaid;
use crate::generator::HttpGenerator;
use crate::repair::attempt_auto_fix;
use crate::validate::{ValidationResult, validate_mermaid};
use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "mmforge",
    version,
    about = "Extract, validate and repair Mermaid flowcharts written by language models"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Pull a flowchart out of a raw model response and validate it
    Extract {
        /// Raw response file or '-' for stdin
        #[arg(short = 'i', long = "input")]
        input: Option<PathBuf>,

        /// Give anonymous edge endpoints generated IDs (Node1, Node2, ...)
        #[arg(long)]
        repair: bool,

        /// Print a JSON report instead of the diagram
        #[arg(long)]
        json: bool,
    },
    /// Validate Mermaid source (.mmd) or every mermaid block of a Markdown file
    Validate {
        /// Input file or '-' for stdin
        #[arg(short = 'i', long = "input")]
        input: Option<PathBuf>,

        /// Print a JSON report
        #[arg(long)]
        json: bool,
    },
    /// Generate a flowchart from a sketch analysis with the configured LLM
    Generate {
        /// Analysis JSON (or plain text) describing the product
        #[arg(short = 'a', long = "analysis")]
        analysis: PathBuf,

        /// Earlier diagram to expand
        #[arg(short = 'p', long = "previous")]
        previous: Option<PathBuf>,

        /// Config file (JSON or JSON5)
        #[arg(short = 'c', long = "configFile")]
        config: Option<PathBuf>,

        /// Output file. Defaults to stdout if omitted.
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,

        /// Print a JSON report instead of the diagram
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExtractReport {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    mermaid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    validation: Option<ValidationResult>,
    repaired: bool,
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    init_logging();

    match args.command {
        Command::Extract {
            input,
            repair,
            json,
        } => run_extract(input.as_deref(), repair, json),
        Command::Validate { input, json } => run_validate(input.as_deref(), json),
        Command::Generate {
            analysis,
            previous,
            config,
            output,
            json,
        } => run_generate(
            &analysis,
            previous.as_deref(),
            config.as_deref(),
            output.as_deref(),
            json,
        ),
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("mermaid_forge=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn run_extract(input: Option<&Path>, repair: bool, json: bool) -> Result<()> {
    let (raw, _) = read_input(input)?;
    let report = extract_report(&raw, repair);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if let Some(mermaid) = &report.mermaid {
        println!("{mermaid}");
        if let Some(validation) = &report.validation {
            print_findings(validation, None);
        }
    }

    if report.success {
        return Ok(());
    }
    match report.error {
        Some(error) => Err(anyhow::anyhow!(error)),
        None => Err(anyhow::anyhow!("Extracted diagram failed validation")),
    }
}

fn extract_report(raw: &str, repair: bool) -> ExtractReport {
    let source = match extract_mermaid(raw) {
        Ok(source) => source.into_inner(),
        Err(err) => {
            return ExtractReport {
                success: false,
                mermaid: None,
                error: Some(err.to_string()),
                validation: None,
                repaired: false,
            };
        }
    };

    let (source, repaired) = if repair {
        let fixed = attempt_auto_fix(&source);
        let changed = fixed != source;
        (fixed, changed)
    } else {
        (source, false)
    };

    let validation = validate_mermaid(&source);
    ExtractReport {
        success: validation.is_valid,
        mermaid: Some(source),
        error: None,
        validation: Some(validation),
        repaired,
    }
}

fn run_validate(input: Option<&Path>, json: bool) -> Result<()> {
    let (content, is_markdown) = read_input(input)?;
    let diagrams = if is_markdown {
        extract_mermaid_blocks(&content)
    } else {
        vec![content]
    };

    if diagrams.is_empty() {
        return Err(anyhow::anyhow!("No Mermaid diagrams found in input"));
    }

    let results: Vec<ValidationResult> = diagrams.iter().map(|d| validate_mermaid(d)).collect();
    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        let multiple = results.len() > 1;
        for (idx, result) in results.iter().enumerate() {
            print_findings(result, multiple.then_some(idx + 1));
        }
    }

    let invalid = results.iter().filter(|r| !r.is_valid).count();
    if invalid > 0 {
        return Err(anyhow::anyhow!(
            "{invalid} of {} diagram(s) failed validation",
            results.len()
        ));
    }
    Ok(())
}

fn run_generate(
    analysis_path: &Path,
    previous_path: Option<&Path>,
    config_path: Option<&Path>,
    output: Option<&Path>,
    json: bool,
) -> Result<()> {
    dotenvy::dotenv().ok();
    let config = apply_env_overrides(load_config(config_path)?, |key| std::env::var(key).ok())?;

    let analysis = parse_analysis(&std::fs::read_to_string(analysis_path)?);
    if analysis.is_fallback() {
        info!("analysis is not JSON, using the raw text as prompt material");
    }
    let previous = previous_path.map(std::fs::read_to_string).transpose()?;

    let generator = HttpGenerator::new(&config.generator)?;
    let pipeline = DiagramPipeline::with_config(generator, config.pipeline.clone());
    info!(
        model = %config.generator.model,
        max_attempts = pipeline.config().max_attempts,
        "generating diagram"
    );
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(pipeline.run(&analysis.prompt_material(), previous.as_deref()));

    match result {
        Ok(diagram) => {
            let text = if json {
                serde_json::to_string_pretty(&serde_json::json!({
                    "success": true,
                    "diagram": diagram,
                    "model": config.generator.model,
                }))?
            } else {
                diagram.source.to_string()
            };
            write_output(&text, output)
        }
        Err(err) => {
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "success": false,
                        "error": err,
                    }))?
                );
            }
            Err(err.into())
        }
    }
}

fn print_findings(result: &ValidationResult, diagram: Option<usize>) {
    let prefix = diagram.map(|n| format!("diagram {n}: ")).unwrap_or_default();
    for error in &result.errors {
        eprintln!("{prefix}error: {error}");
    }
    for warning in &result.warnings {
        eprintln!("{prefix}warning: {warning}");
    }
    if result.is_valid {
        eprintln!("{prefix}valid");
    }
}

fn read_input(path: Option<&Path>) -> Result<(String, bool)> {
    if let Some(path) = path {
        if path == Path::new("-") {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            return Ok((buf, false));
        }
        let content = std::fs::read_to_string(path)?;
        let is_md = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|ext| matches!(ext, "md" | "markdown"))
            .unwrap_or(false);
        return Ok((content, is_md));
    }

    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok((buf, false))
}

fn write_output(text: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => std::fs::write(path, format!("{text}\n"))?,
        None => {
            let mut stdout = io::stdout().lock();
            writeln!(stdout, "{text}")?;
        }
    }
    Ok(())
}

fn extract_mermaid_blocks(input: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut in_block = false;
    let mut current = Vec::new();
    let mut fence = String::new();

    for line in input.lines() {
        let trimmed = line.trim();
        if !in_block {
            if let Some(start_fence) = detect_mermaid_fence(trimmed) {
                in_block = true;
                fence = start_fence;
                continue;
            }
        } else if is_fence_end(trimmed, &fence) {
            in_block = false;
            blocks.push(current.join("\n"));
            current.clear();
            continue;
        }

        if in_block {
            current.push(line.to_string());
        }
    }

    blocks
}

fn detect_mermaid_fence(line: &str) -> Option<String> {
    for fence in ["```", "~~~"] {
        if let Some(rest) = line.strip_prefix(fence)
            && rest.trim_start_matches(&fence[..1]).trim().starts_with("mermaid")
        {
            return Some(fence.to_string());
        }
    }
    None
}

fn is_fence_end(line: &str, fence: &str) -> bool {
    if !line.starts_with(fence) {
        return false;
    }
    line[fence.len()..].trim().is_empty()
}
