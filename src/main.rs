//! clinical-reasoning - run the reasoning core over a case file.
//!
//! The case file is `{"labs": [...], "models": [...]}`; the analysis result
//! is printed to stdout as JSON. Logs go to stderr.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use serde::Deserialize;
use thiserror::Error;

use clinical_reasoning::config::{self, EngineConfig};
use clinical_reasoning::models::{ModelDifferential, RawLabResult};
use clinical_reasoning::reasoning::{IcdPreferredMatcher, NameAndCodeMatcher};
use clinical_reasoning::{AnalysisEngine, DefaultAnalysisEngine, ReasoningError};

#[derive(Parser)]
#[command(name = config::APP_NAME)]
#[command(about = "Lab classification, triage and multi-model diagnosis consensus", long_about = None)]
#[command(version = config::APP_VERSION)]
struct Cli {
    /// Case file with extracted labs and per-model differentials
    case: PathBuf,

    /// Skip consensus and analyze the labs only
    #[arg(long)]
    labs_only: bool,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,

    /// Engine config file (overrides $CLINICAL_REASONING_CONFIG)
    #[arg(long)]
    config: Option<PathBuf>,

    /// How diagnoses from different models are matched
    #[arg(long, value_enum, default_value_t = Matcher::NameAndCode)]
    matcher: Matcher,
}

#[derive(Clone, Copy, ValueEnum)]
enum Matcher {
    NameAndCode,
    IcdPreferred,
}

#[derive(Deserialize)]
struct CaseFile {
    labs: Vec<RawLabResult>,
    #[serde(default)]
    models: Vec<ModelDifferential>,
}

#[derive(Error, Debug)]
enum CliError {
    #[error("Cannot read case file {0}: {1}")]
    Read(String, std::io::Error),

    #[error("Invalid case file {0}: {1}")]
    Parse(String, serde_json::Error),

    #[error(transparent)]
    Reasoning(#[from] ReasoningError),

    #[error("Cannot serialize result: {0}")]
    Output(serde_json::Error),
}

fn run(cli: Cli) -> Result<String, CliError> {
    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::resolve()?,
    };
    let engine = DefaultAnalysisEngine::from_config(config)?;
    let engine = match cli.matcher {
        Matcher::NameAndCode => engine.with_matcher(Box::new(NameAndCodeMatcher)),
        Matcher::IcdPreferred => engine.with_matcher(Box::new(IcdPreferredMatcher)),
    };

    let display = cli.case.display().to_string();
    let json = std::fs::read_to_string(&cli.case).map_err(|e| CliError::Read(display.clone(), e))?;
    let case: CaseFile = serde_json::from_str(&json).map_err(|e| CliError::Parse(display, e))?;

    let result = if cli.labs_only {
        engine.analyze_labs(&case.labs)?
    } else {
        engine.run_analysis(&case.labs, &case.models)?
    };

    let output = if cli.pretty {
        serde_json::to_string_pretty(&result)
    } else {
        serde_json::to_string(&result)
    };
    output.map_err(CliError::Output)
}

fn main() -> ExitCode {
    clinical_reasoning::init_tracing();
    tracing::debug!("{} v{}", config::APP_NAME, config::APP_VERSION);

    match run(Cli::parse()) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Analysis failed");
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
