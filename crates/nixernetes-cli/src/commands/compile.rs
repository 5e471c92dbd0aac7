//! Compile command

use std::path::PathBuf;

use clap::Args;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use nixernetes_common::declaration::Application;
use nixernetes_manifest::{GeneratedResource, ValidationResult};
use nixernetes_service::{compile_batch, BatchResult, CompilePhase};

use super::{format_table, load_config, read_input, render, OutputFormat};
use crate::{Error, Result};

#[derive(Args, Debug)]
pub struct CompileArgs {
    /// Application declarations (YAML, `-` for stdin). Accepts one
    /// application per document, a list, or `applications: [...]`.
    #[arg(short, long)]
    pub file: PathBuf,

    /// Target Kubernetes version (default: from config, then 1.30)
    #[arg(short, long)]
    pub target: Option<String>,

    /// Compiler configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// yaml: manifest on stdout, summary on stderr; json: full report; table: summary
    #[arg(short, long, value_enum, default_value = "yaml")]
    pub output: OutputFormat,
}

pub fn run(args: CompileArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let target = args
        .target
        .clone()
        .unwrap_or_else(|| config.default_target_version.clone());
    let apps = parse_applications(&read_input(&args.file)?)?;
    info!(applications = apps.len(), target = %target, "compiling");

    let batch = compile_batch(&config, &apps, &target)?;

    match args.output {
        OutputFormat::Yaml => {
            print!("{}", manifest_yaml(&batch.manifest)?);
            eprintln!("{}", summary_table(&batch));
        }
        OutputFormat::Json => {
            println!("{}", render(&CompileReport::new(&batch), OutputFormat::Json)?)
        }
        OutputFormat::Table => println!("{}", summary_table(&batch)),
    }

    let failed = batch.failures().count();
    if failed > 0 {
        for (application, err) in batch.failures() {
            warn!(app = application, code = err.code(), "{}", err);
        }
        return Err(Error::failed(format!(
            "{} of {} applications failed to compile",
            failed,
            batch.outcomes.len()
        )));
    }
    Ok(())
}

// =============================================================================
// Input
// =============================================================================

/// Parse every application declared in a YAML stream
pub fn parse_applications(input: &str) -> Result<Vec<Application>> {
    let mut apps = Vec::new();
    for document in serde_yaml::Deserializer::from_str(input) {
        let value = serde_yaml::Value::deserialize(document)?;
        match value {
            serde_yaml::Value::Null => {}
            serde_yaml::Value::Sequence(_) => {
                apps.extend(serde_yaml::from_value::<Vec<Application>>(value)?);
            }
            serde_yaml::Value::Mapping(ref map) if map.contains_key("applications") => {
                let wrapped: ApplicationList = serde_yaml::from_value(value)?;
                apps.extend(wrapped.applications);
            }
            other => apps.push(serde_yaml::from_value(other)?),
        }
    }
    if apps.is_empty() {
        return Err(Error::invalid_input("no applications declared"));
    }
    Ok(apps)
}

#[derive(Deserialize)]
struct ApplicationList {
    applications: Vec<Application>,
}

// =============================================================================
// Output
// =============================================================================

/// Multi-document YAML stream of the manifest
pub fn manifest_yaml(resources: &[GeneratedResource]) -> Result<String> {
    let mut out = String::new();
    for resource in resources {
        out.push_str("---\n");
        out.push_str(&serde_yaml::to_string(resource)?);
    }
    Ok(out)
}

fn summary_table(batch: &BatchResult) -> String {
    let rows: Vec<Vec<String>> = batch
        .outcomes
        .iter()
        .map(|outcome| match &outcome.result {
            Ok(result) => vec![
                outcome.application.clone(),
                result.phase.to_string(),
                result.profile.level.to_string(),
                result.summary(),
            ],
            Err(err) => vec![
                outcome.application.clone(),
                CompilePhase::Failed.to_string(),
                "-".to_string(),
                format!("{}: {}", err.code(), err),
            ],
        })
        .collect();
    format_table(&["APPLICATION", "PHASE", "LEVEL", "RESULT"], &rows)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CompileReport<'a> {
    applications: Vec<ApplicationReport<'a>>,
    manifest: &'a [GeneratedResource],
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    cycles: &'a [Vec<String>],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApplicationReport<'a> {
    application: &'a str,
    phase: CompilePhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<String>,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    diagnostics: &'a [ValidationResult],
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorReport>,
}

#[derive(Serialize)]
struct ErrorReport {
    code: &'static str,
    message: String,
}

impl<'a> CompileReport<'a> {
    fn new(batch: &'a BatchResult) -> Self {
        let applications = batch
            .outcomes
            .iter()
            .map(|outcome| match &outcome.result {
                Ok(result) => ApplicationReport {
                    application: &outcome.application,
                    phase: result.phase,
                    summary: Some(result.summary()),
                    diagnostics: &result.diagnostics,
                    error: None,
                },
                Err(err) => ApplicationReport {
                    application: &outcome.application,
                    phase: CompilePhase::Failed,
                    summary: None,
                    diagnostics: &[],
                    error: Some(ErrorReport {
                        code: err.code(),
                        message: err.to_string(),
                    }),
                },
            })
            .collect();
        Self {
            applications,
            manifest: &batch.manifest,
            cycles: &batch.cycles,
        }
    }
}
