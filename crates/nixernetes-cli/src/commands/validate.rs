//! Validate command

use std::fmt::Write as _;
use std::path::PathBuf;

use clap::Args;
use tracing::info;

use nixernetes_manifest::{ManifestAnalyzer, ManifestReport, ManifestValidator};

use super::{format_table, load_config, read_input, render, OutputFormat};
use crate::{Error, Result};

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Multi-document manifest (`-` for stdin)
    #[arg(short, long)]
    pub file: PathBuf,

    /// Target Kubernetes version (default: from config, then 1.30)
    #[arg(short, long)]
    pub target: Option<String>,

    /// Compiler configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Accept namespaces that the manifest uses but does not define
    #[arg(long)]
    pub allow_external_namespaces: bool,

    /// Report format
    #[arg(short, long, value_enum, default_value = "table")]
    pub output: OutputFormat,
}

pub fn run(args: ValidateArgs) -> Result<()> {
    let target = match args.target {
        Some(target) => target,
        None => load_config(args.config.as_deref())?.default_target_version,
    };
    let report = analyze(&read_input(&args.file)?, &target, args.allow_external_namespaces)?;
    info!(
        resources = report.resource_count,
        valid = report.valid,
        ordered = report.ordered,
        "manifest analyzed"
    );

    match args.output {
        OutputFormat::Table => println!("{}", report_text(&report)),
        format => println!("{}", render(&report, format)?),
    }

    if report.is_clean() {
        Ok(())
    } else {
        Err(Error::failed(format!(
            "manifest is not valid for Kubernetes {}",
            target
        )))
    }
}

/// Analyze a manifest for one target version
pub fn analyze(input: &str, target: &str, allow_external_namespaces: bool) -> Result<ManifestReport> {
    nixernetes_manifest::VersionResolver::global().check_version(target)?;
    let mut analyzer = ManifestAnalyzer::new(ManifestValidator::new(target));
    if allow_external_namespaces {
        analyzer = analyzer.allow_external_namespaces();
    }
    Ok(analyzer.analyze(input)?)
}

/// Per-resource table followed by manifest-level findings
pub fn report_text(report: &ManifestReport) -> String {
    let rows: Vec<Vec<String>> = report
        .results
        .iter()
        .map(|r| {
            vec![
                r.resource.to_string(),
                r.resource.namespace.clone().unwrap_or_else(|| "-".to_string()),
                if r.valid { "valid" } else { "invalid" }.to_string(),
                r.error_messages().join("; "),
            ]
        })
        .collect();
    let mut out = format_table(&["RESOURCE", "NAMESPACE", "STATUS", "ERRORS"], &rows);

    for result in &report.results {
        for warning in &result.warnings {
            let _ = write!(out, "\nwarning: {}: {}", result.resource, warning);
        }
    }
    for error in &report.manifest_errors {
        let _ = write!(out, "\nerror: {}", error);
    }
    for issue in &report.ordering_issues {
        let _ = write!(out, "\norder: {}", issue);
    }
    let _ = write!(
        out,
        "\n\n{} resources, {}, {}",
        report.resource_count,
        if report.valid { "valid" } else { "invalid" },
        if report.ordered { "in apply order" } else { "out of apply order" }
    );
    out
}
