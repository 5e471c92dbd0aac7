//! Profiles command

use clap::Args;
use serde::Serialize;

use nixernetes_common::declaration::ComplianceLevel;
use nixernetes_compliance::{ComplianceProfile, ComplianceProfileResolver};

use super::{format_table, render, OutputFormat};
use crate::Result;

#[derive(Args, Debug)]
pub struct ProfilesArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub output: OutputFormat,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProfileCatalog {
    levels: Vec<ComplianceProfile>,
    environments: Vec<EnvironmentProfile>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EnvironmentProfile {
    name: &'static str,
    profile: ComplianceProfile,
}

pub fn run(args: ProfilesArgs) -> Result<()> {
    let catalog = catalog()?;
    match args.output {
        OutputFormat::Table => println!("{}", catalog_table(&catalog)),
        format => println!("{}", render(&catalog, format)?),
    }
    Ok(())
}

fn catalog() -> Result<ProfileCatalog> {
    let resolver = ComplianceProfileResolver::global();
    let levels = ComplianceLevel::ALL
        .into_iter()
        .map(|level| resolver.resolve(level))
        .collect();
    let environments = resolver
        .named_profiles()
        .iter()
        .map(|named| -> Result<EnvironmentProfile> {
            Ok(EnvironmentProfile {
                name: named.name,
                profile: resolver.resolve_named(named.name)?,
            })
        })
        .collect::<Result<_>>()?;
    Ok(ProfileCatalog {
        levels,
        environments,
    })
}

fn flags(profile: &ComplianceProfile) -> String {
    let flags = profile.enabled_flags();
    if flags.is_empty() {
        "-".to_string()
    } else {
        flags.into_iter().collect::<Vec<_>>().join(",")
    }
}

fn catalog_table(catalog: &ProfileCatalog) -> String {
    let levels: Vec<Vec<String>> = catalog
        .levels
        .iter()
        .map(|p| {
            vec![
                p.level.to_string(),
                p.pod_security_level.as_str().to_string(),
                flags(p),
            ]
        })
        .collect();
    let environments: Vec<Vec<String>> = catalog
        .environments
        .iter()
        .map(|e| vec![e.name.to_string(), e.profile.level.to_string(), flags(&e.profile)])
        .collect();
    format!(
        "{}\n\n{}",
        format_table(&["LEVEL", "POD SECURITY", "REQUIREMENTS"], &levels),
        format_table(&["ENVIRONMENT", "LEVEL", "REQUIREMENTS"], &environments)
    )
}
