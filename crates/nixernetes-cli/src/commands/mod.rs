//! CLI commands

use std::io::Read;
use std::path::Path;

use clap::ValueEnum;
use serde::Serialize;

use nixernetes_common::config::OsEnv;
use nixernetes_common::CompilerConfig;

use crate::{Error, Result};

pub mod compile;
pub mod profiles;
pub mod schema;
pub mod validate;
pub mod versions;

/// Output format
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum OutputFormat {
    /// YAML (manifests are written as multi-document streams)
    #[default]
    Yaml,
    /// JSON
    Json,
    /// Columnar table
    Table,
}

/// Read a file, or stdin when the path is `-`
pub fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut input = String::new();
        std::io::stdin().read_to_string(&mut input)?;
        return Ok(input);
    }
    std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Compiler configuration from an optional file, then `NIXERNETES_*` variables
pub fn load_config(path: Option<&Path>) -> Result<CompilerConfig> {
    let config = match path {
        Some(path) => CompilerConfig::from_file(path)?,
        None => CompilerConfig::default(),
    };
    Ok(config.apply_env(&OsEnv)?)
}

/// Serialize a value as YAML or JSON. Tables are rendered by each command.
pub fn render<T: Serialize>(value: &T, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml | OutputFormat::Table => Ok(serde_yaml::to_string(value)?),
    }
}

/// Render rows as a column-aligned table with headers
pub fn format_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(widths.len()) {
            widths[i] = widths[i].max(cell.len());
        }
    }

    let line = |cells: Vec<&str>| {
        cells
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let w = widths.get(i).copied().unwrap_or(0);
                format!("{:<width$}", cell, width = w)
            })
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = line(headers.to_vec());
    for row in rows {
        out.push('\n');
        out.push_str(&line(row.iter().map(String::as_str).collect()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn table_columns_align() {
        let table = format_table(
            &["KIND", "API VERSION"],
            &[
                vec!["Deployment".into(), "apps/v1".into()],
                vec!["Service".into(), "v1".into()],
            ],
        );
        let lines: Vec<_> = table.lines().collect();
        assert_eq!(lines[0], "KIND        API VERSION");
        assert_eq!(lines[1], "Deployment  apps/v1");
        assert_eq!(lines[2], "Service     v1");
    }

    #[test]
    fn table_without_rows_is_headers_only() {
        assert_eq!(format_table(&["A", "B"], &[]), "A  B");
    }

    #[test]
    fn missing_input_names_the_path() {
        let err = read_input(Path::new("/nonexistent/apps.yaml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/apps.yaml"));
    }

    #[test]
    fn config_file_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "maxReplicas: 7").unwrap();
        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.max_replicas, 7);
    }
}
