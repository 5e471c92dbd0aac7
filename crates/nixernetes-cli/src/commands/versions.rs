//! Versions command

use clap::Args;

use nixernetes_manifest::VersionResolver;

use super::format_table;
use crate::Result;

#[derive(Args, Debug)]
pub struct VersionsArgs {
    /// Show the kind to apiVersion table for this version
    #[arg(short, long)]
    pub target: Option<String>,
}

pub fn run(args: VersionsArgs) -> Result<()> {
    println!("{}", versions_text(args.target.as_deref())?);
    Ok(())
}

pub fn versions_text(target: Option<&str>) -> Result<String> {
    let resolver = VersionResolver::global();
    let Some(target) = target else {
        return Ok(resolver.supported_versions().join("\n"));
    };
    let rows: Vec<Vec<String>> = resolver
        .table(target)?
        .into_iter()
        .map(|(kind, api_version)| vec![kind.to_string(), api_version.to_string()])
        .collect();
    Ok(format_table(&["KIND", "API VERSION"], &rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn lists_supported_versions_oldest_first() {
        let text = versions_text(None).unwrap();
        assert_eq!(text.lines().next(), Some("1.28"));
        assert!(text.lines().any(|l| l == "1.31"));
    }

    #[test]
    fn table_for_one_version() {
        let text = versions_text(Some("1.30")).unwrap();
        assert!(text.starts_with("KIND"));
        assert!(text
            .lines()
            .any(|l| l.starts_with("Deployment") && l.ends_with("apps/v1")));
        assert!(text
            .lines()
            .any(|l| l.starts_with("NetworkPolicy") && l.ends_with("networking.k8s.io/v1")));
    }

    #[test]
    fn unsupported_version_is_an_error() {
        assert!(matches!(versions_text(Some("2.0")), Err(Error::Compile(_))));
    }
}
