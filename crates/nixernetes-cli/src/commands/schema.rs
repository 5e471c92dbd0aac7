//! Schema command

use clap::Args;
use schemars::schema::RootSchema;
use schemars::schema_for;

use nixernetes_common::declaration::Application;
use nixernetes_common::CompilerConfig;

use crate::Result;

#[derive(Args, Debug)]
pub struct SchemaArgs {
    /// Print the compiler configuration schema instead
    #[arg(long)]
    pub config: bool,
}

pub fn run(args: SchemaArgs) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&schema(args.config))?);
    Ok(())
}

/// JSON schema of application declarations, or of the compiler configuration
pub fn schema(config: bool) -> RootSchema {
    if config {
        schema_for!(CompilerConfig)
    } else {
        schema_for!(Application)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn application_schema_requires_identity_and_compliance() {
        let json = serde_json::to_value(schema(false)).unwrap();
        let required: Vec<&str> = json["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|v| v.as_str())
            .collect();
        for field in ["name", "image", "compliance"] {
            assert!(required.contains(&field), "{field} not required");
        }
        assert!(!required.contains(&"namespace"));
    }

    #[test]
    fn config_schema_lists_limits() {
        let json = serde_json::to_value(schema(true)).unwrap();
        assert!(json["properties"]["maxReplicas"].is_object());
    }
}
