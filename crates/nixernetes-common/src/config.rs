//! Compiler configuration
//!
//! [`CompilerConfig`] is passed explicitly to every component. It is built
//! from defaults, an optional YAML file, then `NIXERNETES_*` environment
//! overrides read through the [`ConfigEnv`] trait so tests never touch the
//! process environment.

use std::path::Path;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::Error;

/// Environment variable overriding `framework_version`
pub const ENV_FRAMEWORK_VERSION: &str = "NIXERNETES_FRAMEWORK_VERSION";
/// Environment variable overriding `default_target_version`
pub const ENV_TARGET_VERSION: &str = "NIXERNETES_TARGET_VERSION";
/// Environment variable overriding `manage_namespaces`
pub const ENV_MANAGE_NAMESPACES: &str = "NIXERNETES_MANAGE_NAMESPACES";
/// Environment variable overriding `allow_dns_egress`
pub const ENV_ALLOW_DNS_EGRESS: &str = "NIXERNETES_ALLOW_DNS_EGRESS";
/// Environment variable overriding `reject_dependency_cycles`
pub const ENV_REJECT_CYCLES: &str = "NIXERNETES_REJECT_DEPENDENCY_CYCLES";
/// Environment variable overriding `max_replicas`
pub const ENV_MAX_REPLICAS: &str = "NIXERNETES_MAX_REPLICAS";

/// Settings shared by every stage of the compiler
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct CompilerConfig {
    /// Value written to `nixernetes.io/version`
    pub framework_version: String,
    /// Kubernetes version used when the caller does not pick one
    pub default_target_version: String,
    /// Emit a Namespace resource for non-system namespaces
    pub manage_namespaces: bool,
    /// Allow egress to kube-dns from every application
    pub allow_dns_egress: bool,
    /// Treat dependency cycles as a fatal error
    pub reject_dependency_cycles: bool,
    /// Upper bound for `replicas`
    pub max_replicas: u32,
    /// ClusterRole bound for applications at level high and above
    pub audit_reader_cluster_role: String,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            framework_version: env!("CARGO_PKG_VERSION").to_string(),
            default_target_version: "1.30".to_string(),
            manage_namespaces: false,
            allow_dns_egress: false,
            reject_dependency_cycles: false,
            max_replicas: 100,
            audit_reader_cluster_role: "nixernetes:audit-log-reader".to_string(),
        }
    }
}

impl CompilerConfig {
    /// Parse a YAML document. Missing fields keep their defaults.
    pub fn from_yaml_str(input: &str) -> Result<Self, Error> {
        let value = crate::yaml::parse_yaml(input)
            .map_err(|e| Error::config(format!("invalid config YAML: {}", e)))?;
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value).map_err(|e| Error::config(format!("invalid config: {}", e)))
    }

    /// Read and parse a YAML config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("failed to read {}: {}", path.display(), e)))?;
        Self::from_yaml_str(&content)
    }

    /// Apply `NIXERNETES_*` overrides
    pub fn apply_env(mut self, env: &dyn ConfigEnv) -> Result<Self, Error> {
        if let Some(v) = env.var(ENV_FRAMEWORK_VERSION) {
            self.framework_version = v;
        }
        if let Some(v) = env.var(ENV_TARGET_VERSION) {
            self.default_target_version = v;
        }
        if let Some(v) = env.var(ENV_MANAGE_NAMESPACES) {
            self.manage_namespaces = parse_bool(ENV_MANAGE_NAMESPACES, &v)?;
        }
        if let Some(v) = env.var(ENV_ALLOW_DNS_EGRESS) {
            self.allow_dns_egress = parse_bool(ENV_ALLOW_DNS_EGRESS, &v)?;
        }
        if let Some(v) = env.var(ENV_REJECT_CYCLES) {
            self.reject_dependency_cycles = parse_bool(ENV_REJECT_CYCLES, &v)?;
        }
        if let Some(v) = env.var(ENV_MAX_REPLICAS) {
            self.max_replicas = v.parse().map_err(|_| {
                Error::config(format!("{} must be a non-negative integer, got '{}'", ENV_MAX_REPLICAS, v))
            })?;
        }
        Ok(self)
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool, Error> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(Error::config(format!(
            "{} must be true or false, got '{}'",
            name, value
        ))),
    }
}

/// Read access to environment variables
#[cfg_attr(test, mockall::automock)]
pub trait ConfigEnv: Send + Sync {
    /// Value of the variable, if set
    fn var(&self, name: &str) -> Option<String>;
}

/// Reads from the process environment
#[derive(Clone, Default)]
pub struct OsEnv;

impl ConfigEnv for OsEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}
