use std::collections::{BTreeMap, HashSet};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{ComplianceRequest, DependencyRef, ExternalTarget, PortSpec};
use crate::config::CompilerConfig;
use crate::graph::QualifiedName;
use crate::meta::{validate_dns_label, validate_label_key, validate_label_value};
use crate::{Error, DEFAULT_NAMESPACE, MAX_APPLICATION_NAME_LEN, SUFFIX_CONFIG_READER};

/// Characters that must never appear in an image reference
const FORBIDDEN_IMAGE_CHARS: &[char] = &['<', '>', '`', '$', '&', '|', ';', '\\'];

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_replicas() -> u32 {
    1
}

/// A declared application: one workload plus its network and compliance intent
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    /// Application name (DNS-1123 label)
    pub name: String,

    /// Target namespace
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Container image reference
    pub image: String,

    /// Desired replica count
    #[serde(default = "default_replicas")]
    pub replicas: u32,

    /// Ports the container listens on
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<PortSpec>,

    /// Outbound calls this application makes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<DependencyRef>,

    /// Compliance posture
    pub compliance: ComplianceRequest,

    /// Extra labels copied onto every generated resource
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    /// Extra annotations copied onto every generated resource
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl Application {
    /// (namespace, name) key used by the dependency graph
    pub fn qualified_name(&self) -> QualifiedName {
        (self.namespace.clone(), self.name.clone())
    }

    /// "namespace/name", used in errors and logs
    pub fn display_name(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }

    /// Whether the image is pinned by content digest
    pub fn is_digest_pinned(&self) -> bool {
        self.image
            .split_once('@')
            .is_some_and(|(_, digest)| match digest.split_once(':') {
                Some((algo, hex)) => {
                    !algo.is_empty() && !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit())
                }
                None => false,
            })
    }

    /// Validate the declaration before anything is generated from it.
    ///
    /// Returns the first problem found.
    pub fn validate(&self, config: &CompilerConfig) -> Result<(), Error> {
        validate_dns_label(&self.name).map_err(|e| Error::invalid_declaration("name", e))?;
        if self.name.len() > MAX_APPLICATION_NAME_LEN {
            return Err(Error::invalid_declaration(
                "name",
                format!(
                    "must be no more than {} characters so that derived names such as '{}{}' stay valid DNS labels",
                    MAX_APPLICATION_NAME_LEN, self.name, SUFFIX_CONFIG_READER
                ),
            ));
        }
        validate_dns_label(&self.namespace)
            .map_err(|e| Error::invalid_declaration("namespace", e))?;
        validate_image(&self.image).map_err(|e| Error::invalid_declaration("image", e))?;

        if self.replicas > config.max_replicas {
            return Err(Error::invalid_declaration(
                "replicas",
                format!(
                    "must be between 0 and {} (got {})",
                    config.max_replicas, self.replicas
                ),
            ));
        }

        let mut seen = HashSet::new();
        for (i, port) in self.ports.iter().enumerate() {
            if port.container_port == 0 {
                return Err(Error::invalid_declaration(
                    format!("ports[{}].containerPort", i),
                    "must be between 1 and 65535",
                ));
            }
            if !seen.insert((port.container_port, port.protocol)) {
                return Err(Error::invalid_declaration(
                    format!("ports[{}].containerPort", i),
                    format!(
                        "duplicate port {}/{}",
                        port.container_port, port.protocol
                    ),
                ));
            }
            if let Some(name) = &port.name {
                validate_dns_label(name)
                    .map_err(|e| Error::invalid_declaration(format!("ports[{}].name", i), e))?;
            }
        }

        for (i, dep) in self.dependencies.iter().enumerate() {
            if dep.port == 0 {
                return Err(Error::invalid_declaration(
                    format!("dependencies[{}].port", i),
                    "must be between 1 and 65535",
                ));
            }
            if dep.external {
                ExternalTarget::parse(&dep.target_name).map_err(|e| {
                    Error::invalid_declaration(format!("dependencies[{}].targetName", i), e)
                })?;
            } else if dep.target_name.is_empty() {
                return Err(Error::invalid_declaration(
                    format!("dependencies[{}].targetName", i),
                    "must not be empty",
                ));
            }
        }

        if self.compliance.owner.trim().is_empty() {
            return Err(Error::invalid_declaration(
                "compliance.owner",
                "must not be empty",
            ));
        }
        if self.compliance.framework.trim().is_empty() {
            return Err(Error::invalid_declaration(
                "compliance.framework",
                "must not be empty",
            ));
        }
        // Written verbatim as the framework label value
        validate_label_value(&self.compliance.framework)
            .map_err(|e| Error::invalid_declaration("compliance.framework", e))?;

        for (key, value) in &self.labels {
            let field = || format!("labels.{}", key);
            validate_label_key(key).map_err(|e| Error::invalid_declaration(field(), e))?;
            validate_label_value(value).map_err(|e| Error::invalid_declaration(field(), e))?;
        }
        for key in self.annotations.keys() {
            validate_label_key(key)
                .map_err(|e| Error::invalid_declaration(format!("annotations.{}", key), e))?;
        }

        Ok(())
    }
}

/// Validate a container image reference.
///
/// Rejects empty references, whitespace, shell metacharacters and more than
/// one tag separator in the final path segment.
pub fn validate_image(image: &str) -> Result<(), String> {
    if image.is_empty() {
        return Err("image cannot be empty".to_string());
    }
    if image.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(format!("image '{}' contains whitespace", image));
    }
    if let Some(c) = image.chars().find(|c| FORBIDDEN_IMAGE_CHARS.contains(c)) {
        return Err(format!("image '{}' contains forbidden character '{}'", image, c));
    }

    let reference = image.split_once('@').map_or(image, |(name, _)| name);
    let last_segment = reference.rsplit('/').next().unwrap_or(reference);
    if last_segment.matches(':').count() > 1 {
        return Err(format!("image '{}' has more than one tag", image));
    }
    Ok(())
}
