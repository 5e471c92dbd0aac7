//! Kubernetes object metadata and naming rules
//!
//! Every generated resource carries an [`ObjectMeta`]. The `validate_*`
//! helpers implement the API server's naming rules so that problems are
//! reported before anything reaches a cluster.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Maximum length of a DNS-1123 label (and of a label value)
pub const MAX_DNS_LABEL_LEN: usize = 63;

/// Maximum length of a DNS-1123 subdomain
pub const MAX_DNS_SUBDOMAIN_LEN: usize = 253;

/// Standard Kubernetes ObjectMeta for generated resources.
///
/// Constructors add the managed-by label. Namespace is `None` for
/// cluster-scoped kinds such as Namespace and ClusterRole.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    /// Resource name
    pub name: String,
    /// Resource namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Labels
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Annotations
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl ObjectMeta {
    /// Create namespaced metadata
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: Some(namespace.into()),
            labels: managed_labels(),
            annotations: BTreeMap::new(),
        }
    }

    /// Create metadata for a cluster-scoped resource
    pub fn cluster_scoped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            labels: managed_labels(),
            annotations: BTreeMap::new(),
        }
    }

    /// Add a label
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Add an annotation
    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }
}

fn managed_labels() -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(
        crate::LABEL_MANAGED_BY.to_string(),
        crate::LABEL_MANAGED_BY_NIXERNETES.to_string(),
    );
    labels
}

/// Validate a DNS-1123 label: at most 63 characters, lowercase
/// alphanumerics and '-', starting and ending with an alphanumeric.
pub fn validate_dns_label(s: &str) -> Result<(), String> {
    if s.is_empty() {
        return Err("must not be empty".to_string());
    }
    if s.len() > MAX_DNS_LABEL_LEN {
        return Err(format!(
            "must be no more than {} characters (got {})",
            MAX_DNS_LABEL_LEN,
            s.len()
        ));
    }
    if !s
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(format!(
            "'{}' must consist of lowercase alphanumeric characters or '-'",
            s
        ));
    }
    if s.starts_with('-') || s.ends_with('-') {
        return Err(format!(
            "'{}' must start and end with an alphanumeric character",
            s
        ));
    }
    Ok(())
}

/// Validate a DNS-1123 subdomain: dot separated DNS labels, at most 253 characters.
pub fn validate_dns_subdomain(s: &str) -> Result<(), String> {
    if s.len() > MAX_DNS_SUBDOMAIN_LEN {
        return Err(format!(
            "must be no more than {} characters (got {})",
            MAX_DNS_SUBDOMAIN_LEN,
            s.len()
        ));
    }
    s.split('.').try_for_each(validate_dns_label)
}

/// Validate an RBAC object name: non-empty, at most 253 characters, not
/// "." or "..", and free of '/' and '%'.
pub fn validate_path_segment_name(s: &str) -> Result<(), String> {
    if s.is_empty() {
        return Err("name cannot be empty".to_string());
    }
    if s.len() > MAX_DNS_SUBDOMAIN_LEN {
        return Err(format!(
            "must be no more than {} characters (got {})",
            MAX_DNS_SUBDOMAIN_LEN,
            s.len()
        ));
    }
    if s == "." || s == ".." {
        return Err(format!("'{}' is not a valid name", s));
    }
    if let Some(c) = s.chars().find(|c| matches!(c, '/' | '%')) {
        return Err(format!("'{}' may not contain '{}'", s, c));
    }
    Ok(())
}

/// Validate a label or annotation key: an optional DNS subdomain prefix
/// followed by '/' and a name segment.
pub fn validate_label_key(key: &str) -> Result<(), String> {
    let name = match key.split_once('/') {
        Some((prefix, name)) => {
            validate_dns_subdomain(prefix).map_err(|e| format!("key prefix {}", e))?;
            name
        }
        None => key,
    };
    if name.is_empty() {
        return Err(format!("key '{}' has an empty name segment", key));
    }
    validate_label_segment(name).map_err(|e| format!("key '{}' {}", key, e))
}

/// Validate a label value: empty, or at most 63 characters of
/// alphanumerics, '-', '_' and '.', starting and ending with an alphanumeric.
pub fn validate_label_value(value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Ok(());
    }
    validate_label_segment(value).map_err(|e| format!("value '{}' {}", value, e))
}

fn validate_label_segment(s: &str) -> Result<(), String> {
    if s.len() > MAX_DNS_LABEL_LEN {
        return Err(format!(
            "must be no more than {} characters",
            MAX_DNS_LABEL_LEN
        ));
    }
    if !s
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err("may only contain alphanumerics, '-', '_' or '.'".to_string());
    }
    let first = s.chars().next();
    let last = s.chars().last();
    if !first.is_some_and(|c| c.is_ascii_alphanumeric())
        || !last.is_some_and(|c| c.is_ascii_alphanumeric())
    {
        return Err("must start and end with an alphanumeric character".to_string());
    }
    Ok(())
}
