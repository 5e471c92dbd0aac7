//! Structural validation of Kubernetes documents
//!
//! The validator never stops at the first problem: every violation found in
//! a document is collected into its [`ValidationResult`]. Documents are
//! validated independently, so batch results line up with their inputs.

use serde::{Serialize, Serializer};
use serde_json::Value;

use nixernetes_common::declaration::{ComplianceLevel, KNOWN_FRAMEWORKS};
use nixernetes_common::meta::{
    validate_dns_label, validate_label_key, validate_label_value, validate_path_segment_name,
    MAX_DNS_LABEL_LEN,
};
use nixernetes_common::{Error, LABEL_COMPLIANCE_LEVEL, LABEL_FRAMEWORK};

use crate::resource::{GeneratedResource, ResourceKind};
use crate::version::VersionResolver;

/// Grammar for resource and namespace names
pub const DNS_LABEL_PATTERN: &str = "^[a-z0-9]([-a-z0-9]*[a-z0-9])?$";

/// A single problem found on a resource. Renders as `<field path>: <rule>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Violation {
    /// Missing or malformed field
    Schema {
        /// Field path
        path: String,
        /// Rule that was violated
        rule: String,
    },
    /// Stated apiVersion differs from the version table
    VersionMismatch {
        /// Resource kind
        kind: String,
        /// Target Kubernetes version
        version: String,
        /// apiVersion from the table
        expected: String,
        /// apiVersion on the resource
        found: String,
    },
    /// Kind is not in the supported set
    UnsupportedKind {
        /// The kind as written
        kind: String,
    },
    /// Target version is not in the supported set
    UnsupportedVersion {
        /// The version as requested
        version: String,
    },
    /// Compliance profile requirement not met
    Compliance {
        /// Field path
        path: String,
        /// Requirement that was not met
        rule: String,
    },
}

impl Violation {
    /// Missing or malformed field
    pub fn schema(path: impl Into<String>, rule: impl Into<String>) -> Self {
        Self::Schema {
            path: path.into(),
            rule: rule.into(),
        }
    }

    /// Compliance requirement not met
    pub fn compliance(path: impl Into<String>, rule: impl Into<String>) -> Self {
        Self::Compliance {
            path: path.into(),
            rule: rule.into(),
        }
    }

    /// Convert a resolver error into a collected violation
    pub fn from_resolver_error(err: &Error) -> Self {
        match err {
            Error::UnsupportedKind { kind, .. } => Self::UnsupportedKind { kind: kind.clone() },
            Error::UnsupportedVersion { version, .. } => Self::UnsupportedVersion {
                version: version.clone(),
            },
            other => Self::schema("apiVersion", other.to_string()),
        }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Schema { path, rule } | Self::Compliance { path, rule } => {
                write!(f, "{}: {}", path, rule)
            }
            Self::VersionMismatch {
                kind,
                version,
                expected,
                found,
            } => write!(
                f,
                "apiVersion: must be {} for {} on Kubernetes {} (found {})",
                expected, kind, version, found
            ),
            Self::UnsupportedKind { kind } => write!(f, "kind: {} is not a supported kind", kind),
            Self::UnsupportedVersion { version } => {
                write!(f, "apiVersion: Kubernetes {} is not a supported target", version)
            }
        }
    }
}

impl Serialize for Violation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Identifies the resource a result belongs to
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct ResourceRef {
    /// Kind as written (may be unsupported)
    pub kind: String,
    /// metadata.name, empty when missing
    pub name: String,
    /// metadata.namespace
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl std::fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.kind, self.name)
    }
}

/// Outcome of validating one resource
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct ValidationResult {
    /// The resource validated
    pub resource: ResourceRef,
    /// True when `errors` is empty
    pub valid: bool,
    /// Every violation found
    pub errors: Vec<Violation>,
    /// Non-fatal findings
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// A passing result for a resource
    pub fn new(resource: ResourceRef) -> Self {
        Self {
            resource,
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Record a violation
    pub fn push_error(&mut self, violation: Violation) {
        self.valid = false;
        self.errors.push(violation);
    }

    /// Record a warning
    pub fn push_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Error messages as strings
    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }
}

/// Validates documents against the structural rules of one target version
#[derive(Clone, Debug)]
pub struct ManifestValidator {
    resolver: &'static VersionResolver,
    target_version: String,
}

impl ManifestValidator {
    /// Validator for a target Kubernetes version using the shared table
    pub fn new(target_version: impl Into<String>) -> Self {
        Self {
            resolver: VersionResolver::global(),
            target_version: target_version.into(),
        }
    }

    /// Target version this validator checks against
    pub fn target_version(&self) -> &str {
        &self.target_version
    }

    /// Validate a generated resource
    pub fn validate(&self, resource: &GeneratedResource) -> ValidationResult {
        match resource.to_value() {
            Ok(doc) => self.validate_value(&doc),
            Err(err) => {
                let mut result = ValidationResult::new(ResourceRef {
                    kind: resource.kind.to_string(),
                    name: resource.metadata.name.clone(),
                    namespace: resource.metadata.namespace.clone(),
                });
                result.push_error(Violation::schema("<document>", err.to_string()));
                result
            }
        }
    }

    /// Validate each resource independently, preserving input order
    pub fn validate_all(&self, resources: &[GeneratedResource]) -> Vec<ValidationResult> {
        resources.iter().map(|r| self.validate(r)).collect()
    }

    /// Validate a raw document
    pub fn validate_value(&self, doc: &Value) -> ValidationResult {
        let mut result = ValidationResult::new(resource_ref(doc));

        if !doc.is_object() {
            result.push_error(Violation::schema("<document>", "must be a mapping"));
            return result;
        }

        let kind = self.check_kind(doc, &mut result);
        let api_version = check_string(doc, "apiVersion", &mut result);
        self.check_metadata(doc, kind, &mut result);

        if let Some(kind) = kind {
            check_required_fields(doc, kind, &mut result);
            if kind.has_pod_template() {
                check_containers(doc, &mut result);
            }
            if let Some(found) = api_version {
                self.check_api_version(kind, found, &mut result);
            }
        }

        result
    }

    fn check_kind(&self, doc: &Value, result: &mut ValidationResult) -> Option<ResourceKind> {
        let kind = check_string(doc, "kind", result)?;
        match kind.parse::<ResourceKind>() {
            Ok(kind) => Some(kind),
            Err(_) => {
                result.push_error(Violation::UnsupportedKind {
                    kind: kind.to_string(),
                });
                None
            }
        }
    }

    fn check_api_version(&self, kind: ResourceKind, found: &str, result: &mut ValidationResult) {
        match self.resolver.resolve_kind(kind, &self.target_version) {
            Ok(expected) if expected != found => result.push_error(Violation::VersionMismatch {
                kind: kind.to_string(),
                version: self.target_version.clone(),
                expected: expected.to_string(),
                found: found.to_string(),
            }),
            Ok(_) => {}
            Err(err) => result.push_error(Violation::from_resolver_error(&err)),
        }
    }

    fn check_metadata(&self, doc: &Value, kind: Option<ResourceKind>, result: &mut ValidationResult) {
        let Some(metadata) = doc.get("metadata") else {
            result.push_error(Violation::schema("metadata", "required field is missing"));
            return;
        };
        if !metadata.is_object() {
            result.push_error(Violation::schema("metadata", "must be an object"));
            return;
        }

        match metadata.get("name") {
            None => result.push_error(Violation::schema("metadata.name", "required field is missing")),
            Some(Value::String(name)) if kind.is_some_and(|k| k.has_path_segment_name()) => {
                if let Err(e) = validate_path_segment_name(name) {
                    result.push_error(Violation::schema("metadata.name", e));
                }
            }
            Some(Value::String(name)) => check_dns_label("metadata.name", name, result),
            Some(_) => result.push_error(Violation::schema("metadata.name", "must be a string")),
        }

        match metadata.get("namespace") {
            None => {}
            Some(Value::String(namespace)) => {
                check_dns_label("metadata.namespace", namespace, result);
                if kind.is_some_and(|k| !k.is_namespaced()) {
                    result.push_warning(format!(
                        "metadata.namespace: ignored on cluster-scoped kind {}",
                        result.resource.kind
                    ));
                }
            }
            Some(_) => result.push_error(Violation::schema("metadata.namespace", "must be a string")),
        }

        check_string_map(metadata, "labels", true, result);
        check_string_map(metadata, "annotations", false, result);
        check_compliance_labels(metadata, result);
    }
}

fn resource_ref(doc: &Value) -> ResourceRef {
    let text = |v: Option<&Value>| v.and_then(Value::as_str).map(str::to_string);
    ResourceRef {
        kind: text(doc.get("kind")).unwrap_or_default(),
        name: text(doc.pointer("/metadata/name")).unwrap_or_default(),
        namespace: text(doc.pointer("/metadata/namespace")),
    }
}

/// Look up a dot separated path
fn lookup<'v>(doc: &'v Value, path: &str) -> Option<&'v Value> {
    path.split('.').try_fold(doc, |value, key| value.get(key))
}

fn check_string<'v>(doc: &'v Value, path: &str, result: &mut ValidationResult) -> Option<&'v str> {
    match lookup(doc, path) {
        None => {
            result.push_error(Violation::schema(path, "required field is missing"));
            None
        }
        Some(Value::String(s)) if s.is_empty() => {
            result.push_error(Violation::schema(path, "must not be empty"));
            None
        }
        Some(Value::String(s)) => Some(s.as_str()),
        Some(_) => {
            result.push_error(Violation::schema(path, "must be a string"));
            None
        }
    }
}

fn check_dns_label(path: &str, value: &str, result: &mut ValidationResult) {
    if value.len() > MAX_DNS_LABEL_LEN {
        result.push_error(Violation::schema(
            path,
            format!("must be no more than {} characters", MAX_DNS_LABEL_LEN),
        ));
    } else if validate_dns_label(value).is_err() {
        result.push_error(Violation::schema(path, format!("must match {}", DNS_LABEL_PATTERN)));
    }
}

fn check_string_map(metadata: &Value, field: &str, check_values: bool, result: &mut ValidationResult) {
    let Some(map) = metadata.get(field) else {
        return;
    };
    let Some(map) = map.as_object() else {
        result.push_error(Violation::schema(format!("metadata.{}", field), "must be an object"));
        return;
    };
    for (key, value) in map {
        let path = format!("metadata.{}.{}", field, key);
        if let Err(e) = validate_label_key(key) {
            result.push_error(Violation::schema(&path, e));
        }
        match value.as_str() {
            None => result.push_error(Violation::schema(&path, "must be a string")),
            Some(v) if check_values => {
                if let Err(e) = validate_label_value(v) {
                    result.push_error(Violation::schema(&path, e));
                }
            }
            Some(_) => {}
        }
    }
}

fn check_compliance_labels(metadata: &Value, result: &mut ValidationResult) {
    let label = |key: &str| {
        metadata
            .get("labels")
            .and_then(|labels| labels.get(key))
            .and_then(Value::as_str)
    };

    if let Some(framework) = label(LABEL_FRAMEWORK) {
        if !KNOWN_FRAMEWORKS
            .iter()
            .any(|known| known.eq_ignore_ascii_case(framework))
        {
            result.push_warning(format!(
                "metadata.labels.{}: unknown framework '{}' (known: {})",
                LABEL_FRAMEWORK,
                framework,
                KNOWN_FRAMEWORKS.join(", ")
            ));
        }
    }

    if let Some(level) = label(LABEL_COMPLIANCE_LEVEL) {
        if let Err(e) = level.parse::<ComplianceLevel>() {
            result.push_error(Violation::schema(
                format!("metadata.labels.{}", LABEL_COMPLIANCE_LEVEL),
                e.to_string(),
            ));
        }
    }
}

fn check_required_fields(doc: &Value, kind: ResourceKind, result: &mut ValidationResult) {
    for required in kind.required_fields() {
        match lookup(doc, required.path) {
            None | Some(Value::Null) => {
                result.push_error(Violation::schema(required.path, "required field is missing"))
            }
            Some(value) if !required.field_type.matches(value) => {
                result.push_error(Violation::schema(required.path, required.field_type.rule()))
            }
            Some(_) => {}
        }
    }
}

fn check_containers(doc: &Value, result: &mut ValidationResult) {
    let Some(containers) = lookup(doc, "spec.template.spec.containers").and_then(Value::as_array) else {
        return;
    };
    for (i, container) in containers.iter().enumerate() {
        for field in ["name", "image"] {
            let path = format!("spec.template.spec.containers[{}].{}", i, field);
            match container.get(field) {
                Some(Value::String(s)) if !s.is_empty() => {}
                Some(Value::String(_)) => result.push_error(Violation::schema(path, "must not be empty")),
                Some(_) => result.push_error(Violation::schema(path, "must be a string")),
                None => result.push_error(Violation::schema(path, "required field is missing")),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn deployment() -> Value {
        json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {
                "name": "api",
                "namespace": "default",
                "labels": {"app.kubernetes.io/name": "api"}
            },
            "spec": {
                "selector": {"matchLabels": {"app.kubernetes.io/name": "api"}},
                "template": {
                    "metadata": {"labels": {"app.kubernetes.io/name": "api"}},
                    "spec": {"containers": [{"name": "api", "image": "api:1"}]}
                }
            }
        })
    }

    fn paths(result: &ValidationResult) -> Vec<String> {
        result
            .errors
            .iter()
            .map(|e| e.to_string().split(": ").next().unwrap_or_default().to_string())
            .collect()
    }

    #[test]
    fn valid_deployment_passes() {
        let result = ManifestValidator::new("1.30").validate_value(&deployment());
        assert!(result.valid, "{:?}", result.errors);
        assert_eq!(result.resource.to_string(), "Deployment/api");
    }

    #[test]
    fn collects_every_missing_field() {
        let mut doc = deployment();
        let spec = doc["spec"].as_object_mut().unwrap();
        spec.remove("selector");
        spec.remove("template");

        let result = ManifestValidator::new("1.30").validate_value(&doc);
        assert!(!result.valid);
        let paths = paths(&result);
        assert!(paths.contains(&"spec.selector".to_string()));
        assert!(paths.contains(&"spec.template".to_string()));
    }

    #[test]
    fn invalid_name_reports_grammar() {
        let mut doc = deployment();
        doc["metadata"]["name"] = json!("My_App");
        let result = ManifestValidator::new("1.30").validate_value(&doc);
        assert_eq!(
            result.errors,
            vec![Violation::schema(
                "metadata.name",
                format!("must match {}", DNS_LABEL_PATTERN)
            )]
        );
        assert_eq!(
            result.errors[0].to_string(),
            "metadata.name: must match ^[a-z0-9]([-a-z0-9]*[a-z0-9])?$"
        );
    }

    #[test]
    fn long_name_reports_length() {
        let mut doc = deployment();
        doc["metadata"]["name"] = json!("a".repeat(64));
        let result = ManifestValidator::new("1.30").validate_value(&doc);
        assert_eq!(
            result.error_messages(),
            vec!["metadata.name: must be no more than 63 characters"]
        );
    }

    #[test]
    fn non_string_name_is_a_type_error() {
        let mut doc = deployment();
        doc["metadata"]["name"] = json!(42);
        let result = ManifestValidator::new("1.30").validate_value(&doc);
        assert_eq!(result.error_messages(), vec!["metadata.name: must be a string"]);
    }

    #[test]
    fn api_version_mismatch_is_reported_not_corrected() {
        let mut doc = deployment();
        doc["apiVersion"] = json!("extensions/v1beta1");
        let result = ManifestValidator::new("1.30").validate_value(&doc);
        assert!(matches!(
            &result.errors[..],
            [Violation::VersionMismatch { expected, found, .. }]
                if expected == "apps/v1" && found == "extensions/v1beta1"
        ));
    }

    #[test]
    fn unsupported_target_is_collected() {
        let result = ManifestValidator::new("1.12").validate_value(&deployment());
        assert_eq!(
            result.errors,
            vec![Violation::UnsupportedVersion {
                version: "1.12".into()
            }]
        );
    }

    #[test]
    fn unsupported_kind_is_collected_with_metadata_errors() {
        let doc = json!({"apiVersion": "v1", "kind": "Pod", "metadata": {"name": "Bad"}});
        let result = ManifestValidator::new("1.30").validate_value(&doc);
        assert_eq!(result.errors.len(), 2);
        assert_eq!(result.errors[0], Violation::UnsupportedKind { kind: "Pod".into() });
    }

    #[test]
    fn containers_need_name_and_image() {
        let mut doc = deployment();
        doc["spec"]["template"]["spec"]["containers"] = json!([{"name": "api"}]);
        let result = ManifestValidator::new("1.30").validate_value(&doc);
        assert_eq!(
            result.error_messages(),
            vec!["spec.template.spec.containers[0].image: required field is missing"]
        );
    }

    #[test]
    fn network_policy_requires_pod_selector_and_policy_types() {
        let doc = json!({
            "apiVersion": "networking.k8s.io/v1",
            "kind": "NetworkPolicy",
            "metadata": {"name": "api-default-deny", "namespace": "default"},
            "spec": {}
        });
        let result = ManifestValidator::new("1.30").validate_value(&doc);
        let paths = paths(&result);
        assert_eq!(paths, vec!["spec.podSelector", "spec.policyTypes"]);
    }

    #[test]
    fn bindings_require_role_ref_and_subjects() {
        let doc = json!({
            "apiVersion": "rbac.authorization.k8s.io/v1",
            "kind": "RoleBinding",
            "metadata": {"name": "api", "namespace": "default"},
            "subjects": []
        });
        let result = ManifestValidator::new("1.30").validate_value(&doc);
        assert_eq!(
            result.error_messages(),
            vec![
                "roleRef: required field is missing",
                "subjects: must be a non-empty array"
            ]
        );
    }

    #[test]
    fn cluster_role_names_may_contain_colons() {
        let role = |name: &str| {
            json!({
                "apiVersion": "rbac.authorization.k8s.io/v1",
                "kind": "ClusterRole",
                "metadata": {"name": name},
                "rules": [{"apiGroups": [""], "resources": ["events"], "verbs": ["get"]}]
            })
        };
        let validator = ManifestValidator::new("1.30");
        assert!(validator.validate_value(&role("nixernetes:audit-log-reader")).valid);

        let result = validator.validate_value(&role("audit/reader"));
        assert_eq!(paths(&result), vec!["metadata.name"]);
    }

    #[test]
    fn kyverno_policies_require_rules() {
        let policy = |kind: &str, spec: Value| {
            json!({
                "apiVersion": "kyverno.io/v1",
                "kind": kind,
                "metadata": {"name": "require-digests", "namespace": "shop"},
                "spec": spec
            })
        };
        let validator = ManifestValidator::new("1.30");
        let rules = json!({"rules": [{"name": "digest", "match": {}, "validate": {}}]});

        let namespaced = validator.validate_value(&policy("Policy", rules.clone()));
        assert!(namespaced.valid, "{:?}", namespaced.errors);
        assert!(namespaced.warnings.is_empty());

        let cluster = validator.validate_value(&policy("ClusterPolicy", rules));
        assert!(cluster.valid);
        assert!(cluster.warnings[0].contains("cluster-scoped kind ClusterPolicy"));

        let empty = validator.validate_value(&policy("ClusterPolicy", json!({"rules": []})));
        assert_eq!(empty.error_messages(), vec!["spec.rules: must be a non-empty array"]);

        let missing = validator.validate_value(&policy("Policy", json!({})));
        assert_eq!(missing.error_messages(), vec!["spec.rules: required field is missing"]);
    }

    #[test]
    fn kyverno_policy_api_version_is_checked() {
        let doc = json!({
            "apiVersion": "kyverno.io/v2beta1",
            "kind": "ClusterPolicy",
            "metadata": {"name": "require-digests"},
            "spec": {"rules": [{"name": "digest"}]}
        });
        let result = ManifestValidator::new("1.30").validate_value(&doc);
        assert!(matches!(
            &result.errors[..],
            [Violation::VersionMismatch { expected, .. }] if expected == "kyverno.io/v1"
        ));
    }

    #[test]
    fn bad_label_value_is_an_error() {
        let mut doc = deployment();
        doc["metadata"]["labels"]["team"] = json!("platform team");
        let result = ManifestValidator::new("1.30").validate_value(&doc);
        assert!(!result.valid);
        assert!(result.errors[0].to_string().starts_with("metadata.labels.team:"));
    }

    #[test]
    fn unknown_framework_is_only_a_warning() {
        let mut doc = deployment();
        doc["metadata"]["labels"]["nixernetes.io/framework"] = json!("FEDRAMP");
        let result = ManifestValidator::new("1.30").validate_value(&doc);
        assert!(result.valid);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("FEDRAMP"));
    }

    #[test]
    fn unknown_compliance_level_label_is_an_error() {
        let mut doc = deployment();
        doc["metadata"]["labels"]["nixernetes.io/compliance-level"] = json!("extreme");
        let result = ManifestValidator::new("1.30").validate_value(&doc);
        assert!(!result.valid);
    }

    #[test]
    fn non_mapping_document_fails_early() {
        let result = ManifestValidator::new("1.30").validate_value(&json!(["not", "a", "map"]));
        assert_eq!(result.error_messages(), vec!["<document>: must be a mapping"]);
    }

    #[test]
    fn validate_all_preserves_order() {
        use nixernetes_common::meta::ObjectMeta;
        use crate::resource::Provenance;

        let make = |name: &str| {
            GeneratedResource::new(
                ResourceKind::ServiceAccount,
                "v1",
                ObjectMeta::new(name, "default"),
                Provenance::Rbac,
            )
        };
        let resources = vec![make("b"), make("BAD"), make("a")];
        let results = ManifestValidator::new("1.30").validate_all(&resources);
        let names: Vec<_> = results.iter().map(|r| r.resource.name.as_str()).collect();
        assert_eq!(names, vec!["b", "BAD", "a"]);
        assert_eq!(
            results.iter().map(|r| r.valid).collect::<Vec<_>>(),
            vec![true, false, true]
        );
    }

    #[test]
    fn violations_serialize_as_strings() {
        let mut result = ValidationResult::new(ResourceRef::default());
        result.push_error(Violation::schema("spec.ports", "required field is missing"));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["errors"][0], "spec.ports: required field is missing");
        assert_eq!(json["valid"], false);
    }
}
