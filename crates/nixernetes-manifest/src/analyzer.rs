//! Validation of complete multi-document manifests
//!
//! Runs the [`ManifestValidator`] over every document, then checks what
//! only makes sense across documents: namespaces that are used but never
//! defined, and `kubectl apply` ordering.

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use nixernetes_common::yaml::{parse_documents, YamlError};
use nixernetes_common::DEFAULT_NAMESPACE;

use crate::ordering::check_apply_order;
use crate::validator::{ManifestValidator, ValidationResult};

/// Findings for one manifest
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ManifestReport {
    /// No per-document errors and no manifest-level errors
    pub valid: bool,
    /// Documents are in apply order
    pub ordered: bool,
    /// Number of non-empty documents
    pub resource_count: usize,
    /// Per-document results, in document order
    pub results: Vec<ValidationResult>,
    /// Cross-document errors
    pub manifest_errors: Vec<String>,
    /// Out-of-order documents
    pub ordering_issues: Vec<String>,
}

impl ManifestReport {
    /// Valid and ordered
    pub fn is_clean(&self) -> bool {
        self.valid && self.ordered
    }
}

/// Validates manifests for one target version
#[derive(Clone, Debug)]
pub struct ManifestAnalyzer {
    validator: ManifestValidator,
    require_defined_namespaces: bool,
}

impl ManifestAnalyzer {
    /// Analyzer that requires every non-default namespace to be defined in the manifest
    pub fn new(validator: ManifestValidator) -> Self {
        Self {
            validator,
            require_defined_namespaces: true,
        }
    }

    /// Accept namespaces created outside the manifest
    pub fn allow_external_namespaces(mut self) -> Self {
        self.require_defined_namespaces = false;
        self
    }

    /// Parse and analyze multi-document YAML
    pub fn analyze(&self, input: &str) -> Result<ManifestReport, YamlError> {
        let docs = parse_documents(input)?;
        Ok(self.analyze_documents(&docs))
    }

    /// Analyze already parsed documents
    pub fn analyze_documents(&self, docs: &[Value]) -> ManifestReport {
        let results: Vec<ValidationResult> =
            docs.iter().map(|doc| self.validator.validate_value(doc)).collect();

        let manifest_errors = if self.require_defined_namespaces {
            undefined_namespaces(&results)
        } else {
            Vec::new()
        };
        let ordering_issues = check_apply_order(docs);

        debug!(
            documents = docs.len(),
            invalid = results.iter().filter(|r| !r.valid).count(),
            "manifest analyzed"
        );

        ManifestReport {
            valid: manifest_errors.is_empty() && results.iter().all(|r| r.valid),
            ordered: ordering_issues.is_empty(),
            resource_count: docs.len(),
            results,
            manifest_errors,
            ordering_issues,
        }
    }
}

fn undefined_namespaces(results: &[ValidationResult]) -> Vec<String> {
    let defined: BTreeSet<&str> = results
        .iter()
        .filter(|r| r.resource.kind == "Namespace")
        .map(|r| r.resource.name.as_str())
        .collect();

    results
        .iter()
        .filter_map(|r| {
            let namespace = r.resource.namespace.as_deref()?;
            (namespace != DEFAULT_NAMESPACE && !defined.contains(namespace)).then(|| {
                format!(
                    "{} references namespace '{}' which is not defined",
                    r.resource, namespace
                )
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"
apiVersion: v1
kind: Namespace
metadata:
  name: example
---
apiVersion: apps/v1
kind: Deployment
metadata:
  name: web-app
  namespace: example
spec:
  selector:
    matchLabels:
      app.kubernetes.io/name: web-app
  template:
    metadata:
      labels:
        app.kubernetes.io/name: web-app
    spec:
      containers:
      - name: web-app
        image: nginx:1.25
---
apiVersion: networking.k8s.io/v1
kind: NetworkPolicy
metadata:
  name: web-app-default-deny
  namespace: example
spec:
  podSelector:
    matchLabels:
      app.kubernetes.io/name: web-app
  policyTypes:
  - Ingress
"#;

    fn analyzer() -> ManifestAnalyzer {
        ManifestAnalyzer::new(ManifestValidator::new("1.30"))
    }

    #[test]
    fn well_formed_manifest_is_clean() {
        let report = analyzer().analyze(MANIFEST).unwrap();
        assert!(report.is_clean(), "{:?}", report);
        assert_eq!(report.resource_count, 3);
    }

    #[test]
    fn undefined_namespace_is_a_manifest_error() {
        let input = MANIFEST.replacen("name: example\n", "name: other\n", 1);
        let report = analyzer().analyze(&input).unwrap();
        assert!(!report.valid);
        assert_eq!(report.manifest_errors.len(), 2);
        assert!(report.manifest_errors[0].contains("Deployment/web-app"));
    }

    #[test]
    fn external_namespaces_can_be_allowed() {
        let input = MANIFEST.replacen("name: example\n", "name: other\n", 1);
        let report = analyzer().allow_external_namespaces().analyze(&input).unwrap();
        assert!(report.valid);
    }

    #[test]
    fn default_namespace_never_needs_definition() {
        let input = "apiVersion: v1\nkind: ServiceAccount\nmetadata:\n  name: api\n  namespace: default\n";
        let report = analyzer().analyze(input).unwrap();
        assert!(report.valid);
    }

    #[test]
    fn reversed_manifest_is_valid_but_unordered() {
        let mut docs: Vec<&str> = MANIFEST.split("---").collect();
        docs.reverse();
        let report = analyzer().analyze(&docs.join("---")).unwrap();
        assert!(report.valid);
        assert!(!report.ordered);
        assert_eq!(report.ordering_issues.len(), 2);
    }

    #[test]
    fn invalid_document_is_reported_in_place() {
        let input = format!("{}---\napiVersion: v1\nkind: Service\nmetadata:\n  name: web\n  namespace: example\n", MANIFEST);
        let report = analyzer().analyze(&input).unwrap();
        assert!(!report.valid);
        assert!(report.results[..3].iter().all(|r| r.valid));
        assert_eq!(report.results[3].errors.len(), 2);
    }

    #[test]
    fn kyverno_policy_is_checked_for_rules_and_order() {
        let policy = "apiVersion: kyverno.io/v1\nkind: Policy\nmetadata:\n  name: require-digests\n  namespace: example\nspec:\n  rules:\n  - name: digest\n";
        let report = analyzer().analyze(&format!("{}---\n{}", MANIFEST, policy)).unwrap();
        assert!(report.is_clean(), "{:?}", report);
        assert_eq!(report.resource_count, 4);

        let before_workloads = MANIFEST.replacen("---", &format!("---\n{}---", policy), 1);
        let report = analyzer().analyze(&before_workloads).unwrap();
        assert!(report.valid);
        assert!(!report.ordered);

        let no_rules = policy.replace("  rules:\n  - name: digest\n", "  rules: []\n");
        let report = analyzer().analyze(&format!("{}---\n{}", MANIFEST, no_rules)).unwrap();
        assert!(!report.valid);
        assert_eq!(
            report.results[3].error_messages(),
            vec!["spec.rules: must be a non-empty array"]
        );
    }

    #[test]
    fn yaml_errors_are_returned() {
        assert!(analyzer().analyze("kind: [unterminated").is_err());
    }
}
