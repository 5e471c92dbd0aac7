//! Generated resource envelope and the closed set of supported kinds

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use nixernetes_common::meta::ObjectMeta;
use nixernetes_common::Error;

/// JSON type a required field must have
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldType {
    /// JSON object
    Object,
    /// JSON array (must be non-empty)
    Array,
    /// JSON string
    String,
    /// JSON integer
    Integer,
}

impl FieldType {
    /// Whether a value satisfies this type
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::Object => value.is_object(),
            Self::Array => value.as_array().is_some_and(|a| !a.is_empty()),
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
        }
    }

    /// Rule text used in violations
    pub fn rule(&self) -> &'static str {
        match self {
            Self::Object => "must be an object",
            Self::Array => "must be a non-empty array",
            Self::String => "must be a string",
            Self::Integer => "must be an integer",
        }
    }
}

/// A field path that must be present for a kind, with its expected type
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RequiredField {
    /// Dot separated path from the document root
    pub path: &'static str,
    /// Expected JSON type
    pub field_type: FieldType,
}

const fn field(path: &'static str, field_type: FieldType) -> RequiredField {
    RequiredField { path, field_type }
}

const POD_CONTROLLER: &[RequiredField] = &[
    field("spec.selector", FieldType::Object),
    field("spec.template", FieldType::Object),
    field("spec.template.spec.containers", FieldType::Array),
];

const STATEFUL_SET: &[RequiredField] = &[
    field("spec.selector", FieldType::Object),
    field("spec.serviceName", FieldType::String),
    field("spec.template", FieldType::Object),
    field("spec.template.spec.containers", FieldType::Array),
];

const JOB: &[RequiredField] = &[
    field("spec.template", FieldType::Object),
    field("spec.template.spec.containers", FieldType::Array),
];

const CRON_JOB: &[RequiredField] = &[
    field("spec.schedule", FieldType::String),
    field("spec.jobTemplate", FieldType::Object),
];

const SERVICE: &[RequiredField] = &[
    field("spec.selector", FieldType::Object),
    field("spec.ports", FieldType::Array),
];

const NETWORK_POLICY: &[RequiredField] = &[
    field("spec.podSelector", FieldType::Object),
    field("spec.policyTypes", FieldType::Array),
];

const ROLE: &[RequiredField] = &[field("rules", FieldType::Array)];

const BINDING: &[RequiredField] = &[
    field("roleRef", FieldType::Object),
    field("subjects", FieldType::Array),
];

const INGRESS: &[RequiredField] = &[field("spec", FieldType::Object)];

const HPA: &[RequiredField] = &[
    field("spec.scaleTargetRef", FieldType::Object),
    field("spec.maxReplicas", FieldType::Integer),
];

const PDB: &[RequiredField] = &[field("spec.selector", FieldType::Object)];

const ADMISSION_POLICY: &[RequiredField] = &[field("spec", FieldType::Object)];

const FLOW_SCHEMA: &[RequiredField] = &[field("spec.priorityLevelConfiguration", FieldType::Object)];

const KYVERNO_POLICY: &[RequiredField] = &[field("spec.rules", FieldType::Array)];

/// Every Kubernetes kind the compiler knows how to emit or validate
#[derive(
    Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
pub enum ResourceKind {
    /// core/v1 Namespace
    Namespace,
    /// core/v1 ServiceAccount
    ServiceAccount,
    /// core/v1 ConfigMap
    ConfigMap,
    /// core/v1 Secret
    Secret,
    /// core/v1 Service
    Service,
    /// rbac Role
    Role,
    /// rbac RoleBinding
    RoleBinding,
    /// rbac ClusterRole
    ClusterRole,
    /// rbac ClusterRoleBinding
    ClusterRoleBinding,
    /// apps Deployment
    Deployment,
    /// apps StatefulSet
    StatefulSet,
    /// apps DaemonSet
    DaemonSet,
    /// batch Job
    Job,
    /// batch CronJob
    CronJob,
    /// networking Ingress
    Ingress,
    /// networking NetworkPolicy
    NetworkPolicy,
    /// autoscaling HorizontalPodAutoscaler
    HorizontalPodAutoscaler,
    /// policy PodDisruptionBudget
    PodDisruptionBudget,
    /// admissionregistration ValidatingAdmissionPolicy
    ValidatingAdmissionPolicy,
    /// flowcontrol FlowSchema
    FlowSchema,
    /// kyverno ClusterPolicy
    ClusterPolicy,
    /// kyverno Policy
    Policy,
}

impl ResourceKind {
    /// All supported kinds
    pub const ALL: [ResourceKind; 22] = [
        Self::Namespace,
        Self::ServiceAccount,
        Self::ConfigMap,
        Self::Secret,
        Self::Service,
        Self::Role,
        Self::RoleBinding,
        Self::ClusterRole,
        Self::ClusterRoleBinding,
        Self::Deployment,
        Self::StatefulSet,
        Self::DaemonSet,
        Self::Job,
        Self::CronJob,
        Self::Ingress,
        Self::NetworkPolicy,
        Self::HorizontalPodAutoscaler,
        Self::PodDisruptionBudget,
        Self::ValidatingAdmissionPolicy,
        Self::FlowSchema,
        Self::ClusterPolicy,
        Self::Policy,
    ];

    /// Kubernetes kind name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Namespace => "Namespace",
            Self::ServiceAccount => "ServiceAccount",
            Self::ConfigMap => "ConfigMap",
            Self::Secret => "Secret",
            Self::Service => "Service",
            Self::Role => "Role",
            Self::RoleBinding => "RoleBinding",
            Self::ClusterRole => "ClusterRole",
            Self::ClusterRoleBinding => "ClusterRoleBinding",
            Self::Deployment => "Deployment",
            Self::StatefulSet => "StatefulSet",
            Self::DaemonSet => "DaemonSet",
            Self::Job => "Job",
            Self::CronJob => "CronJob",
            Self::Ingress => "Ingress",
            Self::NetworkPolicy => "NetworkPolicy",
            Self::HorizontalPodAutoscaler => "HorizontalPodAutoscaler",
            Self::PodDisruptionBudget => "PodDisruptionBudget",
            Self::ValidatingAdmissionPolicy => "ValidatingAdmissionPolicy",
            Self::FlowSchema => "FlowSchema",
            Self::ClusterPolicy => "ClusterPolicy",
            Self::Policy => "Policy",
        }
    }

    /// Fields that must be present (with the right type) on this kind
    pub fn required_fields(&self) -> &'static [RequiredField] {
        match self {
            Self::Namespace | Self::ServiceAccount | Self::ConfigMap | Self::Secret => &[],
            Self::Deployment | Self::DaemonSet => POD_CONTROLLER,
            Self::StatefulSet => STATEFUL_SET,
            Self::Job => JOB,
            Self::CronJob => CRON_JOB,
            Self::Service => SERVICE,
            Self::NetworkPolicy => NETWORK_POLICY,
            Self::Role | Self::ClusterRole => ROLE,
            Self::RoleBinding | Self::ClusterRoleBinding => BINDING,
            Self::Ingress => INGRESS,
            Self::HorizontalPodAutoscaler => HPA,
            Self::PodDisruptionBudget => PDB,
            Self::ValidatingAdmissionPolicy => ADMISSION_POLICY,
            Self::FlowSchema => FLOW_SCHEMA,
            Self::ClusterPolicy | Self::Policy => KYVERNO_POLICY,
        }
    }

    /// Whether the kind lives inside a namespace
    pub fn is_namespaced(&self) -> bool {
        !matches!(
            self,
            Self::Namespace
                | Self::ClusterRole
                | Self::ClusterRoleBinding
                | Self::ValidatingAdmissionPolicy
                | Self::FlowSchema
                | Self::ClusterPolicy
        )
    }

    /// RBAC objects are named by path segment rather than DNS label, so
    /// names such as "system:auth-delegator" are accepted.
    pub fn has_path_segment_name(&self) -> bool {
        matches!(
            self,
            Self::Role | Self::RoleBinding | Self::ClusterRole | Self::ClusterRoleBinding
        )
    }

    /// Whether the kind runs pods from a pod template
    pub fn has_pod_template(&self) -> bool {
        matches!(
            self,
            Self::Deployment | Self::StatefulSet | Self::DaemonSet | Self::Job
        )
    }

    /// Position in `kubectl apply` order, lower first
    pub fn apply_order(&self) -> u8 {
        match self {
            Self::Namespace => 1,
            Self::ServiceAccount
            | Self::Role
            | Self::RoleBinding
            | Self::ClusterRole
            | Self::ClusterRoleBinding
            | Self::ValidatingAdmissionPolicy
            | Self::FlowSchema => 2,
            Self::ConfigMap | Self::Secret => 3,
            Self::Deployment
            | Self::StatefulSet
            | Self::DaemonSet
            | Self::Job
            | Self::CronJob => 4,
            Self::Service => 5,
            Self::Ingress | Self::HorizontalPodAutoscaler | Self::PodDisruptionBudget => 6,
            Self::NetworkPolicy | Self::ClusterPolicy | Self::Policy => 7,
        }
    }
}

impl std::str::FromStr for ResourceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|kind| kind.as_str() == s)
            .copied()
            .ok_or_else(|| Error::UnsupportedKind {
                kind: s.to_string(),
                version: "any".to_string(),
            })
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which generator produced a resource
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Provenance {
    /// Workload and service resources
    #[default]
    Workload,
    /// NetworkPolicies
    Policy,
    /// ServiceAccount, Role and bindings
    Rbac,
    /// Resources created only to carry metadata (managed Namespaces)
    InjectedMetadata,
}

impl Provenance {
    /// Value written to `nixernetes.io/module`
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Workload => "workload",
            Self::Policy => "policy",
            Self::Rbac => "rbac",
            Self::InjectedMetadata => "injected-metadata",
        }
    }
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One Kubernetes object produced by the compiler.
///
/// Everything besides apiVersion, kind and metadata lives in `body`
/// ("spec" for most kinds, "rules" for Roles, "roleRef"/"subjects" for
/// bindings) and is flattened into the top level when serialized.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedResource {
    /// API version
    pub api_version: String,
    /// Kind
    pub kind: ResourceKind,
    /// Metadata
    pub metadata: ObjectMeta,
    /// Kind-specific top-level fields
    #[serde(flatten)]
    pub body: Map<String, Value>,
    /// Generator that produced this resource
    #[serde(skip)]
    pub provenance: Provenance,
}

impl GeneratedResource {
    /// Create a resource with an empty body
    pub fn new(
        kind: ResourceKind,
        api_version: impl Into<String>,
        metadata: ObjectMeta,
        provenance: Provenance,
    ) -> Self {
        Self {
            api_version: api_version.into(),
            kind,
            metadata,
            body: Map::new(),
            provenance,
        }
    }

    /// Set a top-level field from any serializable value
    pub fn with_field<T: Serialize>(mut self, key: &str, value: &T) -> Result<Self, Error> {
        let value = serde_json::to_value(value)
            .map_err(|e| Error::serialization_for(self.kind.as_str(), e.to_string()))?;
        self.body.insert(key.to_string(), value);
        Ok(self)
    }

    /// Set `spec` from any serializable value
    pub fn with_spec<T: Serialize>(self, spec: &T) -> Result<Self, Error> {
        self.with_field("spec", spec)
    }

    /// The `spec` field, if present
    pub fn spec(&self) -> Option<&Value> {
        self.body.get("spec")
    }

    /// "Kind/name"
    pub fn reference(&self) -> String {
        format!("{}/{}", self.kind, self.metadata.name)
    }

    /// Full JSON document
    pub fn to_value(&self) -> Result<Value, Error> {
        serde_json::to_value(self).map_err(|e| Error::serialization_for(self.kind.as_str(), e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kind_names_round_trip_through_from_str() {
        for kind in ResourceKind::ALL {
            assert_eq!(kind.as_str().parse::<ResourceKind>().unwrap(), kind);
        }
    }

    #[test]
    fn unknown_kind_is_unsupported() {
        assert!(matches!(
            "Pod".parse::<ResourceKind>(),
            Err(Error::UnsupportedKind { .. })
        ));
    }

    #[test]
    fn namespace_sorts_first_and_network_policy_last() {
        let max = ResourceKind::ALL.iter().map(|k| k.apply_order()).max().unwrap();
        let min = ResourceKind::ALL.iter().map(|k| k.apply_order()).min().unwrap();
        assert_eq!(ResourceKind::Namespace.apply_order(), min);
        assert_eq!(ResourceKind::NetworkPolicy.apply_order(), max);
        assert!(ResourceKind::ServiceAccount.apply_order() < ResourceKind::Deployment.apply_order());
        assert!(ResourceKind::Deployment.apply_order() < ResourceKind::Service.apply_order());
    }

    #[test]
    fn kyverno_policies_apply_with_network_policies() {
        for kind in [ResourceKind::ClusterPolicy, ResourceKind::Policy] {
            assert_eq!(kind.apply_order(), ResourceKind::NetworkPolicy.apply_order());
            assert_eq!(kind.required_fields()[0].path, "spec.rules");
            assert_eq!(kind.required_fields()[0].field_type, FieldType::Array);
        }
        assert!(!ResourceKind::ClusterPolicy.is_namespaced());
        assert!(ResourceKind::Policy.is_namespaced());
    }

    #[test]
    fn deployment_requires_selector_and_template() {
        let paths: Vec<_> = ResourceKind::Deployment
            .required_fields()
            .iter()
            .map(|f| f.path)
            .collect();
        assert!(paths.contains(&"spec.selector"));
        assert!(paths.contains(&"spec.template"));
    }

    #[test]
    fn serializes_flat_with_body_fields() {
        let resource = GeneratedResource::new(
            ResourceKind::Role,
            "rbac.authorization.k8s.io/v1",
            ObjectMeta::new("api-config-reader", "default"),
            Provenance::Rbac,
        )
        .with_field("rules", &json!([{"verbs": ["get"]}]))
        .unwrap();

        let value = resource.to_value().unwrap();
        assert_eq!(value["apiVersion"], "rbac.authorization.k8s.io/v1");
        assert_eq!(value["kind"], "Role");
        assert_eq!(value["rules"][0]["verbs"][0], "get");
        assert!(value.get("provenance").is_none());
        assert_eq!(resource.reference(), "Role/api-config-reader");
    }

    #[test]
    fn empty_arrays_do_not_satisfy_array_fields() {
        assert!(!FieldType::Array.matches(&json!([])));
        assert!(FieldType::Array.matches(&json!([1])));
        assert!(FieldType::Integer.matches(&json!(3)));
        assert!(!FieldType::Integer.matches(&json!("3")));
    }
}
