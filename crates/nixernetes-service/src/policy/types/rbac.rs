//! RBAC types for Roles, RoleBindings and ServiceAccounts

use serde::{Deserialize, Serialize};

/// API group of Role, ClusterRole and their bindings
pub const RBAC_API_GROUP: &str = "rbac.authorization.k8s.io";

/// One RBAC rule
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PolicyRule {
    /// API groups ("" is the core group)
    pub api_groups: Vec<String>,
    /// Resource types
    pub resources: Vec<String>,
    /// Named objects the rule is limited to
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_names: Vec<String>,
    /// Allowed verbs
    pub verbs: Vec<String>,
}

/// Role a binding grants
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoleRef {
    /// Always [`RBAC_API_GROUP`]
    pub api_group: String,
    /// Role or ClusterRole
    pub kind: String,
    /// Role name
    pub name: String,
}

/// Binding subject
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    /// Subject kind
    pub kind: String,
    /// Subject name
    pub name: String,
    /// Subject namespace
    pub namespace: String,
}

impl Subject {
    /// A ServiceAccount subject
    pub fn service_account(name: &str, namespace: &str) -> Self {
        Self {
            kind: "ServiceAccount".to_string(),
            name: name.to_string(),
            namespace: namespace.to_string(),
        }
    }
}

