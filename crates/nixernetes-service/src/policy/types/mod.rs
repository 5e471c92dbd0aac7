//! Policy type definitions
//!
//! - Kubernetes NetworkPolicy (L3/L4 default-deny with explicit allows)
//! - RBAC rules, role references and subjects

mod network_policy;
mod rbac;

pub use network_policy::{
    IpBlock, NetworkPolicyEgressRule, NetworkPolicyIngressRule, NetworkPolicyPeer,
    NetworkPolicyPort, NetworkPolicySpec,
};
pub use rbac::{PolicyRule, RoleRef, Subject, RBAC_API_GROUP};
