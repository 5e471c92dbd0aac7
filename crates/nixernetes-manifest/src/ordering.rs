//! `kubectl apply` ordering
//!
//! Namespace, then ServiceAccount/RBAC, ConfigMap/Secret, workloads,
//! Services, Ingress-tier objects and finally NetworkPolicies alongside
//! Kyverno policies. Resources of equal priority keep their relative order.

use serde_json::Value;

use crate::resource::{GeneratedResource, ResourceKind};

/// Priority given to kinds outside the supported set
pub const UNKNOWN_KIND_PRIORITY: u8 = 99;

/// Apply priority of a kind name
pub fn priority_of(kind: &str) -> u8 {
    kind.parse::<ResourceKind>()
        .map(|k| k.apply_order())
        .unwrap_or(UNKNOWN_KIND_PRIORITY)
}

/// Stable sort into apply order
pub fn sort_for_apply(resources: &mut [GeneratedResource]) {
    resources.sort_by_key(|r| r.kind.apply_order());
}

/// Report every document that appears after one with a higher priority
pub fn check_apply_order(docs: &[Value]) -> Vec<String> {
    let mut issues = Vec::new();
    let mut highest = 0u8;
    for (index, doc) in docs.iter().enumerate() {
        let kind = doc.get("kind").and_then(Value::as_str).unwrap_or("<unknown>");
        let priority = priority_of(kind);
        if priority < highest {
            issues.push(format!(
                "document {}: {} (priority {}) must come before priority {} resources",
                index, kind, priority, highest
            ));
        }
        highest = highest.max(priority);
    }
    issues
}
