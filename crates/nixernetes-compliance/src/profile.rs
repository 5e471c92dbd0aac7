use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use nixernetes_common::declaration::ComplianceLevel;

/// Pod Security Admission level enforced on the application's namespace
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum PodSecurityLevel {
    /// Minimally restrictive, prevents known privilege escalations
    #[default]
    Baseline,
    /// Hardened pod configuration
    Restricted,
}

impl PodSecurityLevel {
    /// Value for `pod-security.kubernetes.io/enforce`
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Baseline => "baseline",
            Self::Restricted => "restricted",
        }
    }
}

/// Resolved enforcement flags for one application
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceProfile {
    /// Level the profile was resolved from
    pub level: ComplianceLevel,
    /// Mark resources for audit and mandate RBAC
    pub require_audit: bool,
    /// Data must be encrypted at rest and in transit
    pub require_encryption: bool,
    /// Default-deny NetworkPolicy is mandatory
    pub require_network_policy: bool,
    /// Pods join the mesh for mutual TLS
    pub require_mutual_tls: bool,
    /// Images must be pinned by digest
    pub require_binary_authorization: bool,
    /// Images must be scanned before admission
    pub require_image_scan: bool,
    /// Pod Security Admission level
    pub pod_security_level: PodSecurityLevel,
}

impl ComplianceProfile {
    /// Names of enabled flags, for set comparisons and display
    pub fn enabled_flags(&self) -> BTreeSet<&'static str> {
        [
            ("requireAudit", self.require_audit),
            ("requireEncryption", self.require_encryption),
            ("requireNetworkPolicy", self.require_network_policy),
            ("requireMutualTLS", self.require_mutual_tls),
            ("requireBinaryAuthorization", self.require_binary_authorization),
            ("requireImageScan", self.require_image_scan),
            (
                "podSecurityRestricted",
                self.pod_security_level == PodSecurityLevel::Restricted,
            ),
        ]
        .into_iter()
        .filter_map(|(name, enabled)| enabled.then_some(name))
        .collect()
    }

    /// Whether this profile requires at least everything `other` requires
    pub fn covers(&self, other: &ComplianceProfile) -> bool {
        self.level >= other.level && self.enabled_flags().is_superset(&other.enabled_flags())
    }

    /// Flag-wise strictest combination of two profiles
    pub fn strictest(&self, other: &ComplianceProfile) -> ComplianceProfile {
        ComplianceProfile {
            level: self.level.max(other.level),
            require_audit: self.require_audit || other.require_audit,
            require_encryption: self.require_encryption || other.require_encryption,
            require_network_policy: self.require_network_policy || other.require_network_policy,
            require_mutual_tls: self.require_mutual_tls || other.require_mutual_tls,
            require_binary_authorization: self.require_binary_authorization
                || other.require_binary_authorization,
            require_image_scan: self.require_image_scan || other.require_image_scan,
            pod_security_level: self.pod_security_level.max(other.pod_security_level),
        }
    }

    /// Apply explicit overrides. A set override always wins over the
    /// table value; unset overrides leave the flag alone.
    pub fn with_overrides(mut self, overrides: &ProfileOverrides) -> ComplianceProfile {
        if let Some(v) = overrides.require_audit {
            self.require_audit = v;
        }
        if let Some(v) = overrides.require_encryption {
            self.require_encryption = v;
        }
        if let Some(v) = overrides.require_network_policy {
            self.require_network_policy = v;
        }
        if let Some(v) = overrides.require_mutual_tls {
            self.require_mutual_tls = v;
        }
        if let Some(v) = overrides.require_binary_authorization {
            self.require_binary_authorization = v;
        }
        if let Some(v) = overrides.require_image_scan {
            self.require_image_scan = v;
        }
        if let Some(v) = overrides.pod_security_level {
            self.pod_security_level = v;
        }
        self
    }

    /// Applications at level high and above get audit-log read access
    pub fn requires_audit_reader(&self) -> bool {
        self.level >= ComplianceLevel::High
    }
}

/// Per-flag overrides applied on top of a level's table entry
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileOverrides {
    /// Override for `require_audit`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_audit: Option<bool>,
    /// Override for `require_encryption`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_encryption: Option<bool>,
    /// Override for `require_network_policy`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_network_policy: Option<bool>,
    /// Override for `require_mutual_tls`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_mutual_tls: Option<bool>,
    /// Override for `require_binary_authorization`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_binary_authorization: Option<bool>,
    /// Override for `require_image_scan`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_image_scan: Option<bool>,
    /// Override for `pod_security_level`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_security_level: Option<PodSecurityLevel>,
}
