//! Kind to apiVersion resolution per Kubernetes release
//!
//! The table is built once on first use and never modified. Only the
//! releases listed in [`SUPPORTED_VERSIONS`] are accepted; other versions
//! are rejected rather than rounded to the nearest known release.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use nixernetes_common::Error;

use crate::resource::ResourceKind;

/// Supported Kubernetes minor releases, oldest first
pub const SUPPORTED_VERSIONS: &[KubernetesVersion] = &[
    KubernetesVersion::new(1, 28),
    KubernetesVersion::new(1, 29),
    KubernetesVersion::new(1, 30),
    KubernetesVersion::new(1, 31),
];

/// A Kubernetes minor release
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KubernetesVersion {
    /// Major version (always 1 today)
    pub major: u32,
    /// Minor version
    pub minor: u32,
}

impl KubernetesVersion {
    /// Construct from major and minor
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl std::str::FromStr for KubernetesVersion {
    type Err = String;

    /// Accepts "1.30", "v1.30" and "1.30.2". The patch component is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
        let mut parts = trimmed.split('.');
        let major = parts.next().and_then(|p| p.parse().ok());
        let minor = parts.next().and_then(|p| p.parse().ok());
        let patch_ok = match parts.next() {
            None => true,
            Some(p) => p.parse::<u32>().is_ok(),
        };
        match (major, minor, patch_ok, parts.next()) {
            (Some(major), Some(minor), true, None) => Ok(Self { major, minor }),
            _ => Err(format!("'{}' is not a Kubernetes version", s)),
        }
    }
}

impl std::fmt::Display for KubernetesVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

type ApiTable = BTreeMap<ResourceKind, &'static str>;

/// Read-only mapping of (kind, version) to apiVersion
#[derive(Debug)]
pub struct VersionResolver {
    tables: BTreeMap<KubernetesVersion, ApiTable>,
}

static GLOBAL: OnceLock<VersionResolver> = OnceLock::new();

impl VersionResolver {
    /// Shared resolver, built on first use
    pub fn global() -> &'static VersionResolver {
        GLOBAL.get_or_init(Self::build)
    }

    fn build() -> Self {
        let tables = SUPPORTED_VERSIONS
            .iter()
            .map(|version| (*version, table_for(*version)))
            .collect();
        Self { tables }
    }

    /// Supported versions as "major.minor" strings, oldest first
    pub fn supported_versions(&self) -> Vec<String> {
        self.tables.keys().map(ToString::to_string).collect()
    }

    /// Parse a version string and confirm it is supported
    pub fn check_version(&self, target: &str) -> Result<KubernetesVersion, Error> {
        target
            .parse::<KubernetesVersion>()
            .ok()
            .filter(|v| self.tables.contains_key(v))
            .ok_or_else(|| Error::UnsupportedVersion {
                version: target.to_string(),
                supported: self.supported_versions().join(", "),
            })
    }

    /// Resolve a kind name for a target version
    pub fn resolve(&self, kind: &str, target: &str) -> Result<&'static str, Error> {
        let version = self.check_version(target)?;
        let kind: ResourceKind = kind.parse().map_err(|_| Error::UnsupportedKind {
            kind: kind.to_string(),
            version: version.to_string(),
        })?;
        self.lookup(kind, version)
    }

    /// Resolve a typed kind for a target version
    pub fn resolve_kind(&self, kind: ResourceKind, target: &str) -> Result<&'static str, Error> {
        let version = self.check_version(target)?;
        self.lookup(kind, version)
    }

    fn lookup(&self, kind: ResourceKind, version: KubernetesVersion) -> Result<&'static str, Error> {
        self.tables
            .get(&version)
            .and_then(|table| table.get(&kind))
            .copied()
            .ok_or_else(|| Error::UnsupportedKind {
                kind: kind.to_string(),
                version: version.to_string(),
            })
    }

    /// Full table for one version, for display
    pub fn table(&self, target: &str) -> Result<Vec<(ResourceKind, &'static str)>, Error> {
        let version = self.check_version(target)?;
        Ok(self
            .tables
            .get(&version)
            .map(|t| t.iter().map(|(k, v)| (*k, *v)).collect())
            .unwrap_or_default())
    }
}

fn table_for(version: KubernetesVersion) -> ApiTable {
    use ResourceKind::*;

    let mut table: ApiTable = BTreeMap::new();
    for kind in [Namespace, ServiceAccount, ConfigMap, Secret, Service] {
        table.insert(kind, "v1");
    }
    for kind in [Role, RoleBinding, ClusterRole, ClusterRoleBinding] {
        table.insert(kind, "rbac.authorization.k8s.io/v1");
    }
    for kind in [Deployment, StatefulSet, DaemonSet] {
        table.insert(kind, "apps/v1");
    }
    for kind in [Job, CronJob] {
        table.insert(kind, "batch/v1");
    }
    for kind in [Ingress, NetworkPolicy] {
        table.insert(kind, "networking.k8s.io/v1");
    }
    table.insert(HorizontalPodAutoscaler, "autoscaling/v2");
    for kind in [ClusterPolicy, Policy] {
        table.insert(kind, "kyverno.io/v1");
    }
    table.insert(PodDisruptionBudget, "policy/v1");

    table.insert(
        ValidatingAdmissionPolicy,
        if version >= KubernetesVersion::new(1, 30) {
            "admissionregistration.k8s.io/v1"
        } else {
            "admissionregistration.k8s.io/v1beta1"
        },
    );
    table.insert(
        FlowSchema,
        if version >= KubernetesVersion::new(1, 29) {
            "flowcontrol.apiserver.k8s.io/v1"
        } else {
            "flowcontrol.apiserver.k8s.io/v1beta3"
        },
    );
    table
}
