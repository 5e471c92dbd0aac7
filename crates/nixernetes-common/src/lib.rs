//! Common types for Nixernetes: declarations, errors, configuration,
//! metadata helpers and the application dependency graph.

#![deny(missing_docs)]

pub mod config;
pub mod declaration;
pub mod error;
pub mod graph;
pub mod meta;
pub mod telemetry;
pub mod yaml;

pub use config::CompilerConfig;
pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Namespace that never needs to be declared before use
pub const DEFAULT_NAMESPACE: &str = "default";

/// Standard Kubernetes label for the application name
pub const LABEL_NAME: &str = "app.kubernetes.io/name";

/// Standard Kubernetes label for the managing tool
pub const LABEL_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Value of [`LABEL_MANAGED_BY`] on everything we emit
pub const LABEL_MANAGED_BY_NIXERNETES: &str = "nixernetes";

/// Label the API server puts on every Namespace (used by namespaceSelectors)
pub const LABEL_NAMESPACE_NAME: &str = "kubernetes.io/metadata.name";

/// Prefix reserved for keys written by the label/annotation injector
pub const RESERVED_KEY_PREFIX: &str = "nixernetes.io/";

/// Compliance framework label (e.g. "SOC2")
pub const LABEL_FRAMEWORK: &str = "nixernetes.io/framework";

/// Framework version that produced the resource
pub const LABEL_VERSION: &str = "nixernetes.io/version";

/// Generator that produced the resource (workload, policy, rbac, ...)
pub const LABEL_MODULE: &str = "nixernetes.io/module";

/// Tool that created the resource
pub const LABEL_CREATED_BY: &str = "nixernetes.io/created-by";

/// Value of [`LABEL_CREATED_BY`]
pub const CREATED_BY_NIXERNETES: &str = "nixernetes";

/// Set to "enabled" when the compliance profile requires auditing
pub const LABEL_COMPLIANCE: &str = "nixernetes.io/compliance";

/// Resolved compliance level of the owning application
pub const LABEL_COMPLIANCE_LEVEL: &str = "nixernetes.io/compliance-level";

/// Owning team or person. Stored as an annotation since owners are free-form.
pub const ANNOTATION_OWNER: &str = "nixernetes.io/owner";

/// Workload annotation written when encryption is required
pub const ANNOTATION_ENCRYPTION: &str = "nixernetes.io/encryption";

/// Workload annotation written when image scanning is required
pub const ANNOTATION_IMAGE_SCAN: &str = "nixernetes.io/image-scan";

/// Pod Security Admission enforcement label on Namespaces
pub const LABEL_POD_SECURITY_ENFORCE: &str = "pod-security.kubernetes.io/enforce";

/// Istio dataplane mode label, "ambient" enrolls pods in the mesh with mTLS
pub const LABEL_DATAPLANE_MODE: &str = "istio.io/dataplane-mode";

/// Value for [`LABEL_DATAPLANE_MODE`]
pub const DATAPLANE_MODE_AMBIENT: &str = "ambient";

/// Suffix of the default-deny NetworkPolicy name
pub const SUFFIX_DEFAULT_DENY: &str = "-default-deny";

/// Suffix of the Role and RoleBinding granting config read access
pub const SUFFIX_CONFIG_READER: &str = "-config-reader";

/// Suffix of the RoleBinding to the audit reader ClusterRole
pub const SUFFIX_AUDIT_READER: &str = "-audit-reader";

/// Longest application name whose derived resource names (`<name>` plus the
/// longest suffix above) still fit in a 63 character DNS label.
pub const MAX_APPLICATION_NAME_LEN: usize = meta::MAX_DNS_LABEL_LEN - SUFFIX_CONFIG_READER.len();
