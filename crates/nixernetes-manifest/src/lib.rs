//! Kubernetes resource model and static checks
//!
//! - [`resource`]: the closed set of kinds the compiler emits and the
//!   [`GeneratedResource`] envelope
//! - [`version`]: kind to apiVersion mapping per supported Kubernetes release
//! - [`validator`]: collect-all structural validation
//! - [`ordering`]: `kubectl apply` ordering
//! - [`analyzer`]: validation of multi-document YAML manifests

#![deny(missing_docs)]

pub mod analyzer;
pub mod ordering;
pub mod resource;
pub mod validator;
pub mod version;

pub use analyzer::{ManifestAnalyzer, ManifestReport};
pub use resource::{GeneratedResource, Provenance, ResourceKind};
pub use validator::{ManifestValidator, ResourceRef, ValidationResult, Violation};
pub use version::{KubernetesVersion, VersionResolver};
