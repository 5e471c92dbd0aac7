//! Error types for the Nixernetes compilation pipeline
//!
//! Errors carry the names of the application, resource or key involved so
//! that a failed batch can be traced back to the declaration that caused it.

use thiserror::Error;

/// Main error type for Nixernetes operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// A resource kind has no apiVersion mapping for the target version
    #[error("unsupported kind {kind} for Kubernetes {version}")]
    UnsupportedKind {
        /// The kind that was requested
        kind: String,
        /// The target Kubernetes version
        version: String,
    },

    /// The target Kubernetes version is not in the version table
    #[error("unsupported Kubernetes version {version} (supported: {supported})")]
    UnsupportedVersion {
        /// The version that was requested
        version: String,
        /// Comma separated list of supported versions
        supported: String,
    },

    /// A compliance level or profile name is not recognised
    #[error("unknown compliance level '{value}' (expected one of: {expected})")]
    UnknownComplianceLevel {
        /// The value that failed to parse
        value: String,
        /// Comma separated list of accepted values
        expected: String,
    },

    /// A declared dependency cannot be matched to exactly one application
    #[error("dependency {application} -> {target}: {reason}")]
    DependencyResolution {
        /// Qualified name of the application declaring the dependency
        application: String,
        /// Target name as written in the declaration
        target: String,
        /// Why resolution failed (missing, ambiguous, malformed)
        reason: String,
    },

    /// The dependency graph contains a cycle and cycles are rejected
    #[error("dependency cycle detected: {}", .cycle.join(" -> "))]
    DependencyCycle {
        /// Qualified names along the cycle
        cycle: Vec<String>,
    },

    /// Two applications in a batch share namespace and name
    #[error("application {namespace}/{name} is declared more than once")]
    DuplicateApplication {
        /// Namespace of the duplicate
        namespace: String,
        /// Name of the duplicate
        name: String,
    },

    /// An application declaration is malformed
    #[error("invalid declaration at {field}: {message}")]
    InvalidDeclaration {
        /// Field path within the declaration (e.g. "ports[0].containerPort")
        field: String,
        /// Rule that was violated
        message: String,
    },

    /// The injector refused to overwrite a reserved metadata key
    #[error("{resource}: reserved key {key} is already '{existing}', refusing to set '{injected}'")]
    ReservedKeyConflict {
        /// Kind/name of the resource
        resource: String,
        /// The reserved key
        key: String,
        /// Value already present on the resource
        existing: String,
        /// Value the injector would have written
        injected: String,
    },

    /// A resource the compliance profile mandates could not be produced
    #[error("compliance violation for {application}: mandated {resource} is invalid: {}", .errors.join("; "))]
    ComplianceViolation {
        /// Qualified name of the application
        application: String,
        /// Kind/name of the mandated resource
        resource: String,
        /// Validation errors that made the resource unusable
        errors: Vec<String>,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
        /// The resource kind being serialized (if known)
        kind: Option<String>,
    },

    /// Configuration could not be loaded
    #[error("configuration error: {message}")]
    Config {
        /// Description of what failed
        message: String,
    },
}

impl Error {
    /// Create an invalid declaration error for a field path
    pub fn invalid_declaration(field: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::InvalidDeclaration {
            field: field.into(),
            message: msg.into(),
        }
    }

    /// Create a dependency resolution error
    pub fn dependency(
        application: impl Into<String>,
        target: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::DependencyResolution {
            application: application.into(),
            target: target.into(),
            reason: reason.into(),
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: None,
        }
    }

    /// Create a serialization error with resource kind context
    pub fn serialization_for(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: Some(kind.into()),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Stable error code for callers that report errors outside of Rust
    /// (CLI exit reports, CI annotations).
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidDeclaration { .. } => "E001",
            Error::UnsupportedKind { .. } | Error::UnsupportedVersion { .. } => "E002",
            Error::UnknownComplianceLevel { .. } => "E003",
            Error::DependencyResolution { .. }
            | Error::DependencyCycle { .. }
            | Error::DuplicateApplication { .. } => "E004",
            Error::ReservedKeyConflict { .. } => "E005",
            Error::ComplianceViolation { .. } => "E006",
            Error::Serialization { .. } => "E007",
            Error::Config { .. } => "E008",
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}
