//! Application compilation for Nixernetes
//!
//! Turns declared [`Application`](nixernetes_common::declaration::Application)s
//! into validated Kubernetes resources:
//! - [`workload`]: Namespace, Deployment and Service
//! - [`policy`]: default-deny NetworkPolicies and least-privilege RBAC
//! - [`labels`]: reserved traceability metadata
//! - [`compiler`]: the [`ResourceComposer`] pipeline and batch compile

#![deny(missing_docs)]

pub mod compiler;
pub mod labels;
pub mod policy;
pub mod workload;

pub use compiler::{
    compile_application, compile_batch, BatchOutcome, BatchResult, CompilePhase, CompileResult,
    ResourceComposer,
};
pub use labels::LabelAnnotationInjector;
pub use policy::{GeneratedPolicies, PolicyGenerator};
pub use workload::{GeneratedWorkloads, WorkloadCompiler};
