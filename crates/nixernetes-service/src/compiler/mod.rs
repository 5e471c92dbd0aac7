//! ResourceComposer - unified compilation of an Application into Kubernetes resources
//!
//! The composer delegates to specialized generators:
//! - [`WorkloadCompiler`]: Namespace, Deployment, Service
//! - [`PolicyGenerator`]: NetworkPolicy, ServiceAccount, Role, RoleBindings
//! - [`LabelAnnotationInjector`]: reserved metadata on every resource
//!
//! Every resource is then validated. An invalid resource the compliance
//! profile mandates fails the whole compile; any other invalid resource is
//! dropped from the output and reported in the diagnostics. A reserved key
//! conflict during injection fails the compile regardless of the profile.

mod batch;
mod phase;

pub use batch::{compile_application, compile_batch, BatchOutcome, BatchResult};
pub use phase::CompilePhase;

use serde::Serialize;
use tracing::{debug, info, warn};

use nixernetes_common::declaration::Application;
use nixernetes_common::graph::DependencyGraph;
use nixernetes_common::{CompilerConfig, Error};
use nixernetes_compliance::{ComplianceProfile, ComplianceProfileResolver, PodSecurityLevel};
use nixernetes_manifest::{
    GeneratedResource, ManifestValidator, ResourceKind, ValidationResult, VersionResolver,
    Violation,
};

use crate::labels::LabelAnnotationInjector;
use crate::policy::PolicyGenerator;
use crate::workload::WorkloadCompiler;
use phase::PhaseTracker;

/// Field path of the application container's image
const IMAGE_PATH: &str = "spec.template.spec.containers[0].image";

// =============================================================================
// Compile Result
// =============================================================================

/// Output of compiling one application
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileResult {
    /// "namespace/name" of the compiled application
    pub application: String,
    /// Normalized target Kubernetes version
    pub target_version: String,
    /// Terminal phase: Succeeded or PartiallySucceeded
    pub phase: CompilePhase,
    /// Effective compliance profile
    pub profile: ComplianceProfile,
    /// Valid resources in apply order
    pub resources: Vec<GeneratedResource>,
    /// One result per generated resource, valid or not, in apply order
    pub diagnostics: Vec<ValidationResult>,
}

impl CompileResult {
    /// Whether every generated resource was valid
    pub fn is_complete(&self) -> bool {
        self.phase == CompilePhase::Succeeded
    }

    /// Diagnostics of dropped resources
    pub fn invalid(&self) -> impl Iterator<Item = &ValidationResult> {
        self.diagnostics.iter().filter(|d| !d.valid)
    }

    /// Human-readable outcome, e.g. "3 of 5 resources valid"
    pub fn summary(&self) -> String {
        format!(
            "{} of {} resources valid",
            self.resources.len(),
            self.diagnostics.len()
        )
    }
}

/// A resource on its way through the pipeline
#[derive(Debug)]
struct Draft {
    resource: GeneratedResource,
    /// Whether the compliance profile requires this resource
    mandated: bool,
    /// Violations found before validation by compliance checks
    violations: Vec<Violation>,
    warnings: Vec<String>,
}

impl Draft {
    fn new(resource: GeneratedResource, mandated: bool) -> Self {
        Self {
            resource,
            mandated,
            violations: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

// =============================================================================
// Resource Composer
// =============================================================================

/// Compiles applications against a shared dependency graph.
///
/// The composer never mutates the graph, so one composer can compile many
/// applications concurrently.
pub struct ResourceComposer<'a> {
    graph: &'a DependencyGraph,
    config: &'a CompilerConfig,
    versions: &'static VersionResolver,
    profiles: &'static ComplianceProfileResolver,
}

impl<'a> ResourceComposer<'a> {
    /// Create a composer
    ///
    /// # Arguments
    /// * `graph` - Dependency graph containing every application to compile
    /// * `config` - Compiler configuration
    pub fn new(graph: &'a DependencyGraph, config: &'a CompilerConfig) -> Self {
        Self {
            graph,
            config,
            versions: VersionResolver::global(),
            profiles: ComplianceProfileResolver::global(),
        }
    }

    /// Compile one application for a target Kubernetes version.
    ///
    /// # Errors
    ///
    /// - `UnsupportedVersion` when the target is not a supported release
    /// - `InvalidDeclaration` when the declaration itself is malformed
    /// - `UnknownComplianceLevel` for an unknown environment profile
    /// - `DependencyResolution` when the application is not in the graph
    /// - `ReservedKeyConflict` when a user label or annotation holds a
    ///   different value under a reserved key
    /// - `ComplianceViolation` when a mandated resource is invalid
    pub fn compile(&self, app: &Application, target_version: &str) -> Result<CompileResult, Error> {
        let application = app.display_name();
        let mut tracker = PhaseTracker::new(&application);
        match self.run(app, target_version, &mut tracker) {
            Ok(result) => Ok(result),
            Err(err) => {
                tracker.enter(CompilePhase::Failed);
                warn!(app = %application, code = err.code(), error = %err, "compile failed");
                Err(err)
            }
        }
    }

    fn run(
        &self,
        app: &Application,
        target_version: &str,
        tracker: &mut PhaseTracker<'_>,
    ) -> Result<CompileResult, Error> {
        let application = app.display_name();
        let target = self.versions.check_version(target_version)?.to_string();
        app.validate(self.config)?;

        // (1) compliance profile
        let profile = self.profiles.resolve_request(&app.compliance)?;

        // (2) dependency graph
        if self.graph.get_application(&app.namespace, &app.name).is_none() {
            return Err(Error::dependency(
                &application,
                &application,
                "application is not part of the dependency graph",
            ));
        }
        tracker.advance();

        // (3) workload resources
        let mut drafts = self.compose_workloads(app, &profile, &target)?;
        tracker.advance();

        // (4) security resources
        let generator = PolicyGenerator::new(self.graph, self.config, self.versions, &target);
        let policies = generator.generate_network_policies(app, &profile)?;
        for resource in policies.network_policies {
            let mut draft = Draft::new(resource, profile.require_network_policy);
            draft.warnings.extend(policies.warnings.iter().cloned());
            drafts.push(draft);
        }
        for resource in generator.generate_rbac(app, &profile)? {
            drafts.push(Draft::new(resource, profile.require_audit));
        }
        tracker.advance();

        // (5) reserved metadata
        let injector = LabelAnnotationInjector::new(self.config);
        for draft in &mut drafts {
            draft.resource = injector.inject(draft.resource.clone(), app, &profile)?;
        }
        tracker.advance();

        // (6) validation and (7) mandated resources must be valid
        let validator = ManifestValidator::new(&target);
        let (resources, diagnostics) = settle(&application, &validator, drafts)?;
        tracker.advance();

        tracker.enter(if resources.len() == diagnostics.len() {
            CompilePhase::Succeeded
        } else {
            CompilePhase::PartiallySucceeded
        });

        let result = CompileResult {
            application,
            target_version: target,
            phase: tracker.phase(),
            profile,
            resources,
            diagnostics,
        };
        if result.is_complete() {
            info!(app = %result.application, level = %result.profile.level, resources = result.resources.len(), "compiled");
        } else {
            warn!(app = %result.application, summary = %result.summary(), "compiled with dropped resources");
        }
        Ok(result)
    }

    fn compose_workloads(
        &self,
        app: &Application,
        profile: &ComplianceProfile,
        target: &str,
    ) -> Result<Vec<Draft>, Error> {
        let workloads = WorkloadCompiler::new(self.config, self.versions, target).compile(app, profile)?;
        let mut drafts = Vec::with_capacity(workloads.total_count());

        if let Some(namespace) = workloads.namespace {
            drafts.push(Draft::new(
                namespace,
                profile.pod_security_level == PodSecurityLevel::Restricted,
            ));
        }
        if let Some(deployment) = workloads.deployment {
            let mut draft = Draft::new(deployment, profile.require_binary_authorization);
            if profile.require_binary_authorization && !app.is_digest_pinned() {
                draft.violations.push(Violation::compliance(
                    IMAGE_PATH,
                    format!(
                        "image '{}' must be pinned by digest when binary authorization is required",
                        app.image
                    ),
                ));
            }
            drafts.push(draft);
        }
        if let Some(service) = workloads.service {
            drafts.push(Draft::new(service, false));
        }
        Ok(drafts)
    }
}

/// Validate drafts in apply order, keeping the valid ones.
///
/// Fails with `ComplianceViolation` on the first invalid mandated draft.
/// Other invalid drafts are dropped and only appear in the diagnostics.
fn settle(
    application: &str,
    validator: &ManifestValidator,
    mut drafts: Vec<Draft>,
) -> Result<(Vec<GeneratedResource>, Vec<ValidationResult>), Error> {
    drafts.sort_by_key(|d| d.resource.kind.apply_order());
    let mut resources = Vec::with_capacity(drafts.len());
    let mut diagnostics = Vec::with_capacity(drafts.len());
    for draft in drafts {
        let mut result = validator.validate(&draft.resource);
        for violation in draft.violations {
            result.push_error(violation);
        }
        for warning in draft.warnings {
            result.push_warning(warning);
        }

        if !result.valid {
            if draft.mandated {
                return Err(Error::ComplianceViolation {
                    application: application.to_string(),
                    resource: draft.resource.reference(),
                    errors: result.error_messages(),
                });
            }
            debug!(
                app = %application,
                resource = %draft.resource.reference(),
                errors = result.errors.len(),
                "dropping invalid resource"
            );
        } else {
            resources.push(draft.resource);
        }
        diagnostics.push(result);
    }
    Ok((resources, diagnostics))
}

/// Kinds present in a set of resources, for coverage comparisons
pub fn kinds_of(resources: &[GeneratedResource]) -> std::collections::BTreeSet<ResourceKind> {
    resources.iter().map(|r| r.kind).collect()
}
