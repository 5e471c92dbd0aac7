//! Batch compilation
//!
//! The dependency graph is built once for the whole batch, then each
//! application is compiled independently on a scoped worker thread. The
//! graph is only read after it is built.

use std::collections::HashMap;
use std::num::NonZeroUsize;

use tracing::{debug, info, warn};

use nixernetes_common::declaration::Application;
use nixernetes_common::graph::DependencyGraph;
use nixernetes_common::{CompilerConfig, Error, LABEL_POD_SECURITY_ENFORCE};
use nixernetes_manifest::ordering::sort_for_apply;
use nixernetes_manifest::{GeneratedResource, ResourceKind, VersionResolver};

use super::{CompileResult, ResourceComposer};

/// Outcome for one application of a batch
#[derive(Debug)]
pub struct BatchOutcome {
    /// "namespace/name"
    pub application: String,
    /// Compile result or the fatal error that ended it
    pub result: Result<CompileResult, Error>,
}

/// Outcome of a batch compile
#[derive(Debug, Default)]
pub struct BatchResult {
    /// Per-application outcomes, in input order
    pub outcomes: Vec<BatchOutcome>,
    /// Resources of every successful application, de-duplicated, in apply order
    pub manifest: Vec<GeneratedResource>,
    /// Dependency cycles found in the batch
    pub cycles: Vec<Vec<String>>,
}

impl BatchResult {
    /// Whether every application compiled
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    /// Applications that failed with their errors
    pub fn failures(&self) -> impl Iterator<Item = (&str, &Error)> {
        self.outcomes.iter().filter_map(|o| match &o.result {
            Ok(_) => None,
            Err(err) => Some((o.application.as_str(), err)),
        })
    }

    /// Successful compile results
    pub fn compiled(&self) -> impl Iterator<Item = &CompileResult> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }
}

/// Compile a single application with no other applications in scope.
///
/// Any dependency that is not external fails to resolve.
pub fn compile_application(
    config: &CompilerConfig,
    app: &Application,
    target_version: &str,
) -> Result<CompileResult, Error> {
    let graph = DependencyGraph::build(std::slice::from_ref(app))?;
    ResourceComposer::new(&graph, config).compile(app, target_version)
}

/// Compile a batch of applications against one shared dependency graph.
///
/// # Errors
///
/// Batch-level failures only: unsupported target version, duplicate
/// applications, unresolved dependencies and, when
/// `reject_dependency_cycles` is set, dependency cycles. Per-application
/// failures are reported in [`BatchResult::outcomes`].
pub fn compile_batch(
    config: &CompilerConfig,
    apps: &[Application],
    target_version: &str,
) -> Result<BatchResult, Error> {
    VersionResolver::global().check_version(target_version)?;

    let graph = DependencyGraph::build(apps)?;
    debug!(
        applications = graph.application_count(),
        edges = graph.edge_count(),
        "dependency graph built"
    );

    let cycles = graph.cycles();
    for cycle in &cycles {
        warn!(cycle = %cycle.join(" -> "), "dependency cycle detected");
    }
    if config.reject_dependency_cycles {
        if let Some(cycle) = cycles.first() {
            return Err(Error::DependencyCycle {
                cycle: cycle.clone(),
            });
        }
    }

    let composer = ResourceComposer::new(&graph, config);
    let results = compile_parallel(&composer, apps, target_version);

    let outcomes: Vec<BatchOutcome> = apps
        .iter()
        .zip(results)
        .map(|(app, result)| BatchOutcome {
            application: app.display_name(),
            result,
        })
        .collect();

    let manifest = merge_manifest(
        outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .flat_map(|r| r.resources.iter()),
    );

    let result = BatchResult {
        outcomes,
        manifest,
        cycles,
    };
    info!(
        applications = result.outcomes.len(),
        failed = result.failures().count(),
        resources = result.manifest.len(),
        "batch compiled"
    );
    Ok(result)
}

/// Compile every application, returning results in input order
fn compile_parallel(
    composer: &ResourceComposer<'_>,
    apps: &[Application],
    target_version: &str,
) -> Vec<Result<CompileResult, Error>> {
    if apps.is_empty() {
        return Vec::new();
    }
    let workers = std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
        .min(apps.len());
    let chunk_size = apps.len().div_ceil(workers);

    std::thread::scope(|scope| {
        let handles: Vec<_> = apps
            .chunks(chunk_size)
            .map(|chunk| {
                scope.spawn(move || {
                    chunk
                        .iter()
                        .map(|app| composer.compile(app, target_version))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        handles
            .into_iter()
            .flat_map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
            })
            .collect()
    })
}

type ResourceKey = (ResourceKind, Option<String>, String);

fn key_of(resource: &GeneratedResource) -> ResourceKey {
    (
        resource.kind,
        resource.metadata.namespace.clone(),
        resource.metadata.name.clone(),
    )
}

/// De-duplicate resources by (kind, namespace, name), keeping the first
/// occurrence. A shared Namespace keeps the strictest Pod Security level and
/// the audit reader ClusterRole is emitted once for every application bound to it.
fn merge_manifest<'r>(resources: impl Iterator<Item = &'r GeneratedResource>) -> Vec<GeneratedResource> {
    let mut merged: Vec<GeneratedResource> = Vec::new();
    let mut index: HashMap<ResourceKey, usize> = HashMap::new();

    for resource in resources {
        let key = key_of(resource);
        let Some(&position) = index.get(&key) else {
            index.insert(key, merged.len());
            merged.push(resource.clone());
            continue;
        };

        let existing = &mut merged[position];
        if *existing == *resource {
            continue;
        }
        if resource.kind == ResourceKind::Namespace {
            if enforce_level(resource) == Some("restricted") {
                existing
                    .metadata
                    .labels
                    .insert(LABEL_POD_SECURITY_ENFORCE.to_string(), "restricted".to_string());
            }
            debug!(namespace = %resource.metadata.name, "namespace shared by several applications");
        } else if resource.kind == ResourceKind::ClusterRole {
            // Per-application labels differ; the rules are the same
            debug!(role = %resource.metadata.name, "cluster role shared by several applications");
        } else {
            warn!(resource = %resource.reference(), "conflicting duplicate resource, keeping the first");
        }
    }

    sort_for_apply(&mut merged);
    merged
}

fn enforce_level(resource: &GeneratedResource) -> Option<&str> {
    resource
        .metadata
        .labels
        .get(LABEL_POD_SECURITY_ENFORCE)
        .map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nixernetes_common::declaration::{
        ComplianceLevel, ComplianceRequest, DependencyRef, PortSpec,
    };
    use nixernetes_common::meta::ObjectMeta;
    use nixernetes_manifest::Provenance;
    use std::collections::BTreeMap;

    fn make_app(name: &str, namespace: &str, level: ComplianceLevel) -> Application {
        Application {
            name: name.into(),
            namespace: namespace.into(),
            image: format!("registry.example.com/{}:1.0", name),
            replicas: 1,
            ports: vec![PortSpec::tcp(8080)],
            dependencies: vec![],
            compliance: ComplianceRequest::new("SOC2", level, "platform"),
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
        }
    }

    fn namespace(level: &str) -> GeneratedResource {
        GeneratedResource::new(
            ResourceKind::Namespace,
            "v1",
            ObjectMeta::cluster_scoped("shop").with_label(LABEL_POD_SECURITY_ENFORCE, level),
            Provenance::InjectedMetadata,
        )
    }

    #[test]
    fn results_follow_input_order() {
        let apps: Vec<_> = (0..12)
            .map(|i| make_app(&format!("svc-{i}"), "default", ComplianceLevel::Low))
            .collect();
        let batch = compile_batch(&CompilerConfig::default(), &apps, "1.30").unwrap();
        let names: Vec<_> = batch.outcomes.iter().map(|o| o.application.clone()).collect();
        let expected: Vec<_> = apps.iter().map(Application::display_name).collect();
        assert_eq!(names, expected);
        assert!(batch.is_success());
    }

    #[test]
    fn empty_batch_is_empty() {
        let batch = compile_batch(&CompilerConfig::default(), &[], "1.30").unwrap();
        assert!(batch.outcomes.is_empty());
        assert!(batch.manifest.is_empty());
    }

    #[test]
    fn unsupported_version_fails_the_batch() {
        let apps = vec![make_app("api", "default", ComplianceLevel::Low)];
        assert!(matches!(
            compile_batch(&CompilerConfig::default(), &apps, "2.0"),
            Err(Error::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn unresolved_dependency_fails_the_batch() {
        let mut api = make_app("api", "default", ComplianceLevel::Low);
        api.dependencies = vec![DependencyRef::on("db", 5432)];
        assert!(matches!(
            compile_batch(&CompilerConfig::default(), &[api], "1.30"),
            Err(Error::DependencyResolution { .. })
        ));
    }

    #[test]
    fn per_application_failure_does_not_stop_the_batch() {
        let mut bad = make_app("bad", "default", ComplianceLevel::Low);
        bad.replicas = 10_000;
        let apps = vec![make_app("good", "default", ComplianceLevel::Low), bad];
        let batch = compile_batch(&CompilerConfig::default(), &apps, "1.30").unwrap();

        assert!(!batch.is_success());
        let failures: Vec<_> = batch.failures().map(|(name, _)| name).collect();
        assert_eq!(failures, vec!["default/bad"]);
        assert_eq!(batch.compiled().count(), 1);
        assert!(batch.manifest.iter().all(|r| r.metadata.name.starts_with("good")));
    }

    #[test]
    fn cycles_are_reported_and_optionally_rejected() {
        let mut a = make_app("a", "default", ComplianceLevel::Medium);
        a.dependencies = vec![DependencyRef::on("b", 8080)];
        let mut b = make_app("b", "default", ComplianceLevel::Medium);
        b.dependencies = vec![DependencyRef::on("a", 8080)];
        let apps = vec![a, b];

        let batch = compile_batch(&CompilerConfig::default(), &apps, "1.30").unwrap();
        assert_eq!(batch.cycles.len(), 1);
        assert!(batch.is_success());

        let strict = CompilerConfig {
            reject_dependency_cycles: true,
            ..Default::default()
        };
        assert!(matches!(
            compile_batch(&strict, &apps, "1.30"),
            Err(Error::DependencyCycle { .. })
        ));
    }

    #[test]
    fn manifest_is_in_apply_order() {
        let apps = vec![
            make_app("web", "default", ComplianceLevel::Medium),
            make_app("api", "default", ComplianceLevel::Medium),
        ];
        let batch = compile_batch(&CompilerConfig::default(), &apps, "1.30").unwrap();
        let orders: Vec<_> = batch.manifest.iter().map(|r| r.kind.apply_order()).collect();
        assert!(orders.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(batch.manifest.len(), 12);
    }

    #[test]
    fn shared_namespace_is_emitted_once() {
        let config = CompilerConfig {
            manage_namespaces: true,
            ..Default::default()
        };
        let apps = vec![
            make_app("web", "shop", ComplianceLevel::Low),
            make_app("api", "shop", ComplianceLevel::Low),
        ];
        let batch = compile_batch(&config, &apps, "1.30").unwrap();
        let namespaces = batch
            .manifest
            .iter()
            .filter(|r| r.kind == ResourceKind::Namespace)
            .count();
        assert_eq!(namespaces, 1);
        assert_eq!(batch.manifest[0].kind, ResourceKind::Namespace);
    }

    #[test]
    fn audit_reader_cluster_role_is_emitted_once_and_bound_by_each_application() {
        let mut web = make_app("web", "shop", ComplianceLevel::High);
        web.compliance.owner = "storefront".into();
        let apps = vec![
            web,
            make_app("api", "shop", ComplianceLevel::Restricted),
            make_app("batch", "jobs", ComplianceLevel::Low),
        ];
        let batch = compile_batch(&CompilerConfig::default(), &apps, "1.30").unwrap();
        assert!(batch.is_success());

        let roles: Vec<_> = batch
            .manifest
            .iter()
            .filter(|r| r.kind == ResourceKind::ClusterRole)
            .collect();
        assert_eq!(roles.len(), 1);
        assert_eq!(roles[0].metadata.name, "nixernetes:audit-log-reader");

        let cluster_bindings = batch
            .manifest
            .iter()
            .filter(|r| r.body.get("roleRef").is_some_and(|role| role["kind"] == "ClusterRole"))
            .count();
        assert_eq!(cluster_bindings, 2);

        for binding in batch.manifest.iter().filter(|r| r.kind == ResourceKind::RoleBinding) {
            let role_ref = &binding.body["roleRef"];
            let target = batch.manifest.iter().find(|r| {
                r.kind.as_str() == role_ref["kind"]
                    && r.metadata.name == role_ref["name"]
                    && (r.kind == ResourceKind::ClusterRole
                        || r.metadata.namespace == binding.metadata.namespace)
            });
            assert!(target.is_some(), "{} has no role to bind", binding.reference());
        }
    }

    #[test]
    fn shared_namespace_keeps_strictest_pod_security() {
        let baseline = namespace("baseline");
        let restricted = namespace("restricted");
        let merged = merge_manifest([&baseline, &restricted].into_iter());
        assert_eq!(merged.len(), 1);
        assert_eq!(enforce_level(&merged[0]), Some("restricted"));

        let merged = merge_manifest([&restricted, &baseline].into_iter());
        assert_eq!(enforce_level(&merged[0]), Some("restricted"));
    }
}
