//! Application dependency graph
//!
//! Built once per batch from the declared applications and read by every
//! compile call afterwards. Nodes are applications keyed by
//! (namespace, name); edges are resolved, de-duplicated outbound calls.
//!
//! Dependencies may cross namespaces. A target without an explicit namespace
//! resolves to the caller's namespace first, then to the only application
//! with that name anywhere in the batch.

mod cycles;

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use crate::declaration::{Application, DependencyRef, ExternalTarget, Protocol};
use crate::Error;

/// Fully qualified application reference: (namespace, name)
pub type QualifiedName = (String, String);

/// Render a qualified name as "namespace/name"
pub fn qualified_display(name: &QualifiedName) -> String {
    format!("{}/{}", name.0, name.1)
}

/// A node in the graph: the parts of an application other applications care about
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApplicationNode {
    /// Application namespace
    pub namespace: String,
    /// Application name
    pub name: String,
    /// Exposed (port, protocol) pairs
    pub ports: BTreeSet<(u16, Protocol)>,
    /// The application declared a dependency on itself
    pub self_dependent: bool,
}

impl ApplicationNode {
    fn from_application(app: &Application) -> Self {
        Self {
            namespace: app.namespace.clone(),
            name: app.name.clone(),
            ports: app
                .ports
                .iter()
                .map(|p| (p.container_port, p.protocol))
                .collect(),
            self_dependent: false,
        }
    }

    /// Whether the application listens on this port
    pub fn exposes(&self, port: u16, protocol: Protocol) -> bool {
        self.ports.contains(&(port, protocol))
    }
}

/// Where an edge points
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DependencyTarget {
    /// Another application in the batch
    Application(QualifiedName),
    /// An IP range or hostname outside the batch
    External(ExternalTarget),
}

/// A resolved outbound call
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DependencyEdge {
    /// Callee
    pub target: DependencyTarget,
    /// Destination port
    pub port: u16,
    /// Protocol
    pub protocol: Protocol,
}

/// Read-only dependency graph for one batch
#[derive(Clone, Debug, Default)]
pub struct DependencyGraph {
    nodes: BTreeMap<QualifiedName, ApplicationNode>,
    outbound: BTreeMap<QualifiedName, BTreeSet<DependencyEdge>>,
    inbound: BTreeMap<QualifiedName, BTreeSet<QualifiedName>>,
}

impl DependencyGraph {
    /// Build a graph from a batch of applications
    pub fn build(apps: &[Application]) -> Result<Self, Error> {
        DependencyGraphBuilder::new(apps)?.build()
    }

    /// Look up an application node
    pub fn get_application(&self, namespace: &str, name: &str) -> Option<&ApplicationNode> {
        self.nodes.get(&(namespace.to_string(), name.to_string()))
    }

    /// Resolved outbound edges of an application, in deterministic order.
    /// Self-dependencies are never included.
    pub fn outbound_edges(&self, namespace: &str, name: &str) -> Vec<&DependencyEdge> {
        self.outbound
            .get(&(namespace.to_string(), name.to_string()))
            .map(|edges| edges.iter().collect())
            .unwrap_or_default()
    }

    /// Applications that call this one
    pub fn dependents(&self, namespace: &str, name: &str) -> Vec<&QualifiedName> {
        self.inbound
            .get(&(namespace.to_string(), name.to_string()))
            .map(|callers| callers.iter().collect())
            .unwrap_or_default()
    }

    /// Number of applications
    pub fn application_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of de-duplicated edges across all applications
    pub fn edge_count(&self) -> usize {
        self.outbound.values().map(BTreeSet::len).sum()
    }

    /// Iterate over all application nodes in (namespace, name) order
    pub fn applications(&self) -> impl Iterator<Item = &ApplicationNode> {
        self.nodes.values()
    }

    /// Cycles between applications. Each cycle is a path of "namespace/name"
    /// entries that starts and ends with the same application.
    pub fn cycles(&self) -> Vec<Vec<String>> {
        cycles::find_cycles(&self.nodes, &self.outbound)
    }
}

/// Resolves declared dependencies into a [`DependencyGraph`]
pub struct DependencyGraphBuilder<'a> {
    apps: &'a [Application],
    by_name: BTreeMap<&'a str, Vec<&'a str>>,
    graph: DependencyGraph,
}

impl<'a> DependencyGraphBuilder<'a> {
    /// Index the batch. Fails if two applications share namespace and name.
    pub fn new(apps: &'a [Application]) -> Result<Self, Error> {
        let mut graph = DependencyGraph::default();
        let mut by_name: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

        for app in apps {
            let key = app.qualified_name();
            if graph.nodes.contains_key(&key) {
                return Err(Error::DuplicateApplication {
                    namespace: app.namespace.clone(),
                    name: app.name.clone(),
                });
            }
            graph
                .nodes
                .insert(key, ApplicationNode::from_application(app));
            by_name
                .entry(app.name.as_str())
                .or_default()
                .push(app.namespace.as_str());
        }

        Ok(Self {
            apps,
            by_name,
            graph,
        })
    }

    /// Resolve every dependency and return the finished graph
    pub fn build(mut self) -> Result<DependencyGraph, Error> {
        for app in self.apps {
            let caller = app.qualified_name();
            for dep in &app.dependencies {
                let target = self.resolve(app, dep)?;

                if target == DependencyTarget::Application(caller.clone()) {
                    debug!(
                        application = %app.display_name(),
                        port = dep.port,
                        "self-dependency excluded from policy generation"
                    );
                    if let Some(node) = self.graph.nodes.get_mut(&caller) {
                        node.self_dependent = true;
                    }
                    continue;
                }

                if let DependencyTarget::Application(callee) = &target {
                    if let Some(node) = self.graph.nodes.get(callee) {
                        if !node.exposes(dep.port, dep.protocol) {
                            warn!(
                                caller = %app.display_name(),
                                callee = %qualified_display(callee),
                                port = dep.port,
                                "dependency targets a port the callee does not declare"
                            );
                        }
                    }
                    self.graph
                        .inbound
                        .entry(callee.clone())
                        .or_default()
                        .insert(caller.clone());
                }

                let edge = DependencyEdge {
                    target,
                    port: dep.port,
                    protocol: dep.protocol,
                };
                if !self
                    .graph
                    .outbound
                    .entry(caller.clone())
                    .or_default()
                    .insert(edge)
                {
                    debug!(
                        application = %app.display_name(),
                        target = %dep.target_name,
                        port = dep.port,
                        "duplicate dependency dropped"
                    );
                }
            }
        }

        debug!(
            applications = self.graph.application_count(),
            edges = self.graph.edge_count(),
            "dependency graph built"
        );
        Ok(self.graph)
    }

    fn resolve(&self, app: &Application, dep: &DependencyRef) -> Result<DependencyTarget, Error> {
        if dep.external {
            return ExternalTarget::parse(&dep.target_name)
                .map(DependencyTarget::External)
                .map_err(|reason| Error::dependency(app.display_name(), &dep.target_name, reason));
        }

        let target = dep.target_name.as_str();

        if let Some(namespace) = &dep.namespace {
            let key = (namespace.clone(), target.to_string());
            return if self.graph.nodes.contains_key(&key) {
                Ok(DependencyTarget::Application(key))
            } else {
                Err(Error::dependency(
                    app.display_name(),
                    target,
                    format!("no application named {} in namespace {}", target, namespace),
                ))
            };
        }

        let local = (app.namespace.clone(), target.to_string());
        if self.graph.nodes.contains_key(&local) {
            return Ok(DependencyTarget::Application(local));
        }

        match self.by_name.get(target).map(Vec::as_slice) {
            Some([namespace]) => Ok(DependencyTarget::Application((
                namespace.to_string(),
                target.to_string(),
            ))),
            Some(namespaces) if namespaces.len() > 1 => Err(Error::dependency(
                app.display_name(),
                target,
                format!(
                    "ambiguous target, declared in namespaces {}; set dependency namespace",
                    namespaces.join(", ")
                ),
            )),
            _ => Err(Error::dependency(
                app.display_name(),
                target,
                format!(
                    "no application named {} in the batch and dependency is not marked external",
                    target
                ),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declaration::{ComplianceLevel, ComplianceRequest, PortSpec};

    fn app(namespace: &str, name: &str, ports: &[u16], deps: Vec<DependencyRef>) -> Application {
        Application {
            name: name.into(),
            namespace: namespace.into(),
            image: format!("{}:1", name),
            replicas: 1,
            ports: ports.iter().map(|p| PortSpec::tcp(*p)).collect(),
            dependencies: deps,
            compliance: ComplianceRequest::new("SOC2", ComplianceLevel::Medium, "team"),
            labels: Default::default(),
            annotations: Default::default(),
        }
    }

    fn qn(namespace: &str, name: &str) -> QualifiedName {
        (namespace.to_string(), name.to_string())
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    #[test]
    fn resolves_same_namespace_dependency() {
        let apps = vec![
            app("default", "api", &[8080], vec![DependencyRef::on("db", 5432)]),
            app("default", "db", &[5432], vec![]),
        ];
        let graph = DependencyGraph::build(&apps).unwrap();

        let edges = graph.outbound_edges("default", "api");
        assert_eq!(edges.len(), 1);
        assert_eq!(
            edges[0].target,
            DependencyTarget::Application(qn("default", "db"))
        );
        assert_eq!(graph.dependents("default", "db"), vec![&qn("default", "api")]);
    }

    #[test]
    fn unresolved_dependency_is_fatal() {
        let apps = vec![app("default", "api", &[], vec![DependencyRef::on("db", 5432)])];
        match DependencyGraph::build(&apps).unwrap_err() {
            Error::DependencyResolution {
                application,
                target,
                ..
            } => {
                assert_eq!(application, "default/api");
                assert_eq!(target, "db");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn undeclared_callee_port_still_resolves() {
        let apps = vec![
            app("default", "api", &[8080], vec![DependencyRef::on("db", 6432)]),
            app("default", "db", &[5432], vec![]),
        ];
        let graph = DependencyGraph::build(&apps).unwrap();
        assert_eq!(graph.outbound_edges("default", "api")[0].port, 6432);
        assert_eq!(qualified_display(&qn("default", "db")), "default/db");
    }

    #[test]
    fn unique_name_resolves_across_namespaces() {
        let apps = vec![
            app("web", "api", &[], vec![DependencyRef::on("db", 5432)]),
            app("data", "db", &[5432], vec![]),
        ];
        let graph = DependencyGraph::build(&apps).unwrap();
        assert_eq!(
            graph.outbound_edges("web", "api")[0].target,
            DependencyTarget::Application(qn("data", "db"))
        );
    }

    #[test]
    fn same_namespace_wins_over_other_namespaces() {
        let apps = vec![
            app("web", "api", &[], vec![DependencyRef::on("db", 5432)]),
            app("web", "db", &[5432], vec![]),
            app("data", "db", &[5432], vec![]),
        ];
        let graph = DependencyGraph::build(&apps).unwrap();
        assert_eq!(
            graph.outbound_edges("web", "api")[0].target,
            DependencyTarget::Application(qn("web", "db"))
        );
    }

    #[test]
    fn ambiguous_name_is_fatal() {
        let apps = vec![
            app("web", "api", &[], vec![DependencyRef::on("db", 5432)]),
            app("a", "db", &[5432], vec![]),
            app("b", "db", &[5432], vec![]),
        ];
        let err = DependencyGraph::build(&apps).unwrap_err();
        assert!(err.to_string().contains("ambiguous"));
    }

    #[test]
    fn explicit_namespace_is_respected() {
        let apps = vec![
            app("web", "api", &[], vec![DependencyRef::on("db", 5432).in_namespace("b")]),
            app("a", "db", &[5432], vec![]),
            app("b", "db", &[5432], vec![]),
        ];
        let graph = DependencyGraph::build(&apps).unwrap();
        assert_eq!(
            graph.outbound_edges("web", "api")[0].target,
            DependencyTarget::Application(qn("b", "db"))
        );
    }

    #[test]
    fn external_targets_do_not_need_declarations() {
        let apps = vec![app(
            "default",
            "api",
            &[],
            vec![
                DependencyRef::on("10.0.0.5", 443).external(),
                DependencyRef::on("api.stripe.com", 443).external(),
            ],
        )];
        let graph = DependencyGraph::build(&apps).unwrap();
        let targets: Vec<_> = graph
            .outbound_edges("default", "api")
            .into_iter()
            .map(|e| e.target.clone())
            .collect();
        assert!(targets.contains(&DependencyTarget::External(ExternalTarget::Cidr(
            "10.0.0.5/32".into()
        ))));
        assert!(targets.contains(&DependencyTarget::External(ExternalTarget::Fqdn(
            "api.stripe.com".into()
        ))));
    }

    #[test]
    fn duplicate_applications_are_rejected() {
        let apps = vec![app("default", "api", &[], vec![]), app("default", "api", &[], vec![])];
        assert!(matches!(
            DependencyGraph::build(&apps).unwrap_err(),
            Error::DuplicateApplication { .. }
        ));
    }

    // =========================================================================
    // Edge shaping
    // =========================================================================

    #[test]
    fn self_dependency_is_recorded_but_not_an_edge() {
        let apps = vec![app("default", "api", &[8080], vec![DependencyRef::on("api", 8080)])];
        let graph = DependencyGraph::build(&apps).unwrap();
        assert!(graph.outbound_edges("default", "api").is_empty());
        assert!(graph.get_application("default", "api").unwrap().self_dependent);
    }

    #[test]
    fn duplicate_edges_are_collapsed() {
        let apps = vec![
            app(
                "default",
                "api",
                &[],
                vec![DependencyRef::on("db", 5432), DependencyRef::on("db", 5432)],
            ),
            app("default", "db", &[5432], vec![]),
        ];
        let graph = DependencyGraph::build(&apps).unwrap();
        assert_eq!(graph.outbound_edges("default", "api").len(), 1);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn different_ports_are_distinct_edges() {
        let apps = vec![
            app(
                "default",
                "api",
                &[],
                vec![DependencyRef::on("db", 5432), DependencyRef::on("db", 5433)],
            ),
            app("default", "db", &[5432, 5433], vec![]),
        ];
        let graph = DependencyGraph::build(&apps).unwrap();
        assert_eq!(graph.outbound_edges("default", "api").len(), 2);
    }

    // =========================================================================
    // Cycles
    // =========================================================================

    #[test]
    fn acyclic_graph_has_no_cycles() {
        let apps = vec![
            app("default", "a", &[80], vec![DependencyRef::on("b", 80)]),
            app("default", "b", &[80], vec![DependencyRef::on("c", 80)]),
            app("default", "c", &[80], vec![]),
        ];
        assert!(DependencyGraph::build(&apps).unwrap().cycles().is_empty());
    }

    #[test]
    fn two_node_cycle_is_found() {
        let apps = vec![
            app("default", "a", &[80], vec![DependencyRef::on("b", 80)]),
            app("default", "b", &[80], vec![DependencyRef::on("a", 80)]),
        ];
        let cycles = DependencyGraph::build(&apps).unwrap().cycles();
        assert_eq!(cycles, vec![vec!["default/a", "default/b", "default/a"]]);
    }

    #[test]
    fn self_dependency_is_not_a_cycle() {
        let apps = vec![app("default", "a", &[80], vec![DependencyRef::on("a", 80)])];
        assert!(DependencyGraph::build(&apps).unwrap().cycles().is_empty());
    }
}
