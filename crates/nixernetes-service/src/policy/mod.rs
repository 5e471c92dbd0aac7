//! Security resources derived from dependency intent and compliance flags
//!
//! - **NetworkPolicy**: one default-deny policy per application when the
//!   profile requires it, with an ingress allow per exposed port and an
//!   egress allow per outbound dependency edge
//! - **RBAC**: a dedicated ServiceAccount, a namespace-scoped Role reading
//!   only the application's own ConfigMap and Secret, its binding, and at
//!   level high and above the audit reader ClusterRole with a binding to it
//!
//! Ingress is open to any source on declared ports while egress is limited
//! to declared dependencies, since the graph only records outbound calls.

pub mod types;

use std::collections::BTreeMap;

use tracing::{debug, warn};

use nixernetes_common::declaration::{Application, ExternalTarget, Protocol};
use nixernetes_common::graph::{DependencyEdge, DependencyGraph, DependencyTarget};
use nixernetes_common::meta::ObjectMeta;
use nixernetes_common::{
    CompilerConfig, Error, LABEL_NAME, LABEL_NAMESPACE_NAME, SUFFIX_AUDIT_READER,
    SUFFIX_CONFIG_READER, SUFFIX_DEFAULT_DENY,
};
use nixernetes_compliance::ComplianceProfile;
use nixernetes_manifest::{GeneratedResource, Provenance, ResourceKind, VersionResolver};

use crate::workload::LabelSelector;

pub use types::{
    IpBlock, NetworkPolicyEgressRule, NetworkPolicyIngressRule, NetworkPolicyPeer,
    NetworkPolicyPort, NetworkPolicySpec, PolicyRule, RoleRef, Subject, RBAC_API_GROUP,
};

/// Namespace holding cluster DNS
const DNS_NAMESPACE: &str = "kube-system";

/// Pod label of cluster DNS
const DNS_POD_LABEL: (&str, &str) = ("k8s-app", "kube-dns");

const DNS_PORT: u16 = 53;

// =============================================================================
// Generated Policies Container
// =============================================================================

/// NetworkPolicies generated for one application
#[derive(Clone, Debug, Default)]
pub struct GeneratedPolicies {
    /// NetworkPolicies (zero or one today)
    pub network_policies: Vec<GeneratedResource>,
    /// Findings to attach to the NetworkPolicy's diagnostics
    pub warnings: Vec<String>,
}

impl GeneratedPolicies {
    /// Create empty policy collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if any policies were generated
    pub fn is_empty(&self) -> bool {
        self.network_policies.is_empty()
    }
}

// =============================================================================
// Policy Generator
// =============================================================================

/// Generates NetworkPolicies and RBAC for applications in a graph
pub struct PolicyGenerator<'a> {
    graph: &'a DependencyGraph,
    config: &'a CompilerConfig,
    resolver: &'a VersionResolver,
    target_version: &'a str,
}

impl<'a> PolicyGenerator<'a> {
    /// Create a policy generator
    ///
    /// # Arguments
    /// * `graph` - Resolved dependency graph of the batch
    /// * `config` - Compiler configuration (DNS egress, audit role)
    /// * `resolver` - apiVersion table
    /// * `target_version` - Kubernetes version resources are generated for
    pub fn new(
        graph: &'a DependencyGraph,
        config: &'a CompilerConfig,
        resolver: &'a VersionResolver,
        target_version: &'a str,
    ) -> Self {
        Self {
            graph,
            config,
            resolver,
            target_version,
        }
    }

    fn resource(
        &self,
        kind: ResourceKind,
        metadata: ObjectMeta,
        provenance: Provenance,
    ) -> Result<GeneratedResource, Error> {
        let api_version = self.resolver.resolve_kind(kind, self.target_version)?;
        Ok(GeneratedResource::new(kind, api_version, metadata, provenance))
    }

    /// Generate the application's NetworkPolicies.
    ///
    /// Returns nothing when the profile does not require network policy.
    pub fn generate_network_policies(
        &self,
        app: &Application,
        profile: &ComplianceProfile,
    ) -> Result<GeneratedPolicies, Error> {
        let mut output = GeneratedPolicies::new();
        if !profile.require_network_policy {
            debug!(app = %app.display_name(), "network policy not required");
            return Ok(output);
        }

        let ingress = app
            .ports
            .iter()
            .map(|p| NetworkPolicyIngressRule {
                from: vec![],
                ports: vec![policy_port(p.container_port, p.protocol)],
            })
            .collect();

        let mut egress = Vec::new();
        for edge in self.graph.outbound_edges(&app.namespace, &app.name) {
            let (rule, warning) = self.egress_rule(app, edge);
            egress.push(rule);
            if let Some(warning) = warning {
                warn!(app = %app.display_name(), "{}", warning);
                output.warnings.push(warning);
            }
        }
        if self.config.allow_dns_egress {
            egress.push(dns_egress_rule());
        }

        let spec = NetworkPolicySpec {
            pod_selector: LabelSelector::for_application(&app.name),
            policy_types: vec!["Ingress".to_string(), "Egress".to_string()],
            ingress,
            egress,
        };
        debug!(
            app = %app.display_name(),
            ingress = spec.ingress.len(),
            egress = spec.egress.len(),
            "network policy generated"
        );

        let metadata = ObjectMeta::new(format!("{}{}", app.name, SUFFIX_DEFAULT_DENY), &app.namespace)
            .with_label(LABEL_NAME, &app.name);
        output.network_policies.push(
            self.resource(ResourceKind::NetworkPolicy, metadata, Provenance::Policy)?
                .with_spec(&spec)?,
        );
        Ok(output)
    }

    fn egress_rule(
        &self,
        app: &Application,
        edge: &DependencyEdge,
    ) -> (NetworkPolicyEgressRule, Option<String>) {
        let ports = vec![policy_port(edge.port, edge.protocol)];
        match &edge.target {
            DependencyTarget::Application((namespace, name)) => {
                let namespace_selector = (namespace != &app.namespace).then(|| LabelSelector {
                    match_labels: BTreeMap::from([(
                        LABEL_NAMESPACE_NAME.to_string(),
                        namespace.clone(),
                    )]),
                });
                let peer = NetworkPolicyPeer {
                    pod_selector: Some(LabelSelector::for_application(name)),
                    namespace_selector,
                    ip_block: None,
                };
                (
                    NetworkPolicyEgressRule {
                        to: vec![peer],
                        ports,
                    },
                    None,
                )
            }
            DependencyTarget::External(ExternalTarget::Cidr(cidr)) => (
                NetworkPolicyEgressRule {
                    to: vec![NetworkPolicyPeer {
                        ip_block: Some(IpBlock { cidr: cidr.clone() }),
                        ..Default::default()
                    }],
                    ports,
                },
                None,
            ),
            DependencyTarget::External(ExternalTarget::Fqdn(host)) => (
                NetworkPolicyEgressRule { to: vec![], ports },
                Some(format!(
                    "spec.egress: {}:{} cannot be selected by hostname, egress on port {} is allowed to any destination",
                    host, edge.port, edge.port
                )),
            ),
        }
    }

    /// Generate the application's RBAC resources.
    ///
    /// Purely a function of the application's identity and compliance level.
    pub fn generate_rbac(
        &self,
        app: &Application,
        profile: &ComplianceProfile,
    ) -> Result<Vec<GeneratedResource>, Error> {
        let mut resources = Vec::with_capacity(5);

        resources.push(
            self.resource(
                ResourceKind::ServiceAccount,
                self.rbac_meta(app, &app.name),
                Provenance::Rbac,
            )?
            .with_field("automountServiceAccountToken", &false)?,
        );

        let role_name = format!("{}{}", app.name, SUFFIX_CONFIG_READER);
        let rules = vec![PolicyRule {
            api_groups: vec![String::new()],
            resources: vec!["configmaps".to_string(), "secrets".to_string()],
            resource_names: vec![app.name.clone()],
            verbs: vec!["get".to_string(), "watch".to_string()],
        }];
        resources.push(
            self.resource(
                ResourceKind::Role,
                self.rbac_meta(app, &role_name),
                Provenance::Rbac,
            )?
            .with_field("rules", &rules)?,
        );
        resources.push(self.binding(app, &role_name, "Role", &role_name)?);

        if profile.requires_audit_reader() {
            resources.push(self.audit_reader_cluster_role()?);
            let binding_name = format!("{}{}", app.name, SUFFIX_AUDIT_READER);
            resources.push(self.binding(
                app,
                &binding_name,
                "ClusterRole",
                &self.config.audit_reader_cluster_role,
            )?);
        }

        debug!(app = %app.display_name(), count = resources.len(), "rbac generated");
        Ok(resources)
    }

    /// Cluster-wide read access to events and pod logs. Every application
    /// at level high and above binds to the same role, so the batch keeps
    /// one copy.
    fn audit_reader_cluster_role(&self) -> Result<GeneratedResource, Error> {
        let read = || vec!["get".to_string(), "list".to_string(), "watch".to_string()];
        let rules = vec![
            PolicyRule {
                api_groups: vec![String::new()],
                resources: vec!["events".to_string(), "pods/log".to_string()],
                resource_names: vec![],
                verbs: read(),
            },
            PolicyRule {
                api_groups: vec!["events.k8s.io".to_string()],
                resources: vec!["events".to_string()],
                resource_names: vec![],
                verbs: read(),
            },
        ];
        self.resource(
            ResourceKind::ClusterRole,
            ObjectMeta::cluster_scoped(&self.config.audit_reader_cluster_role),
            Provenance::Rbac,
        )?
        .with_field("rules", &rules)
    }

    fn rbac_meta(&self, app: &Application, name: &str) -> ObjectMeta {
        ObjectMeta::new(name, &app.namespace).with_label(LABEL_NAME, &app.name)
    }

    fn binding(
        &self,
        app: &Application,
        name: &str,
        role_kind: &str,
        role_name: &str,
    ) -> Result<GeneratedResource, Error> {
        let role_ref = RoleRef {
            api_group: RBAC_API_GROUP.to_string(),
            kind: role_kind.to_string(),
            name: role_name.to_string(),
        };
        let subjects = vec![Subject::service_account(&app.name, &app.namespace)];
        self.resource(
            ResourceKind::RoleBinding,
            self.rbac_meta(app, name),
            Provenance::Rbac,
        )?
        .with_field("roleRef", &role_ref)?
        .with_field("subjects", &subjects)
    }
}

fn policy_port(port: u16, protocol: Protocol) -> NetworkPolicyPort {
    NetworkPolicyPort {
        protocol: protocol.to_string(),
        port,
    }
}

fn dns_egress_rule() -> NetworkPolicyEgressRule {
    NetworkPolicyEgressRule {
        to: vec![NetworkPolicyPeer {
            pod_selector: Some(LabelSelector {
                match_labels: BTreeMap::from([(
                    DNS_POD_LABEL.0.to_string(),
                    DNS_POD_LABEL.1.to_string(),
                )]),
            }),
            namespace_selector: Some(LabelSelector {
                match_labels: BTreeMap::from([(
                    LABEL_NAMESPACE_NAME.to_string(),
                    DNS_NAMESPACE.to_string(),
                )]),
            }),
            ip_block: None,
        }],
        ports: vec![
            policy_port(DNS_PORT, Protocol::Udp),
            policy_port(DNS_PORT, Protocol::Tcp),
        ],
    }
}
