//! Workload resources for an application
//!
//! - Deployment: the application's pods
//! - Service: ClusterIP exposure of declared ports (only when ports exist)
//! - Namespace: when namespaces are managed, carrying Pod Security Admission labels
//!
//! Specs are typed here and converted into [`GeneratedResource`] bodies.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use nixernetes_common::declaration::Application;
use nixernetes_common::meta::ObjectMeta;
use nixernetes_common::{
    CompilerConfig, Error, ANNOTATION_ENCRYPTION, ANNOTATION_IMAGE_SCAN, DATAPLANE_MODE_AMBIENT,
    DEFAULT_NAMESPACE, LABEL_DATAPLANE_MODE, LABEL_NAME, LABEL_POD_SECURITY_ENFORCE,
};
use nixernetes_compliance::{ComplianceProfile, PodSecurityLevel};
use nixernetes_manifest::{GeneratedResource, Provenance, ResourceKind, VersionResolver};

/// Namespaces owned by Kubernetes itself, never emitted
pub const SYSTEM_NAMESPACES: &[&str] = &[
    DEFAULT_NAMESPACE,
    "kube-system",
    "kube-public",
    "kube-node-lease",
];

/// Value of workload compliance annotations
const REQUIRED: &str = "required";

// =============================================================================
// Shared
// =============================================================================

/// Label selector
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    /// Match labels
    #[serde(default)]
    pub match_labels: BTreeMap<String, String>,
}

impl LabelSelector {
    /// Selector for the pods of one application
    pub fn for_application(name: &str) -> Self {
        Self {
            match_labels: BTreeMap::from([(LABEL_NAME.to_string(), name.to_string())]),
        }
    }
}

// =============================================================================
// Deployment
// =============================================================================

/// Deployment spec
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentSpec {
    /// Number of replicas
    pub replicas: u32,
    /// Label selector
    pub selector: LabelSelector,
    /// Pod template
    pub template: PodTemplateSpec,
}

/// Pod template spec
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PodTemplateSpec {
    /// Pod metadata
    pub metadata: PodMeta,
    /// Pod spec
    pub spec: PodSpec,
}

/// Pod metadata
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PodMeta {
    /// Labels
    pub labels: BTreeMap<String, String>,
    /// Annotations
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

/// Pod spec
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    /// Service account name
    pub service_account_name: String,
    /// Whether to automount the service account token into pods
    pub automount_service_account_token: bool,
    /// Pod-level security context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_context: Option<PodSecurityContext>,
    /// Containers
    pub containers: Vec<Container>,
}

/// Pod-level security context
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PodSecurityContext {
    /// Refuse to start containers running as root
    pub run_as_non_root: bool,
    /// Seccomp profile
    pub seccomp_profile: SeccompProfile,
}

/// Seccomp profile reference
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SeccompProfile {
    /// Profile type (RuntimeDefault, Localhost, Unconfined)
    #[serde(rename = "type")]
    pub type_: String,
}

/// Container
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    /// Container name
    pub name: String,
    /// Image reference
    pub image: String,
    /// Exposed ports
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<ContainerPort>,
    /// Container-level security context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_context: Option<SecurityContext>,
}

/// Container port
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContainerPort {
    /// Port name
    pub name: String,
    /// Port number
    pub container_port: u16,
    /// Protocol
    pub protocol: String,
}

/// Container-level security context
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecurityContext {
    /// Block setuid escalation
    pub allow_privilege_escalation: bool,
    /// Refuse to run as root
    pub run_as_non_root: bool,
    /// Capability changes
    pub capabilities: Capabilities,
}

/// Linux capability changes
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    /// Capabilities to drop
    pub drop: Vec<String>,
}

// =============================================================================
// Service
// =============================================================================

/// Service spec
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSpec {
    /// Service type
    #[serde(rename = "type")]
    pub type_: String,
    /// Pod selector
    pub selector: BTreeMap<String, String>,
    /// Ports
    pub ports: Vec<ServicePort>,
}

/// Service port
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServicePort {
    /// Port name
    pub name: String,
    /// Service port
    pub port: u16,
    /// Container port
    pub target_port: u16,
    /// Protocol
    pub protocol: String,
}

// =============================================================================
// Generated Workloads Container
// =============================================================================

/// Workload resources generated for one application
#[derive(Clone, Debug, Default)]
pub struct GeneratedWorkloads {
    /// Namespace (only when namespaces are managed)
    pub namespace: Option<GeneratedResource>,
    /// Deployment
    pub deployment: Option<GeneratedResource>,
    /// Service (only when the application exposes ports)
    pub service: Option<GeneratedResource>,
}

impl GeneratedWorkloads {
    /// Check if no workload resources were generated
    pub fn is_empty(&self) -> bool {
        self.namespace.is_none() && self.deployment.is_none() && self.service.is_none()
    }

    /// Total count of generated resources
    pub fn total_count(&self) -> usize {
        [&self.namespace, &self.deployment, &self.service]
            .iter()
            .filter(|r| r.is_some())
            .count()
    }
}

// =============================================================================
// Workload Compiler
// =============================================================================

/// Generates base workload resources for an application
pub struct WorkloadCompiler<'a> {
    config: &'a CompilerConfig,
    resolver: &'a VersionResolver,
    target_version: &'a str,
}

impl<'a> WorkloadCompiler<'a> {
    /// Create a workload compiler for a target version
    pub fn new(
        config: &'a CompilerConfig,
        resolver: &'a VersionResolver,
        target_version: &'a str,
    ) -> Self {
        Self {
            config,
            resolver,
            target_version,
        }
    }

    /// Compile the application's workload resources
    pub fn compile(
        &self,
        app: &Application,
        profile: &ComplianceProfile,
    ) -> Result<GeneratedWorkloads, Error> {
        let namespace = if self.config.manage_namespaces
            && !SYSTEM_NAMESPACES.contains(&app.namespace.as_str())
        {
            Some(self.compile_namespace(app, profile)?)
        } else {
            None
        };

        let service = if app.ports.is_empty() {
            None
        } else {
            Some(self.compile_service(app)?)
        };

        Ok(GeneratedWorkloads {
            namespace,
            deployment: Some(self.compile_deployment(app, profile)?),
            service,
        })
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

    fn compile_namespace(
        &self,
        app: &Application,
        profile: &ComplianceProfile,
    ) -> Result<GeneratedResource, Error> {
        let metadata = ObjectMeta::cluster_scoped(&app.namespace)
            .with_label(LABEL_POD_SECURITY_ENFORCE, profile.pod_security_level.as_str());
        self.resource(ResourceKind::Namespace, metadata, Provenance::InjectedMetadata)
    }

    fn compile_deployment(
        &self,
        app: &Application,
        profile: &ComplianceProfile,
    ) -> Result<GeneratedResource, Error> {
        let mut metadata =
            ObjectMeta::new(&app.name, &app.namespace).with_label(LABEL_NAME, &app.name);
        if profile.require_encryption {
            metadata = metadata.with_annotation(ANNOTATION_ENCRYPTION, REQUIRED);
        }
        if profile.require_image_scan {
            metadata = metadata.with_annotation(ANNOTATION_IMAGE_SCAN, REQUIRED);
        }

        let mut pod_labels = app.labels.clone();
        pod_labels.insert(LABEL_NAME.to_string(), app.name.clone());
        if profile.require_mutual_tls {
            pod_labels.insert(
                LABEL_DATAPLANE_MODE.to_string(),
                DATAPLANE_MODE_AMBIENT.to_string(),
            );
        }

        let restricted = profile.pod_security_level == PodSecurityLevel::Restricted;

        let container = Container {
            name: app.name.clone(),
            image: app.image.clone(),
            ports: app
                .ports
                .iter()
                .map(|p| ContainerPort {
                    name: p.port_name(),
                    container_port: p.container_port,
                    protocol: p.protocol.to_string(),
                })
                .collect(),
            security_context: restricted.then(|| SecurityContext {
                allow_privilege_escalation: false,
                run_as_non_root: true,
                capabilities: Capabilities {
                    drop: vec!["ALL".to_string()],
                },
            }),
        };

        let spec = DeploymentSpec {
            replicas: app.replicas,
            selector: LabelSelector::for_application(&app.name),
            template: PodTemplateSpec {
                metadata: PodMeta {
                    labels: pod_labels,
                    annotations: app.annotations.clone(),
                },
                spec: PodSpec {
                    service_account_name: app.name.clone(),
                    automount_service_account_token: false,
                    security_context: restricted.then(|| PodSecurityContext {
                        run_as_non_root: true,
                        seccomp_profile: SeccompProfile {
                            type_: "RuntimeDefault".to_string(),
                        },
                    }),
                    containers: vec![container],
                },
            },
        };

        self.resource(ResourceKind::Deployment, metadata, Provenance::Workload)?
            .with_spec(&spec)
    }

    fn compile_service(&self, app: &Application) -> Result<GeneratedResource, Error> {
        let metadata =
            ObjectMeta::new(&app.name, &app.namespace).with_label(LABEL_NAME, &app.name);
        let spec = ServiceSpec {
            type_: "ClusterIP".to_string(),
            selector: LabelSelector::for_application(&app.name).match_labels,
            ports: app
                .ports
                .iter()
                .map(|p| ServicePort {
                    name: p.port_name(),
                    port: p.container_port,
                    target_port: p.container_port,
                    protocol: p.protocol.to_string(),
                })
                .collect(),
        };
        self.resource(ResourceKind::Service, metadata, Provenance::Workload)?
            .with_spec(&spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nixernetes_common::declaration::{ComplianceLevel, ComplianceRequest, PortSpec};
    use nixernetes_compliance::ComplianceProfileResolver;

    fn app() -> Application {
        Application {
            name: "api".into(),
            namespace: "shop".into(),
            image: "registry.example.com/api:1.0".into(),
            replicas: 3,
            ports: vec![PortSpec::tcp(8080)],
            dependencies: vec![],
            compliance: ComplianceRequest::new("SOC2", ComplianceLevel::Medium, "team"),
            labels: BTreeMap::from([("tier".to_string(), "backend".to_string())]),
            annotations: BTreeMap::new(),
        }
    }

    fn compile(app: &Application, level: ComplianceLevel, config: &CompilerConfig) -> GeneratedWorkloads {
        let profile = ComplianceProfileResolver::global().resolve(level);
        WorkloadCompiler::new(config, VersionResolver::global(), "1.30")
            .compile(app, &profile)
            .unwrap()
    }

    #[test]
    fn deployment_selects_its_own_pods() {
        let out = compile(&app(), ComplianceLevel::Medium, &CompilerConfig::default());
        let deployment = out.deployment.unwrap();
        let spec = deployment.spec().unwrap();

        assert_eq!(deployment.api_version, "apps/v1");
        assert_eq!(spec["replicas"], 3);
        assert_eq!(spec["selector"]["matchLabels"][LABEL_NAME], "api");
        assert_eq!(spec["template"]["metadata"]["labels"][LABEL_NAME], "api");
        assert_eq!(spec["template"]["metadata"]["labels"]["tier"], "backend");
        assert_eq!(spec["template"]["spec"]["serviceAccountName"], "api");
        assert_eq!(spec["template"]["spec"]["automountServiceAccountToken"], false);
        assert_eq!(
            spec["template"]["spec"]["containers"][0]["ports"][0]["name"],
            "tcp-8080"
        );
    }

    #[test]
    fn service_only_when_ports_exist() {
        let out = compile(&app(), ComplianceLevel::Low, &CompilerConfig::default());
        let service = out.service.unwrap();
        assert_eq!(service.spec().unwrap()["ports"][0]["port"], 8080);
        assert_eq!(service.spec().unwrap()["type"], "ClusterIP");

        let mut portless = app();
        portless.ports.clear();
        let out = compile(&portless, ComplianceLevel::Low, &CompilerConfig::default());
        assert!(out.service.is_none());
        assert_eq!(out.total_count(), 1);
    }

    #[test]
    fn medium_adds_image_scan_annotation_only() {
        let out = compile(&app(), ComplianceLevel::Medium, &CompilerConfig::default());
        let meta = out.deployment.unwrap().metadata;
        assert_eq!(meta.annotations.get(ANNOTATION_IMAGE_SCAN).map(String::as_str), Some("required"));
        assert!(!meta.annotations.contains_key(ANNOTATION_ENCRYPTION));
    }

    #[test]
    fn high_enrolls_pods_in_mesh_and_requires_encryption() {
        let out = compile(&app(), ComplianceLevel::High, &CompilerConfig::default());
        let deployment = out.deployment.unwrap();
        assert!(deployment.metadata.annotations.contains_key(ANNOTATION_ENCRYPTION));
        assert_eq!(
            deployment.spec().unwrap()["template"]["metadata"]["labels"][LABEL_DATAPLANE_MODE],
            "ambient"
        );
    }

    #[test]
    fn restricted_hardens_security_contexts() {
        let out = compile(&app(), ComplianceLevel::Restricted, &CompilerConfig::default());
        let spec = out.deployment.unwrap().spec().cloned().unwrap();
        let pod = &spec["template"]["spec"];
        assert_eq!(pod["securityContext"]["runAsNonRoot"], true);
        assert_eq!(pod["securityContext"]["seccompProfile"]["type"], "RuntimeDefault");
        let container = &pod["containers"][0]["securityContext"];
        assert_eq!(container["allowPrivilegeEscalation"], false);
        assert_eq!(container["capabilities"]["drop"][0], "ALL");
    }

    #[test]
    fn baseline_leaves_security_contexts_unset() {
        let out = compile(&app(), ComplianceLevel::High, &CompilerConfig::default());
        let spec = out.deployment.unwrap().spec().cloned().unwrap();
        assert!(spec["template"]["spec"].get("securityContext").is_none());
    }

    #[test]
    fn managed_namespace_carries_pod_security_level() {
        let config = CompilerConfig {
            manage_namespaces: true,
            ..Default::default()
        };
        let out = compile(&app(), ComplianceLevel::Restricted, &config);
        let namespace = out.namespace.unwrap();
        assert_eq!(namespace.metadata.name, "shop");
        assert!(namespace.metadata.namespace.is_none());
        assert_eq!(
            namespace.metadata.labels.get(LABEL_POD_SECURITY_ENFORCE).map(String::as_str),
            Some("restricted")
        );
        assert_eq!(namespace.provenance, Provenance::InjectedMetadata);
    }

    #[test]
    fn system_namespaces_are_never_emitted() {
        let config = CompilerConfig {
            manage_namespaces: true,
            ..Default::default()
        };
        let mut a = app();
        a.namespace = "default".into();
        assert!(compile(&a, ComplianceLevel::Low, &config).namespace.is_none());
    }
}
