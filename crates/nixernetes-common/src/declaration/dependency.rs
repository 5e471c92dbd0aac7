use std::net::IpAddr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::Protocol;
use crate::meta::validate_dns_subdomain;

/// An outbound call from one application to another (or to an external target)
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DependencyRef {
    /// Name of the target application, or a CIDR/IP/FQDN when `external`
    pub target_name: String,

    /// Destination port on the target
    pub port: u16,

    /// Protocol (TCP or UDP)
    #[serde(default)]
    pub protocol: Protocol,

    /// Namespace of the target application. When omitted the caller's
    /// namespace is tried first, then a unique match across the batch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Target lives outside the batch
    #[serde(default)]
    pub external: bool,
}

impl DependencyRef {
    /// TCP dependency on another application
    pub fn on(target_name: impl Into<String>, port: u16) -> Self {
        Self {
            target_name: target_name.into(),
            port,
            protocol: Protocol::Tcp,
            namespace: None,
            external: false,
        }
    }

    /// Pin the dependency to a namespace
    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Mark the dependency as external to the batch
    pub fn external(mut self) -> Self {
        self.external = true;
        self
    }
}

/// Destination of an external dependency
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ExternalTarget {
    /// IP range in CIDR notation. Bare addresses are widened to /32 or /128.
    Cidr(String),
    /// Hostname. NetworkPolicy cannot select by name so only the port is constrained.
    Fqdn(String),
}

impl ExternalTarget {
    /// Parse an external target from a dependency's `targetName`
    pub fn parse(target: &str) -> Result<Self, String> {
        if let Some((addr, prefix)) = target.split_once('/') {
            let ip: IpAddr = addr
                .parse()
                .map_err(|_| format!("'{}' is not a valid CIDR address", target))?;
            let max = if ip.is_ipv4() { 32 } else { 128 };
            match prefix.parse::<u8>() {
                Ok(len) if len <= max => return Ok(Self::Cidr(target.to_string())),
                _ => {
                    return Err(format!(
                        "'{}' has an invalid prefix length (0-{} allowed)",
                        target, max
                    ))
                }
            }
        }

        if let Ok(ip) = target.parse::<IpAddr>() {
            let len = if ip.is_ipv4() { 32 } else { 128 };
            return Ok(Self::Cidr(format!("{}/{}", ip, len)));
        }

        validate_dns_subdomain(target)
            .map(|_| Self::Fqdn(target.to_string()))
            .map_err(|e| format!("'{}' is neither an IP range nor a hostname: {}", target, e))
    }
}

impl std::fmt::Display for ExternalTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cidr(cidr) => f.write_str(cidr),
            Self::Fqdn(host) => f.write_str(host),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::v4_cidr("10.0.0.0/8", ExternalTarget::Cidr("10.0.0.0/8".into()))]
    #[case::v4_host("10.1.2.3", ExternalTarget::Cidr("10.1.2.3/32".into()))]
    #[case::v6_host("fd00::1", ExternalTarget::Cidr("fd00::1/128".into()))]
    #[case::fqdn("api.stripe.com", ExternalTarget::Fqdn("api.stripe.com".into()))]
    fn parses_external_targets(#[case] input: &str, #[case] expected: ExternalTarget) {
        assert_eq!(ExternalTarget::parse(input).unwrap(), expected);
    }

    #[rstest]
    #[case::prefix_too_long("10.0.0.0/33")]
    #[case::bad_address("10.0.0.300/24")]
    #[case::not_a_host("https://example.com")]
    fn rejects_malformed_targets(#[case] input: &str) {
        assert!(ExternalTarget::parse(input).is_err());
    }

    #[test]
    fn builder_sets_namespace_and_external() {
        let dep = DependencyRef::on("db", 5432).in_namespace("data");
        assert_eq!(dep.namespace.as_deref(), Some("data"));
        assert!(!dep.external);
        assert!(DependencyRef::on("1.1.1.1", 53).external().external);
    }

    #[test]
    fn deserializes_camel_case() {
        let dep: DependencyRef =
            serde_json::from_str(r#"{"targetName":"db","port":5432,"protocol":"UDP"}"#).unwrap();
        assert_eq!(dep.target_name, "db");
        assert_eq!(dep.protocol, Protocol::Udp);
        assert!(dep.namespace.is_none());
    }
}
