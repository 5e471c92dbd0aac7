use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Transport protocol of a port or dependency
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    /// TCP (default)
    #[default]
    Tcp,
    /// UDP
    Udp,
}

impl Protocol {
    /// Kubernetes spelling of the protocol
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tcp => "TCP",
            Self::Udp => "UDP",
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A port the application's container listens on
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PortSpec {
    /// Container port
    pub container_port: u16,

    /// Protocol (TCP or UDP)
    #[serde(default)]
    pub protocol: Protocol,

    /// Port name (defaults to "<protocol>-<port>")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl PortSpec {
    /// TCP port with a generated name
    pub fn tcp(container_port: u16) -> Self {
        Self {
            container_port,
            protocol: Protocol::Tcp,
            name: None,
        }
    }

    /// Name used for the container and Service port
    pub fn port_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!(
                "{}-{}",
                self.protocol.as_str().to_ascii_lowercase(),
                self.container_port
            ),
        }
    }
}
