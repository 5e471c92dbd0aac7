use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};

/// Compliance frameworks with first-class support. Any other framework is
/// accepted but reported as a warning.
pub const KNOWN_FRAMEWORKS: &[&str] = &["PCI-DSS", "HIPAA", "SOC2", "ISO27001", "GDPR", "NIST"];

/// Ordered compliance tier. Each level requires everything the level below
/// it requires.
///
/// Deserialization goes through [`FromStr`](std::str::FromStr), so declarations
/// accept the same case-insensitive names and aliases as the CLI.
#[derive(Clone, Copy, Debug, Serialize, JsonSchema, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ComplianceLevel {
    /// No security artifacts are mandatory
    Unrestricted,
    /// Audit labelling (alias: permissive)
    Low,
    /// Network policy and image scanning (alias: standard)
    Medium,
    /// Encryption, mutual TLS and audit-log access (alias: strict)
    High,
    /// Restricted pod security
    Restricted,
}

impl ComplianceLevel {
    /// All levels from least to most strict
    pub const ALL: [ComplianceLevel; 5] = [
        Self::Unrestricted,
        Self::Low,
        Self::Medium,
        Self::High,
        Self::Restricted,
    ];

    /// Canonical lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unrestricted => "unrestricted",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Restricted => "restricted",
        }
    }

    fn expected() -> String {
        Self::ALL
            .iter()
            .map(ComplianceLevel::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl std::str::FromStr for ComplianceLevel {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "unrestricted" => Ok(Self::Unrestricted),
            "low" | "permissive" => Ok(Self::Low),
            "medium" | "standard" => Ok(Self::Medium),
            "high" | "strict" => Ok(Self::High),
            "restricted" => Ok(Self::Restricted),
            _ => Err(crate::Error::UnknownComplianceLevel {
                value: s.to_string(),
                expected: Self::expected(),
            }),
        }
    }
}

impl<'de> Deserialize<'de> for ComplianceLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Display for ComplianceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compliance posture requested by an application
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceRequest {
    /// Compliance framework (free-form, e.g. "SOC2")
    pub framework: String,

    /// Compliance level
    pub level: ComplianceLevel,

    /// Owning team or person
    pub owner: String,

    /// Named environment profile (development, staging, production,
    /// regulated). The effective profile is the stricter of this and `level`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
}

impl ComplianceRequest {
    /// Request with no environment profile
    pub fn new(
        framework: impl Into<String>,
        level: ComplianceLevel,
        owner: impl Into<String>,
    ) -> Self {
        Self {
            framework: framework.into(),
            level,
            owner: owner.into(),
            environment: None,
        }
    }

    /// Whether the framework is one of [`KNOWN_FRAMEWORKS`] (case-insensitive)
    pub fn is_known_framework(&self) -> bool {
        KNOWN_FRAMEWORKS
            .iter()
            .any(|known| known.eq_ignore_ascii_case(&self.framework))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::canonical("medium", ComplianceLevel::Medium)]
    #[case::uppercase("RESTRICTED", ComplianceLevel::Restricted)]
    #[case::alias_permissive("permissive", ComplianceLevel::Low)]
    #[case::alias_standard("standard", ComplianceLevel::Medium)]
    #[case::alias_strict("strict", ComplianceLevel::High)]
    fn parses_levels(#[case] input: &str, #[case] expected: ComplianceLevel) {
        assert_eq!(input.parse::<ComplianceLevel>().unwrap(), expected);
    }

    #[test]
    fn unknown_level_is_an_error() {
        let err = "paranoid".parse::<ComplianceLevel>().unwrap_err();
        match err {
            crate::Error::UnknownComplianceLevel { value, expected } => {
                assert_eq!(value, "paranoid");
                assert!(expected.contains("unrestricted"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn levels_are_strictly_ordered() {
        for pair in ComplianceLevel::ALL.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn deserializes_aliases() {
        let req: ComplianceRequest =
            serde_json::from_str(r#"{"framework":"SOC2","level":"strict","owner":"platform"}"#)
                .unwrap();
        assert_eq!(req.level, ComplianceLevel::High);
        assert!(req.environment.is_none());
    }

    #[test]
    fn deserializes_any_case() {
        let level: ComplianceLevel = serde_json::from_str(r#""High""#).unwrap();
        assert_eq!(level, ComplianceLevel::High);
    }

    #[test]
    fn unknown_level_in_a_declaration_names_the_accepted_levels() {
        let err = serde_json::from_str::<ComplianceRequest>(
            r#"{"framework":"SOC2","level":"extreme","owner":"platform"}"#,
        )
        .unwrap_err()
        .to_string();
        assert!(
            err.starts_with("unknown compliance level 'extreme' (expected one of: unrestricted, low"),
            "{err}"
        );
    }

    #[test]
    fn framework_registry_is_case_insensitive() {
        assert!(ComplianceRequest::new("soc2", ComplianceLevel::Low, "t").is_known_framework());
        assert!(!ComplianceRequest::new("FEDRAMP", ComplianceLevel::Low, "t").is_known_framework());
    }
}
