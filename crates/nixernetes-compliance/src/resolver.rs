//! Level and environment profile tables
//!
//! Both tables are built once on first use and never modified. Each level's
//! entry is derived from the entry below it, so a higher level always
//! requires everything a lower one does.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use tracing::debug;

use nixernetes_common::declaration::{ComplianceLevel, ComplianceRequest};
use nixernetes_common::Error;

use crate::profile::{ComplianceProfile, PodSecurityLevel, ProfileOverrides};

/// An environment profile: a level plus explicit flag overrides
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamedProfile {
    /// Profile name
    pub name: &'static str,
    /// Base level
    pub level: ComplianceLevel,
    /// Flags set regardless of the level's table entry
    pub overrides: ProfileOverrides,
}

/// Resolves levels and named profiles to [`ComplianceProfile`]s
#[derive(Debug)]
pub struct ComplianceProfileResolver {
    levels: BTreeMap<ComplianceLevel, ComplianceProfile>,
    named: Vec<NamedProfile>,
}

static GLOBAL: OnceLock<ComplianceProfileResolver> = OnceLock::new();

impl ComplianceProfileResolver {
    /// Shared resolver, built on first use
    pub fn global() -> &'static ComplianceProfileResolver {
        GLOBAL.get_or_init(Self::build)
    }

    fn build() -> Self {
        let mut levels = BTreeMap::new();
        let mut current = unrestricted();
        for level in ComplianceLevel::ALL {
            current = tighten(current, level);
            levels.insert(level, current.clone());
        }

        let named = vec![
            NamedProfile {
                name: "development",
                level: ComplianceLevel::Low,
                overrides: ProfileOverrides::default(),
            },
            NamedProfile {
                name: "staging",
                level: ComplianceLevel::Medium,
                overrides: ProfileOverrides::default(),
            },
            NamedProfile {
                name: "production",
                level: ComplianceLevel::High,
                overrides: ProfileOverrides::default(),
            },
            NamedProfile {
                name: "regulated",
                level: ComplianceLevel::Restricted,
                overrides: ProfileOverrides {
                    require_binary_authorization: Some(true),
                    ..Default::default()
                },
            },
        ];

        Self { levels, named }
    }

    /// Profile for a level
    pub fn resolve(&self, level: ComplianceLevel) -> ComplianceProfile {
        self.levels
            .get(&level)
            .cloned()
            .unwrap_or_else(|| tighten(unrestricted(), level))
    }

    /// Profile for a level name (aliases accepted)
    pub fn resolve_level_name(&self, name: &str) -> Result<ComplianceProfile, Error> {
        name.parse::<ComplianceLevel>().map(|level| self.resolve(level))
    }

    /// Profile for a named environment
    pub fn resolve_named(&self, name: &str) -> Result<ComplianceProfile, Error> {
        let named = self
            .named
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::UnknownComplianceLevel {
                value: name.to_string(),
                expected: self.profile_names().join(", "),
            })?;
        Ok(self.resolve(named.level).with_overrides(&named.overrides))
    }

    /// Effective profile for an application's request: the level's profile,
    /// tightened by the environment profile when one is named
    pub fn resolve_request(&self, request: &ComplianceRequest) -> Result<ComplianceProfile, Error> {
        let base = self.resolve(request.level);
        let profile = match &request.environment {
            Some(environment) => base.strictest(&self.resolve_named(environment)?),
            None => base,
        };
        debug!(
            level = %request.level,
            environment = request.environment.as_deref().unwrap_or("-"),
            effective = %profile.level,
            "compliance profile resolved"
        );
        Ok(profile)
    }

    /// Names of the environment profiles
    pub fn profile_names(&self) -> Vec<&'static str> {
        self.named.iter().map(|p| p.name).collect()
    }

    /// Environment profiles, for display
    pub fn named_profiles(&self) -> &[NamedProfile] {
        &self.named
    }
}

fn unrestricted() -> ComplianceProfile {
    ComplianceProfile {
        level: ComplianceLevel::Unrestricted,
        require_audit: false,
        require_encryption: false,
        require_network_policy: false,
        require_mutual_tls: false,
        require_binary_authorization: false,
        require_image_scan: false,
        pod_security_level: PodSecurityLevel::Baseline,
    }
}

/// Add what `level` requires on top of `profile`. Never clears a flag.
fn tighten(mut profile: ComplianceProfile, level: ComplianceLevel) -> ComplianceProfile {
    profile.level = level;
    if level >= ComplianceLevel::Low {
        profile.require_audit = true;
    }
    if level >= ComplianceLevel::Medium {
        profile.require_network_policy = true;
        profile.require_image_scan = true;
    }
    if level >= ComplianceLevel::High {
        profile.require_encryption = true;
        profile.require_mutual_tls = true;
    }
    if level >= ComplianceLevel::Restricted {
        profile.pod_security_level = PodSecurityLevel::Restricted;
    }
    profile
}
