//! Traceability and compliance metadata on every generated resource
//!
//! The injector first copies the application's own labels and annotations
//! onto the resource, then writes the reserved `nixernetes.io/` keys. A
//! reserved key that already holds a different value is a
//! [`Error::ReservedKeyConflict`]; the same value is left alone, so
//! injecting twice yields the same resource.

use std::collections::BTreeMap;

use tracing::debug;

use nixernetes_common::declaration::Application;
use nixernetes_common::{
    CompilerConfig, Error, ANNOTATION_OWNER, CREATED_BY_NIXERNETES, LABEL_COMPLIANCE,
    LABEL_COMPLIANCE_LEVEL, LABEL_CREATED_BY, LABEL_FRAMEWORK, LABEL_MODULE, LABEL_VERSION,
    RESERVED_KEY_PREFIX,
};
use nixernetes_compliance::ComplianceProfile;
use nixernetes_manifest::GeneratedResource;

/// Value of `nixernetes.io/compliance` when auditing is required
pub const COMPLIANCE_ENABLED: &str = "enabled";

/// Writes reserved metadata onto generated resources
#[derive(Clone, Copy, Debug)]
pub struct LabelAnnotationInjector<'a> {
    config: &'a CompilerConfig,
}

impl<'a> LabelAnnotationInjector<'a> {
    /// Create an injector stamping `config.framework_version`
    pub fn new(config: &'a CompilerConfig) -> Self {
        Self { config }
    }

    /// Reserved labels for a resource
    pub fn labels(
        &self,
        resource: &GeneratedResource,
        app: &Application,
        profile: &ComplianceProfile,
    ) -> BTreeMap<&'static str, String> {
        let mut labels = BTreeMap::from([
            (LABEL_FRAMEWORK, app.compliance.framework.clone()),
            (LABEL_VERSION, self.config.framework_version.clone()),
            (LABEL_MODULE, resource.provenance.as_str().to_string()),
            (LABEL_CREATED_BY, CREATED_BY_NIXERNETES.to_string()),
            (LABEL_COMPLIANCE_LEVEL, profile.level.as_str().to_string()),
        ]);
        if profile.require_audit {
            labels.insert(LABEL_COMPLIANCE, COMPLIANCE_ENABLED.to_string());
        }
        labels
    }

    /// Copy application metadata and write reserved keys onto `resource`
    pub fn inject(
        &self,
        mut resource: GeneratedResource,
        app: &Application,
        profile: &ComplianceProfile,
    ) -> Result<GeneratedResource, Error> {
        let reference = resource.reference();
        let reserved = self.labels(&resource, app, profile);

        for (key, value) in &app.labels {
            merge_user_key(&mut resource.metadata.labels, key, value, &reference)?;
        }
        for (key, value) in &app.annotations {
            merge_user_key(&mut resource.metadata.annotations, key, value, &reference)?;
        }

        for (key, value) in reserved {
            set_reserved(&mut resource.metadata.labels, key, value, &reference)?;
        }
        set_reserved(
            &mut resource.metadata.annotations,
            ANNOTATION_OWNER,
            app.compliance.owner.clone(),
            &reference,
        )?;

        Ok(resource)
    }
}

/// Copy a caller-supplied key. Generator-set keys win outside the reserved
/// prefix; inside it a differing value is a conflict.
fn merge_user_key(
    map: &mut BTreeMap<String, String>,
    key: &str,
    value: &str,
    reference: &str,
) -> Result<(), Error> {
    match map.get(key) {
        None => {
            map.insert(key.to_string(), value.to_string());
            Ok(())
        }
        Some(existing) if existing == value => Ok(()),
        Some(existing) if key.starts_with(RESERVED_KEY_PREFIX) => Err(Error::ReservedKeyConflict {
            resource: reference.to_string(),
            key: key.to_string(),
            existing: existing.clone(),
            injected: value.to_string(),
        }),
        Some(existing) => {
            debug!(
                resource = reference,
                key,
                kept = %existing,
                dropped = value,
                "generated value kept over user value"
            );
            Ok(())
        }
    }
}

fn set_reserved(
    map: &mut BTreeMap<String, String>,
    key: &str,
    value: String,
    reference: &str,
) -> Result<(), Error> {
    match map.get(key) {
        Some(existing) if *existing != value => Err(Error::ReservedKeyConflict {
            resource: reference.to_string(),
            key: key.to_string(),
            existing: existing.clone(),
            injected: value,
        }),
        Some(_) => Ok(()),
        None => {
            map.insert(key.to_string(), value);
            Ok(())
        }
    }
}
