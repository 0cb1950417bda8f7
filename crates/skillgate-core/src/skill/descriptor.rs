//! What a skill package exports, and the adapter that normalises both export
//! shapes into one [`NormalizedSkill`].

use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use skillgate_types::error::SkillError;
use skillgate_types::skill::{SettingsMeta, SkillCapabilities, SkillKind};

use super::context::SkillContext;

/// Lifecycle hook. Receives the skill's sandbox context.
pub type Hook = Arc<dyn Fn(SkillContext) -> BoxFuture<'static, Result<(), SkillError>> + Send + Sync>;

/// Wrap an async closure as a [`Hook`].
pub fn hook<F, Fut>(f: F) -> Hook
where
    F: Fn(SkillContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), SkillError>> + Send + 'static,
{
    Arc::new(move |ctx| Box::pin(f(ctx)))
}

/// The preferred export: identity, declared privileges and lifecycle hooks.
#[derive(Clone)]
pub struct SkillDescriptor {
    pub id: String,
    pub version: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub settings_meta: Option<SettingsMeta>,
    pub capabilities: SkillCapabilities,
    pub on_enable: Hook,
    pub on_disable: Option<Hook>,
}

impl SkillDescriptor {
    pub fn new(id: impl Into<String>, version: impl Into<String>, on_enable: Hook) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
            name: None,
            description: None,
            settings_meta: None,
            capabilities: SkillCapabilities::default(),
            on_enable,
            on_disable: None,
        }
    }

    pub fn with_capabilities(mut self, capabilities: SkillCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_settings(mut self, meta: SettingsMeta) -> Self {
        self.settings_meta = Some(meta);
        self
    }

    pub fn with_on_disable(mut self, on_disable: Hook) -> Self {
        self.on_disable = Some(on_disable);
        self
    }
}

impl std::fmt::Debug for SkillDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkillDescriptor")
            .field("id", &self.id)
            .field("version", &self.version)
            .field("capabilities", &self.capabilities)
            .field("has_on_disable", &self.on_disable.is_some())
            .finish_non_exhaustive()
    }
}

/// Backward-compatible export: a single register function, no declared
/// capabilities.
#[derive(Clone)]
pub struct LegacySkill {
    pub register: Hook,
}

impl std::fmt::Debug for LegacySkill {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LegacySkill").finish_non_exhaustive()
    }
}

/// Either export shape.
#[derive(Clone, Debug)]
pub enum SkillExport {
    Descriptor(SkillDescriptor),
    Legacy(LegacySkill),
}

/// A validated export, independent of which shape it came from.
#[derive(Clone)]
pub struct NormalizedSkill {
    pub id: String,
    pub version: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub kind: SkillKind,
    pub capabilities: SkillCapabilities,
    pub settings_meta: Option<SettingsMeta>,
    pub on_enable: Hook,
    pub on_disable: Option<Hook>,
}

impl std::fmt::Debug for NormalizedSkill {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NormalizedSkill")
            .field("id", &self.id)
            .field("version", &self.version)
            .field("kind", &self.kind)
            .field("capabilities", &self.capabilities)
            .field("has_on_disable", &self.on_disable.is_some())
            .finish_non_exhaustive()
    }
}

fn validate_kernel_op(op: &str) -> Result<(), SkillError> {
    match op.split_once('.') {
        Some((module, name)) if !module.is_empty() && !name.is_empty() && !name.contains('.') => {
            Ok(())
        }
        _ => Err(SkillError::BadExport(format!(
            "kernel op '{op}' must have the form 'module.op'"
        ))),
    }
}

/// Validate an export against the id it was loaded for.
///
/// Legacy exports take the requested id and the package version (or
/// `0.0.0`), and run their register function as the enable hook.
pub fn normalize(
    export: SkillExport,
    requested_id: &str,
    package_version: Option<&str>,
) -> Result<NormalizedSkill, SkillError> {
    match export {
        SkillExport::Descriptor(d) => {
            if d.id.trim().is_empty() {
                return Err(SkillError::BadExport("descriptor is missing 'id'".to_string()));
            }
            if d.version.trim().is_empty() {
                return Err(SkillError::BadExport(format!(
                    "descriptor '{}' is missing 'version'",
                    d.id
                )));
            }
            if d.id != requested_id {
                return Err(SkillError::BadExport(format!(
                    "descriptor id '{}' does not match requested id '{requested_id}'",
                    d.id
                )));
            }
            for op in &d.capabilities.kernel_ops {
                validate_kernel_op(op)?;
            }
            if let Some(meta) = &d.settings_meta {
                if meta.sensitive_paths.iter().any(|p| p.is_empty()) {
                    return Err(SkillError::BadExport(
                        "sensitive path must not be empty".to_string(),
                    ));
                }
            }
            Ok(NormalizedSkill {
                id: d.id,
                version: d.version,
                name: d.name,
                description: d.description,
                kind: SkillKind::Standard,
                capabilities: d.capabilities,
                settings_meta: d.settings_meta,
                on_enable: d.on_enable,
                on_disable: d.on_disable,
            })
        }
        SkillExport::Legacy(legacy) => Ok(NormalizedSkill {
            id: requested_id.to_string(),
            version: package_version.unwrap_or("0.0.0").to_string(),
            name: None,
            description: None,
            kind: SkillKind::Legacy,
            capabilities: SkillCapabilities::default(),
            settings_meta: None,
            on_enable: legacy.register,
            on_disable: None,
        }),
    }
}
