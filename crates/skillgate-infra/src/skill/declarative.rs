//! Declarative skill entries.
//!
//! A package whose entry is a JSON file describes its skill as data: identity,
//! capabilities, settings metadata, optional static modules, and lists of
//! steps to run on enable and disable. Steps run in order through the
//! skill's sandbox context, so they get exactly the privileges a compiled
//! skill with the same declarations would.
//!
//! ```json
//! {
//!   "id": "greeter",
//!   "version": "1.0.0",
//!   "capabilities": { "kernel_ops": ["skills.reload_enabled"] },
//!   "modules": [{ "name": "greeter", "ops": { "hello": { "text": "hi" } } }],
//!   "on_enable": [{ "log": { "level": "info", "message": "ready" } }]
//! }
//! ```
//!
//! The legacy shape is `{ "register": [Step, ...] }`.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use skillgate_core::kernel::{DynModule, KernelModule};
use skillgate_core::skill::{
    hook, Hook, LegacySkill, SkillContext, SkillDescriptor, SkillExport,
};
use skillgate_types::command::Command;
use skillgate_types::error::SkillError;
use skillgate_types::skill::{SettingsMeta, SkillCapabilities};
use tracing::Level;

/// One action in a hook.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum Step {
    Execute {
        module: String,
        op: String,
        #[serde(default)]
        params: Value,
        #[serde(default)]
        meta: Option<Value>,
    },
    Emit {
        event: String,
        #[serde(default)]
        payload: Value,
    },
    Log {
        #[serde(default)]
        level: StepLevel,
        message: String,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<StepLevel> for Level {
    fn from(level: StepLevel) -> Self {
        match level {
            StepLevel::Trace => Level::TRACE,
            StepLevel::Debug => Level::DEBUG,
            StepLevel::Info => Level::INFO,
            StepLevel::Warn => Level::WARN,
            StepLevel::Error => Level::ERROR,
        }
    }
}

/// A module whose ops answer with fixed JSON values.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StaticModuleSpec {
    pub name: String,
    #[serde(default)]
    pub ops: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct LegacyEntry {
    register: Vec<Step>,
}

/// Identity and version default to empty so the normaliser reports them
/// missing with its own error.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct DescriptorEntry {
    #[serde(default)]
    id: String,
    #[serde(default)]
    version: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    settings: Option<SettingsMeta>,
    #[serde(default)]
    capabilities: SkillCapabilities,
    #[serde(default)]
    modules: Vec<StaticModuleSpec>,
    #[serde(default)]
    on_enable: Vec<Step>,
    #[serde(default)]
    on_disable: Option<Vec<Step>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum EntryDocument {
    Legacy(LegacyEntry),
    Descriptor(DescriptorEntry),
}

/// Parse a JSON entry into a skill export.
pub fn parse_entry(source: &str) -> Result<SkillExport, SkillError> {
    let doc: Value = serde_json::from_str(source)
        .map_err(|e| SkillError::BadExport(format!("entry is not valid JSON: {e}")))?;
    if !doc.is_object() {
        return Err(SkillError::BadExport("entry must be a JSON object".to_string()));
    }
    let entry: EntryDocument = serde_json::from_value(doc).map_err(|e| {
        SkillError::BadExport(format!("entry does not describe a skill: {e}"))
    })?;

    Ok(match entry {
        EntryDocument::Legacy(legacy) => SkillExport::Legacy(LegacySkill {
            register: steps_hook(Vec::new(), legacy.register),
        }),
        EntryDocument::Descriptor(d) => {
            let mut descriptor =
                SkillDescriptor::new(d.id, d.version, steps_hook(d.modules, d.on_enable))
                    .with_capabilities(d.capabilities);
            descriptor.name = d.name;
            descriptor.description = d.description;
            if let Some(meta) = d.settings {
                descriptor = descriptor.with_settings(meta);
            }
            if let Some(steps) = d.on_disable {
                descriptor = descriptor.with_on_disable(steps_hook(Vec::new(), steps));
            }
            SkillExport::Descriptor(descriptor)
        }
    })
}

/// Build a hook that registers `modules`, then runs `steps` in order.
fn steps_hook(modules: Vec<StaticModuleSpec>, steps: Vec<Step>) -> Hook {
    let modules = Arc::new(modules);
    let steps = Arc::new(steps);
    hook(move |ctx| {
        let modules = Arc::clone(&modules);
        let steps = Arc::clone(&steps);
        async move {
            for spec in modules.iter() {
                let module: DynModule = Arc::new(StaticModule::from(spec.clone()));
                ctx.register_module(module)?;
            }
            run_steps(&ctx, &steps).await
        }
    })
}

async fn run_steps(ctx: &SkillContext, steps: &[Step]) -> Result<(), SkillError> {
    for step in steps {
        match step {
            Step::Execute {
                module,
                op,
                params,
                meta,
            } => {
                ctx.execute(module, op, params.clone(), meta.clone()).await?;
            }
            Step::Emit { event, payload } => ctx.emit(event, payload)?,
            Step::Log { level, message } => ctx.log((*level).into(), message, None),
        }
    }
    Ok(())
}

/// Kernel module built from a [`StaticModuleSpec`].
#[derive(Debug, Clone)]
pub struct StaticModule {
    name: String,
    ops: BTreeMap<String, Value>,
}

impl From<StaticModuleSpec> for StaticModule {
    fn from(spec: StaticModuleSpec) -> Self {
        Self {
            name: spec.name,
            ops: spec.ops,
        }
    }
}

impl KernelModule for StaticModule {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, cmd: Command) -> Result<Value, SkillError> {
        self.ops.get(&cmd.op).cloned().ok_or_else(|| SkillError::NoSuchOp {
            module: self.name.clone(),
            op: cmd.op.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use skillgate_core::skill::descriptor::normalize;
    use skillgate_types::error::ErrorKind;
    use skillgate_types::skill::SkillKind;

    #[test]
    fn parses_descriptor_entry() {
        let export = parse_entry(
            r#"{
                "id": "greeter",
                "version": "1.0.0",
                "name": "Greeter",
                "settings": {
                    "defaults": { "greeting": "hello", "token": "" },
                    "sensitive_paths": ["token"]
                },
                "capabilities": { "kernel_ops": ["skills.reload_enabled"] },
                "on_enable": [
                    { "log": { "message": "up" } },
                    { "emit": { "event": "greeter.ready" } }
                ],
                "on_disable": []
            }"#,
        )
        .unwrap();

        let SkillExport::Descriptor(d) = export else {
            panic!("expected descriptor");
        };
        assert_eq!(d.id, "greeter");
        assert_eq!(d.name.as_deref(), Some("Greeter"));
        assert_eq!(d.capabilities.kernel_ops, vec!["skills.reload_enabled".to_string()]);
        let meta = d.settings_meta.as_ref().unwrap();
        assert_eq!(meta.defaults["greeting"], "hello");
        assert_eq!(meta.sensitive_paths, vec!["token".to_string()]);
        assert!(d.on_disable.is_some());
    }

    #[test]
    fn parses_legacy_entry() {
        let export = parse_entry(r#"{ "register": [{ "log": { "level": "debug", "message": "hi" } }] }"#)
            .unwrap();
        let normalized = normalize(export, "old", Some("0.3.0")).unwrap();
        assert_eq!(normalized.kind, SkillKind::Legacy);
        assert_eq!(normalized.version, "0.3.0");
    }

    #[test]
    fn missing_id_is_reported_by_normalizer() {
        let export = parse_entry(r#"{ "version": "1.0.0" }"#).unwrap();
        let err = normalize(export, "x", None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadExport);
    }

    #[test]
    fn rejects_non_object_and_unknown_steps() {
        assert_eq!(parse_entry("[1]").unwrap_err().kind(), ErrorKind::BadExport);
        assert_eq!(parse_entry("not json").unwrap_err().kind(), ErrorKind::BadExport);

        let err = parse_entry(r#"{ "id": "a", "version": "1", "on_enable": [{ "shell": "rm -rf /" }] }"#)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadExport);
    }

    #[test]
    fn step_deserializes_with_defaults() {
        let step: Step = serde_json::from_value(json!({ "execute": { "module": "m", "op": "o" } })).unwrap();
        assert_eq!(
            step,
            Step::Execute {
                module: "m".to_string(),
                op: "o".to_string(),
                params: Value::Null,
                meta: None,
            }
        );
    }

    #[tokio::test]
    async fn static_module_answers_configured_ops() {
        let module = StaticModule::from(StaticModuleSpec {
            name: "greeter".to_string(),
            ops: BTreeMap::from([("hello".to_string(), json!({ "text": "hi" }))]),
        });

        let out = module.handle(Command::new("greeter", "hello", json!({}))).await.unwrap();
        assert_eq!(out, json!({ "text": "hi" }));

        let err = module
            .handle(Command::new("greeter", "enable", json!({})))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoSuchOp);
    }
}
