//! Skills compiled into the `sgate` binary.
//!
//! A built-in skill is still loaded only through a trusted package: its
//! `skill.json` must name it and sit under the package store or a configured
//! local root. The catalog only supplies the code.

use std::sync::Arc;

use serde_json::{json, Value};
use skillgate_core::kernel::KernelModule;
use skillgate_core::skill::{hook, SkillDescriptor, SkillExport, StaticLoader};
use skillgate_types::command::Command;
use skillgate_types::error::SkillError;
use tracing::Level;

pub const ECHO: &str = "echo";

pub fn catalog() -> StaticLoader {
    StaticLoader::new().with(ECHO, echo_skill)
}

fn echo_skill() -> SkillExport {
    let mut descriptor = SkillDescriptor::new(
        ECHO,
        env!("CARGO_PKG_VERSION"),
        hook(|ctx| async move {
            ctx.register_module(Arc::new(EchoModule))?;
            ctx.emit("echo.ready", json!({ "version": ctx.version() }))?;
            Ok(())
        }),
    )
    .with_on_disable(hook(|ctx| async move {
        ctx.log(Level::INFO, "echo going quiet", None);
        Ok(())
    }));

    descriptor.name = Some("Echo".to_string());
    descriptor.description = Some("Answers `echo.ping` and returns `echo.say` params.".to_string());
    SkillExport::Descriptor(descriptor)
}

struct EchoModule;

impl KernelModule for EchoModule {
    fn name(&self) -> &str {
        ECHO
    }

    async fn handle(&self, cmd: Command) -> Result<Value, SkillError> {
        match cmd.op.as_str() {
            "ping" => Ok(json!("pong")),
            "say" => Ok(cmd.params),
            _ => Err(SkillError::NoSuchOp {
                module: ECHO.to_string(),
                op: cmd.op,
            }),
        }
    }
}
