//! Skill system business logic.
//!
//! Trusted resolution, loading and validation of skill packages, the per-skill
//! sandbox, the enable/disable lifecycle, and the `skills` command surface.
//! The domain types live in `skillgate-types::skill`.

pub mod commands;
pub mod config;
pub mod context;
pub mod descriptor;
pub mod loader;
pub mod manager;
pub mod registry;
pub mod resolver;

pub use commands::SkillsModule;
pub use context::{SandboxServices, SkillContext};
pub use descriptor::{hook, Hook, LegacySkill, SkillDescriptor, SkillExport};
pub use loader::{SkillLoader, StaticLoader};
pub use manager::{ReloadReport, SkillManager};
pub use registry::SkillRegistry;
pub use resolver::{PackageProbe, TrustedResolver};
