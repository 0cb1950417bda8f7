//! The `skills` section of the configuration document.

use serde_json::Value;
use skillgate_types::config::SkillsConfig;
use skillgate_types::error::SkillError;

use crate::settings::set_by_path;

pub const SKILLS_KEY: &str = "skills";

/// Parse the `skills` section. A missing section is the default config.
pub fn read_skills_config(doc: &Value) -> Result<SkillsConfig, SkillError> {
    match doc.get(SKILLS_KEY) {
        None | Some(Value::Null) => Ok(SkillsConfig::default()),
        Some(section) => serde_json::from_value(section.clone())
            .map_err(|e| SkillError::BadConfig(format!("malformed '{SKILLS_KEY}' section: {e}"))),
    }
}

/// Replace `skills.enabled`, leaving every other key untouched.
pub fn write_enabled(doc: &mut Value, enabled: &[String]) {
    let mut sorted = enabled.to_vec();
    sorted.sort();
    sorted.dedup();
    set_by_path(
        doc,
        &format!("{SKILLS_KEY}.enabled"),
        Value::Array(sorted.into_iter().map(Value::String).collect()),
    );
}
