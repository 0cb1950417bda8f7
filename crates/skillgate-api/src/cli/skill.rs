//! CLI skill management subcommands.
//!
//! Provides list, enable, disable, reload, describe and settings get/set/patch.
//! Each one dispatches a `skills.*` command with the operator's context, so
//! the same access rules apply as for any other caller.

use anyhow::Result;
use clap::Subcommand;
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;
use dialoguer::Password;
use serde_json::{json, Map, Value};

use skillgate_core::settings::{set_by_path, MASK_SENTINEL};
use skillgate_core::skill::commands::MODULE_NAME;
use skillgate_core::skill::ReloadReport;
use skillgate_types::skill::{LoadedSkill, SkillStatus};

use crate::state::AppState;

/// Skill management subcommands.
#[derive(Subcommand)]
pub enum SkillCommand {
    /// List allow-listed and known skills.
    #[command(alias = "ls")]
    List,

    /// Enable a skill and record it in `skills.enabled`.
    Enable {
        /// Skill id.
        id: String,
    },

    /// Disable a skill and remove it from `skills.enabled`.
    Disable {
        /// Skill id.
        id: String,
    },

    /// Re-read `skills.enabled` and bring the running set in line with it.
    Reload,

    /// Show a skill's declared identity, capabilities and settings form.
    Describe {
        /// Skill id.
        id: String,
    },

    /// Read or change a skill's settings.
    Settings {
        #[command(subcommand)]
        action: SettingsCommand,
    },
}

#[derive(Subcommand)]
pub enum SettingsCommand {
    /// Show settings with secrets masked.
    Get {
        /// Skill id.
        id: String,
    },

    /// Set one dotted path, e.g. `sgate skill settings set weather api.units metric`.
    Set {
        /// Skill id.
        id: String,

        /// Dotted settings path.
        path: String,

        /// Value; parsed as JSON when possible, otherwise stored as a string.
        /// Prompted for (hidden) when omitted.
        value: Option<String>,
    },

    /// Deep-merge a JSON object into the settings.
    Patch {
        /// Skill id.
        id: String,

        /// JSON object to merge.
        patch: String,
    },
}

/// Run a skill subcommand.
pub async fn run(state: &AppState, action: SkillCommand, json: bool) -> Result<()> {
    match action {
        SkillCommand::List => list_skills(state, json).await,
        SkillCommand::Enable { id } => set_enabled(state, &id, true, json).await,
        SkillCommand::Disable { id } => set_enabled(state, &id, false, json).await,
        SkillCommand::Reload => reload(state, json).await,
        SkillCommand::Describe { id } => describe(state, &id, json).await,
        SkillCommand::Settings { action } => match action {
            SettingsCommand::Get { id } => get_settings(state, &id, json).await,
            SettingsCommand::Set { id, path, value } => {
                let raw = match value {
                    Some(v) => v,
                    None => Password::new()
                        .with_prompt(format!("Value for {}", style(&path).bold()))
                        .interact()?,
                };
                let patch = patch_for_path(&path, parse_value(&raw))?;
                update_settings(state, &id, patch, json).await
            }
            SettingsCommand::Patch { id, patch } => {
                let patch: Value = serde_json::from_str(&patch)?;
                update_settings(state, &id, patch, json).await
            }
        },
    }
}

async fn skills_command(state: &AppState, op: &str, params: Value) -> Result<Value> {
    Ok(state
        .command(MODULE_NAME, op, params, state.operator_context())
        .await?)
}

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

async fn list_skills(state: &AppState, json: bool) -> Result<()> {
    let value = skills_command(state, "list", json!({})).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let skills: Vec<LoadedSkill> = serde_json::from_value(value)?;
    if skills.is_empty() {
        println!();
        println!("  No skills allow-listed. Add ids to `skills.allow` in the configuration document.");
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Id").fg(Color::Cyan),
            Cell::new("Version"),
            Cell::new("Status"),
            Cell::new("Enabled"),
            Cell::new("Modules"),
            Cell::new("Source"),
        ]);

    for s in &skills {
        let status_color = match s.status {
            SkillStatus::Loaded => Color::Green,
            SkillStatus::Disabled => Color::Yellow,
            SkillStatus::Error => Color::Red,
        };
        let status = match &s.error {
            Some(err) => format!("{} ({err})", s.status),
            None => s.status.to_string(),
        };

        table.add_row(vec![
            Cell::new(&s.id),
            Cell::new(s.version.as_deref().unwrap_or("-")),
            Cell::new(status).fg(status_color),
            Cell::new(if s.enabled { "yes" } else { "no" }),
            Cell::new(s.modules_registered.join(", ")),
            Cell::new(s.source.as_ref().map(ToString::to_string).unwrap_or_else(|| "-".to_string())),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    Ok(())
}

// ---------------------------------------------------------------------------
// Enable / disable / reload
// ---------------------------------------------------------------------------

async fn set_enabled(state: &AppState, id: &str, enable: bool, json: bool) -> Result<()> {
    let op = if enable { "enable" } else { "disable" };
    let value = skills_command(state, op, json!({ "id": id })).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let skill: LoadedSkill = serde_json::from_value(value)?;
    let verb = if enable { "enabled" } else { "disabled" };
    println!();
    println!(
        "  {} Skill '{}' {} ({})",
        style("✓").green().bold(),
        style(&skill.id).cyan(),
        verb,
        skill.version.as_deref().unwrap_or("unversioned")
    );
    if !skill.modules_registered.is_empty() {
        println!("    modules: {}", skill.modules_registered.join(", "));
    }
    println!();
    Ok(())
}

async fn reload(state: &AppState, json: bool) -> Result<()> {
    let report = state.boot().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_reload_report(&report);
    }
    Ok(())
}

/// Styled summary of a reload.
pub fn print_reload_report(report: &ReloadReport) {
    println!();
    for id in &report.enabled {
        println!("  {} {}", style("✓").green(), id);
    }
    for id in &report.disabled {
        println!("  {} {} {}", style("-").dim(), id, style("(stopped)").dim());
    }
    for failure in &report.failed {
        println!(
            "  {} {} {} {}",
            style("✗").red(),
            failure.id,
            style(failure.kind).red(),
            style(&failure.error).dim()
        );
    }
    for id in &report.busy {
        println!("  {} {} {}", style("…").yellow(), id, style("(busy)").dim());
    }
    if report.enabled.is_empty()
        && report.disabled.is_empty()
        && report.failed.is_empty()
        && report.busy.is_empty()
    {
        println!("  No skills enabled.");
    }
    println!();
}

// ---------------------------------------------------------------------------
// Describe
// ---------------------------------------------------------------------------

async fn describe(state: &AppState, id: &str, json: bool) -> Result<()> {
    let value = skills_command(state, "describe", json!({ "id": id })).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let text = |key: &str| value.get(key).and_then(Value::as_str).unwrap_or("-").to_string();
    println!();
    println!("  {} {}", style(text("id")).cyan().bold(), style(text("version")).dim());
    if let Some(name) = value.get("name").and_then(Value::as_str) {
        println!("  {name}");
    }
    if let Some(desc) = value.get("description").and_then(Value::as_str) {
        println!("  {}", style(desc).dim());
    }
    println!();
    println!("  status:  {}", text("status"));
    println!("  enabled: {}", value["enabled"].as_bool().unwrap_or(false));
    println!("  source:  {}", text("source"));

    if let Some(ops) = value["capabilities"]["kernel_ops"].as_array() {
        let ops: Vec<&str> = ops.iter().filter_map(Value::as_str).collect();
        if !ops.is_empty() {
            println!("  kernel ops: {}", ops.join(", "));
        }
    }
    if let Some(modules) = value["modules"].as_array() {
        let modules: Vec<&str> = modules.iter().filter_map(Value::as_str).collect();
        if !modules.is_empty() {
            println!("  modules: {}", modules.join(", "));
        }
    }
    if let Some(fields) = value["settings"]["schema"].as_array() {
        println!();
        println!("  {}", style("Settings").bold());
        for field in fields {
            let key = field["key"].as_str().unwrap_or("?");
            let kind = field["type"].as_str().unwrap_or("string");
            let label = field["label"].as_str().unwrap_or(key);
            let secret = if field["secret"].as_bool().unwrap_or(false) {
                format!(" {}", style("secret").yellow())
            } else {
                String::new()
            };
            println!("    {key} ({kind}){secret}  {}", style(label).dim());
        }
    }
    println!();
    Ok(())
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

async fn get_settings(state: &AppState, id: &str, json: bool) -> Result<()> {
    let value = skills_command(state, "get_settings", json!({ "id": id })).await?;
    print_settings(&value, json)
}

async fn update_settings(state: &AppState, id: &str, patch: Value, json: bool) -> Result<()> {
    let value = skills_command(state, "update_settings", json!({ "id": id, "settings": patch })).await?;
    print_settings(&value, json)
}

fn print_settings(value: &Value, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
        return Ok(());
    }

    let mut rows = Vec::new();
    flatten("", &value["settings"], &mut rows);
    if rows.is_empty() {
        println!();
        println!("  No settings stored.");
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![Cell::new("Path").fg(Color::Cyan), Cell::new("Value")]);
    for (path, rendered) in rows {
        let cell = if rendered == MASK_SENTINEL {
            Cell::new(rendered).fg(Color::Yellow)
        } else {
            Cell::new(rendered)
        };
        table.add_row(vec![Cell::new(path), cell]);
    }

    println!();
    println!("{table}");
    println!();
    Ok(())
}

/// Flatten nested objects into `(dotted.path, rendered value)` rows.
fn flatten(prefix: &str, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten(&path, child, out);
            }
        }
        Value::String(s) if !prefix.is_empty() => out.push((prefix.to_string(), s.clone())),
        other if !prefix.is_empty() => out.push((prefix.to_string(), other.to_string())),
        _ => {}
    }
}

/// JSON if it parses, otherwise the raw text as a string.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn patch_for_path(path: &str, value: Value) -> Result<Value> {
    if path.is_empty() || path.split('.').any(str::is_empty) {
        anyhow::bail!("invalid settings path '{path}'");
    }
    let mut patch = Value::Object(Map::new());
    set_by_path(&mut patch, path, value);
    Ok(patch)
}
