//! Host status command.

use anyhow::Result;
use console::style;

use skillgate_infra::crypto::SecretOrigin;

use crate::state::AppState;

/// Show where the host keeps its state, how the capability secret was
/// sourced, and what is running after boot.
pub async fn status(state: &AppState, json: bool) -> Result<()> {
    let config = state.manager.skills_config().await?;
    let enabled = state.manager.registry().enabled_ids();
    let modules = state.modules.names();
    let origin = match state.secret_origin {
        SecretOrigin::Environment => "environment",
        SecretOrigin::Generated => "generated",
    };

    if json {
        let status = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "data_dir": state.data_dir.display().to_string(),
            "repo_root": state.paths.repo_root.display().to_string(),
            "package_store": state.paths.package_store.display().to_string(),
            "document": state.paths.document_path.display().to_string(),
            "capability": {
                "env": state.config.capability_secret_env,
                "origin": origin,
                "fingerprint": state.secret_fingerprint,
            },
            "skills": {
                "allowed": config.allow.len(),
                "configured_enabled": config.enabled.len(),
                "running": enabled,
            },
            "modules": modules,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!();
    println!("  {} skillgate v{}", style("⚡").bold(), env!("CARGO_PKG_VERSION"));
    println!();

    println!("  {}", style("── Paths ──").dim());
    println!("  Data dir:  {}", state.data_dir.display());
    println!("  Repo root: {}", state.paths.repo_root.display());
    println!("  Packages:  {}", state.paths.package_store.display());
    println!("  Document:  {}", state.paths.document_path.display());
    println!();

    println!("  {}", style("── Capability ──").dim());
    println!(
        "  Secret:    {} ({})",
        style(&state.secret_fingerprint).bold(),
        origin
    );
    if state.secret_origin == SecretOrigin::Generated {
        println!(
            "  {}",
            style(format!(
                "Set {} to share the capability across processes.",
                state.config.capability_secret_env
            ))
            .dim()
        );
    }
    println!();

    println!("  {}", style("── Skills ──").dim());
    println!("  Allowed:   {}", style(config.allow.len()).bold());
    println!(
        "  Running:   {} of {}",
        style(enabled.len()).green(),
        config.enabled.len()
    );
    if !enabled.is_empty() {
        println!("             {}", enabled.join(", "));
    }
    println!("  Modules:   {}", modules.join(", "));
    println!();

    Ok(())
}
