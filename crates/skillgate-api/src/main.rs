//! skillgate CLI entry point.
//!
//! Binary name: `sgate`
//!
//! Parses CLI arguments, loads configuration, starts the skill host and
//! dispatches to the command handler.

mod builtin;
mod cli;
mod state;

use clap::Parser;
use clap_complete::generate;
use console::style;
use skillgate_infra::config::load_app_config;
use skillgate_infra::filesystem::resolve_data_dir;
use skillgate_observe::tracing_setup::{init_tracing, shutdown_tracing, verbosity_filter};
use skillgate_types::error::SkillError;
use skillgate_types::event::BusEvent;
use tokio::sync::broadcast::error::RecvError;

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "sgate", &mut std::io::stdout());
        return Ok(());
    }

    let data_dir = resolve_data_dir();
    let config = load_app_config(&data_dir).await;
    init_tracing(verbosity_filter(cli.verbose, cli.quiet), config.otel)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let json = cli.json;
    let result = run(cli, AppState::init(data_dir, config).await?).await;
    shutdown_tracing();

    match result {
        Ok(()) => Ok(()),
        Err(err) => match err.downcast_ref::<SkillError>() {
            Some(skill_err) => {
                cli::print_error(skill_err, json);
                std::process::exit(1);
            }
            None => Err(err),
        },
    }
}

async fn run(cli: Cli, state: AppState) -> anyhow::Result<()> {
    match cli.command {
        Commands::Skill { action } => {
            if !matches!(action, cli::skill::SkillCommand::Reload) {
                state.boot().await?;
            }
            cli::skill::run(&state, action, cli.json).await?;
        }

        Commands::Exec { module, op, params } => {
            state.boot().await?;
            cli::exec::exec(&state, &module, &op, params.as_deref(), cli.json).await?;
        }

        Commands::Run => serve(&state, cli.json).await?,

        Commands::Status => {
            state.boot().await?;
            cli::status::status(&state, cli.json).await?;
        }

        Commands::Completions { .. } => unreachable!("handled above"),
    }

    Ok(())
}

/// Start enabled skills, then print bus events until Ctrl+C or SIGTERM.
async fn serve(state: &AppState, json: bool) -> anyhow::Result<()> {
    let mut events = state.bus.subscribe();
    let report = state.boot().await?;
    if json {
        println!("{}", serde_json::to_string(&report)?);
    } else {
        cli::skill::print_reload_report(&report);
        println!("  {}", style("Press Ctrl+C to stop").dim());
    }

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            received = events.recv() => match received {
                Ok(event) => print_event(&event, json)?,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event stream lagged");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    if !json {
        println!("\n  Stopped.");
    }
    Ok(())
}

fn print_event(event: &BusEvent, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(event)?);
    } else {
        println!(
            "  {} {} {} {}",
            style(event.emitted_at.format("%H:%M:%S")).dim(),
            style(&event.name).cyan(),
            style(event.source.as_deref().unwrap_or("runtime")).dim(),
            event.payload
        );
    }
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
