//! CLI command definitions for the `sgate` binary.
//!
//! Uses clap derive macros for argument parsing. The CLI is a local transport
//! onto the `skills` command surface: every subcommand becomes a command
//! dispatched with the operator's context.

pub mod exec;
pub mod skill;
pub mod status;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use console::style;
use skillgate_types::error::SkillError;

/// Capability-gated skill host.
#[derive(Parser)]
#[command(name = "sgate", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage skills (list, enable, disable, reload, describe, settings).
    Skill {
        #[command(subcommand)]
        action: skill::SkillCommand,
    },

    /// Send a raw command to a module, e.g. `sgate exec echo say '{"text":"hi"}'`.
    Exec {
        /// Target module name.
        module: String,

        /// Operation on the module.
        op: String,

        /// JSON params (default: {}).
        params: Option<String>,
    },

    /// Start enabled skills and stream bus events until Ctrl+C.
    Run,

    /// Show data locations, capability source and running skills.
    Status,

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

/// Print a command error: JSON body in `--json` mode, styled otherwise.
pub fn print_error(err: &SkillError, json: bool) {
    if json {
        println!("{}", err.to_json());
    } else {
        eprintln!(
            "  {} {} {}",
            style("✗").red().bold(),
            style(err.kind()).red(),
            err
        );
    }
}
