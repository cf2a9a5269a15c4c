use std::path::PathBuf;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::{Args, CommandFactory, Parser, Subcommand};

use crate::domain::activity::DEFAULT_PRIORITY;

fn cli_styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::BrightCyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::BrightYellow.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightGreen.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::BrightMagenta.on_default())
}

pub fn styled_command() -> clap::Command {
    Cli::command()
}

#[derive(Debug, Parser)]
#[command(name = "actgen")]
#[command(bin_name = "actgen")]
#[command(version)]
#[command(about = "Priority-weighted activity picker with an offline-capable sync queue")]
#[command(styles = cli_styles())]
pub struct Cli {
    #[arg(
        short = 'd',
        long,
        global = true,
        env = "ACTGEN_DB_PATH",
        default_value = ".actgen/local.sqlite",
        help = "Path to the local SQLite mirror and queue."
    )]
    pub db: String,

    #[arg(
        short = 'c',
        long,
        global = true,
        env = "ACTGEN_CONFIG",
        help = "Config file (defaults to ~/.config/actgen/config.toml)."
    )]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        env = "ACTGEN_REMOTE_HOST",
        help = "Directory holding the shared remote database."
    )]
    pub remote_host: Option<String>,

    #[arg(
        long,
        global = true,
        env = "ACTGEN_REMOTE_DATABASE",
        help = "Remote database name (file <name>.sqlite under the host)."
    )]
    pub remote_database: Option<String>,

    #[arg(
        short = 'v',
        long,
        global = true,
        action = clap::ArgAction::Count,
        help = "Increase log verbosity (repeatable)."
    )]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    #[command(about = "List all activities.")]
    Ls(JsonArgs),
    #[command(about = "Show one activity.")]
    Show(ShowArgs),
    #[command(about = "Suggest activities, adjusting priorities interactively.")]
    Suggest(SuggestArgs),
    #[command(about = "Add an activity.")]
    Add(AddArgs),
    #[command(about = "Remove an activity.", alias = "delete")]
    Rm(NameArgs),
    #[command(about = "Adjust an activity's priority by a delta.")]
    Adjust(AdjustArgs),
    #[command(about = "Show connectivity and pending queue size.")]
    Status(JsonArgs),
    #[command(about = "List queued offline operations, or discard one.")]
    Queue(QueueArgs),
    #[command(about = "Push queued operations, then refresh the local mirror.")]
    Sync(JsonArgs),
    #[command(about = "Create the remote database at the configured location.")]
    InitRemote,
    #[command(about = "Generate or install shell completions.")]
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct JsonArgs {
    #[arg(short = 'j', long, help = "Render machine-readable JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct QueueArgs {
    #[arg(short = 'j', long, help = "Render machine-readable JSON.")]
    pub json: bool,

    #[arg(
        long,
        value_name = "ID",
        help = "Remove the queued operation with this id without replaying it."
    )]
    pub discard: Option<i64>,
}

#[derive(Debug, Args)]
pub struct NameArgs {
    #[arg(help = "Activity name.")]
    pub name: String,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    #[arg(help = "Activity name.")]
    pub name: String,

    #[arg(short = 'j', long, help = "Render machine-readable JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct SuggestArgs {
    #[arg(short = 'o', long, help = "Print one suggestion and exit.")]
    pub once: bool,

    #[arg(short = 'j', long, help = "Render machine-readable JSON (implies --once).")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct AddArgs {
    #[arg(help = "Activity name.")]
    pub name: String,

    #[arg(help = "Initial priority (at least 0.1).", default_value_t = DEFAULT_PRIORITY)]
    pub priority: f64,
}

#[derive(Debug, Args)]
pub struct AdjustArgs {
    #[arg(help = "Activity name.")]
    pub name: String,

    #[arg(help = "Priority delta, e.g. 0.1 or -0.1.", allow_negative_numbers = true)]
    pub delta: f64,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    #[arg(help = "Shell name (bash, zsh, fish). Auto-detected if omitted.")]
    pub shell: Option<String>,

    #[arg(
        short = 'i',
        long = "install",
        help = "Write completions to the canonical path for the shell."
    )]
    pub install: bool,
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
