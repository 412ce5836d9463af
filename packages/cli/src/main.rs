mod commands;
mod config;

use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::{
    combine, init, inspect, json, url, CombineArgs, InitArgs, InspectArgs, JsonArgs, UrlArgs,
};
use tracing_subscriber::EnvFilter;

/// Scenelink CLI - build, inspect and combine viewer scenes
#[derive(Parser, Debug)]
#[command(name = "scenelink")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a default scenelink.config.json
    Init(InitArgs),

    /// List a scene's layers and properties
    Inspect(InspectArgs),

    /// Print a scene as canonical JSON
    Json(JsonArgs),

    /// Print a scene's shareable URL
    Url(UrlArgs),

    /// Concatenate or merge two scenes
    Combine(CombineArgs),
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?.display().to_string();

    match cli.command {
        Command::Init(args) => init(args, &cwd),
        Command::Inspect(args) => inspect(args, &cwd),
        Command::Json(args) => json(args, &cwd),
        Command::Url(args) => url(args, &cwd),
        Command::Combine(args) => combine(args, &cwd),
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(err) = run(cli) {
        eprintln!();
        eprintln!("{} {:#}", "Error:".red().bold(), err);
        eprintln!();
        std::process::exit(1);
    }
}
