use super::input::load_scene;
use crate::config::Config;
use anyhow::Result;
use clap::Args;
use colored::Colorize;

#[derive(Debug, Args)]
pub struct InspectArgs {
    /// Scene URL, JSON document, or file containing either
    pub input: String,
}

pub fn inspect(args: InspectArgs, cwd: &str) -> Result<()> {
    let config = Config::load(cwd)?;
    let scene = load_scene(&args.input, &config.to_context(None))?;

    println!(
        "{} {} ({} layers)",
        "Scene".bright_blue().bold(),
        scene.base_url(),
        scene.len()
    );

    let keys: Vec<&str> = scene.state().keys().collect();
    if !keys.is_empty() {
        println!("  {} {}", "properties:".dimmed(), keys.join(", "));
    }

    for (index, layer) in scene.layers().iter().enumerate() {
        println!("  {} {}", format!("{:>3}", index).dimmed(), layer);
    }

    Ok(())
}
