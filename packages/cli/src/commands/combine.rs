use super::input::load_scene;
use crate::config::Config;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use tracing::info;

#[derive(Debug, Args)]
pub struct CombineArgs {
    /// Scene whose properties and layers come first
    pub left: String,

    /// Scene whose layers are added
    pub right: String,

    /// Merge compatible layers instead of appending every layer
    #[arg(short, long)]
    pub merge: bool,

    /// Print the combined scene as JSON instead of a URL
    #[arg(short, long)]
    pub json: bool,
}

pub fn combine(args: CombineArgs, cwd: &str) -> Result<()> {
    let config = Config::load(cwd)?;
    let context = config.to_context(None);

    let left = load_scene(&args.left, &context)?;
    let right = load_scene(&args.right, &context)?;

    let mut combined = if args.merge { &left | &right } else { &left + &right };
    info!(
        left = left.len(),
        right = right.len(),
        combined = combined.len(),
        merge = args.merge,
        "Combined scenes"
    );

    if args.json {
        println!("{}", combined.to_json(true)?);
    } else {
        eprintln!(
            "{} {} + {} layers → {}",
            "✓".green(),
            left.len(),
            right.len(),
            combined.len()
        );
        println!("{}", combined.url()?);
    }
    Ok(())
}
