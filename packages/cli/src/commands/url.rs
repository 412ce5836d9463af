use super::input::load_scene;
use crate::config::Config;
use anyhow::Result;
use clap::Args;

#[derive(Debug, Args)]
pub struct UrlArgs {
    /// Scene URL, JSON document, or file containing either
    pub input: String,

    /// Viewer to point at instead of the input's or the configured one
    #[arg(short, long)]
    pub base_url: Option<String>,
}

pub fn url(args: UrlArgs, cwd: &str) -> Result<()> {
    let config = Config::load(cwd)?;
    let mut scene = load_scene(&args.input, &config.to_context(None))?;

    if let Some(base_url) = args.base_url {
        scene.set_base_url(base_url);
    }
    println!("{}", scene.url()?);
    Ok(())
}
