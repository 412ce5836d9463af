use super::input::load_scene;
use crate::config::Config;
use anyhow::Result;
use clap::Args;

#[derive(Debug, Args)]
pub struct JsonArgs {
    /// Scene URL, JSON document, or file containing either
    pub input: String,

    /// Indent the output
    #[arg(short, long)]
    pub pretty: bool,
}

pub fn json(args: JsonArgs, cwd: &str) -> Result<()> {
    let config = Config::load(cwd)?;
    let scene = load_scene(&args.input, &config.to_context(None))?;
    println!("{}", scene.to_json(args.pretty)?);
    Ok(())
}
