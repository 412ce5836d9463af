use anyhow::{Context, Result};
use scenelink_scene::{is_url, Scene, SceneContext};
use std::fs;
use tracing::debug;

/// Scene from a URL, a JSON document, or a path to a file holding either
pub fn load_scene(input: &str, context: &SceneContext) -> Result<Scene> {
    let input = input.trim();

    let text = if is_url(input) || input.starts_with('{') {
        input.to_string()
    } else {
        debug!(path = input, "Reading scene from file");
        fs::read_to_string(input).with_context(|| format!("Unable to read {}", input))?
    };

    let scene = Scene::from_string_with(&text, context)
        .with_context(|| format!("Unable to parse scene from {}", describe(input)))?;
    debug!(layers = scene.len(), base_url = scene.base_url(), "Loaded scene");
    Ok(scene)
}

fn describe(input: &str) -> String {
    const MAX: usize = 60;
    match input.char_indices().nth(MAX) {
        Some((cut, _)) => format!("{}...", &input[..cut]),
        None => input.to_string(),
    }
}
