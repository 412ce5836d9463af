//! # Shareable URLs
//!
//! A scene travels as `base_url#!<percent-encoded canonical JSON>`.
//! Parsing accepts either such a URL or a bare JSON document.
//!
//! Links whose fragment only points at a state server (`?json_url=...`
//! or `#!gs://...`) carry no scene and are rejected.

use crate::errors::SceneError;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use scenelink_state::canonical_string;
use serde_json::Value;
use url::Url;

/// Characters left as-is in the encoded fragment
const FRAGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'_')
    .remove(b'.')
    .remove(b'-')
    .remove(b'~')
    .remove(b'/');

/// Scene JSON extracted from user input
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedScene {
    /// Base of the input URL, when the input was a URL
    pub base_url: Option<String>,
    pub state: Value,
}

/// Build the shareable URL for `scene` under `base_url`
pub fn make_url(base_url: &str, scene: &Value) -> Result<String, SceneError> {
    let mut url = Url::parse(base_url)?;
    let canonical = canonical_string(scene);
    let encoded = utf8_percent_encode(&canonical, FRAGMENT);
    url.set_fragment(Some(&format!("!{}", encoded)));
    Ok(url.into())
}

/// True for absolute URLs with a host
pub fn is_url(input: &str) -> bool {
    Url::parse(input.trim()).is_ok_and(|url| url.has_host())
}

/// True for links that defer to a state server
pub fn is_state_url(input: &str) -> bool {
    is_url(input) && (input.contains("json_url=") || input.contains("#!gs://"))
}

/// Extract the scene JSON from a URL or a bare JSON document
pub fn parse_scene_string(input: &str) -> Result<ParsedScene, SceneError> {
    let input = input.trim();

    if !is_url(input) {
        let state: Value = serde_json::from_str(input)?;
        return Ok(ParsedScene {
            base_url: None,
            state,
        });
    }

    if is_state_url(input) {
        return Err(SceneError::UnsupportedStateUrl(input.to_string()));
    }

    let mut url = Url::parse(input)?;
    let state: Value = {
        let fragment = url
            .fragment()
            .ok_or_else(|| SceneError::Parse("URL has no scene fragment".to_string()))?;
        let decoded = percent_decode_str(fragment)
            .decode_utf8()
            .map_err(|err| SceneError::Parse(format!("scene fragment is not UTF-8: {}", err)))?;
        let json = decoded
            .strip_prefix('!')
            .ok_or_else(|| SceneError::Parse("scene fragment must start with \"#!\"".to_string()))?;
        serde_json::from_str(json)?
    };

    url.set_fragment(None);
    Ok(ParsedScene {
        base_url: Some(url.into()),
        state,
    })
}
