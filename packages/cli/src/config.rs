use scenelink_scene::{CoordinateSpace, ParseOptions, SceneContext, DEFAULT_BASE_URL};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_NAME: &str = "scenelink.config.json";

/// Scenelink configuration file format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Viewer that generated URLs point at
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Drop layers of unknown type instead of failing
    #[serde(default)]
    pub skip_unknown: bool,

    /// Keep layers flagged as archived
    #[serde(default)]
    pub include_archived: bool,

    /// Coordinate space for synthesized local layers
    #[serde(default)]
    pub coordinate_space: CoordinateSpace,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

impl Config {
    /// Load config from a directory
    pub fn load(cwd: &str) -> anyhow::Result<Self> {
        let config_path = Self::path(cwd);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    pub fn path(cwd: &str) -> PathBuf {
        Path::new(cwd).join(DEFAULT_CONFIG_NAME)
    }

    /// Scene context for commands, with an optional base URL override
    pub fn to_context(&self, base_url: Option<&str>) -> SceneContext {
        SceneContext::new(base_url.unwrap_or(&self.base_url))
            .with_parse_options(ParseOptions {
                skip_unknown: self.skip_unknown,
                include_archived: self.include_archived,
            })
            .with_coordinates(self.coordinate_space.clone())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            skip_unknown: false,
            include_archived: false,
            coordinate_space: CoordinateSpace::default(),
        }
    }
}
