// Runtime configuration for the builder and the tooling
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::ast::CallRole;
use crate::builder::page::{ColorScheme, ViewportSize};

/// Environment variable that switches the builder into introspection mode
pub const INTROSPECTION_ENV_VAR: &str = "SCREENSHOT_TEST_BUILDER_CLI";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Viewport '{0}' has no resolution configured")]
    UnknownViewport(String),
}

/// Method names that give a call in a builder chain its role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Vocabulary {
    pub checkpoint: Vec<String>,
    pub binding: Vec<String>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self {
            checkpoint: vec!["test".to_string(), "testFunction".to_string()],
            binding: vec!["setPageInteraction".to_string()],
        }
    }
}

impl Vocabulary {
    pub fn is_checkpoint(&self, name: &str) -> bool {
        self.checkpoint.iter().any(|n| n == name)
    }

    pub fn is_binding(&self, name: &str) -> bool {
        self.binding.iter().any(|n| n == name)
    }

    /// Name used when tooling has to write a new checkpoint call
    pub fn checkpoint_name(&self) -> &str {
        self.checkpoint.first().map(String::as_str).unwrap_or("test")
    }

    /// Name used when tooling has to write a new binding call
    pub fn binding_name(&self) -> &str {
        self.binding
            .first()
            .map(String::as_str)
            .unwrap_or("setPageInteraction")
    }

    /// Classify a method call by name
    pub fn classify(&self, name: &str) -> CallRole {
        if self.is_checkpoint(name) {
            CallRole::Checkpoint
        } else if self.is_binding(name) {
            CallRole::BindInteraction
        } else {
            CallRole::Configure
        }
    }
}

/// Core screenshot tooling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ShotConfig {
    /// Base URL pages are served from
    pub base_page_url: String,
    /// Base URL of the API the mocks stand in for
    pub base_api_url: String,
    /// Pixel size of each named viewport
    pub viewport_resolutions: IndexMap<String, ViewportSize>,
    /// Viewports a builder starts with
    pub viewports: Vec<String>,
    /// Color schemes a builder starts with
    pub color_schemes: Vec<ColorScheme>,
    /// Stylesheet injected into dark-scheme pages
    pub custom_dark_css: Option<String>,
    /// Value the page sees as the current date
    pub mock_date: DateTime<Utc>,
    /// Directory holding `<view>.mock.json` preset files
    pub mock_api_dir: Option<PathBuf>,
    /// Root searched for spec files
    pub spec_dir: PathBuf,
    /// File name suffix of spec files
    pub spec_suffix: String,
    /// Padding around element screenshots, in pixels
    pub element_padding: u32,
    /// Milliseconds waited for the `timeout` wait condition
    pub wait_timeout_ms: u64,
    pub vocabulary: Vocabulary,
    /// Formatter command; `{path}` is replaced by the file being formatted
    pub formatter: Option<String>,
}

impl Default for ShotConfig {
    fn default() -> Self {
        let mut viewport_resolutions = IndexMap::new();
        viewport_resolutions.insert("desktop".to_string(), ViewportSize::new(1396, 480));
        viewport_resolutions.insert("mobile".to_string(), ViewportSize::new(600, 480));

        Self {
            base_page_url: "http://localhost:3000".to_string(),
            base_api_url: "http://localhost:3000/api".to_string(),
            viewport_resolutions,
            viewports: vec!["desktop".to_string(), "mobile".to_string()],
            color_schemes: vec![ColorScheme::Light, ColorScheme::Dark],
            custom_dark_css: Some(
                "body {\n  background-color: #1f2124 !important;\n}".to_string(),
            ),
            mock_date: default_mock_date(),
            mock_api_dir: None,
            spec_dir: "tests".into(),
            spec_suffix: ".spec.js".to_string(),
            element_padding: 10,
            wait_timeout_ms: 2000,
            vocabulary: Vocabulary::default(),
            formatter: None,
        }
    }
}

fn default_mock_date() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 8, 4, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

impl ShotConfig {
    /// Load a JSON config file; missing keys keep their defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_str(&text).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn resolution(&self, viewport: &str) -> Result<ViewportSize, ConfigError> {
        self.viewport_resolutions
            .get(viewport)
            .copied()
            .ok_or_else(|| ConfigError::UnknownViewport(viewport.to_string()))
    }

    /// Mock date as milliseconds since the epoch, the unit page scripts use
    pub fn mock_date_millis(&self) -> i64 {
        self.mock_date.timestamp_millis()
    }
}

/// How checkpoints behave while a spec file is loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Register real screenshot test cases
    Execute,
    /// Only record variant snapshots
    Introspect,
}

impl RunMode {
    /// Introspect when the out-of-band environment flag is `true`
    pub fn from_env() -> Self {
        Self::from_flag(std::env::var(INTROSPECTION_ENV_VAR).ok().as_deref())
    }

    pub fn from_flag(flag: Option<&str>) -> Self {
        match flag {
            Some("true") => RunMode::Introspect,
            _ => RunMode::Execute,
        }
    }
}
