//! API mock presets
//!
//! Each view may have a preset file `<view>.mock.json` (or
//! `<view>/<view>.mock.json`) in the mock directory:
//!
//! ```json
//! { "mockApiPresets": { "e2e": { "default": [...], "noData": [...] } } }
//! ```
//!
//! The `e2e` layer is optional. A missing file means the view has no mocks.

use std::fmt::Debug;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::PageState;

#[derive(thiserror::Error, Debug)]
pub enum MockError {
    #[error("Failed to read mock presets {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid mock presets {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// One mocked endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockPreset {
    pub endpoint: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub content_type: Option<String>,
    /// Appended to the endpoint in the route pattern
    #[serde(default, alias = "query")]
    pub custom_query: String,
    /// Overrides the configured API base URL
    #[serde(default)]
    pub api_url: Option<String>,
}

impl MockPreset {
    /// Glob pattern of the mocked route
    pub fn pattern(&self, base_api_url: &str) -> String {
        let base = self.api_url.as_deref().unwrap_or(base_api_url);
        format!("{}/{}{}*", base, self.endpoint, self.custom_query)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MockPresets {
    pub default: Vec<MockPreset>,
    pub no_data: Vec<MockPreset>,
}

impl MockPresets {
    /// Presets used for a page state; `no-data` selects the `noData` list
    pub fn for_state(&self, state: PageState) -> &[MockPreset] {
        match state {
            PageState::NoData => &self.no_data,
            _ => &self.default,
        }
    }
}

#[derive(Deserialize)]
struct MockFile {
    #[serde(rename = "mockApiPresets")]
    presets: PresetLayers,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PresetLayers {
    E2e { e2e: MockPresets },
    Flat(MockPresets),
}

/// Where test cases look up the presets of a view
#[async_trait]
pub trait MockApiSource: Debug + Send + Sync {
    async fn presets_for(&self, view: &str) -> Result<Option<MockPresets>, MockError>;
}

/// No presets for any view
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMocks;

#[async_trait]
impl MockApiSource for NoMocks {
    async fn presets_for(&self, _view: &str) -> Result<Option<MockPresets>, MockError> {
        Ok(None)
    }
}

/// Presets read from JSON files in a directory
#[derive(Debug, Clone)]
pub struct JsonMockDirectory {
    dir: PathBuf,
}

impl JsonMockDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn candidates(&self, view: &str) -> [PathBuf; 2] {
        let file = format!("{view}.mock.json");
        [self.dir.join(&file), self.dir.join(view).join(&file)]
    }

    /// Parse one preset file
    pub fn parse(path: &Path, text: &str) -> Result<MockPresets, MockError> {
        let file: MockFile = serde_json::from_str(text).map_err(|source| MockError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(match file.presets {
            PresetLayers::E2e { e2e } => e2e,
            PresetLayers::Flat(presets) => presets,
        })
    }
}

#[async_trait]
impl MockApiSource for JsonMockDirectory {
    async fn presets_for(&self, view: &str) -> Result<Option<MockPresets>, MockError> {
        for path in self.candidates(view) {
            let text = match tokio::fs::read_to_string(&path).await {
                Ok(text) => text,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                Err(source) => return Err(MockError::Io { path, source }),
            };
            let presets = Self::parse(&path, &text)?;
            tracing::debug!(view, path = %path.display(), "Loaded mock presets");
            return Ok(Some(presets));
        }
        tracing::debug!(view, "No mock presets for view");
        Ok(None)
    }
}
