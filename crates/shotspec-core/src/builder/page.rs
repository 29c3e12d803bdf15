//! Page automation seam
//!
//! The browser engine is an external collaborator. Test cases drive it only
//! through the [`Page`] trait, awaiting every call in order.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Browser page operations a screenshot test case needs
#[async_trait]
pub trait Page: Send {
    /// Script evaluated before any page script on every navigation
    async fn add_init_script(&mut self, script: &str) -> anyhow::Result<()>;

    /// Answer requests matching the glob `pattern` with `response`
    async fn route(&mut self, pattern: &str, response: MockResponse) -> anyhow::Result<()>;

    async fn set_viewport_size(&mut self, size: ViewportSize) -> anyhow::Result<()>;

    async fn emulate_color_scheme(&mut self, scheme: ColorScheme) -> anyhow::Result<()>;

    async fn goto(&mut self, url: &str) -> anyhow::Result<()>;

    async fn add_style_tag(&mut self, css: &str) -> anyhow::Result<()>;

    async fn wait_for_selector(&mut self, selector: &str) -> anyhow::Result<()>;

    /// Wait for fonts and the `load` event
    async fn wait_for_load(&mut self) -> anyhow::Result<()>;

    /// Replay interaction code captured as source text
    async fn run_interaction(&mut self, source: &str) -> anyhow::Result<()>;

    /// Compare a screenshot against the reference path segments
    async fn assert_screenshot(
        &mut self,
        reference: &[String],
        options: &ScreenshotOptions,
    ) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorScheme {
    /// No emulation; omitted from titles and reference names
    Default,
    Light,
    Dark,
}

impl ColorScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColorScheme::Default => "default",
            ColorScheme::Light => "light",
            ColorScheme::Dark => "dark",
        }
    }
}

impl fmt::Display for ColorScheme {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewportSize {
    pub width: u32,
    pub height: u32,
}

impl ViewportSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Response handed to a mocked route
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum MockResponse {
    /// JSON body
    Json { body: Value },
    /// Raw body with an explicit content type
    Body { content_type: String, body: String },
    /// Never fulfilled; the page stays in its loading state
    Pending,
}

impl MockResponse {
    /// HTML and image presets are served raw, everything else as JSON
    pub fn from_data(data: &Value, content_type: Option<&str>) -> Self {
        match content_type {
            Some(ct) if ct == "text/html" || ct.starts_with("image/") => MockResponse::Body {
                content_type: ct.to_string(),
                body: match data {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                },
            },
            _ => MockResponse::Json { body: data.clone() },
        }
    }
}

/// Where the screenshot is taken
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScreenshotOptions {
    pub selector: String,
    /// Clip padding around the element; `None` captures the selector as is
    pub padding: Option<u32>,
}

impl ScreenshotOptions {
    pub fn page() -> Self {
        Self {
            selector: "body".to_string(),
            padding: None,
        }
    }

    pub fn element(test_id: &str, padding: u32) -> Self {
        Self {
            selector: format!("[data-testid={test_id}]"),
            padding: Some(padding),
        }
    }
}

/// Native interaction callback
pub type InteractionFn =
    Arc<dyn for<'p> Fn(&'p mut dyn Page) -> BoxFuture<'p, anyhow::Result<()>> + Send + Sync>;

/// Page interaction bound to a variant.
///
/// Interactions loaded from spec files only carry their source text and are
/// replayed through [`Page::run_interaction`]. Interactions built in Rust carry
/// a callback as well; the source is then what introspection reports.
#[derive(Clone)]
pub struct Interaction {
    source: String,
    native: Option<InteractionFn>,
}

impl Interaction {
    pub fn script(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            native: None,
        }
    }

    pub fn native<F>(source: impl Into<String>, callback: F) -> Self
    where
        F: for<'p> Fn(&'p mut dyn Page) -> BoxFuture<'p, anyhow::Result<()>> + Send + Sync + 'static,
    {
        Self {
            source: source.into(),
            native: Some(Arc::new(callback)),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_native(&self) -> bool {
        self.native.is_some()
    }

    pub async fn run(&self, page: &mut dyn Page) -> anyhow::Result<()> {
        match &self.native {
            Some(callback) => callback(page).await,
            None => page.run_interaction(&self.source).await,
        }
    }
}

impl fmt::Debug for Interaction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Interaction")
            .field("source", &self.source)
            .field("native", &self.native.is_some())
            .finish()
    }
}

/// Test case steps, in the order they run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Step {
    MockDate,
    MockRoutes,
    SetViewport,
    EmulateColorScheme,
    Navigate,
    InjectDarkCss,
    WaitFor,
    Interaction,
    Screenshot,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Step::MockDate => "mock date",
            Step::MockRoutes => "mock routes",
            Step::SetViewport => "set viewport",
            Step::EmulateColorScheme => "emulate color scheme",
            Step::Navigate => "navigate",
            Step::InjectDarkCss => "inject dark css",
            Step::WaitFor => "wait for",
            Step::Interaction => "interaction",
            Step::Screenshot => "screenshot",
        };
        f.write_str(name)
    }
}

/// A failed test case step
#[derive(thiserror::Error, Debug)]
#[error("Step '{step}' failed: {source}")]
pub struct StepError {
    pub step: Step,
    #[source]
    pub source: anyhow::Error,
}

impl StepError {
    /// Error mapper for `map_err`
    pub fn at(step: Step) -> impl FnOnce(anyhow::Error) -> StepError {
        move |source| StepError { step, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mock_response_content_types() {
        assert_eq!(
            MockResponse::from_data(&json!({"a": 1}), None),
            MockResponse::Json { body: json!({"a": 1}) }
        );
        assert_eq!(
            MockResponse::from_data(&json!("<p>hi</p>"), Some("text/html")),
            MockResponse::Body {
                content_type: "text/html".into(),
                body: "<p>hi</p>".into()
            }
        );
        assert!(matches!(
            MockResponse::from_data(&json!("x"), Some("image/png")),
            MockResponse::Body { .. }
        ));
        assert!(matches!(
            MockResponse::from_data(&json!([1]), Some("application/json")),
            MockResponse::Json { .. }
        ));
    }

    #[test]
    fn test_color_scheme_serde() {
        let schemes: Vec<ColorScheme> = serde_json::from_str(r#"["light","dark","default"]"#).unwrap();
        assert_eq!(schemes, vec![ColorScheme::Light, ColorScheme::Dark, ColorScheme::Default]);
        assert_eq!(ColorScheme::Dark.to_string(), "dark");
    }

    #[test]
    fn test_element_screenshot_options() {
        let options = ScreenshotOptions::element("chart", 10);
        assert_eq!(options.selector, "[data-testid=chart]");
        assert_eq!(options.padding, Some(10));
        assert_eq!(ScreenshotOptions::page().selector, "body");
    }

    #[test]
    fn test_step_error_names_the_step() {
        let err = StepError::at(Step::Navigate)(anyhow::anyhow!("timeout"));
        assert_eq!(err.to_string(), "Step 'navigate' failed: timeout");
    }
}
