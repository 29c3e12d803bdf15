/*!
# ScreenshotTest - Variant-Aware Test Builder

A consuming builder that accumulates page configuration and closes a variant
at every checkpoint ([`ScreenshotTest::finalize`]). What a checkpoint does
depends on the [`Harness`] it is given:

- **Execute** registers one [`TestCase`] per viewport and color scheme.
- **Introspect** records a [`VariantSnapshot`] and registers nothing.

Both modes snapshot the same configuration, so what introspection reports is
exactly what a test case would run with. Interaction and page state apply to
one variant only and are reset after each checkpoint.

```text
configuring --finalize(variant)--> checkpoint-closing --> configuring
```
*/

use std::str::FromStr;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::form_urlencoded;

use crate::config::{RunMode, ShotConfig};

pub mod harness;
pub mod mocks;
pub mod page;

#[cfg(test)]
mod tests;

use harness::{Harness, TestCase, VariantSnapshot};
use page::{ColorScheme, Interaction};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BuilderError {
    /// A checkpoint was reached before `forPage`/`forWidget`
    #[error("Page route is not set")]
    MissingTarget,

    #[error("Viewport '{0}' has no resolution configured")]
    UnknownViewport(String),

    #[error("Unknown page state '{0}'")]
    UnknownPageState(String),
}

/// Data state the page is shown in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PageState {
    #[default]
    Default,
    /// API presets come from the `noData` list
    NoData,
    /// No API route is mocked
    NoResponse,
    /// Mocked routes never answer
    Loading,
}

impl PageState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageState::Default => "default",
            PageState::NoData => "no-data",
            PageState::NoResponse => "no-response",
            PageState::Loading => "loading",
        }
    }
}

impl FromStr for PageState {
    type Err = BuilderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(PageState::Default),
            "no-data" => Ok(PageState::NoData),
            "no-response" => Ok(PageState::NoResponse),
            "loading" => Ok(PageState::Loading),
            other => Err(BuilderError::UnknownPageState(other.to_string())),
        }
    }
}

/// Condition awaited after navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitFor {
    /// A `canvas` element is present
    Canvas,
    /// A fixed delay, `wait_timeout_ms` long
    Timeout,
}

/// Explicit route mock added with `with_route_mock`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteMock {
    pub endpoint: String,
    pub data: Value,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone)]
struct Settings {
    only: bool,
    page_route: Option<String>,
    view_name: Option<String>,
    element_test_id: Option<String>,
    viewports: Vec<String>,
    color_schemes: Vec<ColorScheme>,
    page_query: Option<Map<String, Value>>,
    route_mocks: Vec<RouteMock>,
    wait_for: Vec<WaitFor>,
    title: Option<String>,
    // Reset after every checkpoint
    interaction: Option<Interaction>,
    page_state: PageState,
}

/// Screenshot test builder for one builder expression
#[derive(Debug, Clone)]
pub struct ScreenshotTest {
    expression: usize,
    config: Arc<ShotConfig>,
    settings: Settings,
}

impl ScreenshotTest {
    /// Builder starting from the configured viewports and color schemes.
    /// `expression` keys the snapshots it records.
    pub fn new(expression: usize, config: Arc<ShotConfig>) -> Self {
        let settings = Settings {
            only: false,
            page_route: None,
            view_name: None,
            element_test_id: None,
            viewports: config.viewports.clone(),
            color_schemes: config.color_schemes.clone(),
            page_query: None,
            route_mocks: Vec::new(),
            wait_for: Vec::new(),
            title: None,
            interaction: None,
            page_state: PageState::Default,
        };
        Self {
            expression,
            config,
            settings,
        }
    }

    pub fn expression(&self) -> usize {
        self.expression
    }

    /// Mark every test case of this builder as exclusive
    pub fn only(mut self) -> Self {
        self.settings.only = true;
        self
    }

    /// Target a page route. The view name defaults to the route with `/`
    /// replaced by `-`.
    pub fn for_page(mut self, route: &str, view_name: Option<&str>) -> Self {
        self.settings.page_route = Some(route.to_string());
        self.settings.view_name = Some(
            view_name
                .map(str::to_string)
                .unwrap_or_else(|| route.replace('/', "-")),
        );
        self.settings.element_test_id = None;
        self
    }

    /// Target a widget; it is served from `widgets/<name>` and named after itself
    pub fn for_widget(self, name: &str) -> Self {
        self.for_page(&format!("widgets/{name}"), Some(name))
    }

    /// Widget props are passed to the widget page as query parameters
    pub fn with_widget_props(mut self, props: Map<String, Value>) -> Self {
        let query = self.settings.page_query.get_or_insert_with(Map::new);
        query.extend(props);
        self
    }

    /// Screenshot only the element with this `data-testid`
    pub fn for_element(mut self, test_id: &str) -> Self {
        self.settings.element_test_id = Some(test_id.to_string());
        self
    }

    pub fn for_viewports<I, S>(mut self, viewports: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.settings.viewports = viewports.into_iter().map(Into::into).collect();
        self
    }

    pub fn for_color_schemes(mut self, schemes: impl IntoIterator<Item = ColorScheme>) -> Self {
        self.settings.color_schemes = schemes.into_iter().collect();
        self
    }

    pub fn with_page_query(mut self, query: Option<Map<String, Value>>) -> Self {
        self.settings.page_query = query;
        self
    }

    /// Derive the page query from the current one
    pub fn update_page_query<F>(mut self, update: F) -> Self
    where
        F: FnOnce(Option<Map<String, Value>>) -> Option<Map<String, Value>>,
    {
        self.settings.page_query = update(self.settings.page_query.take());
        self
    }

    /// Mock `endpoint` under the API base URL, replacing an earlier mock of it
    pub fn with_route_mock(mut self, endpoint: &str, data: Value, content_type: Option<&str>) -> Self {
        self.settings.route_mocks.retain(|mock| mock.endpoint != endpoint);
        self.settings.route_mocks.push(RouteMock {
            endpoint: endpoint.to_string(),
            data,
            content_type: content_type.map(str::to_string),
        });
        self
    }

    pub fn with_wait_for(mut self, conditions: impl IntoIterator<Item = WaitFor>) -> Self {
        self.settings.wait_for = conditions.into_iter().collect();
        self
    }

    /// Interaction for the next variant; `None` clears it
    pub fn set_page_interaction(mut self, interaction: Option<Interaction>) -> Self {
        self.settings.interaction = interaction;
        self
    }

    /// Page state for the next variant
    pub fn set_page_state(mut self, state: PageState) -> Self {
        self.settings.page_state = state;
        self
    }

    /// Prefix of every test title
    pub fn with_title(mut self, title: &str) -> Self {
        self.settings.title = Some(title.to_string());
        self
    }

    /// Current configuration as the snapshot a checkpoint for `variant` would take
    pub fn snapshot(&self, variant: Option<&str>) -> Result<VariantSnapshot, BuilderError> {
        let settings = &self.settings;
        let (route, view_name) = match (&settings.page_route, &settings.view_name) {
            (Some(route), Some(view_name)) => (route.clone(), view_name.clone()),
            _ => return Err(BuilderError::MissingTarget),
        };

        let mut resolutions = IndexMap::new();
        for viewport in &settings.viewports {
            let size = self
                .config
                .resolution(viewport)
                .map_err(|_| BuilderError::UnknownViewport(viewport.clone()))?;
            resolutions.insert(viewport.clone(), size);
        }

        Ok(VariantSnapshot {
            expression: self.expression,
            variant: variant.unwrap_or(crate::DEFAULT_VARIANT).to_string(),
            named_variant: variant.map(str::to_string),
            page_route: route,
            view_name,
            element_test_id: settings.element_test_id.clone(),
            viewport: settings.viewports.clone(),
            view_port_resolution: resolutions,
            color_schemes: settings.color_schemes.clone(),
            custom_dark_css: self.config.custom_dark_css.clone(),
            only_this: settings.only,
            page_query: settings.page_query.clone(),
            route_mocks: settings.route_mocks.clone(),
            wait_for: settings.wait_for.clone(),
            page_state: settings.page_state,
            title: settings.title.clone(),
            page_interaction: settings.interaction.as_ref().map(|i| i.source().to_string()),
            mock_date: self.config.mock_date,
        })
    }

    /// Close `variant` (`None` is the default variant) and start the next one
    pub fn finalize(mut self, harness: &mut Harness, variant: Option<&str>) -> Result<Self, BuilderError> {
        let snapshot = self.snapshot(variant)?;

        match harness.mode() {
            RunMode::Execute => {
                let snapshot = Arc::new(snapshot);
                let mut registered = 0;
                for viewport in &snapshot.viewport {
                    for &scheme in &snapshot.color_schemes {
                        let case = TestCase::new(
                            Arc::clone(&snapshot),
                            self.settings.interaction.clone(),
                            viewport,
                            scheme,
                            harness,
                        );
                        harness.registrar_mut().register(case);
                        registered += 1;
                    }
                }
                tracing::debug!(
                    expression = self.expression,
                    variant = %snapshot.variant,
                    registered,
                    "Registered test cases"
                );
            }
            RunMode::Introspect => {
                tracing::debug!(
                    expression = self.expression,
                    variant = %snapshot.variant,
                    "Recorded variant snapshot"
                );
                harness.sink_mut().record(snapshot);
            }
        }

        self.settings.interaction = None;
        self.settings.page_state = PageState::Default;
        Ok(self)
    }
}

/// `application/x-www-form-urlencoded` query string, `?` included; empty for no query
pub fn query_string(query: Option<&Map<String, Value>>) -> String {
    let query = match query {
        Some(query) if !query.is_empty() => query,
        _ => return String::new(),
    };
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in query {
        serializer.append_pair(key, &query_value(value));
    }
    format!("?{}", serializer.finish())
}

fn query_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Array(items) => items.iter().map(query_value).collect::<Vec<_>>().join(","),
        other => other.to_string(),
    }
}
