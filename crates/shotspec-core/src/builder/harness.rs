// Harness: run mode, test registration and introspection snapshots
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};

use super::mocks::{JsonMockDirectory, MockApiSource, NoMocks};
use super::page::{ColorScheme, Interaction, MockResponse, Page, ScreenshotOptions, Step, StepError, ViewportSize};
use super::{query_string, PageState, RouteMock, ScreenshotTest, WaitFor};
use crate::config::{RunMode, ShotConfig};

/// Context builders finalize their variants against.
///
/// The mode is fixed when the harness is built, before any spec file is loaded.
#[derive(Debug)]
pub struct Harness {
    mode: RunMode,
    config: Arc<ShotConfig>,
    mocks: Arc<dyn MockApiSource>,
    registrar: TestRegistrar,
    sink: IntrospectionSink,
    expressions: usize,
}

impl Harness {
    /// Harness reading mock presets from the configured directory, if any
    pub fn new(mode: RunMode, config: ShotConfig) -> Self {
        let mocks: Arc<dyn MockApiSource> = match &config.mock_api_dir {
            Some(dir) => Arc::new(JsonMockDirectory::new(dir)),
            None => Arc::new(NoMocks),
        };
        Self {
            mode,
            config: Arc::new(config),
            mocks,
            registrar: TestRegistrar::default(),
            sink: IntrospectionSink::default(),
            expressions: 0,
        }
    }

    /// Mode taken from the introspection environment flag
    pub fn from_env(config: ShotConfig) -> Self {
        Self::new(RunMode::from_env(), config)
    }

    pub fn with_mocks(mut self, mocks: Arc<dyn MockApiSource>) -> Self {
        self.mocks = mocks;
        self
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn config(&self) -> &Arc<ShotConfig> {
        &self.config
    }

    pub fn mocks(&self) -> &Arc<dyn MockApiSource> {
        &self.mocks
    }

    /// Fresh builder for the next builder expression
    pub fn builder(&mut self) -> ScreenshotTest {
        let expression = self.expressions;
        self.expressions += 1;
        ScreenshotTest::new(expression, Arc::clone(&self.config))
    }

    /// Number of builders handed out
    pub fn expressions(&self) -> usize {
        self.expressions
    }

    pub fn registrar(&self) -> &TestRegistrar {
        &self.registrar
    }

    pub fn registrar_mut(&mut self) -> &mut TestRegistrar {
        &mut self.registrar
    }

    pub fn sink(&self) -> &IntrospectionSink {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut IntrospectionSink {
        &mut self.sink
    }

    pub fn into_sink(self) -> IntrospectionSink {
        self.sink
    }

    pub fn into_test_cases(self) -> Vec<TestCase> {
        self.registrar.cases
    }
}

/// Collects the test cases registered in execute mode
#[derive(Debug, Default)]
pub struct TestRegistrar {
    cases: Vec<TestCase>,
}

impl TestRegistrar {
    pub fn register(&mut self, case: TestCase) {
        tracing::debug!(title = %case.title, "Registered test case");
        self.cases.push(case);
    }

    pub fn cases(&self) -> &[TestCase] {
        &self.cases
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// Cases that should run: the `only` cases when there are any, else all
    pub fn runnable(&self) -> Vec<&TestCase> {
        if self.cases.iter().any(|case| case.only) {
            self.cases.iter().filter(|case| case.only).collect()
        } else {
            self.cases.iter().collect()
        }
    }
}

/// One screenshot test: a variant in one viewport and color scheme
#[derive(Debug, Clone)]
pub struct TestCase {
    pub title: String,
    pub reference: Vec<String>,
    pub only: bool,
    pub viewport: String,
    pub resolution: ViewportSize,
    pub color_scheme: ColorScheme,
    snapshot: Arc<VariantSnapshot>,
    interaction: Option<Interaction>,
    config: Arc<ShotConfig>,
    mocks: Arc<dyn MockApiSource>,
}

impl TestCase {
    pub(crate) fn new(
        snapshot: Arc<VariantSnapshot>,
        interaction: Option<Interaction>,
        viewport: &str,
        color_scheme: ColorScheme,
        harness: &Harness,
    ) -> Self {
        let resolution = snapshot
            .view_port_resolution
            .get(viewport)
            .copied()
            .unwrap_or(ViewportSize::new(0, 0));
        Self {
            title: snapshot.title_for(viewport, color_scheme),
            reference: snapshot.reference_for(viewport, color_scheme),
            only: snapshot.only_this,
            viewport: viewport.to_string(),
            resolution,
            color_scheme,
            snapshot,
            interaction,
            config: Arc::clone(harness.config()),
            mocks: Arc::clone(harness.mocks()),
        }
    }

    /// Configuration this case was registered with
    pub fn snapshot(&self) -> &VariantSnapshot {
        &self.snapshot
    }

    /// Run every step in order; the first failing step aborts the case
    pub async fn run(&self, page: &mut dyn Page) -> Result<(), StepError> {
        let snapshot = &self.snapshot;
        tracing::debug!(title = %self.title, "Running test case");

        page.add_init_script(&mock_date_script(snapshot.mock_date.timestamp_millis()))
            .await
            .map_err(StepError::at(Step::MockDate))?;

        self.mock_routes(page).await.map_err(StepError::at(Step::MockRoutes))?;

        page.set_viewport_size(self.resolution)
            .await
            .map_err(StepError::at(Step::SetViewport))?;

        if self.color_scheme != ColorScheme::Default {
            page.emulate_color_scheme(self.color_scheme)
                .await
                .map_err(StepError::at(Step::EmulateColorScheme))?;
        }

        page.goto(&snapshot.page_url(&self.config.base_page_url))
            .await
            .map_err(StepError::at(Step::Navigate))?;

        if self.color_scheme == ColorScheme::Dark {
            if let Some(css) = &snapshot.custom_dark_css {
                page.add_style_tag(css)
                    .await
                    .map_err(StepError::at(Step::InjectDarkCss))?;
            }
        }

        self.wait(page).await.map_err(StepError::at(Step::WaitFor))?;

        if let Some(interaction) = &self.interaction {
            interaction
                .run(page)
                .await
                .map_err(StepError::at(Step::Interaction))?;
        }

        let options = match &snapshot.element_test_id {
            Some(test_id) => ScreenshotOptions::element(test_id, self.config.element_padding),
            None => ScreenshotOptions::page(),
        };
        page.assert_screenshot(&self.reference, &options)
            .await
            .map_err(StepError::at(Step::Screenshot))?;

        tracing::info!(title = %self.title, "Screenshot matched");
        Ok(())
    }

    async fn mock_routes(&self, page: &mut dyn Page) -> anyhow::Result<()> {
        let state = self.snapshot.page_state;
        if state == PageState::NoResponse {
            tracing::debug!(view = %self.snapshot.view_name, "No API mocks for no-response state");
            return Ok(());
        }

        let base = &self.config.base_api_url;
        if let Some(presets) = self.mocks.presets_for(&self.snapshot.view_name).await? {
            for preset in presets.for_state(state) {
                let response = match state {
                    PageState::Loading => MockResponse::Pending,
                    _ => MockResponse::from_data(&preset.data, preset.content_type.as_deref()),
                };
                page.route(&preset.pattern(base), response).await?;
            }
        }

        for mock in &self.snapshot.route_mocks {
            let response = MockResponse::from_data(&mock.data, mock.content_type.as_deref());
            page.route(&format!("{}/{}*", base, mock.endpoint), response).await?;
        }
        Ok(())
    }

    async fn wait(&self, page: &mut dyn Page) -> anyhow::Result<()> {
        page.wait_for_load().await?;
        if self.snapshot.wait_for.contains(&WaitFor::Canvas) {
            page.wait_for_selector("canvas").await?;
        }
        if self.snapshot.wait_for.contains(&WaitFor::Timeout) {
            tokio::time::sleep(Duration::from_millis(self.config.wait_timeout_ms)).await;
        }
        Ok(())
    }
}

/// Init script pinning `new Date()` and `Date.now()` to the mock date
fn mock_date_script(millis: i64) -> String {
    format!(
        r#"{{
  const __mockNow = {millis};
  const __dateNowOffset = __mockNow - Date.now();
  const __dateNow = Date.now;
  Date = class extends Date {{
    constructor(...args) {{
      if (args.length === 0) {{
        super(__mockNow);
      }} else {{
        super(...args);
      }}
    }}
  }};
  Date.now = () => __dateNow() + __dateNowOffset;
}}"#
    )
}

/// Configuration in effect when a variant's checkpoint fired
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantSnapshot {
    pub expression: usize,
    pub variant: String,
    /// Checkpoint argument; `None` for an unnamed checkpoint
    #[serde(skip)]
    pub named_variant: Option<String>,
    pub page_route: String,
    pub view_name: String,
    pub element_test_id: Option<String>,
    pub viewport: Vec<String>,
    pub view_port_resolution: IndexMap<String, ViewportSize>,
    pub color_schemes: Vec<ColorScheme>,
    #[serde(rename = "customDarkCSS")]
    pub custom_dark_css: Option<String>,
    pub only_this: bool,
    pub page_query: Option<Map<String, Value>>,
    pub route_mocks: Vec<RouteMock>,
    pub wait_for: Vec<WaitFor>,
    pub page_state: PageState,
    pub title: Option<String>,
    /// Source text of the bound interaction
    pub page_interaction: Option<String>,
    pub mock_date: DateTime<Utc>,
}

impl VariantSnapshot {
    /// URL the test case navigates to
    pub fn page_url(&self, base_page_url: &str) -> String {
        format!(
            "{}/{}{}",
            base_page_url.trim_end_matches('/'),
            self.page_route.trim_start_matches('/'),
            query_string(self.page_query.as_ref())
        )
    }

    /// Reference path: `[view, view-viewport[-scheme][-state][-element][-variant]]`
    pub fn reference_for(&self, viewport: &str, scheme: ColorScheme) -> Vec<String> {
        let mut parts = vec![self.view_name.as_str(), viewport];
        if scheme != ColorScheme::Default {
            parts.push(scheme.as_str());
        }
        if self.page_state != PageState::Default {
            parts.push(self.page_state.as_str());
        }
        parts.extend(self.element_test_id.as_deref());
        parts.extend(self.named_variant.as_deref());
        vec![self.view_name.clone(), parts.join("-")]
    }

    pub fn title_for(&self, viewport: &str, scheme: ColorScheme) -> String {
        let mut title = format!(
            "{}{} in @{} viewport",
            self.title.as_deref().unwrap_or(""),
            self.view_name,
            viewport
        );
        if scheme != ColorScheme::Default {
            title.push_str(&format!(", @{scheme} color scheme"));
        }
        if self.page_state != PageState::Default {
            title.push_str(&format!(", @{} state", self.page_state.as_str()));
        }
        if let Some(variant) = &self.named_variant {
            title.push_str(&format!(", @{variant} variant"));
        }
        if let Some(element) = &self.element_test_id {
            title.push_str(&format!(", @{element} element"));
        }
        title
    }
}

/// Variant snapshots of one introspection load, keyed by
/// `(expression id, variant)`
#[derive(Debug, Clone, Default)]
pub struct IntrospectionSink {
    snapshots: IndexMap<(usize, String), VariantSnapshot>,
}

impl IntrospectionSink {
    /// Record a snapshot; the first snapshot of a key is kept
    pub fn record(&mut self, snapshot: VariantSnapshot) -> bool {
        let key = (snapshot.expression, snapshot.variant.clone());
        if self.snapshots.contains_key(&key) {
            tracing::warn!(
                expression = key.0,
                variant = %key.1,
                "Duplicate variant checkpoint; keeping the first snapshot"
            );
            return false;
        }
        self.snapshots.insert(key, snapshot);
        true
    }

    pub fn get(&self, expression: usize, variant: &str) -> Option<&VariantSnapshot> {
        self.snapshots.get(&(expression, variant.to_string()))
    }

    /// Snapshot of `variant` from the first expression that declares it
    pub fn find(&self, variant: &str) -> Option<&VariantSnapshot> {
        self.snapshots.values().find(|snapshot| snapshot.variant == variant)
    }

    pub fn iter(&self) -> impl Iterator<Item = &VariantSnapshot> {
        self.snapshots.values()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}
