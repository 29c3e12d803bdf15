// Tests for the screenshot test builder and its harness
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use pretty_assertions::assert_eq;
use serde_json::json;

use super::harness::*;
use super::mocks::{MockApiSource, MockError, MockPreset, MockPresets};
use super::page::*;
use super::*;

/// Page that records every call as one line
#[derive(Default)]
struct RecordingPage {
    calls: Vec<String>,
    fail_on: Option<&'static str>,
}

impl RecordingPage {
    fn failing_on(call: &'static str) -> Self {
        Self {
            calls: Vec::new(),
            fail_on: Some(call),
        }
    }

    fn record(&mut self, call: &'static str, detail: String) -> anyhow::Result<()> {
        self.calls.push(format!("{call} {detail}").trim_end().to_string());
        if self.fail_on == Some(call) {
            anyhow::bail!("{call} failed");
        }
        Ok(())
    }
}

#[async_trait]
impl Page for RecordingPage {
    async fn add_init_script(&mut self, script: &str) -> anyhow::Result<()> {
        let pinned = script.contains("const __mockNow = 1691107200000;");
        self.record("init_script", format!("pinned={pinned}"))
    }

    async fn route(&mut self, pattern: &str, response: MockResponse) -> anyhow::Result<()> {
        let kind = match response {
            MockResponse::Json { body } => format!("json {body}"),
            MockResponse::Body { content_type, .. } => content_type,
            MockResponse::Pending => "pending".to_string(),
        };
        self.record("route", format!("{pattern} {kind}"))
    }

    async fn set_viewport_size(&mut self, size: ViewportSize) -> anyhow::Result<()> {
        self.record("viewport", format!("{}x{}", size.width, size.height))
    }

    async fn emulate_color_scheme(&mut self, scheme: ColorScheme) -> anyhow::Result<()> {
        self.record("color_scheme", scheme.to_string())
    }

    async fn goto(&mut self, url: &str) -> anyhow::Result<()> {
        self.record("goto", url.to_string())
    }

    async fn add_style_tag(&mut self, _css: &str) -> anyhow::Result<()> {
        self.record("style", String::new())
    }

    async fn wait_for_selector(&mut self, selector: &str) -> anyhow::Result<()> {
        self.record("wait_for_selector", selector.to_string())
    }

    async fn wait_for_load(&mut self) -> anyhow::Result<()> {
        self.record("wait_for_load", String::new())
    }

    async fn run_interaction(&mut self, source: &str) -> anyhow::Result<()> {
        self.record("interaction", source.to_string())
    }

    async fn assert_screenshot(
        &mut self,
        reference: &[String],
        options: &ScreenshotOptions,
    ) -> anyhow::Result<()> {
        self.record("screenshot", format!("{} {}", reference.join("/"), options.selector))
    }
}

#[derive(Debug)]
struct StaticMocks(MockPresets);

#[async_trait]
impl MockApiSource for StaticMocks {
    async fn presets_for(&self, view: &str) -> Result<Option<MockPresets>, MockError> {
        Ok((view == "home").then(|| self.0.clone()))
    }
}

fn preset(endpoint: &str, data: serde_json::Value) -> MockPreset {
    MockPreset {
        endpoint: endpoint.to_string(),
        data,
        content_type: None,
        custom_query: String::new(),
        api_url: None,
    }
}

fn home_mocks() -> Arc<dyn MockApiSource> {
    Arc::new(StaticMocks(MockPresets {
        default: vec![preset("room/", json!({"rooms": [1]}))],
        no_data: vec![preset("room/", json!({"rooms": []}))],
    }))
}

fn harness(mode: RunMode) -> Harness {
    Harness::new(mode, ShotConfig::default()).with_mocks(home_mocks())
}

fn titles(harness: &Harness) -> Vec<String> {
    harness.registrar().cases().iter().map(|c| c.title.clone()).collect()
}

#[test]
fn test_execute_registers_viewport_by_scheme_cases() {
    let mut harness = harness(RunMode::Execute);
    harness
        .builder()
        .for_page("home", None)
        .finalize(&mut harness, None)
        .unwrap()
        .forward_to(&mut harness, "booking");

    assert_eq!(
        titles(&harness),
        vec![
            "home in @desktop viewport, @light color scheme",
            "home in @desktop viewport, @dark color scheme",
            "home in @mobile viewport, @light color scheme",
            "home in @mobile viewport, @dark color scheme",
            "home in @desktop viewport, @light color scheme, @booking variant",
            "home in @desktop viewport, @dark color scheme, @booking variant",
            "home in @mobile viewport, @light color scheme, @booking variant",
            "home in @mobile viewport, @dark color scheme, @booking variant",
        ]
    );
    assert_eq!(
        harness.registrar().cases()[0].reference,
        vec!["home", "home-desktop-light"]
    );
    assert_eq!(
        harness.registrar().cases()[7].reference,
        vec!["home", "home-mobile-dark-booking"]
    );
    assert!(harness.sink().is_empty());
}

trait ForwardTo {
    fn forward_to(self, harness: &mut Harness, variant: &str) -> ScreenshotTest;
}

impl ForwardTo for ScreenshotTest {
    fn forward_to(self, harness: &mut Harness, variant: &str) -> ScreenshotTest {
        self.finalize(harness, Some(variant)).unwrap()
    }
}

#[test]
fn test_reference_and_title_parts() {
    let mut harness = harness(RunMode::Execute);
    harness
        .builder()
        .for_page("/docs/intro", None)
        .for_element("chart")
        .for_viewports(["mobile"])
        .for_color_schemes([ColorScheme::Default])
        .set_page_state(PageState::NoData)
        .with_title("[smoke] ")
        .forward_to(&mut harness, "empty");

    let case = &harness.registrar().cases()[0];
    assert_eq!(case.reference, vec!["-docs-intro", "-docs-intro-mobile-no-data-chart-empty"]);
    assert_eq!(
        case.title,
        "[smoke] -docs-intro in @mobile viewport, @no-data state, @empty variant, @chart element"
    );
    assert_eq!(case.resolution, ViewportSize::new(600, 480));
}

#[test]
fn test_missing_target_is_an_error() {
    let mut harness = harness(RunMode::Execute);
    let err = harness.builder().finalize(&mut harness, None).unwrap_err();
    assert_eq!(err, BuilderError::MissingTarget);

    let mut harness = self::harness(RunMode::Introspect);
    let err = harness.builder().finalize(&mut harness, Some("x")).unwrap_err();
    assert_eq!(err, BuilderError::MissingTarget);
}

#[test]
fn test_unknown_viewport_is_an_error() {
    let mut harness = harness(RunMode::Execute);
    let err = harness
        .builder()
        .for_page("home", None)
        .for_viewports(["tablet"])
        .finalize(&mut harness, None)
        .unwrap_err();
    assert_eq!(err, BuilderError::UnknownViewport("tablet".into()));
}

#[test]
fn test_view_name_defaults_and_widgets() {
    let mut harness = harness(RunMode::Introspect);
    harness
        .builder()
        .for_page("account/settings", None)
        .forward_to(&mut harness, "a")
        .for_page("home", Some("landing"))
        .forward_to(&mut harness, "b")
        .for_widget("widget1")
        .with_widget_props(json!({"bond-name": "WS0447"}).as_object().cloned().unwrap_or_default())
        .forward_to(&mut harness, "c");

    let sink = harness.sink();
    assert_eq!(sink.get(0, "a").unwrap().view_name, "account-settings");
    assert_eq!(sink.get(0, "b").unwrap().view_name, "landing");
    let widget = sink.get(0, "c").unwrap();
    assert_eq!(widget.page_route, "widgets/widget1");
    assert_eq!(widget.view_name, "widget1");
    assert_eq!(
        widget.page_url("http://localhost:3000/"),
        "http://localhost:3000/widgets/widget1?bond-name=WS0447"
    );
}

#[test]
fn test_introspection_records_snapshots_and_registers_nothing() {
    let mut harness = harness(RunMode::Introspect);
    let interaction = Interaction::script("await page.click('#book');");
    harness
        .builder()
        .for_page("home", None)
        .finalize(&mut harness, None)
        .unwrap()
        .set_page_interaction(Some(interaction))
        .forward_to(&mut harness, "booking");

    assert!(harness.registrar().is_empty());
    let sink = harness.sink();
    assert_eq!(sink.len(), 2);
    assert_eq!(sink.get(0, "main").unwrap().page_interaction, None);
    assert_eq!(
        sink.find("booking").unwrap().page_interaction.as_deref(),
        Some("await page.click('#book');")
    );
}

#[test]
fn test_introspection_and_execution_agree() {
    let configure = |harness: &mut Harness| {
        harness
            .builder()
            .for_page("home", None)
            .for_viewports(["desktop"])
            .with_route_mock("search", json!([]), None)
            .with_wait_for([WaitFor::Canvas])
            .set_page_interaction(Some(Interaction::script("await x();")))
            .set_page_state(PageState::Loading)
            .forward_to(harness, "v");
    };

    let mut introspect = harness(RunMode::Introspect);
    configure(&mut introspect);
    let mut execute = harness(RunMode::Execute);
    configure(&mut execute);

    let recorded = introspect.sink().get(0, "v").unwrap();
    for case in execute.registrar().cases() {
        assert_eq!(case.snapshot(), recorded);
    }
    assert_eq!(execute.registrar().len(), 2);
}

#[test]
fn test_per_variant_fields_reset_after_checkpoint() {
    let mut harness = harness(RunMode::Introspect);
    harness
        .builder()
        .for_page("home", None)
        .for_viewports(["mobile"])
        .set_page_interaction(Some(Interaction::script("await a();")))
        .set_page_state(PageState::Loading)
        .forward_to(&mut harness, "first")
        .forward_to(&mut harness, "second");

    let second = harness.sink().get(0, "second").unwrap();
    assert_eq!(second.page_interaction, None);
    assert_eq!(second.page_state, PageState::Default);
    assert_eq!(second.viewport, vec!["mobile"]);
}

#[test]
fn test_route_mock_replaces_same_endpoint() {
    let mut harness = harness(RunMode::Introspect);
    harness
        .builder()
        .for_page("home", None)
        .with_route_mock("room/", json!(1), None)
        .with_route_mock("branding/", json!(2), Some("text/html"))
        .with_route_mock("room/", json!(3), None)
        .forward_to(&mut harness, "x");

    let mocks = &harness.sink().get(0, "x").unwrap().route_mocks;
    let endpoints: Vec<(&str, &serde_json::Value)> =
        mocks.iter().map(|m| (m.endpoint.as_str(), &m.data)).collect();
    assert_eq!(endpoints, vec![("branding/", &json!(2)), ("room/", &json!(3))]);
}

#[test]
fn test_duplicate_checkpoint_keeps_first_snapshot() {
    let mut harness = harness(RunMode::Introspect);
    harness
        .builder()
        .for_page("home", None)
        .forward_to(&mut harness, "dup")
        .for_page("other", None)
        .forward_to(&mut harness, "dup");
    harness.builder().for_page("third", None).forward_to(&mut harness, "dup");

    assert_eq!(harness.sink().len(), 2);
    assert_eq!(harness.sink().get(0, "dup").unwrap().view_name, "home");
    assert_eq!(harness.sink().get(1, "dup").unwrap().view_name, "third");
    assert_eq!(harness.sink().find("dup").unwrap().expression, 0);
}

#[test]
fn test_only_marks_runnable_cases() {
    let mut harness = harness(RunMode::Execute);
    harness.builder().for_page("a", None).forward_to(&mut harness, "x");
    harness.builder().only().for_page("b", None).forward_to(&mut harness, "y");

    assert_eq!(harness.registrar().len(), 8);
    let runnable = harness.registrar().runnable();
    assert_eq!(runnable.len(), 4);
    assert!(runnable.iter().all(|case| case.snapshot().view_name == "b"));
}

#[test]
fn test_query_string_encoding() {
    let query = json!({"q": "a b&c", "ids": [1, 2], "n": 3, "ok": true});
    assert_eq!(
        query_string(query.as_object()),
        "?q=a+b%26c&ids=1%2C2&n=3&ok=true"
    );
    assert_eq!(query_string(None), "");
    assert_eq!(query_string(json!({}).as_object()), "");

    let query = json!({"name": "żółw~*", "path": "a/b?c=d"});
    assert_eq!(
        query_string(query.as_object()),
        "?name=%C5%BC%C3%B3%C5%82w%7E*&path=a%2Fb%3Fc%3Dd"
    );
}

#[test]
fn test_page_state_parsing() {
    assert_eq!("no-data".parse::<PageState>().unwrap(), PageState::NoData);
    assert_eq!(
        "broken".parse::<PageState>().unwrap_err(),
        BuilderError::UnknownPageState("broken".into())
    );
}

#[tokio::test]
async fn test_case_runs_steps_in_fixed_order() {
    let mut harness = harness(RunMode::Execute);
    harness
        .builder()
        .for_page("home", None)
        .for_viewports(["desktop"])
        .for_color_schemes([ColorScheme::Dark])
        .with_page_query(json!({"room": 101}).as_object().cloned())
        .with_route_mock("branding/", json!("<b></b>"), Some("text/html"))
        .with_wait_for([WaitFor::Canvas])
        .set_page_interaction(Some(Interaction::script("await page.click('#book');")))
        .forward_to(&mut harness, "booking");

    let cases = harness.into_test_cases();
    let mut page = RecordingPage::default();
    cases[0].run(&mut page).await.unwrap();

    assert_eq!(
        page.calls,
        vec![
            "init_script pinned=true",
            "route http://localhost:3000/api/room/* json {\"rooms\":[1]}",
            "route http://localhost:3000/api/branding/* text/html",
            "viewport 1396x480",
            "color_scheme dark",
            "goto http://localhost:3000/home?room=101",
            "style",
            "wait_for_load",
            "wait_for_selector canvas",
            "interaction await page.click('#book');",
            "screenshot home/home-desktop-dark-booking body",
        ]
    );
}

#[tokio::test]
async fn test_page_states_select_mocks() {
    let mut harness = harness(RunMode::Execute);
    harness
        .builder()
        .for_page("home", None)
        .for_viewports(["desktop"])
        .for_color_schemes([ColorScheme::Default])
        .for_element("card")
        .set_page_state(PageState::NoResponse)
        .forward_to(&mut harness, "a")
        .set_page_state(PageState::NoData)
        .forward_to(&mut harness, "b")
        .set_page_state(PageState::Loading)
        .forward_to(&mut harness, "c");
    let cases = harness.into_test_cases();

    let mut no_response = RecordingPage::default();
    cases[0].run(&mut no_response).await.unwrap();
    assert!(!no_response.calls.iter().any(|c| c.starts_with("route")));
    assert!(!no_response.calls.iter().any(|c| c.starts_with("color_scheme")));
    assert_eq!(
        no_response.calls.last().unwrap(),
        "screenshot home/home-desktop-no-response-card-a [data-testid=card]"
    );

    let mut no_data = RecordingPage::default();
    cases[1].run(&mut no_data).await.unwrap();
    assert!(no_data
        .calls
        .contains(&"route http://localhost:3000/api/room/* json {\"rooms\":[]}".to_string()));

    let mut loading = RecordingPage::default();
    cases[2].run(&mut loading).await.unwrap();
    assert!(loading
        .calls
        .contains(&"route http://localhost:3000/api/room/* pending".to_string()));
}

#[tokio::test]
async fn test_failing_step_aborts_the_case() {
    let mut harness = harness(RunMode::Execute);
    harness
        .builder()
        .for_page("home", None)
        .for_viewports(["desktop"])
        .for_color_schemes([ColorScheme::Light])
        .forward_to(&mut harness, "x");
    let cases = harness.into_test_cases();

    let mut page = RecordingPage::failing_on("goto");
    let err = cases[0].run(&mut page).await.unwrap_err();
    assert_eq!(err.step, Step::Navigate);
    assert_eq!(page.calls.last().unwrap(), "goto http://localhost:3000/home");
    assert!(!page.calls.iter().any(|c| c.starts_with("screenshot")));
}

#[tokio::test]
async fn test_native_interaction_runs_callback() {
    let interaction = Interaction::native("await page.goto('/x');", |page| {
        async move { page.goto("/x").await }.boxed()
    });
    assert!(interaction.is_native());

    let mut harness = harness(RunMode::Execute);
    harness
        .builder()
        .for_page("other", None)
        .for_viewports(["mobile"])
        .for_color_schemes([ColorScheme::Light])
        .set_page_interaction(Some(interaction))
        .forward_to(&mut harness, "x");
    let cases = harness.into_test_cases();

    let mut page = RecordingPage::default();
    cases[0].run(&mut page).await.unwrap();
    assert!(page.calls.contains(&"goto /x".to_string()));
    assert!(!page.calls.iter().any(|c| c.starts_with("interaction")));
    // No presets for this view
    assert!(!page.calls.iter().any(|c| c.starts_with("route")));
}
