/*!
# Spec File Integration Tests

End-to-end flows over spec files on disk: extract, introspect, patch, format
and load the result again.
*/

use std::path::Path;

use pretty_assertions::assert_eq;
use shotspec_core::{
    extract_interaction, extract_interactions, extract_recorded_steps, extract_variants, parse_spec_file,
    ChainPatcher, Formatter, Harness, JsonMockDirectory, MockApiSource, NoopFormatter, Parser, PatchOutcome,
    RunMode, ShotConfig, SpecLoader, Vocabulary,
};
use std::sync::Arc;

const HOME_SPEC: &str = r#"//@ts-check
import ScreenshotTest from '../../screenshot-test-builder';

new ScreenshotTest()
  .forPage('/', 'home')
  .only()
  .test()
  .setPageInteraction(async (page) => {
    await page.getByRole('button', { name: 'Book this room' }).click();
  })
  .test('booking')
  .test('anotherVariant')
  .setPageInteraction(async (page) => {
    await page.getByTestId('ContactName').fill('hihihi');
  })
  .test('newInteraction');
"#;

const TRANSCRIPT: &str = r#"import { test, expect } from '@playwright/test';

test('test', async ({ page }) => {
  await page.goto('http://localhost:3000/');
  await page.getByTestId('ContactEmail').fill('a@b.c');
  await page.getByRole('button', { name: 'Submit' }).click();
});
"#;

fn write_spec(dir: &Path, name: &str, source: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, source).unwrap();
    path
}

#[test]
fn test_extract_from_spec_on_disk() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_spec(dir.path(), "home.spec.js", HOME_SPEC);

    let mut parser = shotspec_core::create_parser(Vocabulary::default());
    let file = parser.parse_file(&path)?;

    assert_eq!(
        extract_variants(&file),
        vec!["main", "booking", "anotherVariant", "newInteraction"]
    );
    let interactions = extract_interactions(&file);
    assert_eq!(interactions["main"], None);
    assert_eq!(interactions["anotherVariant"], None);
    assert_eq!(
        interactions["newInteraction"].as_deref(),
        Some("await page.getByTestId('ContactName').fill('hihihi');")
    );
    Ok(())
}

#[test]
fn test_recorded_override_round_trip() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_spec(dir.path(), "home.spec.js", HOME_SPEC);

    // Introspect to find the route the recorder would be pointed at
    let mut harness = Harness::new(RunMode::Introspect, ShotConfig::default());
    SpecLoader::default().load_file(&path, &mut harness)?;
    let state = harness.sink().find("anotherVariant").expect("variant snapshot");
    assert_eq!(state.page_url("http://localhost:3000"), "http://localhost:3000/");
    assert!(state.only_this);

    let steps = extract_recorded_steps(TRANSCRIPT)?;
    let source = std::fs::read_to_string(&path)?;
    let result = ChainPatcher::default().override_interaction(&source, "anotherVariant", &steps)?;
    assert_eq!(result.outcome, PatchOutcome::InsertedBeforeCheckpoint);

    let formatted = NoopFormatter.format(&path, &result.source).into_text();
    std::fs::write(&path, &formatted)?;

    let written = std::fs::read_to_string(&path)?;
    let file = parse_spec_file(&written, &Vocabulary::default())?;
    assert_eq!(
        extract_interaction(&file, "anotherVariant").as_deref(),
        Some("await page.getByTestId('ContactEmail').fill('a@b.c');\nawait page.getByRole('button', { name: 'Submit' }).click();")
    );
    // Neighbouring variants are untouched
    assert_eq!(
        extract_interaction(&file, "booking").as_deref(),
        Some("await page.getByRole('button', { name: 'Book this room' }).click();")
    );
    assert_eq!(extract_interaction(&file, "main"), None);

    // The rewritten file still loads and carries the new interaction
    let mut harness = Harness::new(RunMode::Introspect, ShotConfig::default());
    SpecLoader::default().load_file(&path, &mut harness)?;
    assert!(harness
        .sink()
        .find("anotherVariant")
        .and_then(|s| s.page_interaction.as_deref())
        .is_some_and(|code| code.contains("ContactEmail")));
    Ok(())
}

#[test]
fn test_remove_then_remove_again() -> anyhow::Result<()> {
    let patcher = ChainPatcher::default();
    let removed = patcher.remove_interaction(HOME_SPEC, "booking")?;
    assert_eq!(removed.outcome, PatchOutcome::Removed { count: 1 });

    let again = patcher.remove_interaction(&removed.source, "booking")?;
    assert_eq!(again.outcome, PatchOutcome::NoBinding);
    assert_eq!(again.source, removed.source);

    // Lines outside the removed binding survive as written
    assert!(removed.source.starts_with("//@ts-check\nimport ScreenshotTest from '../../screenshot-test-builder';\n"));
    assert!(removed.source.contains("  .only()\n  .test()\n  .test('booking')\n"));
    Ok(())
}

#[tokio::test]
async fn test_execute_mode_uses_mock_directory() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    std::fs::write(
        dir.path().join("home.mock.json"),
        r#"{ "mockApiPresets": { "default": [{ "endpoint": "room/", "data": { "rooms": [] } }] } }"#,
    )?;
    let config = ShotConfig {
        mock_api_dir: Some(dir.path().to_path_buf()),
        ..ShotConfig::default()
    };

    let mut harness = Harness::new(RunMode::Execute, config);
    let summary = SpecLoader::default().load_source(HOME_SPEC, &mut harness)?;
    assert_eq!(summary.checkpoints, 4);
    assert_eq!(summary.test_cases, 16);

    let presets = harness.mocks().presets_for("home").await?;
    assert_eq!(presets.map(|p| p.default.len()), Some(1));

    let cases = harness.registrar().runnable();
    assert_eq!(cases.len(), 16);
    assert_eq!(cases[0].reference, vec!["home", "home-desktop-light"]);
    assert_eq!(
        cases[15].title,
        "home in @mobile viewport, @dark color scheme, @newInteraction variant"
    );

    let other = Harness::new(RunMode::Execute, ShotConfig::default())
        .with_mocks(Arc::new(JsonMockDirectory::new(dir.path())));
    assert!(other.mocks().presets_for("missing").await?.is_none());
    Ok(())
}
