use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use pretty_assertions::assert_eq;
use shotspec_cli::{CodeSource, Tool, ToolCommand, ToolNotifier};
use shotspec_core::{FormatOutcome, Formatter, ShotConfig};
use tempfile::TempDir;

const SPEC: &str = r#"import ScreenshotTest from '../screenshot-test-builder';

new ScreenshotTest()
  .forPage('/home')
  .test()
  .setPageInteraction(async (page) => {
    await page.click('#book');
  })
  .test('booking');
"#;

#[derive(Clone, Default)]
struct CapturingNotifier {
    warnings: Arc<Mutex<Vec<String>>>,
}

impl ToolNotifier for CapturingNotifier {
    fn on_output(&self, _content: &str) {}

    fn on_warning(&self, content: &str) {
        self.warnings.lock().unwrap().push(content.to_string());
    }

    fn on_error(&self, _content: &str) {}
}

/// Formatter that always fails, leaving the text as it is
struct BrokenFormatter;

impl Formatter for BrokenFormatter {
    fn format(&self, _path: &Path, text: &str) -> FormatOutcome {
        FormatOutcome::Unformatted {
            text: text.to_string(),
            warning: "formatter crashed".to_string(),
        }
    }

    fn name(&self) -> &str {
        "broken"
    }
}

fn setup() -> (TempDir, PathBuf, Tool) {
    let dir = TempDir::new().unwrap();
    let tests = dir.path().join("tests");
    std::fs::create_dir_all(tests.join("home")).unwrap();
    let spec = tests.join("home").join("home.spec.js");
    std::fs::write(&spec, SPEC).unwrap();
    std::fs::write(tests.join("notes.md"), "not a spec").unwrap();

    let config = ShotConfig {
        spec_dir: tests,
        ..ShotConfig::default()
    };
    (dir, spec, Tool::new(config))
}

#[test]
fn test_files_lists_spec_files_only() {
    let (_dir, spec, mut tool) = setup();
    let output = tool.handle_command(ToolCommand::Files).unwrap();
    assert_eq!(output, spec.display().to_string());
}

#[test]
fn test_variants_and_interaction() {
    let (_dir, spec, mut tool) = setup();
    let variants = tool
        .handle_command(ToolCommand::Variants { file: spec.clone() })
        .unwrap();
    assert_eq!(variants, "main\nbooking");

    let interaction = tool
        .handle_command(ToolCommand::Interaction {
            file: spec.clone(),
            variant: "booking".into(),
        })
        .unwrap();
    assert_eq!(interaction, "await page.click('#book');");

    let none = tool
        .handle_command(ToolCommand::Interaction {
            file: spec,
            variant: "main".into(),
        })
        .unwrap();
    assert_eq!(none, "No interaction for variant 'main'");
}

#[test]
fn test_state_dumps_snapshot_json() {
    let (_dir, spec, mut tool) = setup();
    let output = tool
        .handle_command(ToolCommand::State {
            file: spec.clone(),
            variant: "booking".into(),
        })
        .unwrap();
    let state: serde_json::Value = serde_json::from_str(&output).unwrap();
    assert_eq!(state["pageRoute"], "/home");
    assert_eq!(state["viewName"], "-home");
    assert_eq!(state["viewPortResolution"]["desktop"]["width"], 1396);
    assert_eq!(state["pageInteraction"], "await page.click('#book');");

    let err = tool
        .handle_command(ToolCommand::State {
            file: spec,
            variant: "nope".into(),
        })
        .unwrap_err();
    assert!(err.to_string().contains("No state found for variant \"nope\""));
}

#[test]
fn test_override_writes_file() {
    let (_dir, spec, mut tool) = setup();
    let output = tool
        .handle_command(ToolCommand::Override {
            file: spec.clone(),
            variant: "main".into(),
            code: CodeSource::Inline("await page.click('#main');".into()),
            dry_run: false,
        })
        .unwrap();
    assert!(output.starts_with("Added interaction to variant 'main'"));

    let interaction = tool
        .handle_command(ToolCommand::Interaction {
            file: spec,
            variant: "main".into(),
        })
        .unwrap();
    assert_eq!(interaction, "await page.click('#main');");
}

#[test]
fn test_override_from_recording() {
    let (dir, spec, mut tool) = setup();
    let recording = dir.path().join("recording.js");
    std::fs::write(
        &recording,
        "test('test', async ({ page }) => {\n  await page.goto('http://localhost:3000/home');\n  await page.click('#rec');\n});\n",
    )
    .unwrap();

    tool.handle_command(ToolCommand::Override {
        file: spec.clone(),
        variant: "booking".into(),
        code: CodeSource::Recording(recording),
        dry_run: false,
    })
    .unwrap();

    let written = std::fs::read_to_string(&spec).unwrap();
    assert!(written.contains("    await page.click('#rec');\n"));
    assert!(!written.contains("#book"));
}

#[test]
fn test_dry_run_leaves_file_alone() {
    let (_dir, spec, mut tool) = setup();
    let output = tool
        .handle_command(ToolCommand::Remove {
            file: spec.clone(),
            variant: "booking".into(),
            dry_run: true,
        })
        .unwrap();
    assert!(!output.contains("setPageInteraction"));
    assert_eq!(std::fs::read_to_string(&spec).unwrap(), SPEC);
}

#[test]
fn test_remove_without_binding_is_a_no_op() {
    let (_dir, spec, mut tool) = setup();
    let output = tool
        .handle_command(ToolCommand::Remove {
            file: spec.clone(),
            variant: "main".into(),
            dry_run: false,
        })
        .unwrap();
    assert_eq!(output, "Variant 'main' has no interaction");
    assert_eq!(std::fs::read_to_string(&spec).unwrap(), SPEC);
}

#[test]
fn test_formatter_failure_still_writes() {
    let (_dir, spec, mut tool) = setup();
    let notifier = CapturingNotifier::default();
    tool.set_notifier(Box::new(notifier.clone()));
    tool.set_formatter(Box::new(BrokenFormatter));

    tool.handle_command(ToolCommand::Remove {
        file: spec.clone(),
        variant: "booking".into(),
        dry_run: false,
    })
    .unwrap();

    assert!(!std::fs::read_to_string(&spec).unwrap().contains("setPageInteraction"));
    let warnings = notifier.warnings.lock().unwrap();
    assert_eq!(warnings.as_slice(), ["formatter crashed; writing unformatted source"]);
}

#[test]
fn test_invalid_code_is_reported() {
    let (_dir, spec, mut tool) = setup();
    let err = tool
        .handle_command(ToolCommand::Override {
            file: spec.clone(),
            variant: "booking".into(),
            code: CodeSource::Inline("await page.click(".into()),
            dry_run: false,
        })
        .unwrap_err();
    assert!(format!("{err:#}").contains("Interaction code does not parse"));
    assert_eq!(std::fs::read_to_string(&spec).unwrap(), SPEC);
}
