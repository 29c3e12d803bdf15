// Recorder transcript extraction
// A recorded transcript is a test file whose callbacks hold the captured
// steps. The first line of each body is the recorder's own navigation, which
// the builder performs itself, so it is dropped.

use crate::ast::{Expr, ExprKind, FunctionBody, SpecFile};
use crate::config::Vocabulary;
use crate::parser::{parse_spec_file, ParseError};

/// Steps recorded in `transcript`, ready to be used as interaction code
pub fn extract_recorded_steps(transcript: &str) -> Result<String, ParseError> {
    let file = parse_spec_file(transcript, &Vocabulary::default())?;
    let bodies = callback_bodies(&file);
    tracing::debug!(callbacks = bodies.len(), "Extracted recorded callbacks");

    let steps: Vec<String> = bodies
        .iter()
        .map(|body| body.lines().skip(1).collect::<Vec<_>>().join("\n"))
        .filter(|steps| !steps.trim().is_empty())
        .collect();
    Ok(steps.join("\n"))
}

/// Block bodies of all top-level callbacks, in source order
fn callback_bodies(file: &SpecFile) -> Vec<String> {
    fn collect(expr: &Expr, out: &mut Vec<String>) {
        if let ExprKind::Function(function) = &expr.kind {
            if let FunctionBody::Block(block) = &function.body {
                out.push(block.code.clone());
                return;
            }
        }
        expr.for_each_child(&mut |child| collect(child, out));
    }

    let mut out = Vec::new();
    for stmt in &file.statements {
        if let Some(expr) = stmt.expr() {
            collect(expr, &mut out);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_recorded_steps_drop_navigation() {
        let transcript = r#"import { test, expect } from '@playwright/test';

test('test', async ({ page }) => {
  await page.goto('https://automationintesting.online/');
  await page.getByRole('button', { name: 'Book this room' }).click();
  await page.getByTestId('ContactPhone').fill('ggg');
});
"#;
        assert_eq!(
            extract_recorded_steps(transcript).unwrap(),
            "await page.getByRole('button', { name: 'Book this room' }).click();\nawait page.getByTestId('ContactPhone').fill('ggg');"
        );
    }

    #[test]
    fn test_several_callbacks_are_joined() {
        let transcript = "test('a', async ({ page }) => {\n  await page.goto('/');\n  await a();\n});\ntest('b', async function ({ page }) {\n  await page.goto('/');\n  await b();\n});\n";
        assert_eq!(extract_recorded_steps(transcript).unwrap(), "await a();\nawait b();");
    }

    #[test]
    fn test_navigation_only_transcript_is_empty() {
        let transcript = "test('a', async ({ page }) => {\n  await page.goto('/');\n});\n";
        assert_eq!(extract_recorded_steps(transcript).unwrap(), "");
    }

    #[test]
    fn test_invalid_transcript_is_an_error() {
        assert!(extract_recorded_steps("test('a', async ({ page }) => {").is_err());
    }
}
