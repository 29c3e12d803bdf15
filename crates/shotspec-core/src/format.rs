// Formatter bridge: best-effort formatting of rewritten spec files
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

/// Result of a formatting attempt. Formatting never fails the caller; an
/// unformatted outcome still carries the text to write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatOutcome {
    Formatted(String),
    Unformatted { text: String, warning: String },
}

impl FormatOutcome {
    pub fn text(&self) -> &str {
        match self {
            FormatOutcome::Formatted(text) => text,
            FormatOutcome::Unformatted { text, .. } => text,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            FormatOutcome::Formatted(text) => text,
            FormatOutcome::Unformatted { text, .. } => text,
        }
    }

    pub fn warning(&self) -> Option<&str> {
        match self {
            FormatOutcome::Formatted(_) => None,
            FormatOutcome::Unformatted { warning, .. } => Some(warning),
        }
    }
}

/// Formats spec-file source before it is written to `path`
pub trait Formatter: Send + Sync {
    fn format(&self, path: &Path, text: &str) -> FormatOutcome;

    fn name(&self) -> &str;
}

/// Leaves text as it is
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopFormatter;

impl Formatter for NoopFormatter {
    fn format(&self, _path: &Path, text: &str) -> FormatOutcome {
        FormatOutcome::Formatted(text.to_string())
    }

    fn name(&self) -> &str {
        "noop"
    }
}

/// Pipes text through an external command, e.g.
/// `prettier --stdin-filepath {path}`. The command reads the source on stdin
/// and writes the formatted source to stdout.
#[derive(Debug, Clone)]
pub struct CommandFormatter {
    command: String,
}

impl CommandFormatter {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    fn run(&self, path: &Path, text: &str) -> Result<String, String> {
        let path = path.display().to_string();
        let mut words = self
            .command
            .split_whitespace()
            .map(|word| word.replace("{path}", &path));
        let program = words.next().ok_or("formatter command is empty")?;

        let mut child = Command::new(&program)
            .args(words)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| format!("failed to start '{program}': {err}"))?;

        // Written from a thread so a chatty formatter cannot block on a full pipe
        let writer = child.stdin.take().map(|mut stdin| {
            let input = text.to_string();
            std::thread::spawn(move || stdin.write_all(input.as_bytes()))
        });

        let output = child
            .wait_with_output()
            .map_err(|err| format!("'{program}' did not finish: {err}"))?;
        if let Some(writer) = writer {
            match writer.join() {
                Ok(Ok(())) => {}
                Ok(Err(err)) => return Err(format!("failed to write to '{program}': {err}")),
                Err(_) => return Err(format!("writer thread for '{program}' panicked")),
            }
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!("'{program}' exited with {}: {}", output.status, stderr.trim()));
        }
        String::from_utf8(output.stdout).map_err(|_| format!("'{program}' wrote invalid UTF-8"))
    }
}

impl Formatter for CommandFormatter {
    fn format(&self, path: &Path, text: &str) -> FormatOutcome {
        match self.run(path, text) {
            Ok(formatted) => {
                tracing::debug!(path = %path.display(), "Formatted with '{}'", self.command);
                FormatOutcome::Formatted(formatted)
            }
            Err(warning) => {
                tracing::warn!(path = %path.display(), "Formatter failed: {}", warning);
                FormatOutcome::Unformatted {
                    text: text.to_string(),
                    warning,
                }
            }
        }
    }

    fn name(&self) -> &str {
        &self.command
    }
}

/// Formatter for an optional configured command
pub fn create_formatter(command: Option<&str>) -> Box<dyn Formatter> {
    match command {
        Some(command) if !command.trim().is_empty() => Box::new(CommandFormatter::new(command)),
        _ => Box::new(NoopFormatter),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_formatter() {
        let outcome = NoopFormatter.format(Path::new("a.spec.js"), "x;\n");
        assert_eq!(outcome, FormatOutcome::Formatted("x;\n".to_string()));
        assert_eq!(outcome.warning(), None);
    }

    #[test]
    fn test_create_formatter() {
        assert_eq!(create_formatter(None).name(), "noop");
        assert_eq!(create_formatter(Some("  ")).name(), "noop");
        assert_eq!(create_formatter(Some("prettier --stdin-filepath {path}")).name(), "prettier --stdin-filepath {path}");
    }

    #[cfg(unix)]
    #[test]
    fn test_command_formatter_pipes_text() {
        let outcome = CommandFormatter::new("tr a-z A-Z").format(Path::new("a.spec.js"), "new b();\n");
        assert_eq!(outcome.into_text(), "NEW B();\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_command_formatter_substitutes_path() {
        let outcome = CommandFormatter::new("echo {path}").format(Path::new("tests/a.spec.js"), "");
        assert_eq!(outcome.text(), "tests/a.spec.js\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_formatter_keeps_text() {
        let outcome = CommandFormatter::new("false").format(Path::new("a.spec.js"), "keep;\n");
        assert_eq!(outcome.text(), "keep;\n");
        assert!(outcome.warning().is_some());

        let outcome = CommandFormatter::new("shotspec-no-such-formatter").format(Path::new("a.spec.js"), "keep;\n");
        assert!(outcome.warning().unwrap().contains("failed to start"));

        let outcome = CommandFormatter::new("").format(Path::new("a.spec.js"), "keep;\n");
        assert_eq!(outcome.warning(), Some("formatter command is empty"));
    }
}
