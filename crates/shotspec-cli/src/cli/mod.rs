//! Non-interactive driver over shotspec-core
//!
//! The tool wires the library operations together the way an interactive
//! front end would:
//! - spec-file discovery under the configured spec directory
//! - variant listing and interaction display
//! - builder state dumps via an introspection load
//! - interaction override and removal, followed by formatting and write-back

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Arg, ArgAction, ArgGroup, Command};
use shotspec_core::{
    create_formatter, extract_interaction, extract_recorded_steps, extract_variants, ChainPatcher, Formatter, Harness,
    PatchOutcome, PatchResult, RunMode, ShotConfig, SpecLoader,
};

pub mod commands;
pub mod notifier;

pub use commands::{CodeSource, ToolCommand};
pub use notifier::{DefaultNotifier, ToolNotifier};

/// Command line definition of the `shotspec` binary
pub fn command_line() -> Command {
    let file = || Arg::new("file").value_name("FILE").help("Spec file").required(true).index(1);
    let variant = || {
        Arg::new("variant")
            .value_name("VARIANT")
            .help("Variant name (default: main)")
            .index(2)
    };
    let dry_run = || {
        Arg::new("dry-run")
            .long("dry-run")
            .help("Print the rewritten file instead of writing it")
            .action(ArgAction::SetTrue)
    };

    Command::new("shotspec")
        .version(shotspec_core::VERSION)
        .about("Inspect and rewrite screenshot test spec files")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .help("JSON config file (default: ./shotspec.json when present)")
                .global(true),
        )
        .arg(
            Arg::new("spec-dir")
                .long("spec-dir")
                .value_name("DIR")
                .help("Directory searched for spec files")
                .global(true),
        )
        .arg(
            Arg::new("formatter")
                .long("formatter")
                .value_name("COMMAND")
                .help("Formatter command; {path} is replaced by the spec file path")
                .global(true),
        )
        .arg(
            Arg::new("debug")
                .long("debug")
                .help("Enable debug logging")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(Command::new("files").about("List spec files"))
        .subcommand(
            Command::new("variants")
                .about("List the variants of a spec file")
                .arg(file()),
        )
        .subcommand(
            Command::new("interaction")
                .about("Show the interaction bound to a variant")
                .arg(file())
                .arg(variant()),
        )
        .subcommand(
            Command::new("state")
                .about("Print the builder state captured for a variant as JSON")
                .arg(file())
                .arg(variant()),
        )
        .subcommand(
            Command::new("override")
                .about("Bind new interaction code to a variant")
                .arg(file())
                .arg(variant())
                .arg(Arg::new("code").long("code").value_name("CODE").help("Interaction code"))
                .arg(
                    Arg::new("code-file")
                        .long("code-file")
                        .value_name("PATH")
                        .help("File holding the interaction code"),
                )
                .arg(
                    Arg::new("recording")
                        .long("recording")
                        .value_name("PATH")
                        .help("Recorder transcript whose steps become the interaction"),
                )
                .group(
                    ArgGroup::new("source")
                        .args(["code", "code-file", "recording"])
                        .required(true),
                )
                .arg(dry_run()),
        )
        .subcommand(
            Command::new("remove")
                .about("Remove the interaction bound to a variant")
                .arg(file())
                .arg(variant())
                .arg(dry_run()),
        )
}

/// Resolve the configuration: config file first, then command line overrides
pub fn resolve_config(
    config_path: Option<&Path>,
    spec_dir: Option<&str>,
    formatter: Option<&str>,
) -> Result<ShotConfig> {
    let mut config = match config_path {
        Some(path) => ShotConfig::load(path)?,
        None => {
            let default_path = Path::new("shotspec.json");
            if default_path.exists() {
                ShotConfig::load(default_path)?
            } else {
                ShotConfig::default()
            }
        }
    };
    if let Some(dir) = spec_dir {
        config.spec_dir = dir.into();
    }
    if let Some(command) = formatter {
        config.formatter = Some(command.to_string());
    }
    Ok(config)
}

/// Spec-file tool over one configuration
pub struct Tool {
    config: ShotConfig,
    formatter: Box<dyn Formatter>,
    notifier: Box<dyn ToolNotifier>,
}

impl Tool {
    pub fn new(config: ShotConfig) -> Self {
        let formatter = create_formatter(config.formatter.as_deref());
        Self {
            config,
            formatter,
            notifier: Box::new(DefaultNotifier::new()),
        }
    }

    pub fn set_notifier(&mut self, notifier: Box<dyn ToolNotifier>) {
        self.notifier = notifier;
    }

    pub fn notifier(&self) -> &dyn ToolNotifier {
        self.notifier.as_ref()
    }

    pub fn set_formatter(&mut self, formatter: Box<dyn Formatter>) {
        self.formatter = formatter;
    }

    pub fn config(&self) -> &ShotConfig {
        &self.config
    }

    /// Run one command and return its printable output
    pub fn handle_command(&mut self, command: ToolCommand) -> Result<String> {
        tracing::debug!(?command, "Handling command");
        match command {
            ToolCommand::Files => {
                let files = self.spec_files()?;
                if files.is_empty() {
                    return Ok(format!(
                        "No spec files found in {}",
                        self.config.spec_dir.display()
                    ));
                }
                Ok(files
                    .iter()
                    .map(|path| path.display().to_string())
                    .collect::<Vec<_>>()
                    .join("\n"))
            }
            ToolCommand::Variants { file } => {
                let spec = self.parse(&file)?;
                let variants = extract_variants(&spec);
                if variants.is_empty() {
                    return Ok("No variants".to_string());
                }
                Ok(variants.join("\n"))
            }
            ToolCommand::Interaction { file, variant } => {
                let spec = self.parse(&file)?;
                Ok(extract_interaction(&spec, &variant)
                    .unwrap_or_else(|| format!("No interaction for variant '{variant}'")))
            }
            ToolCommand::State { file, variant } => self.state(&file, &variant),
            ToolCommand::Override {
                file,
                variant,
                code,
                dry_run,
            } => {
                let code = self.read_code(&code)?;
                let source = read_source(&file)?;
                let result = self
                    .patcher()
                    .override_interaction(&source, &variant, &code)
                    .with_context(|| format!("Failed to override interaction in {}", file.display()))?;
                self.apply(&file, &variant, result, dry_run)
            }
            ToolCommand::Remove {
                file,
                variant,
                dry_run,
            } => {
                let source = read_source(&file)?;
                let result = self
                    .patcher()
                    .remove_interaction(&source, &variant)
                    .with_context(|| format!("Failed to remove interaction in {}", file.display()))?;
                self.apply(&file, &variant, result, dry_run)
            }
        }
    }

    /// Spec files under the spec directory, sorted
    pub fn spec_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        collect_spec_files(&self.config.spec_dir, &self.config.spec_suffix, &mut files)
            .with_context(|| format!("Failed to search {}", self.config.spec_dir.display()))?;
        files.sort();
        Ok(files)
    }

    fn parse(&self, file: &Path) -> Result<shotspec_core::SpecFile> {
        let source = read_source(file)?;
        shotspec_core::parse_spec_file(&source, &self.config.vocabulary)
            .with_context(|| format!("Failed to parse {}", file.display()))
    }

    fn patcher(&self) -> ChainPatcher {
        ChainPatcher::new(self.config.vocabulary.clone())
    }

    fn state(&self, file: &Path, variant: &str) -> Result<String> {
        let mut harness = Harness::new(RunMode::Introspect, self.config.clone());
        SpecLoader::new(self.config.vocabulary.clone())
            .load_file(file, &mut harness)
            .with_context(|| format!("Failed to load spec file {}", file.display()))?;

        let snapshot = harness
            .sink()
            .find(variant)
            .ok_or_else(|| anyhow!("No state found for variant \"{variant}\" in file: {}", file.display()))?;
        Ok(serde_json::to_string_pretty(snapshot)?)
    }

    fn read_code(&self, code: &CodeSource) -> Result<String> {
        match code {
            CodeSource::Inline(code) => Ok(code.clone()),
            CodeSource::File(path) => read_source(path),
            CodeSource::Recording(path) => {
                let transcript = read_source(path)?;
                let steps = extract_recorded_steps(&transcript)
                    .with_context(|| format!("Failed to parse recording {}", path.display()))?;
                if steps.trim().is_empty() {
                    bail!("Recording {} holds no steps", path.display());
                }
                Ok(steps)
            }
        }
    }

    /// Format and write a patch result, or describe why nothing changed
    fn apply(&self, file: &Path, variant: &str, result: PatchResult, dry_run: bool) -> Result<String> {
        let summary = match result.outcome {
            PatchOutcome::Replaced => format!("Replaced interaction of variant '{variant}'"),
            PatchOutcome::InsertedBeforeCheckpoint => format!("Added interaction to variant '{variant}'"),
            PatchOutcome::CreatedCheckpoint => format!("Created variant '{variant}' with its interaction"),
            PatchOutcome::Removed { count } => format!("Removed {count} interaction(s) of variant '{variant}'"),
            PatchOutcome::NoBinding => return Ok(format!("Variant '{variant}' has no interaction")),
            PatchOutcome::VariantNotFound => {
                return Ok(format!("Variant '{variant}' not found in {}", file.display()))
            }
        };

        let formatted = self.formatter.format(file, &result.source);
        if let Some(warning) = formatted.warning() {
            self.notifier.on_warning(&format!("{warning}; writing unformatted source"));
        }
        let text = formatted.into_text();

        if dry_run {
            return Ok(text);
        }
        std::fs::write(file, &text).with_context(|| format!("Failed to write {}", file.display()))?;
        tracing::info!(path = %file.display(), outcome = ?result.outcome, "Wrote spec file");
        Ok(format!("{summary} in {}", file.display()))
    }
}

fn read_source(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn collect_spec_files(dir: &Path, suffix: &str, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            if entry.file_name() == "node_modules" {
                continue;
            }
            collect_spec_files(&path, suffix, out)?;
        } else if path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with(suffix))
        {
            out.push(path);
        }
    }
    Ok(())
}
