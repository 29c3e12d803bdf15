//! Tool command definitions
//!
//! Maps parsed command line matches onto [`ToolCommand`] values.

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::ArgMatches;
use shotspec_core::DEFAULT_VARIANT;

/// Where the replacement interaction code comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeSource {
    /// Code given on the command line
    Inline(String),
    /// File holding the code
    File(PathBuf),
    /// Recorder transcript; its recorded steps are used
    Recording(PathBuf),
}

/// Available tool commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCommand {
    /// List spec files under the spec directory
    Files,
    /// List the variants of a spec file
    Variants { file: PathBuf },
    /// Show the interaction bound to a variant
    Interaction { file: PathBuf, variant: String },
    /// Dump the builder state captured for a variant
    State { file: PathBuf, variant: String },
    /// Bind new interaction code to a variant
    Override {
        file: PathBuf,
        variant: String,
        code: CodeSource,
        dry_run: bool,
    },
    /// Remove the interaction bound to a variant
    Remove {
        file: PathBuf,
        variant: String,
        dry_run: bool,
    },
}

impl ToolCommand {
    /// Build a command from the matches of the `shotspec` command line
    pub fn from_matches(matches: &ArgMatches) -> Result<Self> {
        let (name, sub) = matches
            .subcommand()
            .ok_or_else(|| anyhow!("No command given; try --help"))?;

        let file = || -> Result<PathBuf> {
            sub.get_one::<String>("file")
                .map(PathBuf::from)
                .ok_or_else(|| anyhow!("Usage: shotspec {name} <FILE>"))
        };
        let variant = || {
            sub.get_one::<String>("variant")
                .cloned()
                .unwrap_or_else(|| DEFAULT_VARIANT.to_string())
        };
        let dry_run = || sub.get_flag("dry-run");

        match name {
            "files" => Ok(ToolCommand::Files),
            "variants" => Ok(ToolCommand::Variants { file: file()? }),
            "interaction" => Ok(ToolCommand::Interaction {
                file: file()?,
                variant: variant(),
            }),
            "state" => Ok(ToolCommand::State {
                file: file()?,
                variant: variant(),
            }),
            "override" => {
                let code = if let Some(code) = sub.get_one::<String>("code") {
                    CodeSource::Inline(code.clone())
                } else if let Some(path) = sub.get_one::<String>("code-file") {
                    CodeSource::File(path.into())
                } else if let Some(path) = sub.get_one::<String>("recording") {
                    CodeSource::Recording(path.into())
                } else {
                    return Err(anyhow!(
                        "Usage: shotspec override <FILE> [VARIANT] (--code <CODE> | --code-file <PATH> | --recording <PATH>)"
                    ));
                };
                Ok(ToolCommand::Override {
                    file: file()?,
                    variant: variant(),
                    code,
                    dry_run: dry_run(),
                })
            }
            "remove" => Ok(ToolCommand::Remove {
                file: file()?,
                variant: variant(),
                dry_run: dry_run(),
            }),
            other => Err(anyhow!("Unknown command: {other}")),
        }
    }
}
