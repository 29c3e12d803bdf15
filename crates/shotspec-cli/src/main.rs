use std::path::Path;

use anyhow::Result;
use shotspec_cli::cli::{command_line, resolve_config};
use shotspec_cli::{DefaultNotifier, Tool, ToolCommand, ToolNotifier};
use shotspec_core::{init_tracing, init_tracing_with};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = command_line().get_matches();

    // Initialize logging
    if matches.get_flag("debug") {
        init_tracing_with("shotspec_core=debug");
    } else {
        init_tracing();
    }

    let notifier = DefaultNotifier::new();
    let config = resolve_config(
        matches.get_one::<String>("config").map(Path::new),
        matches.get_one::<String>("spec-dir").map(String::as_str),
        matches.get_one::<String>("formatter").map(String::as_str),
    )?;
    let command = ToolCommand::from_matches(&matches)?;

    let mut tool = Tool::new(config);
    match tool.handle_command(command) {
        Ok(output) => {
            notifier.on_output(&output);
            Ok(())
        }
        Err(err) => {
            notifier.on_error(&format!("{err:#}"));
            std::process::exit(1);
        }
    }
}
