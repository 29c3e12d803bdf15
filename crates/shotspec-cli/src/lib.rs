//! Shotspec CLI - non-interactive driver for screenshot test spec files
//!
//! Lists spec files and their variants, shows the interaction bound to a
//! variant, dumps the builder state a variant was captured with, and
//! overrides or removes interactions in place.

pub mod cli;

// Re-export commonly used types for convenience
pub use cli::{CodeSource, DefaultNotifier, Tool, ToolCommand, ToolNotifier};
