//! # Shotspec Core
//!
//! Core implementation of the shotspec visual-regression tooling, including:
//! - Spec-file AST, parser and source printer
//! - Builder-chain walker with variant and interaction extraction
//! - Chain patcher that rewrites the page interaction bound to one variant
//! - Screenshot test builder with execute and introspection harnesses
//! - Spec loader, recorder transcript extraction and formatter bridge
//!
//! This crate provides the building blocks the `shotspec` command line tool
//! is made of, and that test runners can drive through the [`builder::Page`]
//! automation trait.

#![warn(clippy::all)]

pub mod ast;
pub mod builder;
pub mod chain;
pub mod config;
pub mod format;
pub mod loader;
pub mod parser;

// Re-export commonly used types
pub use ast::{print, SpecFile, DEFAULT_VARIANT};
pub use builder::{
    harness::{Harness, IntrospectionSink, TestCase, TestRegistrar, VariantSnapshot},
    mocks::{JsonMockDirectory, MockApiSource, MockPresets},
    page::{ColorScheme, Interaction, MockResponse, Page, ScreenshotOptions, Step, StepError, ViewportSize},
    BuilderError, PageState, ScreenshotTest, WaitFor,
};
pub use chain::{
    extract_interaction, extract_interactions, extract_recorded_steps, extract_variants,
    ChainEvent, ChainPatcher, ChainVisitor, ChainWalker, PatchError, PatchOutcome, PatchResult,
    WalkContext,
};
pub use config::{ConfigError, RunMode, ShotConfig, Vocabulary};
pub use format::{create_formatter, CommandFormatter, FormatOutcome, Formatter, NoopFormatter};
pub use loader::{LoadError, LoadSummary, SpecLoader};
pub use parser::{create_parser, parse_spec_file, ParseError, Parser};

/// Shotspec version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize tracing for shotspec core components
pub fn init_tracing() {
    init_tracing_with("shotspec_core=info");
}

/// Initialize tracing with an explicit default directive, e.g. `shotspec_core=debug`
pub fn init_tracing_with(directive: &str) {
    let filter = tracing_subscriber::EnvFilter::from_default_env();
    let filter = match directive.parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    };
    // A subscriber may already be installed by the host test runner
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Error types for shotspec core operations
#[derive(thiserror::Error, Debug)]
pub enum ShotError {
    /// Spec file did not parse
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Spec file could not be replayed against the builder
    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    /// Builder misuse
    #[error("Builder error: {0}")]
    Builder(#[from] BuilderError),

    /// Chain rewrite failed
    #[error("Patch error: {0}")]
    Patch(#[from] PatchError),

    /// Page automation step failed
    #[error("Step error: {0}")]
    Step(#[from] StepError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// File system error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for shotspec core operations
pub type Result<T> = std::result::Result<T, ShotError>;
