//! Output notification for the command line tool
//!
//! Command results and diagnostics go through a [`ToolNotifier`] so the
//! console can be swapped for another backend.

/// Trait for handling tool output notifications
pub trait ToolNotifier: Send + Sync {
    /// Handle regular output
    fn on_output(&self, content: &str);

    /// Handle a non-fatal problem, e.g. a formatter failure
    fn on_warning(&self, content: &str);

    /// Handle error output
    fn on_error(&self, content: &str);
}

/// Default console-based notifier
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultNotifier;

impl DefaultNotifier {
    pub fn new() -> Self {
        Self
    }
}

impl ToolNotifier for DefaultNotifier {
    fn on_output(&self, content: &str) {
        if !content.is_empty() {
            println!("{content}");
        }
    }

    fn on_warning(&self, content: &str) {
        eprintln!("warning: {content}");
    }

    fn on_error(&self, content: &str) {
        eprintln!("error: {content}");
    }
}
