//! Terminal user interface.
//!
//! This module provides:
//! - [`UserInterface`] trait for UI abstraction
//! - [`TerminalUI`] for interactive terminal usage
//! - [`NonInteractiveUI`] for scripted and CI runs
//! - [`MockUI`] for tests
//! - Prompts, spinners, tables and the end-of-run summary
//!
//! # Example
//!
//! ```
//! use previsbine::ui::{create_ui, OutputMode};
//!
//! let mut ui = create_ui(false, OutputMode::Quiet, false);
//! ui.show_header("MyMod.esp");
//! ui.success("Build complete");
//! ```

pub mod mock;
pub mod non_interactive;
pub mod output;
pub mod progress;
pub mod prompts;
pub mod spinner;
pub mod summary;
pub mod table;
pub mod terminal;
pub mod theme;

pub use mock::{MockSpinner, MockUI, SpinnerStatus};
pub use non_interactive::NonInteractiveUI;
pub use output::OutputMode;
pub use progress::{format_duration, format_relative_time};
pub use prompts::{parse_bool, prompt_user};
pub use spinner::ProgressSpinner;
pub use summary::{render_halt, render_summary, BuildSummary, SummaryRow};
pub use table::Table;
pub use terminal::{create_ui, TerminalUI};
pub use theme::{should_use_colors, PrevisTheme};

use crate::error::Result;
use crate::pipeline::HaltReport;

/// Everything the commands need from the terminal.
///
/// Implemented by the real terminal, the non-interactive writer and the
/// test mock.
pub trait UserInterface {
    fn output_mode(&self) -> OutputMode;

    fn message(&mut self, msg: &str);

    fn success(&mut self, msg: &str);

    fn warning(&mut self, msg: &str);

    /// Errors are shown in every output mode.
    fn error(&mut self, msg: &str);

    /// Show a prompt and get user input.
    fn prompt(&mut self, prompt: &Prompt) -> Result<PromptResult>;

    /// Start a spinner for a running step.
    fn start_spinner(&mut self, message: &str) -> Box<dyn SpinnerHandle>;

    fn show_header(&mut self, title: &str);

    fn show_hint(&mut self, hint: &str);

    /// Explain why the build halted.
    fn show_halt(&mut self, report: &HaltReport);

    fn show_summary(&mut self, summary: &BuildSummary);

    fn is_interactive(&self) -> bool;
}

/// Handle for controlling a spinner.
pub trait SpinnerHandle {
    fn set_message(&mut self, msg: &str);

    fn finish_success(&mut self, msg: &str);

    fn finish_error(&mut self, msg: &str);

    fn finish_skipped(&mut self, msg: &str);
}

/// A question for the user.
#[derive(Debug, Clone)]
pub struct Prompt {
    /// Stable key, used for `PREVISBINE_PROMPT_<KEY>` overrides.
    pub key: String,
    pub question: String,
    pub prompt_type: PromptType,
    /// Answer used when the user just presses enter, or when nobody is
    /// there to ask.
    pub default: Option<String>,
}

impl Prompt {
    pub fn confirm(key: &str, question: &str, default: bool) -> Self {
        Self {
            key: key.to_string(),
            question: question.to_string(),
            prompt_type: PromptType::Confirm,
            default: Some(default.to_string()),
        }
    }

    pub fn input(key: &str, question: &str) -> Self {
        Self {
            key: key.to_string(),
            question: question.to_string(),
            prompt_type: PromptType::Input,
            default: None,
        }
    }

    pub fn select(key: &str, question: &str, options: Vec<PromptOption>) -> Self {
        Self {
            key: key.to_string(),
            question: question.to_string(),
            prompt_type: PromptType::Select { options },
            default: None,
        }
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }
}

#[derive(Debug, Clone)]
pub enum PromptType {
    /// Yes/no confirmation.
    Confirm,
    /// Free-form text input.
    Input,
    /// Select one from a list of options.
    Select { options: Vec<PromptOption> },
}

/// An option in a select prompt.
#[derive(Debug, Clone)]
pub struct PromptOption {
    pub label: String,
    /// Value returned when selected.
    pub value: String,
}

impl PromptOption {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// Result of a prompt.
#[derive(Debug, Clone, PartialEq)]
pub enum PromptResult {
    Bool(bool),
    String(String),
}

impl PromptResult {
    pub fn as_string(&self) -> String {
        match self {
            Self::Bool(b) => b.to_string(),
            Self::String(s) => s.clone(),
        }
    }

    /// A confirm answer, or a textual yes/no from an override.
    pub fn as_bool(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::String(s) => parse_bool(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirm_prompt_stores_default_as_text() {
        let prompt = Prompt::confirm("proceed", "Proceed with build?", true);
        assert!(matches!(prompt.prompt_type, PromptType::Confirm));
        assert_eq!(prompt.default.as_deref(), Some("true"));
    }

    #[test]
    fn select_prompt_keeps_option_order() {
        let prompt = Prompt::select(
            "mode",
            "Build mode",
            vec![
                PromptOption::new("Clean", "clean"),
                PromptOption::new("Filtered", "filtered"),
            ],
        )
        .with_default("filtered");
        let PromptType::Select { options } = &prompt.prompt_type else {
            panic!("expected select");
        };
        assert_eq!(options[1].value, "filtered");
        assert_eq!(prompt.default.as_deref(), Some("filtered"));
    }

    #[test]
    fn prompt_result_conversions() {
        assert_eq!(PromptResult::Bool(true).as_string(), "true");
        assert!(PromptResult::String("yes".to_string()).as_bool());
        assert!(!PromptResult::String("MyMod.esp".to_string()).as_bool());
    }
}
