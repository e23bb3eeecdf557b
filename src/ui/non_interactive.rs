//! Non-interactive UI for scripted and CI runs.

use std::collections::HashMap;

use crate::error::{PrevisError, Result};
use crate::pipeline::HaltReport;

use super::theme::PrevisTheme;
use super::{
    parse_bool, render_halt, render_summary, BuildSummary, OutputMode, Prompt, PromptResult,
    PromptType, SpinnerHandle, UserInterface,
};

/// Prefix of environment variables that answer prompts.
pub const PROMPT_ENV_PREFIX: &str = "PREVISBINE_PROMPT_";

/// UI implementation for non-interactive mode.
///
/// Prompts are answered from `PREVISBINE_PROMPT_<KEY>` variables, then from
/// the prompt's default. In CI the "step started" lines are dropped, since
/// every step also prints a line when it finishes.
pub struct NonInteractiveUI {
    mode: OutputMode,
    env_overrides: HashMap<String, String>,
    is_ci: bool,
    theme: PrevisTheme,
}

impl NonInteractiveUI {
    pub fn new(mode: OutputMode) -> Self {
        let env_overrides = std::env::vars()
            .filter(|(k, _)| k.starts_with(PROMPT_ENV_PREFIX))
            .collect();

        Self {
            mode,
            env_overrides,
            is_ci: crate::sys::is_ci(),
            theme: PrevisTheme::plain(),
        }
    }

    /// Create with explicit overrides (for testing).
    pub fn with_overrides(mode: OutputMode, overrides: HashMap<String, String>) -> Self {
        Self {
            mode,
            env_overrides: overrides,
            is_ci: false,
            theme: PrevisTheme::plain(),
        }
    }

    fn answer(&self, prompt: &Prompt, value: &str) -> PromptResult {
        match prompt.prompt_type {
            PromptType::Confirm => PromptResult::Bool(parse_bool(value)),
            _ => PromptResult::String(value.to_string()),
        }
    }
}

impl UserInterface for NonInteractiveUI {
    fn output_mode(&self) -> OutputMode {
        self.mode
    }

    fn message(&mut self, msg: &str) {
        if self.mode.shows_status() {
            println!("{}", msg);
        }
    }

    fn success(&mut self, msg: &str) {
        if self.mode.shows_status() {
            println!("{}", self.theme.format_success(msg));
        }
    }

    fn warning(&mut self, msg: &str) {
        if self.mode.shows_status() {
            eprintln!("{}", self.theme.format_warning(msg));
        }
    }

    fn error(&mut self, msg: &str) {
        eprintln!("{}", self.theme.format_error(msg));
    }

    fn prompt(&mut self, prompt: &Prompt) -> Result<PromptResult> {
        let env_key = format!("{}{}", PROMPT_ENV_PREFIX, prompt.key.to_uppercase());
        if let Some(value) = self.env_overrides.get(&env_key) {
            return Ok(self.answer(prompt, value));
        }

        if let Some(default) = &prompt.default {
            return Ok(self.answer(prompt, default));
        }

        Err(PrevisError::ConfigValidationError {
            message: format!(
                "Cannot prompt for '{}' in non-interactive mode (set {} or pass it on the command line)",
                prompt.key, env_key
            ),
        })
    }

    fn start_spinner(&mut self, message: &str) -> Box<dyn SpinnerHandle> {
        if self.mode.shows_spinners() && !self.is_ci {
            println!("  {}", message);
        }
        Box::new(LineSpinner {
            theme: self.theme.clone(),
            enabled: self.mode.shows_spinners(),
        })
    }

    fn show_header(&mut self, title: &str) {
        if self.mode.shows_status() {
            println!("\n{}\n", self.theme.format_header(title));
        }
    }

    fn show_hint(&mut self, hint: &str) {
        if self.mode.shows_status() {
            println!("  {}", hint);
        }
    }

    fn show_halt(&mut self, report: &HaltReport) {
        eprintln!();
        for line in render_halt(&self.theme, report) {
            eprintln!("{}", line);
        }
    }

    fn show_summary(&mut self, summary: &BuildSummary) {
        if self.mode.shows_status() {
            println!();
            for line in render_summary(&self.theme, summary) {
                println!("{}", line);
            }
        }
    }

    fn is_interactive(&self) -> bool {
        false
    }
}

/// Prints one line when the step finishes.
struct LineSpinner {
    theme: PrevisTheme,
    enabled: bool,
}

impl SpinnerHandle for LineSpinner {
    fn set_message(&mut self, _msg: &str) {}

    fn finish_success(&mut self, msg: &str) {
        if self.enabled {
            println!("  {}", self.theme.format_success(msg));
        }
    }

    fn finish_error(&mut self, msg: &str) {
        eprintln!("  {}", self.theme.format_error(msg));
    }

    fn finish_skipped(&mut self, msg: &str) {
        if self.enabled {
            println!("  {}", self.theme.format_skipped(msg));
        }
    }
}
