//! Interactive terminal UI.

use console::Term;
use std::io::Write;

use crate::error::Result;
use crate::pipeline::HaltReport;

use super::{
    prompt_user, render_halt, render_summary, should_use_colors, BuildSummary, NonInteractiveUI,
    OutputMode, PrevisTheme, ProgressSpinner, Prompt, PromptResult, SpinnerHandle, UserInterface,
};

/// Interactive terminal UI implementation.
pub struct TerminalUI {
    term: Term,
    theme: PrevisTheme,
    mode: OutputMode,
}

impl TerminalUI {
    pub fn new(mode: OutputMode, no_color: bool) -> Self {
        let theme = if !no_color && should_use_colors() {
            PrevisTheme::new()
        } else {
            PrevisTheme::plain()
        };

        Self {
            term: Term::stdout(),
            theme,
            mode,
        }
    }

    fn write_lines(&mut self, lines: Vec<String>) {
        for line in lines {
            writeln!(self.term, "{}", line).ok();
        }
    }
}

impl UserInterface for TerminalUI {
    fn output_mode(&self) -> OutputMode {
        self.mode
    }

    fn message(&mut self, msg: &str) {
        if self.mode.shows_status() {
            writeln!(self.term, "{}", msg).ok();
        }
    }

    fn success(&mut self, msg: &str) {
        if self.mode.shows_status() {
            writeln!(self.term, "{}", self.theme.format_success(msg)).ok();
        }
    }

    fn warning(&mut self, msg: &str) {
        if self.mode.shows_status() {
            writeln!(self.term, "{}", self.theme.format_warning(msg)).ok();
        }
    }

    fn error(&mut self, msg: &str) {
        writeln!(self.term, "{}", self.theme.format_error(msg)).ok();
    }

    fn prompt(&mut self, prompt: &Prompt) -> Result<PromptResult> {
        prompt_user(prompt, &self.term)
    }

    fn start_spinner(&mut self, message: &str) -> Box<dyn SpinnerHandle> {
        if self.mode.shows_spinners() {
            Box::new(ProgressSpinner::new(message, self.theme.clone()))
        } else {
            Box::new(ProgressSpinner::hidden())
        }
    }

    fn show_header(&mut self, title: &str) {
        if self.mode.shows_status() {
            writeln!(self.term, "\n{}\n", self.theme.format_header(title)).ok();
        }
    }

    fn show_hint(&mut self, hint: &str) {
        if self.mode.shows_status() {
            writeln!(self.term, "  {}", self.theme.hint.apply_to(hint)).ok();
        }
    }

    fn show_halt(&mut self, report: &HaltReport) {
        let lines = render_halt(&self.theme, report);
        self.write_lines(lines);
    }

    fn show_summary(&mut self, summary: &BuildSummary) {
        if self.mode.shows_status() {
            writeln!(self.term).ok();
            let lines = render_summary(&self.theme, summary);
            self.write_lines(lines);
        }
    }

    fn is_interactive(&self) -> bool {
        self.term.is_term()
    }
}

/// Create the appropriate UI for this run.
///
/// Falls back to [`NonInteractiveUI`] when stdout is not a terminal, even if
/// interactivity was requested.
pub fn create_ui(interactive: bool, mode: OutputMode, no_color: bool) -> Box<dyn UserInterface> {
    if interactive && Term::stdout().is_term() {
        Box::new(TerminalUI::new(mode, no_color))
    } else {
        Box::new(NonInteractiveUI::new(mode))
    }
}
