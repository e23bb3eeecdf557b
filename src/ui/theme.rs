//! Visual theme and styling.

use console::Style;

use crate::pipeline::StepStatus;

/// Terminal styles used across the UI.
#[derive(Debug, Clone)]
pub struct PrevisTheme {
    pub success: Style,
    /// Orange.
    pub warning: Style,
    pub error: Style,
    /// Running elements.
    pub info: Style,
    pub dim: Style,
    pub highlight: Style,
    pub header: Style,
    pub step_number: Style,
    pub duration: Style,
    /// Paths to logs and artifacts.
    pub path: Style,
    pub border: Style,
    pub hint: Style,
    pub key: Style,
}

impl Default for PrevisTheme {
    fn default() -> Self {
        Self::new()
    }
}

impl PrevisTheme {
    pub fn new() -> Self {
        Self {
            success: Style::new().green(),
            warning: Style::new().color256(208),
            error: Style::new().red().bold(),
            info: Style::new().cyan(),
            dim: Style::new().dim(),
            highlight: Style::new().bold(),
            header: Style::new().bold().cyan(),
            step_number: Style::new().dim(),
            duration: Style::new().dim(),
            path: Style::new().dim().italic(),
            border: Style::new().dim(),
            hint: Style::new().cyan().dim(),
            key: Style::new().bold(),
        }
    }

    /// A theme without colors (for non-TTY or --no-color).
    pub fn plain() -> Self {
        Self {
            success: Style::new(),
            warning: Style::new(),
            error: Style::new(),
            info: Style::new(),
            dim: Style::new(),
            highlight: Style::new(),
            header: Style::new(),
            step_number: Style::new(),
            duration: Style::new(),
            path: Style::new(),
            border: Style::new(),
            hint: Style::new(),
            key: Style::new(),
        }
    }

    pub fn format_success(&self, msg: &str) -> String {
        format!("{}", self.success.apply_to(format!("✓ {}", msg)))
    }

    pub fn format_warning(&self, msg: &str) -> String {
        format!("{}", self.warning.apply_to(format!("⚠ {}", msg)))
    }

    pub fn format_error(&self, msg: &str) -> String {
        format!("{}", self.error.apply_to(format!("✗ {}", msg)))
    }

    pub fn format_skipped(&self, msg: &str) -> String {
        format!("{}", self.dim.apply_to(format!("⊘ {}", msg)))
    }

    /// Format a message with the icon and color for a step status.
    pub fn format_status(&self, status: StepStatus, msg: &str) -> String {
        match status {
            StepStatus::Succeeded => self.format_success(msg),
            StepStatus::Failed => self.format_error(msg),
            StepStatus::Skipped => self.format_skipped(msg),
        }
    }

    pub fn format_header(&self, title: &str) -> String {
        format!(
            "{} {}",
            self.header.apply_to("▲"),
            self.highlight.apply_to(title)
        )
    }

    /// `[3/8]` counter.
    pub fn format_position(&self, position: usize, total: usize) -> String {
        self.step_number
            .apply_to(format!("[{}/{}]", position, total))
            .to_string()
    }
}

/// Check if colors should be enabled.
pub fn should_use_colors() -> bool {
    // https://no-color.org/
    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }
    console::Term::stdout().is_term()
}
