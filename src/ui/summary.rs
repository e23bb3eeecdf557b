//! End-of-run summary and halt report rendering.

use std::time::Duration;

use crate::pipeline::{BuildMode, BuildState, HaltReport, RunPhase, Step, StepStatus};

use super::progress::format_duration;
use super::theme::PrevisTheme;

/// One line of the summary box.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub step: Step,
    pub status: StepStatus,
    pub detail: String,
}

/// What a build did, for the closing summary.
#[derive(Debug, Clone)]
pub struct BuildSummary {
    pub plugin: String,
    pub mode: BuildMode,
    pub rows: Vec<SummaryRow>,
    pub elapsed: Duration,
    pub completed: bool,
}

impl BuildSummary {
    pub fn from_state(state: &BuildState, elapsed: Duration) -> Self {
        Self {
            plugin: state.plugin.clone(),
            mode: state.mode,
            rows: state
                .history
                .iter()
                .map(|o| SummaryRow {
                    step: o.step,
                    status: o.status,
                    detail: o.detail.clone(),
                })
                .collect(),
            elapsed,
            completed: matches!(state.phase, RunPhase::Completed),
        }
    }

    pub fn count(&self, status: StepStatus) -> usize {
        self.rows.iter().filter(|r| r.status == status).count()
    }
}

/// Lines of the boxed summary.
pub fn render_summary(theme: &PrevisTheme, summary: &BuildSummary) -> Vec<String> {
    let b = &theme.border;
    let mut lines = vec![format!(
        "  {} {}",
        b.apply_to("┌─"),
        b.apply_to(format!("{} ({}) ──────────", summary.plugin, summary.mode))
    )];

    for row in &summary.rows {
        lines.push(format!(
            "  {} {:<24} {}",
            b.apply_to("│"),
            theme.format_status(row.status, row.step.title()),
            theme.dim.apply_to(&row.detail),
        ));
    }

    lines.push(format!(
        "  {}",
        b.apply_to("├────────────────────────────────────")
    ));
    lines.push(format!(
        "  {} Total: {} {} {} succeeded {} {} skipped {} {} failed",
        b.apply_to("│"),
        theme.duration.apply_to(format_duration(summary.elapsed)),
        theme.dim.apply_to("·"),
        summary.count(StepStatus::Succeeded),
        theme.dim.apply_to("·"),
        summary.count(StepStatus::Skipped),
        theme.dim.apply_to("·"),
        summary.count(StepStatus::Failed),
    ));
    lines.push(format!(
        "  {}",
        b.apply_to("└────────────────────────────────────")
    ));
    lines
}

/// Lines describing why the build stopped and where to look.
pub fn render_halt(theme: &PrevisTheme, report: &HaltReport) -> Vec<String> {
    let b = &theme.border;
    let mut lines = vec![
        format!(
            "    {} {}",
            b.apply_to("┌─"),
            b.apply_to(format!("{} ──────────", report.step.title()))
        ),
        format!(
            "    {} {} {}",
            b.apply_to("│"),
            theme.key.apply_to("Error:"),
            theme.error.apply_to(report.kind.as_str())
        ),
    ];
    for detail in report.detail.lines().filter(|l| !l.trim().is_empty()) {
        lines.push(format!("    {} {}", b.apply_to("│"), detail));
    }
    if !report.log_paths.is_empty() {
        lines.push(format!(
            "    {} {}",
            b.apply_to("├─"),
            b.apply_to("Logs ─────────────────────────────")
        ));
        for path in &report.log_paths {
            lines.push(format!(
                "    {} {}",
                b.apply_to("│"),
                theme.path.apply_to(path.display())
            ));
        }
    }
    lines.push(format!(
        "    {}",
        b.apply_to("└────────────────────────────────────")
    ));
    if let Some(hint) = report.kind.hint() {
        lines.push(String::new());
        lines.push(format!(
            "    {} {}",
            theme.hint.apply_to("Hint:"),
            theme.hint.apply_to(hint)
        ));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{ArchiveTool, ErrorKind, StepOutcome};
    use std::path::PathBuf;

    fn state() -> BuildState {
        let mut state = BuildState::new(
            "MyMod.esp",
            BuildMode::Clean,
            PathBuf::from("/work"),
            ArchiveTool::Archive2,
        );
        state
            .record(StepOutcome::succeeded(Step::GeneratePrecombined, "12 .nif files"))
            .unwrap();
        state
            .record(StepOutcome::failed(
                Step::MergeCombinedObjects,
                ErrorKind::ToolReportedError,
                "xEdit reported an error",
            ))
            .unwrap();
        state
    }

    #[test]
    fn summary_counts_statuses() {
        let summary = BuildSummary::from_state(&state(), Duration::from_secs(90));
        assert_eq!(summary.rows.len(), 2);
        assert_eq!(summary.count(StepStatus::Succeeded), 1);
        assert_eq!(summary.count(StepStatus::Failed), 1);
        assert!(!summary.completed);
    }

    #[test]
    fn summary_lists_each_step() {
        let summary = BuildSummary::from_state(&state(), Duration::from_secs(90));
        let text = render_summary(&PrevisTheme::plain(), &summary).join("\n");
        assert!(text.contains("✓ Generate Precombined"));
        assert!(text.contains("✗ Merge Combined Objects"));
        assert!(text.contains("1m 30s"));
    }

    #[test]
    fn halt_block_shows_kind_logs_and_hint() {
        let report = HaltReport {
            step: Step::GeneratePrevis,
            kind: ErrorKind::ResourceExhaustion,
            detail: "OUT OF HANDLE ARRAY ENTRIES".to_string(),
            log_paths: vec![PathBuf::from("/fo4/Logs/CreationKit.log")],
        };
        let text = render_halt(&PrevisTheme::plain(), &report).join("\n");
        assert!(text.contains("Generate Previs"));
        assert!(text.contains(ErrorKind::ResourceExhaustion.as_str()));
        assert!(text.contains("/fo4/Logs/CreationKit.log"));
        if let Some(hint) = ErrorKind::ResourceExhaustion.hint() {
            assert!(text.contains(hint));
        }
    }
}
