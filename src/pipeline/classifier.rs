//! Log classification.
//!
//! Tool logs are scanned for known markers. Rules are ordered by
//! specificity: failure markers come first, and any failure marker found
//! anywhere in the text wins over any success marker, regardless of where
//! each appears. Text with no marker at all is a failure of unknown kind.
//!
//! Matching is a case-insensitive substring search.

use regex::{Regex, RegexBuilder};
use std::sync::LazyLock;

use crate::error::{PrevisError, Result};

use super::outcome::ErrorKind;

/// What a marker means when found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Succeeded,
    Failed(ErrorKind),
}

impl Verdict {
    pub fn is_failure(&self) -> bool {
        matches!(self, Verdict::Failed(_))
    }
}

/// A single marker and its verdict.
#[derive(Debug, Clone)]
pub struct Rule {
    pattern: String,
    verdict: Verdict,
    regex: Regex,
}

impl Rule {
    /// Compile a rule. The pattern is a literal substring, not a regex.
    pub fn new(pattern: &str, verdict: Verdict) -> Result<Self> {
        if pattern.trim().is_empty() {
            return Err(PrevisError::InvalidRule {
                pattern: pattern.to_string(),
                message: "marker must not be empty".to_string(),
            });
        }
        let regex = RegexBuilder::new(&regex::escape(pattern))
            .case_insensitive(true)
            .build()
            .map_err(|e| PrevisError::InvalidRule {
                pattern: pattern.to_string(),
                message: e.to_string(),
            })?;
        Ok(Self {
            pattern: pattern.to_string(),
            verdict,
            regex,
        })
    }

    pub fn failure(pattern: &str, kind: ErrorKind) -> Result<Self> {
        Self::new(pattern, Verdict::Failed(kind))
    }

    pub fn success(pattern: &str) -> Result<Self> {
        Self::new(pattern, Verdict::Succeeded)
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn verdict(&self) -> Verdict {
        self.verdict
    }

    pub fn matches(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

const BUILTIN_FAILURES: &[(&str, ErrorKind)] = &[
    ("OUT OF HANDLE ARRAY ENTRIES", ErrorKind::ResourceExhaustion),
    ("visibility task did not complete", ErrorKind::IncompleteTask),
    ("Previs generation failed", ErrorKind::IncompleteTask),
    ("Could not complete previs", ErrorKind::IncompleteTask),
    ("FATAL:", ErrorKind::ToolCrash),
    ("Exception", ErrorKind::ToolCrash),
    ("Failed to load", ErrorKind::ToolReportedError),
    ("ERROR:", ErrorKind::ToolReportedError),
    ("Failed:", ErrorKind::ToolReportedError),
    ("Could not", ErrorKind::ToolReportedError),
];

const BUILTIN_SUCCESSES: &[&str] = &["Completed: No Errors.", "Completed: "];

static BUILTIN_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    BUILTIN_FAILURES
        .iter()
        .filter_map(|(pattern, kind)| Rule::failure(pattern, *kind).ok())
        .chain(
            BUILTIN_SUCCESSES
                .iter()
                .filter_map(|pattern| Rule::success(pattern).ok()),
        )
        .collect()
});

/// The verdict for a piece of log text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub verdict: Verdict,
    /// The marker that decided the verdict, if any matched.
    pub marker: Option<String>,
}

impl Classification {
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self.verdict {
            Verdict::Failed(kind) => Some(kind),
            Verdict::Succeeded => None,
        }
    }
}

/// An ordered rule table.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::builtin()
    }
}

impl RuleSet {
    /// The markers the Creation Kit, xEdit and the archivers are known to
    /// write.
    pub fn builtin() -> Self {
        Self {
            rules: BUILTIN_RULES.clone(),
        }
    }

    /// A rule table with exactly these rules.
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Add a rule after the existing rules of the same verdict class.
    pub fn push(&mut self, rule: Rule) {
        let position = if rule.verdict.is_failure() {
            self.rules
                .iter()
                .position(|r| !r.verdict.is_failure())
                .unwrap_or(self.rules.len())
        } else {
            self.rules.len()
        };
        self.rules.insert(position, rule);
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Classify `text`.
    pub fn classify(&self, text: &str) -> Classification {
        let failure = self
            .rules
            .iter()
            .filter(|rule| rule.verdict.is_failure())
            .find(|rule| rule.matches(text));
        if let Some(rule) = failure {
            return Classification {
                verdict: rule.verdict,
                marker: Some(rule.pattern.clone()),
            };
        }

        let success = self
            .rules
            .iter()
            .filter(|rule| !rule.verdict.is_failure())
            .find(|rule| rule.matches(text));
        match success {
            Some(rule) => Classification {
                verdict: Verdict::Succeeded,
                marker: Some(rule.pattern.clone()),
            },
            None => Classification {
                verdict: Verdict::Failed(ErrorKind::Unknown),
                marker: None,
            },
        }
    }
}

/// Classify `text` against `rules`.
pub fn classify(text: &str, rules: &RuleSet) -> Classification {
    rules.classify(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_is_ordered_failures_first() {
        let rules = RuleSet::builtin();
        let first_success = rules
            .rules()
            .iter()
            .position(|r| !r.verdict().is_failure())
            .unwrap();
        assert!(rules.rules()[first_success..]
            .iter()
            .all(|r| !r.verdict().is_failure()));
        assert_eq!(
            rules.rules()[0].verdict(),
            Verdict::Failed(ErrorKind::ResourceExhaustion)
        );
    }

    #[test]
    fn handle_exhaustion_is_resource_exhaustion() {
        let text = "Loading cells...\nOUT OF HANDLE ARRAY ENTRIES\n";
        let result = classify(text, &RuleSet::builtin());
        assert_eq!(
            result.verdict,
            Verdict::Failed(ErrorKind::ResourceExhaustion)
        );
        assert_eq!(result.marker.as_deref(), Some("OUT OF HANDLE ARRAY ENTRIES"));
    }

    #[test]
    fn matching_ignores_case() {
        let result = classify("fatal: heap corrupted", &RuleSet::builtin());
        assert_eq!(result.verdict, Verdict::Failed(ErrorKind::ToolCrash));
    }

    #[test]
    fn success_marker_alone_succeeds() {
        let result = classify("[00:12] Completed: No Errors.", &RuleSet::builtin());
        assert_eq!(result.verdict, Verdict::Succeeded);
        assert_eq!(result.marker.as_deref(), Some("Completed: No Errors."));
    }

    #[test]
    fn failure_before_success_still_fails() {
        let text = "ERROR: missing master\nCompleted: No Errors.";
        let result = classify(text, &RuleSet::builtin());
        assert_eq!(result.verdict, Verdict::Failed(ErrorKind::ToolReportedError));
    }

    #[test]
    fn failure_after_success_still_fails() {
        let text = "Completed: No Errors.\nvisibility task did not complete";
        let result = classify(text, &RuleSet::builtin());
        assert_eq!(result.verdict, Verdict::Failed(ErrorKind::IncompleteTask));
    }

    #[test]
    fn more_specific_failure_wins() {
        // "Could not complete previs" also contains "Could not".
        let result = classify("Could not complete previs for cell 0x1234", &RuleSet::builtin());
        assert_eq!(result.verdict, Verdict::Failed(ErrorKind::IncompleteTask));
    }

    #[test]
    fn empty_text_is_unknown_failure() {
        let result = classify("", &RuleSet::builtin());
        assert_eq!(result.verdict, Verdict::Failed(ErrorKind::Unknown));
        assert!(result.marker.is_none());
    }

    #[test]
    fn unmarked_text_is_unknown_failure() {
        let result = classify("Loading plugin...\nDone.", &RuleSet::builtin());
        assert_eq!(result.error_kind(), Some(ErrorKind::Unknown));
    }

    #[test]
    fn patterns_are_literal() {
        let rules = RuleSet::new(vec![Rule::success("a.b").unwrap()]);
        assert_eq!(rules.classify("axb").verdict, Verdict::Failed(ErrorKind::Unknown));
        assert_eq!(rules.classify("A.B").verdict, Verdict::Succeeded);
    }

    #[test]
    fn pushed_failure_goes_before_success_rules() {
        let mut rules = RuleSet::builtin();
        let before = rules.len();
        rules.push(Rule::failure("Navmesh generation aborted", ErrorKind::IncompleteTask).unwrap());
        assert_eq!(rules.len(), before + 1);
        let pos = rules
            .rules()
            .iter()
            .position(|r| r.pattern() == "Navmesh generation aborted")
            .unwrap();
        assert!(rules.rules()[..pos].iter().all(|r| r.verdict().is_failure()));
    }

    #[test]
    fn pushed_success_marker_is_recognized() {
        let mut rules = RuleSet::builtin();
        rules.push(Rule::success("Previs done").unwrap());
        assert_eq!(rules.classify("previs DONE").verdict, Verdict::Succeeded);
    }

    #[test]
    fn empty_pattern_is_rejected() {
        assert!(matches!(
            Rule::success("  "),
            Err(PrevisError::InvalidRule { .. })
        ));
    }
}
