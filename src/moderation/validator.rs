//! Banned-word scan over a text blob.

use crate::db::{ModerationWord, Severity, WordCategory};
use serde::{Deserialize, Serialize};

/// Pass/fail threshold applied to the violations found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationPolicy {
    /// Ebook content: only `high` and `critical` matches fail.
    Content,
    /// Comments: any match fails.
    Comment,
}

impl ValidationPolicy {
    fn rejects(&self, severity: Severity) -> bool {
        match self {
            ValidationPolicy::Content => severity >= Severity::High,
            ValidationPolicy::Comment => true,
        }
    }
}

/// A banned word found in the text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// The matched word.
    pub word: String,
    /// Its severity.
    pub severity: Severity,
    /// Its category.
    pub category: WordCategory,
    /// Character offset of the first match in the lowercased text.
    pub found_at_offset: usize,
}

/// Outcome of a validation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Whether the text passes the policy.
    pub is_valid: bool,
    /// Every word found, in word-list order.
    pub violations: Vec<Violation>,
    /// Worst severity found, `low` when nothing matched.
    pub overall_severity: Severity,
}

impl ValidationResult {
    /// Result for text with no matches.
    pub fn clean() -> Self {
        Self {
            is_valid: true,
            violations: Vec::new(),
            overall_severity: Severity::Low,
        }
    }

    /// Matched words, comma separated.
    pub fn matched_words(&self) -> String {
        self.violations
            .iter()
            .map(|v| v.word.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Scan `text` for every active word and judge the matches with `policy`.
///
/// Matching is a case-insensitive substring search, so "bad" also matches
/// inside "badge".
pub fn validate(text: &str, words: &[ModerationWord], policy: ValidationPolicy) -> ValidationResult {
    if text.is_empty() {
        return ValidationResult::clean();
    }

    let haystack = text.to_lowercase();
    let mut violations = Vec::new();

    for entry in words.iter().filter(|w| w.is_active) {
        let needle = entry.word.trim().to_lowercase();
        if needle.is_empty() {
            continue;
        }

        if let Some(byte_offset) = haystack.find(&needle) {
            violations.push(Violation {
                word: entry.word.clone(),
                severity: entry.severity,
                category: entry.category,
                found_at_offset: haystack[..byte_offset].chars().count(),
            });
        }
    }

    let overall_severity = violations
        .iter()
        .map(|v| v.severity)
        .max()
        .unwrap_or(Severity::Low);

    let is_valid = !violations.iter().any(|v| policy.rejects(v.severity));

    ValidationResult {
        is_valid,
        violations,
        overall_severity,
    }
}
