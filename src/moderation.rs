//! Moderation word store and content validation.

mod validator;

pub use validator::{ValidationPolicy, ValidationResult, Violation, validate};

use crate::db::{
    Database, ModerationWord, ModerationWordUpdate, NewModerationWord, Severity, WordCategory,
    WordFilter,
};
use crate::error::{AppError, Result};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Longest accepted word or phrase.
const MAX_WORD_LENGTH: usize = 100;

/// Normalize a word for storage and matching: trimmed and lowercase.
pub fn normalize_word(word: &str) -> Result<String> {
    let normalized = word.trim().to_lowercase();

    if normalized.is_empty() {
        return Err(AppError::InvalidInput("Word cannot be empty".to_string()));
    }

    if normalized.chars().count() > MAX_WORD_LENGTH {
        return Err(AppError::InvalidInput(format!(
            "Word must be at most {} characters",
            MAX_WORD_LENGTH
        )));
    }

    Ok(normalized)
}

/// Active word counts by severity and category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WordStats {
    /// Total active words.
    pub total: i64,
    /// Count per severity (all tiers present, zero when unused).
    pub by_severity: BTreeMap<String, i64>,
    /// Count per category (only categories in use).
    pub by_category: BTreeMap<String, i64>,
}

/// Moderation word service with an in-memory snapshot of active words.
pub struct ModerationService {
    db: Database,
    active_words: Arc<RwLock<Vec<ModerationWord>>>,
}

impl ModerationService {
    /// Create the service and load the active word list.
    pub fn new(db: Database) -> Result<Self> {
        let service = Self {
            db,
            active_words: Arc::new(RwLock::new(Vec::new())),
        };
        service.reload()?;
        Ok(service)
    }

    /// Replace the snapshot with the current active words from the store.
    pub fn reload(&self) -> Result<()> {
        let words = self.db.list_words(&WordFilter::default())?;
        let count = words.len();
        *self.active_words.write() = words;
        tracing::debug!(words = count, "Loaded moderation words");
        Ok(())
    }

    /// Snapshot of the active words.
    pub fn active_words(&self) -> Vec<ModerationWord> {
        self.active_words.read().clone()
    }

    /// Validate ebook content: only `high` and `critical` matches fail.
    pub fn validate_content(&self, text: &str) -> ValidationResult {
        validate(text, &self.active_words.read(), ValidationPolicy::Content)
    }

    /// Validate a comment: any match fails.
    pub fn validate_comment(&self, text: &str) -> ValidationResult {
        validate(text, &self.active_words.read(), ValidationPolicy::Comment)
    }

    /// List words.
    pub fn list(&self, filter: &WordFilter) -> Result<Vec<ModerationWord>> {
        self.db.list_words(filter)
    }

    /// Get a word by ID.
    pub fn get(&self, id: i64) -> Result<ModerationWord> {
        self.db
            .get_word(id)?
            .ok_or_else(|| AppError::NotFound(format!("Moderation word not found: {}", id)))
    }

    /// Add a word.
    pub fn create(
        &self,
        word: &str,
        severity: Severity,
        category: WordCategory,
        language: Option<&str>,
        created_by: Option<&str>,
    ) -> Result<ModerationWord> {
        let new = NewModerationWord {
            word: normalize_word(word)?,
            severity,
            category,
            language: normalize_language(language),
            created_by: created_by.map(str::to_string),
        };

        let created = self.db.create_word(&new)?;
        self.reload()?;

        tracing::info!(
            id = created.id,
            word = %created.word,
            severity = %created.severity,
            "Moderation word added"
        );
        Ok(created)
    }

    /// Apply a partial update.
    pub fn update(
        &self,
        id: i64,
        mut changes: ModerationWordUpdate,
        updated_by: Option<&str>,
    ) -> Result<ModerationWord> {
        if let Some(word) = &changes.word {
            changes.word = Some(normalize_word(word)?);
        }
        if let Some(language) = &changes.language {
            changes.language = Some(normalize_language(Some(language)));
        }

        let updated = self
            .db
            .update_word(id, &changes, updated_by)?
            .ok_or_else(|| AppError::NotFound(format!("Moderation word not found: {}", id)))?;
        self.reload()?;

        tracing::info!(id, word = %updated.word, "Moderation word updated");
        Ok(updated)
    }

    /// Soft-delete a word.
    pub fn delete(&self, id: i64, deleted_by: Option<&str>) -> Result<()> {
        if !self.db.deactivate_word(id, deleted_by)? {
            return Err(AppError::NotFound(format!(
                "Moderation word not found: {}",
                id
            )));
        }
        self.reload()?;

        tracing::info!(id, "Moderation word removed");
        Ok(())
    }

    /// Active word counts.
    pub fn stats(&self) -> Result<WordStats> {
        let (by_severity, by_category) = self.db.word_counts()?;

        let mut stats = WordStats {
            by_severity: Severity::ALL
                .iter()
                .map(|s| (s.as_str().to_string(), 0))
                .collect(),
            ..WordStats::default()
        };

        for (severity, count) in by_severity {
            stats.total += count;
            stats.by_severity.insert(severity.as_str().to_string(), count);
        }
        for (category, count) in by_category {
            stats.by_category.insert(category.as_str().to_string(), count);
        }

        Ok(stats)
    }
}

fn normalize_language(language: Option<&str>) -> String {
    language
        .map(|l| l.trim().to_lowercase())
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| "en".to_string())
}
