//! Ebook storage, paginated reading and content screening.

use crate::config::EbooksConfig;
use crate::db::{Database, Ebook, EbookPage, now_timestamp};
use crate::error::{AppError, Result};
use crate::formats::{self, paginate};
use crate::moderation::{ModerationService, ValidationResult};
use crate::pagination::PaginationMeta;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

/// A window of ebook pages.
#[derive(Debug, Clone, Serialize)]
pub struct PageWindow {
    /// Ebook ID.
    pub ebook_id: String,
    /// Ebook title.
    pub title: String,
    /// Pages in this window.
    pub pages: Vec<EbookPage>,
    /// Pagination metadata.
    pub pagination: PaginationMeta,
}

/// Result of screening an ebook.
#[derive(Debug, Clone, Serialize)]
pub struct ScreeningReport {
    /// The ebook after screening.
    pub ebook: Ebook,
    /// Validation of its combined text.
    pub validation: ValidationResult,
}

/// Ebook service.
pub struct EbookService {
    db: Database,
    moderation: Arc<ModerationService>,
    config: EbooksConfig,
}

impl EbookService {
    /// Create a new ebook service.
    pub fn new(db: Database, moderation: Arc<ModerationService>, config: EbooksConfig) -> Self {
        Self {
            db,
            moderation,
            config,
        }
    }

    /// Store an ebook whose text is already split into pages.
    pub fn create_from_pages(
        &self,
        uploader_id: &str,
        title: &str,
        description: Option<&str>,
        pages: Vec<String>,
    ) -> Result<Ebook> {
        let title = title.trim();
        if title.is_empty() {
            return Err(AppError::InvalidInput("Title is required".to_string()));
        }

        if pages.iter().all(|p| p.trim().is_empty()) {
            return Err(AppError::InvalidInput("Ebook has no text".to_string()));
        }

        if self.db.get_user_by_id(uploader_id)?.is_none() {
            return Err(AppError::NotFound(format!("User not found: {}", uploader_id)));
        }

        let now = now_timestamp();
        let ebook = Ebook {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.to_string(),
            description: description
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
            uploader_id: uploader_id.to_string(),
            page_count: pages.len() as i64,
            is_blocked: false,
            block_reason: None,
            created_at: now,
            updated_at: now,
        };

        self.db.create_ebook(&ebook, &pages)?;
        tracing::info!(
            ebook_id = %ebook.id,
            title = %ebook.title,
            pages = ebook.page_count,
            "Ebook created"
        );

        if self.config.screen_on_upload {
            return Ok(self.screen(&ebook.id)?.ebook);
        }

        Ok(ebook)
    }

    /// Store an ebook from plain text, paginated by the configured budget.
    pub fn create_from_text(
        &self,
        uploader_id: &str,
        title: &str,
        description: Option<&str>,
        text: &str,
    ) -> Result<Ebook> {
        let pages = paginate(text, self.config.chars_per_page);
        self.create_from_pages(uploader_id, title, description, pages)
    }

    /// Import a PDF or text file.
    ///
    /// The title falls back to the document's own metadata, then the file name.
    pub fn import_file(
        &self,
        uploader_id: &str,
        path: &Path,
        title: Option<&str>,
        description: Option<&str>,
    ) -> Result<Ebook> {
        let handler = formats::get_handler(path)?;
        let doc = handler.extract(path, self.config.chars_per_page)?;

        let file_stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("Untitled")
            .to_string();
        let title = title
            .map(str::to_string)
            .or(doc.title)
            .unwrap_or(file_stem);
        let description = description.map(str::to_string).or(doc.description);

        self.create_from_pages(uploader_id, &title, description.as_deref(), doc.pages)
    }

    /// Get an ebook by ID.
    pub fn get(&self, id: &str) -> Result<Ebook> {
        self.db
            .get_ebook(id)?
            .ok_or_else(|| AppError::NotFound(format!("Ebook not found: {}", id)))
    }

    /// Get an ebook a reader may see. Blocked ebooks are visible to staff only.
    pub fn get_readable(&self, id: &str, is_staff: bool) -> Result<Ebook> {
        let ebook = self.get(id)?;
        if ebook.is_blocked && !is_staff {
            return Err(AppError::NotFound(format!("Ebook not found: {}", id)));
        }
        Ok(ebook)
    }

    /// List ebooks.
    pub fn list(&self, include_blocked: bool) -> Result<Vec<Ebook>> {
        self.db.list_ebooks(include_blocked)
    }

    /// Read a window of pages.
    pub fn read_pages(
        &self,
        id: &str,
        page: Option<i64>,
        page_size: Option<i64>,
        is_staff: bool,
    ) -> Result<PageWindow> {
        let ebook = self.get_readable(id, is_staff)?;
        let pagination = PaginationMeta::new(
            page,
            page_size,
            1,
            self.config.max_page_size,
            ebook.page_count,
        );

        let pages = self
            .db
            .get_pages(&ebook.id, pagination.offset(), pagination.page_size)?;

        Ok(PageWindow {
            ebook_id: ebook.id,
            title: ebook.title,
            pages,
            pagination,
        })
    }

    /// Validate title, description and pages together with the content policy.
    ///
    /// A failing ebook is blocked. A passing one is left as it is.
    pub fn screen(&self, id: &str) -> Result<ScreeningReport> {
        let ebook = self.get(id)?;

        let mut parts = vec![ebook.title.clone()];
        parts.extend(ebook.description.clone());
        parts.extend(self.db.get_page_texts(&ebook.id)?);

        let validation = self.moderation.validate_content(&parts.join("\n"));

        if validation.is_valid {
            tracing::debug!(ebook_id = %ebook.id, "Ebook passed screening");
            return Ok(ScreeningReport { ebook, validation });
        }

        let reason = format!("Prohibited content: {}", validation.matched_words());
        self.db.set_ebook_blocked(&ebook.id, true, Some(&reason))?;
        tracing::warn!(
            ebook_id = %ebook.id,
            severity = %validation.overall_severity,
            words = %validation.matched_words(),
            "Ebook blocked by screening"
        );

        Ok(ScreeningReport {
            ebook: self.get(id)?,
            validation,
        })
    }

    /// Block or unblock an ebook.
    pub fn set_blocked(&self, id: &str, blocked: bool, reason: Option<&str>) -> Result<Ebook> {
        let reason = if blocked { reason } else { None };
        if !self.db.set_ebook_blocked(id, blocked, reason)? {
            return Err(AppError::NotFound(format!("Ebook not found: {}", id)));
        }

        tracing::info!(ebook_id = id, blocked, "Ebook status changed");
        self.get(id)
    }
}
