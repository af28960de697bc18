//! Comment threads on ebooks.
//!
//! Comments form a two-level tree: top-level comments and their direct
//! replies. The invariants (parent is top-level, same ebook, cascading soft
//! delete) are checked inside the store's transactions; this layer adds
//! input checks, moderation and pagination.

use crate::config::CommentsConfig;
use crate::db::{Comment, CommentSort, CommentStats, Database, NewComment};
use crate::error::{AppError, Result};
use crate::moderation::ModerationService;
use crate::pagination::PaginationMeta;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// A top-level comment with all of its active replies.
#[derive(Debug, Clone, Serialize)]
pub struct CommentThread {
    /// The top-level comment.
    #[serde(flatten)]
    pub comment: Comment,
    /// Replies, oldest first.
    pub replies: Vec<Comment>,
}

/// One page of comment threads.
#[derive(Debug, Clone, Serialize)]
pub struct CommentPage {
    /// Threads on this page.
    pub comments: Vec<CommentThread>,
    /// Pagination metadata.
    pub pagination: PaginationMeta,
}

/// Comment service.
pub struct CommentService {
    db: Database,
    moderation: Arc<ModerationService>,
    config: CommentsConfig,
}

impl CommentService {
    /// Create a new comment service.
    pub fn new(db: Database, moderation: Arc<ModerationService>, config: CommentsConfig) -> Self {
        Self {
            db,
            moderation,
            config,
        }
    }

    /// Trim and length-check comment text.
    fn clean_content(&self, content: &str) -> Result<String> {
        let content = content.trim();

        if content.is_empty() {
            return Err(AppError::InvalidInput(
                "Comment content is required".to_string(),
            ));
        }

        if content.chars().count() > self.config.max_length {
            return Err(AppError::InvalidInput(format!(
                "Comment must be at most {} characters",
                self.config.max_length
            )));
        }

        Ok(content.to_string())
    }

    /// Post a comment or a reply.
    pub fn create_comment(
        &self,
        user_id: &str,
        ebook_id: &str,
        content: &str,
        parent_comment_id: Option<&str>,
    ) -> Result<Comment> {
        let content = self.clean_content(content)?;

        let validation = self.moderation.validate_comment(&content);
        if !validation.is_valid {
            tracing::info!(
                user_id,
                ebook_id,
                words = %validation.matched_words(),
                "Comment rejected by moderation"
            );
            return Err(AppError::ContentRejected(validation));
        }

        let comment = self.db.create_comment(&NewComment {
            ebook_id: ebook_id.to_string(),
            user_id: user_id.to_string(),
            content,
            parent_comment_id: parent_comment_id.map(str::to_string),
        })?;

        tracing::info!(
            comment_id = %comment.id,
            ebook_id,
            parent = ?comment.parent_comment_id,
            "Comment created"
        );
        Ok(comment)
    }

    /// Edit a comment. Only its author may do so.
    ///
    /// Edits are not screened against the moderation word list.
    pub fn update_comment(&self, comment_id: &str, user_id: &str, content: &str) -> Result<Comment> {
        let content = self.clean_content(content)?;
        let comment = self.db.update_comment_content(comment_id, user_id, &content)?;

        tracing::info!(comment_id, "Comment updated");
        Ok(comment)
    }

    /// Soft-delete a comment and, for a top-level one, its replies.
    ///
    /// Returns the number of comments deactivated.
    pub fn delete_comment(&self, comment_id: &str, user_id: &str) -> Result<usize> {
        let rows = self.db.deactivate_comment(comment_id, user_id)?;

        tracing::info!(comment_id, deactivated = rows, "Comment deleted");
        Ok(rows)
    }

    /// List a page of top-level comments with all their replies attached.
    pub fn list_by_ebook(
        &self,
        ebook_id: &str,
        page: Option<i64>,
        page_size: Option<i64>,
        sort: CommentSort,
    ) -> Result<CommentPage> {
        if self.db.get_ebook(ebook_id)?.is_none() {
            return Err(AppError::NotFound(format!("Ebook not found: {}", ebook_id)));
        }

        let total = self.db.count_top_level_comments(ebook_id)?;
        let pagination = PaginationMeta::new(
            page,
            page_size,
            self.config.default_page_size,
            self.config.max_page_size,
            total,
        );

        let parents = self.db.list_top_level_comments(
            ebook_id,
            sort,
            pagination.page_size,
            pagination.offset(),
        )?;

        let parent_ids: Vec<String> = parents.iter().map(|c| c.id.clone()).collect();
        let mut replies_by_parent: HashMap<String, Vec<Comment>> = HashMap::new();
        for reply in self.db.list_replies(&parent_ids)? {
            if let Some(parent_id) = reply.parent_comment_id.clone() {
                replies_by_parent.entry(parent_id).or_default().push(reply);
            }
        }

        let comments = parents
            .into_iter()
            .map(|comment| CommentThread {
                replies: replies_by_parent.remove(&comment.id).unwrap_or_default(),
                comment,
            })
            .collect();

        Ok(CommentPage {
            comments,
            pagination,
        })
    }

    /// Soft-delete a set of comments regardless of author.
    pub fn bulk_delete(&self, comment_ids: &[String]) -> Result<usize> {
        if comment_ids.is_empty() {
            return Err(AppError::InvalidInput(
                "At least one comment ID is required".to_string(),
            ));
        }

        let rows = self.db.set_comments_active(comment_ids, false)?;

        tracing::info!(
            requested = comment_ids.len(),
            deactivated = rows,
            "Comments bulk deleted"
        );
        Ok(rows)
    }

    /// Set the active flag of a comment; a top-level comment carries its replies along.
    pub fn toggle_status(&self, comment_id: &str, is_active: bool) -> Result<Comment> {
        if self.db.get_comment(comment_id)?.is_none() {
            return Err(AppError::NotFound(format!(
                "Comment not found: {}",
                comment_id
            )));
        }

        let rows = self
            .db
            .set_comments_active(&[comment_id.to_string()], is_active)?;

        tracing::info!(comment_id, is_active, changed = rows, "Comment status changed");

        self.db
            .get_comment(comment_id)?
            .ok_or_else(|| AppError::NotFound(format!("Comment not found: {}", comment_id)))
    }

    /// Aggregate comment counts.
    pub fn stats(&self) -> Result<CommentStats> {
        self.db.comment_stats()
    }
}
