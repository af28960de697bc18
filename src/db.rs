mod schema;

pub use schema::Database;

use crate::error::AppError;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// User account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique user ID.
    pub id: String,
    /// Username for login.
    pub username: String,
    /// Argon2 password hash.
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Display name.
    pub display_name: Option<String>,
    /// User role: "admin", "moderator" or "user".
    pub role: String,
    /// Account creation timestamp.
    pub created_at: i64,
    /// Last login timestamp.
    pub last_login: Option<i64>,
}

/// Authentication session.
#[derive(Debug, Clone)]
pub struct Session {
    /// Session token.
    pub token: String,
    /// User ID.
    pub user_id: String,
    /// Expiration timestamp.
    pub expires_at: i64,
}

/// Ebook record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ebook {
    /// Ebook ID.
    pub id: String,
    /// Title.
    pub title: String,
    /// Description or blurb.
    pub description: Option<String>,
    /// Uploading user.
    pub uploader_id: String,
    /// Number of stored pages.
    pub page_count: i64,
    /// Whether the ebook is hidden from readers.
    pub is_blocked: bool,
    /// Why the ebook was blocked.
    pub block_reason: Option<String>,
    /// Creation timestamp.
    pub created_at: i64,
    /// Last update timestamp.
    pub updated_at: i64,
}

/// One page of ebook text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EbookPage {
    /// Ebook ID.
    pub ebook_id: String,
    /// 1-based page number.
    pub page_number: i64,
    /// Page text.
    pub content: String,
}

/// Severity tier of a moderation word, ordered `low < medium < high < critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Mild language.
    Low,
    /// Tolerated in ebook content, rejected in comments.
    Medium,
    /// Rejected everywhere.
    High,
    /// Rejected everywhere.
    Critical,
}

impl Severity {
    /// All tiers, lowest first.
    pub const ALL: [Severity; 4] = [
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    /// Storage name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Severity::ALL
            .into_iter()
            .find(|sev| sev.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| AppError::InvalidInput(format!("Unknown severity: {}", s)))
    }
}

/// Category of a moderation word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WordCategory {
    /// Profanity.
    Profanity,
    /// Violence.
    Violence,
    /// Hate speech.
    HateSpeech,
    /// Sexual content.
    Sexual,
    /// Spam.
    Spam,
    /// Political content.
    Political,
    /// Religious content.
    Religious,
    /// Anything else.
    Other,
}

impl WordCategory {
    /// All categories.
    pub const ALL: [WordCategory; 8] = [
        WordCategory::Profanity,
        WordCategory::Violence,
        WordCategory::HateSpeech,
        WordCategory::Sexual,
        WordCategory::Spam,
        WordCategory::Political,
        WordCategory::Religious,
        WordCategory::Other,
    ];

    /// Storage name.
    pub fn as_str(&self) -> &'static str {
        match self {
            WordCategory::Profanity => "profanity",
            WordCategory::Violence => "violence",
            WordCategory::HateSpeech => "hate_speech",
            WordCategory::Sexual => "sexual",
            WordCategory::Spam => "spam",
            WordCategory::Political => "political",
            WordCategory::Religious => "religious",
            WordCategory::Other => "other",
        }
    }
}

impl fmt::Display for WordCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for WordCategory {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WordCategory::ALL
            .into_iter()
            .find(|cat| cat.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| AppError::InvalidInput(format!("Unknown category: {}", s)))
    }
}

/// Banned word or phrase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModerationWord {
    /// Word ID.
    pub id: i64,
    /// Normalized (trimmed, lowercase) word or phrase.
    pub word: String,
    /// Severity tier.
    pub severity: Severity,
    /// Category.
    pub category: WordCategory,
    /// Language tag.
    pub language: String,
    /// Whether the word is enforced.
    pub is_active: bool,
    /// Creating user.
    pub created_by: Option<String>,
    /// Last updating user.
    pub updated_by: Option<String>,
    /// Creation timestamp.
    pub created_at: i64,
    /// Last update timestamp.
    pub updated_at: i64,
}

/// Comment on an ebook. Replies point at a top-level comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    /// Comment ID.
    pub id: String,
    /// Ebook commented on.
    pub ebook_id: String,
    /// Author.
    pub user_id: String,
    /// Comment text.
    pub content: String,
    /// Parent comment for replies.
    pub parent_comment_id: Option<String>,
    /// Soft-delete flag.
    pub is_active: bool,
    /// Creation timestamp.
    pub created_at: i64,
    /// Last update timestamp.
    pub updated_at: i64,
}

impl Comment {
    /// Whether this comment has no parent.
    pub fn is_top_level(&self) -> bool {
        self.parent_comment_id.is_none()
    }
}

/// Ordering of top-level comments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentSort {
    /// Most recent first.
    #[default]
    Newest,
    /// Oldest first.
    Oldest,
}

/// Aggregated comment counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentStats {
    /// All rows.
    pub total: i64,
    /// Active rows.
    pub active: i64,
    /// Soft-deleted rows.
    pub inactive: i64,
    /// Rows without a parent.
    pub top_level: i64,
    /// Rows with a parent.
    pub replies: i64,
}

/// Timestamp helper.
pub fn now_timestamp() -> i64 {
    Utc::now().timestamp()
}

/// Fields for a new moderation word.
#[derive(Debug, Clone)]
pub struct NewModerationWord {
    /// Normalized word or phrase.
    pub word: String,
    /// Severity tier.
    pub severity: Severity,
    /// Category.
    pub category: WordCategory,
    /// Language tag.
    pub language: String,
    /// Creating user.
    pub created_by: Option<String>,
}

/// Partial update of a moderation word. `None` keeps the stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModerationWordUpdate {
    /// New word or phrase.
    pub word: Option<String>,
    /// New severity.
    pub severity: Option<Severity>,
    /// New category.
    pub category: Option<WordCategory>,
    /// New language tag.
    pub language: Option<String>,
    /// Re-activate or deactivate.
    pub is_active: Option<bool>,
}

/// Filter for listing moderation words.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WordFilter {
    /// Only this severity.
    pub severity: Option<Severity>,
    /// Only this category.
    pub category: Option<WordCategory>,
    /// Include soft-deleted words.
    #[serde(default)]
    pub include_inactive: bool,
}

/// Fields for a new comment.
#[derive(Debug, Clone)]
pub struct NewComment {
    /// Ebook commented on.
    pub ebook_id: String,
    /// Author.
    pub user_id: String,
    /// Comment text.
    pub content: String,
    /// Parent for replies.
    pub parent_comment_id: Option<String>,
}
