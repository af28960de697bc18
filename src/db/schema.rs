use crate::db::*;
use crate::error::{AppError, Result};
use parking_lot::Mutex;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params, params_from_iter};
use std::path::Path;
use std::sync::Arc;

const USER_COLUMNS: &str = "id, username, password_hash, display_name, role, created_at, last_login";
const EBOOK_COLUMNS: &str =
    "id, title, description, uploader_id, page_count, is_blocked, block_reason, created_at, updated_at";
const WORD_COLUMNS: &str = "id, word, severity, category, language, is_active, created_by, updated_by, created_at, updated_at";
const COMMENT_COLUMNS: &str =
    "id, ebook_id, user_id, content, parent_comment_id, is_active, created_at, updated_at";

impl ToSql for Severity {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Severity {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: AppError| FromSqlError::Other(Box::new(e)))
    }
}

impl ToSql for WordCategory {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for WordCategory {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: AppError| FromSqlError::Other(Box::new(e)))
    }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        display_name: row.get(3)?,
        role: row.get(4)?,
        created_at: row.get(5)?,
        last_login: row.get(6)?,
    })
}

fn ebook_from_row(row: &Row<'_>) -> rusqlite::Result<Ebook> {
    Ok(Ebook {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        uploader_id: row.get(3)?,
        page_count: row.get(4)?,
        is_blocked: row.get(5)?,
        block_reason: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn word_from_row(row: &Row<'_>) -> rusqlite::Result<ModerationWord> {
    Ok(ModerationWord {
        id: row.get(0)?,
        word: row.get(1)?,
        severity: row.get(2)?,
        category: row.get(3)?,
        language: row.get(4)?,
        is_active: row.get(5)?,
        created_by: row.get(6)?,
        updated_by: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        ebook_id: row.get(1)?,
        user_id: row.get(2)?,
        content: row.get(3)?,
        parent_comment_id: row.get(4)?,
        is_active: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn fetch_comment(conn: &Connection, id: &str) -> Result<Option<Comment>> {
    conn.query_row(
        &format!("SELECT {} FROM comments WHERE id = ?1", COMMENT_COLUMNS),
        params![id],
        comment_from_row,
    )
    .optional()
    .map_err(|e| AppError::Internal(format!("Failed to get comment: {}", e)))
}

fn fetch_word(conn: &Connection, id: i64) -> Result<Option<ModerationWord>> {
    conn.query_row(
        &format!("SELECT {} FROM moderation_words WHERE id = ?1", WORD_COLUMNS),
        params![id],
        word_from_row,
    )
    .optional()
    .map_err(|e| AppError::Internal(format!("Failed to get moderation word: {}", e)))
}

fn row_exists(tx: &Transaction<'_>, sql: &str, id: &str) -> Result<bool> {
    tx.query_row(sql, params![id], |_| Ok(()))
        .optional()
        .map(|found| found.is_some())
        .map_err(|e| AppError::Internal(format!("Failed to check existence: {}", e)))
}

/// Whether another active row already holds `word`.
fn active_word_taken(conn: &Connection, word: &str, except_id: Option<i64>) -> Result<bool> {
    conn.query_row(
        "SELECT 1 FROM moderation_words
         WHERE word = ?1 AND is_active = 1 AND id != COALESCE(?2, -1)",
        params![word, except_id],
        |_| Ok(()),
    )
    .optional()
    .map(|found| found.is_some())
    .map_err(|e| AppError::Internal(format!("Failed to check moderation word: {}", e)))
}

/// Set `is_active` on a comment and, when it is top-level, on its direct replies.
///
/// Only rows whose flag actually changes are counted.
fn set_thread_active(tx: &Transaction<'_>, id: &str, active: bool) -> Result<usize> {
    let now = now_timestamp();
    let target = tx
        .execute(
            "UPDATE comments SET is_active = ?1, updated_at = ?2 WHERE id = ?3 AND is_active != ?1",
            params![active, now, id],
        )
        .map_err(|e| AppError::Internal(format!("Failed to update comment: {}", e)))?;

    // Replies never have children, so this is a no-op for them.
    let replies = tx
        .execute(
            "UPDATE comments SET is_active = ?1, updated_at = ?2
             WHERE parent_comment_id = ?3 AND is_active != ?1",
            params![active, now, id],
        )
        .map_err(|e| AppError::Internal(format!("Failed to update replies: {}", e)))?;

    Ok(target + replies)
}

/// Database wrapper for thread-safe access.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .map_err(|e| AppError::Internal(format!("Failed to open database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.initialize_schema()?;
        Ok(db)
    }

    /// Open in-memory database (for testing).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::Internal(format!("Failed to open database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.initialize_schema()?;
        Ok(db)
    }

    /// Initialize database schema.
    fn initialize_schema(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            -- Users table
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                username TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                display_name TEXT,
                role TEXT NOT NULL DEFAULT 'user',
                created_at INTEGER NOT NULL,
                last_login INTEGER
            );

            -- Sessions table
            CREATE TABLE IF NOT EXISTS sessions (
                token TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                expires_at INTEGER NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );

            -- Ebooks table
            CREATE TABLE IF NOT EXISTS ebooks (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT,
                uploader_id TEXT NOT NULL,
                page_count INTEGER NOT NULL DEFAULT 0,
                is_blocked INTEGER NOT NULL DEFAULT 0,
                block_reason TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                FOREIGN KEY (uploader_id) REFERENCES users(id)
            );

            -- Ebook page text
            CREATE TABLE IF NOT EXISTS ebook_pages (
                ebook_id TEXT NOT NULL,
                page_number INTEGER NOT NULL,
                content TEXT NOT NULL,
                PRIMARY KEY (ebook_id, page_number),
                FOREIGN KEY (ebook_id) REFERENCES ebooks(id) ON DELETE CASCADE
            );

            -- Banned words
            CREATE TABLE IF NOT EXISTS moderation_words (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                word TEXT NOT NULL,
                severity TEXT NOT NULL,
                category TEXT NOT NULL DEFAULT 'other',
                language TEXT NOT NULL DEFAULT 'en',
                is_active INTEGER NOT NULL DEFAULT 1,
                created_by TEXT,
                updated_by TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            -- Comments (two-level tree via parent_comment_id)
            CREATE TABLE IF NOT EXISTS comments (
                id TEXT PRIMARY KEY,
                ebook_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                content TEXT NOT NULL,
                parent_comment_id TEXT,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                FOREIGN KEY (ebook_id) REFERENCES ebooks(id),
                FOREIGN KEY (user_id) REFERENCES users(id),
                FOREIGN KEY (parent_comment_id) REFERENCES comments(id)
            );

            -- Indexes
            CREATE UNIQUE INDEX IF NOT EXISTS idx_words_active_unique
                ON moderation_words(word) WHERE is_active = 1;
            CREATE INDEX IF NOT EXISTS idx_comments_ebook ON comments(ebook_id, parent_comment_id);
            CREATE INDEX IF NOT EXISTS idx_comments_parent ON comments(parent_comment_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at);
            "#,
        )
        .map_err(|e| AppError::Internal(format!("Failed to initialize schema: {}", e)))?;

        Ok(())
    }

    // ========== USER OPERATIONS ==========

    /// Create a new user.
    pub fn create_user(&self, user: &User) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO users (id, username, password_hash, display_name, role, created_at, last_login)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                user.id,
                user.username,
                user.password_hash,
                user.display_name,
                user.role,
                user.created_at,
                user.last_login,
            ],
        )
        .map_err(|e| {
            if e.to_string().contains("UNIQUE constraint") {
                AppError::Conflict(format!("Username '{}' already exists", user.username))
            } else {
                AppError::Internal(format!("Failed to create user: {}", e))
            }
        })?;
        Ok(())
    }

    /// Get user by username.
    pub fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("SELECT {} FROM users WHERE username = ?1", USER_COLUMNS),
            params![username],
            user_from_row,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get user: {}", e)))
    }

    /// Get user by ID.
    pub fn get_user_by_id(&self, id: &str) -> Result<Option<User>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
            params![id],
            user_from_row,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get user: {}", e)))
    }

    /// List all users.
    pub fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM users ORDER BY username",
                USER_COLUMNS
            ))
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let users = stmt
            .query_map([], user_from_row)
            .map_err(|e| AppError::Internal(format!("Failed to list users: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect users: {}", e)))?;

        Ok(users)
    }

    /// Update user password.
    pub fn update_user_password(&self, username: &str, password_hash: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "UPDATE users SET password_hash = ?1 WHERE username = ?2",
                params![password_hash, username],
            )
            .map_err(|e| AppError::Internal(format!("Failed to update password: {}", e)))?;
        Ok(rows > 0)
    }

    /// Update user last login.
    pub fn update_user_last_login(&self, user_id: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE users SET last_login = ?1 WHERE id = ?2",
            params![now_timestamp(), user_id],
        )
        .map_err(|e| AppError::Internal(format!("Failed to update last login: {}", e)))?;
        Ok(())
    }

    /// Delete user.
    pub fn delete_user(&self, username: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute("DELETE FROM users WHERE username = ?1", params![username])
            .map_err(|e| {
                if e.to_string().contains("FOREIGN KEY constraint") {
                    AppError::Conflict(format!("User '{}' still owns ebooks or comments", username))
                } else {
                    AppError::Internal(format!("Failed to delete user: {}", e))
                }
            })?;
        Ok(rows > 0)
    }

    // ========== SESSION OPERATIONS ==========

    /// Create session.
    pub fn create_session(&self, session: &Session) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO sessions (token, user_id, expires_at) VALUES (?1, ?2, ?3)",
            params![session.token, session.user_id, session.expires_at],
        )
        .map_err(|e| AppError::Internal(format!("Failed to create session: {}", e)))?;
        Ok(())
    }

    /// Get session by token.
    pub fn get_session(&self, token: &str) -> Result<Option<Session>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT token, user_id, expires_at FROM sessions WHERE token = ?1",
            params![token],
            |row| {
                Ok(Session {
                    token: row.get(0)?,
                    user_id: row.get(1)?,
                    expires_at: row.get(2)?,
                })
            },
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get session: {}", e)))
    }

    /// Delete session.
    pub fn delete_session(&self, token: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])
            .map_err(|e| AppError::Internal(format!("Failed to delete session: {}", e)))?;
        Ok(())
    }

    /// Cleanup expired sessions.
    pub fn cleanup_expired_sessions(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "DELETE FROM sessions WHERE expires_at < ?1",
                params![now_timestamp()],
            )
            .map_err(|e| AppError::Internal(format!("Failed to cleanup sessions: {}", e)))?;
        Ok(rows)
    }

    // ========== EBOOK OPERATIONS ==========

    /// Insert an ebook together with its pages.
    pub fn create_ebook(&self, ebook: &Ebook, pages: &[String]) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| AppError::Internal(format!("Failed to begin transaction: {}", e)))?;

        tx.execute(
            &format!(
                "INSERT INTO ebooks ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                EBOOK_COLUMNS
            ),
            params![
                ebook.id,
                ebook.title,
                ebook.description,
                ebook.uploader_id,
                pages.len() as i64,
                ebook.is_blocked,
                ebook.block_reason,
                ebook.created_at,
                ebook.updated_at,
            ],
        )
        .map_err(|e| AppError::Internal(format!("Failed to create ebook: {}", e)))?;

        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO ebook_pages (ebook_id, page_number, content) VALUES (?1, ?2, ?3)",
                )
                .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

            for (index, content) in pages.iter().enumerate() {
                stmt.execute(params![ebook.id, index as i64 + 1, content])
                    .map_err(|e| AppError::Internal(format!("Failed to save page: {}", e)))?;
            }
        }

        tx.commit()
            .map_err(|e| AppError::Internal(format!("Failed to commit ebook: {}", e)))?;
        Ok(())
    }

    /// Get ebook by ID.
    pub fn get_ebook(&self, id: &str) -> Result<Option<Ebook>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("SELECT {} FROM ebooks WHERE id = ?1", EBOOK_COLUMNS),
            params![id],
            ebook_from_row,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get ebook: {}", e)))
    }

    /// List ebooks, newest first.
    pub fn list_ebooks(&self, include_blocked: bool) -> Result<Vec<Ebook>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM ebooks WHERE is_blocked = 0 OR ?1
                 ORDER BY created_at DESC, rowid DESC",
                EBOOK_COLUMNS
            ))
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let ebooks = stmt
            .query_map(params![include_blocked], ebook_from_row)
            .map_err(|e| AppError::Internal(format!("Failed to list ebooks: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect ebooks: {}", e)))?;

        Ok(ebooks)
    }

    /// Block or unblock an ebook.
    pub fn set_ebook_blocked(&self, id: &str, blocked: bool, reason: Option<&str>) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "UPDATE ebooks SET is_blocked = ?1, block_reason = ?2, updated_at = ?3 WHERE id = ?4",
                params![blocked, reason, now_timestamp(), id],
            )
            .map_err(|e| AppError::Internal(format!("Failed to update ebook: {}", e)))?;
        Ok(rows > 0)
    }

    /// Get a window of pages, ordered by page number.
    pub fn get_pages(&self, ebook_id: &str, offset: i64, limit: i64) -> Result<Vec<EbookPage>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT ebook_id, page_number, content FROM ebook_pages
                 WHERE ebook_id = ?1 ORDER BY page_number LIMIT ?2 OFFSET ?3",
            )
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let pages = stmt
            .query_map(params![ebook_id, limit, offset], |row| {
                Ok(EbookPage {
                    ebook_id: row.get(0)?,
                    page_number: row.get(1)?,
                    content: row.get(2)?,
                })
            })
            .map_err(|e| AppError::Internal(format!("Failed to get pages: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect pages: {}", e)))?;

        Ok(pages)
    }

    /// All page texts of an ebook in order.
    pub fn get_page_texts(&self, ebook_id: &str) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT content FROM ebook_pages WHERE ebook_id = ?1 ORDER BY page_number")
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let texts = stmt
            .query_map(params![ebook_id], |row| row.get(0))
            .map_err(|e| AppError::Internal(format!("Failed to get pages: {}", e)))?
            .collect::<std::result::Result<Vec<String>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect pages: {}", e)))?;

        Ok(texts)
    }

    // ========== MODERATION WORD OPERATIONS ==========

    /// Insert a moderation word. Fails with `Conflict` if an active row holds the same word.
    pub fn create_word(&self, new: &NewModerationWord) -> Result<ModerationWord> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| AppError::Internal(format!("Failed to begin transaction: {}", e)))?;

        if active_word_taken(&tx, &new.word, None)? {
            return Err(AppError::Conflict(format!(
                "Moderation word '{}' already exists",
                new.word
            )));
        }

        let now = now_timestamp();
        tx.execute(
            "INSERT INTO moderation_words
             (word, severity, category, language, is_active, created_by, updated_by, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 1, ?5, ?5, ?6, ?6)",
            params![
                new.word,
                new.severity,
                new.category,
                new.language,
                new.created_by,
                now,
            ],
        )
        .map_err(|e| AppError::Internal(format!("Failed to create moderation word: {}", e)))?;

        let id = tx.last_insert_rowid();
        let word = fetch_word(&tx, id)?
            .ok_or_else(|| AppError::Internal("Inserted moderation word vanished".to_string()))?;

        tx.commit()
            .map_err(|e| AppError::Internal(format!("Failed to commit moderation word: {}", e)))?;
        Ok(word)
    }

    /// Get moderation word by ID.
    pub fn get_word(&self, id: i64) -> Result<Option<ModerationWord>> {
        let conn = self.conn.lock();
        fetch_word(&conn, id)
    }

    /// List moderation words matching a filter, alphabetically.
    pub fn list_words(&self, filter: &WordFilter) -> Result<Vec<ModerationWord>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM moderation_words
                 WHERE (is_active = 1 OR ?1)
                   AND (?2 IS NULL OR severity = ?2)
                   AND (?3 IS NULL OR category = ?3)
                 ORDER BY word, id",
                WORD_COLUMNS
            ))
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let words = stmt
            .query_map(
                params![filter.include_inactive, filter.severity, filter.category],
                word_from_row,
            )
            .map_err(|e| AppError::Internal(format!("Failed to list moderation words: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect moderation words: {}", e)))?;

        Ok(words)
    }

    /// Apply a partial update. Returns `None` if the word does not exist.
    pub fn update_word(
        &self,
        id: i64,
        changes: &ModerationWordUpdate,
        updated_by: Option<&str>,
    ) -> Result<Option<ModerationWord>> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| AppError::Internal(format!("Failed to begin transaction: {}", e)))?;

        let Some(current) = fetch_word(&tx, id)? else {
            return Ok(None);
        };

        let word = changes.word.clone().unwrap_or(current.word);
        let is_active = changes.is_active.unwrap_or(current.is_active);

        if is_active && active_word_taken(&tx, &word, Some(id))? {
            return Err(AppError::Conflict(format!(
                "Moderation word '{}' already exists",
                word
            )));
        }

        tx.execute(
            "UPDATE moderation_words
             SET word = ?1, severity = ?2, category = ?3, language = ?4, is_active = ?5,
                 updated_by = ?6, updated_at = ?7
             WHERE id = ?8",
            params![
                word,
                changes.severity.unwrap_or(current.severity),
                changes.category.unwrap_or(current.category),
                changes.language.clone().unwrap_or(current.language),
                is_active,
                updated_by,
                now_timestamp(),
                id,
            ],
        )
        .map_err(|e| AppError::Internal(format!("Failed to update moderation word: {}", e)))?;

        let updated = fetch_word(&tx, id)?;
        tx.commit()
            .map_err(|e| AppError::Internal(format!("Failed to commit moderation word: {}", e)))?;
        Ok(updated)
    }

    /// Soft-delete a moderation word.
    pub fn deactivate_word(&self, id: i64, updated_by: Option<&str>) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "UPDATE moderation_words SET is_active = 0, updated_by = ?1, updated_at = ?2
                 WHERE id = ?3 AND is_active = 1",
                params![updated_by, now_timestamp(), id],
            )
            .map_err(|e| AppError::Internal(format!("Failed to delete moderation word: {}", e)))?;
        Ok(rows > 0)
    }

    /// Count active words grouped by severity and by category.
    pub fn word_counts(&self) -> Result<(Vec<(Severity, i64)>, Vec<(WordCategory, i64)>)> {
        let conn = self.conn.lock();

        let mut stmt = conn
            .prepare(
                "SELECT severity, COUNT(*) FROM moderation_words
                 WHERE is_active = 1 GROUP BY severity",
            )
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;
        let by_severity = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(|e| AppError::Internal(format!("Failed to count words: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect counts: {}", e)))?;

        let mut stmt = conn
            .prepare(
                "SELECT category, COUNT(*) FROM moderation_words
                 WHERE is_active = 1 GROUP BY category",
            )
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;
        let by_category = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(|e| AppError::Internal(format!("Failed to count words: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect counts: {}", e)))?;

        Ok((by_severity, by_category))
    }

    // ========== COMMENT OPERATIONS ==========

    /// Insert a comment after checking its references, all in one transaction.
    ///
    /// A parent must exist, be active, belong to the same ebook and be top-level.
    pub fn create_comment(&self, new: &NewComment) -> Result<Comment> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| AppError::Internal(format!("Failed to begin transaction: {}", e)))?;

        if !row_exists(&tx, "SELECT 1 FROM ebooks WHERE id = ?1", &new.ebook_id)? {
            return Err(AppError::NotFound(format!("Ebook not found: {}", new.ebook_id)));
        }

        if !row_exists(&tx, "SELECT 1 FROM users WHERE id = ?1", &new.user_id)? {
            return Err(AppError::NotFound(format!("User not found: {}", new.user_id)));
        }

        if let Some(parent_id) = &new.parent_comment_id {
            let parent = fetch_comment(&tx, parent_id)?
                .filter(|c| c.is_active)
                .ok_or_else(|| AppError::NotFound(format!("Parent comment not found: {}", parent_id)))?;

            if parent.ebook_id != new.ebook_id {
                return Err(AppError::InvalidInput(
                    "Parent comment belongs to a different ebook".to_string(),
                ));
            }

            if !parent.is_top_level() {
                return Err(AppError::InvalidInput(
                    "Cannot reply to a reply".to_string(),
                ));
            }
        }

        let now = now_timestamp();
        let comment = Comment {
            id: uuid::Uuid::new_v4().to_string(),
            ebook_id: new.ebook_id.clone(),
            user_id: new.user_id.clone(),
            content: new.content.clone(),
            parent_comment_id: new.parent_comment_id.clone(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        tx.execute(
            &format!(
                "INSERT INTO comments ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                COMMENT_COLUMNS
            ),
            params![
                comment.id,
                comment.ebook_id,
                comment.user_id,
                comment.content,
                comment.parent_comment_id,
                comment.is_active,
                comment.created_at,
                comment.updated_at,
            ],
        )
        .map_err(|e| AppError::Internal(format!("Failed to create comment: {}", e)))?;

        tx.commit()
            .map_err(|e| AppError::Internal(format!("Failed to commit comment: {}", e)))?;
        Ok(comment)
    }

    /// Get comment by ID, active or not.
    pub fn get_comment(&self, id: &str) -> Result<Option<Comment>> {
        let conn = self.conn.lock();
        fetch_comment(&conn, id)
    }

    /// Replace the content of an active comment owned by `user_id`.
    pub fn update_comment_content(&self, id: &str, user_id: &str, content: &str) -> Result<Comment> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| AppError::Internal(format!("Failed to begin transaction: {}", e)))?;

        let mut comment = fetch_comment(&tx, id)?
            .filter(|c| c.is_active)
            .ok_or_else(|| AppError::NotFound(format!("Comment not found: {}", id)))?;

        if comment.user_id != user_id {
            return Err(AppError::Forbidden(
                "Only the author can edit this comment".to_string(),
            ));
        }

        comment.content = content.to_string();
        comment.updated_at = now_timestamp();

        tx.execute(
            "UPDATE comments SET content = ?1, updated_at = ?2 WHERE id = ?3",
            params![comment.content, comment.updated_at, id],
        )
        .map_err(|e| AppError::Internal(format!("Failed to update comment: {}", e)))?;

        tx.commit()
            .map_err(|e| AppError::Internal(format!("Failed to commit comment: {}", e)))?;
        Ok(comment)
    }

    /// Soft-delete an active comment owned by `user_id`, cascading to its replies.
    ///
    /// Returns the number of rows deactivated.
    pub fn deactivate_comment(&self, id: &str, user_id: &str) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| AppError::Internal(format!("Failed to begin transaction: {}", e)))?;

        let comment = fetch_comment(&tx, id)?
            .filter(|c| c.is_active)
            .ok_or_else(|| AppError::NotFound(format!("Comment not found: {}", id)))?;

        if comment.user_id != user_id {
            return Err(AppError::Forbidden(
                "Only the author can delete this comment".to_string(),
            ));
        }

        let rows = set_thread_active(&tx, id, false)?;

        tx.commit()
            .map_err(|e| AppError::Internal(format!("Failed to commit comment: {}", e)))?;
        Ok(rows)
    }

    /// Set `is_active` on a set of comments and the direct replies of top-level ones.
    ///
    /// Unknown IDs are skipped. Returns the number of rows whose flag changed.
    pub fn set_comments_active(&self, ids: &[String], active: bool) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| AppError::Internal(format!("Failed to begin transaction: {}", e)))?;

        let mut rows = 0;
        for id in ids {
            rows += set_thread_active(&tx, id, active)?;
        }

        tx.commit()
            .map_err(|e| AppError::Internal(format!("Failed to commit comments: {}", e)))?;
        Ok(rows)
    }

    /// Page of active top-level comments on an ebook.
    pub fn list_top_level_comments(
        &self,
        ebook_id: &str,
        sort: CommentSort,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Comment>> {
        let order = match sort {
            CommentSort::Newest => "created_at DESC, rowid DESC",
            CommentSort::Oldest => "created_at ASC, rowid ASC",
        };

        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM comments
                 WHERE ebook_id = ?1 AND parent_comment_id IS NULL AND is_active = 1
                 ORDER BY {} LIMIT ?2 OFFSET ?3",
                COMMENT_COLUMNS, order
            ))
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let comments = stmt
            .query_map(params![ebook_id, limit, offset], comment_from_row)
            .map_err(|e| AppError::Internal(format!("Failed to list comments: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect comments: {}", e)))?;

        Ok(comments)
    }

    /// Number of active top-level comments on an ebook.
    pub fn count_top_level_comments(&self, ebook_id: &str) -> Result<i64> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT COUNT(*) FROM comments
             WHERE ebook_id = ?1 AND parent_comment_id IS NULL AND is_active = 1",
            params![ebook_id],
            |row| row.get(0),
        )
        .map_err(|e| AppError::Internal(format!("Failed to count comments: {}", e)))
    }

    /// All active replies to the given parents, oldest first.
    pub fn list_replies(&self, parent_ids: &[String]) -> Result<Vec<Comment>> {
        if parent_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; parent_ids.len()].join(", ");
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM comments
                 WHERE is_active = 1 AND parent_comment_id IN ({})
                 ORDER BY created_at ASC, rowid ASC",
                COMMENT_COLUMNS, placeholders
            ))
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let replies = stmt
            .query_map(params_from_iter(parent_ids.iter()), comment_from_row)
            .map_err(|e| AppError::Internal(format!("Failed to list replies: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect replies: {}", e)))?;

        Ok(replies)
    }

    /// Aggregate comment counts.
    pub fn comment_stats(&self) -> Result<CommentStats> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(is_active), 0),
                    COALESCE(SUM(parent_comment_id IS NULL), 0)
             FROM comments",
            [],
            |row| {
                let total: i64 = row.get(0)?;
                let active: i64 = row.get(1)?;
                let top_level: i64 = row.get(2)?;
                Ok(CommentStats {
                    total,
                    active,
                    inactive: total - active,
                    top_level,
                    replies: total - top_level,
                })
            },
        )
        .map_err(|e| AppError::Internal(format!("Failed to get comment stats: {}", e)))
    }
}
