//! pageturn: an ebook reading community server.
//!
//! Readers page through uploaded ebooks and discuss them in comment
//! threads. A moderation word list screens both ebook content and
//! comments, with a lenient policy for books and a strict one for
//! comments.
//!
//! # Features
//!
//! - User accounts with admin, moderator and user roles
//! - Plain text and PDF ebooks split into pages
//! - Two-level comment threads with cascading soft delete
//! - Moderation word list with severity tiers and categories
//! - Ebook screening that blocks prohibited content

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Authentication and user management.
pub mod auth;
/// Comment threads.
pub mod comments;
/// Configuration and CLI.
pub mod config;
/// Database operations.
pub mod db;
/// Ebooks and paginated reading.
pub mod ebooks;
/// Error types.
pub mod error;
/// Ebook format handlers.
pub mod formats;
/// Moderation words and content validation.
pub mod moderation;
/// Page-based pagination.
pub mod pagination;
/// HTTP server.
pub mod server;

#[cfg(test)]
mod tests;

pub use config::{Cli, Command, Config};
pub use db::Database;
pub use error::{AppError, Result};
pub use server::AppState;
