//! Application state shared across handlers.

use crate::auth::AuthService;
use crate::comments::CommentService;
use crate::config::Config;
use crate::db::Database;
use crate::ebooks::EbookService;
use crate::error::Result;
use crate::moderation::ModerationService;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<Config>,
    /// Database connection.
    pub db: Database,
    /// Authentication service.
    pub auth: Arc<AuthService>,
    /// Moderation word store and validator.
    pub moderation: Arc<ModerationService>,
    /// Comment threads.
    pub comments: Arc<CommentService>,
    /// Ebooks and pages.
    pub ebooks: Arc<EbookService>,
}

impl AppState {
    /// Wire up all services over one database.
    pub fn new(config: Config, db: Database) -> Result<Self> {
        let auth = AuthService::new(
            db.clone(),
            config.auth.session_days,
            config.auth.registration_enabled(),
        );
        let moderation = Arc::new(ModerationService::new(db.clone())?);
        let comments = CommentService::new(
            db.clone(),
            Arc::clone(&moderation),
            config.comments.clone(),
        );
        let ebooks = EbookService::new(db.clone(), Arc::clone(&moderation), config.ebooks.clone());

        tracing::info!(
            words = moderation.active_words().len(),
            "Moderation word list loaded"
        );

        Ok(Self {
            config: Arc::new(config),
            db,
            auth: Arc::new(auth),
            moderation,
            comments: Arc::new(comments),
            ebooks: Arc::new(ebooks),
        })
    }
}
