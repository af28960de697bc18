use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Ebook reading community server with comment threads and moderation.
#[derive(Parser, Debug, Clone)]
#[command(name = "pageturn")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file.
    #[arg(short, long, env = "PAGETURN_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the server (default if no command given).
    Serve {
        /// Address to bind the server to.
        #[arg(short, long)]
        bind: Option<SocketAddr>,
    },

    /// User management commands.
    User {
        /// User subcommand action.
        #[command(subcommand)]
        action: UserCommand,
    },

    /// Moderation word commands.
    Word {
        /// Word subcommand action.
        #[command(subcommand)]
        action: WordCommand,
    },

    /// Ebook commands.
    Ebook {
        /// Ebook subcommand action.
        #[command(subcommand)]
        action: EbookCommand,
    },

    /// Check a piece of text against the moderation word list.
    Check {
        /// Text to check.
        text: String,
        /// Apply the comment policy (any match fails).
        #[arg(long)]
        comment: bool,
    },

    /// Initialize database and create default config.
    Init {
        /// Force overwrite existing config.
        #[arg(short, long)]
        force: bool,
    },
}

/// User management subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum UserCommand {
    /// Add a new user.
    Add {
        /// Username.
        username: String,
        /// Password (will prompt if not provided).
        #[arg(short, long)]
        password: Option<String>,
        /// User role (admin, moderator or user).
        #[arg(short, long, default_value = "user")]
        role: String,
    },

    /// Delete a user.
    Del {
        /// Username to delete.
        username: String,
    },

    /// List all users.
    List,

    /// Change user password.
    Passwd {
        /// Username.
        username: String,
        /// New password (will prompt if not provided).
        #[arg(short, long)]
        password: Option<String>,
    },
}

/// Moderation word subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum WordCommand {
    /// Add a banned word or phrase.
    Add {
        /// Word or phrase.
        word: String,
        /// Severity: low, medium, high or critical.
        #[arg(short, long, default_value = "medium")]
        severity: String,
        /// Category, e.g. profanity, spam, hate_speech.
        #[arg(short, long, default_value = "other")]
        category: String,
        /// Language tag.
        #[arg(short, long)]
        language: Option<String>,
    },

    /// Deactivate a word by ID.
    Del {
        /// Word ID.
        id: i64,
    },

    /// List active words.
    List {
        /// Include deactivated words.
        #[arg(long)]
        all: bool,
    },
}

/// Ebook subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum EbookCommand {
    /// Import a PDF or plain text file.
    Import {
        /// Path to the file.
        file: PathBuf,
        /// Username of the uploader.
        #[arg(short, long)]
        owner: String,
        /// Title (defaults to document metadata or file name).
        #[arg(short, long)]
        title: Option<String>,
        /// Description.
        #[arg(short, long)]
        description: Option<String>,
    },

    /// Screen an ebook against the moderation word list.
    Screen {
        /// Ebook ID.
        id: String,
    },

    /// List ebooks.
    List,
}

/// Main configuration from TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Authentication configuration.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Comment configuration.
    #[serde(default)]
    pub comments: CommentsConfig,

    /// Ebook configuration.
    #[serde(default)]
    pub ebooks: EbooksConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to.
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,

    /// Site title.
    #[serde(default = "default_title")]
    pub title: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            title: default_title(),
        }
    }
}

fn default_bind() -> SocketAddr {
    SocketAddr::new(
        std::net::IpAddr::V4(std::net::Ipv4Addr::new(0, 0, 0, 0)),
        8080,
    )
}

fn default_title() -> String {
    "pageturn".to_string()
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data/pageturn.db")
}

/// Authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Registration mode: "open", "disabled".
    #[serde(default = "default_registration")]
    pub registration: String,

    /// Session token duration in days.
    #[serde(default = "default_session_days")]
    pub session_days: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            registration: default_registration(),
            session_days: default_session_days(),
        }
    }
}

fn default_registration() -> String {
    "open".to_string()
}

fn default_session_days() -> u32 {
    30
}

impl AuthConfig {
    /// Check if registration is enabled.
    pub fn registration_enabled(&self) -> bool {
        self.registration == "open"
    }
}

/// Comment configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentsConfig {
    /// Maximum comment length in characters.
    #[serde(default = "default_comment_max_length")]
    pub max_length: usize,

    /// Top-level comments per page when the client does not ask.
    #[serde(default = "default_comment_page_size")]
    pub default_page_size: i64,

    /// Upper bound on requested page size.
    #[serde(default = "default_comment_max_page_size")]
    pub max_page_size: i64,
}

impl Default for CommentsConfig {
    fn default() -> Self {
        Self {
            max_length: default_comment_max_length(),
            default_page_size: default_comment_page_size(),
            max_page_size: default_comment_max_page_size(),
        }
    }
}

fn default_comment_max_length() -> usize {
    2000
}

fn default_comment_page_size() -> i64 {
    10
}

fn default_comment_max_page_size() -> i64 {
    50
}

/// Ebook configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EbooksConfig {
    /// Character budget per page when paginating plain text.
    #[serde(default = "default_chars_per_page")]
    pub chars_per_page: usize,

    /// Upper bound on pages returned per reading request.
    #[serde(default = "default_ebook_max_page_size")]
    pub max_page_size: i64,

    /// Screen new ebooks against the moderation word list.
    #[serde(default = "default_screen_on_upload")]
    pub screen_on_upload: bool,
}

impl Default for EbooksConfig {
    fn default() -> Self {
        Self {
            chars_per_page: default_chars_per_page(),
            max_page_size: default_ebook_max_page_size(),
            screen_on_upload: default_screen_on_upload(),
        }
    }
}

fn default_chars_per_page() -> usize {
    2000
}

fn default_ebook_max_page_size() -> i64 {
    20
}

fn default_screen_on_upload() -> bool {
    true
}

impl Config {
    /// Load configuration from file.
    pub fn load(path: &PathBuf) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::error::AppError::Config(format!("Failed to read config file: {}", e))
        })?;

        toml::from_str(&content).map_err(|e| {
            crate::error::AppError::Config(format!("Failed to parse config file: {}", e))
        })
    }

    /// Find config file in default locations.
    pub fn find_config_file() -> Option<PathBuf> {
        let candidates = [
            PathBuf::from("config.toml"),
            PathBuf::from("pageturn.toml"),
            dirs::config_dir()
                .map(|p| p.join("pageturn").join("config.toml"))
                .unwrap_or_default(),
            PathBuf::from("/etc/pageturn/config.toml"),
        ];

        candidates
            .into_iter()
            .find(|p| !p.as_os_str().is_empty() && p.exists())
    }

    /// Generate default config file content.
    pub fn generate_default() -> String {
        r#"# pageturn configuration

[server]
bind = "0.0.0.0:8080"
title = "pageturn"

[database]
# path = "/var/lib/pageturn/pageturn.db"

[auth]
# Registration mode: "open" or "disabled"
registration = "open"
# Session duration in days
session_days = 30

[comments]
max_length = 2000
default_page_size = 10
max_page_size = 50

[ebooks]
# Character budget per page for plain text uploads
chars_per_page = 2000
max_page_size = 20
# Block ebooks containing high/critical words right after upload
screen_on_upload = true
"#
        .to_string()
    }
}
