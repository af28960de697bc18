//! pageturn server entry point.

use clap::Parser;
use pageturn::{
    auth::AuthService,
    config::{Cli, Command, Config, EbookCommand, UserCommand, WordCommand},
    db::{Database, WordFilter},
    ebooks::EbookService,
    moderation::ModerationService,
    server,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How often expired sessions are purged.
const SESSION_CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Find or load config
    let config_path = cli.config.clone().or_else(Config::find_config_file);

    let config = if let Some(ref path) = config_path {
        Config::load(path)?
    } else {
        Config::default()
    };

    // Handle command
    match cli.command {
        Some(Command::Init { force }) => cmd_init(force).await,
        Some(Command::User { action }) => cmd_user(action, &config).await,
        Some(Command::Word { action }) => cmd_word(action, &config).await,
        Some(Command::Ebook { action }) => cmd_ebook(action, &config).await,
        Some(Command::Check { text, comment }) => cmd_check(&text, comment, &config).await,
        Some(Command::Serve { bind }) => cmd_serve(config, bind).await,
        None => {
            // Default: start server
            cmd_serve(config, None).await
        }
    }
}

/// Open the configured database.
fn open_database(config: &Config) -> anyhow::Result<Database> {
    Ok(Database::open(&config.database.path)?)
}

/// Initialize config and database.
async fn cmd_init(force: bool) -> anyhow::Result<()> {
    let config_path = PathBuf::from("config.toml");

    if config_path.exists() && !force {
        anyhow::bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    // Write default config
    std::fs::write(&config_path, Config::generate_default())?;
    println!("Created config file: {}", config_path.display());

    // Initialize database
    let config = Config::default();
    let _db = open_database(&config)?;
    println!("Initialized database: {}", config.database.path.display());

    println!("\nEdit config.toml to configure your server.");
    println!("Then run: pageturn user add <username> --password <password> --role admin");
    println!("And: pageturn word add <word> --severity high --category profanity");

    Ok(())
}

/// User management commands.
async fn cmd_user(action: UserCommand, config: &Config) -> anyhow::Result<()> {
    let db = open_database(config)?;
    let auth = AuthService::new(
        db,
        config.auth.session_days,
        config.auth.registration_enabled(),
    );

    match action {
        UserCommand::Add {
            username,
            password,
            role,
        } => {
            let password = match password {
                Some(p) => p,
                None => prompt_password("Password: ")?,
            };

            let user = auth.create_user(&username, &password, &role)?;
            println!(
                "Created user: {} (role: {}, id: {})",
                user.username, user.role, user.id
            );
        }

        UserCommand::Del { username } => {
            if auth.delete_user(&username)? {
                println!("Deleted user: {}", username);
            } else {
                println!("User not found: {}", username);
            }
        }

        UserCommand::List => {
            let users = auth.list_users()?;
            if users.is_empty() {
                println!("No users found.");
            } else {
                println!("{:<20} {:<10} {:<36} LAST LOGIN", "USERNAME", "ROLE", "ID");
                println!("{}", "-".repeat(80));
                for user in users {
                    let last_login = user
                        .last_login
                        .map(format_timestamp)
                        .unwrap_or_else(|| "never".to_string());
                    println!(
                        "{:<20} {:<10} {:<36} {}",
                        user.username, user.role, user.id, last_login
                    );
                }
            }
        }

        UserCommand::Passwd { username, password } => {
            let password = match password {
                Some(p) => p,
                None => prompt_password("New password: ")?,
            };

            if auth.change_password(&username, &password)? {
                println!("Password changed for: {}", username);
            } else {
                println!("User not found: {}", username);
            }
        }
    }

    Ok(())
}

/// Moderation word commands.
async fn cmd_word(action: WordCommand, config: &Config) -> anyhow::Result<()> {
    let moderation = ModerationService::new(open_database(config)?)?;

    match action {
        WordCommand::Add {
            word,
            severity,
            category,
            language,
        } => {
            let word = moderation.create(
                &word,
                severity.parse()?,
                category.parse()?,
                language.as_deref(),
                None,
            )?;
            println!(
                "Added word: {} (id: {}, severity: {}, category: {})",
                word.word, word.id, word.severity, word.category
            );
        }

        WordCommand::Del { id } => {
            moderation.delete(id, None)?;
            println!("Deactivated word: {}", id);
        }

        WordCommand::List { all } => {
            let words = moderation.list(&WordFilter {
                include_inactive: all,
                ..WordFilter::default()
            })?;
            if words.is_empty() {
                println!("No words found.");
            } else {
                println!(
                    "{:<6} {:<30} {:<10} {:<14} {:<6} ACTIVE",
                    "ID", "WORD", "SEVERITY", "CATEGORY", "LANG"
                );
                println!("{}", "-".repeat(80));
                for word in words {
                    println!(
                        "{:<6} {:<30} {:<10} {:<14} {:<6} {}",
                        word.id,
                        word.word,
                        word.severity,
                        word.category,
                        word.language,
                        if word.is_active { "yes" } else { "no" }
                    );
                }
            }
        }
    }

    Ok(())
}

/// Ebook commands.
async fn cmd_ebook(action: EbookCommand, config: &Config) -> anyhow::Result<()> {
    let db = open_database(config)?;
    let moderation = Arc::new(ModerationService::new(db.clone())?);
    let ebooks = EbookService::new(db.clone(), moderation, config.ebooks.clone());

    match action {
        EbookCommand::Import {
            file,
            owner,
            title,
            description,
        } => {
            let Some(owner) = db.get_user_by_username(&owner)? else {
                anyhow::bail!("User not found: {}", owner);
            };

            let ebook =
                ebooks.import_file(&owner.id, &file, title.as_deref(), description.as_deref())?;
            println!(
                "Imported: {} ({} pages, id: {})",
                ebook.title, ebook.page_count, ebook.id
            );
            if let Some(reason) = ebook.block_reason {
                println!("Blocked: {}", reason);
            }
        }

        EbookCommand::Screen { id } => {
            let report = ebooks.screen(&id)?;
            if report.validation.is_valid {
                println!("Passed: {}", report.ebook.title);
            } else {
                println!(
                    "Blocked: {} (severity: {}, words: {})",
                    report.ebook.title,
                    report.validation.overall_severity,
                    report.validation.matched_words()
                );
            }
        }

        EbookCommand::List => {
            let list = ebooks.list(true)?;
            if list.is_empty() {
                println!("No ebooks found.");
            } else {
                println!("{:<36} {:<30} {:<6} {:<8} CREATED", "ID", "TITLE", "PAGES", "BLOCKED");
                println!("{}", "-".repeat(100));
                for ebook in list {
                    println!(
                        "{:<36} {:<30} {:<6} {:<8} {}",
                        ebook.id,
                        ebook.title,
                        ebook.page_count,
                        if ebook.is_blocked { "yes" } else { "no" },
                        format_timestamp(ebook.created_at)
                    );
                }
            }
        }
    }

    Ok(())
}

/// Check text against the word list.
async fn cmd_check(text: &str, comment: bool, config: &Config) -> anyhow::Result<()> {
    let moderation = ModerationService::new(open_database(config)?)?;

    let result = if comment {
        moderation.validate_comment(text)
    } else {
        moderation.validate_content(text)
    };

    println!("{}", serde_json::to_string_pretty(&result)?);
    if !result.is_valid {
        std::process::exit(1);
    }

    Ok(())
}

/// Start the server.
async fn cmd_serve(mut config: Config, bind: Option<std::net::SocketAddr>) -> anyhow::Result<()> {
    // Override bind address if specified
    if let Some(addr) = bind {
        config.server.bind = addr;
    }

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pageturn=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let db = open_database(&config)?;

    tracing::info!(
        bind = %config.server.bind,
        database = %config.database.path.display(),
        "Starting pageturn server"
    );

    let state = server::AppState::new(config.clone(), db.clone())?;

    // Purge expired sessions in the background
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SESSION_CLEANUP_INTERVAL);

        loop {
            ticker.tick().await;
            match db.cleanup_expired_sessions() {
                Ok(0) => {}
                Ok(removed) => tracing::debug!(removed, "Expired sessions removed"),
                Err(e) => tracing::warn!(error = %e, "Session cleanup failed"),
            }
        }
    });

    let app = server::create_router(state);

    let listener = TcpListener::bind(config.server.bind).await?;
    tracing::info!(address = %config.server.bind, "Server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Format a unix timestamp for terminal output.
fn format_timestamp(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Prompt for password input.
fn prompt_password(prompt: &str) -> anyhow::Result<String> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let mut password = String::new();
    io::stdin().read_line(&mut password)?;

    Ok(password.trim().to_string())
}
