//! Accounts, password hashing and session tokens.

use crate::db::{Database, Session, User, now_timestamp};
use crate::error::{AppError, Result};
use argon2::{
    Argon2,
    password_hash::{
        PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
        rand_core::{OsRng, RngCore},
    },
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};

/// Accepted user roles.
pub const ROLES: [&str; 3] = ["admin", "moderator", "user"];

const MAX_USERNAME_LENGTH: usize = 64;
const MIN_PASSWORD_LENGTH: usize = 4;
const BAD_CREDENTIALS: &str = "Invalid username or password";

fn check_username(username: &str) -> Result<()> {
    if username.is_empty() || username.chars().count() > MAX_USERNAME_LENGTH {
        return Err(AppError::InvalidInput(format!(
            "Username must be 1-{} characters",
            MAX_USERNAME_LENGTH
        )));
    }

    let allowed = |c: char| c.is_alphanumeric() || matches!(c, '_' | '-');
    if !username.chars().all(allowed) {
        return Err(AppError::InvalidInput(
            "Username may contain letters, digits, '_' and '-' only".to_string(),
        ));
    }

    Ok(())
}

fn check_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AppError::InvalidInput(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

fn check_role(role: &str) -> Result<()> {
    if !ROLES.contains(&role) {
        return Err(AppError::InvalidInput(format!(
            "Role must be one of: {}",
            ROLES.join(", ")
        )));
    }
    Ok(())
}

/// Hash a password with Argon2 and a fresh salt.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
}

/// Check a password against a stored hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(format!("Invalid password hash: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Random 256-bit session token, URL-safe base64.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Account and session service.
pub struct AuthService {
    db: Database,
    session_days: u32,
    registration_enabled: bool,
}

impl AuthService {
    /// Create a new auth service.
    pub fn new(db: Database, session_days: u32, registration_enabled: bool) -> Self {
        Self {
            db,
            session_days,
            registration_enabled,
        }
    }

    /// Self-service sign-up. New accounts get the `user` role.
    pub fn register(&self, username: &str, password: &str) -> Result<User> {
        if !self.registration_enabled {
            return Err(AppError::Forbidden("Registration is disabled".to_string()));
        }

        self.create_user(username, password, "user")
    }

    /// Create an account with any role.
    pub fn create_user(&self, username: &str, password: &str, role: &str) -> Result<User> {
        check_username(username)?;
        check_password(password)?;
        check_role(role)?;

        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.to_string(),
            password_hash: hash_password(password)?,
            display_name: None,
            role: role.to_string(),
            created_at: now_timestamp(),
            last_login: None,
        };

        self.db.create_user(&user)?;
        tracing::info!(username, role, "User created");
        Ok(user)
    }

    /// Check credentials and open a session. Returns the user and its token.
    pub fn login(&self, username: &str, password: &str) -> Result<(User, String)> {
        let user = self
            .db
            .get_user_by_username(username)?
            .ok_or_else(|| AppError::Unauthorized(BAD_CREDENTIALS.to_string()))?;

        if !verify_password(password, &user.password_hash)? {
            return Err(AppError::Unauthorized(BAD_CREDENTIALS.to_string()));
        }

        let token = self.start_session(&user.id)?;
        self.db.update_user_last_login(&user.id)?;

        tracing::info!(username = %user.username, "User logged in");
        Ok((user, token))
    }

    fn start_session(&self, user_id: &str) -> Result<String> {
        let session = Session {
            token: generate_token(),
            user_id: user_id.to_string(),
            expires_at: now_timestamp() + i64::from(self.session_days) * 24 * 60 * 60,
        };

        self.db.create_session(&session)?;
        Ok(session.token)
    }

    /// Resolve a session token to its user. Expired sessions are removed.
    pub fn validate_token(&self, token: &str) -> Result<Option<User>> {
        let Some(session) = self.db.get_session(token)? else {
            return Ok(None);
        };

        if session.expires_at < now_timestamp() {
            self.db.delete_session(token)?;
            return Ok(None);
        }

        self.db.get_user_by_id(&session.user_id)
    }

    /// End a session.
    pub fn logout(&self, token: &str) -> Result<()> {
        self.db.delete_session(token)
    }

    /// Set a new password. Returns false for an unknown user.
    pub fn change_password(&self, username: &str, new_password: &str) -> Result<bool> {
        check_password(new_password)?;
        self.db
            .update_user_password(username, &hash_password(new_password)?)
    }

    /// Delete an account.
    pub fn delete_user(&self, username: &str) -> Result<bool> {
        self.db.delete_user(username)
    }

    /// All accounts.
    pub fn list_users(&self) -> Result<Vec<User>> {
        self.db.list_users()
    }

    /// Whether the user is an admin.
    pub fn is_admin(&self, user: &User) -> bool {
        user.role == "admin"
    }

    /// Whether the user may moderate content (admins and moderators).
    pub fn is_staff(&self, user: &User) -> bool {
        matches!(user.role.as_str(), "admin" | "moderator")
    }

    /// Fail with `Forbidden` unless the user is staff.
    pub fn require_staff(&self, user: &User) -> Result<()> {
        if !self.is_staff(user) {
            return Err(AppError::Forbidden(
                "Moderator or admin role required".to_string(),
            ));
        }
        Ok(())
    }
}
