//! HTTP request handlers.

use crate::comments::CommentPage;
use crate::db::{
    self, Comment, CommentSort, CommentStats, Ebook, ModerationWord, ModerationWordUpdate,
    Severity, WordCategory, WordFilter,
};
use crate::ebooks::{PageWindow, ScreeningReport};
use crate::error::{AppError, Result};
use crate::moderation::{ValidationResult, WordStats};
use crate::server::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::Html,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// WEB PAGES
// ============================================================================

/// Index page (simple HTML).
pub async fn index(State(state): State<AppState>) -> Result<Html<String>> {
    let ebook_count = state.ebooks.list(false)?.len();
    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{title}</title>
    <style>
        body {{ font-family: system-ui, sans-serif; max-width: 600px; margin: 2rem auto; padding: 0 1rem; }}
        h1 {{ color: #333; }}
        .stats {{ background: #f5f5f5; padding: 1rem; border-radius: 8px; margin: 1rem 0; }}
        code {{ background: #e8e8e8; padding: 0.2rem 0.4rem; border-radius: 4px; }}
    </style>
</head>
<body>
    <h1>{title}</h1>
    <div class="stats">
        <p><strong>{ebook_count}</strong> ebooks available</p>
    </div>
    <h2>API</h2>
    <ul>
        <li><code>GET /api/ebooks</code></li>
        <li><code>GET /api/ebooks/{{id}}/pages</code></li>
        <li><code>GET /api/ebooks/{{id}}/comments</code></li>
        <li><code>POST /api/moderation/validate</code></li>
    </ul>
</body>
</html>"#,
        title = state.config.server.title,
        ebook_count = ebook_count,
    );

    Ok(Html(html))
}

// ============================================================================
// AUTH API
// ============================================================================

/// Login request.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    username: String,
    password: String,
}

/// Login response.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    token: String,
    user_id: String,
    username: String,
    role: String,
}

/// Auth login.
pub async fn auth_login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let (user, token) = state.auth.login(&req.username, &req.password)?;

    Ok(Json(LoginResponse {
        token,
        user_id: user.id,
        username: user.username,
        role: user.role,
    }))
}

/// Auth register.
pub async fn auth_register(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<(StatusCode, Json<LoginResponse>)> {
    state.auth.register(&req.username, &req.password)?;
    let (user, token) = state.auth.login(&req.username, &req.password)?;

    Ok((
        StatusCode::CREATED,
        Json(LoginResponse {
            token,
            user_id: user.id,
            username: user.username,
            role: user.role,
        }),
    ))
}

/// Auth logout.
pub async fn auth_logout(State(state): State<AppState>, headers: HeaderMap) -> Result<StatusCode> {
    if let Some(token) = extract_token(&headers) {
        state.auth.logout(&token)?;
    }
    Ok(StatusCode::OK)
}

/// Get current user info.
pub async fn auth_me(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<db::User>> {
    let user = get_authenticated_user(&state, &headers)?;
    Ok(Json(user))
}

// ============================================================================
// EBOOK API
// ============================================================================

/// Ebook upload request.
#[derive(Debug, Deserialize)]
pub struct EbookCreateRequest {
    title: String,
    description: Option<String>,
    text: String,
}

/// Page window query.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    page: Option<i64>,
    page_size: Option<i64>,
}

/// Ebook status update.
#[derive(Debug, Deserialize)]
pub struct EbookStatusRequest {
    is_blocked: bool,
    reason: Option<String>,
}

/// List ebooks. Staff also see blocked ones.
pub async fn ebook_list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Ebook>>> {
    let is_staff = is_staff_caller(&state, &headers)?;
    Ok(Json(state.ebooks.list(is_staff)?))
}

/// Upload an ebook as plain text.
pub async fn ebook_create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<EbookCreateRequest>,
) -> Result<(StatusCode, Json<Ebook>)> {
    let user = get_authenticated_user(&state, &headers)?;
    let ebook = state.ebooks.create_from_text(
        &user.id,
        &req.title,
        req.description.as_deref(),
        &req.text,
    )?;

    Ok((StatusCode::CREATED, Json(ebook)))
}

/// Ebook metadata.
pub async fn ebook_get(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Ebook>> {
    let is_staff = is_staff_caller(&state, &headers)?;
    Ok(Json(state.ebooks.get_readable(&id, is_staff)?))
}

/// Read a window of pages.
pub async fn ebook_pages(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<PageWindow>> {
    let is_staff = is_staff_caller(&state, &headers)?;
    let window = state
        .ebooks
        .read_pages(&id, query.page, query.page_size, is_staff)?;
    Ok(Json(window))
}

/// Screen an ebook against the word list (staff).
pub async fn ebook_screen(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<ScreeningReport>> {
    require_staff(&state, &headers)?;
    Ok(Json(state.ebooks.screen(&id)?))
}

/// Block or unblock an ebook (staff).
pub async fn ebook_set_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<EbookStatusRequest>,
) -> Result<Json<Ebook>> {
    require_staff(&state, &headers)?;
    let ebook = state
        .ebooks
        .set_blocked(&id, req.is_blocked, req.reason.as_deref())?;
    Ok(Json(ebook))
}

// ============================================================================
// COMMENT API
// ============================================================================

/// Comment listing query.
#[derive(Debug, Default, Deserialize)]
pub struct CommentQuery {
    page: Option<i64>,
    page_size: Option<i64>,
    #[serde(default)]
    sort: CommentSort,
}

/// New comment or reply.
#[derive(Debug, Deserialize)]
pub struct CommentCreateRequest {
    content: String,
    parent_comment_id: Option<String>,
}

/// Comment edit.
#[derive(Debug, Deserialize)]
pub struct CommentUpdateRequest {
    content: String,
}

/// Number of comments affected by a delete.
#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    deleted: usize,
}

/// List comment threads on an ebook.
pub async fn comment_list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(ebook_id): Path<String>,
    Query(query): Query<CommentQuery>,
) -> Result<Json<CommentPage>> {
    let is_staff = is_staff_caller(&state, &headers)?;
    state.ebooks.get_readable(&ebook_id, is_staff)?;

    let page = state
        .comments
        .list_by_ebook(&ebook_id, query.page, query.page_size, query.sort)?;
    Ok(Json(page))
}

/// Post a comment or reply.
pub async fn comment_create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(ebook_id): Path<String>,
    Json(req): Json<CommentCreateRequest>,
) -> Result<(StatusCode, Json<Comment>)> {
    let user = get_authenticated_user(&state, &headers)?;
    state.ebooks.get_readable(&ebook_id, state.auth.is_staff(&user))?;

    let comment = state.comments.create_comment(
        &user.id,
        &ebook_id,
        &req.content,
        req.parent_comment_id.as_deref(),
    )?;

    Ok((StatusCode::CREATED, Json(comment)))
}

/// Edit own comment.
pub async fn comment_update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<CommentUpdateRequest>,
) -> Result<Json<Comment>> {
    let user = get_authenticated_user(&state, &headers)?;
    let comment = state.comments.update_comment(&id, &user.id, &req.content)?;
    Ok(Json(comment))
}

/// Delete own comment and its replies.
pub async fn comment_delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>> {
    let user = get_authenticated_user(&state, &headers)?;
    let deleted = state.comments.delete_comment(&id, &user.id)?;
    Ok(Json(DeleteResponse { deleted }))
}

// ============================================================================
// MODERATION API
// ============================================================================

/// Text to validate. Anything other than a JSON string is treated as empty.
#[derive(Debug, Default, Deserialize)]
pub struct ValidateRequest {
    #[serde(default)]
    text: Option<Value>,
}

impl ValidateRequest {
    fn text(&self) -> &str {
        match &self.text {
            Some(Value::String(text)) => text,
            _ => "",
        }
    }
}

/// Validate ebook-style content.
pub async fn moderation_validate(
    State(state): State<AppState>,
    Json(req): Json<ValidateRequest>,
) -> Json<ValidationResult> {
    Json(state.moderation.validate_content(req.text()))
}

/// Validate a comment.
pub async fn moderation_validate_comment(
    State(state): State<AppState>,
    Json(req): Json<ValidateRequest>,
) -> Json<ValidationResult> {
    Json(state.moderation.validate_comment(req.text()))
}

// ============================================================================
// ADMIN API
// ============================================================================

/// New moderation word.
#[derive(Debug, Deserialize)]
pub struct WordCreateRequest {
    word: String,
    #[serde(default = "default_severity")]
    severity: Severity,
    #[serde(default = "default_category")]
    category: WordCategory,
    language: Option<String>,
}

fn default_severity() -> Severity {
    Severity::Medium
}

fn default_category() -> WordCategory {
    WordCategory::Other
}

/// Bulk delete request.
#[derive(Debug, Deserialize)]
pub struct BulkDeleteRequest {
    comment_ids: Vec<String>,
}

/// Comment status update.
#[derive(Debug, Deserialize)]
pub struct CommentStatusRequest {
    is_active: bool,
}

/// List moderation words.
pub async fn admin_word_list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(filter): Query<WordFilter>,
) -> Result<Json<Vec<ModerationWord>>> {
    require_staff(&state, &headers)?;
    Ok(Json(state.moderation.list(&filter)?))
}

/// Add a moderation word.
pub async fn admin_word_create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<WordCreateRequest>,
) -> Result<(StatusCode, Json<ModerationWord>)> {
    let user = require_staff(&state, &headers)?;
    let word = state.moderation.create(
        &req.word,
        req.severity,
        req.category,
        req.language.as_deref(),
        Some(&user.id),
    )?;

    Ok((StatusCode::CREATED, Json(word)))
}

/// Moderation word counts.
pub async fn admin_word_stats(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<WordStats>> {
    require_staff(&state, &headers)?;
    Ok(Json(state.moderation.stats()?))
}

/// Get a moderation word.
pub async fn admin_word_get(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<ModerationWord>> {
    require_staff(&state, &headers)?;
    Ok(Json(state.moderation.get(id)?))
}

/// Update a moderation word.
pub async fn admin_word_update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(changes): Json<ModerationWordUpdate>,
) -> Result<Json<ModerationWord>> {
    let user = require_staff(&state, &headers)?;
    Ok(Json(state.moderation.update(id, changes, Some(&user.id))?))
}

/// Deactivate a moderation word.
pub async fn admin_word_delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    let user = require_staff(&state, &headers)?;
    state.moderation.delete(id, Some(&user.id))?;
    Ok(StatusCode::NO_CONTENT)
}

/// Soft-delete many comments.
pub async fn admin_comment_bulk_delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<BulkDeleteRequest>,
) -> Result<Json<DeleteResponse>> {
    require_staff(&state, &headers)?;
    let deleted = state.comments.bulk_delete(&req.comment_ids)?;
    Ok(Json(DeleteResponse { deleted }))
}

/// Hide or restore a comment.
pub async fn admin_comment_set_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<CommentStatusRequest>,
) -> Result<Json<Comment>> {
    require_staff(&state, &headers)?;
    Ok(Json(state.comments.toggle_status(&id, req.is_active)?))
}

/// Comment counts.
pub async fn admin_comment_stats(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<CommentStats>> {
    require_staff(&state, &headers)?;
    Ok(Json(state.comments.stats()?))
}

/// List users (admin only).
pub async fn admin_user_list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<db::User>>> {
    let user = get_authenticated_user(&state, &headers)?;
    if !state.auth.is_admin(&user) {
        return Err(AppError::Forbidden("Admin role required".to_string()));
    }
    Ok(Json(state.auth.list_users()?))
}

// ============================================================================
// HELPERS
// ============================================================================

/// Extract bearer token from headers.
fn extract_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|s| s.to_string())
}

/// Get authenticated user from token.
fn get_authenticated_user(state: &AppState, headers: &HeaderMap) -> Result<db::User> {
    let token = extract_token(headers)
        .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".to_string()))?;

    state
        .auth
        .validate_token(&token)?
        .ok_or_else(|| AppError::Unauthorized("Invalid or expired token".to_string()))
}

/// Authenticated staff user, or an error.
fn require_staff(state: &AppState, headers: &HeaderMap) -> Result<db::User> {
    let user = get_authenticated_user(state, headers)?;
    state.auth.require_staff(&user)?;
    Ok(user)
}

/// Whether the caller, if any, is staff. Anonymous callers are not.
fn is_staff_caller(state: &AppState, headers: &HeaderMap) -> Result<bool> {
    let Some(token) = extract_token(headers) else {
        return Ok(false);
    };

    Ok(state
        .auth
        .validate_token(&token)?
        .is_some_and(|user| state.auth.is_staff(&user)))
}
