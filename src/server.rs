//! HTTP server and routes.

mod handlers;
mod state;

pub use state::AppState;

use axum::{
    Router,
    routing::{get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/login", post(handlers::auth_login))
        .route("/register", post(handlers::auth_register))
        .route("/logout", post(handlers::auth_logout))
        .route("/me", get(handlers::auth_me));

    let ebook_routes = Router::new()
        .route("/", get(handlers::ebook_list).post(handlers::ebook_create))
        .route("/{id}", get(handlers::ebook_get))
        .route("/{id}/pages", get(handlers::ebook_pages))
        .route("/{id}/screen", post(handlers::ebook_screen))
        .route("/{id}/status", put(handlers::ebook_set_status))
        .route(
            "/{id}/comments",
            get(handlers::comment_list).post(handlers::comment_create),
        );

    let comment_routes = Router::new().route(
        "/{id}",
        put(handlers::comment_update).delete(handlers::comment_delete),
    );

    let moderation_routes = Router::new()
        .route("/validate", post(handlers::moderation_validate))
        .route(
            "/validate-comment",
            post(handlers::moderation_validate_comment),
        );

    let admin_routes = Router::new()
        .route(
            "/words",
            get(handlers::admin_word_list).post(handlers::admin_word_create),
        )
        .route("/words/stats", get(handlers::admin_word_stats))
        .route(
            "/words/{id}",
            get(handlers::admin_word_get)
                .put(handlers::admin_word_update)
                .delete(handlers::admin_word_delete),
        )
        .route(
            "/comments/bulk-delete",
            post(handlers::admin_comment_bulk_delete),
        )
        .route(
            "/comments/{id}/status",
            put(handlers::admin_comment_set_status),
        )
        .route("/comments/stats", get(handlers::admin_comment_stats))
        .route("/users", get(handlers::admin_user_list));

    Router::new()
        .route("/", get(handlers::index))
        .nest("/api/auth", auth_routes)
        .nest("/api/ebooks", ebook_routes)
        .nest("/api/comments", comment_routes)
        .nest("/api/moderation", moderation_routes)
        .nest("/api/admin", admin_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
