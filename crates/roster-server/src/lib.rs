//! Roster account service: HTTP surface and operation pipeline.

pub mod api;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod service;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use error::ServiceError;
pub use service::{AccountService, Collaborators, MailIdentity, RequestContext};

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// The account operation pipeline.
    pub service: Arc<AccountService>,
    /// Whether `DELETE /internal/accounts` is mounted.
    pub enable_admin_routes: bool,
}

/// Maximum request body size (64 KiB). Every body here is a small JSON object.
const MAX_REQUEST_BODY_BYTES: usize = 64 * 1024;

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    let router = Router::new()
        .route("/health", get(health))
        .route("/api/accounts", get(api::list_accounts_handler))
        .route("/api/accounts/lookup", get(api::lookup_account_handler))
        .route("/api/accounts/{id}", get(api::get_account_handler))
        .route(
            "/api/accounts/{id}/subscribers",
            get(api::list_subscribers_handler)
                .post(api::subscribe_handler)
                .delete(api::unsubscribe_handler),
        )
        .route(
            "/api/me",
            get(api::get_me_handler).delete(api::delete_me_handler),
        )
        .route("/api/me/username", put(api::change_username_handler))
        .route("/api/me/password", put(api::change_password_handler))
        .route(
            "/api/me/verification-code",
            post(api::issue_code_handler),
        )
        .route(
            "/api/me/password/reset",
            post(api::reset_password_handler),
        );

    let router = if state.enable_admin_routes {
        tracing::warn!("admin routes enabled: DELETE /internal/accounts is reachable");
        router.route("/internal/accounts", delete(api::delete_all_handler))
    } else {
        router
    };

    router
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}
