//! Settle Web Server
//!
//! Axum-based REST API for statement reconciliation.
//!
//! Identity comes from the upstream access proxy
//! (`cf-access-authenticated-user-email`) and is used as the owner of every
//! read and write; requests without it act as `local-dev`. Every mutation is
//! written to the audit log.

use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use settle_core::db::Database;
use settle_core::{Error as CoreError, ReconcileConfig};

mod handlers;

/// Maximum statement upload size (2 MB of CSV)
pub const MAX_UPLOAD_SIZE: usize = 2 * 1024 * 1024;

/// Maximum pagination limit
pub const MAX_PAGE_LIMIT: i64 = 1000;

/// Cloudflare Access header for authenticated user email
const CF_ACCESS_USER_HEADER: &str = "cf-access-authenticated-user-email";

/// Server configuration
#[derive(Clone, Default)]
pub struct ServerConfig {
    /// Allowed CORS origins (empty = same-origin only)
    pub allowed_origins: Vec<String>,
    /// Tolerances, window and bill patterns used by every trigger
    pub reconcile: ReconcileConfig,
}

/// Body of mutations that return nothing else
#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Shared application state
pub struct AppState {
    pub db: Database,
    pub config: ServerConfig,
}

/// Owner of the request, taken from the access proxy header
pub fn get_user_email(headers: &axum::http::HeaderMap) -> String {
    headers
        .get(CF_ACCESS_USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .unwrap_or_else(|| "local-dev".to_string())
}

/// Create the application router
pub fn create_router(db: Database, config: ServerConfig) -> Router {
    let state = Arc::new(AppState {
        db,
        config: config.clone(),
    });

    let api_routes = Router::new()
        // Transactions (creating a bill runs the bill trigger)
        .route(
            "/transactions",
            get(handlers::list_transactions).post(handlers::create_transaction),
        )
        .route(
            "/transactions/:id",
            get(handlers::get_transaction).delete(handlers::delete_transaction),
        )
        .route(
            "/transactions/:id/archive",
            post(handlers::archive_transaction),
        )
        .route(
            "/transactions/:id/unarchive",
            post(handlers::unarchive_transaction),
        )
        // Statements
        .route("/statements/import", post(handlers::import_statement))
        // Reconciliation
        .route("/reconcile", post(handlers::reconcile_cycle))
        .route("/reconcile/pending", get(handlers::list_pending_cycles))
        .route("/reconcile/:cycle", get(handlers::get_cycle_status))
        // Bills
        .route("/bills/:id/unlink", post(handlers::unlink_bill))
        .route("/bills/:id/details", get(handlers::get_bill_details))
        // Audit
        .route("/audit", get(handlers::list_audit_log));

    let methods = [Method::GET, Method::POST, Method::DELETE, Method::OPTIONS];
    let cors = if config.allowed_origins.is_empty() {
        // Restrictive default: only allow same-origin
        CorsLayer::new()
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE])
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE])
    };

    Router::new()
        .nest("/api", api_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
}

/// Start the server with custom configuration
pub async fn serve_with_config(
    db: Database,
    host: &str,
    port: u16,
    config: ServerConfig,
) -> anyhow::Result<()> {
    if host != "127.0.0.1" && host != "localhost" {
        warn!("⚠️  Binding to {} - identity is trusted from the proxy header, keep it behind one", host);
    }

    info!(
        "Reconciliation: window ±{} days, {} bill pattern(s)",
        config.reconcile.window_days,
        config.reconcile.bill_patterns.len()
    );

    let app = create_router(db, config);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn not_found(msg: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn conflict(msg: &str) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: msg.to_string(),
            internal: None,
        }
    }

    /// Client-facing mapping of core errors; server-side failures stay opaque
    fn from_core(err: &CoreError) -> Option<Self> {
        match err {
            CoreError::NotFound(_) => Some(Self::not_found(&err.to_string())),
            CoreError::Conflict(_) => Some(Self::conflict(&err.to_string())),
            _ if err.is_user_correctable() => Some(Self::bad_request(&err.to_string())),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let err = err.into();
        let core = err.downcast_ref::<CoreError>();
        if let Some(app) = core.and_then(Self::from_core) {
            return app;
        }

        // Return generic message to client
        let message = if core.is_some_and(CoreError::is_storage) {
            "Storage unavailable, please retry"
        } else {
            "An internal error occurred"
        };
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.to_string(),
            // Keep full error for logging
            internal: Some(err),
        }
    }
}
