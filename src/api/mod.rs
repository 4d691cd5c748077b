//! HTTP layer - axum routes over the core operations.
//!
//! Parent-facing registration routes are public. Staff routes need a bearer
//! session from `/api/auth/verify`; admin routes additionally need the admin
//! role claim on that session.

/// Admin dashboard, export and assignment routes
pub mod admin;
/// One-time-code sign-in routes
pub mod auth;
/// `IntoResponse` for the crate error type
pub mod error;
/// Parent-facing registration routes
pub mod registration;
/// Signed-in teacher routes
pub mod teacher;

use crate::{
    config::Config,
    core::{
        auth::{OtpDispatcher, Principal, resolve_session},
        registration::RegistrationFlow,
    },
    errors::{Error, Result},
};
use axum::{
    Json, Router,
    http::{
        HeaderMap, HeaderValue, Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::{get, post, put},
};
use sea_orm::DatabaseConnection;
use serde_json::{Value, json};
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::{net::TcpListener, signal, sync::RwLock};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Drafts untouched for this long are dropped.
pub const DRAFT_TTL: Duration = Duration::from_secs(60 * 60);

/// A registration flow held between requests.
#[derive(Debug)]
pub struct Draft {
    /// Workflow state
    pub flow: RegistrationFlow,
    /// Last time the draft was read or written
    pub touched_at: Instant,
}

/// In-progress registrations keyed by draft id.
pub type DraftStore = Arc<RwLock<HashMap<Uuid, Draft>>>;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Connection shared by all handlers
    pub db: Arc<DatabaseConnection>,
    /// Loaded configuration with environment overrides applied
    pub config: Arc<Config>,
    /// In-progress registrations
    pub drafts: DraftStore,
    /// Delivers sign-in codes
    pub otp: Arc<dyn OtpDispatcher>,
}

impl AppState {
    /// Wraps the connection and config for sharing between handlers.
    #[must_use]
    pub fn new(db: DatabaseConnection, config: Config, otp: Arc<dyn OtpDispatcher>) -> Self {
        Self {
            db: Arc::new(db),
            config: Arc::new(config),
            drafts: Arc::new(RwLock::new(HashMap::new())),
            otp,
        }
    }

    /// Resolves the bearer token in `Authorization` to a principal.
    pub async fn principal(&self, headers: &HeaderMap) -> Result<Principal> {
        let token = headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(Error::Unauthorized)?;

        resolve_session(&self.db, token).await
    }

    /// Like [`Self::principal`], but also requires the admin claim.
    pub async fn admin(&self, headers: &HeaderMap) -> Result<Principal> {
        let principal = self.principal(headers).await?;
        principal.require_admin()?;
        Ok(principal)
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// CORS for the configured origins, or any origin when none are listed.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins.iter().filter_map(|origin| {
            HeaderValue::from_str(origin)
                .inspect_err(|e| warn!("Ignoring invalid CORS origin {origin:?}: {e}"))
                .ok()
        }))
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60))
}

/// Builds the full router with tracing and CORS layers.
pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.http.cors_origins);

    Router::new()
        .route("/health", get(health))
        .route(
            "/api/registrations/returning/search",
            post(registration::search_returning),
        )
        .route("/api/registrations/drafts", post(registration::submit_draft))
        .route(
            "/api/registrations/drafts/:id/back",
            post(registration::back_to_form),
        )
        .route(
            "/api/registrations/drafts/:id/payment",
            post(registration::choose_payment),
        )
        .route("/api/auth/otp", post(auth::request_otp))
        .route("/api/auth/verify", post(auth::verify_otp))
        .route("/api/teacher/dashboard", get(teacher::dashboard))
        .route("/api/admin/classes", get(admin::classes))
        .route("/api/admin/sections/:id/children", get(admin::section_children))
        .route("/api/admin/search", get(admin::search))
        .route(
            "/api/admin/children/:id/sections",
            get(admin::child_sections),
        )
        .route("/api/admin/children/:id/section", put(admin::move_child))
        .route("/api/admin/registrations/daily", get(admin::daily_counts))
        .route("/api/admin/registrations/export", get(admin::export))
        .route(
            "/api/admin/assignments",
            get(admin::assignments).post(admin::create_assignment),
        )
        .route("/api/admin/teachers", get(admin::teachers))
        .route("/api/admin/sections", get(admin::sections))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Binds `address` and serves until Ctrl+C or SIGTERM.
pub async fn serve(state: AppState, address: &str) -> Result<()> {
    let app = router(state);

    info!("Binding to {address}");
    let listener = TcpListener::bind(address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install terminate handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = interrupt => {},
        () = terminate => {},
    }
}
