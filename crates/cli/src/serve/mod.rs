//! `siad serve` -- the SIAD REST backend.
//!
//! An axum service over an [`ArchiveStorage`] backend. Every `/api` response
//! uses the `{status, message, data, pagination?}` envelope; page routes sit
//! behind the `access_token` cookie gate.
//!
//! Security features:
//! - Session tokens (Bearer header or `access_token` cookie) on `/api/*`
//! - Role checks per handler (admin, archive writer, signer)
//! - CORS headers on all responses
//! - Per-IP rate limiting (default: 120 req/min, configurable)
//!
//! Endpoints:
//! - GET  /api/health                   - Service status (public)
//! - POST /api/auth/login|logout        - Session management
//! - GET  /api/auth/me                  - Current user
//! - /api/users, /api/archivadores, /api/expedientes, /api/typologies
//! - /api/documents (+ /ocr, /file, /versions, /signatures)
//! - /api/signatures (sign, verify, revert), /api/flows (reject, cancel)
//! - /api/backups, /api/restores        - Background jobs (admin)
//! - /api/audit, /api/analytics/*, /api/config
//! - GET  /favicon.ico, /login, /dashboard/*

mod analytics;
mod archive;
mod auth;
mod documents;
mod error;
mod flows;
mod handlers;
mod jobs;
mod media;
mod middleware;
mod pages;
mod signing;
mod state;
#[cfg(test)]
mod tests;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::Method;
use axum::routing::{get, patch, post};
use axum::{middleware as axum_middleware, Router};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};

use siad_core::vitals::WEB_VITALS_PATH;
use siad_storage::{ArchiveStorage, MemoryStorage};

use self::state::{AppState, RateLimiter, SessionStore, VitalsBuffer};

pub(crate) use self::media::MediaConfig;
use self::middleware::{auth_middleware, page_gate_middleware, rate_limit_middleware};
use self::signing::DocumentSigner;

/// Maximum request body size: base64 uploads are a third larger than the
/// file itself.
const MAX_BODY_SIZE: usize = 32 * 1024 * 1024;

/// Rate limit window duration in seconds (1 minute).
const RATE_LIMIT_WINDOW_SECS: u64 = 60;

/// Web-vitals samples kept in memory.
const VITALS_CAPACITY: usize = 1000;

/// Settings for one server run.
#[derive(Debug, Clone)]
pub(crate) struct ServeConfig {
    pub(crate) port: u16,
    /// Requests per minute per IP.
    pub(crate) rate_limit: u64,
    pub(crate) session_ttl: Duration,
    pub(crate) admin_email: String,
    pub(crate) admin_password: Option<String>,
    /// Secret key written by `siad keygen`. A fresh key is generated when
    /// absent.
    pub(crate) signing_key: Option<PathBuf>,
    pub(crate) media: MediaConfig,
    pub(crate) tls_cert: Option<PathBuf>,
    pub(crate) tls_key: Option<PathBuf>,
}

/// Build the shared state over `storage` and seed the first administrator.
pub(crate) async fn build_state(
    config: &ServeConfig,
    storage: Arc<dyn ArchiveStorage>,
) -> Result<Arc<AppState>, Box<dyn std::error::Error>> {
    let signer = match &config.signing_key {
        Some(path) => DocumentSigner::new(crate::keygen::read_secret_key(path)?),
        None => {
            tracing::warn!("no signing key configured; generated an ephemeral key");
            DocumentSigner::generate()
        }
    };
    tracing::info!(fingerprint = signer.fingerprint(), "signing key loaded");

    let state = Arc::new(AppState {
        storage,
        rate_limiter: RateLimiter::new(config.rate_limit),
        sessions: SessionStore::new(config.session_ttl),
        signer,
        media: config.media.clone(),
        vitals: VitalsBuffer::new(VITALS_CAPACITY),
        write_lock: Mutex::new(()),
    });

    if let Some(password) =
        auth::seed_admin(&state, &config.admin_email, config.admin_password.as_deref()).await?
    {
        tracing::warn!(
            email = %config.admin_email,
            password = %password,
            "generated administrator password; change it after first login"
        );
    }
    Ok(state)
}

/// Assemble the router with every route and middleware layer.
pub(crate) fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers(Any);

    let api = Router::new()
        .route("/api/health", get(handlers::handle_health))
        .route("/api/auth/login", post(auth::handle_login))
        .route("/api/auth/logout", post(auth::handle_logout))
        .route("/api/auth/me", get(auth::handle_me))
        .route(
            "/api/users",
            get(auth::handle_list_users).post(auth::handle_create_user),
        )
        .route(
            "/api/archivadores",
            get(archive::handle_list_archivadores).post(archive::handle_create_archivador),
        )
        .route(
            "/api/archivadores/{id}",
            get(archive::handle_get_archivador)
                .put(archive::handle_update_archivador)
                .delete(archive::handle_delete_archivador),
        )
        .route(
            "/api/expedientes",
            get(archive::handle_list_expedientes).post(archive::handle_create_expediente),
        )
        .route(
            "/api/expedientes/{id}",
            get(archive::handle_get_expediente)
                .put(archive::handle_update_expediente)
                .delete(archive::handle_delete_expediente),
        )
        .route(
            "/api/typologies",
            get(archive::handle_list_typologies).post(archive::handle_create_typology),
        )
        .route(
            "/api/documents",
            get(documents::handle_list_documents).post(documents::handle_create_document),
        )
        .route(
            "/api/documents/{id}",
            get(documents::handle_get_document)
                .put(documents::handle_update_document)
                .delete(documents::handle_delete_document),
        )
        .route("/api/documents/{id}/ocr", patch(documents::handle_update_ocr))
        .route("/api/documents/{id}/file", get(documents::handle_get_file))
        .route(
            "/api/documents/{id}/versions",
            get(documents::handle_list_versions),
        )
        .route(
            "/api/documents/{id}/signatures",
            get(signing::handle_document_signatures),
        )
        .route("/api/signatures", get(signing::handle_list_signatures))
        .route("/api/signatures/sign", post(signing::handle_sign))
        .route("/api/signatures/{id}/verify", post(signing::handle_verify))
        .route("/api/signatures/{id}/revert", post(signing::handle_revert))
        .route(
            "/api/flows",
            get(flows::handle_list_flows).post(flows::handle_create_flow),
        )
        .route("/api/flows/{id}", get(flows::handle_get_flow))
        .route("/api/flows/{id}/reject", post(flows::handle_reject_flow))
        .route("/api/flows/{id}/cancel", post(flows::handle_cancel_flow))
        .route(
            "/api/backups",
            get(jobs::handle_list_backups).post(jobs::handle_create_backup),
        )
        .route("/api/backups/{id}", get(jobs::handle_get_backup))
        .route(
            "/api/backups/{id}/restore",
            post(jobs::handle_create_restore),
        )
        .route("/api/restores", get(jobs::handle_list_restores))
        .route("/api/restores/{id}", get(jobs::handle_get_restore))
        .route("/api/audit", get(handlers::handle_list_audit))
        .route(
            "/api/analytics/documents",
            get(analytics::handle_document_analytics),
        )
        .route(
            "/api/analytics/archivadores",
            get(analytics::handle_archivador_stats),
        )
        .route(
            "/api/analytics/expedientes",
            get(analytics::handle_expediente_stats),
        )
        .route(
            "/api/analytics/typologies",
            get(analytics::handle_typology_stats),
        )
        .route("/api/analytics/users", get(analytics::handle_user_stats))
        .route(
            "/api/analytics/signatures",
            get(analytics::handle_signature_stats),
        )
        .route(
            WEB_VITALS_PATH,
            get(analytics::handle_vitals_summary).post(analytics::handle_collect_vital),
        )
        .route(
            "/api/config",
            get(handlers::handle_get_config).put(handlers::handle_update_config),
        );

    let pages = Router::new()
        .route("/favicon.ico", get(pages::handle_favicon))
        .route("/login", get(pages::handle_login_page))
        .route("/dashboard", get(pages::handle_dashboard_page))
        .route("/dashboard/{*rest}", get(pages::handle_dashboard_page))
        .route(
            "/dashboard/signatures/flows/{id}",
            get(pages::handle_open_flow),
        );

    api.merge(pages)
        .fallback(handlers::handle_not_found)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(axum_middleware::from_fn(page_gate_middleware))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(cors)
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .with_state(state)
}

/// Start the HTTP server with an in-memory archive.
///
/// When TLS cert/key paths are provided, the server listens over HTTPS
/// using `axum-server` with rustls. Otherwise it uses plain HTTP.
pub(crate) async fn start_server(config: ServeConfig) -> Result<(), Box<dyn std::error::Error>> {
    let storage: Arc<dyn ArchiveStorage> = Arc::new(MemoryStorage::new());
    let state = build_state(&config, storage).await?;
    tracing::info!(
        rate_limit = config.rate_limit,
        session_ttl_secs = config.session_ttl.as_secs(),
        image_host = config.media.enabled,
        "server configured"
    );

    let app = build_router(state);
    let addr = format!("0.0.0.0:{}", config.port);

    #[cfg(feature = "tls")]
    if let (Some(cert_path), Some(key_path)) = (&config.tls_cert, &config.tls_key) {
        let tls =
            axum_server::tls_rustls::RustlsConfig::from_pem_file(cert_path, key_path).await?;
        let socket_addr: std::net::SocketAddr = addr.parse()?;
        tracing::info!("SIAD listening on https://{}", addr);
        axum_server::bind_rustls(socket_addr, tls)
            .serve(app.into_make_service_with_connect_info::<std::net::SocketAddr>())
            .await?;
        return Ok(());
    }
    #[cfg(not(feature = "tls"))]
    if config.tls_cert.is_some() {
        tracing::warn!("TLS flags ignored: built without the `tls` feature");
    }

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("SIAD listening on http://{}", addr);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("server shut down");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("received shutdown signal");
}
