//! HTTP middleware: rate limiting, API authentication and the page gate.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::{ConnectInfo, State};
use axum::http::{header, Method, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;

use siad_core::envelope::ApiEnvelope;
use siad_core::gate::{gate_decision, GateDecision};
use siad_core::vitals::WEB_VITALS_PATH;

use super::auth::{request_token, CurrentUser};
use super::error::ApiError;
use super::state::AppState;

/// Peer address of the request, when the server was started with connect
/// info. Always present in request extensions after the rate limiter ran.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ClientIp(pub(crate) Option<IpAddr>);

/// Rate limiting middleware. Checks per-IP request rate before routing.
pub(crate) async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    request.extensions_mut().insert(ClientIp(ip));

    let Some(ip) = ip else {
        return next.run(request).await;
    };
    match state.rate_limiter.check(ip).await {
        Ok(()) => next.run(request).await,
        Err(retry_after) => {
            tracing::warn!(%ip, retry_after, "rate limit exceeded");
            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                Json(ApiEnvelope::<()>::error(
                    "Demasiadas solicitudes, intente más tarde",
                )),
            )
                .into_response();
            if let Ok(value) = retry_after.to_string().parse() {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
            response
        }
    }
}

/// Whether `/api` request is reachable without a session.
fn is_public_api(method: &Method, path: &str) -> bool {
    match path {
        "/api/health" | "/api/auth/login" => true,
        "/api/config" => method == Method::GET,
        p if p == WEB_VITALS_PATH => method == Method::POST,
        _ => false,
    }
}

/// Session authentication for `/api/*`.
///
/// Resolves the Bearer token or `access_token` cookie to an active user and
/// inserts it as [`CurrentUser`]. Public endpoints pass through untouched.
pub(crate) async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let path = request.uri().path();
    if !path.starts_with("/api/") || is_public_api(request.method(), path) {
        return next.run(request).await;
    }

    let Some(token) = request_token(request.headers()) else {
        return ApiError::unauthorized("No autenticado").into_response();
    };
    let Some(user_id) = state.sessions.resolve(&token).await else {
        return ApiError::unauthorized("Sesión expirada o inválida").into_response();
    };
    let user = match state.storage.get_user(&user_id).await {
        Ok(record) if record.user.is_active => record.user,
        Ok(_) => return ApiError::forbidden("Usuario inactivo").into_response(),
        Err(e) => {
            tracing::warn!(user = %user_id, error = %e, "session user could not be loaded");
            return ApiError::unauthorized("Sesión expirada o inválida").into_response();
        }
    };

    request.extensions_mut().insert(CurrentUser(user));
    next.run(request).await
}

/// Cookie gate for page routes: every path outside `/api`.
pub(crate) async fn page_gate_middleware(
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let path = request.uri().path();
    if path.starts_with("/api/") || path == "/api" {
        return next.run(request).await;
    }
    let token_present = request_token(request.headers()).is_some();
    match gate_decision(token_present, path) {
        GateDecision::Continue => next.run(request).await,
        GateDecision::Redirect(to) => Redirect::temporary(to).into_response(),
    }
}
