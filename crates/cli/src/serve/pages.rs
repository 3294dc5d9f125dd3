//! Page routes behind the cookie gate, the favicon and the flow redirect.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};

use siad_core::flow::{FlowRedirect, FLOW_LIST_PATH};
use siad_core::gate::LOGIN_PATH;
use siad_core::model::SystemConfig;

use super::auth::request_token;
use super::state::AppState;

const DEFAULT_FAVICON: &str = include_str!("../../assets/favicon.svg");
const FAVICON_CACHE: &str = "public, max-age=3600";

fn cache_header(mut response: Response) -> Response {
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static(FAVICON_CACHE));
    response
}

/// GET /favicon.ico
///
/// Redirects to the configured favicon, else serves the bundled icon.
pub(crate) async fn handle_favicon(State(state): State<Arc<AppState>>) -> Response {
    let config = match state.storage.get_config().await {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(error = %e, "could not load config for favicon");
            SystemConfig::default()
        }
    };
    let response = match config.favicon() {
        Some(url) => Redirect::temporary(url).into_response(),
        None => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "image/svg+xml")],
            DEFAULT_FAVICON,
        )
            .into_response(),
    };
    cache_header(response)
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Minimal document shell for the login and dashboard pages.
pub(crate) fn page_shell(config: &SystemConfig, title: &str) -> String {
    format!(
        "<!doctype html>\n<html lang=\"es\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{title} | {system}</title>\n<link rel=\"icon\" href=\"/favicon.ico\">\n\
         <style>:root {{ --primary: {color}; }}</style>\n</head>\n<body>\n\
         <main id=\"app\" data-institution=\"{institution}\"></main>\n</body>\n</html>\n",
        title = escape_html(title),
        system = escape_html(&config.system_name),
        color = escape_html(&config.primary_color),
        institution = escape_html(&config.institution_name),
    )
}

async fn render(state: &AppState, title: &str) -> Html<String> {
    let config = state.storage.get_config().await.unwrap_or_default();
    Html(page_shell(&config, title))
}

/// GET /login
pub(crate) async fn handle_login_page(State(state): State<Arc<AppState>>) -> Html<String> {
    render(&state, "Iniciar sesión").await
}

/// GET /dashboard and everything below it.
pub(crate) async fn handle_dashboard_page(State(state): State<Arc<AppState>>) -> Html<String> {
    render(&state, "Panel").await
}

/// GET /dashboard/signatures/flows/{id}
///
/// Opening a flow lands on the signing page while a signer is still due,
/// otherwise on the flow list.
pub(crate) async fn handle_open_flow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Redirect {
    let authenticated = match request_token(&headers) {
        Some(token) => state.sessions.resolve(&token).await.is_some(),
        None => false,
    };
    if !authenticated {
        return Redirect::temporary(LOGIN_PATH);
    }
    match state.storage.get_flow(&id).await {
        Ok(flow) => Redirect::temporary(&FlowRedirect::for_flow(&flow).path()),
        Err(e) => {
            tracing::debug!(flow = %id, error = %e, "flow not found; redirecting to list");
            Redirect::temporary(FLOW_LIST_PATH)
        }
    }
}
