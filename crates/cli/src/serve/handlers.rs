//! Core HTTP route handlers: health, audit log, branding config.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use serde::Serialize;

use siad_core::clock;
use siad_core::envelope::{ApiEnvelope, PageQuery};
use siad_core::model::{AuditLog, SystemConfig};
use siad_core::requests::{AuditQuery, ConfigUpdate};
use siad_storage::AuditFilter;

use super::auth::{require_admin, CurrentUser};
use super::error::{ApiError, ApiResult};
use super::middleware::ClientIp;
use super::state::AppState;

/// Fallback handler for unmatched routes.
pub(crate) async fn handle_not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ApiEnvelope::<()>::error("Recurso no encontrado")),
    )
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Health {
    service: &'static str,
    version: &'static str,
    api_version: &'static str,
}

/// GET /api/health
pub(crate) async fn handle_health() -> Json<ApiEnvelope<Health>> {
    Json(ApiEnvelope::success(
        "ok",
        Health {
            service: siad_core::SERVICE_NAME,
            version: env!("CARGO_PKG_VERSION"),
            api_version: siad_core::API_VERSION,
        },
    ))
}

/// GET /api/audit
pub(crate) async fn handle_list_audit(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AuditQuery>,
) -> ApiResult<Json<ApiEnvelope<Vec<AuditLog>>>> {
    let filter = AuditFilter {
        user_id: query.user_id,
        action: query.action,
        entity_type: query.entity_type,
    };
    let entries = state.storage.list_audit(&filter).await?;
    let (data, pagination) = PageQuery {
        page: query.page,
        limit: query.limit,
    }
    .apply(entries);
    Ok(Json(ApiEnvelope::paginated("", data, pagination)))
}

/// GET /api/config
pub(crate) async fn handle_get_config(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ApiEnvelope<SystemConfig>>> {
    Ok(Json(ApiEnvelope::success(
        "",
        state.storage.get_config().await?,
    )))
}

fn is_hex_color(value: &str) -> bool {
    let Some(hex) = value.strip_prefix('#') else {
        return false;
    };
    matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit())
}

/// Merge an update into the stored config. Blank names are rejected; a
/// blank logo or favicon URL clears it.
pub(crate) fn apply_config_update(
    mut config: SystemConfig,
    update: ConfigUpdate,
) -> ApiResult<SystemConfig> {
    if let Some(name) = update.institution_name {
        if name.trim().is_empty() {
            return Err(ApiError::bad_request("El nombre de la institución es obligatorio"));
        }
        config.institution_name = name.trim().to_string();
    }
    if let Some(name) = update.system_name {
        if name.trim().is_empty() {
            return Err(ApiError::bad_request("El nombre del sistema es obligatorio"));
        }
        config.system_name = name.trim().to_string();
    }
    if let Some(color) = update.primary_color {
        if !is_hex_color(color.trim()) {
            return Err(ApiError::bad_request("Color primario inválido"));
        }
        config.primary_color = color.trim().to_string();
    }
    if let Some(url) = update.logo_url {
        config.logo_url = Some(url.trim().to_string()).filter(|u| !u.is_empty());
    }
    if let Some(url) = update.favicon_url {
        config.favicon_url = Some(url.trim().to_string()).filter(|u| !u.is_empty());
    }
    config.updated_at = clock::now();
    Ok(config)
}

/// PUT /api/config
pub(crate) async fn handle_update_config(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Extension(ClientIp(ip)): Extension<ClientIp>,
    Json(update): Json<ConfigUpdate>,
) -> ApiResult<Json<ApiEnvelope<SystemConfig>>> {
    require_admin(&user)?;
    let current = state.storage.get_config().await?;
    let config = apply_config_update(current, update)?;
    state.storage.put_config(config.clone()).await?;
    state
        .audit(
            Some(&user),
            "UPDATE",
            "config",
            None,
            serde_json::to_value(&config).unwrap_or_default(),
            ip,
        )
        .await;
    Ok(Json(ApiEnvelope::success("Configuración actualizada", config)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_urls_clear_and_names_are_required() {
        let config = SystemConfig {
            favicon_url: Some("https://cdn.example/icon.png".to_string()),
            ..Default::default()
        };
        let updated = apply_config_update(
            config.clone(),
            ConfigUpdate {
                favicon_url: Some("  ".to_string()),
                primary_color: Some("#1d4ed8".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(updated.favicon_url, None);
        assert_eq!(updated.primary_color, "#1d4ed8");

        let err = apply_config_update(
            config,
            ConfigUpdate {
                system_name: Some("".to_string()),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn colors_must_be_hex() {
        assert!(is_hex_color("#fff"));
        assert!(is_hex_color("#0f766e"));
        assert!(!is_hex_color("0f766e"));
        assert!(!is_hex_color("#12345"));
        assert!(!is_hex_color("#gggggg"));
    }
}
