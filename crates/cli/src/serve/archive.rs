//! Archive structure handlers: archivadores, expedientes and typologies.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};

use siad_core::clock;
use siad_core::envelope::{ApiEnvelope, PageQuery};
use siad_core::model::{Archivador, Expediente, ExpedienteStatus, Typology};
use siad_core::requests::{ArchivadorInput, ExpedienteInput, TypologyInput};

use super::auth::{require_writer, CurrentUser};
use super::error::{ApiError, ApiResult};
use super::middleware::ClientIp;
use super::state::AppState;

fn required(value: &str, field: &str) -> ApiResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ApiError::bad_request(format!("El campo {} es obligatorio", field)))
    } else {
        Ok(trimmed.to_string())
    }
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn validate_archivador(input: ArchivadorInput) -> ApiResult<ArchivadorInput> {
    if !(1900..=2200).contains(&input.period) {
        return Err(ApiError::bad_request("Periodo inválido"));
    }
    Ok(ArchivadorInput {
        code: required(&input.code, "código")?,
        name: required(&input.name, "nombre")?,
        period: input.period,
        office: required(&input.office, "oficina")?,
        description: optional(input.description),
    })
}

// ── Archivadores ──────────────────────────────────────────────────────────

/// GET /api/archivadores
pub(crate) async fn handle_list_archivadores(
    State(state): State<Arc<AppState>>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<ApiEnvelope<Vec<Archivador>>>> {
    let all = state.storage.list_archivadores().await?;
    let (data, pagination) = page.apply(all);
    Ok(Json(ApiEnvelope::paginated("", data, pagination)))
}

/// GET /api/archivadores/{id}
pub(crate) async fn handle_get_archivador(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiEnvelope<Archivador>>> {
    let archivador = state.storage.get_archivador(&id).await?;
    Ok(Json(ApiEnvelope::success("", archivador)))
}

/// POST /api/archivadores
pub(crate) async fn handle_create_archivador(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Extension(ClientIp(ip)): Extension<ClientIp>,
    Json(input): Json<ArchivadorInput>,
) -> ApiResult<Json<ApiEnvelope<Archivador>>> {
    require_writer(&user)?;
    let input = validate_archivador(input)?;
    let now = clock::now();
    let archivador = Archivador {
        id: uuid::Uuid::new_v4().to_string(),
        code: input.code,
        name: input.name,
        period: input.period,
        office: input.office,
        description: input.description,
        created_by: user.id.clone(),
        created_at: now.clone(),
        updated_at: now,
        document_count: 0,
    };
    state.storage.insert_archivador(archivador.clone()).await?;
    state
        .audit(
            Some(&user),
            "CREATE",
            "archivador",
            Some(&archivador.id),
            serde_json::json!({"code": archivador.code}),
            ip,
        )
        .await;
    Ok(Json(ApiEnvelope::success("Archivador creado", archivador)))
}

/// PUT /api/archivadores/{id}
pub(crate) async fn handle_update_archivador(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Extension(ClientIp(ip)): Extension<ClientIp>,
    Path(id): Path<String>,
    Json(input): Json<ArchivadorInput>,
) -> ApiResult<Json<ApiEnvelope<Archivador>>> {
    require_writer(&user)?;
    let input = validate_archivador(input)?;
    let mut archivador = state.storage.get_archivador(&id).await?;
    archivador.code = input.code;
    archivador.name = input.name;
    archivador.period = input.period;
    archivador.office = input.office;
    archivador.description = input.description;
    archivador.updated_at = clock::now();
    state.storage.update_archivador(archivador.clone()).await?;
    state
        .audit(
            Some(&user),
            "UPDATE",
            "archivador",
            Some(&id),
            serde_json::Value::Null,
            ip,
        )
        .await;
    Ok(Json(ApiEnvelope::success(
        "Archivador actualizado",
        archivador,
    )))
}

/// DELETE /api/archivadores/{id}
pub(crate) async fn handle_delete_archivador(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Extension(ClientIp(ip)): Extension<ClientIp>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiEnvelope<()>>> {
    require_writer(&user)?;
    state.storage.delete_archivador(&id).await?;
    state
        .audit(
            Some(&user),
            "DELETE",
            "archivador",
            Some(&id),
            serde_json::Value::Null,
            ip,
        )
        .await;
    Ok(Json(ApiEnvelope::success("Archivador eliminado", ())))
}

// ── Expedientes ───────────────────────────────────────────────────────────

/// GET /api/expedientes
pub(crate) async fn handle_list_expedientes(
    State(state): State<Arc<AppState>>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<ApiEnvelope<Vec<Expediente>>>> {
    let all = state.storage.list_expedientes().await?;
    let (data, pagination) = page.apply(all);
    Ok(Json(ApiEnvelope::paginated("", data, pagination)))
}

/// GET /api/expedientes/{id}
pub(crate) async fn handle_get_expediente(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiEnvelope<Expediente>>> {
    let expediente = state.storage.get_expediente(&id).await?;
    Ok(Json(ApiEnvelope::success("", expediente)))
}

/// POST /api/expedientes
pub(crate) async fn handle_create_expediente(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Extension(ClientIp(ip)): Extension<ClientIp>,
    Json(input): Json<ExpedienteInput>,
) -> ApiResult<Json<ApiEnvelope<Expediente>>> {
    require_writer(&user)?;
    let now = clock::now();
    let expediente = Expediente {
        id: uuid::Uuid::new_v4().to_string(),
        code: required(&input.code, "código")?,
        title: required(&input.title, "título")?,
        description: optional(input.description),
        status: input.status.unwrap_or(ExpedienteStatus::Open),
        created_by: user.id.clone(),
        created_at: now.clone(),
        updated_at: now,
        document_count: 0,
    };
    state.storage.insert_expediente(expediente.clone()).await?;
    state
        .audit(
            Some(&user),
            "CREATE",
            "expediente",
            Some(&expediente.id),
            serde_json::json!({"code": expediente.code}),
            ip,
        )
        .await;
    Ok(Json(ApiEnvelope::success("Expediente creado", expediente)))
}

/// PUT /api/expedientes/{id}
pub(crate) async fn handle_update_expediente(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Extension(ClientIp(ip)): Extension<ClientIp>,
    Path(id): Path<String>,
    Json(input): Json<ExpedienteInput>,
) -> ApiResult<Json<ApiEnvelope<Expediente>>> {
    require_writer(&user)?;
    let mut expediente = state.storage.get_expediente(&id).await?;
    expediente.code = required(&input.code, "código")?;
    expediente.title = required(&input.title, "título")?;
    expediente.description = optional(input.description);
    if let Some(status) = input.status {
        expediente.status = status;
    }
    expediente.updated_at = clock::now();
    state.storage.update_expediente(expediente.clone()).await?;
    state
        .audit(
            Some(&user),
            "UPDATE",
            "expediente",
            Some(&id),
            serde_json::json!({"status": expediente.status}),
            ip,
        )
        .await;
    Ok(Json(ApiEnvelope::success(
        "Expediente actualizado",
        expediente,
    )))
}

/// DELETE /api/expedientes/{id}
pub(crate) async fn handle_delete_expediente(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Extension(ClientIp(ip)): Extension<ClientIp>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiEnvelope<()>>> {
    require_writer(&user)?;
    state.storage.delete_expediente(&id).await?;
    state
        .audit(
            Some(&user),
            "DELETE",
            "expediente",
            Some(&id),
            serde_json::Value::Null,
            ip,
        )
        .await;
    Ok(Json(ApiEnvelope::success("Expediente eliminado", ())))
}

// ── Typologies ────────────────────────────────────────────────────────────

/// GET /api/typologies
pub(crate) async fn handle_list_typologies(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ApiEnvelope<Vec<Typology>>>> {
    let typologies = state.storage.list_typologies().await?;
    Ok(Json(ApiEnvelope::success("", typologies)))
}

/// POST /api/typologies
pub(crate) async fn handle_create_typology(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Extension(ClientIp(ip)): Extension<ClientIp>,
    Json(input): Json<TypologyInput>,
) -> ApiResult<Json<ApiEnvelope<Typology>>> {
    require_writer(&user)?;
    let typology = Typology {
        id: uuid::Uuid::new_v4().to_string(),
        name: required(&input.name, "nombre")?,
        description: optional(input.description),
    };
    state.storage.insert_typology(typology.clone()).await?;
    state
        .audit(
            Some(&user),
            "CREATE",
            "typology",
            Some(&typology.id),
            serde_json::json!({"name": typology.name}),
            ip,
        )
        .await;
    Ok(Json(ApiEnvelope::success("Tipología creada", typology)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archivador_input_is_trimmed_and_checked() {
        let input = validate_archivador(ArchivadorInput {
            code: " ARC-1 ".to_string(),
            name: "Oficios".to_string(),
            period: 2025,
            office: "Mesa de partes".to_string(),
            description: Some("  ".to_string()),
        })
        .unwrap();
        assert_eq!(input.code, "ARC-1");
        assert_eq!(input.description, None);

        let err = validate_archivador(ArchivadorInput {
            code: "ARC-2".to_string(),
            name: "".to_string(),
            period: 2025,
            office: "x".to_string(),
            description: None,
        })
        .unwrap_err();
        assert_eq!(err.message, "El campo nombre es obligatorio");
    }

    #[test]
    fn archivador_period_must_be_a_year() {
        let err = validate_archivador(ArchivadorInput {
            code: "A".to_string(),
            name: "B".to_string(),
            period: 25,
            office: "C".to_string(),
            description: None,
        })
        .unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::BAD_REQUEST);
    }
}
