//! Signature flow handlers.

use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};

use siad_core::clock;
use siad_core::envelope::{ApiEnvelope, PageQuery};
use siad_core::model::SignatureFlow;
use siad_core::requests::{FlowInput, FlowQuery};
use siad_storage::{FlowFilter, StorageError};

use super::auth::{require_admin, require_writer, CurrentUser};
use super::error::{ApiError, ApiResult};
use super::middleware::ClientIp;
use super::state::AppState;

/// GET /api/flows
///
/// `mine=true` narrows the list to flows the caller signs in.
pub(crate) async fn handle_list_flows(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Query(query): Query<FlowQuery>,
) -> ApiResult<Json<ApiEnvelope<Vec<SignatureFlow>>>> {
    let filter = FlowFilter {
        status: query.status,
        document_id: query.document_id,
        signer_id: query.mine.unwrap_or(false).then(|| user.id.clone()),
    };
    let flows = state.storage.list_flows(&filter).await?;
    let (data, pagination) = PageQuery {
        page: query.page,
        limit: query.limit,
    }
    .apply(flows);
    Ok(Json(ApiEnvelope::paginated("", data, pagination)))
}

/// GET /api/flows/{id}
pub(crate) async fn handle_get_flow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiEnvelope<SignatureFlow>>> {
    let flow = state.storage.get_flow(&id).await?;
    Ok(Json(ApiEnvelope::success("", flow)))
}

/// POST /api/flows
pub(crate) async fn handle_create_flow(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Extension(ClientIp(ip)): Extension<ClientIp>,
    Json(input): Json<FlowInput>,
) -> ApiResult<Json<ApiEnvelope<SignatureFlow>>> {
    require_writer(&user)?;
    let name = input.name.trim();
    if name.is_empty() {
        return Err(ApiError::bad_request("El nombre del flujo es obligatorio"));
    }
    state.storage.get_document(&input.document_id).await?;

    let mut checked = HashSet::new();
    for signer_id in &input.signer_ids {
        if !checked.insert(signer_id.as_str()) {
            continue;
        }
        match state.storage.get_user(signer_id).await {
            Ok(record) if record.user.is_active => {}
            Ok(_) => {
                return Err(ApiError::bad_request(format!(
                    "El firmante {} está inactivo",
                    signer_id
                )))
            }
            Err(StorageError::NotFound { .. }) => {
                return Err(ApiError::bad_request(format!(
                    "El firmante {} no existe",
                    signer_id
                )))
            }
            Err(e) => return Err(e.into()),
        }
    }

    let flow = SignatureFlow::new(
        uuid::Uuid::new_v4().to_string(),
        name.to_string(),
        input.document_id,
        &input.signer_ids,
        user.id.clone(),
        &clock::now(),
    )?;
    state.storage.insert_flow(flow.clone()).await?;
    state
        .audit(
            Some(&user),
            "CREATE",
            "flow",
            Some(&flow.id),
            serde_json::json!({"documentId": flow.document_id, "signers": flow.total_signers}),
            ip,
        )
        .await;
    Ok(Json(ApiEnvelope::success("Flujo de firma creado", flow)))
}

/// POST /api/flows/{id}/reject
///
/// The caller must be the signer whose turn it is. The flow halts until an
/// administrator cancels it.
pub(crate) async fn handle_reject_flow(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Extension(ClientIp(ip)): Extension<ClientIp>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiEnvelope<SignatureFlow>>> {
    let _guard = state.write_lock.lock().await;
    let mut flow = state.storage.get_flow(&id).await?;
    flow.reject(&user.id, &clock::now())?;
    state.storage.update_flow(flow.clone()).await?;
    tracing::info!(flow = %flow.id, user = %user.id, "flow rejected");
    state
        .audit(
            Some(&user),
            "REJECT",
            "flow",
            Some(&id),
            serde_json::Value::Null,
            ip,
        )
        .await;
    Ok(Json(ApiEnvelope::success("Flujo rechazado", flow)))
}

/// POST /api/flows/{id}/cancel
pub(crate) async fn handle_cancel_flow(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Extension(ClientIp(ip)): Extension<ClientIp>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiEnvelope<SignatureFlow>>> {
    require_admin(&user)?;
    let _guard = state.write_lock.lock().await;
    let mut flow = state.storage.get_flow(&id).await?;
    flow.cancel(&clock::now())?;
    state.storage.update_flow(flow.clone()).await?;
    state
        .audit(
            Some(&user),
            "CANCEL",
            "flow",
            Some(&id),
            serde_json::Value::Null,
            ip,
        )
        .await;
    Ok(Json(ApiEnvelope::success("Flujo cancelado", flow)))
}
