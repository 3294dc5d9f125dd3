//! Analytics endpoints and web-vitals collection.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;

use siad_core::analytics::{
    self, ArchivadorStats, DocumentAnalytics, ExpedienteStats, SignatureStats, TypologyStat,
    UserStats, VitalSummary,
};
use siad_core::envelope::ApiEnvelope;
use siad_core::requests::TypologyStatsQuery;
use siad_core::vitals::WebVitalPayload;
use siad_storage::{DocumentFilter, FlowFilter, SignatureFilter};

use super::error::ApiResult;
use super::state::AppState;

/// GET /api/analytics/documents
pub(crate) async fn handle_document_analytics(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ApiEnvelope<DocumentAnalytics>>> {
    let documents = state
        .storage
        .list_documents(&DocumentFilter::default())
        .await?;
    let today = time::OffsetDateTime::now_utc();
    let stats = analytics::document_analytics(&documents, today.year(), u8::from(today.month()));
    Ok(Json(ApiEnvelope::success("", stats)))
}

/// GET /api/analytics/archivadores
pub(crate) async fn handle_archivador_stats(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ApiEnvelope<ArchivadorStats>>> {
    let archivadores = state.storage.list_archivadores().await?;
    Ok(Json(ApiEnvelope::success(
        "",
        analytics::archivador_stats(&archivadores),
    )))
}

/// GET /api/analytics/expedientes
pub(crate) async fn handle_expediente_stats(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ApiEnvelope<ExpedienteStats>>> {
    let expedientes = state.storage.list_expedientes().await?;
    Ok(Json(ApiEnvelope::success(
        "",
        analytics::expediente_stats(&expedientes),
    )))
}

/// GET /api/analytics/typologies?groupBy=typology|period
pub(crate) async fn handle_typology_stats(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TypologyStatsQuery>,
) -> ApiResult<Json<ApiEnvelope<Vec<TypologyStat>>>> {
    let documents = state
        .storage
        .list_documents(&DocumentFilter::default())
        .await?;
    let typologies = state.storage.list_typologies().await?;
    let archivadores = state.storage.list_archivadores().await?;
    let rows = analytics::typology_stats(&documents, &typologies, &archivadores, query.group_by);
    Ok(Json(ApiEnvelope::success("", rows)))
}

/// GET /api/analytics/users
pub(crate) async fn handle_user_stats(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ApiEnvelope<UserStats>>> {
    let users: Vec<_> = state
        .storage
        .list_users()
        .await?
        .into_iter()
        .map(|r| r.user)
        .collect();
    let documents = state
        .storage
        .list_documents(&DocumentFilter::default())
        .await?;
    Ok(Json(ApiEnvelope::success(
        "",
        analytics::user_stats(&users, &documents),
    )))
}

/// GET /api/analytics/signatures
pub(crate) async fn handle_signature_stats(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ApiEnvelope<SignatureStats>>> {
    let signatures = state
        .storage
        .list_signatures(&SignatureFilter::default())
        .await?;
    let flows = state.storage.list_flows(&FlowFilter::default()).await?;
    Ok(Json(ApiEnvelope::success(
        "",
        analytics::signature_stats(&signatures, &flows),
    )))
}

/// POST /api/analytics/web-vitals
pub(crate) async fn handle_collect_vital(
    State(state): State<Arc<AppState>>,
    Json(sample): Json<WebVitalPayload>,
) -> Json<ApiEnvelope<()>> {
    tracing::debug!(metric = %sample.name, value = sample.value, "web vital received");
    state.vitals.push(sample).await;
    Json(ApiEnvelope::success("", ()))
}

/// GET /api/analytics/web-vitals
pub(crate) async fn handle_vitals_summary(
    State(state): State<Arc<AppState>>,
) -> Json<ApiEnvelope<Vec<VitalSummary>>> {
    let samples = state.vitals.snapshot().await;
    Json(ApiEnvelope::success("", analytics::summarize_vitals(&samples)))
}
