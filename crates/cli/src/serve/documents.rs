//! Document handlers: CRUD, file storage, OCR status and version history.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::{Extension, Json};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use sha2::{Digest, Sha256};

use siad_core::clock;
use siad_core::envelope::{ApiEnvelope, PageQuery};
use siad_core::model::{Document, FileRef, OcrStatus, User, Version};
use siad_core::requests::{DocumentInput, DocumentQuery, FileUpload, OcrUpdate};
use siad_storage::{DocumentFilter, FileBlob};

use super::auth::{require_writer, CurrentUser};
use super::error::{ApiError, ApiResult};
use super::media::upload_image;
use super::middleware::ClientIp;
use super::signing::append_version;
use super::state::AppState;

/// Folder suffix for document images on the image host.
const MEDIA_PURPOSE: &str = "documents";

/// Largest decoded file accepted on upload.
pub(crate) const MAX_FILE_SIZE: usize = 20 * 1024 * 1024;

pub(crate) fn file_path(document_id: &str) -> String {
    format!("/api/documents/{}/file", document_id)
}

fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// A decoded upload, ready to be stored.
#[derive(Debug)]
struct PreparedFile {
    name: String,
    mime_type: String,
    bytes: Vec<u8>,
    sha256: String,
}

fn prepare_file(upload: FileUpload) -> ApiResult<PreparedFile> {
    let name = upload.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::bad_request("El archivo debe tener nombre"));
    }
    let mime_type = upload.mime_type.trim().to_string();
    if mime_type.is_empty() || mime_type.chars().any(|c| c.is_control()) {
        return Err(ApiError::bad_request("Tipo de archivo inválido"));
    }
    let bytes = BASE64
        .decode(upload.content_base64.trim())
        .map_err(|_| ApiError::bad_request("Contenido del archivo inválido"))?;
    if bytes.len() > MAX_FILE_SIZE {
        return Err(ApiError::bad_request("El archivo supera el tamaño máximo"));
    }
    let sha256 = sha256_hex(&bytes);
    Ok(PreparedFile {
        name,
        mime_type,
        bytes,
        sha256,
    })
}

/// Store a prepared file for an existing document and return its reference.
///
/// Images go to the image host when it is enabled; a failed upload falls
/// back to local storage.
async fn store_file(state: &AppState, document_id: &str, file: PreparedFile) -> ApiResult<FileRef> {
    let mut url = None;
    if state.media.accepts(&file.mime_type) {
        let media = state.media.clone();
        let (name, mime, bytes) = (file.name.clone(), file.mime_type.clone(), file.bytes.clone());
        let uploaded = tokio::task::spawn_blocking(move || {
            upload_image(&media, MEDIA_PURPOSE, &name, &mime, &bytes)
        })
        .await
        .map_err(|e| ApiError::internal(format!("upload task failed: {}", e)))?;
        match uploaded {
            Ok(secure_url) => url = Some(secure_url),
            Err(e) => tracing::warn!(
                document = document_id,
                error = %e,
                "image host upload failed; keeping file locally"
            ),
        }
    }

    let file_ref = FileRef {
        name: file.name,
        mime_type: file.mime_type,
        size: file.bytes.len() as u64,
        sha256: file.sha256,
        url: url.unwrap_or_else(|| file_path(document_id)),
    };
    state
        .storage
        .put_file(FileBlob {
            document_id: document_id.to_string(),
            data: file.bytes,
        })
        .await?;
    Ok(file_ref)
}

fn validate_input(input: &DocumentInput) -> ApiResult<()> {
    if input.title.trim().is_empty() {
        return Err(ApiError::bad_request("El título es obligatorio"));
    }
    if input.document_number.trim().is_empty() {
        return Err(ApiError::bad_request("El número de documento es obligatorio"));
    }
    if input.archivador_id.trim().is_empty() {
        return Err(ApiError::bad_request("El archivador es obligatorio"));
    }
    Ok(())
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// GET /api/documents
pub(crate) async fn handle_list_documents(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DocumentQuery>,
) -> ApiResult<Json<ApiEnvelope<Vec<Document>>>> {
    let filter = DocumentFilter {
        archivador_id: query.archivador_id,
        expediente_id: query.expediente_id,
        typology_id: query.typology_id,
        ocr_status: query.ocr_status,
        search: blank_to_none(query.search),
    };
    let documents = state.storage.list_documents(&filter).await?;
    let (data, pagination) = PageQuery {
        page: query.page,
        limit: query.limit,
    }
    .apply(documents);
    Ok(Json(ApiEnvelope::paginated("", data, pagination)))
}

/// GET /api/documents/{id}
pub(crate) async fn handle_get_document(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiEnvelope<Document>>> {
    let document = state.storage.get_document(&id).await?;
    Ok(Json(ApiEnvelope::success("", document)))
}

/// POST /api/documents
pub(crate) async fn handle_create_document(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Extension(ClientIp(ip)): Extension<ClientIp>,
    Json(input): Json<DocumentInput>,
) -> ApiResult<Json<ApiEnvelope<Document>>> {
    require_writer(&user)?;
    validate_input(&input)?;
    let prepared = input.file.map(prepare_file).transpose()?;

    let now = clock::now();
    let mut document = Document {
        id: uuid::Uuid::new_v4().to_string(),
        title: input.title.trim().to_string(),
        document_number: input.document_number.trim().to_string(),
        archivador_id: input.archivador_id,
        expediente_id: blank_to_none(input.expediente_id),
        typology_id: blank_to_none(input.typology_id),
        ocr_status: OcrStatus::Pending,
        ocr_text: None,
        file: None,
        created_by: user.id.clone(),
        created_at: now.clone(),
        updated_at: now,
    };
    state.storage.insert_document(document.clone()).await?;

    if let Some(file) = prepared {
        document.file = Some(store_file(&state, &document.id, file).await?);
        state.storage.update_document(document.clone()).await?;
    }
    append_version(&state, &document, "Versión inicial".to_string(), &user.id).await?;

    tracing::info!(document = %document.id, "document created");
    state
        .audit(
            Some(&user),
            "CREATE",
            "document",
            Some(&document.id),
            serde_json::json!({"title": document.title, "archivadorId": document.archivador_id}),
            ip,
        )
        .await;
    Ok(Json(ApiEnvelope::success("Documento creado", document)))
}

/// PUT /api/documents/{id}
///
/// A new file replaces the stored one and appends a version.
pub(crate) async fn handle_update_document(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Extension(ClientIp(ip)): Extension<ClientIp>,
    Path(id): Path<String>,
    Json(input): Json<DocumentInput>,
) -> ApiResult<Json<ApiEnvelope<Document>>> {
    require_writer(&user)?;
    validate_input(&input)?;
    let prepared = input.file.map(prepare_file).transpose()?;

    let _guard = state.write_lock.lock().await;
    let mut document = state.storage.get_document(&id).await?;
    document.title = input.title.trim().to_string();
    document.document_number = input.document_number.trim().to_string();
    document.archivador_id = input.archivador_id;
    document.expediente_id = blank_to_none(input.expediente_id);
    document.typology_id = blank_to_none(input.typology_id);
    document.updated_at = clock::now();
    state.storage.update_document(document.clone()).await?;

    let file_changed = prepared.is_some();
    if let Some(file) = prepared {
        document.file = Some(store_file(&state, &document.id, file).await?);
        state.storage.update_document(document.clone()).await?;
        append_version(&state, &document, "Archivo actualizado".to_string(), &user.id).await?;
    }

    state
        .audit(
            Some(&user),
            "UPDATE",
            "document",
            Some(&id),
            serde_json::json!({"fileChanged": file_changed}),
            ip,
        )
        .await;
    Ok(Json(ApiEnvelope::success("Documento actualizado", document)))
}

/// DELETE /api/documents/{id}
pub(crate) async fn handle_delete_document(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Extension(ClientIp(ip)): Extension<ClientIp>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiEnvelope<()>>> {
    require_writer(&user)?;
    let _guard = state.write_lock.lock().await;
    state.storage.delete_document(&id).await?;
    state
        .audit(
            Some(&user),
            "DELETE",
            "document",
            Some(&id),
            serde_json::Value::Null,
            ip,
        )
        .await;
    Ok(Json(ApiEnvelope::success("Documento eliminado", ())))
}

fn apply_ocr(document: &mut Document, update: OcrUpdate, user: &User) -> ApiResult<()> {
    if !document.ocr_status.can_transition_to(update.status) {
        return Err(ApiError::conflict(format!(
            "Transición de OCR inválida: {} -> {}",
            document.ocr_status.as_str(),
            update.status.as_str()
        )));
    }
    document.ocr_status = update.status;
    match update.status {
        OcrStatus::Completed => document.ocr_text = update.text,
        OcrStatus::Pending => document.ocr_text = None,
        _ => {}
    }
    document.updated_at = clock::now();
    tracing::debug!(
        document = %document.id,
        user = %user.id,
        status = update.status.as_str(),
        "ocr status changed"
    );
    Ok(())
}

/// PATCH /api/documents/{id}/ocr
pub(crate) async fn handle_update_ocr(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Extension(ClientIp(ip)): Extension<ClientIp>,
    Path(id): Path<String>,
    Json(update): Json<OcrUpdate>,
) -> ApiResult<Json<ApiEnvelope<Document>>> {
    require_writer(&user)?;
    let _guard = state.write_lock.lock().await;
    let mut document = state.storage.get_document(&id).await?;
    let status = update.status;
    apply_ocr(&mut document, update, &user)?;
    state.storage.update_document(document.clone()).await?;
    state
        .audit(
            Some(&user),
            "OCR_UPDATE",
            "document",
            Some(&id),
            serde_json::json!({"status": status}),
            ip,
        )
        .await;
    Ok(Json(ApiEnvelope::success("Estado de OCR actualizado", document)))
}

/// GET /api/documents/{id}/file
///
/// Files kept on the image host redirect there; local files stream back
/// with their stored MIME type.
pub(crate) async fn handle_get_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let document = state.storage.get_document(&id).await?;
    let Some(file) = document.file else {
        return Err(ApiError::not_found("El documento no tiene archivo"));
    };
    if file.url != file_path(&id) {
        return Ok(Redirect::temporary(&file.url).into_response());
    }
    let blob = state.storage.get_file(&id).await?;
    let disposition = format!(
        "inline; filename=\"{}\"",
        file.name.replace(['"', '\r', '\n'], "_")
    );
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, file.mime_type)
        .header(header::CONTENT_DISPOSITION, disposition)
        .body(Body::from(blob.data))
        .map_err(|e| ApiError::internal(format!("could not build file response: {}", e)))
}

/// GET /api/documents/{id}/versions
pub(crate) async fn handle_list_versions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiEnvelope<Vec<Version>>>> {
    state.storage.get_document(&id).await?;
    let versions = state.storage.list_versions(&id).await?;
    Ok(Json(ApiEnvelope::success("", versions)))
}
