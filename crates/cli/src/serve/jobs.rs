//! Backup and restore jobs.
//!
//! Handlers record a PENDING job and spawn a task that walks it through its
//! status machine, persisting every step. A failure at any step marks the
//! job FAILED with the error text.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use siad_core::clock;
use siad_core::envelope::{ApiEnvelope, PageQuery};
use siad_core::jobs::{BackupStatus, RestoreStatus};
use siad_core::model::{BackupJob, BackupTotals, RestoreLog};
use siad_core::requests::BackupRequest;
use siad_storage::{ArchiveRecords, FileBlob};

use super::auth::{require_admin, CurrentUser};
use super::error::{ApiError, ApiResult};
use super::middleware::ClientIp;
use super::state::AppState;

/// Packaged content of a backup.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BackupArchive {
    pub(crate) created_at: String,
    pub(crate) records: ArchiveRecords,
    pub(crate) files: Vec<FileBlob>,
}

fn checksum(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

// ── Backup ────────────────────────────────────────────────────────────────

async fn set_backup_status(
    state: &AppState,
    job: &mut BackupJob,
    next: BackupStatus,
) -> Result<(), String> {
    job.status = job.status.advance(next).map_err(|e| e.to_string())?;
    state
        .storage
        .update_backup(job.clone())
        .await
        .map_err(|e| e.to_string())
}

async fn backup_steps(
    state: &AppState,
    job: &mut BackupJob,
    started: Instant,
) -> Result<(), String> {
    set_backup_status(state, job, BackupStatus::CollectingData).await?;
    let records = state
        .storage
        .export_records()
        .await
        .map_err(|e| e.to_string())?;
    let files = state.storage.list_files().await.map_err(|e| e.to_string())?;

    set_backup_status(state, job, BackupStatus::Packaging).await?;
    let archive = BackupArchive {
        created_at: clock::now(),
        records,
        files,
    };
    let bytes = serde_json::to_vec(&archive).map_err(|e| format!("could not package: {}", e))?;
    job.totals = BackupTotals {
        documents: archive.records.documents.len() as u64,
        versions: archive.records.versions.len() as u64,
        signatures: archive.records.signatures.len() as u64,
        files: archive.files.len() as u64,
        size_bytes: bytes.len() as u64,
    };
    job.checksum = Some(checksum(&bytes));
    state
        .storage
        .put_backup_archive(&job.id, bytes)
        .await
        .map_err(|e| e.to_string())?;

    job.duration_ms = Some(elapsed_ms(started));
    job.completed_at = Some(clock::now());
    set_backup_status(state, job, BackupStatus::Completed).await
}

/// Run a backup job to completion.
pub(crate) async fn run_backup(state: Arc<AppState>, mut job: BackupJob) {
    let started = Instant::now();
    tracing::info!(backup = %job.id, "backup started");
    match backup_steps(&state, &mut job, started).await {
        Ok(()) => {
            tracing::info!(backup = %job.id, size = job.totals.size_bytes, "backup completed");
        }
        Err(e) => {
            tracing::error!(backup = %job.id, error = %e, "backup failed");
            job.error = Some(e);
            job.duration_ms = Some(elapsed_ms(started));
            job.completed_at = Some(clock::now());
            if let Err(e) = set_backup_status(&state, &mut job, BackupStatus::Failed).await {
                tracing::error!(backup = %job.id, error = %e, "could not record backup failure");
            }
        }
    }
}

// ── Restore ───────────────────────────────────────────────────────────────

async fn set_restore_status(
    state: &AppState,
    log: &mut RestoreLog,
    next: RestoreStatus,
) -> Result<(), String> {
    log.status = log.status.advance(next).map_err(|e| e.to_string())?;
    state
        .storage
        .update_restore(log.clone())
        .await
        .map_err(|e| e.to_string())
}

async fn restore_steps(state: &AppState, log: &mut RestoreLog) -> Result<(), String> {
    set_restore_status(state, log, RestoreStatus::Validating).await?;
    let backup = state
        .storage
        .get_backup(&log.backup_id)
        .await
        .map_err(|e| e.to_string())?;
    if backup.status != BackupStatus::Completed {
        return Err(format!("backup {} is not completed", backup.id));
    }
    let bytes = state
        .storage
        .get_backup_archive(&backup.id)
        .await
        .map_err(|e| e.to_string())?;
    if backup.checksum.as_deref() != Some(checksum(&bytes).as_str()) {
        return Err("backup checksum mismatch".to_string());
    }
    let archive: BackupArchive =
        serde_json::from_slice(&bytes).map_err(|e| format!("corrupt backup archive: {}", e))?;

    set_restore_status(state, log, RestoreStatus::RestoringDb).await?;
    let counts = state
        .storage
        .import_records(archive.records)
        .await
        .map_err(|e| e.to_string())?;
    log.restored_records = counts.restored;
    log.skipped_records = counts.skipped;

    set_restore_status(state, log, RestoreStatus::RestoringFiles).await?;
    let counts = state
        .storage
        .import_files(archive.files)
        .await
        .map_err(|e| e.to_string())?;
    log.restored_files = counts.restored;
    log.skipped_files = counts.skipped;

    log.completed_at = Some(clock::now());
    set_restore_status(state, log, RestoreStatus::Completed).await
}

/// Run a restore job to completion.
pub(crate) async fn run_restore(state: Arc<AppState>, mut log: RestoreLog) {
    tracing::info!(restore = %log.id, backup = %log.backup_id, "restore started");
    match restore_steps(&state, &mut log).await {
        Ok(()) => tracing::info!(
            restore = %log.id,
            restored = log.restored_records,
            skipped = log.skipped_records,
            "restore completed"
        ),
        Err(e) => {
            tracing::error!(restore = %log.id, error = %e, "restore failed");
            log.error = Some(e);
            log.completed_at = Some(clock::now());
            if let Err(e) = set_restore_status(&state, &mut log, RestoreStatus::Failed).await {
                tracing::error!(restore = %log.id, error = %e, "could not record restore failure");
            }
        }
    }
}

// ── Handlers ──────────────────────────────────────────────────────────────

/// GET /api/backups
pub(crate) async fn handle_list_backups(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<ApiEnvelope<Vec<BackupJob>>>> {
    require_admin(&user)?;
    let (data, pagination) = page.apply(state.storage.list_backups().await?);
    Ok(Json(ApiEnvelope::paginated("", data, pagination)))
}

/// GET /api/backups/{id}
pub(crate) async fn handle_get_backup(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiEnvelope<BackupJob>>> {
    require_admin(&user)?;
    Ok(Json(ApiEnvelope::success(
        "",
        state.storage.get_backup(&id).await?,
    )))
}

/// POST /api/backups
pub(crate) async fn handle_create_backup(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Extension(ClientIp(ip)): Extension<ClientIp>,
    body: Option<Json<BackupRequest>>,
) -> ApiResult<Json<ApiEnvelope<BackupJob>>> {
    require_admin(&user)?;
    let req = body.map(|Json(b)| b).unwrap_or_default();
    let job = BackupJob {
        id: uuid::Uuid::new_v4().to_string(),
        status: BackupStatus::Pending,
        description: req.description.filter(|d| !d.trim().is_empty()),
        totals: BackupTotals::default(),
        checksum: None,
        duration_ms: None,
        error: None,
        created_by: user.id.clone(),
        created_at: clock::now(),
        completed_at: None,
    };
    state.storage.insert_backup(job.clone()).await?;
    state
        .audit(
            Some(&user),
            "BACKUP",
            "backup",
            Some(&job.id),
            serde_json::Value::Null,
            ip,
        )
        .await;
    tokio::spawn(run_backup(state.clone(), job.clone()));
    Ok(Json(ApiEnvelope::success("Respaldo iniciado", job)))
}

/// POST /api/backups/{id}/restore
pub(crate) async fn handle_create_restore(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Extension(ClientIp(ip)): Extension<ClientIp>,
    Path(backup_id): Path<String>,
) -> ApiResult<Json<ApiEnvelope<RestoreLog>>> {
    require_admin(&user)?;
    let backup = state.storage.get_backup(&backup_id).await?;
    if backup.status != BackupStatus::Completed {
        return Err(ApiError::conflict("El respaldo no está completado"));
    }
    let log = RestoreLog {
        id: uuid::Uuid::new_v4().to_string(),
        backup_id,
        status: RestoreStatus::Pending,
        restored_records: 0,
        skipped_records: 0,
        restored_files: 0,
        skipped_files: 0,
        error: None,
        created_by: user.id.clone(),
        created_at: clock::now(),
        completed_at: None,
    };
    state.storage.insert_restore(log.clone()).await?;
    state
        .audit(
            Some(&user),
            "RESTORE",
            "restore",
            Some(&log.id),
            serde_json::json!({"backupId": log.backup_id}),
            ip,
        )
        .await;
    tokio::spawn(run_restore(state.clone(), log.clone()));
    Ok(Json(ApiEnvelope::success("Restauración iniciada", log)))
}

/// GET /api/restores
pub(crate) async fn handle_list_restores(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<ApiEnvelope<Vec<RestoreLog>>>> {
    require_admin(&user)?;
    let (data, pagination) = page.apply(state.storage.list_restores().await?);
    Ok(Json(ApiEnvelope::paginated("", data, pagination)))
}

/// GET /api/restores/{id}
pub(crate) async fn handle_get_restore(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiEnvelope<RestoreLog>>> {
    require_admin(&user)?;
    Ok(Json(ApiEnvelope::success(
        "",
        state.storage.get_restore(&id).await?,
    )))
}
