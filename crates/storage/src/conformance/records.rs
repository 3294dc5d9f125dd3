use std::future::Future;

use super::{make_archivador, make_document, make_user, store_with_document, TestResult};
use crate::record::{AuditFilter, DocumentFilter};
use crate::{ArchiveStorage, StorageError};

use siad_core::model::{AuditLog, OcrStatus};

pub(super) async fn run_record_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: ArchiveStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "records",
            "insert_then_get_returns_record",
            insert_then_get_returns_record(factory).await,
        ),
        TestResult::from_result(
            "records",
            "duplicate_user_email_rejected",
            duplicate_user_email_rejected(factory).await,
        ),
        TestResult::from_result(
            "records",
            "email_lookup_is_case_insensitive",
            email_lookup_is_case_insensitive(factory).await,
        ),
        TestResult::from_result(
            "records",
            "duplicate_archivador_code_rejected",
            duplicate_archivador_code_rejected(factory).await,
        ),
        TestResult::from_result(
            "records",
            "missing_record_is_not_found",
            missing_record_is_not_found(factory).await,
        ),
        TestResult::from_result(
            "records",
            "update_missing_record_is_not_found",
            update_missing_record_is_not_found(factory).await,
        ),
        TestResult::from_result(
            "records",
            "archivador_document_count_is_derived",
            archivador_document_count_is_derived(factory).await,
        ),
        TestResult::from_result(
            "records",
            "document_filter_applies",
            document_filter_applies(factory).await,
        ),
        TestResult::from_result(
            "records",
            "audit_filter_and_order",
            audit_filter_and_order(factory).await,
        ),
        TestResult::from_result(
            "records",
            "config_defaults_until_saved",
            config_defaults_until_saved(factory).await,
        ),
    ]
}

// ── Test implementations ──────────────────────────────────────────────────────

/// A stored document reads back identically.
async fn insert_then_get_returns_record<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ArchiveStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = store_with_document(factory).await?;
    let doc = s.get_document("d1").await.map_err(|e| e.to_string())?;
    if doc != make_document("d1", "a1") {
        return Err(format!("document changed on round trip: {:?}", doc));
    }
    Ok(())
}

async fn duplicate_user_email_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ArchiveStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.insert_user(make_user("u1", "ana@salud.gob"))
        .await
        .map_err(|e| e.to_string())?;
    match s.insert_user(make_user("u2", "ANA@salud.gob")).await {
        Err(StorageError::Duplicate { kind: "user", .. }) => Ok(()),
        other => Err(format!("expected Duplicate user, got {:?}", other)),
    }
}

async fn email_lookup_is_case_insensitive<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ArchiveStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.insert_user(make_user("u1", "Luis@Salud.gob"))
        .await
        .map_err(|e| e.to_string())?;
    let found = s
        .find_user_by_email("luis@salud.gob")
        .await
        .map_err(|e| e.to_string())?;
    if found.user.id != "u1" {
        return Err(format!("expected u1, got {}", found.user.id));
    }
    Ok(())
}

async fn duplicate_archivador_code_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ArchiveStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.insert_archivador(make_archivador("a1", "ARC-001"))
        .await
        .map_err(|e| e.to_string())?;
    match s.insert_archivador(make_archivador("a2", "ARC-001")).await {
        Err(StorageError::Duplicate { .. }) => Ok(()),
        other => Err(format!("expected Duplicate, got {:?}", other)),
    }
}

async fn missing_record_is_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ArchiveStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.get_document("nope").await {
        Err(StorageError::NotFound { kind: "document", id }) if id == "nope" => {}
        other => return Err(format!("expected NotFound document, got {:?}", other)),
    }
    match s.get_flow("nope").await {
        Err(StorageError::NotFound { .. }) => Ok(()),
        other => Err(format!("expected NotFound flow, got {:?}", other)),
    }
}

async fn update_missing_record_is_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ArchiveStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.update_archivador(make_archivador("ghost", "ARC-404")).await {
        Err(StorageError::NotFound { .. }) => Ok(()),
        other => Err(format!("expected NotFound, got {:?}", other)),
    }
}

async fn archivador_document_count_is_derived<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ArchiveStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = store_with_document(factory).await?;
    s.insert_document(make_document("d2", "a1"))
        .await
        .map_err(|e| e.to_string())?;
    let a = s.get_archivador("a1").await.map_err(|e| e.to_string())?;
    if a.document_count != 2 {
        return Err(format!("expected 2 documents, got {}", a.document_count));
    }
    let listed = s.list_archivadores().await.map_err(|e| e.to_string())?;
    if listed.first().map(|a| a.document_count) != Some(2) {
        return Err("listed archivador lacks derived count".to_string());
    }
    Ok(())
}

async fn document_filter_applies<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ArchiveStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = store_with_document(factory).await?;
    let mut other = make_document("d2", "a1");
    other.title = "Memorando múltiple".to_string();
    other.ocr_status = OcrStatus::Completed;
    s.insert_document(other).await.map_err(|e| e.to_string())?;

    let by_status = s
        .list_documents(&DocumentFilter {
            ocr_status: Some(OcrStatus::Completed),
            ..Default::default()
        })
        .await
        .map_err(|e| e.to_string())?;
    if by_status.len() != 1 || by_status[0].id != "d2" {
        return Err(format!("status filter returned {:?}", by_status));
    }

    let by_search = s
        .list_documents(&DocumentFilter {
            search: Some("memorando".to_string()),
            ..Default::default()
        })
        .await
        .map_err(|e| e.to_string())?;
    if by_search.len() != 1 {
        return Err(format!("search returned {} documents", by_search.len()));
    }
    Ok(())
}

async fn audit_filter_and_order<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ArchiveStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    for (id, action, at) in [
        ("e1", "CREATE", "2026-01-01T00:00:00Z"),
        ("e2", "DELETE", "2026-01-02T00:00:00Z"),
        ("e3", "CREATE", "2026-01-03T00:00:00Z"),
    ] {
        s.append_audit(AuditLog {
            id: id.to_string(),
            user_id: Some("u1".to_string()),
            action: action.to_string(),
            entity_type: "document".to_string(),
            entity_id: None,
            details: serde_json::Value::Null,
            ip_address: None,
            created_at: at.to_string(),
        })
        .await
        .map_err(|e| e.to_string())?;
    }
    let creates = s
        .list_audit(&AuditFilter {
            action: Some("CREATE".to_string()),
            ..Default::default()
        })
        .await
        .map_err(|e| e.to_string())?;
    let ids: Vec<&str> = creates.iter().map(|e| e.id.as_str()).collect();
    if ids != ["e3", "e1"] {
        return Err(format!("expected [e3, e1], got {:?}", ids));
    }
    Ok(())
}

async fn config_defaults_until_saved<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ArchiveStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut config = s.get_config().await.map_err(|e| e.to_string())?;
    if config.favicon_url.is_some() {
        return Err("default config should not carry a favicon".to_string());
    }
    config.system_name = "SIAD".to_string();
    s.put_config(config).await.map_err(|e| e.to_string())?;
    let saved = s.get_config().await.map_err(|e| e.to_string())?;
    if saved.system_name != "SIAD" {
        return Err(format!("config not saved: {}", saved.system_name));
    }
    Ok(())
}
