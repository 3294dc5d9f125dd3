use std::future::Future;

use super::{make_archivador, make_document, make_signature, store_with_document, TestResult};
use crate::{ArchiveStorage, StorageError};

use siad_core::model::{Expediente, ExpedienteStatus, SignatureFlow};

pub(super) async fn run_reference_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: ArchiveStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "references",
            "document_requires_archivador",
            document_requires_archivador(factory).await,
        ),
        TestResult::from_result(
            "references",
            "document_requires_known_expediente",
            document_requires_known_expediente(factory).await,
        ),
        TestResult::from_result(
            "references",
            "archivador_delete_blocked_by_documents",
            archivador_delete_blocked_by_documents(factory).await,
        ),
        TestResult::from_result(
            "references",
            "expediente_delete_blocked_by_documents",
            expediente_delete_blocked_by_documents(factory).await,
        ),
        TestResult::from_result(
            "references",
            "document_delete_blocked_by_signatures",
            document_delete_blocked_by_signatures(factory).await,
        ),
        TestResult::from_result(
            "references",
            "document_delete_drops_file_and_versions",
            document_delete_drops_file_and_versions(factory).await,
        ),
        TestResult::from_result(
            "references",
            "signature_and_flow_require_document",
            signature_and_flow_require_document(factory).await,
        ),
    ]
}

fn make_expediente(id: &str) -> Expediente {
    Expediente {
        id: id.to_string(),
        code: format!("EXP-{id}"),
        title: format!("Expediente {id}"),
        description: None,
        status: ExpedienteStatus::Open,
        created_by: "u1".to_string(),
        created_at: super::T0.to_string(),
        updated_at: super::T0.to_string(),
        document_count: 0,
    }
}

fn expect_conflict(result: Result<(), StorageError>, what: &str) -> Result<(), String> {
    match result {
        Err(StorageError::Conflict(_)) => Ok(()),
        other => Err(format!("{what}: expected Conflict, got {:?}", other)),
    }
}

// ── Test implementations ──────────────────────────────────────────────────────

async fn document_requires_archivador<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ArchiveStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    expect_conflict(
        s.insert_document(make_document("d1", "missing")).await,
        "orphan document",
    )
}

async fn document_requires_known_expediente<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ArchiveStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = store_with_document(factory).await?;
    let mut doc = s.get_document("d1").await.map_err(|e| e.to_string())?;
    doc.expediente_id = Some("e404".to_string());
    expect_conflict(s.update_document(doc).await, "unknown expediente")
}

async fn archivador_delete_blocked_by_documents<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ArchiveStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = store_with_document(factory).await?;
    expect_conflict(s.delete_archivador("a1").await, "delete a1")?;

    // An archivador without documents goes away.
    s.insert_archivador(make_archivador("a2", "ARC-002"))
        .await
        .map_err(|e| e.to_string())?;
    s.delete_archivador("a2").await.map_err(|e| e.to_string())?;
    match s.get_archivador("a2").await {
        Err(StorageError::NotFound { .. }) => Ok(()),
        other => Err(format!("a2 should be gone, got {:?}", other)),
    }
}

async fn expediente_delete_blocked_by_documents<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ArchiveStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = store_with_document(factory).await?;
    s.insert_expediente(make_expediente("e1"))
        .await
        .map_err(|e| e.to_string())?;
    let mut doc = s.get_document("d1").await.map_err(|e| e.to_string())?;
    doc.expediente_id = Some("e1".to_string());
    s.update_document(doc).await.map_err(|e| e.to_string())?;

    let e = s.get_expediente("e1").await.map_err(|e| e.to_string())?;
    if e.document_count != 1 {
        return Err(format!("expected 1 document, got {}", e.document_count));
    }
    expect_conflict(s.delete_expediente("e1").await, "delete e1")
}

async fn document_delete_blocked_by_signatures<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ArchiveStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = store_with_document(factory).await?;
    s.insert_signature(make_signature("s1", "d1"))
        .await
        .map_err(|e| e.to_string())?;
    expect_conflict(s.delete_document("d1").await, "delete signed d1")?;
    s.get_document("d1").await.map_err(|e| e.to_string())?;
    Ok(())
}

async fn document_delete_drops_file_and_versions<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ArchiveStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = store_with_document(factory).await?;
    s.put_file(crate::FileBlob {
        document_id: "d1".to_string(),
        data: b"%PDF-1.7".to_vec(),
    })
    .await
    .map_err(|e| e.to_string())?;
    s.insert_version(super::make_version("v1", "d1", 1))
        .await
        .map_err(|e| e.to_string())?;

    s.delete_document("d1").await.map_err(|e| e.to_string())?;

    if s.get_file("d1").await.is_ok() {
        return Err("file survived its document".to_string());
    }
    let versions = s.list_versions("d1").await.map_err(|e| e.to_string())?;
    if !versions.is_empty() {
        return Err(format!("{} version(s) survived", versions.len()));
    }
    Ok(())
}

async fn signature_and_flow_require_document<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ArchiveStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    expect_conflict(
        s.insert_signature(make_signature("s1", "ghost")).await,
        "orphan signature",
    )?;
    let flow = SignatureFlow::new(
        "f1".to_string(),
        "Visto bueno".to_string(),
        "ghost".to_string(),
        &["u1".to_string()],
        "u1".to_string(),
        super::T0,
    )
    .map_err(|e| e.to_string())?;
    expect_conflict(s.insert_flow(flow).await, "orphan flow")
}
