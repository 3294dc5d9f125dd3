use std::future::Future;

use super::{make_signature, make_user, make_version, store_with_document, TestResult};
use crate::record::FileBlob;
use crate::ArchiveStorage;

pub(super) async fn run_transfer_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: ArchiveStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "transfer",
            "import_into_empty_store_restores_all",
            import_into_empty_store_restores_all(factory).await,
        ),
        TestResult::from_result(
            "transfer",
            "import_over_source_skips_all",
            import_over_source_skips_all(factory).await,
        ),
        TestResult::from_result(
            "transfer",
            "version_history_round_trips",
            version_history_round_trips(factory).await,
        ),
        TestResult::from_result(
            "transfer",
            "imported_version_keeps_existing_current",
            imported_version_keeps_existing_current(factory).await,
        ),
        TestResult::from_result(
            "transfer",
            "files_import_insert_if_absent",
            files_import_insert_if_absent(factory).await,
        ),
    ]
}

/// Source store with a user, archivador, document, version, signature,
/// saved config and one file.
async fn populated_source<S, F, Fut>(factory: &F) -> Result<S, String>
where
    S: ArchiveStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = store_with_document(factory).await?;
    s.insert_user(make_user("u1", "ana@salud.gob"))
        .await
        .map_err(|e| e.to_string())?;
    s.insert_version(make_version("v1", "d1", 1))
        .await
        .map_err(|e| e.to_string())?;
    s.insert_signature(make_signature("s1", "d1"))
        .await
        .map_err(|e| e.to_string())?;
    let config = s.get_config().await.map_err(|e| e.to_string())?;
    s.put_config(config).await.map_err(|e| e.to_string())?;
    s.put_file(FileBlob {
        document_id: "d1".to_string(),
        data: b"%PDF-1.7 body".to_vec(),
    })
    .await
    .map_err(|e| e.to_string())?;
    Ok(s)
}

// ── Test implementations ──────────────────────────────────────────────────────

async fn import_into_empty_store_restores_all<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ArchiveStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let source = populated_source(factory).await?;
    let records = source.export_records().await.map_err(|e| e.to_string())?;
    // user, archivador, document, version, signature, config
    if records.len() != 6 {
        return Err(format!("expected 6 exported records, got {}", records.len()));
    }

    let target = factory().await;
    let counts = target
        .import_records(records.clone())
        .await
        .map_err(|e| e.to_string())?;
    if counts.restored != 6 || counts.skipped != 0 {
        return Err(format!("unexpected counts {:?}", counts));
    }
    let copy = target.export_records().await.map_err(|e| e.to_string())?;
    if copy != records {
        return Err("target export differs from source export".to_string());
    }
    Ok(())
}

async fn import_over_source_skips_all<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ArchiveStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let source = populated_source(factory).await?;
    let records = source.export_records().await.map_err(|e| e.to_string())?;
    let total = records.len();
    let counts = source
        .import_records(records)
        .await
        .map_err(|e| e.to_string())?;
    if counts.restored != 0 || counts.skipped != total {
        return Err(format!(
            "expected 0 restored / {} skipped, got {:?}",
            total, counts
        ));
    }
    Ok(())
}

fn version_flags(versions: &[siad_core::model::Version]) -> Vec<(u32, bool)> {
    let mut flags: Vec<(u32, bool)> = versions
        .iter()
        .map(|v| (v.version_number, v.is_current))
        .collect();
    flags.sort();
    flags
}

async fn version_history_round_trips<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ArchiveStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let source = store_with_document(factory).await?;
    for (id, number) in [("v1", 1), ("v2", 2), ("v3", 3)] {
        source
            .insert_version(make_version(id, "d1", number))
            .await
            .map_err(|e| e.to_string())?;
    }
    let before = version_flags(&source.list_versions("d1").await.map_err(|e| e.to_string())?);
    if before != [(1, false), (2, false), (3, true)] {
        return Err(format!("unexpected source history {:?}", before));
    }

    let records = source.export_records().await.map_err(|e| e.to_string())?;
    let target = factory().await;
    target
        .import_records(records)
        .await
        .map_err(|e| e.to_string())?;
    let after = version_flags(&target.list_versions("d1").await.map_err(|e| e.to_string())?);
    if after != before {
        return Err(format!("history changed in transfer: {:?} -> {:?}", before, after));
    }
    Ok(())
}

async fn imported_version_keeps_existing_current<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ArchiveStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let source = populated_source(factory).await?;
    let mut records = source.export_records().await.map_err(|e| e.to_string())?;
    // A version from the archive that the live store never saw.
    records.versions = vec![make_version("v-archived", "d1", 7)];
    source
        .import_records(records)
        .await
        .map_err(|e| e.to_string())?;

    let versions = source.list_versions("d1").await.map_err(|e| e.to_string())?;
    let current: Vec<&str> = versions
        .iter()
        .filter(|v| v.is_current)
        .map(|v| v.id.as_str())
        .collect();
    if current != ["v1"] {
        return Err(format!("expected v1 to stay current, got {:?}", current));
    }
    Ok(())
}

async fn files_import_insert_if_absent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ArchiveStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let source = populated_source(factory).await?;
    let files = source.list_files().await.map_err(|e| e.to_string())?;

    let again = source
        .import_files(files.clone())
        .await
        .map_err(|e| e.to_string())?;
    if again.restored != 0 || again.skipped != 1 {
        return Err(format!("replay over source: {:?}", again));
    }

    let target = factory().await;
    let records = source.export_records().await.map_err(|e| e.to_string())?;
    target
        .import_records(records)
        .await
        .map_err(|e| e.to_string())?;
    let fresh = target
        .import_files(files)
        .await
        .map_err(|e| e.to_string())?;
    if fresh.restored != 1 || fresh.skipped != 0 {
        return Err(format!("import into empty store: {:?}", fresh));
    }
    let blob = target.get_file("d1").await.map_err(|e| e.to_string())?;
    if blob.data != b"%PDF-1.7 body" {
        return Err("file bytes changed in transfer".to_string());
    }
    Ok(())
}
