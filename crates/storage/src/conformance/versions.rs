use std::future::Future;

use super::{make_version, store_with_document, TestResult};
use crate::ArchiveStorage;

pub(super) async fn run_version_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: ArchiveStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "versions",
            "new_version_becomes_only_current",
            new_version_becomes_only_current(factory).await,
        ),
        TestResult::from_result(
            "versions",
            "versions_listed_ascending",
            versions_listed_ascending(factory).await,
        ),
        TestResult::from_result(
            "versions",
            "current_is_per_document",
            current_is_per_document(factory).await,
        ),
    ]
}

// ── Test implementations ──────────────────────────────────────────────────────

async fn new_version_becomes_only_current<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ArchiveStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = store_with_document(factory).await?;
    s.insert_version(make_version("v1", "d1", 1))
        .await
        .map_err(|e| e.to_string())?;
    // Inserted as non-current on purpose; the store must still promote it.
    let mut v2 = make_version("v2", "d1", 2);
    v2.is_current = false;
    s.insert_version(v2).await.map_err(|e| e.to_string())?;

    let versions = s.list_versions("d1").await.map_err(|e| e.to_string())?;
    let current: Vec<&str> = versions
        .iter()
        .filter(|v| v.is_current)
        .map(|v| v.id.as_str())
        .collect();
    if current != ["v2"] {
        return Err(format!("expected only v2 current, got {:?}", current));
    }
    Ok(())
}

async fn versions_listed_ascending<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ArchiveStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = store_with_document(factory).await?;
    for (id, n) in [("v3", 3), ("v1", 1), ("v2", 2)] {
        s.insert_version(make_version(id, "d1", n))
            .await
            .map_err(|e| e.to_string())?;
    }
    let numbers: Vec<u32> = s
        .list_versions("d1")
        .await
        .map_err(|e| e.to_string())?
        .iter()
        .map(|v| v.version_number)
        .collect();
    if numbers != [1, 2, 3] {
        return Err(format!("expected [1, 2, 3], got {:?}", numbers));
    }
    Ok(())
}

async fn current_is_per_document<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ArchiveStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = store_with_document(factory).await?;
    s.insert_document(super::make_document("d2", "a1"))
        .await
        .map_err(|e| e.to_string())?;
    s.insert_version(make_version("v1", "d1", 1))
        .await
        .map_err(|e| e.to_string())?;
    s.insert_version(make_version("w1", "d2", 1))
        .await
        .map_err(|e| e.to_string())?;

    for doc in ["d1", "d2"] {
        let versions = s.list_versions(doc).await.map_err(|e| e.to_string())?;
        if !versions.iter().all(|v| v.is_current) || versions.len() != 1 {
            return Err(format!("{doc} lost its current version: {:?}", versions));
        }
    }
    Ok(())
}
