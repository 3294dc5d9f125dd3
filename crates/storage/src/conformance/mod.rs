//! Conformance test suite for `ArchiveStorage` implementations.
//!
//! This module provides a backend-agnostic test suite that any
//! `ArchiveStorage` implementation can run to verify correctness. The suite
//! covers:
//!
//! - **Records**: insert / get / update / delete, duplicate and not-found errors
//! - **References**: documents need their archivador, deletes refuse while
//!   children exist, signatures pin their document
//! - **Versions**: exactly one current version per document
//! - **Export / import**: a full copy round-trips into an empty store and is
//!   skipped entirely when replayed over the source
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory function that
//! creates a fresh, empty storage instance for each test:
//!
//! ```ignore
//! use siad_storage::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn postgres_conformance() {
//!     let report = run_conformance_suite(|| async {
//!         create_test_postgres_storage().await
//!     }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod records;
mod references;
mod transfer;
mod versions;

use std::fmt;
use std::future::Future;

use siad_core::model::{
    Archivador, CertificateData, Document, OcrStatus, Role, Signature, SignatureData,
    SignatureStatus, User, Version,
};

use crate::record::UserRecord;
use crate::ArchiveStorage;

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "records", "versions").
    pub category: String,
    /// Test name (e.g. "insert_then_get_returns_record").
    pub name: String,
    /// Whether the test passed.
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: result.is_ok(),
            message: result.err(),
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a storage backend.
///
/// The `factory` function is called once per test to create a fresh, empty
/// storage instance, ensuring test isolation.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: ArchiveStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(records::run_record_tests(&factory).await);
    results.extend(references::run_reference_tests(&factory).await);
    results.extend(versions::run_version_tests(&factory).await);
    results.extend(transfer::run_transfer_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers: record constructors with sensible defaults ──────────────────────

const T0: &str = "2026-01-01T00:00:00Z";

fn make_user(id: &str, email: &str) -> UserRecord {
    UserRecord {
        user: User {
            id: id.to_string(),
            email: email.to_string(),
            name: format!("User {id}"),
            role: Role::Archivist,
            is_active: true,
            created_at: T0.to_string(),
        },
        password_hash: "sha256$1$00$00".to_string(),
    }
}

fn make_archivador(id: &str, code: &str) -> Archivador {
    Archivador {
        id: id.to_string(),
        code: code.to_string(),
        name: format!("Archivador {code}"),
        period: 2025,
        office: "Mesa de partes".to_string(),
        description: None,
        created_by: "u1".to_string(),
        created_at: T0.to_string(),
        updated_at: T0.to_string(),
        document_count: 0,
    }
}

fn make_document(id: &str, archivador_id: &str) -> Document {
    Document {
        id: id.to_string(),
        title: format!("Oficio {id}"),
        document_number: format!("OF-{id}"),
        archivador_id: archivador_id.to_string(),
        expediente_id: None,
        typology_id: None,
        ocr_status: OcrStatus::Pending,
        ocr_text: None,
        file: None,
        created_by: "u1".to_string(),
        created_at: T0.to_string(),
        updated_at: T0.to_string(),
    }
}

fn make_signature(id: &str, document_id: &str) -> Signature {
    Signature {
        id: id.to_string(),
        document_id: document_id.to_string(),
        signer_id: "u1".to_string(),
        flow_id: None,
        signature_data: SignatureData {
            algorithm: "Ed25519".to_string(),
            value: "c2ln".to_string(),
            format: "detached".to_string(),
        },
        certificate_data: CertificateData {
            subject: "CN=User u1".to_string(),
            issuer: "CN=SIAD".to_string(),
            serial_number: "01".to_string(),
            valid_from: T0.to_string(),
            valid_to: "2027-01-01T00:00:00Z".to_string(),
        },
        status: SignatureStatus::Valid,
        is_valid: true,
        is_reverted: false,
        reverted_at: None,
        reverted_by: None,
        revert_reason: None,
        signed_at: T0.to_string(),
    }
}

fn make_version(id: &str, document_id: &str, number: u32) -> Version {
    Version {
        id: id.to_string(),
        document_id: document_id.to_string(),
        version_number: number,
        file_sha256: None,
        active_signatures: 0,
        reverted_signatures: 0,
        is_current: true,
        reason: "test".to_string(),
        created_by: "u1".to_string(),
        created_at: T0.to_string(),
    }
}

/// Fresh store holding one archivador (`a1`) and one document (`d1`) in it.
async fn store_with_document<S, F, Fut>(factory: &F) -> Result<S, String>
where
    S: ArchiveStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.insert_archivador(make_archivador("a1", "ARC-001"))
        .await
        .map_err(|e| e.to_string())?;
    s.insert_document(make_document("d1", "a1"))
        .await
        .map_err(|e| e.to_string())?;
    Ok(s)
}
