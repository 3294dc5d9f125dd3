use async_trait::async_trait;

use siad_core::model::{
    Archivador, AuditLog, BackupJob, Document, Expediente, RestoreLog, Signature, SignatureFlow,
    SystemConfig, Typology, Version,
};

use crate::error::StorageError;
use crate::record::{
    ArchiveRecords, AuditFilter, DocumentFilter, FileBlob, FlowFilter, ImportCounts,
    SignatureFilter, UserRecord,
};

/// The storage trait for SIAD archive backends.
///
/// An `ArchiveStorage` implementation persists users, the archive structure
/// (archivadores, expedientes, typologies, documents and their files), the
/// signature trail (signatures, versions, flows), the audit log, branding
/// configuration and backup / restore bookkeeping.
///
/// ## Atomicity
///
/// Every method is atomic on its own. Callers that need several writes to
/// appear together (sign + new version + flow update) sequence them under
/// their own lock; the backend only guarantees the per-call invariants
/// documented below.
///
/// ## Version invariant
///
/// `insert_version` makes the inserted version the current one: every other
/// version of the same document has `is_current` cleared in the same call.
/// At most one version per document is current at any time.
///
/// ## Signatures are never deleted
///
/// There is no `delete_signature`. Revert is an `update_signature`.
///
/// ## Listing order
///
/// Unless stated otherwise lists are newest first by `created_at`.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` to be used in axum
/// application state and across async task boundaries.
#[async_trait]
pub trait ArchiveStorage: Send + Sync + 'static {
    // ── Users ─────────────────────────────────────────────────────────────────

    /// Returns `Duplicate` if the id or the (case-insensitive) email is taken.
    async fn insert_user(&self, record: UserRecord) -> Result<(), StorageError>;

    async fn get_user(&self, id: &str) -> Result<UserRecord, StorageError>;

    /// Case-insensitive lookup by email.
    async fn find_user_by_email(&self, email: &str) -> Result<UserRecord, StorageError>;

    async fn update_user(&self, record: UserRecord) -> Result<(), StorageError>;

    async fn list_users(&self) -> Result<Vec<UserRecord>, StorageError>;

    // ── Archivadores ─────────────────────────────────────────────────────────

    /// Returns `Duplicate` if the id or code is taken.
    async fn insert_archivador(&self, archivador: Archivador) -> Result<(), StorageError>;

    async fn get_archivador(&self, id: &str) -> Result<Archivador, StorageError>;

    async fn update_archivador(&self, archivador: Archivador) -> Result<(), StorageError>;

    /// Returns `Conflict` while any document references the archivador.
    async fn delete_archivador(&self, id: &str) -> Result<(), StorageError>;

    async fn list_archivadores(&self) -> Result<Vec<Archivador>, StorageError>;

    // ── Expedientes ──────────────────────────────────────────────────────────

    /// Returns `Duplicate` if the id or code is taken.
    async fn insert_expediente(&self, expediente: Expediente) -> Result<(), StorageError>;

    async fn get_expediente(&self, id: &str) -> Result<Expediente, StorageError>;

    async fn update_expediente(&self, expediente: Expediente) -> Result<(), StorageError>;

    /// Returns `Conflict` while any document references the expediente.
    async fn delete_expediente(&self, id: &str) -> Result<(), StorageError>;

    async fn list_expedientes(&self) -> Result<Vec<Expediente>, StorageError>;

    // ── Typologies ───────────────────────────────────────────────────────────

    async fn insert_typology(&self, typology: Typology) -> Result<(), StorageError>;

    /// Sorted by name.
    async fn list_typologies(&self) -> Result<Vec<Typology>, StorageError>;

    // ── Documents and files ──────────────────────────────────────────────────

    /// FK: `archivador_id` must exist; `expediente_id` and `typology_id`
    /// must exist when set. Violations are `Conflict`.
    async fn insert_document(&self, document: Document) -> Result<(), StorageError>;

    async fn get_document(&self, id: &str) -> Result<Document, StorageError>;

    /// Same FK rules as `insert_document`.
    async fn update_document(&self, document: Document) -> Result<(), StorageError>;

    /// Returns `Conflict` while signatures reference the document. Removes
    /// the stored file and the document's versions.
    async fn delete_document(&self, id: &str) -> Result<(), StorageError>;

    async fn list_documents(&self, filter: &DocumentFilter)
        -> Result<Vec<Document>, StorageError>;

    /// Store (or replace) the file bytes for a document.
    async fn put_file(&self, blob: FileBlob) -> Result<(), StorageError>;

    async fn get_file(&self, document_id: &str) -> Result<FileBlob, StorageError>;

    async fn list_files(&self) -> Result<Vec<FileBlob>, StorageError>;

    // ── Signatures, versions and flows ───────────────────────────────────────

    async fn insert_signature(&self, signature: Signature) -> Result<(), StorageError>;

    async fn get_signature(&self, id: &str) -> Result<Signature, StorageError>;

    async fn update_signature(&self, signature: Signature) -> Result<(), StorageError>;

    async fn list_signatures(
        &self,
        filter: &SignatureFilter,
    ) -> Result<Vec<Signature>, StorageError>;

    /// Insert a version and make it the document's only current version.
    async fn insert_version(&self, version: Version) -> Result<(), StorageError>;

    /// Versions of a document, ascending by `version_number`.
    async fn list_versions(&self, document_id: &str) -> Result<Vec<Version>, StorageError>;

    async fn insert_flow(&self, flow: SignatureFlow) -> Result<(), StorageError>;

    async fn get_flow(&self, id: &str) -> Result<SignatureFlow, StorageError>;

    async fn update_flow(&self, flow: SignatureFlow) -> Result<(), StorageError>;

    async fn list_flows(&self, filter: &FlowFilter) -> Result<Vec<SignatureFlow>, StorageError>;

    // ── Audit ────────────────────────────────────────────────────────────────

    async fn append_audit(&self, entry: AuditLog) -> Result<(), StorageError>;

    async fn list_audit(&self, filter: &AuditFilter) -> Result<Vec<AuditLog>, StorageError>;

    // ── Configuration ────────────────────────────────────────────────────────

    /// The stored configuration, or the default when none was saved yet.
    async fn get_config(&self) -> Result<SystemConfig, StorageError>;

    async fn put_config(&self, config: SystemConfig) -> Result<(), StorageError>;

    // ── Backup / restore bookkeeping ─────────────────────────────────────────

    async fn insert_backup(&self, job: BackupJob) -> Result<(), StorageError>;

    async fn update_backup(&self, job: BackupJob) -> Result<(), StorageError>;

    async fn get_backup(&self, id: &str) -> Result<BackupJob, StorageError>;

    async fn list_backups(&self) -> Result<Vec<BackupJob>, StorageError>;

    /// Store the packaged archive produced by a backup job.
    async fn put_backup_archive(&self, backup_id: &str, bytes: Vec<u8>)
        -> Result<(), StorageError>;

    async fn get_backup_archive(&self, backup_id: &str) -> Result<Vec<u8>, StorageError>;

    async fn insert_restore(&self, log: RestoreLog) -> Result<(), StorageError>;

    async fn update_restore(&self, log: RestoreLog) -> Result<(), StorageError>;

    async fn get_restore(&self, id: &str) -> Result<RestoreLog, StorageError>;

    async fn list_restores(&self) -> Result<Vec<RestoreLog>, StorageError>;

    // ── Export / import ──────────────────────────────────────────────────────

    /// Consistent copy of every archive record.
    async fn export_records(&self) -> Result<ArchiveRecords, StorageError>;

    /// Insert every record whose id is absent; count the others as skipped.
    /// The config counts as restored only when none was stored. An imported
    /// version stays current only if its document has no current version.
    async fn import_records(&self, records: ArchiveRecords) -> Result<ImportCounts, StorageError>;

    /// Insert every file whose document has no stored file yet.
    async fn import_files(&self, files: Vec<FileBlob>) -> Result<ImportCounts, StorageError>;
}
