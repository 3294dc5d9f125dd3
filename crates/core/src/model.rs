//! Entities as exposed over the REST API.
//!
//! Field names serialize in camelCase and status enums as upper-case string
//! literals, matching what the dashboard consumes.

use serde::{Deserialize, Serialize};

use crate::jobs::{BackupStatus, RestoreStatus};

// ──────────────────────────────────────────────
// Users
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Archivist,
    Signer,
    Viewer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Archivist => "ARCHIVIST",
            Role::Signer => "SIGNER",
            Role::Viewer => "VIEWER",
        }
    }

    /// Whether this role may create or edit archive content.
    pub fn can_write(&self) -> bool {
        matches!(self, Role::Admin | Role::Archivist)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: String,
}

// ──────────────────────────────────────────────
// Archive structure
// ──────────────────────────────────────────────

/// A folder grouping documents by period and office.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Archivador {
    pub id: String,
    pub code: String,
    pub name: String,
    pub period: i32,
    pub office: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub document_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExpedienteStatus {
    Open,
    Closed,
    Archived,
}

impl ExpedienteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpedienteStatus::Open => "OPEN",
            ExpedienteStatus::Closed => "CLOSED",
            ExpedienteStatus::Archived => "ARCHIVED",
        }
    }
}

/// A case file grouping related documents across archivadores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expediente {
    pub id: String,
    pub code: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: ExpedienteStatus,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub document_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Typology {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// ──────────────────────────────────────────────
// Documents
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OcrStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

impl OcrStatus {
    pub const ALL: [OcrStatus; 4] = [
        OcrStatus::Pending,
        OcrStatus::Processing,
        OcrStatus::Completed,
        OcrStatus::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OcrStatus::Pending => "PENDING",
            OcrStatus::Processing => "PROCESSING",
            OcrStatus::Completed => "COMPLETED",
            OcrStatus::Error => "ERROR",
        }
    }

    /// Display label used on status badges.
    pub fn label(&self) -> &'static str {
        match self {
            OcrStatus::Pending => "Pendiente",
            OcrStatus::Processing => "Procesando",
            OcrStatus::Completed => "Completado",
            OcrStatus::Error => "Error",
        }
    }

    /// OCR moves forward through processing; a failed run may be queued again.
    pub fn can_transition_to(&self, next: OcrStatus) -> bool {
        matches!(
            (self, next),
            (OcrStatus::Pending, OcrStatus::Processing)
                | (OcrStatus::Processing, OcrStatus::Completed)
                | (OcrStatus::Processing, OcrStatus::Error)
                | (OcrStatus::Error, OcrStatus::Pending)
        )
    }
}

/// Stored file attached to a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRef {
    pub name: String,
    pub mime_type: String,
    pub size: u64,
    pub sha256: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub title: String,
    pub document_number: String,
    pub archivador_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expediente_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typology_id: Option<String>,
    pub ocr_status: OcrStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocr_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileRef>,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Document {
    pub fn file_sha256(&self) -> Option<&str> {
        self.file.as_ref().map(|f| f.sha256.as_str())
    }
}

// ──────────────────────────────────────────────
// Signatures
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl FlowStatus {
    pub const ALL: [FlowStatus; 4] = [
        FlowStatus::Pending,
        FlowStatus::InProgress,
        FlowStatus::Completed,
        FlowStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FlowStatus::Pending => "PENDING",
            FlowStatus::InProgress => "IN_PROGRESS",
            FlowStatus::Completed => "COMPLETED",
            FlowStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, FlowStatus::Completed | FlowStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignerStatus {
    Pending,
    Signed,
    Rejected,
}

/// One signer slot in a signature flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignerFlowData {
    pub user_id: String,
    pub order: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signed_at: Option<String>,
    pub status: SignerStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_id: Option<String>,
}

/// Ordered, multi-signer signing workflow for one document.
///
/// The `progress_percent`, `signed_count` and `total_signers` fields are
/// derived; [`SignatureFlow::refresh_progress`] recomputes them after every
/// mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureFlow {
    pub id: String,
    pub name: String,
    pub document_id: String,
    pub signers: Vec<SignerFlowData>,
    pub current_order: u32,
    pub status: FlowStatus,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub progress_percent: u32,
    #[serde(default)]
    pub signed_count: u32,
    #[serde(default)]
    pub total_signers: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignatureStatus {
    Pending,
    Valid,
    Invalid,
    Indeterminate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureData {
    pub algorithm: String,
    pub value: String,
    pub format: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateData {
    pub subject: String,
    pub issuer: String,
    pub serial_number: String,
    pub valid_from: String,
    pub valid_to: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signature {
    pub id: String,
    pub document_id: String,
    pub signer_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow_id: Option<String>,
    pub signature_data: SignatureData,
    pub certificate_data: CertificateData,
    pub status: SignatureStatus,
    pub is_valid: bool,
    pub is_reverted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reverted_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reverted_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revert_reason: Option<String>,
    pub signed_at: String,
}

/// Immutable snapshot of a document at a version number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Version {
    pub id: String,
    pub document_id: String,
    pub version_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_sha256: Option<String>,
    pub active_signatures: u32,
    pub reverted_signatures: u32,
    pub is_current: bool,
    pub reason: String,
    pub created_by: String,
    pub created_at: String,
}

// ──────────────────────────────────────────────
// Backup / restore
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupTotals {
    pub documents: u64,
    pub versions: u64,
    pub signatures: u64,
    pub files: u64,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupJob {
    pub id: String,
    pub status: BackupStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub totals: BackupTotals,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_by: String,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreLog {
    pub id: String,
    pub backup_id: String,
    pub status: RestoreStatus,
    pub restored_records: u64,
    pub skipped_records: u64,
    pub restored_files: u64,
    pub skipped_files: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_by: String,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}

// ──────────────────────────────────────────────
// Audit and configuration
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLog {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub action: String,
    pub entity_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    #[serde(default)]
    pub details: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    pub created_at: String,
}

/// Branding configuration shown on the login page and dashboard chrome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemConfig {
    pub institution_name: String,
    pub system_name: String,
    pub primary_color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon_url: Option<String>,
    pub updated_at: String,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            institution_name: "Dirección Regional de Salud".to_string(),
            system_name: "Sistema Integrado de Archivos Digitales".to_string(),
            primary_color: "#0f766e".to_string(),
            logo_url: None,
            favicon_url: None,
            updated_at: "1970-01-01T00:00:00Z".to_string(),
        }
    }
}

impl SystemConfig {
    /// Configured favicon URL, ignoring blank values.
    pub fn favicon(&self) -> Option<&str> {
        self.favicon_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
    }
}
