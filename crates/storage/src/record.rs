use serde::{Deserialize, Serialize};

use siad_core::model::{
    Archivador, AuditLog, Document, Expediente, FlowStatus, OcrStatus, Signature, SignatureFlow,
    SystemConfig, Typology, User, Version,
};

/// A user together with its stored password hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub user: User,
    pub password_hash: String,
}

/// Raw bytes of a document's stored file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileBlob {
    pub document_id: String,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

/// Filters for document listings. `None` means "any".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentFilter {
    pub archivador_id: Option<String>,
    pub expediente_id: Option<String>,
    pub typology_id: Option<String>,
    pub ocr_status: Option<OcrStatus>,
    /// Case-insensitive match on title or document number.
    pub search: Option<String>,
}

impl DocumentFilter {
    pub fn matches(&self, doc: &Document) -> bool {
        if let Some(id) = &self.archivador_id {
            if &doc.archivador_id != id {
                return false;
            }
        }
        if let Some(id) = &self.expediente_id {
            if doc.expediente_id.as_ref() != Some(id) {
                return false;
            }
        }
        if let Some(id) = &self.typology_id {
            if doc.typology_id.as_ref() != Some(id) {
                return false;
            }
        }
        if let Some(status) = self.ocr_status {
            if doc.ocr_status != status {
                return false;
            }
        }
        if let Some(term) = &self.search {
            let term = term.to_lowercase();
            if !doc.title.to_lowercase().contains(&term)
                && !doc.document_number.to_lowercase().contains(&term)
            {
                return false;
            }
        }
        true
    }
}

/// Filters for signature listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignatureFilter {
    pub document_id: Option<String>,
    pub signer_id: Option<String>,
}

/// Filters for flow listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowFilter {
    pub status: Option<FlowStatus>,
    pub document_id: Option<String>,
    /// Only flows in which this user is a signer.
    pub signer_id: Option<String>,
}

/// Filters for audit listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditFilter {
    pub user_id: Option<String>,
    pub action: Option<String>,
    pub entity_type: Option<String>,
}

impl AuditFilter {
    pub fn matches(&self, entry: &AuditLog) -> bool {
        self.user_id
            .as_ref()
            .map_or(true, |u| entry.user_id.as_ref() == Some(u))
            && self.action.as_ref().map_or(true, |a| &entry.action == a)
            && self
                .entity_type
                .as_ref()
                .map_or(true, |t| &entry.entity_type == t)
    }
}

/// Every persisted record except stored files and job bookkeeping.
///
/// This is the unit a backup packages and a restore replays.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveRecords {
    pub users: Vec<UserRecord>,
    pub archivadores: Vec<Archivador>,
    pub expedientes: Vec<Expediente>,
    pub typologies: Vec<Typology>,
    pub documents: Vec<Document>,
    pub versions: Vec<Version>,
    pub signatures: Vec<Signature>,
    pub flows: Vec<SignatureFlow>,
    pub audit: Vec<AuditLog>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<SystemConfig>,
}

impl ArchiveRecords {
    /// Number of records, counting the config as one when present.
    pub fn len(&self) -> u64 {
        (self.users.len()
            + self.archivadores.len()
            + self.expedientes.len()
            + self.typologies.len()
            + self.documents.len()
            + self.versions.len()
            + self.signatures.len()
            + self.flows.len()
            + self.audit.len()
            + usize::from(self.config.is_some())) as u64
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Outcome of replaying records or files into a store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportCounts {
    pub restored: u64,
    pub skipped: u64,
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&BASE64.encode(bytes))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let raw = String::deserialize(d)?;
        BASE64.decode(raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_blob_serializes_as_base64() {
        let blob = FileBlob {
            document_id: "d1".to_string(),
            data: b"hola".to_vec(),
        };
        let json = serde_json::to_value(&blob).unwrap();
        assert_eq!(json["data"], "aG9sYQ==");
        let back: FileBlob = serde_json::from_value(json).unwrap();
        assert_eq!(back.data, b"hola");
    }
}
