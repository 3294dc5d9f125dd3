//! Ed25519 document signing, signature verification and revert.
//!
//! A signature covers `"{documentId}:{fileSha256}:{signerId}:{signedAt}"`,
//! with an empty hash segment when the document has no file. Signing and
//! reverting each append a new current [`Version`] so the history records
//! how many signatures were active at that point.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use ed25519_dalek::{Signature as EdSignature, Signer, SigningKey, Verifier};
use serde::Serialize;

use siad_core::clock;
use siad_core::envelope::{ApiEnvelope, PageQuery};
use siad_core::model::{
    CertificateData, Document, Signature, SignatureData, SignatureFlow, SignatureStatus, User,
    Version,
};
use siad_core::requests::{RevertRequest, SignRequest, SignatureQuery};
use siad_storage::SignatureFilter;

use crate::keygen::key_fingerprint;

use super::auth::{require_admin, require_signer, CurrentUser};
use super::error::{ApiError, ApiResult};
use super::middleware::ClientIp;
use super::state::AppState;

/// Certificates issued at signing time stay valid for one year.
const CERTIFICATE_VALIDITY_DAYS: i64 = 365;

pub(crate) const ALGORITHM: &str = "Ed25519";
const FORMAT: &str = "base64";

/// The server's signing identity.
pub(crate) struct DocumentSigner {
    key: SigningKey,
    fingerprint: String,
}

impl DocumentSigner {
    pub(crate) fn new(key: SigningKey) -> Self {
        let fingerprint = key_fingerprint(&key.verifying_key());
        Self { key, fingerprint }
    }

    /// A signer with a fresh key, for when no key file is configured.
    pub(crate) fn generate() -> Self {
        Self::new(SigningKey::generate(&mut rand::rngs::OsRng))
    }

    pub(crate) fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub(crate) fn sign(
        &self,
        document_id: &str,
        file_sha256: Option<&str>,
        signer_id: &str,
        signed_at: &str,
    ) -> String {
        let payload = signing_payload(document_id, file_sha256, signer_id, signed_at);
        BASE64.encode(self.key.sign(payload.as_bytes()).to_bytes())
    }

    /// Check a stored signature value against the given file hash.
    pub(crate) fn verify(&self, signature: &Signature, file_sha256: Option<&str>) -> bool {
        let Ok(raw) = BASE64.decode(&signature.signature_data.value) else {
            return false;
        };
        let Ok(bytes) = <[u8; 64]>::try_from(raw.as_slice()) else {
            return false;
        };
        let payload = signing_payload(
            &signature.document_id,
            file_sha256,
            &signature.signer_id,
            &signature.signed_at,
        );
        self.key
            .verifying_key()
            .verify(payload.as_bytes(), &EdSignature::from_bytes(&bytes))
            .is_ok()
    }

    fn certificate(&self, user: &User, at: &str) -> CertificateData {
        let valid_to = clock::parse(at)
            .map(|t| clock::format(t + time::Duration::days(CERTIFICATE_VALIDITY_DAYS)))
            .unwrap_or_else(|| at.to_string());
        CertificateData {
            subject: format!("CN={}, E={}", user.name, user.email),
            issuer: format!("CN=SIAD {}", self.fingerprint),
            serial_number: uuid::Uuid::new_v4().simple().to_string(),
            valid_from: at.to_string(),
            valid_to,
        }
    }
}

pub(crate) fn signing_payload(
    document_id: &str,
    file_sha256: Option<&str>,
    signer_id: &str,
    signed_at: &str,
) -> String {
    format!(
        "{}:{}:{}:{}",
        document_id,
        file_sha256.unwrap_or(""),
        signer_id,
        signed_at
    )
}

/// Status a verification yields.
pub(crate) fn verification_status(
    signer: &DocumentSigner,
    signature: &Signature,
    current_sha256: Option<&str>,
) -> SignatureStatus {
    if signature.is_reverted {
        SignatureStatus::Indeterminate
    } else if signer.verify(signature, current_sha256) {
        SignatureStatus::Valid
    } else {
        SignatureStatus::Invalid
    }
}

/// Append a version reflecting the document's current signature counts.
pub(crate) async fn append_version(
    state: &AppState,
    document: &Document,
    reason: String,
    created_by: &str,
) -> ApiResult<Version> {
    let storage = &state.storage;
    let versions = storage.list_versions(&document.id).await?;
    let signatures = storage
        .list_signatures(&SignatureFilter {
            document_id: Some(document.id.clone()),
            signer_id: None,
        })
        .await?;
    let reverted = signatures.iter().filter(|s| s.is_reverted).count() as u32;

    let version = Version {
        id: uuid::Uuid::new_v4().to_string(),
        document_id: document.id.clone(),
        version_number: versions.last().map_or(1, |v| v.version_number + 1),
        file_sha256: document.file_sha256().map(str::to_string),
        active_signatures: signatures.len() as u32 - reverted,
        reverted_signatures: reverted,
        is_current: true,
        reason,
        created_by: created_by.to_string(),
        created_at: clock::now(),
    };
    storage.insert_version(version.clone()).await?;
    Ok(version)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SignOutcome {
    pub(crate) signature: Signature,
    pub(crate) version: Version,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) flow: Option<SignatureFlow>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RevertOutcome {
    pub(crate) signature: Signature,
    pub(crate) version: Version,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Verification {
    pub(crate) signature: Signature,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) current_file_sha256: Option<String>,
}

/// GET /api/signatures
pub(crate) async fn handle_list_signatures(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SignatureQuery>,
) -> ApiResult<Json<ApiEnvelope<Vec<Signature>>>> {
    let filter = SignatureFilter {
        document_id: query.document_id,
        signer_id: query.signer_id,
    };
    let signatures = state.storage.list_signatures(&filter).await?;
    let (data, pagination) = PageQuery {
        page: query.page,
        limit: query.limit,
    }
    .apply(signatures);
    Ok(Json(ApiEnvelope::paginated("", data, pagination)))
}

/// GET /api/documents/{id}/signatures
pub(crate) async fn handle_document_signatures(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiEnvelope<Vec<Signature>>>> {
    state.storage.get_document(&id).await?;
    let signatures = state
        .storage
        .list_signatures(&SignatureFilter {
            document_id: Some(id),
            signer_id: None,
        })
        .await?;
    Ok(Json(ApiEnvelope::success("", signatures)))
}

/// POST /api/signatures/sign
pub(crate) async fn handle_sign(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Extension(ClientIp(ip)): Extension<ClientIp>,
    Json(req): Json<SignRequest>,
) -> ApiResult<Json<ApiEnvelope<SignOutcome>>> {
    require_signer(&user)?;
    let _guard = state.write_lock.lock().await;

    let document = state.storage.get_document(&req.document_id).await?;
    let signed_at = clock::now();
    let signature_id = uuid::Uuid::new_v4().to_string();

    let flow = match &req.flow_id {
        Some(flow_id) => {
            let mut flow = state.storage.get_flow(flow_id).await?;
            if flow.document_id != document.id {
                return Err(ApiError::bad_request(
                    "El flujo no corresponde al documento",
                ));
            }
            flow.record_signature(&user.id, &signature_id, &signed_at)?;
            Some(flow)
        }
        None => None,
    };

    let value = state
        .signer
        .sign(&document.id, document.file_sha256(), &user.id, &signed_at);
    let signature = Signature {
        id: signature_id,
        document_id: document.id.clone(),
        signer_id: user.id.clone(),
        flow_id: req.flow_id.clone(),
        signature_data: SignatureData {
            algorithm: ALGORITHM.to_string(),
            value,
            format: FORMAT.to_string(),
        },
        certificate_data: state.signer.certificate(&user, &signed_at),
        status: SignatureStatus::Valid,
        is_valid: true,
        is_reverted: false,
        reverted_at: None,
        reverted_by: None,
        revert_reason: None,
        signed_at,
    };
    state.storage.insert_signature(signature.clone()).await?;
    if let Some(flow) = &flow {
        state.storage.update_flow(flow.clone()).await?;
    }
    let version = append_version(&state, &document, "Documento firmado".to_string(), &user.id)
        .await?;

    tracing::info!(document = %document.id, signature = %signature.id, "document signed");
    state
        .audit(
            Some(&user),
            "SIGN",
            "signature",
            Some(&signature.id),
            serde_json::json!({"documentId": document.id, "flowId": req.flow_id}),
            ip,
        )
        .await;

    Ok(Json(ApiEnvelope::success(
        "Documento firmado",
        SignOutcome {
            signature,
            version,
            flow,
        },
    )))
}

/// POST /api/signatures/{id}/verify
pub(crate) async fn handle_verify(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Extension(ClientIp(ip)): Extension<ClientIp>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiEnvelope<Verification>>> {
    let _guard = state.write_lock.lock().await;
    let mut signature = state.storage.get_signature(&id).await?;
    let document = state.storage.get_document(&signature.document_id).await?;
    let current = document.file_sha256().map(str::to_string);

    signature.status = verification_status(&state.signer, &signature, current.as_deref());
    signature.is_valid = signature.status == SignatureStatus::Valid;
    state.storage.update_signature(signature.clone()).await?;

    state
        .audit(
            Some(&user),
            "VERIFY",
            "signature",
            Some(&signature.id),
            serde_json::json!({"status": signature.status}),
            ip,
        )
        .await;

    Ok(Json(ApiEnvelope::success(
        "Firma verificada",
        Verification {
            signature,
            current_file_sha256: current,
        },
    )))
}

/// POST /api/signatures/{id}/revert
pub(crate) async fn handle_revert(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Extension(ClientIp(ip)): Extension<ClientIp>,
    Path(id): Path<String>,
    Json(req): Json<RevertRequest>,
) -> ApiResult<Json<ApiEnvelope<RevertOutcome>>> {
    require_admin(&user)?;
    let reason = req.reason.trim();
    if reason.is_empty() {
        return Err(ApiError::bad_request("El motivo de reversión es obligatorio"));
    }

    let _guard = state.write_lock.lock().await;
    let mut signature = state.storage.get_signature(&id).await?;
    if signature.is_reverted {
        return Err(ApiError::conflict("La firma ya fue revertida"));
    }
    let document = state.storage.get_document(&signature.document_id).await?;

    signature.is_reverted = true;
    signature.is_valid = false;
    signature.status = SignatureStatus::Indeterminate;
    signature.reverted_at = Some(clock::now());
    signature.reverted_by = Some(user.id.clone());
    signature.revert_reason = Some(reason.to_string());
    state.storage.update_signature(signature.clone()).await?;

    let version = append_version(
        &state,
        &document,
        format!("Firma revertida: {}", reason),
        &user.id,
    )
    .await?;

    tracing::info!(signature = %signature.id, "signature reverted");
    state
        .audit(
            Some(&user),
            "REVERT",
            "signature",
            Some(&signature.id),
            serde_json::json!({"reason": reason}),
            ip,
        )
        .await;

    Ok(Json(ApiEnvelope::success(
        "Firma revertida",
        RevertOutcome { signature, version },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signature(signer: &DocumentSigner, sha: Option<&str>) -> Signature {
        let at = "2026-03-01T12:00:00Z";
        Signature {
            id: "s1".to_string(),
            document_id: "d1".to_string(),
            signer_id: "u1".to_string(),
            flow_id: None,
            signature_data: SignatureData {
                algorithm: ALGORITHM.to_string(),
                value: signer.sign("d1", sha, "u1", at),
                format: FORMAT.to_string(),
            },
            certificate_data: CertificateData {
                subject: "CN=Ana".to_string(),
                issuer: "CN=SIAD".to_string(),
                serial_number: "1".to_string(),
                valid_from: at.to_string(),
                valid_to: at.to_string(),
            },
            status: SignatureStatus::Valid,
            is_valid: true,
            is_reverted: false,
            reverted_at: None,
            reverted_by: None,
            revert_reason: None,
            signed_at: at.to_string(),
        }
    }

    #[test]
    fn payload_has_empty_hash_segment_without_file() {
        assert_eq!(signing_payload("d1", None, "u1", "t"), "d1::u1:t");
        assert_eq!(signing_payload("d1", Some("ab"), "u1", "t"), "d1:ab:u1:t");
    }

    #[test]
    fn verification_tracks_file_hash_and_revert() {
        let signer = DocumentSigner::generate();
        let mut sig = signature(&signer, Some("aaaa"));
        assert_eq!(
            verification_status(&signer, &sig, Some("aaaa")),
            SignatureStatus::Valid
        );
        assert_eq!(
            verification_status(&signer, &sig, Some("bbbb")),
            SignatureStatus::Invalid
        );
        sig.is_reverted = true;
        assert_eq!(
            verification_status(&signer, &sig, Some("aaaa")),
            SignatureStatus::Indeterminate
        );
    }

    #[test]
    fn signature_from_another_key_is_invalid() {
        let sig = signature(&DocumentSigner::generate(), None);
        let other = DocumentSigner::generate();
        assert!(!other.verify(&sig, None));
    }

    #[test]
    fn certificate_is_valid_for_a_year() {
        let signer = DocumentSigner::generate();
        let user = User {
            id: "u1".to_string(),
            email: "ana@salud.gob".to_string(),
            name: "Ana".to_string(),
            role: siad_core::model::Role::Signer,
            is_active: true,
            created_at: "2026-01-01T00:00:00Z".to_string(),
        };
        let cert = signer.certificate(&user, "2026-03-01T00:00:00Z");
        assert_eq!(cert.valid_to, "2027-03-01T00:00:00Z");
        assert!(cert.issuer.contains(signer.fingerprint()));
    }
}
