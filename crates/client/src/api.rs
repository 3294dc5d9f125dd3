//! Typed endpoints of the SIAD REST API.

use urlencoding::encode;

use siad_core::analytics::{
    ArchivadorStats, DocumentAnalytics, ExpedienteStats, SignatureStats, TypologyGrouping,
    TypologyStat, UserStats, VitalSummary,
};
use siad_core::model::{
    Archivador, AuditLog, BackupJob, Document, Expediente, RestoreLog, Signature, SignatureFlow,
    SystemConfig, Typology, User, Version,
};
use siad_core::requests::{
    ArchivadorInput, AuditQuery, BackupRequest, ConfigUpdate, DocumentInput, DocumentQuery,
    ExpedienteInput, FlowInput, FlowQuery, LoginRequest, LoginResponse, NewUser, OcrUpdate,
    RevertRequest, SignRequest, SignatureQuery, TypologyStatsQuery,
};
use siad_core::envelope::PageQuery;
use siad_core::flow::FlowRedirect;

use crate::error::ClientError;
use crate::http::{ApiClient, Method, Page, Request};

/// `GET /api/health` payload.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Health {
    pub service: String,
    pub version: String,
    #[serde(default)]
    pub api_version: String,
}

/// Result of verifying a signature.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verification {
    pub signature: Signature,
    pub current_file_sha256: Option<String>,
}

/// Result of signing a document.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignOutcome {
    pub signature: Signature,
    pub version: Version,
    #[serde(default)]
    pub flow: Option<SignatureFlow>,
}

/// Result of reverting a signature.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevertOutcome {
    pub signature: Signature,
    pub version: Version,
}

impl ApiClient {
    // ── Auth ─────────────────────────────────────────────────────────────────

    pub async fn health(&self) -> Result<Health, ClientError> {
        self.data(Request::get("/api/health")).await
    }

    /// Log in and store the session in the shared [`AuthStore`](crate::AuthStore).
    pub async fn login(&self, email: &str, password: &str) -> Result<User, ClientError> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let response: LoginResponse = self
            .data(Request::new(Method::Post, "/api/auth/login").json(&body)?)
            .await?;
        self.auth().set_session(response.token, response.user.clone());
        Ok(response.user)
    }

    /// Log out. The local session is cleared even when the call fails.
    pub async fn logout(&self) -> Result<(), ClientError> {
        let result = self
            .send::<serde_json::Value>(Request::new(Method::Post, "/api/auth/logout"))
            .await;
        self.auth().clear();
        result.map(|_| ())
    }

    pub async fn me(&self) -> Result<User, ClientError> {
        self.data(Request::get("/api/auth/me")).await
    }

    // ── Users ────────────────────────────────────────────────────────────────

    pub async fn users(&self, page: PageQuery) -> Result<Page<User>, ClientError> {
        self.page(Request::get("/api/users").query(&page)?).await
    }

    pub async fn create_user(&self, user: &NewUser) -> Result<User, ClientError> {
        self.data(Request::new(Method::Post, "/api/users").json(user)?)
            .await
    }

    // ── Archivadores ─────────────────────────────────────────────────────────

    pub async fn archivadores(&self, page: PageQuery) -> Result<Page<Archivador>, ClientError> {
        self.page(Request::get("/api/archivadores").query(&page)?)
            .await
    }

    pub async fn archivador(&self, id: &str) -> Result<Archivador, ClientError> {
        self.data(Request::get(format!("/api/archivadores/{}", encode(id))))
            .await
    }

    pub async fn create_archivador(
        &self,
        input: &ArchivadorInput,
    ) -> Result<Archivador, ClientError> {
        self.data(Request::new(Method::Post, "/api/archivadores").json(input)?)
            .await
    }

    pub async fn update_archivador(
        &self,
        id: &str,
        input: &ArchivadorInput,
    ) -> Result<Archivador, ClientError> {
        let path = format!("/api/archivadores/{}", encode(id));
        self.data(Request::new(Method::Put, path).json(input)?).await
    }

    pub async fn delete_archivador(&self, id: &str) -> Result<(), ClientError> {
        let path = format!("/api/archivadores/{}", encode(id));
        self.send::<serde_json::Value>(Request::new(Method::Delete, path))
            .await
            .map(|_| ())
    }

    // ── Expedientes ──────────────────────────────────────────────────────────

    pub async fn expedientes(&self, page: PageQuery) -> Result<Page<Expediente>, ClientError> {
        self.page(Request::get("/api/expedientes").query(&page)?)
            .await
    }

    pub async fn expediente(&self, id: &str) -> Result<Expediente, ClientError> {
        self.data(Request::get(format!("/api/expedientes/{}", encode(id))))
            .await
    }

    pub async fn create_expediente(
        &self,
        input: &ExpedienteInput,
    ) -> Result<Expediente, ClientError> {
        self.data(Request::new(Method::Post, "/api/expedientes").json(input)?)
            .await
    }

    pub async fn update_expediente(
        &self,
        id: &str,
        input: &ExpedienteInput,
    ) -> Result<Expediente, ClientError> {
        let path = format!("/api/expedientes/{}", encode(id));
        self.data(Request::new(Method::Put, path).json(input)?).await
    }

    pub async fn delete_expediente(&self, id: &str) -> Result<(), ClientError> {
        let path = format!("/api/expedientes/{}", encode(id));
        self.send::<serde_json::Value>(Request::new(Method::Delete, path))
            .await
            .map(|_| ())
    }

    // ── Typologies ───────────────────────────────────────────────────────────

    pub async fn typologies(&self) -> Result<Vec<Typology>, ClientError> {
        self.data(Request::get("/api/typologies")).await
    }

    pub async fn create_typology(
        &self,
        input: &siad_core::requests::TypologyInput,
    ) -> Result<Typology, ClientError> {
        self.data(Request::new(Method::Post, "/api/typologies").json(input)?)
            .await
    }

    // ── Documents ────────────────────────────────────────────────────────────

    pub async fn documents(&self, query: &DocumentQuery) -> Result<Page<Document>, ClientError> {
        self.page(Request::get("/api/documents").query(query)?)
            .await
    }

    pub async fn document(&self, id: &str) -> Result<Document, ClientError> {
        self.data(Request::get(format!("/api/documents/{}", encode(id))))
            .await
    }

    pub async fn create_document(&self, input: &DocumentInput) -> Result<Document, ClientError> {
        self.data(Request::new(Method::Post, "/api/documents").json(input)?)
            .await
    }

    pub async fn update_document(
        &self,
        id: &str,
        input: &DocumentInput,
    ) -> Result<Document, ClientError> {
        let path = format!("/api/documents/{}", encode(id));
        self.data(Request::new(Method::Put, path).json(input)?).await
    }

    pub async fn delete_document(&self, id: &str) -> Result<(), ClientError> {
        let path = format!("/api/documents/{}", encode(id));
        self.send::<serde_json::Value>(Request::new(Method::Delete, path))
            .await
            .map(|_| ())
    }

    pub async fn update_ocr(&self, id: &str, update: &OcrUpdate) -> Result<Document, ClientError> {
        let path = format!("/api/documents/{}/ocr", encode(id));
        self.data(Request::new(Method::Patch, path).json(update)?)
            .await
    }

    pub async fn document_versions(&self, id: &str) -> Result<Vec<Version>, ClientError> {
        self.data(Request::get(format!("/api/documents/{}/versions", encode(id))))
            .await
    }

    pub async fn document_signatures(&self, id: &str) -> Result<Vec<Signature>, ClientError> {
        self.data(Request::get(format!(
            "/api/documents/{}/signatures",
            encode(id)
        )))
        .await
    }

    /// URL of the stored file, for download outside the JSON API.
    pub fn document_file_url(&self, id: &str) -> String {
        self.url(&format!("/api/documents/{}/file", encode(id)))
    }

    // ── Signatures ───────────────────────────────────────────────────────────

    pub async fn signatures(&self, query: &SignatureQuery) -> Result<Page<Signature>, ClientError> {
        self.page(Request::get("/api/signatures").query(query)?)
            .await
    }

    pub async fn sign(&self, request: &SignRequest) -> Result<SignOutcome, ClientError> {
        self.data(Request::new(Method::Post, "/api/signatures/sign").json(request)?)
            .await
    }

    pub async fn verify_signature(&self, id: &str) -> Result<Verification, ClientError> {
        let path = format!("/api/signatures/{}/verify", encode(id));
        self.data(Request::new(Method::Post, path)).await
    }

    pub async fn revert_signature(
        &self,
        id: &str,
        reason: &str,
    ) -> Result<RevertOutcome, ClientError> {
        let path = format!("/api/signatures/{}/revert", encode(id));
        let body = RevertRequest {
            reason: reason.to_string(),
        };
        self.data(Request::new(Method::Post, path).json(&body)?)
            .await
    }

    // ── Flows ────────────────────────────────────────────────────────────────

    pub async fn flows(&self, query: &FlowQuery) -> Result<Page<SignatureFlow>, ClientError> {
        self.page(Request::get("/api/flows").query(query)?).await
    }

    pub async fn flow(&self, id: &str) -> Result<SignatureFlow, ClientError> {
        self.data(Request::get(format!("/api/flows/{}", encode(id))))
            .await
    }

    /// Fetch a flow and decide where opening it should land.
    pub async fn open_flow(&self, id: &str) -> Result<FlowRedirect, ClientError> {
        let flow = self.flow(id).await?;
        Ok(FlowRedirect::for_flow(&flow))
    }

    pub async fn create_flow(&self, input: &FlowInput) -> Result<SignatureFlow, ClientError> {
        self.data(Request::new(Method::Post, "/api/flows").json(input)?)
            .await
    }

    pub async fn reject_flow(&self, id: &str) -> Result<SignatureFlow, ClientError> {
        let path = format!("/api/flows/{}/reject", encode(id));
        self.data(Request::new(Method::Post, path)).await
    }

    pub async fn cancel_flow(&self, id: &str) -> Result<SignatureFlow, ClientError> {
        let path = format!("/api/flows/{}/cancel", encode(id));
        self.data(Request::new(Method::Post, path)).await
    }

    // ── Backups and restores ─────────────────────────────────────────────────

    pub async fn backups(&self, page: PageQuery) -> Result<Page<BackupJob>, ClientError> {
        self.page(Request::get("/api/backups").query(&page)?).await
    }

    pub async fn backup(&self, id: &str) -> Result<BackupJob, ClientError> {
        self.data(Request::get(format!("/api/backups/{}", encode(id))))
            .await
    }

    pub async fn create_backup(&self, request: &BackupRequest) -> Result<BackupJob, ClientError> {
        self.data(Request::new(Method::Post, "/api/backups").json(request)?)
            .await
    }

    pub async fn create_restore(&self, backup_id: &str) -> Result<RestoreLog, ClientError> {
        let path = format!("/api/backups/{}/restore", encode(backup_id));
        self.data(Request::new(Method::Post, path)).await
    }

    pub async fn restores(&self, page: PageQuery) -> Result<Page<RestoreLog>, ClientError> {
        self.page(Request::get("/api/restores").query(&page)?).await
    }

    pub async fn restore(&self, id: &str) -> Result<RestoreLog, ClientError> {
        self.data(Request::get(format!("/api/restores/{}", encode(id))))
            .await
    }

    // ── Audit ────────────────────────────────────────────────────────────────

    pub async fn audit(&self, query: &AuditQuery) -> Result<Page<AuditLog>, ClientError> {
        self.page(Request::get("/api/audit").query(query)?).await
    }

    // ── Analytics ────────────────────────────────────────────────────────────

    pub async fn document_analytics(&self) -> Result<DocumentAnalytics, ClientError> {
        self.data(Request::get("/api/analytics/documents")).await
    }

    pub async fn archivador_stats(&self) -> Result<ArchivadorStats, ClientError> {
        self.data(Request::get("/api/analytics/archivadores")).await
    }

    pub async fn expediente_stats(&self) -> Result<ExpedienteStats, ClientError> {
        self.data(Request::get("/api/analytics/expedientes")).await
    }

    pub async fn typology_stats(
        &self,
        group_by: TypologyGrouping,
    ) -> Result<Vec<TypologyStat>, ClientError> {
        let query = TypologyStatsQuery { group_by };
        self.data(Request::get("/api/analytics/typologies").query(&query)?)
            .await
    }

    pub async fn user_stats(&self) -> Result<UserStats, ClientError> {
        self.data(Request::get("/api/analytics/users")).await
    }

    pub async fn signature_stats(&self) -> Result<SignatureStats, ClientError> {
        self.data(Request::get("/api/analytics/signatures")).await
    }

    pub async fn web_vitals_summary(&self) -> Result<Vec<VitalSummary>, ClientError> {
        self.data(Request::get(siad_core::vitals::WEB_VITALS_PATH))
            .await
    }

    // ── Configuration ────────────────────────────────────────────────────────

    pub async fn config(&self) -> Result<SystemConfig, ClientError> {
        self.data(Request::get("/api/config")).await
    }

    pub async fn update_config(&self, update: &ConfigUpdate) -> Result<SystemConfig, ClientError> {
        self.data(Request::new(Method::Put, "/api/config").json(update)?)
            .await
    }
}

#[cfg(test)]
mod tests {
    use crate::http::{ApiClient, ClientConfig};
    use crate::store::AuthStore;

    #[test]
    fn path_segments_are_percent_encoded() {
        let client = ApiClient::new(ClientConfig::new("http://archivo.local"), AuthStore::new());
        assert_eq!(
            client.document_file_url("a/b c"),
            "http://archivo.local/api/documents/a%2Fb%20c/file"
        );
        assert_eq!(
            client.document_file_url("d1"),
            "http://archivo.local/api/documents/d1/file"
        );
    }
}
