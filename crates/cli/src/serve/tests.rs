//! In-process tests that drive the full router with `tower::ServiceExt::oneshot`.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use siad_core::jobs::BackupStatus;
use siad_core::model::{BackupJob, BackupTotals};
use siad_storage::{ArchiveStorage, MemoryStorage};

use super::state::AppState;
use super::{build_router, build_state, MediaConfig, ServeConfig};

const ADMIN_EMAIL: &str = "admin@siad.test";
const ADMIN_PASSWORD: &str = "admin-pass-123";

fn test_config() -> ServeConfig {
    ServeConfig {
        port: 0,
        rate_limit: 10_000,
        session_ttl: Duration::from_secs(3600),
        admin_email: ADMIN_EMAIL.to_string(),
        admin_password: Some(ADMIN_PASSWORD.to_string()),
        signing_key: None,
        media: MediaConfig::default(),
        tls_cert: None,
        tls_key: None,
    }
}

async fn setup() -> (Router, Arc<AppState>) {
    let storage: Arc<dyn ArchiveStorage> = Arc::new(MemoryStorage::new());
    let state = build_state(&test_config(), storage).await.unwrap();
    (build_router(state.clone()), state)
}

struct Reply {
    status: StatusCode,
    headers: axum::http::HeaderMap,
    body: Value,
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Reply {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    Reply {
        status,
        headers,
        body,
    }
}

async fn login(app: &Router, email: &str, password: &str) -> String {
    let reply = send(
        app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({"email": email, "password": password})),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK, "login failed: {}", reply.body);
    reply.body["data"]["token"].as_str().unwrap().to_string()
}

async fn create_user(app: &Router, admin: &str, email: &str, role: &str) -> String {
    let reply = send(
        app,
        Method::POST,
        "/api/users",
        Some(admin),
        Some(json!({"email": email, "name": email, "password": "signer-pass-1", "role": role})),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
    reply.body["data"]["id"].as_str().unwrap().to_string()
}

async fn create_document(app: &Router, token: &str) -> (String, String) {
    let reply = send(
        app,
        Method::POST,
        "/api/archivadores",
        Some(token),
        Some(json!({
            "code": "ARC-001",
            "name": "Resoluciones",
            "period": 2025,
            "office": "Dirección"
        })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
    let archivador_id = reply.body["data"]["id"].as_str().unwrap().to_string();

    let reply = send(
        app,
        Method::POST,
        "/api/documents",
        Some(token),
        Some(json!({
            "title": "Resolución directoral 12",
            "documentNumber": "RD-012-2025",
            "archivadorId": archivador_id,
            "file": {"name": "rd.txt", "mimeType": "text/plain", "contentBase64": "aG9sYQ=="}
        })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
    let document_id = reply.body["data"]["id"].as_str().unwrap().to_string();
    (archivador_id, document_id)
}

#[tokio::test]
async fn health_is_public() {
    let (app, _) = setup().await;
    let reply = send(&app, Method::GET, "/api/health", None, None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["status"], "success");
    assert_eq!(reply.body["data"]["service"], "siad");
}

#[tokio::test]
async fn protected_routes_require_a_session() {
    let (app, _) = setup().await;
    let reply = send(&app, Method::GET, "/api/documents", None, None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.body["status"], "error");

    let reply = send(&app, Method::GET, "/api/auth/me", Some("bogus"), None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_sets_cookie_and_resolves_me() {
    let (app, _) = setup().await;
    let reply = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({"email": ADMIN_EMAIL, "password": ADMIN_PASSWORD})),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    let cookie = reply.headers[header::SET_COOKIE].to_str().unwrap();
    assert!(cookie.starts_with("access_token="));
    assert!(cookie.contains("HttpOnly"));
    let token = reply.body["data"]["token"].as_str().unwrap();

    let me = send(&app, Method::GET, "/api/auth/me", Some(token), None).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["data"]["email"], ADMIN_EMAIL);
    assert_eq!(me.body["data"]["role"], "ADMIN");

    let wrong = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({"email": ADMIN_EMAIL, "password": "nope"})),
    )
    .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_revokes_the_session() {
    let (app, _) = setup().await;
    let token = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    let reply = send(&app, Method::POST, "/api/auth/logout", Some(&token), None).await;
    assert_eq!(reply.status, StatusCode::OK);
    let me = send(&app, Method::GET, "/api/auth/me", Some(&token), None).await;
    assert_eq!(me.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn page_gate_redirects_by_cookie() {
    let (app, _) = setup().await;

    let request = Request::get("/dashboard/documents")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(response.headers()[header::LOCATION], "/login");

    let request = Request::get("/login")
        .header(header::COOKIE, "theme=dark; access_token=abc")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(response.headers()[header::LOCATION], "/dashboard");

    let request = Request::get("/login").body(Body::empty()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn favicon_is_cached_and_follows_config() {
    let (app, _) = setup().await;
    let reply = send(&app, Method::GET, "/favicon.ico", None, None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.headers[header::CONTENT_TYPE], "image/svg+xml");
    assert_eq!(
        reply.headers[header::CACHE_CONTROL],
        "public, max-age=3600"
    );

    let token = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    let update = send(
        &app,
        Method::PUT,
        "/api/config",
        Some(&token),
        Some(json!({"faviconUrl": "https://cdn.example/icon.png"})),
    )
    .await;
    assert_eq!(update.status, StatusCode::OK);

    let reply = send(&app, Method::GET, "/favicon.ico", None, None).await;
    assert_eq!(reply.status, StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        reply.headers[header::LOCATION],
        "https://cdn.example/icon.png"
    );
    assert_eq!(
        reply.headers[header::CACHE_CONTROL],
        "public, max-age=3600"
    );
}

#[tokio::test]
async fn signing_appends_a_current_version() {
    let (app, _) = setup().await;
    let token = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    let (_, document_id) = create_document(&app, &token).await;

    let signed = send(
        &app,
        Method::POST,
        "/api/signatures/sign",
        Some(&token),
        Some(json!({"documentId": document_id})),
    )
    .await;
    assert_eq!(signed.status, StatusCode::OK, "{}", signed.body);
    assert_eq!(signed.body["data"]["signature"]["status"], "VALID");
    assert_eq!(signed.body["data"]["version"]["activeSignatures"], 1);
    let signature_id = signed.body["data"]["signature"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let versions = send(
        &app,
        Method::GET,
        &format!("/api/documents/{}/versions", document_id),
        Some(&token),
        None,
    )
    .await;
    let versions = versions.body["data"].as_array().unwrap().clone();
    assert_eq!(versions.len(), 2);
    let current: Vec<_> = versions
        .iter()
        .filter(|v| v["isCurrent"] == true)
        .collect();
    assert_eq!(current.len(), 1);
    assert_eq!(current[0]["versionNumber"], 2);

    let verified = send(
        &app,
        Method::POST,
        &format!("/api/signatures/{}/verify", signature_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(verified.status, StatusCode::OK);
    assert_eq!(verified.body["data"]["signature"]["isValid"], true);

    let reverted = send(
        &app,
        Method::POST,
        &format!("/api/signatures/{}/revert", signature_id),
        Some(&token),
        Some(json!({"reason": "Firmado por error"})),
    )
    .await;
    assert_eq!(reverted.status, StatusCode::OK);
    assert_eq!(reverted.body["data"]["signature"]["status"], "INDETERMINATE");
    assert_eq!(reverted.body["data"]["version"]["revertedSignatures"], 1);

    let again = send(
        &app,
        Method::POST,
        &format!("/api/signatures/{}/revert", signature_id),
        Some(&token),
        Some(json!({"reason": "otra vez"})),
    )
    .await;
    assert_eq!(again.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn flow_enforces_turn_order_and_rejection_halts() {
    let (app, _) = setup().await;
    let admin = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    let (_, document_id) = create_document(&app, &admin).await;
    let first = create_user(&app, &admin, "first@siad.test", "SIGNER").await;
    let second = create_user(&app, &admin, "second@siad.test", "SIGNER").await;

    let flow = send(
        &app,
        Method::POST,
        "/api/flows",
        Some(&admin),
        Some(json!({
            "name": "Visto bueno",
            "documentId": document_id,
            "signerIds": [first, second]
        })),
    )
    .await;
    assert_eq!(flow.status, StatusCode::OK, "{}", flow.body);
    assert_eq!(flow.body["data"]["status"], "PENDING");
    let flow_id = flow.body["data"]["id"].as_str().unwrap().to_string();

    let second_token = login(&app, "second@siad.test", "signer-pass-1").await;
    let early = send(
        &app,
        Method::POST,
        "/api/signatures/sign",
        Some(&second_token),
        Some(json!({"documentId": document_id, "flowId": flow_id})),
    )
    .await;
    assert_eq!(early.status, StatusCode::FORBIDDEN);

    let first_token = login(&app, "first@siad.test", "signer-pass-1").await;
    let rejected = send(
        &app,
        Method::POST,
        &format!("/api/flows/{}/reject", flow_id),
        Some(&first_token),
        None,
    )
    .await;
    assert_eq!(rejected.status, StatusCode::OK);
    assert_eq!(rejected.body["data"]["status"], "IN_PROGRESS");

    let halted = send(
        &app,
        Method::POST,
        "/api/signatures/sign",
        Some(&second_token),
        Some(json!({"documentId": document_id, "flowId": flow_id})),
    )
    .await;
    assert_eq!(halted.status, StatusCode::CONFLICT);

    let not_admin = send(
        &app,
        Method::POST,
        &format!("/api/flows/{}/cancel", flow_id),
        Some(&first_token),
        None,
    )
    .await;
    assert_eq!(not_admin.status, StatusCode::FORBIDDEN);

    let cancelled = send(
        &app,
        Method::POST,
        &format!("/api/flows/{}/cancel", flow_id),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(cancelled.body["data"]["status"], "CANCELLED");
}

#[tokio::test]
async fn open_flow_redirects_to_sign_page() {
    let (app, _) = setup().await;
    let admin = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    let (_, document_id) = create_document(&app, &admin).await;
    let signer = create_user(&app, &admin, "s@siad.test", "SIGNER").await;
    let flow = send(
        &app,
        Method::POST,
        "/api/flows",
        Some(&admin),
        Some(json!({"name": "Firma", "documentId": document_id, "signerIds": [signer]})),
    )
    .await;
    let flow_id = flow.body["data"]["id"].as_str().unwrap().to_string();

    let request = Request::get(format!("/dashboard/signatures/flows/{}", flow_id))
        .header(header::COOKIE, format!("access_token={}", admin))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let location = response.headers()[header::LOCATION].to_str().unwrap();
    assert!(location.starts_with("/dashboard/signatures/sign?documentId="));
    assert!(location.ends_with(&format!("flowId={}", flow_id)));

    let request = Request::get("/dashboard/signatures/flows/missing")
        .header(header::COOKIE, format!("access_token={}", admin))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(
        response.headers()[header::LOCATION],
        "/dashboard/signatures/flows"
    );
}

#[tokio::test]
async fn viewers_cannot_write() {
    let (app, _) = setup().await;
    let admin = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    create_user(&app, &admin, "viewer@siad.test", "VIEWER").await;
    let viewer = login(&app, "viewer@siad.test", "signer-pass-1").await;
    let reply = send(
        &app,
        Method::POST,
        "/api/archivadores",
        Some(&viewer),
        Some(json!({"code": "ARC-9", "name": "X", "period": 2025, "office": "Y"})),
    )
    .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn archivador_with_documents_cannot_be_deleted() {
    let (app, _) = setup().await;
    let token = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    let (archivador_id, document_id) = create_document(&app, &token).await;

    let uri = format!("/api/archivadores/{}", archivador_id);
    let blocked = send(&app, Method::DELETE, &uri, Some(&token), None).await;
    assert_eq!(blocked.status, StatusCode::CONFLICT);

    let doc_uri = format!("/api/documents/{}", document_id);
    let deleted = send(&app, Method::DELETE, &doc_uri, Some(&token), None).await;
    assert_eq!(deleted.status, StatusCode::OK);
    let removed = send(&app, Method::DELETE, &uri, Some(&token), None).await;
    assert_eq!(removed.status, StatusCode::OK);
}

#[tokio::test]
async fn restore_requires_a_completed_backup() {
    let (app, state) = setup().await;
    let token = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    state
        .storage
        .insert_backup(BackupJob {
            id: "b-pending".to_string(),
            status: BackupStatus::Pending,
            description: None,
            totals: BackupTotals::default(),
            checksum: None,
            duration_ms: None,
            error: None,
            created_by: "admin".to_string(),
            created_at: "2026-01-01T00:00:00Z".to_string(),
            completed_at: None,
        })
        .await
        .unwrap();

    let reply = send(
        &app,
        Method::POST,
        "/api/backups/b-pending/restore",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(reply.status, StatusCode::CONFLICT);
    assert_eq!(reply.body["message"], "El respaldo no está completado");
}

async fn wait_for(app: &Router, token: &str, uri: &str, done: &[&str]) -> Value {
    for _ in 0..100 {
        let reply = send(app, Method::GET, uri, Some(token), None).await;
        let status = reply.body["data"]["status"].as_str().unwrap_or_default();
        if done.contains(&status) {
            return reply.body["data"].clone();
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("job at {} did not finish", uri);
}

#[tokio::test]
async fn backup_then_restore_skips_existing_records() {
    let (app, _) = setup().await;
    let token = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    create_document(&app, &token).await;

    let backup = send(
        &app,
        Method::POST,
        "/api/backups",
        Some(&token),
        Some(json!({"description": "nightly"})),
    )
    .await;
    assert_eq!(backup.status, StatusCode::OK);
    let backup_id = backup.body["data"]["id"].as_str().unwrap().to_string();
    let backup = wait_for(
        &app,
        &token,
        &format!("/api/backups/{}", backup_id),
        &["COMPLETED", "FAILED"],
    )
    .await;
    assert_eq!(backup["status"], "COMPLETED", "{}", backup);
    assert_eq!(backup["totals"]["documents"], 1);
    assert_eq!(backup["totals"]["files"], 1);
    assert!(backup["checksum"].is_string());

    let restore = send(
        &app,
        Method::POST,
        &format!("/api/backups/{}/restore", backup_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(restore.status, StatusCode::OK);
    let restore_id = restore.body["data"]["id"].as_str().unwrap().to_string();
    let restore = wait_for(
        &app,
        &token,
        &format!("/api/restores/{}", restore_id),
        &["COMPLETED", "FAILED"],
    )
    .await;
    assert_eq!(restore["status"], "COMPLETED", "{}", restore);
    assert_eq!(restore["restoredRecords"], 0);
    assert!(restore["skippedRecords"].as_u64().unwrap() > 0);
    assert_eq!(restore["skippedFiles"], 1);
}

#[tokio::test]
async fn mutations_are_audited() {
    let (app, _) = setup().await;
    let token = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    create_document(&app, &token).await;
    let audit = send(
        &app,
        Method::GET,
        "/api/audit?entityType=document",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(audit.status, StatusCode::OK);
    let entries = audit.body["data"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["action"], "CREATE");
    assert!(audit.body["pagination"]["total"].as_u64().is_some());
}

#[tokio::test]
async fn unknown_routes_use_the_envelope() {
    let (app, _) = setup().await;
    let reply = send(&app, Method::GET, "/api/nothing-here", None, None).await;
    // Unknown API paths still need a session first.
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    let token = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    let reply = send(&app, Method::GET, "/api/nothing-here", Some(&token), None).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.body["status"], "error");
}

#[tokio::test]
async fn restore_into_empty_archive_keeps_current_version() {
    let (app, state) = setup().await;
    let token = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    let (_, document_id) = create_document(&app, &token).await;
    let signed = send(
        &app,
        Method::POST,
        "/api/signatures/sign",
        Some(&token),
        Some(json!({"documentId": document_id})),
    )
    .await;
    assert_eq!(signed.status, StatusCode::OK);

    let backup = send(&app, Method::POST, "/api/backups", Some(&token), None).await;
    let backup_id = backup.body["data"]["id"].as_str().unwrap().to_string();
    wait_for(
        &app,
        &token,
        &format!("/api/backups/{}", backup_id),
        &["COMPLETED"],
    )
    .await;

    // Carry the finished backup over to a brand new archive.
    let (fresh_app, fresh_state) = setup().await;
    let job = state.storage.get_backup(&backup_id).await.unwrap();
    let bytes = state.storage.get_backup_archive(&backup_id).await.unwrap();
    fresh_state.storage.insert_backup(job).await.unwrap();
    fresh_state
        .storage
        .put_backup_archive(&backup_id, bytes)
        .await
        .unwrap();

    let fresh_token = login(&fresh_app, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    let restore = send(
        &fresh_app,
        Method::POST,
        &format!("/api/backups/{}/restore", backup_id),
        Some(&fresh_token),
        None,
    )
    .await;
    assert_eq!(restore.status, StatusCode::OK);
    let restore_id = restore.body["data"]["id"].as_str().unwrap().to_string();
    let restore = wait_for(
        &fresh_app,
        &fresh_token,
        &format!("/api/restores/{}", restore_id),
        &["COMPLETED", "FAILED"],
    )
    .await;
    assert_eq!(restore["status"], "COMPLETED", "{}", restore);
    // Only the archived administrator collides with the seeded one.
    assert_eq!(restore["skippedRecords"], 1);
    assert!(restore["restoredRecords"].as_u64().unwrap() > 0);
    assert_eq!(restore["restoredFiles"], 1);

    let versions = send(
        &fresh_app,
        Method::GET,
        &format!("/api/documents/{}/versions", document_id),
        Some(&fresh_token),
        None,
    )
    .await;
    let mut flags: Vec<(u64, bool)> = versions.body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| {
            (
                v["versionNumber"].as_u64().unwrap(),
                v["isCurrent"].as_bool().unwrap(),
            )
        })
        .collect();
    flags.sort();
    assert_eq!(flags, vec![(1, false), (2, true)]);
}
