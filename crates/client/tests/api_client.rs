//! Client tests against a small in-process axum backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::Query;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use siad_client::notify::RecordingNotifier;
use siad_client::{
    AnalyticsFetchers, ApiClient, AuthStore, ClientConfig, ClientError, RestoreTracker,
};
use siad_core::analytics::TypologyGrouping;

async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn user_json() -> Value {
    json!({
        "id": "u1",
        "email": "ana@salud.gob",
        "name": "Ana Quispe",
        "role": "SIGNER",
        "isActive": true,
        "createdAt": "2026-01-01T00:00:00Z"
    })
}

fn restore_json(id: &str) -> Value {
    json!({
        "id": id,
        "backupId": "b1",
        "status": "PENDING",
        "restoredRecords": 0,
        "skippedRecords": 0,
        "restoredFiles": 0,
        "skippedFiles": 0,
        "createdBy": "admin",
        "createdAt": "2026-02-01T10:00:00Z"
    })
}

fn client(base: &str) -> ApiClient {
    ApiClient::new(ClientConfig::new(base), AuthStore::new())
}

#[tokio::test]
async fn login_stores_session_and_sends_bearer() {
    let app = Router::new()
        .route(
            "/api/auth/login",
            post(|| async {
                Json(json!({
                    "status": "success",
                    "message": "Sesión iniciada",
                    "data": {"token": "tok-1", "user": user_json()}
                }))
            }),
        )
        .route(
            "/api/auth/me",
            get(|headers: HeaderMap| async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default();
                if auth == "Bearer tok-1" {
                    (
                        StatusCode::OK,
                        Json(json!({"status": "success", "message": "", "data": user_json()})),
                    )
                } else {
                    (
                        StatusCode::UNAUTHORIZED,
                        Json(json!({"status": "error", "message": "No autenticado", "data": null})),
                    )
                }
            }),
        );
    let base = spawn(app).await;
    let api = client(&base);

    let err = api.me().await.unwrap_err();
    assert!(err.is_unauthorized());
    assert_eq!(err.user_message("x"), "No autenticado");

    let user = api.login("ana@salud.gob", "secreto").await.unwrap();
    assert_eq!(user.id, "u1");
    assert!(api.auth().is_authenticated());
    assert_eq!(api.me().await.unwrap().email, "ana@salud.gob");
}

#[tokio::test]
async fn restore_error_is_notified_and_returned() {
    let app = Router::new().route(
        "/api/backups/{id}/restore",
        post(|| async {
            (
                StatusCode::CONFLICT,
                Json(json!({
                    "status": "error",
                    "message": "El respaldo no está completado",
                    "data": null
                })),
            )
        }),
    );
    let base = spawn(app).await;
    let notifier = Arc::new(RecordingNotifier::new());
    let tracker = RestoreTracker::new(client(&base), notifier.clone());

    let err = tracker.create_restore("b1").await.unwrap_err();
    assert_eq!(err.status(), Some(409));
    assert_eq!(
        notifier.errors(),
        vec!["El respaldo no está completado".to_string()]
    );
}

#[tokio::test]
async fn restore_success_reloads_history() {
    let list_calls = Arc::new(AtomicUsize::new(0));
    let counter = list_calls.clone();
    let app = Router::new()
        .route(
            "/api/backups/{id}/restore",
            post(|| async {
                Json(json!({"status": "success", "message": "", "data": restore_json("r2")}))
            }),
        )
        .route(
            "/api/restores",
            get(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Json(json!({
                        "status": "success",
                        "message": "",
                        "data": [restore_json("r2"), restore_json("r1")],
                        "pagination": {"page": 1, "limit": 100, "total": 2, "totalPages": 1}
                    }))
                }
            }),
        );
    let base = spawn(app).await;
    let notifier = Arc::new(RecordingNotifier::new());
    let tracker = RestoreTracker::new(client(&base), notifier.clone());

    let log = tracker.create_restore("b1").await.unwrap();
    assert_eq!(log.id, "r2");
    assert_eq!(list_calls.load(Ordering::SeqCst), 1);
    let history = tracker.restores.data().unwrap();
    assert_eq!(history.len(), 2);
    assert!(notifier.errors().is_empty());
}

#[tokio::test]
async fn period_typology_stats_get_display_names() {
    let app = Router::new().route(
        "/api/analytics/typologies",
        get(|Query(q): Query<HashMap<String, String>>| async move {
            let data = if q.get("groupBy").map(String::as_str) == Some("period") {
                json!([
                    {"year": 2025, "count": 6, "percentage": 60.0},
                    {"year": 2024, "count": 4, "percentage": 40.0}
                ])
            } else {
                json!([{"id": "t1", "name": "Oficio", "count": 10, "percentage": 100.0}])
            };
            Json(json!({"status": "success", "message": "", "data": data}))
        }),
    );
    let base = spawn(app).await;
    let fetchers = AnalyticsFetchers::new(client(&base), Arc::new(RecordingNotifier::new()));

    let rows = fetchers
        .fetch_typologies(TypologyGrouping::Period)
        .await
        .unwrap();
    let names: Vec<_> = rows.iter().filter_map(|r| r.name.clone()).collect();
    assert_eq!(names, vec!["Periodo 2025", "Periodo 2024"]);

    let rows = fetchers
        .fetch_typologies(TypologyGrouping::Typology)
        .await
        .unwrap();
    assert_eq!(rows[0].name.as_deref(), Some("Oficio"));
}

#[tokio::test]
async fn failed_analytics_fetch_resets_data_and_notifies_fallback() {
    let app = Router::new().route(
        "/api/analytics/users",
        get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded") }),
    );
    let base = spawn(app).await;
    let notifier = Arc::new(RecordingNotifier::new());
    let fetchers = AnalyticsFetchers::new(client(&base), notifier.clone());

    let err = fetchers.fetch_users().await.unwrap_err();
    assert!(matches!(err, ClientError::Api { status: 500, .. }));
    assert!(fetchers.users.data().is_none());
    assert!(!fetchers.users.is_loading());
    assert_eq!(
        notifier.errors(),
        vec!["Error al cargar estadísticas de usuarios".to_string()]
    );
}

#[tokio::test]
async fn unreachable_backend_is_transport_error() {
    // Port 9 (discard) is closed on test hosts.
    let api = client("http://127.0.0.1:9");
    let err = api.health().await.unwrap_err();
    assert!(matches!(err, ClientError::Transport(_)), "{err:?}");
}
