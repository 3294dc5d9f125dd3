//! Login, sessions and password hashing.
//!
//! Passwords are stored as `sha256$<iterations>$<salt>$<hex digest>`: the
//! salted password is hashed once and the digest re-hashed for the remaining
//! iterations.

use std::sync::Arc;

use axum::extract::State;
use axum::http::header::{AUTHORIZATION, COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use rand::RngCore;
use sha2::{Digest, Sha256};

use siad_core::clock;
use siad_core::envelope::ApiEnvelope;
use siad_core::gate::{cookie_value, ACCESS_TOKEN_COOKIE};
use siad_core::model::{Role, User};
use siad_core::requests::{LoginRequest, LoginResponse, NewUser};
use siad_storage::{StorageError, UserRecord};

use super::error::{ApiError, ApiResult};
use super::middleware::ClientIp;
use super::state::AppState;

const HASH_SCHEME: &str = "sha256";
const HASH_ITERATIONS: u32 = 10_000;
const MIN_PASSWORD_LEN: usize = 8;

/// The authenticated user, inserted into request extensions by the API
/// auth middleware.
#[derive(Debug, Clone)]
pub(crate) struct CurrentUser(pub(crate) User);

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn digest(salt: &str, password: &str, iterations: u32) -> String {
    let mut hash = Sha256::new()
        .chain_update(salt.as_bytes())
        .chain_update(password.as_bytes())
        .finalize();
    for _ in 1..iterations {
        hash = Sha256::digest(hash);
    }
    to_hex(&hash)
}

pub(crate) fn hash_password(password: &str) -> String {
    let mut salt = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    let salt = to_hex(&salt);
    format!(
        "{}${}${}${}",
        HASH_SCHEME,
        HASH_ITERATIONS,
        salt,
        digest(&salt, password, HASH_ITERATIONS)
    )
}

pub(crate) fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.splitn(4, '$');
    let (Some(scheme), Some(iterations), Some(salt), Some(expected)) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    let Ok(iterations) = iterations.parse::<u32>() else {
        return false;
    };
    if scheme != HASH_SCHEME || iterations == 0 {
        return false;
    }
    let actual = digest(salt, password, iterations);
    actual.len() == expected.len()
        && actual
            .bytes()
            .zip(expected.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

/// Bearer token from the `Authorization` header, else the access cookie.
pub(crate) fn request_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        return Some(token.trim().to_string());
    }
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|h| cookie_value(h, ACCESS_TOKEN_COOKIE))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

fn session_cookie(token: &str, max_age_secs: u64) -> String {
    format!(
        "{}={}; HttpOnly; Path=/; SameSite=Lax; Max-Age={}",
        ACCESS_TOKEN_COOKIE, token, max_age_secs
    )
}

pub(crate) fn require_admin(user: &User) -> ApiResult<()> {
    if user.role == Role::Admin {
        Ok(())
    } else {
        Err(ApiError::forbidden("Se requiere rol de administrador"))
    }
}

pub(crate) fn require_writer(user: &User) -> ApiResult<()> {
    if user.role.can_write() {
        Ok(())
    } else {
        Err(ApiError::forbidden("No tiene permisos para modificar el archivo"))
    }
}

pub(crate) fn require_signer(user: &User) -> ApiResult<()> {
    if matches!(user.role, Role::Admin | Role::Signer) {
        Ok(())
    } else {
        Err(ApiError::forbidden("No tiene permisos para firmar"))
    }
}

/// Create the first administrator when the user table is empty.
///
/// Returns the generated password when none was configured so the caller
/// can show it once.
pub(crate) async fn seed_admin(
    state: &AppState,
    email: &str,
    password: Option<&str>,
) -> Result<Option<String>, StorageError> {
    if !state.storage.list_users().await?.is_empty() {
        return Ok(None);
    }
    let (password, generated) = match password.filter(|p| !p.is_empty()) {
        Some(p) => (p.to_string(), None),
        None => {
            let mut bytes = [0u8; 12];
            rand::rngs::OsRng.fill_bytes(&mut bytes);
            let p = to_hex(&bytes);
            (p.clone(), Some(p))
        }
    };
    state
        .storage
        .insert_user(UserRecord {
            user: User {
                id: uuid::Uuid::new_v4().to_string(),
                email: email.to_lowercase(),
                name: "Administrador".to_string(),
                role: Role::Admin,
                is_active: true,
                created_at: clock::now(),
            },
            password_hash: hash_password(&password),
        })
        .await?;
    tracing::info!(email, "seeded administrator account");
    Ok(generated)
}

/// POST /api/auth/login
pub(crate) async fn handle_login(
    State(state): State<Arc<AppState>>,
    Extension(ClientIp(ip)): Extension<ClientIp>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Response> {
    let invalid = || ApiError::unauthorized("Credenciales inválidas");
    let record = match state.storage.find_user_by_email(req.email.trim()).await {
        Ok(record) => record,
        Err(StorageError::NotFound { .. }) => return Err(invalid()),
        Err(e) => return Err(e.into()),
    };
    if !verify_password(&req.password, &record.password_hash) {
        tracing::info!(email = %req.email, "failed login");
        return Err(invalid());
    }
    if !record.user.is_active {
        return Err(ApiError::forbidden("Usuario inactivo"));
    }

    let token = state.sessions.create(&record.user.id).await;
    let cookie = session_cookie(&token, state.sessions.ttl().as_secs());
    state
        .audit(
            Some(&record.user),
            "LOGIN",
            "user",
            Some(&record.user.id),
            serde_json::Value::Null,
            ip,
        )
        .await;

    let body = ApiEnvelope::success(
        "Sesión iniciada",
        LoginResponse {
            token,
            user: record.user,
        },
    );
    let mut response = Json(body).into_response();
    if let Ok(value) = HeaderValue::from_str(&cookie) {
        response.headers_mut().insert(SET_COOKIE, value);
    }
    Ok(response)
}

/// POST /api/auth/logout
pub(crate) async fn handle_logout(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Extension(ClientIp(ip)): Extension<ClientIp>,
    headers: HeaderMap,
) -> Response {
    if let Some(token) = request_token(&headers) {
        state.sessions.revoke(&token).await;
    }
    state
        .audit(
            Some(&user),
            "LOGOUT",
            "user",
            Some(&user.id),
            serde_json::Value::Null,
            ip,
        )
        .await;

    let mut response = Json(ApiEnvelope::<()>::success("Sesión cerrada", ())).into_response();
    response.headers_mut().insert(
        SET_COOKIE,
        HeaderValue::from_static("access_token=; HttpOnly; Path=/; SameSite=Lax; Max-Age=0"),
    );
    response
}

/// GET /api/auth/me
pub(crate) async fn handle_me(
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Json<ApiEnvelope<User>> {
    Json(ApiEnvelope::success("", user))
}

/// GET /api/users
pub(crate) async fn handle_list_users(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ApiEnvelope<Vec<User>>>> {
    let users = state
        .storage
        .list_users()
        .await?
        .into_iter()
        .map(|r| r.user)
        .collect();
    Ok(Json(ApiEnvelope::success("", users)))
}

/// POST /api/users
pub(crate) async fn handle_create_user(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    Extension(ClientIp(ip)): Extension<ClientIp>,
    Json(req): Json<NewUser>,
) -> ApiResult<Json<ApiEnvelope<User>>> {
    require_admin(&admin)?;
    let email = req.email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(ApiError::bad_request("Correo electrónico inválido"));
    }
    if req.name.trim().is_empty() {
        return Err(ApiError::bad_request("El nombre es obligatorio"));
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(format!(
            "La contraseña debe tener al menos {} caracteres",
            MIN_PASSWORD_LEN
        )));
    }

    let user = User {
        id: uuid::Uuid::new_v4().to_string(),
        email,
        name: req.name.trim().to_string(),
        role: req.role,
        is_active: true,
        created_at: clock::now(),
    };
    state
        .storage
        .insert_user(UserRecord {
            user: user.clone(),
            password_hash: hash_password(&req.password),
        })
        .await?;
    state
        .audit(
            Some(&admin),
            "CREATE",
            "user",
            Some(&user.id),
            serde_json::json!({"email": user.email, "role": user.role}),
            ip,
        )
        .await;
    Ok(Json(ApiEnvelope::success("Usuario creado", user)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_round_trips() {
        let stored = hash_password("secreto123");
        assert!(stored.starts_with("sha256$10000$"));
        assert_eq!(stored.split('$').count(), 4);
        assert!(verify_password("secreto123", &stored));
        assert!(!verify_password("secreto124", &stored));
    }

    #[test]
    fn malformed_hashes_never_verify() {
        assert!(!verify_password("x", ""));
        assert!(!verify_password("x", "md5$1$aa$bb"));
        assert!(!verify_password("x", "sha256$zero$aa$bb"));
        assert!(!verify_password("x", "sha256$0$aa$bb"));
    }

    #[test]
    fn token_prefers_bearer_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("access_token=from-cookie"));
        assert_eq!(request_token(&headers).as_deref(), Some("from-cookie"));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        assert_eq!(request_token(&headers).as_deref(), Some("from-header"));
    }

    #[test]
    fn session_cookie_attributes() {
        let cookie = session_cookie("abc", 3600);
        assert_eq!(
            cookie,
            "access_token=abc; HttpOnly; Path=/; SameSite=Lax; Max-Age=3600"
        );
    }

    #[test]
    fn role_guards() {
        let mut user = User {
            id: "u1".to_string(),
            email: "v@salud.gob".to_string(),
            name: "V".to_string(),
            role: Role::Viewer,
            is_active: true,
            created_at: "2026-01-01T00:00:00Z".to_string(),
        };
        assert!(require_admin(&user).is_err());
        assert!(require_writer(&user).is_err());
        assert!(require_signer(&user).is_err());
        user.role = Role::Archivist;
        assert!(require_writer(&user).is_ok());
        user.role = Role::Signer;
        assert!(require_signer(&user).is_ok());
    }
}
