//! Blocking `ureq` transport behind an async facade.
//!
//! Every call runs on the blocking pool and is raced against a
//! `CancellationToken`. A cancelled call returns [`ClientError::Cancelled`]
//! and its response, if one still arrives, is dropped.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use ureq::typestate::WithBody;

use siad_core::envelope::{ApiEnvelope, EnvelopeStatus, Pagination};

use crate::error::ClientError;
use crate::store::AuthStore;

/// Connection settings for [`ApiClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Backend origin, e.g. `http://localhost:8080`. `/api` paths are
    /// appended to it.
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

/// A request before it is handed to the transport.
#[derive(Debug, Clone)]
pub(crate) struct Request {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) query: Vec<(String, String)>,
    pub(crate) body: Option<serde_json::Value>,
}

impl Request {
    pub(crate) fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub(crate) fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub(crate) fn json<B: Serialize>(mut self, body: &B) -> Result<Self, ClientError> {
        let value = serde_json::to_value(body).map_err(|e| ClientError::Decode(e.to_string()))?;
        self.body = Some(value);
        Ok(self)
    }

    /// Append every non-null field of `query` as a query parameter.
    pub(crate) fn query<Q: Serialize>(mut self, query: &Q) -> Result<Self, ClientError> {
        let value = serde_json::to_value(query).map_err(|e| ClientError::Decode(e.to_string()))?;
        if let serde_json::Value::Object(map) = value {
            for (key, v) in map {
                match v {
                    serde_json::Value::Null => {}
                    serde_json::Value::String(s) => self.query.push((key, s)),
                    other => self.query.push((key, other.to_string())),
                }
            }
        }
        Ok(self)
    }
}

/// Unwrapped list response.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Option<Pagination>,
}

/// HTTP client for the SIAD REST API.
///
/// Cheap to clone: clones share the connection pool and the [`AuthStore`].
#[derive(Debug, Clone)]
pub struct ApiClient {
    agent: ureq::Agent,
    base_url: String,
    auth: AuthStore,
    cancel: CancellationToken,
}

impl ApiClient {
    pub fn new(config: ClientConfig, auth: AuthStore) -> Self {
        let agent_config = ureq::Agent::config_builder()
            .timeout_global(Some(config.timeout))
            .http_status_as_error(false)
            .build();
        Self {
            agent: ureq::Agent::new_with_config(agent_config),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth,
            cancel: CancellationToken::new(),
        }
    }

    pub fn auth(&self) -> &AuthStore {
        &self.auth
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// A handle whose requests are cancelled together by `token`.
    pub fn scoped(&self, token: CancellationToken) -> Self {
        Self {
            cancel: token,
            ..self.clone()
        }
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request and decode the full envelope.
    pub(crate) async fn send<T>(&self, request: Request) -> Result<ApiEnvelope<T>, ClientError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        if self.cancel.is_cancelled() {
            return Err(ClientError::Cancelled);
        }
        let agent = self.agent.clone();
        let url = self.url(&request.path);
        let token = self.auth.token();
        let method = request.method;
        let path = request.path.clone();

        let task = tokio::task::spawn_blocking(move || {
            execute(&agent, &url, token.as_deref(), &request)
        });

        let (status, body) = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(ClientError::Cancelled),
            joined = task => joined
                .map_err(|e| ClientError::Transport(format!("request task failed: {e}")))??,
        };
        tracing::debug!(?method, path = %path, status, "api call");
        decode(status, &body)
    }

    /// Send a request and return its `data`.
    pub(crate) async fn data<T>(&self, request: Request) -> Result<T, ClientError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let path = request.path.clone();
        self.send::<T>(request)
            .await?
            .data
            .ok_or_else(|| ClientError::Decode(format!("response to {path} carried no data")))
    }

    /// Send a list request and return its items with pagination.
    pub(crate) async fn page<T>(&self, request: Request) -> Result<Page<T>, ClientError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let envelope = self.send::<Vec<T>>(request).await?;
        Ok(Page {
            items: envelope.data.unwrap_or_default(),
            pagination: envelope.pagination,
        })
    }
}

fn prepare<B>(
    mut builder: ureq::RequestBuilder<B>,
    token: Option<&str>,
    query: &[(String, String)],
) -> ureq::RequestBuilder<B> {
    builder = builder.header("Accept", "application/json");
    if let Some(token) = token {
        builder = builder.header("Authorization", &format!("Bearer {}", token));
    }
    for (key, value) in query {
        builder = builder.query(key, value);
    }
    builder
}

fn send_body(
    builder: ureq::RequestBuilder<WithBody>,
    body: Option<&serde_json::Value>,
) -> Result<ureq::http::Response<ureq::Body>, ureq::Error> {
    match body {
        Some(body) => builder.send_json(body),
        None => builder.send_empty(),
    }
}

fn execute(
    agent: &ureq::Agent,
    url: &str,
    token: Option<&str>,
    request: &Request,
) -> Result<(u16, String), ClientError> {
    let query = request.query.as_slice();
    let body = request.body.as_ref();
    let result = match request.method {
        Method::Get => prepare(agent.get(url), token, query).call(),
        Method::Delete => prepare(agent.delete(url), token, query).call(),
        Method::Post => send_body(prepare(agent.post(url), token, query), body),
        Method::Put => send_body(prepare(agent.put(url), token, query), body),
        Method::Patch => send_body(prepare(agent.patch(url), token, query), body),
    };
    let mut response = result.map_err(|e| ClientError::Transport(e.to_string()))?;
    let status = response.status().as_u16();
    let text = response
        .body_mut()
        .read_to_string()
        .map_err(|e| ClientError::Transport(e.to_string()))?;
    Ok((status, text))
}

/// Map a raw response onto an envelope or an [`ClientError::Api`].
pub(crate) fn decode<T: DeserializeOwned>(
    status: u16,
    body: &str,
) -> Result<ApiEnvelope<T>, ClientError> {
    if !(200..300).contains(&status) {
        let message = serde_json::from_str::<ApiEnvelope<serde_json::Value>>(body)
            .map(|e| e.message)
            .unwrap_or_default();
        return Err(ClientError::Api { status, message });
    }
    let envelope: ApiEnvelope<T> =
        serde_json::from_str(body).map_err(|e| ClientError::Decode(e.to_string()))?;
    if envelope.status == EnvelopeStatus::Error {
        return Err(ClientError::Api {
            status,
            message: envelope.message,
        });
    }
    Ok(envelope)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_status_keeps_envelope_message() {
        let body = r#"{"status":"error","message":"Credenciales inválidas","data":null}"#;
        let err = decode::<serde_json::Value>(401, body).unwrap_err();
        assert_eq!(
            err,
            ClientError::Api {
                status: 401,
                message: "Credenciales inválidas".to_string()
            }
        );
    }

    #[test]
    fn error_status_with_foreign_body_has_empty_message() {
        let err = decode::<serde_json::Value>(502, "<html>Bad gateway</html>").unwrap_err();
        assert_eq!(err.user_message("Servicio no disponible"), "Servicio no disponible");
    }

    #[test]
    fn success_body_that_is_not_an_envelope_is_decode_error() {
        let err = decode::<u32>(200, "[1,2]").unwrap_err();
        assert!(matches!(err, ClientError::Decode(_)));
    }

    #[test]
    fn query_skips_unset_fields() {
        let q = siad_core::requests::DocumentQuery {
            page: Some(3),
            search: Some("oficio".to_string()),
            ..Default::default()
        };
        let req = Request::get("/api/documents").query(&q).unwrap();
        assert_eq!(
            req.query,
            vec![
                ("page".to_string(), "3".to_string()),
                ("search".to_string(), "oficio".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn cancelled_client_does_not_send() {
        let token = CancellationToken::new();
        token.cancel();
        let client = ApiClient::new(ClientConfig::new("http://127.0.0.1:9"), AuthStore::new())
            .scoped(token);
        let err = client
            .send::<serde_json::Value>(Request::get("/api/health"))
            .await
            .unwrap_err();
        assert_eq!(err, ClientError::Cancelled);
    }
}
