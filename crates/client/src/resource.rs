//! Generic fetch-and-hold state for one remote value.
//!
//! A [`Resource`] keeps `{data, loading}` for a single endpoint. Each fetch
//! gets a fresh `CancellationToken` and cancels the previous one, so only the
//! most recent fetch ever writes state. On failure the error is reported
//! through the [`Notifier`] and `data` is reset to `None`.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tokio_util::sync::CancellationToken;

use crate::error::ClientError;
use crate::notify::Notifier;

/// Snapshot of a resource.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceState<T> {
    pub data: Option<T>,
    pub loading: bool,
}

impl<T> Default for ResourceState<T> {
    fn default() -> Self {
        Self {
            data: None,
            loading: false,
        }
    }
}

struct Inner<T> {
    state: ResourceState<T>,
    inflight: CancellationToken,
}

pub struct Resource<T> {
    inner: Arc<Mutex<Inner<T>>>,
    notifier: Arc<dyn Notifier>,
    fallback: String,
}

impl<T> Clone for Resource<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            notifier: self.notifier.clone(),
            fallback: self.fallback.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> Resource<T> {
    /// `fallback` is shown when an error carries no message of its own.
    pub fn new(notifier: Arc<dyn Notifier>, fallback: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state: ResourceState::default(),
                inflight: CancellationToken::new(),
            })),
            notifier,
            fallback: fallback.into(),
        }
    }

    pub fn state(&self) -> ResourceState<T> {
        self.lock().state.clone()
    }

    pub fn data(&self) -> Option<T> {
        self.lock().state.data.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.lock().state.loading
    }

    /// Run `load` and store its result.
    ///
    /// `load` receives the token scoping this fetch. Returns
    /// `Err(ClientError::Cancelled)` without touching state when a newer
    /// fetch or [`Resource::cancel`] supersedes this one.
    pub async fn fetch<F, Fut>(&self, load: F) -> Result<T, ClientError>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let token = {
            let mut inner = self.lock();
            inner.inflight.cancel();
            inner.inflight = CancellationToken::new();
            inner.state.loading = true;
            inner.inflight.clone()
        };

        let result = tokio::select! {
            biased;
            _ = token.cancelled() => Err(ClientError::Cancelled),
            r = load(token.clone()) => r,
        };

        let mut inner = self.lock();
        if token.is_cancelled() {
            return Err(ClientError::Cancelled);
        }
        inner.state.loading = false;
        match result {
            Ok(value) => {
                inner.state.data = Some(value.clone());
                Ok(value)
            }
            Err(ClientError::Cancelled) => Err(ClientError::Cancelled),
            Err(e) => {
                inner.state.data = None;
                drop(inner);
                self.notifier.error(&e.user_message(&self.fallback));
                Err(e)
            }
        }
    }

    /// Abandon the in-flight fetch, if any. Its result will be discarded.
    pub fn cancel(&self) {
        let mut inner = self.lock();
        inner.inflight.cancel();
        inner.state.loading = false;
    }

    /// Replace the held value without fetching.
    pub fn set(&self, data: Option<T>) {
        self.lock().state.data = data;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
