//! siad-client: typed access to the SIAD REST API.
//!
//! [`ApiClient`] wraps a blocking `ureq` agent behind async methods that run
//! on the blocking pool and honour a `CancellationToken`. On top of it sit
//! the pieces a dashboard needs: [`Resource`] for `{data, loading}` state,
//! the analytics fetchers, [`RestoreTracker`], the web-vitals reporter and
//! the auth and theme stores.

pub mod analytics;
mod api;
mod error;
mod http;
pub mod notify;
mod resource;
pub mod restore;
pub mod store;
pub mod vitals;

pub use analytics::AnalyticsFetchers;
pub use api::{Health, RevertOutcome, SignOutcome, Verification};
pub use error::ClientError;
pub use http::{ApiClient, ClientConfig, Page};
pub use notify::{Notifier, TracingNotifier};
pub use resource::{Resource, ResourceState};
pub use restore::RestoreTracker;
pub use store::{AuthStore, Theme, ThemeStore};
pub use vitals::VitalsReporter;
