//! siad-core: domain model and pure decision logic for the SIAD archive.
//!
//! Everything in this crate is synchronous and side-effect free. The backend
//! (`siad-cli serve`) and the typed client (`siad-client`) both depend on it,
//! so the wire shapes of entities and the rules for moving them between
//! states live in one place.
//!
//! - [`model`] -- entities as they travel over the REST API
//! - [`flow`] -- signature flow state machine and the open-flow redirect rule
//! - [`jobs`] -- backup / restore status machines
//! - [`gate`] -- page gate decision table for the `access_token` cookie
//! - [`analytics`] -- percentage, trend and grouping helpers
//! - [`vitals`] -- web-vitals payload
//! - [`envelope`] -- `{status, message, data, pagination}` response envelope
//! - [`requests`] -- request bodies and list queries

pub mod analytics;
pub mod clock;
pub mod envelope;
pub mod flow;
pub mod gate;
pub mod jobs;
pub mod model;
pub mod requests;
pub mod vitals;

pub use envelope::{ApiEnvelope, EnvelopeStatus, PageQuery, Pagination};
pub use flow::{FlowError, FlowRedirect};
pub use gate::{gate_decision, GateDecision};
pub use jobs::{BackupStatus, RestoreStatus, TransitionError};
pub use model::*;
pub use vitals::WebVitalPayload;

/// Service name reported by the health endpoint and log lines.
pub const SERVICE_NAME: &str = "siad";

/// Version of the REST API surface.
pub const API_VERSION: &str = "1.0.0";
