//! Core Web Vitals payload sent by the dashboard to the collection endpoint.

use serde::{Deserialize, Serialize};

/// Collection endpoint path.
pub const WEB_VITALS_PATH: &str = "/api/analytics/web-vitals";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VitalRating {
    Good,
    NeedsImprovement,
    Poor,
}

/// One metric sample. Every field is always serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebVitalPayload {
    pub id: String,
    pub name: String,
    pub value: f64,
    pub rating: VitalRating,
    pub delta: f64,
    pub navigation_type: String,
    pub href: String,
    pub user_agent: String,
    pub timestamp: u64,
}

/// Field names the collector requires.
pub const REQUIRED_FIELDS: [&str; 9] = [
    "id",
    "name",
    "value",
    "rating",
    "delta",
    "navigationType",
    "href",
    "userAgent",
    "timestamp",
];
