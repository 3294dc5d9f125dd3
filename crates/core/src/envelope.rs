//! Uniform response envelope: `{status, message, data, pagination?}`.

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub status: EnvelopeStatus,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

impl<T> ApiEnvelope<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            status: EnvelopeStatus::Success,
            message: message.into(),
            data: Some(data),
            pagination: None,
        }
    }

    pub fn paginated(message: impl Into<String>, data: T, pagination: Pagination) -> Self {
        Self {
            status: EnvelopeStatus::Success,
            message: message.into(),
            data: Some(data),
            pagination: Some(pagination),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: EnvelopeStatus::Error,
            message: message.into(),
            data: None,
            pagination: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == EnvelopeStatus::Success
    }
}

/// `page` / `limit` query parameters, 1-based.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageQuery {
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: Some(page),
            limit: Some(limit),
        }
    }

    /// Page number clamped to at least 1.
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    /// Page size clamped to `1..=MAX_PAGE_SIZE`.
    pub fn limit(&self) -> u32 {
        self.limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    /// Slice one page out of `items` and describe it.
    pub fn apply<T>(&self, items: Vec<T>) -> (Vec<T>, Pagination) {
        let page = self.page();
        let limit = self.limit();
        let total = items.len() as u64;
        let total_pages = total.div_ceil(limit as u64) as u32;
        let skip = ((page - 1) as usize).saturating_mul(limit as usize);
        let data = items.into_iter().skip(skip).take(limit as usize).collect();
        (
            data,
            Pagination {
                page,
                limit,
                total,
                total_pages,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_shape() {
        let env = ApiEnvelope::success("ok", vec![1, 2]);
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["data"], serde_json::json!([1, 2]));
        assert!(json.get("pagination").is_none());

        let err: ApiEnvelope<()> = ApiEnvelope::error("boom");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["message"], "boom");
        assert!(json["data"].is_null());
    }

    #[test]
    fn paging_slices_and_counts() {
        let items: Vec<u32> = (1..=45).collect();
        let (page, meta) = PageQuery::new(3, 20).apply(items);
        assert_eq!(page, vec![41, 42, 43, 44, 45]);
        assert_eq!(meta.total, 45);
        assert_eq!(meta.total_pages, 3);
    }

    #[test]
    fn paging_clamps_inputs() {
        let q = PageQuery {
            page: Some(0),
            limit: Some(1000),
        };
        assert_eq!(q.page(), 1);
        assert_eq!(q.limit(), MAX_PAGE_SIZE);
        let (page, meta) = PageQuery::default().apply(Vec::<u8>::new());
        assert!(page.is_empty());
        assert_eq!(meta.total_pages, 0);
    }
}
