use serde::Serialize;

/// Paging metadata attached to list responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    /// 1-based page index.
    pub page: u64,
    /// Items per page.
    pub page_size: u64,
    /// Total item count across all pages.
    pub total: u64,
    /// Total page count.
    pub total_pages: u64,
}

impl Pagination {
    /// Builds paging metadata, deriving `total_pages` from the counts.
    pub fn new(page: u64, page_size: u64, total: u64) -> Self {
        let total_pages = if page_size == 0 {
            0
        } else {
            total.div_ceil(page_size)
        };
        Pagination {
            page,
            page_size,
            total,
            total_pages,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub(crate) enum EnvelopeResult {
    #[serde(rename = "success")]
    Success,
    #[serde(rename = "error")]
    Error,
}

/// The standard response shape for every non-streaming reply.
///
/// `time` is seconds since the request started, with nanosecond
/// precision. On errors, `token` carries the wire form of the error
/// code so clients can dispatch on it without parsing `message`.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) data: Option<T>,
    pub(crate) time: f64,
    pub(crate) result: EnvelopeResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) paging: Option<Pagination>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) token: Option<&'static str>,
}

impl<T: Serialize> Envelope<T> {
    pub(crate) fn success(data: Option<T>, paging: Option<Pagination>, time: f64) -> Self {
        Envelope {
            data,
            time,
            result: EnvelopeResult::Success,
            message: None,
            paging,
            token: None,
        }
    }
}

impl Envelope<()> {
    pub(crate) fn error(token: &'static str, message: String, time: f64) -> Self {
        Envelope {
            data: None,
            time,
            result: EnvelopeResult::Error,
            message: Some(message),
            paging: None,
            token: Some(token),
        }
    }
}
