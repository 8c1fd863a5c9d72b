//! Error types for backend queries.

use thiserror::Error;

/// Why a query against the metrics backend failed.
///
/// Cloneable and string-backed so it can be copied into cached results
/// and rendered by the API.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    #[error("invalid backend address: {0}")]
    Address(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("query timed out after {0}ms")]
    Timeout(u128),

    #[error("backend returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("backend error ({error_type}): {error}")]
    Backend { error_type: String, error: String },

    #[error("malformed response: {0}")]
    Decode(String),

    #[error("query returned no data")]
    NoData,
}
