use thiserror::Error;

use crate::types::EdgeKind;

/// Classification of a remote fetch failure, as the store reasons about it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("rate limit exceeded")]
    RateLimited,

    #[error("user not found: {0}")]
    NotFound(String),

    #[error("network error: {0}")]
    Network(String),
}

/// Failures crossing the tracker-store boundary.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("rate limit exceeded")]
    RateLimited,

    #[error("user not found: {0}")]
    NotFound(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("no cached or live {kind} data for {subject}: {cause}")]
    NoData {
        subject: String,
        kind: EdgeKind,
        cause: FetchError,
    },

    #[error("could not persist tracker data: {0}")]
    Persistence(String),
}

impl From<FetchError> for StoreError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::RateLimited => StoreError::RateLimited,
            FetchError::NotFound(login) => StoreError::NotFound(login),
            FetchError::Network(message) => StoreError::Network(message),
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Persistence(err.to_string())
    }
}
