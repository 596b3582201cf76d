use thiserror::Error;

pub type Result<T> = std::result::Result<T, GithubError>;

#[derive(Debug, Error)]
pub enum GithubError {
    #[error("rate limit exceeded")]
    RateLimited,

    #[error("user not found: {0}")]
    NotFound(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("parse error: {0}")]
    Parse(String),
}

impl GithubError {
    /// Classify a non-success HTTP status. Unauthenticated GitHub reports
    /// rate limiting as 403, authenticated as 429.
    pub(crate) fn from_status(status: u16, login: &str, body: String) -> Self {
        match status {
            403 | 429 => GithubError::RateLimited,
            404 => GithubError::NotFound(login.to_string()),
            _ => GithubError::Api {
                status,
                message: body,
            },
        }
    }
}

impl From<reqwest::Error> for GithubError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            GithubError::Parse(err.to_string())
        } else {
            GithubError::Network(err.to_string())
        }
    }
}
