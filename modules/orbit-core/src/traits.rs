// Boundary traits for the tracker core.
//
// EdgeSource is the remote social-graph service behind one async trait,
// implemented here for GithubClient and in testing for MockSource.
// DisplaySink is the presentation surface the core talks to; the console
// front-end implements it, tests use RecordingSink.

use async_trait::async_trait;

use crate::error::FetchError;
use crate::types::{EdgeKind, EdgeView, ProfileDetail, ProfileFields};

#[async_trait]
pub trait EdgeSource: Send + Sync {
    /// Complete membership list for one edge direction of `subject`.
    async fn edges(&self, subject: &str, kind: EdgeKind) -> Result<Vec<String>, FetchError>;

    /// Profile fields for a single login.
    async fn profile(&self, login: &str) -> Result<ProfileFields, FetchError>;
}

#[async_trait]
impl EdgeSource for github_client::GithubClient {
    async fn edges(&self, subject: &str, kind: EdgeKind) -> Result<Vec<String>, FetchError> {
        let result = match kind {
            EdgeKind::Followers => self.followers(subject).await,
            EdgeKind::Following => self.following(subject).await,
        };
        result.map_err(FetchError::from)
    }

    async fn profile(&self, login: &str) -> Result<ProfileFields, FetchError> {
        let profile = self.user(login).await.map_err(FetchError::from)?;
        Ok(ProfileFields {
            location: profile.location,
            public_repos: profile.public_repos,
            public_gists: profile.public_gists,
            following: profile.following,
            followers: profile.followers,
            created_at: profile.created_at,
            site_admin: profile.site_admin,
        })
    }
}

impl From<github_client::GithubError> for FetchError {
    fn from(err: github_client::GithubError) -> Self {
        use github_client::GithubError;
        match err {
            GithubError::RateLimited => FetchError::RateLimited,
            GithubError::NotFound(login) => FetchError::NotFound(login),
            other => FetchError::Network(other.to_string()),
        }
    }
}

/// Severity of an operator notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

pub trait DisplaySink {
    /// Replace the table contents. When `view.rows` is empty the sink
    /// shows `empty_message` instead.
    fn render(&mut self, title: &str, view: &EdgeView, empty_message: &str);

    /// Fill the detail panel for `login`.
    fn show_detail(&mut self, login: &str, detail: &ProfileDetail);

    /// Reset the detail panel to its placeholder state.
    fn clear_detail(&mut self);

    /// Operator-facing message outside the table.
    fn notify(&mut self, level: NoticeLevel, message: &str);
}
