pub mod error;
pub mod types;

pub use error::{GithubError, Result};
pub use types::{UserProfile, UserSummary};

const BASE_URL: &str = "https://api.github.com";

/// GitHub caps `per_page` at 100 for the list endpoints.
const PER_PAGE: usize = 100;

pub struct GithubClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl GithubClient {
    /// GitHub rejects requests without a User-Agent, so the client always
    /// sends one. The token is optional; unauthenticated calls get the
    /// 60-requests-per-hour quota.
    pub fn new(token: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("orbit/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("Failed to build HTTP client");
        Self {
            client,
            base_url: BASE_URL.to_string(),
            token,
        }
    }

    /// Reads the optional `GITHUB_TOKEN` environment variable.
    pub fn from_env() -> Self {
        Self::new(std::env::var("GITHUB_TOKEN").ok())
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// All accounts following `login`, in the order the API returns them.
    pub async fn followers(&self, login: &str) -> Result<Vec<String>> {
        self.paginated_logins(login, "followers").await
    }

    /// All accounts `login` is following, in the order the API returns them.
    pub async fn following(&self, login: &str) -> Result<Vec<String>> {
        self.paginated_logins(login, "following").await
    }

    /// Profile record for a single account.
    pub async fn user(&self, login: &str) -> Result<UserProfile> {
        let resp = self.get(&format!("/users/{login}"), login).await?;
        let profile: UserProfile = resp.json().await?;
        tracing::debug!(login = %profile.login, "Fetched user profile");
        Ok(profile)
    }

    /// Walk every page of a followers/following listing and collect the
    /// logins. The caller sees one complete list or one terminal error.
    async fn paginated_logins(&self, login: &str, relation: &str) -> Result<Vec<String>> {
        let mut logins = Vec::new();
        let mut page = 1u32;
        loop {
            let path = format!("/users/{login}/{relation}?per_page={PER_PAGE}&page={page}");
            let resp = self.get(&path, login).await?;
            let entries: Vec<UserSummary> = resp.json().await?;
            let count = entries.len();
            logins.extend(entries.into_iter().map(|u| u.login));
            tracing::debug!(login, relation, page, count, "Fetched listing page");
            if count < PER_PAGE {
                break;
            }
            page += 1;
        }
        tracing::info!(login, relation, total = logins.len(), "Fetched complete listing");
        Ok(logins)
    }

    async fn get(&self, path: &str, login: &str) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self
            .client
            .get(&url)
            .header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GithubError::from_status(status.as_u16(), login, body));
        }
        Ok(resp)
    }
}
