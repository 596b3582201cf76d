use serde::Deserialize;

/// One entry of a `/users/{login}/followers` or `/following` page.
#[derive(Debug, Clone, Deserialize)]
pub struct UserSummary {
    pub login: String,
}

/// Profile record from `GET /users/{login}`.
#[derive(Debug, Clone, Deserialize)]
pub struct UserProfile {
    pub login: String,
    pub location: Option<String>,
    #[serde(default)]
    pub public_repos: u32,
    #[serde(default)]
    pub public_gists: u32,
    #[serde(default)]
    pub followers: u32,
    #[serde(default)]
    pub following: u32,
    /// RFC 3339, e.g. "2011-01-25T18:44:36Z". Empty when the API omits it.
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub site_admin: bool,
}
