//! Community score for a profile snapshot.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

use crate::types::ProfileFields;

/// Weighted score, truncated toward zero: two points per follower, one and
/// a half per public repo, one per gist, two per year of account age, plus
/// a twenty point site-admin bonus.
pub fn community_score(fields: &ProfileFields, now: DateTime<Utc>) -> i64 {
    score_from_parts(
        fields.followers,
        fields.public_repos,
        fields.public_gists,
        account_age_years(&fields.created_at, now),
        fields.site_admin,
    )
}

pub fn score_from_parts(
    followers: u32,
    public_repos: u32,
    public_gists: u32,
    age_years: f64,
    site_admin: bool,
) -> i64 {
    let score = f64::from(followers) * 2.0
        + f64::from(public_repos) * 1.5
        + f64::from(public_gists)
        + age_years * 2.0
        + if site_admin { 20.0 } else { 0.0 };
    score as i64
}

/// Account age in fractional years. An unparseable creation timestamp
/// counts as zero rather than failing the score.
pub fn account_age_years(created_at: &str, now: DateTime<Utc>) -> f64 {
    let Some(created) = parse_created_at(created_at) else {
        return 0.0;
    };
    (now - created).num_days() as f64 / 365.25
}

fn parse_created_at(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Some(t.with_timezone(&Utc));
    }
    // Zone-less variant seen in older cache files.
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}
