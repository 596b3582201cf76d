use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDateTime, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FetchError;

// ---------------------------------------------------------------------------
// Timestamps
// ---------------------------------------------------------------------------

/// Stamp format shared with data files written by earlier versions of the
/// tool: second precision, no zone, UTC by convention.
pub const STAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn format_stamp(at: DateTime<Utc>) -> String {
    at.format(STAMP_FORMAT).to_string()
}

/// Accepts the native stamp format plus RFC 3339 for entries written by
/// other tooling.
pub fn parse_stamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, STAMP_FORMAT) {
        return Some(Utc.from_utc_datetime(&naive));
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Current instant truncated to second precision, matching what the data
/// file can represent.
pub fn now_second() -> DateTime<Utc> {
    let now = Utc::now();
    now.with_nanosecond(0).unwrap_or(now)
}

// ---------------------------------------------------------------------------
// Edge sets
// ---------------------------------------------------------------------------

/// Direction of a tracked relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    Followers,
    Following,
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            EdgeKind::Followers => "followers",
            EdgeKind::Following => "following",
        })
    }
}

/// Cached membership and first-seen history for one direction of one
/// subject's graph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeSet {
    pub members: BTreeSet<String>,
    pub first_seen: BTreeMap<String, DateTime<Utc>>,
    pub last_update: Option<DateTime<Utc>>,
}

/// One login out of a reconciliation pass, in fetch order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub login: String,
    pub first_seen: DateTime<Utc>,
    pub is_new: bool,
}

impl EdgeSet {
    pub fn is_populated(&self) -> bool {
        !self.members.is_empty()
    }

    /// Merge a freshly fetched membership list: stamp first-seen for
    /// newcomers, replace the membership set, record the refresh instant.
    /// Returns the deduplicated fetch order with per-login diff flags.
    /// First-seen stamps of logins that left are kept in case they return.
    pub fn reconcile(&mut self, fetched: &[String], now: DateTime<Utc>) -> Vec<Reconciled> {
        let previous = std::mem::take(&mut self.members);
        let mut out = Vec::with_capacity(fetched.len());
        for login in fetched {
            if !self.members.insert(login.clone()) {
                continue;
            }
            let first_seen = *self.first_seen.entry(login.clone()).or_insert(now);
            out.push(Reconciled {
                login: login.clone(),
                first_seen,
                is_new: !previous.contains(login),
            });
        }
        self.last_update = Some(now);
        out
    }

    /// Rows for a cache-served view: sorted members, no newcomer flags.
    pub fn cached_rows(&self) -> Vec<EdgeRow> {
        self.members
            .iter()
            .map(|login| EdgeRow {
                login: login.clone(),
                first_seen: self.first_seen.get(login).copied(),
                is_new: false,
                follows_back: None,
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// Best-effort answer to "does this account follow the subject back".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowsBack {
    Yes,
    No,
    Unknown,
}

/// One table row handed to the display sink.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeRow {
    pub login: String,
    pub first_seen: Option<DateTime<Utc>>,
    pub is_new: bool,
    /// Populated for following-direction views only.
    pub follows_back: Option<FollowsBack>,
}

/// Where the rows of a view came from.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewOrigin {
    /// Reconciled from a successful fetch.
    Fetched,
    /// Served from the cache without contacting the network.
    Cached,
    /// The fetch failed; cached rows are shown instead.
    Stale(FetchError),
}

/// A render-ready view of one edge direction (or of the not-following-back
/// difference).
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeView {
    pub rows: Vec<EdgeRow>,
    pub origin: ViewOrigin,
    pub last_update: Option<DateTime<Utc>>,
    pub follower_count: usize,
    pub following_count: usize,
    /// Set when the post-mutation save failed; state is kept, caller warns.
    pub persist_error: Option<String>,
}

impl EdgeView {
    /// A rendered-nothing view for failure paths.
    pub fn empty() -> Self {
        Self {
            rows: Vec::new(),
            origin: ViewOrigin::Cached,
            last_update: None,
            follower_count: 0,
            following_count: 0,
            persist_error: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Profiles
// ---------------------------------------------------------------------------

/// Raw profile fields as returned by the remote service.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileFields {
    pub location: Option<String>,
    pub public_repos: u32,
    pub public_gists: u32,
    pub following: u32,
    pub followers: u32,
    pub created_at: String,
    pub site_admin: bool,
}

/// Cached profile snapshot plus the derived community score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileDetail {
    pub location: Option<String>,
    #[serde(default)]
    pub public_repos: u32,
    #[serde(default)]
    pub public_gists: u32,
    #[serde(default)]
    pub following: u32,
    #[serde(default)]
    pub followers: u32,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub site_admin: bool,
    #[serde(default)]
    pub score: i64,
}

impl ProfileDetail {
    pub fn from_fields(fields: ProfileFields, score: i64) -> Self {
        Self {
            location: fields.location,
            public_repos: fields.public_repos,
            public_gists: fields.public_gists,
            following: fields.following,
            followers: fields.followers,
            created_at: fields.created_at,
            site_admin: fields.site_admin,
            score,
        }
    }
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// Everything tracked for one login: both edge directions plus the lazily
/// cached profile detail.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubjectRecord {
    pub followers: EdgeSet,
    pub following: EdgeSet,
    pub details: Option<ProfileDetail>,
}

impl SubjectRecord {
    pub fn edge_set(&self, kind: EdgeKind) -> &EdgeSet {
        match kind {
            EdgeKind::Followers => &self.followers,
            EdgeKind::Following => &self.following,
        }
    }

    pub fn edge_set_mut(&mut self, kind: EdgeKind) -> &mut EdgeSet {
        match kind {
            EdgeKind::Followers => &mut self.followers,
            EdgeKind::Following => &mut self.following,
        }
    }
}

/// The persisted root: per-login records plus UI convenience metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub last_username: Option<String>,
    pub users: BTreeMap<String, SubjectRecord>,
}

impl Document {
    pub fn subject(&self, login: &str) -> Option<&SubjectRecord> {
        self.users.get(login)
    }

    pub fn subject_mut(&mut self, login: &str) -> &mut SubjectRecord {
        self.users.entry(login.to_string()).or_default()
    }

    pub fn edge_set(&self, login: &str, kind: EdgeKind) -> Option<&EdgeSet> {
        self.users.get(login).map(|record| record.edge_set(kind))
    }
}
