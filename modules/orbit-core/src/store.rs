//! The tracker store: single owner of the cached social-graph state.
//!
//! Decides cache-versus-fetch per request, merges fetched lists into the
//! document, and persists after every successful mutation. A failed fetch
//! never mutates state; cached data is served stale instead.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::document::{self, LoadReport};
use crate::error::{FetchError, StoreError};
use crate::traits::EdgeSource;
use crate::types::{
    now_second, Document, EdgeKind, EdgeRow, EdgeSet, EdgeView, FollowsBack, ProfileDetail,
    ProfileFields, ViewOrigin,
};

pub struct TrackerStore {
    path: PathBuf,
    source: Arc<dyn EdgeSource>,
    doc: Document,
}

impl TrackerStore {
    /// Load the document at `path` (or start empty) and wrap it with the
    /// given remote source.
    pub fn open(path: impl Into<PathBuf>, source: Arc<dyn EdgeSource>) -> (Self, LoadReport) {
        let path = path.into();
        let (doc, report) = document::load(&path);
        if report.corruption.is_none() {
            info!(path = %path.display(), subjects = doc.users.len(), "Tracker document loaded");
        }
        (Self { path, source, doc }, report)
    }

    /// Shared handle to the remote source, for callers that fetch outside
    /// the store (profile details are applied back via `record_profile`).
    pub fn source(&self) -> Arc<dyn EdgeSource> {
        Arc::clone(&self.source)
    }

    pub fn last_subject(&self) -> Option<&str> {
        self.doc.last_username.as_deref()
    }

    /// Remember the subject the operator is working with. Returns a
    /// persistence error message when the save failed.
    pub fn set_last_subject(&mut self, login: &str) -> Option<String> {
        if self.doc.last_username.as_deref() == Some(login) {
            return None;
        }
        self.doc.last_username = Some(login.to_string());
        self.persist()
    }

    /// One edge direction of `subject`: served from cache when present and
    /// `refresh` is false, otherwise fetched and reconciled.
    pub async fn edge_view(
        &mut self,
        subject: &str,
        kind: EdgeKind,
        refresh: bool,
    ) -> Result<EdgeView, StoreError> {
        let cached = self
            .doc
            .edge_set(subject, kind)
            .map(EdgeSet::is_populated)
            .unwrap_or(false);

        if !refresh && cached {
            return Ok(self.cached_view(subject, kind).await);
        }
        self.refreshed_view(subject, kind).await
    }

    /// Accounts `subject` follows that do not follow back. Both directions
    /// are fetched fresh and reconciled before the difference is taken;
    /// either failure aborts without touching state.
    pub async fn not_following_back(&mut self, subject: &str) -> Result<EdgeView, StoreError> {
        let (followers, following) = tokio::join!(
            self.source.edges(subject, EdgeKind::Followers),
            self.source.edges(subject, EdgeKind::Following)
        );
        let followers = followers?;
        let following = following?;

        let now = now_second();
        let record = self.doc.subject_mut(subject);
        record
            .edge_set_mut(EdgeKind::Followers)
            .reconcile(&followers, now);
        let reconciled = record
            .edge_set_mut(EdgeKind::Following)
            .reconcile(&following, now);

        let follower_set: BTreeSet<&str> = followers.iter().map(String::as_str).collect();
        let rows: Vec<EdgeRow> = reconciled
            .into_iter()
            .filter(|r| !follower_set.contains(r.login.as_str()))
            .map(|r| EdgeRow {
                login: r.login,
                first_seen: Some(r.first_seen),
                is_new: r.is_new,
                follows_back: Some(FollowsBack::No),
            })
            .collect();

        let persist_error = self.persist();
        info!(subject, count = rows.len(), "Computed not-following-back view");

        let (follower_count, following_count) = self.counts(subject);
        Ok(EdgeView {
            rows,
            origin: ViewOrigin::Fetched,
            last_update: Some(now),
            follower_count,
            following_count,
            persist_error,
        })
    }

    /// Cache hit for a login's profile detail.
    pub fn cached_profile(&self, login: &str) -> Option<&ProfileDetail> {
        self.doc.subject(login).and_then(|record| record.details.as_ref())
    }

    /// Apply a completed profile fetch: derive the score, store it
    /// last-writer-wins, persist. State is kept even when the save fails;
    /// the error message rides along for the caller to surface.
    pub fn record_profile(
        &mut self,
        login: &str,
        fields: ProfileFields,
    ) -> (ProfileDetail, Option<String>) {
        let score = crate::score::community_score(&fields, now_second());
        let detail = ProfileDetail::from_fields(fields, score);
        self.doc.subject_mut(login).details = Some(detail.clone());
        let persist_error = self.persist();
        info!(login, score, "Recorded profile detail");
        (detail, persist_error)
    }

    async fn cached_view(&self, subject: &str, kind: EdgeKind) -> EdgeView {
        let mut rows = self
            .doc
            .edge_set(subject, kind)
            .map(EdgeSet::cached_rows)
            .unwrap_or_default();

        if kind == EdgeKind::Following {
            let live = self.live_followers(subject).await;
            annotate_follows_back(&mut rows, live.as_ref());
        }

        let (follower_count, following_count) = self.counts(subject);
        EdgeView {
            rows,
            origin: ViewOrigin::Cached,
            last_update: self
                .doc
                .edge_set(subject, kind)
                .and_then(|set| set.last_update),
            follower_count,
            following_count,
            persist_error: None,
        }
    }

    async fn refreshed_view(
        &mut self,
        subject: &str,
        kind: EdgeKind,
    ) -> Result<EdgeView, StoreError> {
        // For the following direction the follows-back followers lookup
        // runs concurrently with the primary fetch.
        let (fetched, live) = match kind {
            EdgeKind::Followers => (self.source.edges(subject, kind).await, None),
            EdgeKind::Following => {
                tokio::join!(
                    self.source.edges(subject, EdgeKind::Following),
                    self.live_followers(subject)
                )
            }
        };

        let list = match fetched {
            Ok(list) => list,
            Err(cause) => return self.stale_view(subject, kind, cause),
        };

        let now = now_second();
        let reconciled = self
            .doc
            .subject_mut(subject)
            .edge_set_mut(kind)
            .reconcile(&list, now);
        let newcomers = reconciled.iter().filter(|r| r.is_new).count();
        let total = reconciled.len();

        let mut rows: Vec<EdgeRow> = reconciled
            .into_iter()
            .map(|r| EdgeRow {
                login: r.login,
                first_seen: Some(r.first_seen),
                is_new: r.is_new,
                follows_back: None,
            })
            .collect();
        if kind == EdgeKind::Following {
            annotate_follows_back(&mut rows, live.as_ref());
        }

        let persist_error = self.persist();
        info!(subject, kind = %kind, total, newcomers, "Reconciled edge fetch");

        let (follower_count, following_count) = self.counts(subject);
        Ok(EdgeView {
            rows,
            origin: ViewOrigin::Fetched,
            last_update: Some(now),
            follower_count,
            following_count,
            persist_error,
        })
    }

    /// Fetch failed: serve the cached rows unmutated, or report NoData.
    fn stale_view(
        &self,
        subject: &str,
        kind: EdgeKind,
        cause: FetchError,
    ) -> Result<EdgeView, StoreError> {
        let set = self
            .doc
            .edge_set(subject, kind)
            .filter(|set| set.is_populated());
        let Some(set) = set else {
            return Err(StoreError::NoData {
                subject: subject.to_string(),
                kind,
                cause,
            });
        };

        let mut rows = set.cached_rows();
        if kind == EdgeKind::Following {
            // The quota is spent or the network is down, so no second
            // call; annotate from cached followers when there are any.
            let followers = self
                .doc
                .edge_set(subject, EdgeKind::Followers)
                .filter(|set| set.is_populated())
                .map(|set| &set.members);
            annotate_follows_back(&mut rows, followers);
        }

        warn!(subject, kind = %kind, cause = %cause, "Serving stale cached data");
        let (follower_count, following_count) = self.counts(subject);
        Ok(EdgeView {
            rows,
            origin: ViewOrigin::Stale(cause),
            last_update: set.last_update,
            follower_count,
            following_count,
            persist_error: None,
        })
    }

    /// Best-effort live followers lookup for the follows-back column.
    async fn live_followers(&self, subject: &str) -> Option<BTreeSet<String>> {
        match self.source.edges(subject, EdgeKind::Followers).await {
            Ok(list) => Some(list.into_iter().collect()),
            Err(err) => {
                warn!(subject, error = %err, "Follows-back lookup failed, marking unknown");
                None
            }
        }
    }

    /// Cached (followers, following) counts for the header line.
    fn counts(&self, subject: &str) -> (usize, usize) {
        match self.doc.subject(subject) {
            Some(record) => (
                record.followers.members.len(),
                record.following.members.len(),
            ),
            None => (0, 0),
        }
    }

    /// Full-document save. A failure is reported, never rolled back; the
    /// next successful save repairs the file.
    fn persist(&self) -> Option<String> {
        match document::save(&self.doc, &self.path) {
            Ok(()) => None,
            Err(err) => {
                error!(path = %self.path.display(), error = %err, "Failed to persist tracker data");
                Some(err.to_string())
            }
        }
    }
}

fn annotate_follows_back(rows: &mut [EdgeRow], followers: Option<&BTreeSet<String>>) {
    for row in rows {
        row.follows_back = Some(match followers {
            Some(set) if set.contains(&row.login) => FollowsBack::Yes,
            Some(_) => FollowsBack::No,
            None => FollowsBack::Unknown,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockSource;

    fn open_store(dir: &tempfile::TempDir, source: &Arc<MockSource>) -> TrackerStore {
        let path = dir.path().join("tracker.json");
        let (store, _) = TrackerStore::open(path, Arc::clone(source) as Arc<dyn EdgeSource>);
        store
    }

    fn row_logins(view: &EdgeView) -> Vec<&str> {
        view.rows.iter().map(|r| r.login.as_str()).collect()
    }

    #[tokio::test]
    async fn fresh_fetch_populates_reconciles_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(MockSource::new());
        source.add_edges("alice", EdgeKind::Followers, &["bob"]);

        let mut store = open_store(&dir, &source);
        let view = store
            .edge_view("alice", EdgeKind::Followers, false)
            .await
            .unwrap();
        assert_eq!(view.origin, ViewOrigin::Fetched);
        assert_eq!(row_logins(&view), vec!["bob"]);
        assert!(view.rows[0].is_new);
        assert_eq!(view.follower_count, 1);
        assert!(view.persist_error.is_none());

        // A second store over the same file sees the saved state without
        // touching the network.
        let cold = Arc::new(MockSource::new());
        let mut reopened = open_store(&dir, &cold);
        let view = reopened
            .edge_view("alice", EdgeKind::Followers, false)
            .await
            .unwrap();
        assert_eq!(view.origin, ViewOrigin::Cached);
        assert_eq!(row_logins(&view), vec!["bob"]);
        assert!(!view.rows[0].is_new);
        assert_eq!(cold.edge_calls("alice", EdgeKind::Followers), 0);
    }

    #[tokio::test]
    async fn first_seen_survives_refreshes_and_newcomers_are_flagged() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(MockSource::new());
        source.add_edges("alice", EdgeKind::Followers, &["bob"]);

        let mut store = open_store(&dir, &source);
        let first = store
            .edge_view("alice", EdgeKind::Followers, true)
            .await
            .unwrap();
        let bob_seen = first.rows[0].first_seen;

        source.add_edges("alice", EdgeKind::Followers, &["bob", "carol"]);
        let second = store
            .edge_view("alice", EdgeKind::Followers, true)
            .await
            .unwrap();
        assert_eq!(row_logins(&second), vec!["bob", "carol"]);
        assert!(!second.rows[0].is_new);
        assert_eq!(second.rows[0].first_seen, bob_seen);
        assert!(second.rows[1].is_new);
    }

    #[tokio::test]
    async fn failed_refresh_serves_stale_and_mutates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(MockSource::new());
        source.add_edges("alice", EdgeKind::Followers, &["bob"]);

        let mut store = open_store(&dir, &source);
        store
            .edge_view("alice", EdgeKind::Followers, true)
            .await
            .unwrap();
        let before = store.doc.clone();

        source.fail_edges("alice", EdgeKind::Followers, FetchError::RateLimited);
        let view = store
            .edge_view("alice", EdgeKind::Followers, true)
            .await
            .unwrap();
        assert_eq!(view.origin, ViewOrigin::Stale(FetchError::RateLimited));
        assert_eq!(row_logins(&view), vec!["bob"]);
        assert_eq!(store.doc, before);
    }

    #[tokio::test]
    async fn failure_without_cache_is_no_data() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(MockSource::new());
        source.fail_edges(
            "dave",
            EdgeKind::Followers,
            FetchError::Network("boom".to_string()),
        );

        let mut store = open_store(&dir, &source);
        let err = store
            .edge_view("dave", EdgeKind::Followers, false)
            .await
            .unwrap_err();
        match err {
            StoreError::NoData { subject, kind, cause } => {
                assert_eq!(subject, "dave");
                assert_eq!(kind, EdgeKind::Followers);
                assert_eq!(cause, FetchError::Network("boom".to_string()));
            }
            other => panic!("expected NoData, got {other:?}"),
        }
        assert!(store.doc.subject("dave").is_none());
    }

    #[tokio::test]
    async fn empty_fetch_is_a_successful_refresh() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(MockSource::new());
        source.add_edges("alice", EdgeKind::Followers, &["bob"]);

        let mut store = open_store(&dir, &source);
        store
            .edge_view("alice", EdgeKind::Followers, true)
            .await
            .unwrap();

        source.add_edges("alice", EdgeKind::Followers, &[]);
        let view = store
            .edge_view("alice", EdgeKind::Followers, true)
            .await
            .unwrap();
        assert_eq!(view.origin, ViewOrigin::Fetched);
        assert!(view.rows.is_empty());

        let set = store.doc.edge_set("alice", EdgeKind::Followers).unwrap();
        assert!(set.members.is_empty());
        // History is kept in case bob comes back.
        assert!(set.first_seen.contains_key("bob"));
    }

    #[tokio::test]
    async fn cached_followers_view_skips_the_network() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(MockSource::new());
        source.add_edges("alice", EdgeKind::Followers, &["zoe", "abe"]);

        let mut store = open_store(&dir, &source);
        store
            .edge_view("alice", EdgeKind::Followers, false)
            .await
            .unwrap();
        let view = store
            .edge_view("alice", EdgeKind::Followers, false)
            .await
            .unwrap();
        assert_eq!(view.origin, ViewOrigin::Cached);
        // Cached rows come back sorted rather than in fetch order.
        assert_eq!(row_logins(&view), vec!["abe", "zoe"]);
        assert_eq!(source.edge_calls("alice", EdgeKind::Followers), 1);
    }

    #[tokio::test]
    async fn force_refresh_bypasses_a_populated_cache() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(MockSource::new());
        source.add_edges("alice", EdgeKind::Followers, &["bob"]);

        let mut store = open_store(&dir, &source);
        store
            .edge_view("alice", EdgeKind::Followers, false)
            .await
            .unwrap();

        source.add_edges("alice", EdgeKind::Followers, &["bob", "carol"]);
        let view = store
            .edge_view("alice", EdgeKind::Followers, true)
            .await
            .unwrap();
        assert_eq!(view.origin, ViewOrigin::Fetched);
        assert_eq!(row_logins(&view), vec!["bob", "carol"]);
        assert_eq!(source.edge_calls("alice", EdgeKind::Followers), 2);
    }

    #[tokio::test]
    async fn following_refresh_annotates_follows_back() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(MockSource::new());
        source.add_edges("alice", EdgeKind::Following, &["bob", "carol"]);
        source.add_edges("alice", EdgeKind::Followers, &["carol"]);

        let mut store = open_store(&dir, &source);
        let view = store
            .edge_view("alice", EdgeKind::Following, true)
            .await
            .unwrap();
        assert_eq!(view.rows[0].follows_back, Some(FollowsBack::No));
        assert_eq!(view.rows[1].follows_back, Some(FollowsBack::Yes));
    }

    #[tokio::test]
    async fn follows_back_is_unknown_when_the_lookup_fails() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(MockSource::new());
        source.add_edges("alice", EdgeKind::Following, &["bob"]);
        source.fail_edges("alice", EdgeKind::Followers, FetchError::RateLimited);

        let mut store = open_store(&dir, &source);
        let view = store
            .edge_view("alice", EdgeKind::Following, true)
            .await
            .unwrap();
        assert_eq!(view.origin, ViewOrigin::Fetched);
        assert_eq!(view.rows[0].follows_back, Some(FollowsBack::Unknown));
    }

    #[tokio::test]
    async fn stale_following_annotates_from_cached_followers() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(MockSource::new());
        source.add_edges("alice", EdgeKind::Following, &["bob", "carol"]);
        source.add_edges("alice", EdgeKind::Followers, &["carol"]);

        let mut store = open_store(&dir, &source);
        store
            .edge_view("alice", EdgeKind::Followers, true)
            .await
            .unwrap();
        store
            .edge_view("alice", EdgeKind::Following, true)
            .await
            .unwrap();

        source.fail_edges("alice", EdgeKind::Following, FetchError::RateLimited);
        source.fail_edges("alice", EdgeKind::Followers, FetchError::RateLimited);
        let view = store
            .edge_view("alice", EdgeKind::Following, true)
            .await
            .unwrap();
        assert_eq!(view.origin, ViewOrigin::Stale(FetchError::RateLimited));
        let bob = view.rows.iter().find(|r| r.login == "bob").unwrap();
        let carol = view.rows.iter().find(|r| r.login == "carol").unwrap();
        assert_eq!(bob.follows_back, Some(FollowsBack::No));
        assert_eq!(carol.follows_back, Some(FollowsBack::Yes));
    }

    #[tokio::test]
    async fn not_following_back_diffs_in_following_order() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(MockSource::new());
        source.add_edges("alice", EdgeKind::Followers, &["bob"]);
        source.add_edges("alice", EdgeKind::Following, &["bob", "carol", "dave"]);

        let mut store = open_store(&dir, &source);
        let view = store.not_following_back("alice").await.unwrap();
        assert_eq!(row_logins(&view), vec!["carol", "dave"]);
        assert!(view
            .rows
            .iter()
            .all(|r| r.follows_back == Some(FollowsBack::No)));
        assert_eq!(view.follower_count, 1);
        assert_eq!(view.following_count, 3);

        // Both directions were reconciled and persisted.
        let cold = Arc::new(MockSource::new());
        let reopened = open_store(&dir, &cold);
        let record = reopened.doc.subject("alice").unwrap();
        assert_eq!(record.followers.members.len(), 1);
        assert_eq!(record.following.members.len(), 3);
        assert!(record.following.first_seen.contains_key("carol"));
    }

    #[tokio::test]
    async fn not_following_back_empty_when_everyone_reciprocates() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(MockSource::new());
        source.add_edges("alice", EdgeKind::Followers, &["bob", "carol"]);
        source.add_edges("alice", EdgeKind::Following, &["bob", "carol"]);

        let mut store = open_store(&dir, &source);
        let view = store.not_following_back("alice").await.unwrap();
        assert!(view.rows.is_empty());
        assert_eq!(view.origin, ViewOrigin::Fetched);
    }

    #[tokio::test]
    async fn not_following_back_aborts_cleanly_when_either_side_fails() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(MockSource::new());
        source.add_edges("alice", EdgeKind::Followers, &["bob"]);
        source.add_edges("alice", EdgeKind::Following, &["bob", "carol"]);

        let mut store = open_store(&dir, &source);
        store.not_following_back("alice").await.unwrap();
        let before = store.doc.clone();

        source.fail_edges("alice", EdgeKind::Followers, FetchError::RateLimited);
        let err = store.not_following_back("alice").await.unwrap_err();
        assert!(matches!(err, StoreError::RateLimited));
        assert_eq!(store.doc, before);
    }

    #[tokio::test]
    async fn persist_failure_is_reported_but_state_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        // A directory at the target path makes the atomic rename fail.
        let path = dir.path().join("blocked");
        std::fs::create_dir(&path).unwrap();

        let source = Arc::new(MockSource::new());
        source.add_edges("alice", EdgeKind::Followers, &["bob"]);
        let (mut store, _) = TrackerStore::open(&path, Arc::clone(&source) as Arc<dyn EdgeSource>);

        let view = store
            .edge_view("alice", EdgeKind::Followers, true)
            .await
            .unwrap();
        assert!(view.persist_error.is_some());
        assert_eq!(row_logins(&view), vec!["bob"]);
        assert!(store
            .doc
            .edge_set("alice", EdgeKind::Followers)
            .unwrap()
            .members
            .contains("bob"));
    }

    #[tokio::test]
    async fn last_subject_round_trips_through_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(MockSource::new());
        let mut store = open_store(&dir, &source);
        assert_eq!(store.last_subject(), None);
        assert!(store.set_last_subject("alice").is_none());
        // Setting the same subject again is a no-op.
        assert!(store.set_last_subject("alice").is_none());

        let reopened = open_store(&dir, &source);
        assert_eq!(reopened.last_subject(), Some("alice"));
    }

    #[tokio::test]
    async fn profile_details_are_cached_last_writer_wins() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(MockSource::new());
        let mut store = open_store(&dir, &source);
        assert!(store.cached_profile("carol").is_none());

        let fields = ProfileFields {
            followers: 3,
            public_repos: 2,
            public_gists: 1,
            ..Default::default()
        };
        // Empty created_at contributes zero age: 3*2 + 2*1.5 + 1 = 10.
        let (detail, persist_error) = store.record_profile("carol", fields);
        assert_eq!(detail.score, 10);
        assert!(persist_error.is_none());
        assert_eq!(store.cached_profile("carol"), Some(&detail));

        let updated = ProfileFields {
            followers: 4,
            ..Default::default()
        };
        let (detail, _) = store.record_profile("carol", updated);
        assert_eq!(detail.score, 8);
        assert_eq!(store.cached_profile("carol").unwrap().followers, 4);

        let reopened = open_store(&dir, &source);
        assert_eq!(reopened.cached_profile("carol").unwrap().followers, 4);
    }
}
