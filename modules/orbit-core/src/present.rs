//! Presentation glue: runs store operations and maps their outcomes onto
//! the display sink, including titles, empty-state text, and the
//! failure-to-notification table.

use crate::document::LoadReport;
use crate::error::{FetchError, StoreError};
use crate::store::TrackerStore;
use crate::traits::{DisplaySink, NoticeLevel};
use crate::types::{EdgeKind, EdgeView, ProfileFields, ViewOrigin};

const RATE_LIMIT_NOTICE: &str =
    "GitHub API rate limit reached or too many requests. Only locally stored data will be shown.";

/// Render one edge direction of `subject`, honoring the cache unless
/// `refresh` forces a fetch.
pub async fn show_edges(
    store: &mut TrackerStore,
    sink: &mut dyn DisplaySink,
    subject: &str,
    kind: EdgeKind,
    refresh: bool,
) {
    let title = match kind {
        EdgeKind::Followers => format!("Followers of {subject}:"),
        EdgeKind::Following => format!("Users {subject} is following:"),
    };
    let empty = match kind {
        EdgeKind::Followers => "(No followers found for this user.)",
        EdgeKind::Following => "(This user is not following anyone.)",
    };

    match store.edge_view(subject, kind, refresh).await {
        Ok(view) => {
            report_view_issues(sink, subject, kind, &view);
            sink.render(&title, &view, empty);
        }
        Err(err) => {
            report_failure(sink, subject, kind, &err);
            sink.render(&title, &EdgeView::empty(), empty);
        }
    }
}

/// Render the accounts `subject` follows that do not follow back.
pub async fn show_not_following_back(
    store: &mut TrackerStore,
    sink: &mut dyn DisplaySink,
    subject: &str,
) {
    let title = format!("Users {subject} follows who don't follow back:");
    let empty = "(Everyone this user follows follows back.)";

    match store.not_following_back(subject).await {
        Ok(view) => {
            report_view_issues(sink, subject, EdgeKind::Following, &view);
            sink.render(&title, &view, empty);
        }
        Err(err) => {
            report_failure(sink, subject, EdgeKind::Following, &err);
            sink.render(&title, &EdgeView::empty(), empty);
        }
    }
}

/// Selection semantics for the detail panel: show the cached detail when
/// there is one, otherwise reset the panel. Returns whether a cached
/// detail was shown.
pub fn show_cached_profile(store: &TrackerStore, sink: &mut dyn DisplaySink, login: &str) -> bool {
    match store.cached_profile(login) {
        Some(detail) => {
            sink.show_detail(login, detail);
            true
        }
        None => {
            sink.clear_detail();
            false
        }
    }
}

/// Apply a completed background profile fetch to store and display.
pub fn apply_profile_result(
    store: &mut TrackerStore,
    sink: &mut dyn DisplaySink,
    login: &str,
    result: Result<ProfileFields, FetchError>,
) {
    match result {
        Ok(fields) => {
            let (detail, persist_error) = store.record_profile(login, fields);
            if let Some(err) = persist_error {
                sink.notify(NoticeLevel::Error, &format!("Could not save data: {err}"));
            }
            sink.show_detail(login, &detail);
        }
        Err(err) => {
            sink.clear_detail();
            sink.notify(
                NoticeLevel::Error,
                &format!("Could not fetch details for {login}: {err}"),
            );
        }
    }
}

/// Surface a corrupt-file load to the operator. A missing file is an
/// ordinary first run and stays silent.
pub fn report_load(sink: &mut dyn DisplaySink, report: &LoadReport) {
    if let Some(err) = &report.corruption {
        sink.notify(
            NoticeLevel::Error,
            &format!("Could not load previous data: {err}. Starting with an empty cache."),
        );
    }
}

fn report_view_issues(
    sink: &mut dyn DisplaySink,
    subject: &str,
    kind: EdgeKind,
    view: &EdgeView,
) {
    if let ViewOrigin::Stale(cause) = &view.origin {
        match cause {
            FetchError::RateLimited => sink.notify(NoticeLevel::Warning, RATE_LIMIT_NOTICE),
            FetchError::NotFound(login) => sink.notify(
                NoticeLevel::Error,
                &format!("GitHub user {login} was not found. Showing saved data."),
            ),
            FetchError::Network(message) => sink.notify(
                NoticeLevel::Error,
                &format!(
                    "Failed to retrieve {kind} for {subject}: {message}. Showing saved data."
                ),
            ),
        }
    }
    if let Some(err) = &view.persist_error {
        sink.notify(NoticeLevel::Error, &format!("Could not save data: {err}"));
    }
}

fn report_failure(sink: &mut dyn DisplaySink, subject: &str, kind: EdgeKind, err: &StoreError) {
    match err {
        StoreError::NoData {
            subject,
            kind,
            cause,
        } => {
            notify_fetch_cause(sink, subject, *kind, cause);
            let noun = match kind {
                EdgeKind::Followers => "follower",
                EdgeKind::Following => "following",
            };
            sink.notify(
                NoticeLevel::Warning,
                &format!("No current or saved {noun} data available."),
            );
        }
        StoreError::RateLimited => {
            notify_fetch_cause(sink, subject, kind, &FetchError::RateLimited);
        }
        StoreError::NotFound(login) => {
            notify_fetch_cause(sink, subject, kind, &FetchError::NotFound(login.clone()));
        }
        StoreError::Network(message) => {
            notify_fetch_cause(sink, subject, kind, &FetchError::Network(message.clone()));
        }
        StoreError::Persistence(message) => {
            sink.notify(NoticeLevel::Error, &format!("Could not save data: {message}"));
        }
    }
}

fn notify_fetch_cause(
    sink: &mut dyn DisplaySink,
    subject: &str,
    kind: EdgeKind,
    cause: &FetchError,
) {
    match cause {
        FetchError::RateLimited => sink.notify(NoticeLevel::Warning, RATE_LIMIT_NOTICE),
        FetchError::NotFound(login) => sink.notify(
            NoticeLevel::Error,
            &format!("GitHub user {login} was not found."),
        ),
        FetchError::Network(message) => sink.notify(
            NoticeLevel::Error,
            &format!("Failed to retrieve {kind} for {subject}: {message}"),
        ),
    }
}
