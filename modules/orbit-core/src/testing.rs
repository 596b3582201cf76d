// Test doubles for the tracker core.
//
// MockSource scripts EdgeSource results per (subject, kind) and logs every
// edge call so tests can assert the cache short-circuited the network.
// RecordingSink captures everything handed to the display.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::FetchError;
use crate::traits::{DisplaySink, EdgeSource, NoticeLevel};
use crate::types::{EdgeKind, EdgeView, ProfileDetail, ProfileFields};

type EdgeResult = Result<Vec<String>, FetchError>;
type ProfileResult = Result<ProfileFields, FetchError>;

/// Scripted edge source. Unscripted lookups return a network error.
#[derive(Default)]
pub struct MockSource {
    edge_results: Mutex<HashMap<(String, EdgeKind), EdgeResult>>,
    profile_results: Mutex<HashMap<String, ProfileResult>>,
    edge_log: Mutex<Vec<(String, EdgeKind)>>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_edges(&self, subject: &str, kind: EdgeKind, logins: &[&str]) {
        self.edge_results.lock().unwrap().insert(
            (subject.to_string(), kind),
            Ok(logins.iter().map(|s| s.to_string()).collect()),
        );
    }

    pub fn fail_edges(&self, subject: &str, kind: EdgeKind, err: FetchError) {
        self.edge_results
            .lock()
            .unwrap()
            .insert((subject.to_string(), kind), Err(err));
    }

    pub fn add_profile(&self, login: &str, fields: ProfileFields) {
        self.profile_results
            .lock()
            .unwrap()
            .insert(login.to_string(), Ok(fields));
    }

    pub fn fail_profile(&self, login: &str, err: FetchError) {
        self.profile_results
            .lock()
            .unwrap()
            .insert(login.to_string(), Err(err));
    }

    /// Number of edge fetches issued for (subject, kind).
    pub fn edge_calls(&self, subject: &str, kind: EdgeKind) -> usize {
        self.edge_log
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, k)| s == subject && *k == kind)
            .count()
    }
}

#[async_trait]
impl EdgeSource for MockSource {
    async fn edges(&self, subject: &str, kind: EdgeKind) -> EdgeResult {
        self.edge_log
            .lock()
            .unwrap()
            .push((subject.to_string(), kind));
        self.edge_results
            .lock()
            .unwrap()
            .get(&(subject.to_string(), kind))
            .cloned()
            .unwrap_or_else(|| Err(FetchError::Network(format!("no edges scripted for {subject} {kind}"))))
    }

    async fn profile(&self, login: &str) -> ProfileResult {
        self.profile_results
            .lock()
            .unwrap()
            .get(login)
            .cloned()
            .unwrap_or_else(|| Err(FetchError::Network(format!("no profile scripted for {login}"))))
    }
}

/// One captured `render` call.
#[derive(Debug, Clone)]
pub struct RenderCall {
    pub title: String,
    pub view: EdgeView,
    pub empty_message: String,
}

/// Captures everything handed to the display for assertions.
#[derive(Default)]
pub struct RecordingSink {
    pub renders: Vec<RenderCall>,
    pub details: Vec<(String, ProfileDetail)>,
    pub notices: Vec<(NoticeLevel, String)>,
    pub detail_clears: usize,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_render(&self) -> &RenderCall {
        self.renders.last().expect("no render recorded")
    }

    pub fn notice_messages(&self) -> Vec<&str> {
        self.notices.iter().map(|(_, message)| message.as_str()).collect()
    }
}

impl DisplaySink for RecordingSink {
    fn render(&mut self, title: &str, view: &EdgeView, empty_message: &str) {
        self.renders.push(RenderCall {
            title: title.to_string(),
            view: view.clone(),
            empty_message: empty_message.to_string(),
        });
    }

    fn show_detail(&mut self, login: &str, detail: &ProfileDetail) {
        self.details.push((login.to_string(), detail.clone()));
    }

    fn clear_detail(&mut self) {
        self.detail_clears += 1;
    }

    fn notify(&mut self, level: NoticeLevel, message: &str) {
        self.notices.push((level, message.to_string()));
    }
}
