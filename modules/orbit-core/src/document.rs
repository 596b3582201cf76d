//! Load/save for the tracker document.
//!
//! One JSON file holds every tracked login: membership lists, first-seen
//! timestamp maps, last-update stamps, and cached profile details. Reads
//! are tolerant: each category degrades independently, so a malformed
//! entry never discards the rest of the history. Writes replace the whole
//! file through a same-directory temp file and an atomic rename.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::error::StoreError;
use crate::types::{format_stamp, parse_stamp, Document, ProfileDetail, SubjectRecord};

/// Outcome of loading the document file.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Set when the file existed but was unusable as a whole; the document
    /// was reset to empty.
    pub corruption: Option<String>,
    /// Entries dropped or coerced during tolerant decoding.
    pub degraded: usize,
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Read the document at `path`. A missing file is an ordinary first run; a
/// corrupt one resets to empty and is reported through the [`LoadReport`].
pub fn load(path: &Path) -> (Document, LoadReport) {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return (Document::default(), LoadReport::default());
        }
        Err(err) => return corrupt(err.to_string()),
    };

    let root = match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Object(root)) => root,
        Ok(_) => return corrupt("top level is not a JSON object".to_string()),
        Err(err) => return corrupt(err.to_string()),
    };

    let mut report = LoadReport::default();
    let doc = lower_document(root, &mut report);
    (doc, report)
}

fn corrupt(message: String) -> (Document, LoadReport) {
    warn!(error = %message, "Tracker document unreadable, starting empty");
    (
        Document::default(),
        LoadReport {
            corruption: Some(message),
            degraded: 0,
        },
    )
}

fn lower_document(mut root: serde_json::Map<String, Value>, report: &mut LoadReport) -> Document {
    let last_username = root
        .remove("_metadata")
        .as_ref()
        .and_then(|meta| meta.get("last_username"))
        .and_then(Value::as_str)
        .filter(|login| !login.is_empty())
        .map(str::to_string);

    let mut users: BTreeMap<String, SubjectRecord> = BTreeMap::new();
    // Early files stored one global login-to-detail map as a pseudo-user
    // next to the real ones; lift those entries onto their logins.
    let mut lifted: Vec<(String, ProfileDetail)> = Vec::new();

    match root.remove("users") {
        Some(Value::Object(raw_users)) => {
            for (login, raw) in raw_users {
                if login == "user_details" {
                    collect_lifted_details(raw, &mut lifted, report);
                    continue;
                }
                let record = lower_subject(&login, raw, report);
                users.insert(login, record);
            }
        }
        Some(other) => {
            warn!(kind = value_kind(&other), "users section has wrong shape, starting empty");
            report.degraded += 1;
        }
        None => {}
    }

    for (login, detail) in lifted {
        users.entry(login).or_default().details.get_or_insert(detail);
    }

    Document {
        last_username,
        users,
    }
}

fn lower_subject(login: &str, raw: Value, report: &mut LoadReport) -> SubjectRecord {
    let Value::Object(categories) = raw else {
        warn!(login, "subject entry is not an object, dropping");
        report.degraded += 1;
        return SubjectRecord::default();
    };

    let mut record = SubjectRecord::default();
    for (category, value) in categories {
        match category.as_str() {
            "followers" => {
                record.followers.members = lower_member_list(login, &category, value, report);
            }
            "following" => {
                record.following.members = lower_member_list(login, &category, value, report);
            }
            "follower_timestamps" => {
                record.followers.first_seen = lower_stamp_map(login, &category, value, report);
            }
            "following_timestamps" => {
                record.following.first_seen = lower_stamp_map(login, &category, value, report);
            }
            "last_update" => {
                let stamps = lower_stamp_map(login, &category, value, report);
                record.followers.last_update = stamps.get("followers").copied();
                record.following.last_update = stamps.get("following").copied();
            }
            "user_details" => {
                record.details = lower_details(login, value, report);
            }
            other => {
                // e.g. the retired not_following_back list, which is
                // derived data and recomputed on demand.
                warn!(login, category = other, "dropping unknown category");
                report.degraded += 1;
            }
        }
    }
    record
}

fn lower_member_list(
    login: &str,
    category: &str,
    value: Value,
    report: &mut LoadReport,
) -> BTreeSet<String> {
    let Value::Array(items) = value else {
        warn!(login, category, "expected a list, degrading to empty");
        report.degraded += 1;
        return BTreeSet::new();
    };

    let mut members = BTreeSet::new();
    for item in items {
        match item {
            Value::String(member) => {
                members.insert(member);
            }
            other => {
                warn!(login, category, kind = value_kind(&other), "skipping non-string member");
                report.degraded += 1;
            }
        }
    }
    members
}

fn lower_stamp_map(
    login: &str,
    category: &str,
    value: Value,
    report: &mut LoadReport,
) -> BTreeMap<String, DateTime<Utc>> {
    let mut out = BTreeMap::new();
    let entries: Vec<(String, Value)> = match value {
        Value::Object(map) => map.into_iter().collect(),
        // Legacy files stored these maps as [key, stamp] pair lists.
        Value::Array(pairs) => {
            let mut entries = Vec::new();
            for pair in pairs {
                match pair {
                    Value::Array(mut kv) if kv.len() == 2 => {
                        let stamp = kv.pop().unwrap_or(Value::Null);
                        match kv.pop() {
                            Some(Value::String(key)) => entries.push((key, stamp)),
                            _ => {
                                warn!(login, category, "skipping pair with non-string key");
                                report.degraded += 1;
                            }
                        }
                    }
                    _ => {
                        warn!(login, category, "skipping malformed timestamp pair");
                        report.degraded += 1;
                    }
                }
            }
            entries
        }
        _ => {
            warn!(login, category, "expected a map, degrading to empty");
            report.degraded += 1;
            return out;
        }
    };

    for (key, raw) in entries {
        let Some(stamp) = raw.as_str().and_then(parse_stamp) else {
            warn!(login, category, key, "dropping entry with unparseable timestamp");
            report.degraded += 1;
            continue;
        };
        out.insert(key, stamp);
    }
    out
}

fn lower_details(login: &str, value: Value, report: &mut LoadReport) -> Option<ProfileDetail> {
    match serde_json::from_value::<ProfileDetail>(value) {
        Ok(detail) => Some(detail),
        Err(err) => {
            warn!(login, error = %err, "dropping malformed user_details");
            report.degraded += 1;
            None
        }
    }
}

fn collect_lifted_details(
    raw: Value,
    out: &mut Vec<(String, ProfileDetail)>,
    report: &mut LoadReport,
) {
    let Value::Object(map) = raw else {
        warn!("legacy user_details section is not an object, dropping");
        report.degraded += 1;
        return;
    };
    for (login, value) in map {
        if let Some(detail) = lower_details(&login, value, report) {
            out.push((login, detail));
        }
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ---------------------------------------------------------------------------
// Save
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct RawDocument<'a> {
    #[serde(rename = "_metadata")]
    metadata: RawMetadata<'a>,
    users: BTreeMap<&'a str, RawSubject<'a>>,
}

#[derive(Serialize)]
struct RawMetadata<'a> {
    last_username: &'a str,
}

#[derive(Serialize)]
struct RawSubject<'a> {
    followers: &'a BTreeSet<String>,
    following: &'a BTreeSet<String>,
    follower_timestamps: BTreeMap<&'a str, String>,
    following_timestamps: BTreeMap<&'a str, String>,
    last_update: BTreeMap<&'static str, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_details: Option<&'a ProfileDetail>,
}

impl<'a> RawSubject<'a> {
    fn from_record(record: &'a SubjectRecord) -> Self {
        let mut last_update = BTreeMap::new();
        if let Some(at) = record.followers.last_update {
            last_update.insert("followers", format_stamp(at));
        }
        if let Some(at) = record.following.last_update {
            last_update.insert("following", format_stamp(at));
        }
        Self {
            followers: &record.followers.members,
            following: &record.following.members,
            follower_timestamps: stamp_map(&record.followers.first_seen),
            following_timestamps: stamp_map(&record.following.first_seen),
            last_update,
            user_details: record.details.as_ref(),
        }
    }
}

fn stamp_map(map: &BTreeMap<String, DateTime<Utc>>) -> BTreeMap<&str, String> {
    map.iter()
        .map(|(login, at)| (login.as_str(), format_stamp(*at)))
        .collect()
}

/// Serialize the whole document and atomically replace `path`.
pub fn save(doc: &Document, path: &Path) -> Result<(), StoreError> {
    let raw = RawDocument {
        metadata: RawMetadata {
            last_username: doc.last_username.as_deref().unwrap_or(""),
        },
        users: doc
            .users
            .iter()
            .map(|(login, record)| (login.as_str(), RawSubject::from_record(record)))
            .collect(),
    };
    let json = serde_json::to_string_pretty(&raw)?;

    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(json.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .map_err(|err| StoreError::Persistence(err.to_string()))?;
    Ok(())
}
