//! Core of the orbit tracker: the reconciliation store over a local JSON
//! document, the derived views, and the presentation glue that maps store
//! outcomes onto a display sink.

pub mod document;
pub mod error;
pub mod present;
pub mod score;
pub mod store;
pub mod traits;
pub mod types;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use document::LoadReport;
pub use error::{FetchError, StoreError};
pub use store::TrackerStore;
pub use traits::{DisplaySink, EdgeSource, NoticeLevel};
pub use types::{
    format_stamp, parse_stamp, Document, EdgeKind, EdgeRow, EdgeSet, EdgeView, FollowsBack,
    ProfileDetail, ProfileFields, SubjectRecord, ViewOrigin,
};
