//! Image record model and its string codec.
//!
//! Records are stored in the index as JSON with camelCase field names. Reads go
//! through [`lookup`], which keeps "nothing stored under the key" apart from
//! "something stored but unreadable".

use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;

/// Index key of the ordered list holding every record id, newest first.
pub const IMAGES_LIST_KEY: &str = "images:list";

/// Segment left in URLs and filenames by an old filename-construction bug.
pub const UNDEFINED_MARKER: &str = "-undefined-";

/// A single uploaded image as recorded in the index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    pub id: String,
    pub url: String,
    pub pathname: String,
    pub filename: String,
    pub mime_type: String,
    pub size: u64,
    pub uploaded_by: String,
    #[serde(with = "time::serde::rfc3339")]
    pub uploaded_at: OffsetDateTime,
}

impl ImageRecord {
    /// Whether the url or filename still carries the undefined marker.
    pub fn has_undefined_marker(&self) -> bool {
        self.url.contains(UNDEFINED_MARKER) || self.filename.contains(UNDEFINED_MARKER)
    }

    /// Strip every undefined marker from url and filename.
    ///
    /// Returns true if anything changed. Applying it twice is a no-op.
    pub fn strip_undefined_marker(&mut self) -> bool {
        if !self.has_undefined_marker() {
            return false;
        }
        self.url = strip_marker(&self.url);
        self.filename = strip_marker(&self.filename);
        true
    }

    /// Point the record at a freshly stored blob, keeping identity fields.
    pub fn relocate(&mut self, url: String, pathname: String, filename: String) {
        self.url = url;
        self.pathname = pathname;
        self.filename = filename;
    }
}

fn strip_marker(value: &str) -> String {
    // Replacing can form a new marker from overlapping text ("-undefined-undefined-").
    let mut out = value.replace(UNDEFINED_MARKER, "-");
    while out.contains(UNDEFINED_MARKER) {
        out = out.replace(UNDEFINED_MARKER, "-");
    }
    out
}

/// A stored value that could not be decoded into a record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MalformedRecord {
    pub reason: String,
}

impl fmt::Display for MalformedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed record: {}", self.reason)
    }
}

impl std::error::Error for MalformedRecord {}

/// Result of reading a record key from the index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordLookup {
    Found(ImageRecord),
    NotFound,
    Malformed(String),
}

/// Serialize a record. Field order is fixed by the struct, so output is deterministic.
pub fn encode(record: &ImageRecord) -> crate::Result<String> {
    serde_json::to_string(record).map_err(|e| crate::Error::Serialization(e.to_string()))
}

/// Parse a stored value. Never panics.
pub fn decode(raw: &str) -> Result<ImageRecord, MalformedRecord> {
    if raw.trim().is_empty() {
        return Err(MalformedRecord {
            reason: "empty value".to_string(),
        });
    }
    serde_json::from_str(raw).map_err(|e| MalformedRecord {
        reason: e.to_string(),
    })
}

/// Classify an optional stored value.
pub fn lookup(raw: Option<String>) -> RecordLookup {
    match raw {
        None => RecordLookup::NotFound,
        Some(raw) => match decode(&raw) {
            Ok(record) => RecordLookup::Found(record),
            Err(malformed) => RecordLookup::Malformed(malformed.reason),
        },
    }
}
