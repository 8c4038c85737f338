//! # History Engine
//!
//! Client-side record cache and filter evaluation for CRM contact history
//! widgets.
//!
//! This library sits between a remote CRM data source and a rendering layer:
//! raw fetch results (bulk query rows, incremental search rows, locally built
//! records) are normalized into one canonical [`ActivityRecord`] shape,
//! merged into an identity-keyed [`RecordCache`], and filtered on every
//! filter change without re-fetching.
//!
//! ## Features
//!
//! - **`parallel`** - Enable parallel filter evaluation with rayon
//!
//! ## Quick Start
//!
//! ```rust
//! use history_engine::{filter_records, ActivityRecord, FilterState, OccurredAt, RecordCache};
//! use chrono::{DateTime, FixedOffset};
//!
//! let mut cache = RecordCache::new();
//! cache.merge_records(vec![ActivityRecord {
//!     activity_type: "Call".to_string(),
//!     owner_name: "Jane Doe".to_string(),
//!     occurred_at: OccurredAt::At("2024-01-10T09:30:00+10:30".to_string()),
//!     ..ActivityRecord::empty("junction-1")
//! }]);
//!
//! let filter = FilterState {
//!     types: vec!["Call".to_string()],
//!     ..FilterState::default()
//! };
//! let now: DateTime<FixedOffset> = "2024-03-01T12:00:00+10:30".parse().unwrap();
//! let visible = filter_records(&cache.snapshot(), &filter, now);
//! assert_eq!(visible.len(), 1);
//! ```

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// Unified error handling
pub mod error;
pub use error::{HistoryError, Result};

// Raw-shape adapters (bulk query, incremental search, local entity)
pub mod normalize;
pub use normalize::{normalize, normalize_batch, remap_search_results, try_normalize, SourceShape};

// Identity-keyed upsert store with snapshot read
pub mod cache;
pub use cache::{RecordCache, RecordPatch};

// Filter predicate evaluation and active-dimension summary
pub mod filter;
pub use filter::{
    active_dimensions, filter_records, matches_filter, sort_records, DateRange, FilterDimension,
    FilterState, SortKey, SortOrder,
};

// Picklist catalog (activity types, result / regarding options)
pub mod catalog;
pub use catalog::{regarding_options, result_options, type_options, DEFAULT_ACTIVITY_TYPES};

// Subject-scoped session controller owning the cache
pub mod session;
pub use session::{HistorySession, Subject};

// ============================================================================
// Fallback Literals
// ============================================================================
// Downstream code and tests rely on these exact strings; the normalizer
// substitutes them whenever a source field is null, absent, or empty.

/// Fallback for a missing contact display name.
pub const NO_NAME: &str = "No Name";
/// Fallback for a missing or blank owner name.
pub const UNKNOWN_OWNER: &str = "Unknown Owner";
/// Fallback for a missing activity type.
pub const UNKNOWN_TYPE: &str = "Unknown Type";
/// Fallback for a missing result.
pub const NO_RESULT: &str = "No Result";
/// Fallback for a missing regarding line.
pub const NO_REGARDING: &str = "No Regarding";
/// Fallback for missing details text.
pub const NO_DETAILS: &str = "No Details";
/// Display sentinel for an unset date. Not a parseable date: every date
/// predicate treats it as invalid.
pub const NO_DATE: &str = "No Date";
/// Fallback for duration and participant id-like fields.
pub const NOT_AVAILABLE: &str = "N/A";
/// Fallback for participant name fields.
pub const UNKNOWN: &str = "Unknown";
/// Fallback for a missing participant email.
pub const NO_EMAIL: &str = "No Email";

// ============================================================================
// Canonical Record Types
// ============================================================================

/// Timestamp of an activity: either the raw source text or an unset sentinel.
///
/// The raw text is retained so display formatting stays faithful to the
/// source; parsing happens lazily at predicate-evaluation time and a parse
/// failure simply means the record never matches a date-bounded filter.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OccurredAt {
    /// No usable date on the source record. Displays as [`NO_DATE`].
    #[default]
    Unset,
    /// Raw date-time text as delivered by the source.
    At(String),
}

impl OccurredAt {
    /// Build from an optional raw value; `None` and blank map to `Unset`.
    pub fn from_raw(value: Option<&str>) -> Self {
        match value {
            Some(s) if !s.trim().is_empty() && s != NO_DATE => OccurredAt::At(s.to_string()),
            _ => OccurredAt::Unset,
        }
    }

    /// Display text; [`NO_DATE`] when unset.
    pub fn as_str(&self) -> &str {
        match self {
            OccurredAt::Unset => NO_DATE,
            OccurredAt::At(s) => s.as_str(),
        }
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, OccurredAt::Unset)
    }

    /// Parse the raw text into a timestamp, interpreting offset-less forms
    /// in `offset` (normally the caller's local offset).
    ///
    /// Accepted forms: RFC 3339, `%Y-%m-%dT%H:%M:%S`, `%Y-%m-%d %H:%M:%S`,
    /// and bare `%Y-%m-%d` (midnight). Returns `None` for `Unset` or
    /// unparseable text.
    pub fn parse_with_offset(&self, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
        let raw = match self {
            OccurredAt::Unset => return None,
            OccurredAt::At(s) => s.trim(),
        };

        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt);
        }
        for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
                return naive.and_local_timezone(offset).single();
            }
        }
        if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            return date
                .and_hms_opt(0, 0, 0)
                .and_then(|naive| naive.and_local_timezone(offset).single());
        }
        None
    }

    /// Strict variant of [`parse_with_offset`](Self::parse_with_offset):
    /// `Unset` is still `Ok(None)`, but text that fails to parse is an
    /// [`HistoryError::InvalidDate`] instead of a silent `None`.
    pub fn try_parse_with_offset(
        &self,
        offset: FixedOffset,
    ) -> Result<Option<DateTime<FixedOffset>>> {
        match self {
            OccurredAt::Unset => Ok(None),
            OccurredAt::At(raw) => match self.parse_with_offset(offset) {
                Some(dt) => Ok(Some(dt)),
                None => Err(HistoryError::InvalidDate { value: raw.clone() }),
            },
        }
    }
}

impl Serialize for OccurredAt {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for OccurredAt {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(OccurredAt::from_raw(Some(&raw)))
    }
}

/// Stakeholder resolved from one of the raw source shapes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stakeholder {
    pub id: String,
    /// Display name; empty string when the source only carried an id.
    #[serde(default)]
    pub name: String,
}

/// One participant on an activity. Every field carries an explicit fallback
/// value after normalization; none is ever left empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub mobile: String,
    pub first_name: String,
    pub last_name: String,
    pub external_id_number: String,
}

/// Canonical, post-normalization activity record: the unit stored in the
/// cache and rendered by the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    /// Junction identity linking the activity to the contact. Cache key.
    pub id: String,
    /// Identity of the underlying activity entity; used for attachment
    /// operations and navigation, distinct from `id`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_id: Option<String>,
    pub contact_name: String,
    pub owner_name: String,
    pub activity_type: String,
    pub result: String,
    pub duration: String,
    pub regarding: String,
    pub details: String,
    pub occurred_at: OccurredAt,
    #[serde(default)]
    pub stakeholder: Option<Stakeholder>,
    #[serde(default)]
    pub participants: Vec<Participant>,
}

impl ActivityRecord {
    /// A record with the given id and every display field at its fallback
    /// value. Handy as a struct-update base in tests and fixtures.
    pub fn empty(id: &str) -> Self {
        Self {
            id: id.to_string(),
            history_id: None,
            contact_name: NO_NAME.to_string(),
            owner_name: UNKNOWN_OWNER.to_string(),
            activity_type: UNKNOWN_TYPE.to_string(),
            result: NO_RESULT.to_string(),
            duration: NOT_AVAILABLE.to_string(),
            regarding: NO_REGARDING.to_string(),
            details: NO_DETAILS.to_string(),
            occurred_at: OccurredAt::Unset,
            stakeholder: None,
            participants: Vec::new(),
        }
    }
}

/// Comma-joined participant full names, the display form used for the
/// contact-name column.
pub(crate) fn join_full_names(participants: &[Participant]) -> String {
    participants
        .iter()
        .map(|p| p.full_name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
