//! Session controller tying a cache to the record it belongs to.
//!
//! A session owns one [`RecordCache`] and the identity of the CRM record
//! whose history it holds. Swapping the subject wipes the cache before
//! anything new is ingested, so one contact's activities can never bleed
//! into another's view.

use chrono::{DateTime, FixedOffset};
use log::info;
use serde_json::Value;

use crate::{
    filter_records, normalize_batch, sort_records, ActivityRecord, FilterState, RecordCache,
    SortKey, SortOrder, SourceShape,
};

/// The CRM record a session is scoped to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    /// CRM module API name, e.g. `Contacts`.
    pub module: String,
    pub record_id: String,
}

impl Subject {
    pub fn new(module: &str, record_id: &str) -> Self {
        Self {
            module: module.to_string(),
            record_id: record_id.to_string(),
        }
    }
}

/// Cache plus subject identity, the unit of state a widget instance holds.
#[derive(Debug, Default)]
pub struct HistorySession {
    subject: Option<Subject>,
    cache: RecordCache,
}

impl HistorySession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point the session at a record. Re-setting the same subject is a
    /// no-op; a different subject clears the cache. Returns whether the
    /// subject changed.
    pub fn set_subject(&mut self, subject: Subject) -> bool {
        if self.subject.as_ref() == Some(&subject) {
            return false;
        }
        info!(
            "[Session] Subject changed to {}/{}, clearing {} cached records",
            subject.module,
            subject.record_id,
            self.cache.len()
        );
        self.cache.clear();
        self.subject = Some(subject);
        true
    }

    pub fn subject(&self) -> Option<&Subject> {
        self.subject.as_ref()
    }

    /// Normalize a raw payload and merge the survivors into the cache.
    /// Returns the cache revision after the merge.
    pub fn ingest(&mut self, raw: &[Value], shape: SourceShape) -> u64 {
        let records = normalize_batch(raw, shape);
        self.cache.merge_records(records)
    }

    /// The records currently visible under a filter, newest first.
    pub fn visible(
        &self,
        filter: &FilterState,
        now: DateTime<FixedOffset>,
    ) -> Vec<ActivityRecord> {
        let snapshot = self.cache.snapshot();
        let mut visible = filter_records(&snapshot, filter, now);
        sort_records(&mut visible, SortKey::Date, SortOrder::Descending);
        visible
    }

    pub fn cache(&self) -> &RecordCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut RecordCache {
        &mut self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn now() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2024-02-15T12:00:00+00:00").unwrap()
    }

    fn flat_row(id: &str, name: &str, date: &str) -> Value {
        json!({
            "id": id,
            "Contact_Details.Full_Name": name,
            "Contact_History_Info.History_Type": "Call",
            "Contact_History_Info.Date": date,
        })
    }

    #[test]
    fn test_ingest_then_visible() {
        let mut session = HistorySession::new();
        session.set_subject(Subject::new("Contacts", "c-1"));
        session.ingest(
            &[
                flat_row("1", "Jane Doe", "2024-02-10T09:00:00"),
                flat_row("2", "John Smith", "2024-02-12T09:00:00"),
            ],
            SourceShape::BulkQuery,
        );

        let visible = session.visible(&FilterState::new(), now());
        assert_eq!(visible.len(), 2);
        assert_eq!(visible[0].id, "2");
    }

    #[test]
    fn test_subject_change_clears_cache() {
        let mut session = HistorySession::new();
        session.set_subject(Subject::new("Contacts", "c-1"));
        session.ingest(&[flat_row("1", "Jane Doe", "2024-02-10T09:00:00")], SourceShape::BulkQuery);
        assert_eq!(session.cache().len(), 1);

        let changed = session.set_subject(Subject::new("Contacts", "c-2"));
        assert!(changed);
        assert!(session.cache().is_empty());
        assert_eq!(session.cache().revision(), 0);

        session.ingest(&[flat_row("9", "New Person", "2024-02-11T09:00:00")], SourceShape::BulkQuery);
        let visible = session.visible(&FilterState::new(), now());
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, "9");
    }

    #[test]
    fn test_same_subject_is_noop() {
        let mut session = HistorySession::new();
        session.set_subject(Subject::new("Contacts", "c-1"));
        session.ingest(&[flat_row("1", "Jane Doe", "2024-02-10T09:00:00")], SourceShape::BulkQuery);

        let changed = session.set_subject(Subject::new("Contacts", "c-1"));
        assert!(!changed);
        assert_eq!(session.cache().len(), 1);
    }

    #[test]
    fn test_filtered_view_applies_filter() {
        let mut session = HistorySession::new();
        session.set_subject(Subject::new("Contacts", "c-1"));
        session.ingest(
            &[
                flat_row("1", "Jane Doe", "2024-02-10T09:00:00"),
                flat_row("2", "John Smith", "2024-02-12T09:00:00"),
            ],
            SourceShape::BulkQuery,
        );

        let filter = FilterState {
            keyword: "jane".to_string(),
            ..FilterState::new()
        };
        let visible = session.visible(&filter, now());
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, "1");
    }
}
