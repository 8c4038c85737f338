//! Identity-keyed record store with merge-upsert, snapshot read, and a
//! monotonic revision counter.
//!
//! The cache is the single source of truth the UI renders from. Fetch paths
//! may interleave arbitrarily; merge is a per-key upsert, so applying the
//! same batch twice, or two overlapping batches in either order, converges
//! to the same content. A genuine same-field write race resolves to last
//! merge wins.
//!
//! The revision counter is an opaque change-detection token for reactive
//! callers: it bumps on every merge that applies at least one patch and
//! resets to 0 on [`RecordCache::clear`] (a subject change starts a new
//! session).

use log::{debug, warn};
use std::collections::HashMap;

use crate::{join_full_names, ActivityRecord, OccurredAt, Participant, Stakeholder};

/// Partial update for one record. `None` fields are retained from the
/// existing entry; `Some` fields overwrite.
///
/// `stakeholder: None` means "leave unchanged"; a merge cannot detach a
/// stakeholder, only replace it.
#[derive(Debug, Clone, Default)]
pub struct RecordPatch {
    pub id: String,
    pub history_id: Option<String>,
    pub contact_name: Option<String>,
    pub owner_name: Option<String>,
    pub activity_type: Option<String>,
    pub result: Option<String>,
    pub duration: Option<String>,
    pub regarding: Option<String>,
    pub details: Option<String>,
    pub occurred_at: Option<OccurredAt>,
    pub stakeholder: Option<Stakeholder>,
    pub participants: Option<Vec<Participant>>,
}

impl RecordPatch {
    /// An empty patch for the given key; set the fields to change.
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Self::default()
        }
    }
}

impl From<ActivityRecord> for RecordPatch {
    fn from(record: ActivityRecord) -> Self {
        Self {
            id: record.id,
            history_id: record.history_id,
            contact_name: Some(record.contact_name),
            owner_name: Some(record.owner_name),
            activity_type: Some(record.activity_type),
            result: Some(record.result),
            duration: Some(record.duration),
            regarding: Some(record.regarding),
            details: Some(record.details),
            occurred_at: Some(record.occurred_at),
            stakeholder: record.stakeholder,
            participants: Some(record.participants),
        }
    }
}

/// In-memory record store keyed by junction id.
#[derive(Debug, Default)]
pub struct RecordCache {
    records: HashMap<String, ActivityRecord>,
    revision: u64,
}

impl RecordCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a batch of patches. Per key: insert when absent, otherwise
    /// overwrite the provided fields and retain the rest.
    ///
    /// The contact name follows a special rule on update: it is recomputed
    /// from the incoming participants when that list is provided and
    /// non-empty, otherwise the existing value is kept.
    ///
    /// Patches without a key are skipped; bad data cannot corrupt the
    /// store. Returns the revision, bumped once per merge that applies at
    /// least one patch, whether or not the content differed.
    pub fn merge<I>(&mut self, patches: I) -> u64
    where
        I: IntoIterator<Item = RecordPatch>,
    {
        let mut applied = 0usize;
        for patch in patches {
            if patch.id.trim().is_empty() {
                warn!("[RecordCache] Skipping patch with no key");
                continue;
            }
            match self.records.get_mut(&patch.id) {
                Some(existing) => apply_patch(existing, patch),
                None => {
                    let record = materialize(patch);
                    self.records.insert(record.id.clone(), record);
                }
            }
            applied += 1;
        }

        if applied > 0 {
            self.revision += 1;
            debug!(
                "[RecordCache] Merged {} records, revision {}, {} cached",
                applied,
                self.revision,
                self.records.len()
            );
        }
        self.revision
    }

    /// Merge fully-populated records (the normal fetch path).
    pub fn merge_records(&mut self, records: Vec<ActivityRecord>) -> u64 {
        self.merge(records.into_iter().map(RecordPatch::from))
    }

    /// Point lookup, used when a single-record update needs the prior state.
    pub fn get(&self, id: &str) -> Option<&ActivityRecord> {
        self.records.get(id)
    }

    /// All cached records, in unspecified order. Presentation order is a
    /// caller concern, see [`crate::sort_records`].
    pub fn snapshot(&self) -> Vec<ActivityRecord> {
        self.records.values().cloned().collect()
    }

    /// Empty the store and reset the revision. Must run on every subject
    /// change before the next fetch, so records never leak across contacts.
    pub fn clear(&mut self) {
        self.records.clear();
        self.revision = 0;
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Current change-detection token. Monotonic between clears.
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

/// Overwrite provided fields on an existing record.
fn apply_patch(existing: &mut ActivityRecord, patch: RecordPatch) {
    // Contact name: joined incoming participants win; otherwise the
    // existing value survives unless it is blank.
    if let Some(participants) = &patch.participants {
        if !participants.is_empty() {
            existing.contact_name = join_full_names(participants);
        } else if existing.contact_name.is_empty() {
            if let Some(name) = patch.contact_name {
                existing.contact_name = name;
            }
        }
    } else if existing.contact_name.is_empty() {
        if let Some(name) = patch.contact_name {
            existing.contact_name = name;
        }
    }

    if patch.history_id.is_some() {
        existing.history_id = patch.history_id;
    }
    if let Some(owner_name) = patch.owner_name {
        existing.owner_name = owner_name;
    }
    if let Some(activity_type) = patch.activity_type {
        existing.activity_type = activity_type;
    }
    if let Some(result) = patch.result {
        existing.result = result;
    }
    if let Some(duration) = patch.duration {
        existing.duration = duration;
    }
    if let Some(regarding) = patch.regarding {
        existing.regarding = regarding;
    }
    if let Some(details) = patch.details {
        existing.details = details;
    }
    if let Some(occurred_at) = patch.occurred_at {
        existing.occurred_at = occurred_at;
    }
    if patch.stakeholder.is_some() {
        existing.stakeholder = patch.stakeholder;
    }
    if let Some(participants) = patch.participants {
        existing.participants = participants;
    }
}

/// Build a complete record from a patch on first insert; missing display
/// fields get their fallback values.
fn materialize(patch: RecordPatch) -> ActivityRecord {
    let mut record = ActivityRecord::empty(&patch.id);

    if let Some(participants) = &patch.participants {
        if !participants.is_empty() {
            record.contact_name = join_full_names(participants);
        } else if let Some(name) = patch.contact_name.clone() {
            record.contact_name = name;
        }
    } else if let Some(name) = patch.contact_name.clone() {
        record.contact_name = name;
    }

    record.history_id = patch.history_id;
    if let Some(owner_name) = patch.owner_name {
        record.owner_name = owner_name;
    }
    if let Some(activity_type) = patch.activity_type {
        record.activity_type = activity_type;
    }
    if let Some(result) = patch.result {
        record.result = result;
    }
    if let Some(duration) = patch.duration {
        record.duration = duration;
    }
    if let Some(regarding) = patch.regarding {
        record.regarding = regarding;
    }
    if let Some(details) = patch.details {
        record.details = details;
    }
    if let Some(occurred_at) = patch.occurred_at {
        record.occurred_at = occurred_at;
    }
    record.stakeholder = patch.stakeholder;
    if let Some(participants) = patch.participants {
        record.participants = participants;
    }
    record
}
