//! Raw-record normalization: heterogeneous fetch shapes in, canonical
//! [`ActivityRecord`]s out.
//!
//! Each retrieval path delivers a different JSON shape. Rather than probing
//! optional fields to guess where a row came from, the caller names the
//! shape explicitly via [`SourceShape`] and the matching adapter does the
//! mapping. Adding a new fetch path means adding a variant here; the cache
//! and filter layers never change.
//!
//! Every display field gets a documented fallback literal when the source
//! value is null, absent, or empty. A record without a resolvable identity
//! is dropped, never cached.

use log::{debug, warn};
use serde_json::{json, Map, Value};
use std::collections::HashMap;

use crate::error::{HistoryError, Result};
use crate::{
    join_full_names, ActivityRecord, OccurredAt, Participant, Stakeholder, NOT_AVAILABLE,
    NO_DETAILS, NO_EMAIL, NO_NAME, NO_REGARDING, NO_RESULT, UNKNOWN, UNKNOWN_OWNER, UNKNOWN_TYPE,
};

/// The closed set of raw shapes a record can arrive in. Selected by the
/// caller, who knows which fetch path produced the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceShape {
    /// Bulk COQL rows with dotted, flattened keys
    /// (`"Contact_History_Info.Date"`, `"Owner.first_name"`, ...).
    BulkQuery,
    /// Incremental search rows, already flattened to the bulk shape by
    /// [`remap_search_results`].
    IncrementalSearch,
    /// Locally constructed rows from a just created or updated entity,
    /// with PascalCase direct fields (`History_Type`, `Participants`, ...).
    LocalEntity,
}

impl SourceShape {
    pub fn label(&self) -> &'static str {
        match self {
            SourceShape::BulkQuery => "bulk query",
            SourceShape::IncrementalSearch => "incremental search",
            SourceShape::LocalEntity => "local entity",
        }
    }
}

// ============================================================================
// Entry Points
// ============================================================================

/// Normalize one raw record, or `None` when it has no resolvable identity.
/// The drop is logged; callers that need the reason use [`try_normalize`].
pub fn normalize(raw: &Value, shape: SourceShape) -> Option<ActivityRecord> {
    match try_normalize(raw, shape) {
        Ok(record) => Some(record),
        Err(err) => {
            warn!("[Normalize] Dropping {} record: {}", shape.label(), err);
            None
        }
    }
}

/// Strict variant of [`normalize`]: surfaces why a record was rejected.
pub fn try_normalize(raw: &Value, shape: SourceShape) -> Result<ActivityRecord> {
    if !raw.is_object() {
        return Err(HistoryError::MalformedInput {
            message: format!("expected a JSON object, got {}", value_kind(raw)),
        });
    }
    match shape {
        SourceShape::BulkQuery | SourceShape::IncrementalSearch => map_flat_row(raw, shape),
        SourceShape::LocalEntity => map_local_entity(raw),
    }
}

/// Normalize a batch, silently skipping unusable rows. Logs one summary line.
pub fn normalize_batch(rows: &[Value], shape: SourceShape) -> Vec<ActivityRecord> {
    let records: Vec<ActivityRecord> = rows
        .iter()
        .filter_map(|row| normalize(row, shape))
        .collect();
    if records.len() < rows.len() {
        debug!(
            "[Normalize] {} of {} {} rows dropped",
            rows.len() - records.len(),
            rows.len(),
            shape.label()
        );
    }
    records
}

// ============================================================================
// Flat Rows (bulk query / remapped incremental search)
// ============================================================================

fn map_flat_row(raw: &Value, shape: SourceShape) -> Result<ActivityRecord> {
    let history_id = text(raw, "Contact_History_Info.id");

    // Junction id is the cache key; the activity id is the secondary key.
    let id = text(raw, "id")
        .or_else(|| history_id.clone())
        .ok_or(HistoryError::MissingIdentity {
            shape: shape.label(),
        })?;

    let first = text(raw, "Owner.first_name").unwrap_or_default();
    let last = text(raw, "Owner.last_name").unwrap_or_default();
    let owner_name = owner_from_parts(&first, &last);

    Ok(ActivityRecord {
        id,
        history_id,
        contact_name: field_or(raw, "Contact_Details.Full_Name", NO_NAME),
        owner_name,
        activity_type: field_or(raw, "Contact_History_Info.History_Type", UNKNOWN_TYPE),
        result: field_or(raw, "Contact_History_Info.History_Result", NO_RESULT),
        duration: field_or(raw, "Contact_History_Info.Duration", NOT_AVAILABLE),
        regarding: field_or(raw, "Contact_History_Info.Regarding", NO_REGARDING),
        details: field_or(raw, "Contact_History_Info.History_Details_Plain", NO_DETAILS),
        occurred_at: OccurredAt::from_raw(text(raw, "Contact_History_Info.Date").as_deref()),
        stakeholder: resolve_stakeholder(raw),
        participants: Vec::new(),
    })
}

/// Owner display name: `trim(first + " " + last)`, falling back when blank.
fn owner_from_parts(first: &str, last: &str) -> String {
    let joined = format!("{} {}", first, last);
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        UNKNOWN_OWNER.to_string()
    } else {
        trimmed.to_string()
    }
}

// ============================================================================
// Local Entity Rows
// ============================================================================

fn map_local_entity(raw: &Value) -> Result<ActivityRecord> {
    let history_id = nested_text(raw, &["historyDetails", "id"]).or_else(|| text(raw, "history_id"));

    let id = text(raw, "id")
        .or_else(|| history_id.clone())
        .ok_or(HistoryError::MissingIdentity {
            shape: SourceShape::LocalEntity.label(),
        })?;

    let participants = raw
        .get("Participants")
        .and_then(Value::as_array)
        .map(|list| list.iter().map(map_participant).collect::<Vec<_>>())
        .unwrap_or_default();

    // Contact name is the joined participant names when any are present.
    let contact_name = if participants.is_empty() {
        field_or(raw, "name", NO_NAME)
    } else {
        join_full_names(&participants)
    };

    let owner_name = nested_text(raw, &["Owner", "full_name"])
        .unwrap_or_else(|| UNKNOWN_OWNER.to_string());

    Ok(ActivityRecord {
        id,
        history_id,
        contact_name,
        owner_name,
        activity_type: field_or(raw, "History_Type", UNKNOWN_TYPE),
        result: field_or(raw, "History_Result", NO_RESULT),
        duration: field_or(raw, "Duration", NOT_AVAILABLE),
        regarding: field_or(raw, "Regarding", NO_REGARDING),
        details: field_or(raw, "History_Details_Plain", NO_DETAILS),
        occurred_at: OccurredAt::from_raw(text(raw, "Date").as_deref()),
        stakeholder: stakeholder_from_object(raw.get("Stakeholder")),
        participants,
    })
}

fn map_participant(raw: &Value) -> Participant {
    Participant {
        id: field_or(raw, "id", NOT_AVAILABLE),
        full_name: field_or(raw, "Full_Name", UNKNOWN),
        email: field_or(raw, "Email", NO_EMAIL),
        mobile: field_or(raw, "Mobile", NOT_AVAILABLE),
        first_name: field_or(raw, "First_Name", UNKNOWN),
        last_name: field_or(raw, "Last_Name", UNKNOWN),
        external_id_number: field_or(raw, "ID_Number", NOT_AVAILABLE),
    }
}

// ============================================================================
// Stakeholder Resolution
// ============================================================================
// Three sources, fixed priority: flat dotted keys, then the nested
// stakeholder object on the activity, then the junction-level object. The id
// and name chains resolve independently; the first source with a non-null id
// decides whether a stakeholder exists at all.

fn resolve_stakeholder(raw: &Value) -> Option<Stakeholder> {
    let flat_id = text(raw, "Contact_History_Info.Stakeholder.id");
    let flat_name = text(raw, "Contact_History_Info.Stakeholder.Account_Name");
    let nested = raw.get("Contact_History_Info.Stakeholder");
    let junction = raw.get("Stakeholder");

    let id = flat_id
        .or_else(|| object_id(nested))
        .or_else(|| object_id(junction))?;
    let name = flat_name
        .or_else(|| object_name(nested))
        .or_else(|| object_name(junction))
        .unwrap_or_default();

    Some(Stakeholder { id, name })
}

/// Stakeholder from a single embedded object (local-entity shape).
fn stakeholder_from_object(value: Option<&Value>) -> Option<Stakeholder> {
    let id = object_id(value)?;
    let name = object_name(value).unwrap_or_default();
    Some(Stakeholder { id, name })
}

fn object_id(value: Option<&Value>) -> Option<String> {
    let obj = value?.as_object()?;
    first_text(obj, &["id", "Id", "ID"])
}

fn object_name(value: Option<&Value>) -> Option<String> {
    let obj = value?.as_object()?;
    first_text(obj, &["Account_Name", "name", "AccountName"])
}

fn first_text(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| obj.get(*key).and_then(text_value))
}

// ============================================================================
// Incremental Search Remap
// ============================================================================

/// Join junction rows against their activity records and emit flattened,
/// bulk-shaped rows for [`SourceShape::IncrementalSearch`] normalization.
///
/// Junctions whose `Contact_History_Info.id` has no matching activity are
/// skipped: the search window did not cover them. Date falls back from
/// `Date` to `Created_Time`, details from `History_Details_Plain` to
/// `History_Details`.
pub fn remap_search_results(junctions: &[Value], histories: &[Value]) -> Vec<Value> {
    let by_id: HashMap<String, &Value> = histories
        .iter()
        .filter_map(|h| text(h, "id").map(|id| (id, h)))
        .collect();

    let mut rows = Vec::new();
    for junction in junctions {
        let linked_id = match nested_text(junction, &["Contact_History_Info", "id"]) {
            Some(id) => id,
            None => continue,
        };
        let history = match by_id.get(&linked_id) {
            Some(h) => *h,
            None => continue,
        };

        let date = text(history, "Date").or_else(|| text(history, "Created_Time"));
        let details =
            text(history, "History_Details_Plain").or_else(|| text(history, "History_Details"));

        rows.push(json!({
            "id": junction.get("id").cloned().unwrap_or(Value::Null),
            "Contact_Details.Full_Name":
                nested_text(junction, &["Contact_Details", "name"]),
            "Contact_History_Info.id": linked_id,
            "Contact_History_Info.Date": date,
            "Contact_History_Info.History_Type": text(history, "History_Type"),
            "Contact_History_Info.History_Result": text(history, "History_Result"),
            "Contact_History_Info.Duration": text(history, "Duration"),
            "Contact_History_Info.Regarding": text(history, "Regarding"),
            "Contact_History_Info.History_Details_Plain": details,
            "Contact_History_Info.Stakeholder":
                history.get("Stakeholder").cloned().unwrap_or(Value::Null),
            "Owner.first_name": nested_text(history, &["Owner", "first_name"]),
            "Owner.last_name": nested_text(history, &["Owner", "last_name"]),
        }));
    }

    if rows.len() < junctions.len() {
        debug!(
            "[Normalize] Remap matched {} of {} junction rows",
            rows.len(),
            junctions.len()
        );
    }
    rows
}

// ============================================================================
// JSON Accessors
// ============================================================================

/// Non-empty text at a top-level key. Numeric ids are accepted and
/// stringified; empty strings count as absent.
fn text(raw: &Value, key: &str) -> Option<String> {
    raw.get(key).and_then(text_value)
}

fn nested_text(raw: &Value, path: &[&str]) -> Option<String> {
    let mut cursor = raw;
    for key in path {
        cursor = cursor.get(key)?;
    }
    text_value(cursor)
}

fn text_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn field_or(raw: &Value, key: &str, fallback: &str) -> String {
    text(raw, key).unwrap_or_else(|| fallback.to_string())
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a bool",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bulk_row() -> Value {
        json!({
            "id": "junction-1",
            "Contact_Details.Full_Name": "Jane Doe",
            "Contact_History_Info.id": "hist-1",
            "Contact_History_Info.Date": "2024-01-10T09:30:00+10:30",
            "Contact_History_Info.History_Type": "Call",
            "Contact_History_Info.History_Result": "Call Completed",
            "Contact_History_Info.Duration": "15",
            "Contact_History_Info.Regarding": "Follow up",
            "Contact_History_Info.History_Details_Plain": "Discussed visa options",
            "Owner.first_name": "Mark",
            "Owner.last_name": "Turner"
        })
    }

    #[test]
    fn test_bulk_row_maps_every_field() {
        let record = normalize(&bulk_row(), SourceShape::BulkQuery).unwrap();
        assert_eq!(record.id, "junction-1");
        assert_eq!(record.history_id.as_deref(), Some("hist-1"));
        assert_eq!(record.contact_name, "Jane Doe");
        assert_eq!(record.owner_name, "Mark Turner");
        assert_eq!(record.activity_type, "Call");
        assert_eq!(record.result, "Call Completed");
        assert_eq!(record.duration, "15");
        assert_eq!(record.regarding, "Follow up");
        assert_eq!(record.details, "Discussed visa options");
        assert_eq!(record.occurred_at.as_str(), "2024-01-10T09:30:00+10:30");
        assert!(record.participants.is_empty());
    }

    #[test]
    fn test_bulk_row_fallback_completeness() {
        let record = normalize(&json!({ "id": "junction-2" }), SourceShape::BulkQuery).unwrap();
        assert_eq!(record.contact_name, "No Name");
        assert_eq!(record.owner_name, "Unknown Owner");
        assert_eq!(record.activity_type, "Unknown Type");
        assert_eq!(record.result, "No Result");
        assert_eq!(record.duration, "N/A");
        assert_eq!(record.regarding, "No Regarding");
        assert_eq!(record.details, "No Details");
        assert_eq!(record.occurred_at.as_str(), "No Date");
        assert!(record.stakeholder.is_none());
    }

    #[test]
    fn test_empty_strings_count_as_absent() {
        let record = normalize(
            &json!({
                "id": "junction-3",
                "Contact_History_Info.History_Type": "",
                "Owner.first_name": "",
                "Owner.last_name": ""
            }),
            SourceShape::BulkQuery,
        )
        .unwrap();
        assert_eq!(record.activity_type, "Unknown Type");
        assert_eq!(record.owner_name, "Unknown Owner");
    }

    #[test]
    fn test_owner_single_name_part() {
        let record = normalize(
            &json!({ "id": "j", "Owner.first_name": "Mark" }),
            SourceShape::BulkQuery,
        )
        .unwrap();
        assert_eq!(record.owner_name, "Mark");
    }

    #[test]
    fn test_identity_falls_back_to_history_id() {
        let record = normalize(
            &json!({ "Contact_History_Info.id": "hist-9" }),
            SourceShape::BulkQuery,
        )
        .unwrap();
        assert_eq!(record.id, "hist-9");
        assert_eq!(record.history_id.as_deref(), Some("hist-9"));
    }

    #[test]
    fn test_no_identity_is_dropped() {
        assert!(normalize(&json!({ "Name": "orphan" }), SourceShape::BulkQuery).is_none());
        let err = try_normalize(&json!({}), SourceShape::BulkQuery).unwrap_err();
        assert_eq!(
            err,
            HistoryError::MissingIdentity { shape: "bulk query" }
        );
    }

    #[test]
    fn test_non_object_is_malformed() {
        let err = try_normalize(&json!([1, 2, 3]), SourceShape::BulkQuery).unwrap_err();
        assert!(matches!(err, HistoryError::MalformedInput { .. }));
    }

    #[test]
    fn test_stakeholder_flat_keys_win() {
        let record = normalize(
            &json!({
                "id": "j",
                "Contact_History_Info.Stakeholder.id": "acc-1",
                "Contact_History_Info.Stakeholder.Account_Name": "Acme Pty",
                "Stakeholder": { "id": "acc-9", "name": "Wrong" }
            }),
            SourceShape::BulkQuery,
        )
        .unwrap();
        let stakeholder = record.stakeholder.unwrap();
        assert_eq!(stakeholder.id, "acc-1");
        assert_eq!(stakeholder.name, "Acme Pty");
    }

    #[test]
    fn test_stakeholder_nested_object_key_variants() {
        for id_key in ["id", "Id", "ID"] {
            let record = normalize(
                &json!({
                    "id": "j",
                    "Contact_History_Info.Stakeholder": { (id_key): "acc-2", "name": "Globex" }
                }),
                SourceShape::BulkQuery,
            )
            .unwrap();
            let stakeholder = record.stakeholder.unwrap();
            assert_eq!(stakeholder.id, "acc-2");
            assert_eq!(stakeholder.name, "Globex");
        }
    }

    #[test]
    fn test_stakeholder_junction_object_is_last_resort() {
        let record = normalize(
            &json!({
                "id": "j",
                "Stakeholder": { "ID": "acc-3", "AccountName": "Initech" }
            }),
            SourceShape::BulkQuery,
        )
        .unwrap();
        let stakeholder = record.stakeholder.unwrap();
        assert_eq!(stakeholder.id, "acc-3");
        assert_eq!(stakeholder.name, "Initech");
    }

    #[test]
    fn test_stakeholder_name_without_id_is_none() {
        let record = normalize(
            &json!({
                "id": "j",
                "Contact_History_Info.Stakeholder.Account_Name": "Nameless Corp"
            }),
            SourceShape::BulkQuery,
        )
        .unwrap();
        assert!(record.stakeholder.is_none());
    }

    #[test]
    fn test_stakeholder_id_without_name_gets_empty_name() {
        let record = normalize(
            &json!({ "id": "j", "Contact_History_Info.Stakeholder.id": "acc-4" }),
            SourceShape::BulkQuery,
        )
        .unwrap();
        assert_eq!(record.stakeholder.unwrap().name, "");
    }

    #[test]
    fn test_local_entity_with_participants() {
        let record = normalize(
            &json!({
                "id": "junction-5",
                "Date": "2024-02-01T10:00:00+10:30",
                "History_Type": "Meeting",
                "History_Result": "Meeting Held",
                "Owner": { "full_name": "Mark Turner" },
                "historyDetails": { "id": "hist-5", "name": "Jane Doe" },
                "Participants": [
                    { "id": "c1", "Full_Name": "Jane Doe", "First_Name": "Jane", "Last_Name": "Doe" },
                    { "id": "c2", "Full_Name": "John Smith" }
                ]
            }),
            SourceShape::LocalEntity,
        )
        .unwrap();
        assert_eq!(record.contact_name, "Jane Doe, John Smith");
        assert_eq!(record.owner_name, "Mark Turner");
        assert_eq!(record.activity_type, "Meeting");
        assert_eq!(record.history_id.as_deref(), Some("hist-5"));
    }

    #[test]
    fn test_local_participant_fallbacks() {
        let record = normalize(
            &json!({ "id": "j", "Participants": [{}] }),
            SourceShape::LocalEntity,
        )
        .unwrap();
        let p = &record.participants[0];
        assert_eq!(p.id, "N/A");
        assert_eq!(p.full_name, "Unknown");
        assert_eq!(p.email, "No Email");
        assert_eq!(p.mobile, "N/A");
        assert_eq!(p.first_name, "Unknown");
        assert_eq!(p.last_name, "Unknown");
        assert_eq!(p.external_id_number, "N/A");
    }

    #[test]
    fn test_local_entity_without_participants_uses_name_field() {
        let record = normalize(
            &json!({ "id": "j", "name": "Solo Contact" }),
            SourceShape::LocalEntity,
        )
        .unwrap();
        assert_eq!(record.contact_name, "Solo Contact");

        let nameless = normalize(&json!({ "id": "j" }), SourceShape::LocalEntity).unwrap();
        assert_eq!(nameless.contact_name, "No Name");
    }

    #[test]
    fn test_remap_joins_junctions_to_histories() {
        let junctions = vec![
            json!({
                "id": "junction-7",
                "Contact_Details": { "name": "Jane Doe" },
                "Contact_History_Info": { "id": "hist-7" }
            }),
            json!({
                "id": "junction-8",
                "Contact_History_Info": { "id": "hist-unknown" }
            }),
        ];
        let histories = vec![json!({
            "id": "hist-7",
            "Date": "2024-03-05T08:00:00+10:30",
            "History_Type": "To-Do",
            "Owner": { "first_name": "Mark", "last_name": "Turner" }
        })];

        let rows = remap_search_results(&junctions, &histories);
        assert_eq!(rows.len(), 1);

        let record = normalize(&rows[0], SourceShape::IncrementalSearch).unwrap();
        assert_eq!(record.id, "junction-7");
        assert_eq!(record.history_id.as_deref(), Some("hist-7"));
        assert_eq!(record.contact_name, "Jane Doe");
        assert_eq!(record.activity_type, "To-Do");
        assert_eq!(record.owner_name, "Mark Turner");
    }

    #[test]
    fn test_remap_date_and_details_fallback_chain() {
        let junctions = vec![json!({
            "id": "junction-9",
            "Contact_History_Info": { "id": "hist-9" }
        })];
        let histories = vec![json!({
            "id": "hist-9",
            "Created_Time": "2024-04-01T12:00:00+10:30",
            "History_Details": "rich-text fallback"
        })];

        let rows = remap_search_results(&junctions, &histories);
        let record = normalize(&rows[0], SourceShape::IncrementalSearch).unwrap();
        assert_eq!(record.occurred_at.as_str(), "2024-04-01T12:00:00+10:30");
        assert_eq!(record.details, "rich-text fallback");
    }

    #[test]
    fn test_batch_skips_bad_rows() {
        let rows = vec![bulk_row(), json!({}), json!("not a row")];
        let records = normalize_batch(&rows, SourceShape::BulkQuery);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "junction-1");
    }

    #[test]
    fn test_numeric_ids_are_stringified() {
        let record = normalize(&json!({ "id": 42 }), SourceShape::BulkQuery).unwrap();
        assert_eq!(record.id, "42");
    }
}
