//! Picklist catalogs for the filter and edit surfaces.
//!
//! The per-type result and regarding lists mirror the CRM's picklist
//! configuration. They are static lookups, not fetched metadata, so the
//! widget keeps working when the metadata API is unavailable.

use std::collections::BTreeSet;

use crate::{ActivityRecord, UNKNOWN_TYPE};

/// Activity types always offered in the type filter, independent of what
/// the current record set happens to contain.
pub const DEFAULT_ACTIVITY_TYPES: &[&str] = &[
    "Meeting",
    "To-Do",
    "Call",
    "Appointment",
    "Boardroom",
    "Call Billing",
    "Email Billing",
    "Initial Consultation",
    "Mail",
    "Meeting Billing",
    "Personal Activity",
    "Room 1",
    "Room 2",
    "Room 3",
    "Todo Billing",
    "Vacation",
];

/// Type-filter options: the default catalog plus any type observed in the
/// records, sorted and deduplicated. The unknown-type placeholder is not
/// offered as a choice.
pub fn type_options(records: &[ActivityRecord]) -> Vec<String> {
    let mut options: BTreeSet<&str> = DEFAULT_ACTIVITY_TYPES.iter().copied().collect();
    for record in records {
        if !record.activity_type.is_empty() && record.activity_type != UNKNOWN_TYPE {
            options.insert(record.activity_type.as_str());
        }
    }
    options.into_iter().map(String::from).collect()
}

/// Result picklist for one activity type.
pub fn result_options(activity_type: &str) -> Vec<&'static str> {
    match activity_type {
        "Meeting" => vec!["Meeting Held", "Meeting Not Held"],
        "To-Do" => vec!["To-do Done", "To-do Not Done"],
        "Appointment" => vec!["Appointment Completed", "Appointment Not Completed"],
        "Boardroom" => vec!["Boardroom - Completed", "Boardroom - Not Completed"],
        "Call Billing" => vec!["Call Billing - Completed", "Call Billing - Not Completed"],
        "Email Billing" => vec!["Email Billing - Completed", "Email Billing - Not Completed"],
        "Initial Consultation" => vec![
            "Initial Consultation - Completed",
            "Initial Consultation - Not Completed",
        ],
        "Mail" => vec!["Mail - Completed", "Mail - Not Completed"],
        "Meeting Billing" => vec!["Meeting Billing - Completed", "Meeting Billing - Not Completed"],
        "To Do Billing" | "Todo Billing" => {
            vec!["To Do Billing - Completed", "To Do Billing - Not Completed"]
        }
        "Call" => vec![
            "Call Attempted",
            "Call Completed",
            "Call Left Message",
            "Call Received",
        ],
        "Personal Activity" => vec![
            "Personal Activity - Completed",
            "Personal Activity - Not Completed",
            "Note",
            "Mail Received",
            "Mail Sent",
            "Email Received",
            "Courier Sent",
            "Email Sent",
            "Payment Received",
        ],
        "Vacation" => vec![
            "Vacation - Completed",
            "Vacation - Not Completed",
            "Vacation Cancelled",
        ],
        "Room 1" => vec!["Room 1 - Completed", "Room 1 - Not Completed"],
        "Room 2" => vec!["Room 2 - Completed", "Room 2 - Not Completed"],
        "Room 3" => vec!["Room 3 - Completed", "Room 3 - Not Completed"],
        "Other" => vec![
            "Attachment",
            "E-mail Attachment",
            "E-mail Auto Attached",
            "E-mail Sent",
        ],
        _ => vec!["Note"],
    }
}

/// Regarding picklist for one activity type. A record's existing value is
/// prepended when it is not already offered, so an open edit form never
/// loses the stored value.
pub fn regarding_options(activity_type: &str, existing: Option<&str>) -> Vec<String> {
    let base: &[&str] = match activity_type {
        "Call" => &[
            "2nd Followup",
            "3rd Followup",
            "4th Followup",
            "5th Followup",
            "Cold call",
            "Confirm appointment",
            "Discuss legal points",
            "Follow up",
            "New Client",
            "Nomination and Visa Lodgement",
            "Payment Made?",
            "Returning call",
            "Schedule a meeting",
        ],
        "Meeting" => &[
            "Hourly Consult $220",
            "Initial Consultation Fee $165.00",
            "No appointments today (check with Mark)",
            "No Appointments Tonight",
            "No clients or appointments 4.00-5.00pm",
        ],
        "To-Do" => &[
            "Assemble catalogs",
            "DEADLINE REMINDER",
            "Deadline to lodge app",
            "Deadline to provide additional docu",
            "Deadline to respond",
            "DEADLINE TODAY - Email received",
            "Make travel arrangements",
            "Send contract",
            "Send follow-up letter",
            "Send literature",
            "Send proposal",
            "Send quote",
            "Send SMS reminder",
        ],
        "Appointment" => &[
            "Appointment",
            "Call",
            "Dentist Appointment",
            "Doctor Appointment",
            "Eye Doctor Appointment",
            "Make Appointment",
            "Meeting",
            "Parent-Teacher Conference",
            "Shopping",
            "Time Off",
            "Workout",
        ],
        _ => &["General"],
    };

    let mut options: Vec<String> = base.iter().map(|s| s.to_string()).collect();
    if let Some(existing) = existing {
        if !existing.trim().is_empty() && !options.iter().any(|o| o == existing) {
            options.insert(0, existing.to_string());
        }
    }
    options
}
