//! Pure filter evaluation over cached records.
//!
//! Predicates are conjunctive: a record must satisfy every populated
//! dimension (owner, type, date range, keyword). An unset dimension
//! matches everything, so the default [`FilterState`] is the identity
//! filter. All time-relative ranges take `now` as an argument, which
//! keeps evaluation deterministic and testable.

use chrono::{DateTime, Datelike, Days, Duration, FixedOffset, NaiveDate, Offset};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{ActivityRecord, HistoryError, Result};

/// Record count above which the parallel feature kicks in. Below this,
/// thread coordination costs more than the scan.
#[cfg(feature = "parallel")]
const PARALLEL_THRESHOLD: usize = 1000;

// ============================================================================
// Filter state
// ============================================================================

/// A date constraint on [`ActivityRecord::occurred_at`].
///
/// `Between` is calendar-day granular and inclusive at both ends: an
/// activity at 23:59 on the end date is in range. The day boundary is
/// taken in the offset of the `now` passed to evaluation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum DateRange {
    #[default]
    Unset,
    /// Strictly after `now - days`.
    LastDays(i64),
    /// Inclusive calendar-day window.
    Between { start: NaiveDate, end: NaiveDate },
    /// From an anchor instant up to `now`, inclusive at both ends.
    Since(DateTime<FixedOffset>),
}

impl DateRange {
    /// Inclusive day window; rejects an end before the start.
    pub fn between(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if end < start {
            return Err(HistoryError::InvalidRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self::Between { start, end })
    }

    pub fn last_7_days() -> Self {
        Self::LastDays(7)
    }

    pub fn last_30_days() -> Self {
        Self::LastDays(30)
    }

    pub fn last_90_days() -> Self {
        Self::LastDays(90)
    }

    /// From midnight on the Sunday of the week containing `now`, up to
    /// `now`. Records later in the calendar week are not yet in range.
    pub fn current_week(now: DateTime<FixedOffset>) -> Self {
        let today = now.date_naive();
        let start = today - Days::new(u64::from(today.weekday().num_days_from_sunday()));
        Self::Since(day_start(start, now))
    }

    /// From midnight on the first of the month containing `now`, up to
    /// `now`.
    pub fn current_month(now: DateTime<FixedOffset>) -> Self {
        let today = now.date_naive();
        let start = today.with_day(1).unwrap_or(today);
        Self::Since(day_start(start, now))
    }

    /// Sunday through Saturday of the week after the one containing `now`.
    pub fn next_week(now: DateTime<FixedOffset>) -> Self {
        let today = now.date_naive();
        let this_start = today - Days::new(u64::from(today.weekday().num_days_from_sunday()));
        let start = this_start + Days::new(7);
        Self::Between {
            start,
            end: start + Days::new(6),
        }
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }
}

/// Midnight on `day` in the offset of `now`.
fn day_start(day: NaiveDate, now: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    day.and_hms_opt(0, 0, 0)
        .and_then(|naive| naive.and_local_timezone(*now.offset()).single())
        .unwrap_or(now)
}

/// The full set of user-selected constraints. Every field defaults to
/// "no constraint".
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FilterState {
    /// Selected owner names, ORed together. Empty means any owner.
    pub owners: Vec<String>,
    /// Selected activity types, ORed, matched exactly. Empty means any.
    pub types: Vec<String>,
    pub date_range: DateRange,
    /// Free-text needle over name, details, and regarding. Blank means any.
    pub keyword: String,
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no dimension constrains anything.
    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
            && self.types.is_empty()
            && self.date_range.is_unset()
            && self.keyword.trim().is_empty()
    }
}

// ============================================================================
// Predicate evaluation
// ============================================================================

/// Whether one record passes every populated dimension of the filter.
pub fn matches_filter(
    record: &ActivityRecord,
    filter: &FilterState,
    now: DateTime<FixedOffset>,
) -> bool {
    matches_owner(record, &filter.owners)
        && matches_type(record, &filter.types)
        && matches_date(record, &filter.date_range, now)
        && matches_keyword(record, &filter.keyword)
}

/// Evaluate the filter over a slice, preserving input order.
pub fn filter_records(
    records: &[ActivityRecord],
    filter: &FilterState,
    now: DateTime<FixedOffset>,
) -> Vec<ActivityRecord> {
    #[cfg(feature = "parallel")]
    {
        if records.len() >= PARALLEL_THRESHOLD {
            use rayon::prelude::*;
            let kept: Vec<ActivityRecord> = records
                .par_iter()
                .filter(|record| matches_filter(record, filter, now))
                .cloned()
                .collect();
            debug!("[Filter] Kept {}/{} records (parallel)", kept.len(), records.len());
            return kept;
        }
    }

    let kept: Vec<ActivityRecord> = records
        .iter()
        .filter(|record| matches_filter(record, filter, now))
        .cloned()
        .collect();
    debug!("[Filter] Kept {}/{} records", kept.len(), records.len());
    kept
}

/// Owners match on equality or substring in either direction, so a
/// selected "Jane" finds "Jane Doe" and a selected "Jane Doe Smith"
/// still finds records owned by "Jane Doe".
fn matches_owner(record: &ActivityRecord, owners: &[String]) -> bool {
    if owners.is_empty() {
        return true;
    }
    let owner = record.owner_name.trim().to_lowercase();
    owners.iter().any(|selected| {
        let selected = selected.trim().to_lowercase();
        owner == selected || owner.contains(&selected) || selected.contains(&owner)
    })
}

fn matches_type(record: &ActivityRecord, types: &[String]) -> bool {
    types.is_empty() || types.iter().any(|t| t == &record.activity_type)
}

fn matches_keyword(record: &ActivityRecord, keyword: &str) -> bool {
    let needle = keyword.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    record.contact_name.to_lowercase().contains(&needle)
        || record.details.to_lowercase().contains(&needle)
        || record.regarding.to_lowercase().contains(&needle)
}

/// A record with no parseable timestamp fails every set range; undated
/// activities only show up when the date dimension is off.
fn matches_date(record: &ActivityRecord, range: &DateRange, now: DateTime<FixedOffset>) -> bool {
    if range.is_unset() {
        return true;
    }
    let Some(ts) = record.occurred_at.parse_with_offset(*now.offset()) else {
        return false;
    };
    match range {
        DateRange::Unset => true,
        DateRange::LastDays(days) => ts > now - Duration::days(*days),
        DateRange::Between { start, end } => {
            let day = ts.with_timezone(now.offset()).date_naive();
            *start <= day && day <= *end
        }
        DateRange::Since(anchor) => *anchor <= ts && ts <= now,
    }
}

// ============================================================================
// Active-dimension summary
// ============================================================================

/// A filter dimension that is currently constraining results, for "filters
/// applied" UI chips.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDimension {
    Date,
    Type,
    Owner,
    Keyword,
}

impl FilterDimension {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Date => "Date",
            Self::Type => "Type",
            Self::Owner => "Owner",
            Self::Keyword => "Keyword",
        }
    }
}

impl std::fmt::Display for FilterDimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Which dimensions actively narrow the result, in display order.
///
/// Owner only counts when a strict subset of the known owners is
/// selected; selecting every owner narrows nothing.
pub fn active_dimensions(filter: &FilterState, owner_universe: usize) -> Vec<FilterDimension> {
    let mut active = Vec::new();
    if !filter.date_range.is_unset() {
        active.push(FilterDimension::Date);
    }
    if !filter.types.is_empty() {
        active.push(FilterDimension::Type);
    }
    if !filter.owners.is_empty() && filter.owners.len() < owner_universe {
        active.push(FilterDimension::Owner);
    }
    if !filter.keyword.trim().is_empty() {
        active.push(FilterDimension::Keyword);
    }
    active
}

// ============================================================================
// Sorting
// ============================================================================

/// Column to order a record list by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortKey {
    /// Chronological on the parsed timestamp; undated records sort first
    /// ascending, last descending. The usual presentation is this key
    /// descending, newest activity on top.
    Date,
    Name,
    Type,
    Result,
    Owner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Stable in-place sort by one column.
pub fn sort_records(records: &mut [ActivityRecord], key: SortKey, order: SortOrder) {
    let utc = chrono::Utc.fix();
    records.sort_by(|a, b| {
        let ordering = match key {
            SortKey::Date => a
                .occurred_at
                .parse_with_offset(utc)
                .cmp(&b.occurred_at.parse_with_offset(utc)),
            SortKey::Name => a.contact_name.cmp(&b.contact_name),
            SortKey::Type => a.activity_type.cmp(&b.activity_type),
            SortKey::Result => a.result.cmp(&b.result),
            SortKey::Owner => a.owner_name.cmp(&b.owner_name),
        };
        match order {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        }
    });
}
