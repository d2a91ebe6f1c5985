//! Persistence for action records.
//!
//! Records are keyed by `action_id`. Released records stay on disk but are
//! invisible to every lookup, so from a caller's point of view a release is
//! a delete.

mod memory;
mod redb_store;

pub use memory::InMemoryStore;
pub use redb_store::RedbStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::action::{ActionRecord, ActionStatus, ActionUpdate, Details};
use crate::error::{ActionError, Result};

pub trait ActionStore: Send + Sync {
    /// Insert a new record. Fails with `Conflict` if the id is taken.
    fn create(&self, record: &ActionRecord) -> Result<ActionRecord>;

    /// Fetch an unreleased record.
    fn get(&self, action_id: &str) -> Result<Option<ActionRecord>>;

    /// Apply `update` to an unreleased record whose status is still
    /// `expected`, as a single atomic step.
    ///
    /// Returns `NotFound` if the record is absent or released and `Conflict`
    /// if another transition moved it away from `expected` first.
    fn update(
        &self,
        action_id: &str,
        expected: ActionStatus,
        update: &ActionUpdate,
    ) -> Result<ActionRecord>;
}

/// Check the optimistic precondition and apply the change.
fn apply_checked(
    mut current: ActionRecord,
    expected: ActionStatus,
    update: &ActionUpdate,
) -> Result<ActionRecord> {
    if current.is_released {
        return Err(ActionError::NotFound(current.action_id));
    }
    if current.status != expected {
        return Err(ActionError::Conflict(format!(
            "action {} is {}, expected {}",
            current.action_id, current.status, expected
        )));
    }
    current.apply(update);
    Ok(current)
}

// ---------------------------------------------------------------------------
// ActionRow: on-disk shape
// ---------------------------------------------------------------------------

/// The persisted form of an [`ActionRecord`]: identity sets comma-joined,
/// `details` as a JSON-encoded string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ActionRow {
    action_id: String,
    status: String,
    creator_id: String,
    label: Option<String>,
    monitor_by: String,
    manage_by: String,
    start_time: DateTime<Utc>,
    completion_time: Option<DateTime<Utc>>,
    release_after: String,
    display_status: String,
    #[serde(default = "empty_details")]
    details: String,
    request_json: Value,
    #[serde(default)]
    is_released: bool,
}

fn empty_details() -> String {
    "{}".to_string()
}

impl ActionRow {
    fn from_record(record: &ActionRecord) -> Result<Self> {
        Ok(Self {
            action_id: record.action_id.clone(),
            status: record.status.as_str().to_string(),
            creator_id: record.creator_id.clone(),
            label: record.label.clone(),
            monitor_by: join_identities(&record.monitor_by),
            manage_by: join_identities(&record.manage_by),
            start_time: record.start_time,
            completion_time: record.completion_time,
            release_after: record.release_after.clone(),
            display_status: record.display_status.clone(),
            details: serde_json::to_string(&record.details)?,
            request_json: record.request_json.clone(),
            is_released: record.is_released,
        })
    }

    fn into_record(self) -> Result<ActionRecord> {
        let details: Details = if self.details.trim().is_empty() {
            Details::new()
        } else {
            serde_json::from_str(&self.details)?
        };
        Ok(ActionRecord {
            status: self.status.parse()?,
            monitor_by: split_identities(&self.monitor_by),
            manage_by: split_identities(&self.manage_by),
            action_id: self.action_id,
            creator_id: self.creator_id,
            label: self.label,
            start_time: self.start_time,
            completion_time: self.completion_time,
            release_after: self.release_after,
            display_status: self.display_status,
            details,
            request_json: self.request_json,
            is_released: self.is_released,
        })
    }
}

fn join_identities(ids: &std::collections::BTreeSet<String>) -> String {
    ids.iter().map(String::as_str).collect::<Vec<_>>().join(",")
}

fn split_identities(s: &str) -> std::collections::BTreeSet<String> {
    s.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
