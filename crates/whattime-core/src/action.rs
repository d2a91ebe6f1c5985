//! Action data model.
//!
//! An `ActionRecord` tracks one polled unit of work from creation (`Active`)
//! through completion (`Succeeded` or `Failed`) to release. Records are
//! mutated only through an [`ActionUpdate`], the sparse change set the store
//! applies atomically.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::duration;
use crate::error::{ActionError, Result};
use crate::identity::Caller;

/// Longest `display_status` a caller ever sees.
pub const DISPLAY_STATUS_MAX: usize = 64;

/// Largest accepted `utc_offset`, in hours, either side of UTC.
pub const MAX_UTC_OFFSET_HOURS: i64 = 24;

pub type Details = serde_json::Map<String, Value>;

// ---------------------------------------------------------------------------
// ActionStatus
// ---------------------------------------------------------------------------

/// Lifecycle state of an action.
///
/// Transitions: `Active → Succeeded` (lazy, on poll) and `Active → Failed`
/// (cancel). Nothing leaves `Succeeded` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionStatus {
    Active,
    Succeeded,
    Failed,
}

impl ActionStatus {
    pub fn is_complete(self) -> bool {
        !matches!(self, ActionStatus::Active)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActionStatus::Active => "ACTIVE",
            ActionStatus::Succeeded => "SUCCEEDED",
            ActionStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActionStatus {
    type Err = ActionError;
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ACTIVE" => Ok(ActionStatus::Active),
            "SUCCEEDED" => Ok(ActionStatus::Succeeded),
            "FAILED" => Ok(ActionStatus::Failed),
            _ => Err(ActionError::StoreUnavailable(format!(
                "unknown action status '{s}' in store"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// ActionRecord
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ActionRecord {
    pub action_id: String,
    pub status: ActionStatus,
    pub creator_id: String,
    pub label: Option<String>,
    pub monitor_by: BTreeSet<String>,
    pub manage_by: BTreeSet<String>,
    pub start_time: DateTime<Utc>,
    pub completion_time: Option<DateTime<Utc>>,
    pub release_after: String,
    pub display_status: String,
    pub details: Details,
    /// The creation payload exactly as received.
    pub request_json: Value,
    pub is_released: bool,
}

impl ActionRecord {
    /// Apply a sparse change set in place.
    pub fn apply(&mut self, update: &ActionUpdate) {
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(display_status) = &update.display_status {
            self.display_status = display_status.clone();
        }
        if let Some(completion_time) = update.completion_time {
            self.completion_time = Some(completion_time);
        }
        if let Some(details) = &update.details {
            self.details = details.clone();
        }
        if let Some(is_released) = update.is_released {
            self.is_released = is_released;
        }
    }

    /// The caller-facing representation of this record.
    pub fn view(&self) -> ActionView {
        ActionView {
            action_id: self.action_id.clone(),
            status: self.status,
            creator_id: self.creator_id.clone(),
            label: self.label.clone(),
            monitor_by: self.monitor_by.clone(),
            manage_by: self.manage_by.clone(),
            start_time: self.start_time,
            completion_time: self.completion_time,
            release_after: self.release_after.clone(),
            display_status: truncate_chars(&self.display_status, DISPLAY_STATUS_MAX),
            details: self.details.clone(),
            is_released: self.is_released.then_some(true),
        }
    }

    /// The `utc_offset` the creator supplied, read back from the stored payload.
    pub fn requested_utc_offset(&self) -> Option<i64> {
        let body = input_object(&self.request_json)?;
        body.get("utc_offset").and_then(Value::as_i64)
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

// ---------------------------------------------------------------------------
// ActionUpdate
// ---------------------------------------------------------------------------

/// Fields a transition changes. `None` leaves the stored value alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionUpdate {
    pub status: Option<ActionStatus>,
    pub display_status: Option<String>,
    pub completion_time: Option<DateTime<Utc>>,
    pub details: Option<Details>,
    pub is_released: Option<bool>,
}

// ---------------------------------------------------------------------------
// ActionView
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionView {
    pub action_id: String,
    pub status: ActionStatus,
    pub creator_id: String,
    pub label: Option<String>,
    pub monitor_by: BTreeSet<String>,
    pub manage_by: BTreeSet<String>,
    pub start_time: DateTime<Utc>,
    pub completion_time: Option<DateTime<Utc>>,
    pub release_after: String,
    pub display_status: String,
    pub details: Details,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_released: Option<bool>,
}

// ---------------------------------------------------------------------------
// RunRequest
// ---------------------------------------------------------------------------

/// A validated creation payload.
///
/// Two shapes are accepted. The enveloped form carries the provider input
/// under `body` next to the envelope fields:
///
/// ```json
/// {"request_id": "r1", "body": {"utc_offset": 10}, "label": "demo"}
/// ```
///
/// The flat form puts `utc_offset` beside the envelope fields. Either way the
/// whole payload is kept as `raw` and stored verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRequest {
    pub utc_offset: i64,
    pub request_id: Option<String>,
    pub label: Option<String>,
    pub monitor_by: Option<BTreeSet<String>>,
    pub manage_by: Option<BTreeSet<String>>,
    pub release_after: Option<String>,
    pub raw: Value,
}

impl RunRequest {
    pub fn parse(payload: Value) -> Result<Self> {
        let envelope = payload
            .as_object()
            .ok_or_else(|| ActionError::Validation("request must be a JSON object".into()))?;
        let input = input_object(&payload)
            .ok_or_else(|| ActionError::Validation("'body' must be a JSON object".into()))?;

        let utc_offset = match input.get("utc_offset") {
            None | Some(Value::Null) => {
                return Err(ActionError::Validation("'utc_offset' is required".into()))
            }
            Some(v) => v.as_i64().ok_or_else(|| {
                ActionError::Validation(format!("'utc_offset' must be an integer, got {v}"))
            })?,
        };
        if !(-MAX_UTC_OFFSET_HOURS..=MAX_UTC_OFFSET_HOURS).contains(&utc_offset) {
            return Err(ActionError::Validation(format!(
                "'utc_offset' must be between -{MAX_UTC_OFFSET_HOURS} and {MAX_UTC_OFFSET_HOURS}, got {utc_offset}"
            )));
        }

        let request_id = optional_string(envelope.get("request_id"), "request_id")?;
        let label = optional_string(envelope.get("label"), "label")?;
        let monitor_by = identity_set(envelope.get("monitor_by"), "monitor_by")?;
        let manage_by = identity_set(envelope.get("manage_by"), "manage_by")?;
        let release_after = optional_string(envelope.get("release_after"), "release_after")?;
        if let Some(d) = &release_after {
            duration::parse_iso8601(d)?;
        }

        Ok(Self {
            utc_offset,
            request_id,
            label,
            monitor_by,
            manage_by,
            release_after,
            raw: payload,
        })
    }

    /// Build the initial `Active` record for this request.
    ///
    /// Identity sets the request supplies are used as-is; the creator is not
    /// added back into them.
    pub fn into_record(
        self,
        action_id: String,
        caller: &Caller,
        start_time: DateTime<Utc>,
        default_release_after: &str,
    ) -> ActionRecord {
        ActionRecord {
            action_id,
            status: ActionStatus::Active,
            creator_id: caller.effective_identity.clone(),
            label: self.label,
            monitor_by: self
                .monitor_by
                .unwrap_or_else(|| caller.identities.clone()),
            manage_by: self.manage_by.unwrap_or_else(|| caller.identities.clone()),
            start_time,
            completion_time: None,
            release_after: self
                .release_after
                .unwrap_or_else(|| default_release_after.to_string()),
            display_status: ActionStatus::Active.as_str().to_string(),
            details: Details::new(),
            request_json: self.raw,
            is_released: false,
        }
    }
}

/// The provider input: `body` when present, otherwise the payload itself.
fn input_object(payload: &Value) -> Option<&serde_json::Map<String, Value>> {
    let obj = payload.as_object()?;
    match obj.get("body") {
        Some(body) => body.as_object(),
        None => Some(obj),
    }
}

fn optional_string(v: Option<&Value>, field: &str) -> Result<Option<String>> {
    match v {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(ActionError::Validation(format!(
            "'{field}' must be a string, got {other}"
        ))),
    }
}

/// An empty or missing list means "not supplied".
fn identity_set(v: Option<&Value>, field: &str) -> Result<Option<BTreeSet<String>>> {
    let items = match v {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(ActionError::Validation(format!(
                "'{field}' must be a list of identities, got {other}"
            )))
        }
    };
    let mut set = BTreeSet::new();
    for item in items {
        let id = item.as_str().ok_or_else(|| {
            ActionError::Validation(format!("'{field}' entries must be strings, got {item}"))
        })?;
        let id = id.trim();
        // Identity sets are persisted comma-joined.
        if id.is_empty() || id.contains(',') {
            return Err(ActionError::Validation(format!(
                "'{field}' contains an invalid identity '{id}'"
            )));
        }
        set.insert(id.to_string());
    }
    Ok((!set.is_empty()).then_some(set))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
