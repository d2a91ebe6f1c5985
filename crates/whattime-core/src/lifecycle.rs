//! The action state machine.
//!
//! ```text
//!   ACTIVE ──(poll after max_sleep_time)──▶ SUCCEEDED ─┐
//!     │                                                 ├──(release)──▶ released
//!     └──────────────(cancel)──────────────▶ FAILED ────┘
//! ```
//!
//! Every method here is pure: it inspects a record and returns the
//! [`ActionUpdate`] the transition requires, or the reason it is not allowed.
//! Persisting the update (and losing a race against a concurrent transition)
//! is the store's business.

use chrono::{DateTime, TimeDelta, Utc};
use serde_json::Value;

use crate::action::{ActionRecord, ActionStatus, ActionUpdate, Details};
use crate::config::Config;
use crate::error::{ActionError, Result};
use crate::identity::Caller;

pub const COMPLETED_DISPLAY_STATUS: &str = "Action completed";

#[derive(Debug, Clone)]
pub struct Lifecycle {
    max_sleep_time: TimeDelta,
}

impl Lifecycle {
    pub fn new(max_sleep_time: TimeDelta) -> Self {
        Self { max_sleep_time }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.max_sleep_time())
    }

    pub fn max_sleep_time(&self) -> TimeDelta {
        self.max_sleep_time
    }

    /// Lazy completion: an `Active` record whose age exceeds `max_sleep_time`
    /// becomes `Succeeded` as of `now`.
    ///
    /// Returns `None` when nothing changes, which includes every record that
    /// has already left `Active`.
    pub fn evaluate_completion(
        &self,
        record: &ActionRecord,
        now: DateTime<Utc>,
        utc_offset: Option<i64>,
    ) -> Option<ActionUpdate> {
        if record.status != ActionStatus::Active {
            return None;
        }
        if now.signed_duration_since(record.start_time) <= self.max_sleep_time {
            return None;
        }

        // An offset of 0 counts as not supplied.
        let utc_offset = utc_offset.filter(|offset| *offset != 0);
        let details = utc_offset.and_then(|offset| local_time_details(record.start_time, offset));
        if utc_offset.is_some() && details.is_none() {
            tracing::warn!(
                action_id = %record.action_id,
                utc_offset = ?utc_offset,
                "utc_offset out of range; completing without local time"
            );
        }

        Some(ActionUpdate {
            status: Some(ActionStatus::Succeeded),
            display_status: Some(COMPLETED_DISPLAY_STATUS.to_string()),
            completion_time: Some(now),
            details,
            is_released: None,
        })
    }

    pub fn authorize_read(&self, record: &ActionRecord, caller: &Caller) -> Result<()> {
        if caller.is_member_of(&record.monitor_by) {
            Ok(())
        } else {
            Err(ActionError::NotFound(record.action_id.clone()))
        }
    }

    pub fn authorize_manage(&self, record: &ActionRecord, caller: &Caller) -> Result<()> {
        if caller.is_member_of(&record.manage_by) {
            Ok(())
        } else {
            Err(ActionError::NotFound(record.action_id.clone()))
        }
    }

    /// `Active → Failed`, stamped with `now` as the completion time.
    pub fn cancel(
        &self,
        record: &ActionRecord,
        caller: &Caller,
        now: DateTime<Utc>,
    ) -> Result<ActionUpdate> {
        self.authorize_manage(record, caller)?;
        if record.status.is_complete() {
            return Err(ActionError::Conflict("Cannot cancel complete action".into()));
        }
        Ok(ActionUpdate {
            status: Some(ActionStatus::Failed),
            display_status: Some(format!("Cancelled by {}", caller.effective_identity)),
            completion_time: Some(now),
            details: None,
            is_released: None,
        })
    }

    /// Mark a completed record released. Status and timestamps are untouched.
    pub fn release(&self, record: &ActionRecord, caller: &Caller) -> Result<ActionUpdate> {
        self.authorize_manage(record, caller)?;
        if !record.status.is_complete() {
            return Err(ActionError::Conflict(
                "Cannot release incomplete Action".into(),
            ));
        }
        Ok(ActionUpdate {
            display_status: Some(format!("Released by {}", caller.effective_identity)),
            is_released: Some(true),
            ..Default::default()
        })
    }
}

/// `{utc_offset, utc_time, local_time}` for a start time shifted by `offset`
/// hours. `None` if the shift leaves chrono's representable range.
fn local_time_details(start_time: DateTime<Utc>, offset: i64) -> Option<Details> {
    let shift = TimeDelta::try_hours(offset.checked_abs()?)?;
    let local_time = if offset < 0 {
        start_time.checked_sub_signed(shift)?
    } else {
        start_time.checked_add_signed(shift)?
    };

    let mut details = Details::new();
    details.insert("utc_offset".into(), Value::from(offset));
    details.insert("utc_time".into(), Value::from(start_time.to_rfc3339()));
    details.insert("local_time".into(), Value::from(local_time.to_rfc3339()));
    Some(details)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
