//! Structured lifecycle events.
//!
//! Each persisted transition produces one event, logged at INFO with the
//! `event` field set so log pipelines can filter on it.

use chrono::{DateTime, Utc};

use crate::action::ActionRecord;

#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    Created {
        action_id: String,
        creator_id: String,
        start_time: DateTime<Utc>,
    },
    Completed {
        action_id: String,
        start_time: DateTime<Utc>,
        completion_time: DateTime<Utc>,
    },
    Cancelled {
        action_id: String,
        by: String,
        completion_time: DateTime<Utc>,
    },
    Released {
        action_id: String,
        by: String,
    },
}

impl LifecycleEvent {
    pub fn created(record: &ActionRecord) -> Self {
        Self::Created {
            action_id: record.action_id.clone(),
            creator_id: record.creator_id.clone(),
            start_time: record.start_time,
        }
    }

    pub fn completed(record: &ActionRecord) -> Self {
        Self::Completed {
            action_id: record.action_id.clone(),
            start_time: record.start_time,
            completion_time: record.completion_time.unwrap_or(record.start_time),
        }
    }

    pub fn cancelled(record: &ActionRecord, by: &str) -> Self {
        Self::Cancelled {
            action_id: record.action_id.clone(),
            by: by.to_string(),
            completion_time: record.completion_time.unwrap_or(record.start_time),
        }
    }

    pub fn released(record: &ActionRecord, by: &str) -> Self {
        Self::Released {
            action_id: record.action_id.clone(),
            by: by.to_string(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Created { .. } => "created",
            Self::Completed { .. } => "completed",
            Self::Cancelled { .. } => "cancelled",
            Self::Released { .. } => "released",
        }
    }

    pub fn action_id(&self) -> &str {
        match self {
            Self::Created { action_id, .. }
            | Self::Completed { action_id, .. }
            | Self::Cancelled { action_id, .. }
            | Self::Released { action_id, .. } => action_id,
        }
    }

    pub fn emit(&self) {
        let event = self.name();
        match self {
            Self::Created {
                action_id,
                creator_id,
                start_time,
            } => tracing::info!(
                event,
                action_id = %action_id,
                creator_id = %creator_id,
                start_time = %start_time.to_rfc3339(),
                "Action created successfully"
            ),
            Self::Completed {
                action_id,
                start_time,
                completion_time,
            } => {
                let elapsed = completion_time.signed_duration_since(*start_time);
                let duration_minutes =
                    (elapsed.num_milliseconds() as f64 / 60_000.0 * 100.0).round() / 100.0;
                tracing::info!(
                    event,
                    action_id = %action_id,
                    start_time = %start_time.to_rfc3339(),
                    completion_time = %completion_time.to_rfc3339(),
                    duration_minutes,
                    "Action completed"
                )
            }
            Self::Cancelled {
                action_id,
                by,
                completion_time,
            } => tracing::info!(
                event,
                action_id = %action_id,
                cancelled_by = %by,
                completion_time = %completion_time.to_rfc3339(),
                "Action cancelled successfully"
            ),
            Self::Released { action_id, by } => tracing::info!(
                event,
                action_id = %action_id,
                released_by = %by,
                "Action released successfully"
            ),
        }
    }
}
