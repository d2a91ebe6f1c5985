//! The four action operations: run, status, cancel, release.
//!
//! Each call is a synchronous read-modify-write against the store. The
//! lifecycle engine decides what a transition changes; the store's
//! status precondition decides who wins when two transitions race.

use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use crate::action::{ActionRecord, ActionStatus, RunRequest};
use crate::clock::Clock;
use crate::config::Config;
use crate::error::{ActionError, Result};
use crate::events::LifecycleEvent;
use crate::identity::Caller;
use crate::lifecycle::Lifecycle;
use crate::store::ActionStore;

pub struct ActionService {
    store: Arc<dyn ActionStore>,
    clock: Arc<dyn Clock>,
    lifecycle: Lifecycle,
    default_release_after: String,
}

impl ActionService {
    pub fn new(
        store: Arc<dyn ActionStore>,
        clock: Arc<dyn Clock>,
        lifecycle: Lifecycle,
        default_release_after: impl Into<String>,
    ) -> Self {
        Self {
            store,
            clock,
            lifecycle,
            default_release_after: default_release_after.into(),
        }
    }

    pub fn from_config(
        config: &Config,
        store: Arc<dyn ActionStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::new(
            store,
            clock,
            Lifecycle::from_config(config),
            config.default_release_after.clone(),
        )
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    /// Create a new `Active` action from a raw creation payload.
    pub fn run(&self, payload: Value, caller: &Caller) -> Result<ActionRecord> {
        let request = RunRequest::parse(payload)?;
        tracing::info!(
            creator_id = %caller.effective_identity,
            label = ?request.label,
            request_id = ?request.request_id,
            "Creating new action"
        );

        let record = request.into_record(
            Uuid::new_v4().to_string(),
            caller,
            self.clock.now(),
            &self.default_release_after,
        );
        let record = self.store.create(&record)?;
        LifecycleEvent::created(&record).emit();
        Ok(record)
    }

    /// Current state of an action, completing it first if its time is up.
    pub fn status(&self, action_id: &str, caller: &Caller) -> Result<ActionRecord> {
        tracing::debug!(action_id, "Checking action status");
        let record = self.load(action_id)?;
        self.lifecycle.authorize_read(&record, caller)?;

        let completion = self.lifecycle.evaluate_completion(
            &record,
            self.clock.now(),
            record.requested_utc_offset(),
        );
        let record = match completion {
            None => record,
            Some(update) => match self.store.update(action_id, ActionStatus::Active, &update) {
                Ok(done) => {
                    LifecycleEvent::completed(&done).emit();
                    done
                }
                // A concurrent cancel got there first; report what it left.
                Err(ActionError::Conflict(_)) => self.load(action_id)?,
                Err(e) => return Err(e),
            },
        };

        tracing::debug!(action_id, status = %record.status, "Action status retrieved");
        Ok(record)
    }

    pub fn cancel(&self, action_id: &str, caller: &Caller) -> Result<ActionRecord> {
        tracing::info!(action_id, "Cancelling action");
        let record = self.load(action_id)?;
        let update = self
            .lifecycle
            .cancel(&record, caller, self.clock.now())
            .inspect_err(|e| {
                if let ActionError::Conflict(_) = e {
                    tracing::warn!(
                        action_id,
                        status = %record.status,
                        "Cannot cancel completed action"
                    );
                }
            })?;

        let record = self.store.update(action_id, ActionStatus::Active, &update)?;
        LifecycleEvent::cancelled(&record, &caller.effective_identity).emit();
        Ok(record)
    }

    pub fn release(&self, action_id: &str, caller: &Caller) -> Result<ActionRecord> {
        tracing::info!(action_id, "Releasing action");
        let record = self.load(action_id)?;
        let update = self.lifecycle.release(&record, caller).inspect_err(|e| {
            if let ActionError::Conflict(_) = e {
                tracing::warn!(
                    action_id,
                    status = %record.status,
                    "Cannot release incomplete action"
                );
            }
        })?;

        let record = self.store.update(action_id, record.status, &update)?;
        LifecycleEvent::released(&record, &caller.effective_identity).emit();
        Ok(record)
    }

    fn load(&self, action_id: &str) -> Result<ActionRecord> {
        self.store.get(action_id)?.ok_or_else(|| {
            tracing::warn!(action_id, "Action not found");
            ActionError::NotFound(action_id.to_string())
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionUpdate;
    use crate::clock::ManualClock;
    use crate::store::RedbStore;
    use chrono::{DateTime, TimeDelta, TimeZone, Utc};
    use serde_json::json;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    struct Harness {
        _dir: TempDir,
        clock: Arc<ManualClock>,
        service: ActionService,
    }

    fn harness(max_sleep_secs: i64) -> Harness {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RedbStore::open(&dir.path().join("actions.db")).unwrap());
        let clock = Arc::new(ManualClock::new(t0()));
        let service = ActionService::new(
            store,
            clock.clone(),
            Lifecycle::new(TimeDelta::seconds(max_sleep_secs)),
            "P30D",
        );
        Harness {
            _dir: dir,
            clock,
            service,
        }
    }

    fn alice() -> Caller {
        Caller::new("alice")
    }

    fn assert_completion_invariant(record: &ActionRecord) {
        assert_eq!(
            record.completion_time.is_some(),
            record.status != ActionStatus::Active,
            "completion_time must be set iff status is terminal: {record:?}"
        );
    }

    #[test]
    fn scenario_a_fresh_action_is_active() {
        let h = harness(120);
        let created = h.service.run(json!({"utc_offset": -5}), &alice()).unwrap();
        assert_completion_invariant(&created);

        let status = h.service.status(&created.action_id, &alice()).unwrap();
        assert_eq!(status.status, ActionStatus::Active);
        assert!(status.details.is_empty());
        assert_eq!(status.release_after, "P30D");
        assert_completion_invariant(&status);
    }

    #[test]
    fn scenario_b_poll_after_threshold_completes() {
        let h = harness(0);
        let created = h.service.run(json!({"utc_offset": -5}), &alice()).unwrap();
        h.clock.advance(TimeDelta::seconds(1));

        let done = h.service.status(&created.action_id, &alice()).unwrap();
        assert_eq!(done.status, ActionStatus::Succeeded);
        assert_eq!(done.display_status, "Action completed");
        assert_eq!(done.completion_time, Some(t0() + TimeDelta::seconds(1)));
        assert_eq!(
            done.details["local_time"],
            json!((created.start_time - TimeDelta::hours(5)).to_rfc3339())
        );
        assert_completion_invariant(&done);
    }

    #[test]
    fn scenario_c_cancel_then_cancel_again() {
        let h = harness(120);
        let created = h.service.run(json!({"utc_offset": 1}), &alice()).unwrap();

        let cancelled = h.service.cancel(&created.action_id, &alice()).unwrap();
        assert_eq!(cancelled.status, ActionStatus::Failed);
        assert_eq!(cancelled.display_status, "Cancelled by alice");
        assert_completion_invariant(&cancelled);

        let err = h.service.cancel(&created.action_id, &alice()).unwrap_err();
        assert!(matches!(err, ActionError::Conflict(_)));
    }

    #[test]
    fn scenario_d_release_hides_the_action() {
        let h = harness(120);
        let created = h.service.run(json!({"utc_offset": 1}), &alice()).unwrap();
        h.service.cancel(&created.action_id, &alice()).unwrap();

        let released = h.service.release(&created.action_id, &alice()).unwrap();
        assert!(released.is_released);
        assert_eq!(released.display_status, "Released by alice");
        assert_eq!(released.status, ActionStatus::Failed);

        for result in [
            h.service.status(&created.action_id, &alice()),
            h.service.cancel(&created.action_id, &alice()),
            h.service.release(&created.action_id, &alice()),
        ] {
            assert!(matches!(result, Err(ActionError::NotFound(_))));
        }
    }

    #[test]
    fn scenario_e_release_active_conflicts() {
        let h = harness(120);
        let created = h.service.run(json!({"utc_offset": 1}), &alice()).unwrap();
        let err = h.service.release(&created.action_id, &alice()).unwrap_err();
        assert!(matches!(err, ActionError::Conflict(_)));
        assert_eq!(
            h.service.status(&created.action_id, &alice()).unwrap().status,
            ActionStatus::Active
        );
    }

    #[test]
    fn status_is_idempotent_before_and_after_threshold() {
        let h = harness(120);
        let created = h.service.run(json!({"utc_offset": 9}), &alice()).unwrap();

        let a = h.service.status(&created.action_id, &alice()).unwrap();
        let b = h.service.status(&created.action_id, &alice()).unwrap();
        assert_eq!(
            serde_json::to_vec(&a.view()).unwrap(),
            serde_json::to_vec(&b.view()).unwrap()
        );

        h.clock.advance(TimeDelta::seconds(121));
        let first = h.service.status(&created.action_id, &alice()).unwrap();
        h.clock.advance(TimeDelta::hours(3));
        let second = h.service.status(&created.action_id, &alice()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn completed_actions_never_return_to_active() {
        let h = harness(0);
        let created = h.service.run(json!({"utc_offset": 1}), &alice()).unwrap();
        h.clock.advance(TimeDelta::seconds(5));
        h.service.status(&created.action_id, &alice()).unwrap();

        assert!(matches!(
            h.service.cancel(&created.action_id, &alice()),
            Err(ActionError::Conflict(_))
        ));
        let again = h.service.status(&created.action_id, &alice()).unwrap();
        assert_eq!(again.status, ActionStatus::Succeeded);
    }

    #[test]
    fn outsiders_see_not_found() {
        let h = harness(120);
        let created = h
            .service
            .run(
                json!({"body": {"utc_offset": 1}, "monitor_by": ["bob"], "manage_by": ["carol"]}),
                &alice(),
            )
            .unwrap();
        let id = &created.action_id;

        // explicit sets are taken literally, so the creator is locked out
        assert!(matches!(h.service.status(id, &alice()), Err(ActionError::NotFound(_))));
        assert!(matches!(
            h.service.cancel(id, &Caller::new("bob")),
            Err(ActionError::NotFound(_))
        ));
        assert!(h.service.status(id, &Caller::new("bob")).is_ok());
        assert!(h.service.cancel(id, &Caller::new("carol")).is_ok());
        assert!(matches!(
            h.service.release(id, &Caller::new("bob")),
            Err(ActionError::NotFound(_))
        ));
    }

    #[test]
    fn unknown_id_is_not_found() {
        let h = harness(120);
        assert!(matches!(
            h.service.status("no-such-action", &alice()),
            Err(ActionError::NotFound(_))
        ));
    }

    #[test]
    fn invalid_payload_persists_nothing() {
        let h = harness(120);
        let err = h.service.run(json!({"utc_offset": "ten"}), &alice()).unwrap_err();
        assert!(matches!(err, ActionError::Validation(_)));
    }

    #[test]
    fn run_uses_configured_release_after() {
        let dir = TempDir::new().unwrap();
        let config = Config {
            default_release_after: "P7D".into(),
            ..Config::default()
        };
        let service = ActionService::from_config(
            &config,
            Arc::new(RedbStore::open(&dir.path().join("a.db")).unwrap()),
            Arc::new(ManualClock::new(t0())),
        );
        assert_eq!(service.lifecycle().max_sleep_time(), TimeDelta::seconds(120));
        let created = service.run(json!({"utc_offset": 0}), &alice()).unwrap();
        assert_eq!(created.release_after, "P7D");
        assert_eq!(created.start_time, t0());
    }

    #[test]
    fn zero_offset_completes_with_empty_details() {
        let h = harness(120);
        let created = h.service.run(json!({"utc_offset": 0}), &alice()).unwrap();
        h.clock.advance(TimeDelta::seconds(121));

        let done = h.service.status(&created.action_id, &alice()).unwrap();
        assert_eq!(done.status, ActionStatus::Succeeded);
        assert!(done.details.is_empty());
        assert_completion_invariant(&done);
    }

    #[test]
    fn extreme_offset_is_a_validation_error() {
        let h = harness(120);
        for offset in [i64::MIN, i64::MAX] {
            let err = h
                .service
                .run(json!({ "utc_offset": offset }), &alice())
                .unwrap_err();
            assert!(matches!(err, ActionError::Validation(_)), "{offset}: {err:?}");
        }
    }

    // -----------------------------------------------------------------------
    // Store doubles
    // -----------------------------------------------------------------------

    /// Serves a stale snapshot from `get` after the real record has moved on,
    /// the way a reader that lost a race would see it.
    struct StaleReads {
        inner: RedbStore,
        snapshot: Mutex<Option<ActionRecord>>,
    }

    impl ActionStore for StaleReads {
        fn create(&self, record: &ActionRecord) -> Result<ActionRecord> {
            self.inner.create(record)
        }
        fn get(&self, action_id: &str) -> Result<Option<ActionRecord>> {
            match self.snapshot.lock().unwrap().take() {
                Some(stale) => Ok(Some(stale)),
                None => self.inner.get(action_id),
            }
        }
        fn update(
            &self,
            action_id: &str,
            expected: ActionStatus,
            update: &ActionUpdate,
        ) -> Result<ActionRecord> {
            self.inner.update(action_id, expected, update)
        }
    }

    #[test]
    fn poll_losing_to_cancel_reports_the_cancel() {
        let dir = TempDir::new().unwrap();
        let inner = RedbStore::open(&dir.path().join("a.db")).unwrap();
        let clock = Arc::new(ManualClock::new(t0()));
        let seed = ActionService::new(
            Arc::new(RedbStore::open(&dir.path().join("seed.db")).unwrap()),
            clock.clone(),
            Lifecycle::new(TimeDelta::zero()),
            "P30D",
        )
        .run(json!({"utc_offset": 1}), &alice())
        .unwrap();

        inner.create(&seed).unwrap();
        let cancel = Lifecycle::new(TimeDelta::zero())
            .cancel(&seed, &alice(), t0())
            .unwrap();
        inner.update(&seed.action_id, ActionStatus::Active, &cancel).unwrap();

        let store = Arc::new(StaleReads {
            inner,
            snapshot: Mutex::new(Some(seed.clone())),
        });
        clock.advance(TimeDelta::seconds(10));
        let service = ActionService::new(store, clock, Lifecycle::new(TimeDelta::zero()), "P30D");

        let seen = service.status(&seed.action_id, &alice()).unwrap();
        assert_eq!(seen.status, ActionStatus::Failed);
        assert_eq!(seen.display_status, "Cancelled by alice");
    }

    #[test]
    fn cancel_losing_to_completion_conflicts() {
        let dir = TempDir::new().unwrap();
        let inner = RedbStore::open(&dir.path().join("a.db")).unwrap();
        let clock = Arc::new(ManualClock::new(t0()));
        let record = RunRequest::parse(json!({"utc_offset": 1}))
            .unwrap()
            .into_record("a1".into(), &alice(), t0(), "P30D");
        inner.create(&record).unwrap();
        let done = Lifecycle::new(TimeDelta::zero())
            .evaluate_completion(&record, t0() + TimeDelta::seconds(1), Some(1))
            .unwrap();
        inner.update("a1", ActionStatus::Active, &done).unwrap();

        let store = Arc::new(StaleReads {
            inner,
            snapshot: Mutex::new(Some(record)),
        });
        let service = ActionService::new(
            store.clone(),
            clock,
            Lifecycle::new(TimeDelta::zero()),
            "P30D",
        );

        let err = service.cancel("a1", &alice()).unwrap_err();
        assert!(matches!(err, ActionError::Conflict(_)));
        let kept = store.inner.get("a1").unwrap().unwrap();
        assert_eq!(kept.status, ActionStatus::Succeeded);
        assert_eq!(kept.display_status, "Action completed");
    }

    struct Unavailable;

    impl ActionStore for Unavailable {
        fn create(&self, _: &ActionRecord) -> Result<ActionRecord> {
            Err(ActionError::StoreUnavailable("disk full".into()))
        }
        fn get(&self, _: &str) -> Result<Option<ActionRecord>> {
            Err(ActionError::StoreUnavailable("disk full".into()))
        }
        fn update(&self, _: &str, _: ActionStatus, _: &ActionUpdate) -> Result<ActionRecord> {
            Err(ActionError::StoreUnavailable("disk full".into()))
        }
    }

    #[test]
    fn store_failures_surface_as_store_unavailable() {
        let service = ActionService::new(
            Arc::new(Unavailable),
            Arc::new(ManualClock::new(t0())),
            Lifecycle::new(TimeDelta::zero()),
            "P30D",
        );
        assert!(matches!(
            service.run(json!({"utc_offset": 1}), &alice()),
            Err(ActionError::StoreUnavailable(_))
        ));
        assert!(matches!(
            service.status("a1", &alice()),
            Err(ActionError::StoreUnavailable(_))
        ));
    }

    #[test]
    fn in_memory_store_runs_the_same_lifecycle() {
        let clock = Arc::new(ManualClock::new(t0()));
        let service = ActionService::new(
            Arc::new(crate::store::InMemoryStore::new()),
            clock.clone(),
            Lifecycle::new(TimeDelta::seconds(120)),
            "P30D",
        );
        let id = service.run(json!({"utc_offset": 3}), &alice()).unwrap().action_id;

        clock.advance(TimeDelta::seconds(121));
        let done = service.status(&id, &alice()).unwrap();
        assert_eq!(done.status, ActionStatus::Succeeded);
        assert_eq!(done.details["local_time"], json!("2024-03-01T15:00:00+00:00"));
        assert_completion_invariant(&done);

        service.release(&id, &alice()).unwrap();
        assert!(matches!(
            service.status(&id, &alice()),
            Err(ActionError::NotFound(_))
        ));
    }
}
