use std::collections::HashMap;
use std::sync::RwLock;

use super::{apply_checked, ActionStore};
use crate::action::{ActionRecord, ActionStatus, ActionUpdate};
use crate::error::{ActionError, Result};

/// Process-local store. Contents are lost on drop.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: RwLock<HashMap<String, ActionRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ActionStore for InMemoryStore {
    fn create(&self, record: &ActionRecord) -> Result<ActionRecord> {
        let mut guard = self.records.write().map_err(ActionError::store)?;
        if guard.contains_key(&record.action_id) {
            return Err(ActionError::Conflict(format!(
                "action {} already exists",
                record.action_id
            )));
        }
        guard.insert(record.action_id.clone(), record.clone());
        Ok(record.clone())
    }

    fn get(&self, action_id: &str) -> Result<Option<ActionRecord>> {
        let guard = self.records.read().map_err(ActionError::store)?;
        Ok(guard.get(action_id).filter(|r| !r.is_released).cloned())
    }

    fn update(
        &self,
        action_id: &str,
        expected: ActionStatus,
        update: &ActionUpdate,
    ) -> Result<ActionRecord> {
        let mut guard = self.records.write().map_err(ActionError::store)?;
        let current = guard
            .get(action_id)
            .cloned()
            .ok_or_else(|| ActionError::NotFound(action_id.to_string()))?;
        let updated = apply_checked(current, expected, update)?;
        guard.insert(action_id.to_string(), updated.clone());
        Ok(updated)
    }
}
