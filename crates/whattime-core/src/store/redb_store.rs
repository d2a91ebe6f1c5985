//! redb-backed action store.
//!
//! # Table design
//!
//! A single `ACTIONS` table keyed by `action_id`, valued by the JSON-encoded
//! [`ActionRow`]. redb admits one write transaction at a time, so
//! `update` reads, checks and rewrites a record inside one write transaction
//! and two transitions on the same record can never interleave.

use std::path::{Path, PathBuf};

use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};

use super::{apply_checked, ActionRow, ActionStore};
use crate::action::{ActionRecord, ActionStatus, ActionUpdate};
use crate::error::{ActionError, Result};

/// Key: action_id. Value: JSON-encoded `ActionRow`.
const ACTIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("actions");

pub struct RedbStore {
    db: Database,
    path: PathBuf,
}

impl RedbStore {
    /// Open or create the database at `path`, creating parent directories
    /// and the `ACTIONS` table as needed.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path).map_err(ActionError::store)?;
        // Ensure the table exists before any reads
        let wt = db.begin_write().map_err(ActionError::store)?;
        wt.open_table(ACTIONS).map_err(ActionError::store)?;
        wt.commit().map_err(ActionError::store)?;
        Ok(Self {
            db,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of records on disk, released ones included.
    pub fn len(&self) -> Result<u64> {
        let rt = self.db.begin_read().map_err(ActionError::store)?;
        let table = rt.open_table(ACTIONS).map_err(ActionError::store)?;
        table.len().map_err(ActionError::store)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Read a record regardless of its released flag.
    fn read_raw(&self, action_id: &str) -> Result<Option<ActionRecord>> {
        let rt = self.db.begin_read().map_err(ActionError::store)?;
        let table = rt.open_table(ACTIONS).map_err(ActionError::store)?;
        let Some(guard) = table.get(action_id).map_err(ActionError::store)? else {
            return Ok(None);
        };
        decode(guard.value()).map(Some)
    }
}

fn decode(bytes: &[u8]) -> Result<ActionRecord> {
    let row: ActionRow = serde_json::from_slice(bytes).map_err(ActionError::store)?;
    row.into_record()
}

fn encode(record: &ActionRecord) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(&ActionRow::from_record(record)?)?)
}

impl ActionStore for RedbStore {
    fn create(&self, record: &ActionRecord) -> Result<ActionRecord> {
        let value = encode(record)?;
        let wt = self.db.begin_write().map_err(ActionError::store)?;
        {
            let mut table = wt.open_table(ACTIONS).map_err(ActionError::store)?;
            let exists = table
                .get(record.action_id.as_str())
                .map_err(ActionError::store)?
                .is_some();
            if exists {
                return Err(ActionError::Conflict(format!(
                    "action {} already exists",
                    record.action_id
                )));
            }
            table
                .insert(record.action_id.as_str(), value.as_slice())
                .map_err(ActionError::store)?;
        }
        wt.commit().map_err(ActionError::store)?;
        Ok(record.clone())
    }

    fn get(&self, action_id: &str) -> Result<Option<ActionRecord>> {
        Ok(self.read_raw(action_id)?.filter(|r| !r.is_released))
    }

    fn update(
        &self,
        action_id: &str,
        expected: ActionStatus,
        update: &ActionUpdate,
    ) -> Result<ActionRecord> {
        let wt = self.db.begin_write().map_err(ActionError::store)?;
        let updated = {
            let mut table = wt.open_table(ACTIONS).map_err(ActionError::store)?;
            let current = table
                .get(action_id)
                .map_err(ActionError::store)?
                .map(|guard| decode(guard.value()))
                .transpose()?
                .ok_or_else(|| ActionError::NotFound(action_id.to_string()))?;

            let updated = apply_checked(current, expected, update)?;
            let value = encode(&updated)?;
            table
                .insert(action_id, value.as_slice())
                .map_err(ActionError::store)?;
            updated
        };
        wt.commit().map_err(ActionError::store)?;
        Ok(updated)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
