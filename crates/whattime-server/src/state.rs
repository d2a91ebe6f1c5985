use std::sync::Arc;

use whattime_core::{ActionService, ActionStore, Clock, Config, RedbStore, SystemClock};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub service: Arc<ActionService>,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn ActionStore>, clock: Arc<dyn Clock>) -> Self {
        let service = ActionService::from_config(&config, store, clock);
        Self {
            config: Arc::new(config),
            service: Arc::new(service),
        }
    }

    /// Open the redb store at `config.db_path` and run on the system clock.
    pub fn open(config: Config) -> whattime_core::Result<Self> {
        let store = RedbStore::open(&config.db_path)?;
        tracing::info!(db_path = %config.db_path.display(), "action store opened");
        Ok(Self::new(config, Arc::new(store), Arc::new(SystemClock)))
    }
}
