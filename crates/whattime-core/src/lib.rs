pub mod action;
pub mod clock;
pub mod config;
pub mod duration;
pub mod error;
pub mod events;
pub mod identity;
pub mod lifecycle;
pub mod service;
pub mod store;

pub use action::{ActionRecord, ActionStatus, ActionUpdate, ActionView, RunRequest};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use error::{ActionError, Result};
pub use identity::Caller;
pub use lifecycle::Lifecycle;
pub use service::ActionService;
pub use store::{ActionStore, InMemoryStore, RedbStore};
