pub mod autosave;
pub mod cache;
pub mod changes;
pub mod commit;
pub mod config;
pub mod error;
pub mod events;
pub mod identity;
pub mod logging;
mod macros;
pub mod planner;
pub mod session;
pub mod store;
pub mod totals;

pub use changes::{ChangeSet, EntityKind, Field, FieldValue, Placement};
pub use commit::{CommitReport, CommitState};
pub use error::{LedgerError, StoreError};
pub use identity::{allocate_pending_id, is_pending, PendingId, RowKey};
pub use session::EditSession;

// Always expose testing module (integration tests need it)
pub mod testing;
