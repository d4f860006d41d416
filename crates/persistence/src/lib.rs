//! Persistence layer for the projection engine.
//!
//! Working state lives in a [`ProjectionSession`]; every category is mirrored
//! to a keyed store (the REST API in production, memory in tests). Saves are
//! versioned so that only the newest response for a category is applied, and
//! the store's canonical copy wins over local values.

pub mod bridge;
pub mod debounce;
pub mod error;
pub mod http;
pub mod session;
pub mod store;
pub mod verify;

pub use bridge::{LoadedState, PersistenceBridge, SaveOutcome, SaveRequest, VersionLedger};
pub use debounce::Debouncer;
pub use error::{PersistenceError, Result};
pub use http::HttpProjectionStore;
pub use session::{ProjectionSession, SaveStatus, SessionEvent};
pub use store::{InMemoryProjectionStore, ProjectionStore};
pub use verify::{compare_snapshots, SyncDiff, SyncReport, SyncVerifier};
