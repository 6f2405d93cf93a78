//! Persisted copies of the last successfully read metadata document, used
//! for drift detection and as an offline fallback.

mod storage;
mod types;

pub use storage::SnapshotStore;
pub use types::SnapshotError;
