use async_trait::async_trait;
use halftone_engine::ImageGraph;
use halftone_types::{EventRecord, GraphSnapshot, GraphSummary, ImageGraphId, ImageId};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("image graph {0} not found")]
    NotFound(ImageGraphId),
    #[error("image graph {0} already exists")]
    Duplicate(ImageGraphId),
    #[error("image graph {id} is stale: stored version {stored}, loaded at {loaded}")]
    Stale {
        id: ImageGraphId,
        stored: u64,
        loaded: u64,
    },
    #[error("storage backend: {0}")]
    Backend(String),
}

/// Aggregate store. `begin` opens a unit of work; `view` and `list` are
/// the lock-free read path, returning deep-cloned snapshots that share
/// nothing with live aggregates.
#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn GraphTx>, StoreError>;

    async fn view(&self, id: &ImageGraphId) -> Result<GraphSnapshot, StoreError>;

    async fn list(&self) -> Result<Vec<GraphSummary>, StoreError>;

    /// True when any slot of any stored graph still references the
    /// image. Drives orphaned-blob cleanup.
    async fn image_referenced(&self, image_id: &ImageId) -> Result<bool, StoreError>;
}

/// One unit of work.
///
/// `get` reserves the aggregate for exclusive mutation until the
/// transaction ends and returns a working copy; repeated `get`s of the
/// same id return the same copy. `commit` persists every reserved
/// aggregate, drains its pending events exactly once — in emission
/// order — into the returned records, and appends them to the durable
/// event log. Dropping the transaction without committing discards all
/// working copies.
#[async_trait]
pub trait GraphTx: Send {
    async fn get(&mut self, id: &ImageGraphId) -> Result<&mut ImageGraph, StoreError>;

    async fn add(&mut self, graph: ImageGraph) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<Vec<EventRecord>, StoreError>;
}
