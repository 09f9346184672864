//! In-memory graph store.
//!
//! Each aggregate lives behind its own `tokio::sync::Mutex`; a unit of
//! work takes the owned guard on first access and holds it until commit
//! or drop, serialising mutation per aggregate while distinct graphs
//! progress in parallel. Working copies are clones, so rollback is
//! simply dropping them.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use halftone_engine::ImageGraph;
use halftone_types::{EventRecord, GraphSnapshot, GraphSummary, ImageGraphId, ImageId};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::store::{GraphStore, GraphTx, StoreError};
use crate::time::now_ms;

#[derive(Clone, Default)]
pub struct MemoryGraphStore {
    graphs: Arc<parking_lot::Mutex<BTreeMap<ImageGraphId, Arc<Mutex<ImageGraph>>>>>,
    log: Arc<parking_lot::Mutex<Vec<EventRecord>>>,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full event log in commit order, for tests and inspection.
    pub fn event_log(&self) -> Vec<EventRecord> {
        self.log.lock().clone()
    }
}

struct WorkingCopy {
    copy: ImageGraph,
    // held for the lifetime of the transaction; None for fresh adds
    guard: Option<OwnedMutexGuard<ImageGraph>>,
}

struct MemoryTx {
    store: MemoryGraphStore,
    working: BTreeMap<ImageGraphId, WorkingCopy>,
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    async fn begin(&self) -> Result<Box<dyn GraphTx>, StoreError> {
        Ok(Box::new(MemoryTx {
            store: self.clone(),
            working: BTreeMap::new(),
        }))
    }

    async fn view(&self, id: &ImageGraphId) -> Result<GraphSnapshot, StoreError> {
        let slot = self
            .graphs
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        let graph = slot.lock().await;
        Ok(graph.snapshot())
    }

    async fn list(&self) -> Result<Vec<GraphSummary>, StoreError> {
        let slots: Vec<(ImageGraphId, Arc<Mutex<ImageGraph>>)> = self
            .graphs
            .lock()
            .iter()
            .map(|(id, slot)| (id.clone(), slot.clone()))
            .collect();
        let mut summaries = Vec::with_capacity(slots.len());
        for (id, slot) in slots {
            let graph = slot.lock().await;
            summaries.push(GraphSummary {
                id,
                name: graph.name().to_string(),
                version: graph.version(),
                node_count: graph.node_count() as u64,
            });
        }
        Ok(summaries)
    }

    async fn image_referenced(&self, image_id: &ImageId) -> Result<bool, StoreError> {
        let slots: Vec<Arc<Mutex<ImageGraph>>> =
            self.graphs.lock().values().cloned().collect();
        for slot in slots {
            let graph = slot.lock().await;
            if graph.references_image(image_id) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[async_trait]
impl GraphTx for MemoryTx {
    async fn get(&mut self, id: &ImageGraphId) -> Result<&mut ImageGraph, StoreError> {
        if !self.working.contains_key(id) {
            let slot = self
                .store
                .graphs
                .lock()
                .get(id)
                .cloned()
                .ok_or_else(|| StoreError::NotFound(id.clone()))?;
            let guard = slot.lock_owned().await;
            let copy = guard.clone();
            self.working.insert(
                id.clone(),
                WorkingCopy {
                    copy,
                    guard: Some(guard),
                },
            );
        }
        self.working
            .get_mut(id)
            .map(|working| &mut working.copy)
            .ok_or_else(|| {
                StoreError::Backend("identity map lost a freshly reserved aggregate".to_string())
            })
    }

    async fn add(&mut self, graph: ImageGraph) -> Result<(), StoreError> {
        let id = graph.id().clone();
        if self.working.contains_key(&id) || self.store.graphs.lock().contains_key(&id) {
            return Err(StoreError::Duplicate(id));
        }
        self.working.insert(
            id,
            WorkingCopy {
                copy: graph,
                guard: None,
            },
        );
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<Vec<EventRecord>, StoreError> {
        let timestamp_ms = now_ms();
        let mut records = Vec::new();
        for (id, mut working) in self.working {
            for event in working.copy.take_events() {
                records.push(event.to_record(timestamp_ms));
            }
            match working.guard {
                Some(mut guard) => {
                    *guard = working.copy;
                }
                None => {
                    let mut graphs = self.store.graphs.lock();
                    if graphs.contains_key(&id) {
                        return Err(StoreError::Duplicate(id));
                    }
                    graphs.insert(id, Arc::new(Mutex::new(working.copy)));
                }
            }
        }
        self.store.log.lock().extend(records.iter().cloned());
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use halftone_types::{EventKind, NodeConfig, NodeId, NodeType};

    async fn create(store: &MemoryGraphStore, name: &str) -> ImageGraphId {
        let id = ImageGraphId::generate();
        let graph = ImageGraph::new(id.clone(), name).expect("graph");
        let mut tx = store.begin().await.expect("begin");
        tx.add(graph).await.expect("add");
        tx.commit().await.expect("commit");
        id
    }

    #[tokio::test]
    async fn add_then_get_round_trips() {
        let store = MemoryGraphStore::new();
        let id = create(&store, "demo").await;

        let snapshot = store.view(&id).await.expect("view");
        assert_eq!(snapshot.name, "demo");
        assert_eq!(snapshot.version, 1);

        let missing = store.view(&ImageGraphId::generate()).await;
        assert!(matches!(missing, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn duplicate_add_is_rejected() {
        let store = MemoryGraphStore::new();
        let id = create(&store, "demo").await;

        let mut tx = store.begin().await.expect("begin");
        let err = tx
            .add(ImageGraph::new(id, "again").expect("graph"))
            .await
            .expect_err("duplicate");
        assert!(matches!(err, StoreError::Duplicate(_)));
    }

    #[tokio::test]
    async fn repeated_get_returns_the_same_working_copy() {
        let store = MemoryGraphStore::new();
        let id = create(&store, "demo").await;

        let mut tx = store.begin().await.expect("begin");
        let node_id = NodeId::generate();
        tx.get(&id)
            .await
            .expect("get")
            .add_node(
                node_id.clone(),
                NodeType::Input,
                "in",
                NodeConfig::Input(halftone_types::InputConfig {}),
            )
            .expect("add node");
        // second get must observe the uncommitted node
        let graph = tx.get(&id).await.expect("get again");
        assert!(graph.node(&node_id).is_ok());
        let records = tx.commit().await.expect("commit");
        assert_eq!(
            records.iter().map(|record| record.kind).collect::<Vec<_>>(),
            vec![
                EventKind::NodeCreated,
                EventKind::NodeConfigSet,
                EventKind::NodeNeedsOutputs,
                EventKind::NodeAdded,
            ]
        );
    }

    #[tokio::test]
    async fn dropping_a_transaction_rolls_back() {
        let store = MemoryGraphStore::new();
        let id = create(&store, "demo").await;

        {
            let mut tx = store.begin().await.expect("begin");
            tx.get(&id)
                .await
                .expect("get")
                .add_node(
                    NodeId::generate(),
                    NodeType::Input,
                    "in",
                    NodeConfig::Input(halftone_types::InputConfig {}),
                )
                .expect("add node");
            // dropped without commit
        }

        let snapshot = store.view(&id).await.expect("view");
        assert_eq!(snapshot.nodes.len(), 0);
        assert_eq!(snapshot.version, 1);
    }

    #[tokio::test]
    async fn events_drain_exactly_once() {
        let store = MemoryGraphStore::new();
        let id = create(&store, "demo").await;

        let mut tx = store.begin().await.expect("begin");
        tx.get(&id).await.expect("get");
        let records = tx.commit().await.expect("commit");
        assert!(records.is_empty(), "already-drained events must not reappear");

        // the creation event is in the log exactly once
        let log = store.event_log();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].kind, EventKind::Created);
        assert_eq!(log[0].aggregate_id, id);
    }

    #[tokio::test]
    async fn image_reference_scan_spans_graphs() {
        let store = MemoryGraphStore::new();
        let id = create(&store, "demo").await;

        let image = halftone_types::ImageId::generate();
        let mut tx = store.begin().await.expect("begin");
        let graph = tx.get(&id).await.expect("get");
        let node_id = NodeId::generate();
        graph
            .add_node(
                node_id.clone(),
                NodeType::Input,
                "in",
                NodeConfig::Input(halftone_types::InputConfig {}),
            )
            .expect("add node");
        graph
            .set_node_output_image(&node_id, "original", image.clone())
            .expect("set image");
        tx.commit().await.expect("commit");

        assert!(store.image_referenced(&image).await.expect("scan"));
        assert!(
            !store
                .image_referenced(&halftone_types::ImageId::generate())
                .await
                .expect("scan")
        );
    }
}
