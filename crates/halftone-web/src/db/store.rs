//! SQLite-backed graph store.
//!
//! Aggregates persist as facet-JSON snapshots alongside an append-only
//! event log. Mutation is serialised two ways: an in-process
//! per-aggregate mutex held for the life of each unit of work, and a
//! commit-time `BEGIN IMMEDIATE` transaction that re-checks the stored
//! aggregate version — a stale working copy is a conflict, which keeps
//! the exclusive-reservation contract honest even across processes.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use facet::Facet;
use halftone_engine::ImageGraph;
use halftone_runtime::{now_ms, GraphStore, GraphTx, StoreError};
use halftone_types::{
    EventRecord, GraphSnapshot, GraphSummary, ImageGraphId, ImageId, NodeSnapshot,
};
use rusqlite::{params, OptionalExtension, TransactionBehavior};
use rusqlite_facet::{ConnectionFacetExt, StatementFacetExt};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::db::Db;

#[derive(Clone)]
pub struct SqliteGraphStore {
    db: Arc<Db>,
    locks: Arc<parking_lot::Mutex<HashMap<ImageGraphId, Arc<Mutex<()>>>>>,
}

impl SqliteGraphStore {
    pub fn new(db: Arc<Db>) -> Self {
        Self {
            db,
            locks: Arc::new(parking_lot::Mutex::new(HashMap::new())),
        }
    }

    fn lock_for(&self, id: &ImageGraphId) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .entry(id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[derive(Facet)]
struct GraphIdParams {
    graph_id: ImageGraphId,
}

#[derive(Facet)]
struct SnapshotRow {
    snapshot: String,
}

#[derive(Facet)]
struct GraphUpsertParams {
    graph_id: ImageGraphId,
    name: String,
    version: i64,
    node_count: i64,
    snapshot: String,
}

#[derive(Facet)]
struct SlotImageInsertParams {
    graph_id: ImageGraphId,
    image_id: ImageId,
}

#[derive(Facet)]
struct EventInsertParams {
    graph_id: ImageGraphId,
    aggregate_version: i64,
    kind: String,
    node_id: Option<String>,
    timestamp_ms: i64,
    record: String,
}

struct TxEntry {
    graph: ImageGraph,
    /// Version observed at load; None for fresh adds.
    loaded_version: Option<u64>,
    _guard: OwnedMutexGuard<()>,
}

struct GraphWrite {
    id: ImageGraphId,
    name: String,
    version: u64,
    node_count: usize,
    snapshot_json: String,
    image_ids: Vec<ImageId>,
    records: Vec<EventRecord>,
    loaded_version: Option<u64>,
}

pub struct SqliteTx {
    store: SqliteGraphStore,
    working: BTreeMap<ImageGraphId, TxEntry>,
}

#[async_trait]
impl GraphStore for SqliteGraphStore {
    async fn begin(&self) -> Result<Box<dyn GraphTx>, StoreError> {
        Ok(Box::new(SqliteTx {
            store: self.clone(),
            working: BTreeMap::new(),
        }))
    }

    async fn view(&self, id: &ImageGraphId) -> Result<GraphSnapshot, StoreError> {
        let db = self.db.clone();
        let graph_id = id.clone();
        let json = tokio::task::spawn_blocking(move || load_snapshot_json(&db, &graph_id))
            .await
            .map_err(|error| StoreError::Backend(format!("join sqlite: {error}")))??
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        facet_json::from_str(&json)
            .map_err(|error| StoreError::Backend(format!("decode stored graph {id}: {error}")))
    }

    async fn list(&self) -> Result<Vec<GraphSummary>, StoreError> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let conn = db.open().map_err(StoreError::Backend)?;
            let mut stmt = conn
                .prepare(
                    "SELECT graph_id, name, version, node_count
                     FROM graphs ORDER BY name ASC, graph_id ASC",
                )
                .map_err(|error| StoreError::Backend(format!("prepare graph list: {error}")))?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(GraphSummary {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        version: row.get::<_, i64>(2)? as u64,
                        node_count: row.get::<_, i64>(3)? as u64,
                    })
                })
                .map_err(|error| StoreError::Backend(format!("query graph list: {error}")))?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(|error| StoreError::Backend(format!("read graph list: {error}")))
        })
        .await
        .map_err(|error| StoreError::Backend(format!("join sqlite: {error}")))?
    }

    async fn image_referenced(&self, image_id: &ImageId) -> Result<bool, StoreError> {
        let db = self.db.clone();
        let image_id = image_id.clone();
        tokio::task::spawn_blocking(move || {
            let conn = db.open().map_err(StoreError::Backend)?;
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM slot_images WHERE image_id = ?1",
                    params![image_id],
                    |row| row.get(0),
                )
                .map_err(|error| {
                    StoreError::Backend(format!("count slot images: {error}"))
                })?;
            Ok(count > 0)
        })
        .await
        .map_err(|error| StoreError::Backend(format!("join sqlite: {error}")))?
    }
}

#[async_trait]
impl GraphTx for SqliteTx {
    async fn get(&mut self, id: &ImageGraphId) -> Result<&mut ImageGraph, StoreError> {
        if !self.working.contains_key(id) {
            let guard = self.store.lock_for(id).lock_owned().await;
            let db = self.store.db.clone();
            let graph_id = id.clone();
            let json = tokio::task::spawn_blocking(move || load_snapshot_json(&db, &graph_id))
                .await
                .map_err(|error| StoreError::Backend(format!("join sqlite: {error}")))??
                .ok_or_else(|| StoreError::NotFound(id.clone()))?;
            let snapshot: GraphSnapshot = facet_json::from_str(&json).map_err(|error| {
                StoreError::Backend(format!("decode stored graph {id}: {error}"))
            })?;
            let graph = ImageGraph::restore(snapshot).map_err(|error| {
                StoreError::Backend(format!("restore stored graph {id}: {error}"))
            })?;
            self.working.insert(
                id.clone(),
                TxEntry {
                    loaded_version: Some(graph.version()),
                    graph,
                    _guard: guard,
                },
            );
        }
        self.working
            .get_mut(id)
            .map(|entry| &mut entry.graph)
            .ok_or_else(|| {
                StoreError::Backend("identity map lost a freshly reserved aggregate".to_string())
            })
    }

    async fn add(&mut self, graph: ImageGraph) -> Result<(), StoreError> {
        let id = graph.id().clone();
        if self.working.contains_key(&id) {
            return Err(StoreError::Duplicate(id));
        }
        let guard = self.store.lock_for(&id).lock_owned().await;
        let db = self.store.db.clone();
        let graph_id = id.clone();
        let existing = tokio::task::spawn_blocking(move || load_version(&db, &graph_id))
            .await
            .map_err(|error| StoreError::Backend(format!("join sqlite: {error}")))??;
        if existing.is_some() {
            return Err(StoreError::Duplicate(id));
        }
        self.working.insert(
            id,
            TxEntry {
                loaded_version: None,
                graph,
                _guard: guard,
            },
        );
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<Vec<EventRecord>, StoreError> {
        let timestamp_ms = now_ms();
        let mut records = Vec::new();
        let mut writes = Vec::new();
        let mut guards = Vec::new();
        for (id, mut entry) in self.working {
            let graph_records: Vec<EventRecord> = entry
                .graph
                .take_events()
                .iter()
                .map(|event| event.to_record(timestamp_ms))
                .collect();
            let snapshot = entry.graph.snapshot();
            let snapshot_json = facet_json::to_string(&snapshot).map_err(|error| {
                StoreError::Backend(format!("encode graph {id} snapshot: {error}"))
            })?;
            writes.push(GraphWrite {
                id,
                name: snapshot.name.clone(),
                version: snapshot.version,
                node_count: snapshot.nodes.len(),
                snapshot_json,
                image_ids: slot_images(&snapshot.nodes),
                records: graph_records.clone(),
                loaded_version: entry.loaded_version,
            });
            records.extend(graph_records);
            guards.push(entry._guard);
        }

        let db = self.store.db.clone();
        tokio::task::spawn_blocking(move || commit_blocking(&db, &writes))
            .await
            .map_err(|error| StoreError::Backend(format!("join sqlite: {error}")))??;
        drop(guards);
        Ok(records)
    }
}

fn load_snapshot_json(db: &Db, id: &ImageGraphId) -> Result<Option<String>, StoreError> {
    let conn = db.open().map_err(StoreError::Backend)?;
    let mut stmt = conn
        .prepare("SELECT snapshot FROM graphs WHERE graph_id = :graph_id")
        .map_err(|error| StoreError::Backend(format!("prepare graph read: {error}")))?;
    let rows = stmt
        .facet_query_ref::<SnapshotRow, _>(&GraphIdParams {
            graph_id: id.clone(),
        })
        .map_err(|error| StoreError::Backend(format!("query graph {id}: {error}")))?;
    Ok(rows.into_iter().next().map(|row| row.snapshot))
}

fn load_version(db: &Db, id: &ImageGraphId) -> Result<Option<u64>, StoreError> {
    let conn = db.open().map_err(StoreError::Backend)?;
    conn.query_row(
        "SELECT version FROM graphs WHERE graph_id = ?1",
        params![id],
        |row| row.get::<_, i64>(0),
    )
    .optional()
    .map(|version| version.map(|version| version as u64))
    .map_err(|error| StoreError::Backend(format!("read graph {id} version: {error}")))
}

fn commit_blocking(db: &Db, writes: &[GraphWrite]) -> Result<(), StoreError> {
    let mut conn = db.open().map_err(StoreError::Backend)?;
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|error| StoreError::Backend(format!("begin commit: {error}")))?;

    for write in writes {
        let stored = tx
            .query_row(
                "SELECT version FROM graphs WHERE graph_id = ?1",
                params![write.id],
                |row| row.get::<_, i64>(0),
            )
            .optional()
            .map_err(|error| {
                StoreError::Backend(format!("re-read graph {} version: {error}", write.id))
            })?
            .map(|version| version as u64);
        match (stored, write.loaded_version) {
            (Some(_), None) => return Err(StoreError::Duplicate(write.id.clone())),
            (Some(stored), Some(loaded)) if stored != loaded => {
                return Err(StoreError::Stale {
                    id: write.id.clone(),
                    stored,
                    loaded,
                });
            }
            (None, Some(_)) => {
                return Err(StoreError::Backend(format!(
                    "invariant violated: graph {} vanished between load and commit",
                    write.id
                )));
            }
            _ => {}
        }

        tx.facet_execute_ref(
            "INSERT INTO graphs (graph_id, name, version, node_count, snapshot)
             VALUES (:graph_id, :name, :version, :node_count, :snapshot)
             ON CONFLICT(graph_id) DO UPDATE SET
               name = excluded.name,
               version = excluded.version,
               node_count = excluded.node_count,
               snapshot = excluded.snapshot",
            &GraphUpsertParams {
                graph_id: write.id.clone(),
                name: write.name.clone(),
                version: to_i64_u64(write.version),
                node_count: write.node_count as i64,
                snapshot: write.snapshot_json.clone(),
            },
        )
        .map_err(|error| StoreError::Backend(format!("upsert graph {}: {error}", write.id)))?;

        tx.execute(
            "DELETE FROM slot_images WHERE graph_id = ?1",
            params![write.id],
        )
        .map_err(|error| {
            StoreError::Backend(format!("clear slot images of {}: {error}", write.id))
        })?;
        for image_id in &write.image_ids {
            tx.facet_execute_ref(
                "INSERT INTO slot_images (graph_id, image_id) VALUES (:graph_id, :image_id)",
                &SlotImageInsertParams {
                    graph_id: write.id.clone(),
                    image_id: image_id.clone(),
                },
            )
            .map_err(|error| {
                StoreError::Backend(format!("index slot image of {}: {error}", write.id))
            })?;
        }

        for record in &write.records {
            let json = facet_json::to_string(record).map_err(|error| {
                StoreError::Backend(format!("encode event record: {error}"))
            })?;
            tx.facet_execute_ref(
                "INSERT INTO events
                   (graph_id, aggregate_version, kind, node_id, timestamp_ms, record)
                 VALUES
                   (:graph_id, :aggregate_version, :kind, :node_id, :timestamp_ms, :record)",
                &EventInsertParams {
                    graph_id: record.aggregate_id.clone(),
                    aggregate_version: to_i64_u64(record.aggregate_version),
                    kind: record.kind.as_str().to_string(),
                    node_id: record.node_id.as_ref().map(|id| id.as_str().to_string()),
                    timestamp_ms: record.timestamp_ms,
                    record: json,
                },
            )
            .map_err(|error| {
                StoreError::Backend(format!("append event for {}: {error}", write.id))
            })?;
        }
    }

    tx.commit()
        .map_err(|error| StoreError::Backend(format!("commit: {error}")))
}

/// Every image id referenced by a slot of the snapshot, previews
/// included, deduplicated.
fn slot_images(nodes: &[NodeSnapshot]) -> Vec<ImageId> {
    let mut seen = std::collections::BTreeSet::new();
    for node in nodes {
        if let Some(preview) = &node.preview {
            seen.insert(preview.clone());
        }
        for input in &node.inputs {
            if let Some(image_id) = &input.image_id {
                seen.insert(image_id.clone());
            }
        }
        for output in &node.outputs {
            if let Some(image_id) = &output.image_id {
                seen.insert(image_id.clone());
            }
        }
    }
    seen.into_iter().collect()
}

fn to_i64_u64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
