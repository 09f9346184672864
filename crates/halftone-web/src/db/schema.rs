use crate::db::Db;

/// Creates the persistence tables: aggregate snapshots, the append-only
/// event log, the slot-image index driving blob cleanup, and the blobs.
pub fn init_sqlite(db: &Db) -> Result<(), String> {
    let conn = db.open()?;
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS graphs (
            graph_id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            version INTEGER NOT NULL,
            node_count INTEGER NOT NULL,
            snapshot TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS events (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            graph_id TEXT NOT NULL,
            aggregate_version INTEGER NOT NULL,
            kind TEXT NOT NULL,
            node_id TEXT,
            timestamp_ms INTEGER NOT NULL,
            record TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_events_graph
            ON events (graph_id, aggregate_version);
        CREATE TABLE IF NOT EXISTS slot_images (
            graph_id TEXT NOT NULL,
            image_id TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_slot_images_image
            ON slot_images (image_id);
        CREATE INDEX IF NOT EXISTS idx_slot_images_graph
            ON slot_images (graph_id);
        CREATE TABLE IF NOT EXISTS blobs (
            image_id TEXT PRIMARY KEY,
            bytes BLOB NOT NULL,
            created_at_ms INTEGER NOT NULL
        );",
    )
    .map_err(|error| format!("init sqlite schema: {error}"))?;
    Ok(())
}
