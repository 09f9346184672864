use std::sync::Arc;

use async_trait::async_trait;
use halftone_runtime::{now_ms, BlobError, BlobStore};
use halftone_types::ImageId;
use rusqlite::{params, OptionalExtension};

use crate::db::Db;

pub struct SqliteBlobStore {
    db: Arc<Db>,
}

impl SqliteBlobStore {
    pub fn new(db: Arc<Db>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl BlobStore for SqliteBlobStore {
    async fn save(&self, image_id: &ImageId, bytes: Vec<u8>) -> Result<(), BlobError> {
        let db = self.db.clone();
        let image_id = image_id.clone();
        tokio::task::spawn_blocking(move || {
            let conn = db.open().map_err(BlobError::Backend)?;
            conn.execute(
                "INSERT OR REPLACE INTO blobs (image_id, bytes, created_at_ms)
                 VALUES (?1, ?2, ?3)",
                params![image_id, bytes, now_ms()],
            )
            .map_err(|error| BlobError::Backend(format!("save blob {image_id}: {error}")))?;
            Ok(())
        })
        .await
        .map_err(|error| BlobError::Backend(format!("join sqlite: {error}")))?
    }

    async fn get(&self, image_id: &ImageId) -> Result<Vec<u8>, BlobError> {
        let db = self.db.clone();
        let image_id = image_id.clone();
        tokio::task::spawn_blocking(move || {
            let conn = db.open().map_err(BlobError::Backend)?;
            conn.query_row(
                "SELECT bytes FROM blobs WHERE image_id = ?1",
                params![image_id],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()
            .map_err(|error| BlobError::Backend(format!("read blob {image_id}: {error}")))?
            .ok_or_else(|| BlobError::NotFound(image_id.clone()))
        })
        .await
        .map_err(|error| BlobError::Backend(format!("join sqlite: {error}")))?
    }

    async fn exists(&self, image_id: &ImageId) -> Result<bool, BlobError> {
        let db = self.db.clone();
        let image_id = image_id.clone();
        tokio::task::spawn_blocking(move || {
            let conn = db.open().map_err(BlobError::Backend)?;
            let found = conn
                .query_row(
                    "SELECT 1 FROM blobs WHERE image_id = ?1",
                    params![image_id],
                    |_| Ok(()),
                )
                .optional()
                .map_err(|error| {
                    BlobError::Backend(format!("probe blob {image_id}: {error}"))
                })?;
            Ok(found.is_some())
        })
        .await
        .map_err(|error| BlobError::Backend(format!("join sqlite: {error}")))?
    }

    async fn remove(&self, image_id: &ImageId) -> Result<(), BlobError> {
        let db = self.db.clone();
        let image_id = image_id.clone();
        tokio::task::spawn_blocking(move || {
            let conn = db.open().map_err(BlobError::Backend)?;
            conn.execute(
                "DELETE FROM blobs WHERE image_id = ?1",
                params![image_id],
            )
            .map_err(|error| BlobError::Backend(format!("remove blob {image_id}: {error}")))?;
            Ok(())
        })
        .await
        .map_err(|error| BlobError::Backend(format!("join sqlite: {error}")))?
    }
}
