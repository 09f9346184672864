use std::collections::HashMap;

use async_trait::async_trait;
use halftone_types::ImageId;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BlobError {
    #[error("image {0} not found")]
    NotFound(ImageId),
    #[error("blob backend: {0}")]
    Backend(String),
}

/// Byte storage for image blobs. Ids are content-addressed upstream, so
/// `save` is idempotent: re-saving an existing id overwrites in place.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn save(&self, image_id: &ImageId, bytes: Vec<u8>) -> Result<(), BlobError>;

    async fn get(&self, image_id: &ImageId) -> Result<Vec<u8>, BlobError>;

    async fn exists(&self, image_id: &ImageId) -> Result<bool, BlobError>;

    async fn remove(&self, image_id: &ImageId) -> Result<(), BlobError>;
}

#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: parking_lot::Mutex<HashMap<ImageId, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn save(&self, image_id: &ImageId, bytes: Vec<u8>) -> Result<(), BlobError> {
        self.blobs.lock().insert(image_id.clone(), bytes);
        Ok(())
    }

    async fn get(&self, image_id: &ImageId) -> Result<Vec<u8>, BlobError> {
        self.blobs
            .lock()
            .get(image_id)
            .cloned()
            .ok_or_else(|| BlobError::NotFound(image_id.clone()))
    }

    async fn exists(&self, image_id: &ImageId) -> Result<bool, BlobError> {
        Ok(self.blobs.lock().contains_key(image_id))
    }

    async fn remove(&self, image_id: &ImageId) -> Result<(), BlobError> {
        self.blobs.lock().remove(image_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_get_remove_cycle() {
        let store = MemoryBlobStore::new();
        let id = ImageId::generate();

        assert!(!store.exists(&id).await.expect("exists"));
        store.save(&id, vec![1, 2, 3]).await.expect("save");
        assert!(store.exists(&id).await.expect("exists"));
        assert_eq!(store.get(&id).await.expect("get"), vec![1, 2, 3]);

        // idempotent overwrite
        store.save(&id, vec![1, 2, 3]).await.expect("resave");

        store.remove(&id).await.expect("remove");
        assert!(matches!(
            store.get(&id).await.expect_err("gone"),
            BlobError::NotFound(_)
        ));
        // removing a missing blob is not an error
        store.remove(&id).await.expect("remove again");
    }
}
