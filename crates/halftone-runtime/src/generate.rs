use std::sync::Arc;

use async_trait::async_trait;
use halftone_engine::registry;
use halftone_types::{ImageGraphId, ImageId, InputImageRef, NodeConfig, NodeId, NodeType};
use thiserror::Error;

use crate::blob::BlobStore;

/// Payload of one `node_needs_outputs` event, handed to the generation
/// collaborator.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub graph_id: ImageGraphId,
    pub node_id: NodeId,
    pub config: NodeConfig,
    pub inputs: Vec<InputImageRef>,
}

#[derive(Debug, Clone)]
pub struct GeneratedOutput {
    pub output_name: String,
    pub image_id: ImageId,
}

#[derive(Debug, Clone, Error)]
pub enum GenerateError {
    /// Worth retrying with backoff.
    #[error("transient generation failure: {0}")]
    Transient(String),
    /// Recorded and given up on; the node stays in Generating until its
    /// inputs change.
    #[error("permanent generation failure: {0}")]
    Permanent(String),
}

/// Produces one image per output of the requested node. The pixel-level
/// transforms live behind this boundary.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(
        &self,
        request: &GenerateRequest,
    ) -> Result<Vec<GeneratedOutput>, GenerateError>;
}

/// Generator that moves bytes without transforming them: every output of
/// the node gets a fresh id whose blob is a copy of the first input.
/// Keeps the pipeline observable end to end while real transforms remain
/// an external concern. Input nodes produce nothing — their outputs are
/// set by upload.
pub struct PassthroughGenerator {
    blobs: Arc<dyn BlobStore>,
}

impl PassthroughGenerator {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self { blobs }
    }
}

#[async_trait]
impl ImageGenerator for PassthroughGenerator {
    async fn generate(
        &self,
        request: &GenerateRequest,
    ) -> Result<Vec<GeneratedOutput>, GenerateError> {
        let node_type = request.config.node_type();
        if node_type == NodeType::Input {
            return Ok(Vec::new());
        }
        let Some(source) = request.inputs.first() else {
            return Err(GenerateError::Permanent(format!(
                "node {} of type {node_type} has no input images to derive outputs from",
                request.node_id
            )));
        };
        let bytes = self
            .blobs
            .get(&source.image_id)
            .await
            .map_err(|error| GenerateError::Transient(error.to_string()))?;

        let mut outputs = Vec::new();
        for output_name in registry::spec(node_type).outputs {
            let image_id = ImageId::generate();
            self.blobs
                .save(&image_id, bytes.clone())
                .await
                .map_err(|error| GenerateError::Transient(error.to_string()))?;
            outputs.push(GeneratedOutput {
                output_name: (*output_name).to_string(),
                image_id,
            });
        }
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::MemoryBlobStore;
    use halftone_types::{BlurConfig, InputConfig};

    #[tokio::test]
    async fn passthrough_copies_the_first_input_blob() {
        let blobs = Arc::new(MemoryBlobStore::new());
        let source = ImageId::generate();
        blobs.save(&source, vec![9, 9, 9]).await.expect("save");

        let generator = PassthroughGenerator::new(blobs.clone());
        let outputs = generator
            .generate(&GenerateRequest {
                graph_id: ImageGraphId::generate(),
                node_id: NodeId::generate(),
                config: NodeConfig::Blur(BlurConfig { radius: 3 }),
                inputs: vec![InputImageRef {
                    input_name: "original".to_string(),
                    image_id: source,
                }],
            })
            .await
            .expect("generate");

        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].output_name, "blurred");
        assert_eq!(
            blobs.get(&outputs[0].image_id).await.expect("copied blob"),
            vec![9, 9, 9]
        );
    }

    #[tokio::test]
    async fn input_nodes_generate_nothing() {
        let generator = PassthroughGenerator::new(Arc::new(MemoryBlobStore::new()));
        let outputs = generator
            .generate(&GenerateRequest {
                graph_id: ImageGraphId::generate(),
                node_id: NodeId::generate(),
                config: NodeConfig::Input(InputConfig {}),
                inputs: Vec::new(),
            })
            .await
            .expect("generate");
        assert!(outputs.is_empty());
    }

    #[tokio::test]
    async fn missing_input_blob_is_transient() {
        let generator = PassthroughGenerator::new(Arc::new(MemoryBlobStore::new()));
        let err = generator
            .generate(&GenerateRequest {
                graph_id: ImageGraphId::generate(),
                node_id: NodeId::generate(),
                config: NodeConfig::Blur(BlurConfig { radius: 3 }),
                inputs: vec![InputImageRef {
                    input_name: "original".to_string(),
                    image_id: ImageId::generate(),
                }],
            })
            .await
            .expect_err("no blob");
        assert!(matches!(err, GenerateError::Transient(_)));
    }
}
