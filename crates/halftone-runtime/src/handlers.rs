//! Built-in event handlers: propagation, generation, blob cleanup, and
//! live notification. Each one filters the record stream for the kinds
//! it cares about; errors are logged by the fan-out loop and never reach
//! the originating command.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use halftone_types::{EventKind, EventRecord};
use tracing::{debug, info, warn};

use crate::blob::BlobStore;
use crate::command::Command;
use crate::dispatch::{Dispatcher, EventHandler};
use crate::generate::{GenerateError, GenerateRequest, ImageGenerator};
use crate::store::GraphStore;

/// Translates `node_output_image_set` / `node_output_image_unset` into
/// propagation commands, each running in a fresh unit of work. Keeping
/// this out of the domain method preserves the within-node event order.
pub struct PropagationHandler;

#[async_trait]
impl EventHandler for PropagationHandler {
    fn name(&self) -> &'static str {
        "propagation"
    }

    async fn handle(&self, dispatcher: &Dispatcher, record: &EventRecord) -> Result<(), String> {
        match record.kind {
            EventKind::NodeOutputImageSet => {
                let (node_id, output_name, image_id) = propagation_fields(record)?;
                let image_id = image_id
                    .ok_or_else(|| "output image set record is missing image_id".to_string())?;
                dispatcher
                    .handle_command(Command::PropagateOutputImage {
                        graph_id: record.aggregate_id.clone(),
                        node_id,
                        output_name,
                        image_id,
                    })
                    .await
                    .map_err(|error| format!("propagate output image: {error}"))?;
            }
            EventKind::NodeOutputImageUnset => {
                let (node_id, output_name, _) = propagation_fields(record)?;
                dispatcher
                    .handle_command(Command::PropagateOutputUnset {
                        graph_id: record.aggregate_id.clone(),
                        node_id,
                        output_name,
                    })
                    .await
                    .map_err(|error| format!("propagate output unset: {error}"))?;
            }
            _ => {}
        }
        Ok(())
    }
}

fn propagation_fields(
    record: &EventRecord,
) -> Result<
    (
        halftone_types::NodeId,
        String,
        Option<halftone_types::ImageId>,
    ),
    String,
> {
    let node_id = record
        .node_id
        .clone()
        .ok_or_else(|| "output image record is missing node_id".to_string())?;
    let output_name = record
        .output_name
        .clone()
        .ok_or_else(|| "output image record is missing output_name".to_string())?;
    Ok((node_id, output_name, record.image_id.clone()))
}

/// Drives the image-generation collaborator from `node_needs_outputs`
/// records. Transient failures retry with bounded exponential backoff;
/// permanent failures are recorded and the node stays in Generating
/// until its inputs change.
pub struct GenerationHandler {
    generator: Arc<dyn ImageGenerator>,
    max_attempts: u32,
    initial_backoff: Duration,
}

impl GenerationHandler {
    pub fn new(generator: Arc<dyn ImageGenerator>) -> Self {
        Self {
            generator,
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
        }
    }

    pub fn with_retry(mut self, max_attempts: u32, initial_backoff: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.initial_backoff = initial_backoff;
        self
    }
}

#[async_trait]
impl EventHandler for GenerationHandler {
    fn name(&self) -> &'static str {
        "generation"
    }

    async fn handle(&self, dispatcher: &Dispatcher, record: &EventRecord) -> Result<(), String> {
        if record.kind != EventKind::NodeNeedsOutputs {
            return Ok(());
        }
        let request = GenerateRequest {
            graph_id: record.aggregate_id.clone(),
            node_id: record
                .node_id
                .clone()
                .ok_or_else(|| "needs-outputs record is missing node_id".to_string())?,
            config: record
                .config
                .clone()
                .ok_or_else(|| "needs-outputs record is missing config".to_string())?,
            inputs: record.inputs.clone().unwrap_or_default(),
        };

        let mut backoff = self.initial_backoff;
        let mut attempt = 1;
        let outputs = loop {
            match self.generator.generate(&request).await {
                Ok(outputs) => break outputs,
                Err(GenerateError::Transient(reason)) if attempt < self.max_attempts => {
                    warn!(
                        graph_id = %request.graph_id,
                        node_id = %request.node_id,
                        attempt,
                        %reason,
                        "generation failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                    attempt += 1;
                }
                Err(GenerateError::Transient(reason)) => {
                    return Err(format!(
                        "generation gave up after {} attempts: {reason}",
                        self.max_attempts
                    ));
                }
                Err(GenerateError::Permanent(reason)) => {
                    return Err(format!("generation failed permanently: {reason}"));
                }
            }
        };

        for output in outputs {
            dispatcher
                .handle_command(Command::SetImageGraphNodeOutputImage {
                    graph_id: request.graph_id.clone(),
                    node_id: request.node_id.clone(),
                    output_name: output.output_name.clone(),
                    image_id: output.image_id,
                })
                .await
                .map_err(|error| {
                    format!("record generated output {:?}: {error}", output.output_name)
                })?;
        }
        Ok(())
    }
}

/// Deletes blobs that no slot of any stored graph references any more.
/// Reacts to the image-unset records, which carry the prior id.
pub struct BlobCleanupHandler {
    store: Arc<dyn GraphStore>,
    blobs: Arc<dyn BlobStore>,
}

impl BlobCleanupHandler {
    pub fn new(store: Arc<dyn GraphStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { store, blobs }
    }
}

#[async_trait]
impl EventHandler for BlobCleanupHandler {
    fn name(&self) -> &'static str {
        "blob-cleanup"
    }

    async fn handle(&self, _dispatcher: &Dispatcher, record: &EventRecord) -> Result<(), String> {
        if !matches!(
            record.kind,
            EventKind::NodeOutputImageUnset | EventKind::NodeInputImageUnset
        ) {
            return Ok(());
        }
        let Some(image_id) = &record.image_id else {
            return Ok(());
        };
        let referenced = self
            .store
            .image_referenced(image_id)
            .await
            .map_err(|error| format!("reference scan for {image_id}: {error}"))?;
        if referenced {
            debug!(%image_id, "blob still referenced, keeping");
            return Ok(());
        }
        self.blobs
            .remove(image_id)
            .await
            .map_err(|error| format!("remove orphaned blob {image_id}: {error}"))?;
        info!(%image_id, "removed orphaned image blob");
        Ok(())
    }
}

/// Forwards every committed record to the live notifier.
pub struct NotificationHandler {
    notifier: Arc<crate::notify::Notifier>,
}

impl NotificationHandler {
    pub fn new(notifier: Arc<crate::notify::Notifier>) -> Self {
        Self { notifier }
    }
}

#[async_trait]
impl EventHandler for NotificationHandler {
    fn name(&self) -> &'static str {
        "notification"
    }

    async fn handle(&self, _dispatcher: &Dispatcher, record: &EventRecord) -> Result<(), String> {
        self.notifier.broadcast(&record.aggregate_id, record);
        Ok(())
    }
}
