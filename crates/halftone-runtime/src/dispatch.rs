//! Command dispatch and asynchronous event fan-out.
//!
//! `handle_command` runs synchronously from the caller's point of view:
//! it opens a unit of work, drives the aggregate, commits, and returns
//! the committed records. Those records are then queued FIFO for one
//! background task that delivers them serially to every registered
//! handler. Handler failures are logged and never surface to the
//! command that produced the event.

use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use halftone_engine::ImageGraph;
use halftone_types::EventRecord;
use tokio::sync::mpsc;
use tracing::warn;

use crate::command::{Command, CommandError};
use crate::store::GraphStore;

pub const DEFAULT_COMMAND_DEADLINE: Duration = Duration::from_secs(30);
pub const DEFAULT_HANDLER_DEADLINE: Duration = Duration::from_secs(30);

/// Side-effect handler invoked for every committed event record.
#[async_trait]
pub trait EventHandler: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, dispatcher: &Dispatcher, record: &EventRecord) -> Result<(), String>;
}

struct DispatcherInner {
    store: Arc<dyn GraphStore>,
    handlers: parking_lot::RwLock<Vec<Arc<dyn EventHandler>>>,
    queue: mpsc::UnboundedSender<EventRecord>,
    command_deadline: Duration,
    handler_deadline: Duration,
}

#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self::with_deadlines(store, DEFAULT_COMMAND_DEADLINE, DEFAULT_HANDLER_DEADLINE)
    }

    pub fn with_deadlines(
        store: Arc<dyn GraphStore>,
        command_deadline: Duration,
        handler_deadline: Duration,
    ) -> Self {
        let (queue, rx) = mpsc::unbounded_channel();
        let inner = Arc::new(DispatcherInner {
            store,
            handlers: parking_lot::RwLock::new(Vec::new()),
            queue,
            command_deadline,
            handler_deadline,
        });
        tokio::spawn(run_fan_out(rx, Arc::downgrade(&inner)));
        Self { inner }
    }

    /// Registers a handler. Zero or more handlers per event kind; each
    /// handler sees every record and filters for itself.
    pub fn register_handler(&self, handler: Arc<dyn EventHandler>) {
        self.inner.handlers.write().push(handler);
    }

    pub fn store(&self) -> &Arc<dyn GraphStore> {
        &self.inner.store
    }

    /// Executes one command inside a unit of work. On success the
    /// committed records are returned to the caller and queued for
    /// asynchronous fan-out; on failure the transaction is rolled back
    /// and nothing is delivered. A command that outlives its deadline is
    /// reported as cancelled — the unit of work is dropped unfinished,
    /// which is the rollback path.
    pub async fn handle_command(
        &self,
        command: Command,
    ) -> Result<Vec<EventRecord>, CommandError> {
        let name = command.name();
        let records = match tokio::time::timeout(
            self.inner.command_deadline,
            execute(self.inner.store.as_ref(), command),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => return Err(CommandError::Cancelled(name)),
        };
        for record in &records {
            if self.inner.queue.send(record.clone()).is_err() {
                warn!("event fan-out task is gone; dropping committed records");
                break;
            }
        }
        Ok(records)
    }
}

/// Runs the command against the store. Any `?` before `commit` drops the
/// transaction, which rolls it back.
async fn execute(
    store: &dyn GraphStore,
    command: Command,
) -> Result<Vec<EventRecord>, CommandError> {
    let mut tx = store.begin().await?;
    match command {
        Command::CreateImageGraph { graph_id, name } => {
            let graph = ImageGraph::new(graph_id, &name)?;
            tx.add(graph).await?;
        }
        Command::AddImageGraphNode {
            graph_id,
            node_id,
            node_type,
            name,
            config,
        } => {
            tx.get(&graph_id)
                .await?
                .add_node(node_id, node_type, &name, config)?;
        }
        Command::RemoveImageGraphNode { graph_id, node_id } => {
            tx.get(&graph_id).await?.remove_node(&node_id)?;
        }
        Command::ConnectImageGraphNodes {
            graph_id,
            from_node_id,
            output_name,
            to_node_id,
            input_name,
        } => {
            tx.get(&graph_id).await?.connect_nodes(
                &from_node_id,
                &output_name,
                &to_node_id,
                &input_name,
            )?;
        }
        Command::DisconnectImageGraphNodes {
            graph_id,
            from_node_id,
            output_name,
            to_node_id,
            input_name,
        } => {
            tx.get(&graph_id).await?.disconnect_nodes(
                &from_node_id,
                &output_name,
                &to_node_id,
                &input_name,
            )?;
        }
        Command::SetImageGraphNodeOutputImage {
            graph_id,
            node_id,
            output_name,
            image_id,
        } => {
            tx.get(&graph_id)
                .await?
                .set_node_output_image(&node_id, &output_name, image_id)?;
        }
        Command::UnsetImageGraphNodeOutputImage {
            graph_id,
            node_id,
            output_name,
        } => {
            tx.get(&graph_id)
                .await?
                .unset_node_output_image(&node_id, &output_name)?;
        }
        Command::SetImageGraphNodePreview {
            graph_id,
            node_id,
            image_id,
        } => {
            tx.get(&graph_id)
                .await?
                .set_node_preview(&node_id, image_id)?;
        }
        Command::UnsetImageGraphNodePreview { graph_id, node_id } => {
            tx.get(&graph_id).await?.unset_node_preview(&node_id)?;
        }
        Command::SetImageGraphNodeConfig {
            graph_id,
            node_id,
            config,
        } => {
            tx.get(&graph_id).await?.set_node_config(&node_id, config)?;
        }
        Command::SetImageGraphNodeName {
            graph_id,
            node_id,
            name,
        } => {
            tx.get(&graph_id).await?.set_node_name(&node_id, &name)?;
        }
        Command::PropagateOutputImage {
            graph_id,
            node_id,
            output_name,
            image_id,
        } => {
            tx.get(&graph_id)
                .await?
                .propagate_output_image_to_connections(&node_id, &output_name, image_id)?;
        }
        Command::PropagateOutputUnset {
            graph_id,
            node_id,
            output_name,
        } => {
            tx.get(&graph_id)
                .await?
                .unset_node_output_connections(&node_id, &output_name)?;
        }
    }
    Ok(tx.commit().await?)
}

async fn run_fan_out(
    mut rx: mpsc::UnboundedReceiver<EventRecord>,
    inner: Weak<DispatcherInner>,
) {
    while let Some(record) = rx.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        let dispatcher = Dispatcher {
            inner: inner.clone(),
        };
        let handlers: Vec<Arc<dyn EventHandler>> = inner.handlers.read().clone();
        for handler in handlers {
            match tokio::time::timeout(
                inner.handler_deadline,
                handler.handle(&dispatcher, &record),
            )
            .await
            {
                Ok(Ok(())) => {}
                Ok(Err(error)) => warn!(
                    handler = handler.name(),
                    kind = ?record.kind,
                    aggregate_id = %record.aggregate_id,
                    %error,
                    "event handler failed"
                ),
                Err(_) => warn!(
                    handler = handler.name(),
                    kind = ?record.kind,
                    aggregate_id = %record.aggregate_id,
                    "event handler exceeded its deadline"
                ),
            }
        }
    }
}
