//! Runtime shell around the halftone engine.
//!
//! Every external mutation arrives as a [`Command`], runs inside a unit
//! of work ([`GraphStore::begin`] → domain calls → commit), and its
//! committed event records fan out asynchronously to registered
//! [`EventHandler`]s: image generation, downstream propagation, blob
//! cleanup, and live notification. Handlers submit further commands,
//! each in a fresh unit of work.

mod blob;
mod command;
mod dispatch;
mod generate;
mod handlers;
mod memory;
mod notify;
mod store;
mod time;

pub use blob::{BlobError, BlobStore, MemoryBlobStore};
pub use command::{Command, CommandError};
pub use dispatch::{Dispatcher, EventHandler, DEFAULT_COMMAND_DEADLINE, DEFAULT_HANDLER_DEADLINE};
pub use generate::{
    GenerateError, GenerateRequest, GeneratedOutput, ImageGenerator, PassthroughGenerator,
};
pub use handlers::{
    BlobCleanupHandler, GenerationHandler, NotificationHandler, PropagationHandler,
};
pub use memory::MemoryGraphStore;
pub use notify::{Notifier, Subscription};
pub use store::{GraphStore, GraphTx, StoreError};
pub use time::now_ms;
