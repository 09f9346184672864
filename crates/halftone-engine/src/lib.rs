//! Image graph domain engine.
//!
//! An [`ImageGraph`] is a named, versioned DAG of typed transformation
//! nodes. Node outputs feed downstream inputs; every mutation either
//! fails without a trace or commits and appends ordered [`Event`]s to the
//! aggregate's pending buffer. The engine is pure in-memory — storage,
//! scheduling, and notification live in `halftone-runtime`.
//!
//! The emission order of events within one operation is a contract:
//! side-effect handlers (image generation, propagation, blob cleanup,
//! live notification) replay it verbatim.

mod error;
mod events;
mod graph;
mod node;
mod ports;
pub mod registry;

pub use error::GraphError;
pub use events::{Event, EventBody, NodeStamp};
pub use graph::ImageGraph;
pub use node::Node;
pub use ports::{Input, InputSource, Output, OutputTarget, PortName};
