//! # ragent core
//!
//! Domain types, capability traits, and error definitions for the ragent
//! tool-calling agent. Every external collaborator the agent loop talks to
//! (the model, the retrieval index, the tool plugins) is described here as a
//! trait; implementations live in their own crates.
//!
//! ## Design Philosophy
//!
//! - The agent loop depends only on the traits in this crate, so tests can
//!   swap any collaborator for a stub.
//! - Tool failures are data (`ToolCallResult`), not errors. Only the model
//!   gateway and retrieval capabilities have error types.

pub mod error;
pub mod model;
pub mod retrieval;
pub mod session;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{GatewayError, RetrievalError};
pub use model::{ModelGateway, ModelReply, ModelStep};
pub use retrieval::{ContextDocument, Retriever};
pub use session::{Event, Role};
pub use tool::{
    Plugin, PluginRegistry, ToolCallData, ToolCallRequest, ToolCallResult, ToolDefinition,
    ToolKind,
};
