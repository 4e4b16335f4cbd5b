//! Session history and in-process retrieval for ragent.

pub mod in_memory;
pub mod noop;
pub mod session_store;

pub use in_memory::InMemoryRetriever;
pub use noop::NoopRetriever;
pub use session_store::{DEFAULT_CAPACITY, SessionSnapshot, SessionStore};
