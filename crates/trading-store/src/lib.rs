//! Learning state and event log persistence.
//!
//! - [`JsonlStore`]: append-only JSON-lines files in a directory
//! - [`MemoryStore`]: in-process store for tests and dry runs

mod jsonl;
mod memory;

pub use jsonl::JsonlStore;
pub use memory::{MemoryStore, DEFAULT_HISTORY_LIMIT};
