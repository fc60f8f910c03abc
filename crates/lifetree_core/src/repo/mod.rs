//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the blob store contract the service layer depends on.
//! - Isolate SQLite and compression details from tree orchestration.
//!
//! # Invariants
//! - Stores are byte-transparent: the engine gets back what it saved.
//! - Concurrent writers are detected through revisions, never merged.

pub mod tree_store;
