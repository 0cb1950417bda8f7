//! Storage abstractions for skillgate.
//!
//! Implementations backed by the filesystem live in skillgate-infra.

pub mod document;

pub use document::{ConfigDocumentStore, MemoryDocumentStore};
