//! Shared domain types for skillgate.
//!
//! Caller identity, the command envelope, skill descriptors and projections,
//! configuration shapes, bus events, and the error taxonomy shared by every
//! other crate.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod actor;
pub mod command;
pub mod config;
pub mod error;
pub mod event;
pub mod secret;
pub mod skill;
