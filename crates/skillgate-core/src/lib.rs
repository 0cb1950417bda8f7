//! Business logic and port traits for skillgate.
//!
//! This crate defines the ports (document storage, package probe, skill
//! loader, kernel modules and dispatch) that the infrastructure layer
//! implements. It depends only on `skillgate-types` and never touches the
//! filesystem itself.

pub mod event;
pub mod guard;
pub mod kernel;
pub mod settings;
pub mod skill;
pub mod storage;
