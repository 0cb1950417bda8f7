//! Infrastructure layer for skillgate.
//!
//! Implements the ports defined in `skillgate-core` against the local
//! machine: the JSON configuration document, the filesystem package probe,
//! the package loader for declarative skill entries, `config.toml` loading
//! and capability secret generation.

pub mod config;
pub mod crypto;
pub mod document;
pub mod filesystem;
pub mod skill;
