//! Cryptographic helpers for skillgate.
//!
//! - `token`: capability secret generation and SHA-256 fingerprints

pub mod token;

pub use token::{fingerprint, generate_secret, load_capability_secret, CapabilitySecret, SecretOrigin};
