//! Capability secret sourcing.
//!
//! The secret comes from the environment variable named in `config.toml`, or
//! is generated from the OS CSPRNG for the lifetime of the process. Only its
//! SHA-256 fingerprint is ever logged.
//!
//! SECURITY: nothing in this module formats the secret itself.

use aes_gcm::aead::OsRng;
use aes_gcm::aead::rand_core::RngCore;
use sha2::{Digest, Sha256};
use skillgate_core::guard::MIN_SECRET_LEN;
use skillgate_types::secret::Redacted;

/// Random bytes in a generated secret (hex-encoded to twice as many chars).
const SECRET_BYTES: usize = 32;

/// Hex chars of the digest shown as a fingerprint.
const FINGERPRINT_LEN: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretOrigin {
    Environment,
    Generated,
}

#[derive(Debug, Clone)]
pub struct CapabilitySecret {
    pub value: Redacted,
    pub origin: SecretOrigin,
}

impl CapabilitySecret {
    pub fn fingerprint(&self) -> String {
        fingerprint(self.value.expose())
    }
}

/// A fresh 256-bit secret, lowercase hex.
pub fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex_encode(&bytes)
}

/// Short SHA-256 fingerprint, safe to log.
pub fn fingerprint(secret: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(secret.as_bytes()));
    digest[..FINGERPRINT_LEN].to_string()
}

/// Read the secret from `env_var`, falling back to a generated one.
///
/// A value shorter than the guard's minimum is ignored with a warning rather
/// than failing startup.
pub fn load_capability_secret(env_var: &str) -> CapabilitySecret {
    secret_from(env_var, std::env::var(env_var).ok())
}

fn secret_from(env_var: &str, value: Option<String>) -> CapabilitySecret {
    match value {
        Some(value) if value.chars().count() >= MIN_SECRET_LEN => {
            let secret = CapabilitySecret {
                value: Redacted::new(value),
                origin: SecretOrigin::Environment,
            };
            tracing::info!(env = env_var, fingerprint = %secret.fingerprint(), "capability secret loaded");
            secret
        }
        other => {
            if other.is_some() {
                tracing::warn!(
                    env = env_var,
                    min_len = MIN_SECRET_LEN,
                    "capability secret too short, generating one for this process"
                );
            }
            let secret = CapabilitySecret {
                value: Redacted::new(generate_secret()),
                origin: SecretOrigin::Generated,
            };
            tracing::debug!(fingerprint = %secret.fingerprint(), "capability secret generated");
            secret
        }
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
