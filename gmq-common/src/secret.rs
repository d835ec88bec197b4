//! Shared-secret comparison for privileged commands
//!
//! Privileged commands (the extreme volume preset) are gated by a static
//! shared secret taken from configuration. Both sides are hashed with SHA-256
//! and the digests compared, so the comparison cost does not depend on the
//! length of the common prefix. This is still a weak control: anyone who
//! learns the secret holds the privilege.
//!
//! # Pure Functions
//!
//! No HTTP framework dependencies; the service decides how a failed check is
//! reported.

use sha2::{Digest, Sha256};

/// Compare a provided secret against the configured one.
///
/// Returns `false` when no secret is configured (privileged commands are
/// disabled) or when the configured secret is empty.
pub fn secret_matches(provided: &str, configured: Option<&str>) -> bool {
    match configured {
        Some(expected) if !expected.is_empty() => {
            let a = Sha256::digest(provided.as_bytes());
            let b = Sha256::digest(expected.as_bytes());
            // Fold over every byte so the loop never exits early
            a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
        }
        _ => false,
    }
}
