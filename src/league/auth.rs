//! League auth tokens: a one-way derivation from `(agent_id, league_id)`
//! plus a per-process secret, validated by recompute-and-compare rather
//! than a lookup table.
//!
//! Mirrors the `AuthConfig::validate` pattern used for the HTTP bearer
//! token check elsewhere in this codebase: hash both sides with
//! SHA-256 and compare the digests with `subtle::ConstantTimeEq` so the
//! comparison itself can't leak timing information about how many
//! leading bytes matched.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Holds the per-process secret used to derive auth tokens. One
/// instance per league manager process; referees and players only ever
/// see the resulting opaque token string, never the secret.
#[derive(Debug, Clone)]
pub struct TokenAuthority {
    secret: String,
}

impl TokenAuthority {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Generate a fresh random secret, suitable for one league-manager
    /// process lifetime.
    pub fn generate() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string())
    }

    /// Deterministically derive the token for `(agent_id, league_id)`.
    pub fn issue(&self, agent_id: &str, league_id: &str) -> String {
        let digest = Sha256::digest(format!("{}:{}:{}", self.secret, agent_id, league_id).as_bytes());
        format!("tok_{}_{}", agent_id, hex_encode(&digest[..8]))
    }

    /// Recompute the expected token for `(agent_id, league_id)` and
    /// compare it against `presented` in constant time.
    pub fn validate(&self, agent_id: &str, league_id: &str, presented: &str) -> bool {
        let expected = self.issue(agent_id, league_id);
        let expected_hash = Sha256::digest(expected.as_bytes());
        let presented_hash = Sha256::digest(presented.as_bytes());
        expected_hash.ct_eq(&presented_hash).into()
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
