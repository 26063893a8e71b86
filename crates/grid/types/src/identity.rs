//! Requesting party identity
//!
//! Couples the twin that owns deployments with the Ed25519 key that
//! authorizes its registry calls.

use crate::ids::TwinId;
use ed25519_dalek::SigningKey;
use std::fmt;

/// Identity of the party requesting deployments
#[derive(Clone)]
pub struct Identity {
    twin_id: TwinId,
    signing_key: SigningKey,
}

impl Identity {
    /// Create an identity from a 32-byte Ed25519 seed
    pub fn from_seed(twin_id: TwinId, seed: &[u8; 32]) -> Self {
        Self {
            twin_id,
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    pub fn twin_id(&self) -> TwinId {
        self.twin_id
    }

    /// Hex-encoded public key, used as the contract owner
    pub fn public_key(&self) -> String {
        hex::encode(self.signing_key.verifying_key().as_bytes())
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("twin_id", &self.twin_id)
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}
