//! Commit/reveal secrets for shielded redemption.
//!
//! The claim transaction commits to `hash(secret)`; the escrow mints a pending
//! shield note under that hash. Revealing `secret` to the token contract later
//! moves the amount into the holder's private balance. The token contract
//! recomputes the hash on reveal, so the commitment always comes from
//! [`TokenLedger::secret_hash`](crate::TokenLedger::secret_hash).

use rand::RngCore;
use serde::{Deserialize, Serialize};
use zimburse_common::Field;

/// A secret and the token ledger's commitment to it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimSecret {
    secret: Field,
    hash: Field,
}

impl ClaimSecret {
    pub fn new(secret: Field, hash: Field) -> Self {
        Self { secret, hash }
    }

    pub fn secret(&self) -> &Field {
        &self.secret
    }

    pub fn hash(&self) -> &Field {
        &self.hash
    }
}

/// Fresh secret from the OS RNG. The top byte is cleared so the value stays
/// below the field modulus.
pub fn generate_secret() -> Field {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    bytes[0] = 0;
    Field(bytes)
}

impl std::fmt::Debug for ClaimSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaimSecret")
            .field("secret", &"<redacted>")
            .field("hash", &self.hash)
            .finish()
    }
}
