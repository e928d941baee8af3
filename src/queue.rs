//! `DSQueue`: a signed advertisement that an INODE is accepting entries (or
//! is full and ready) for a given denomination mask.

use crate::signer;
use crate::types::OutPoint;
use ed25519_dalek::{SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("queue signature does not verify")]
    InvalidSignature,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DSQueue {
    /// The INODE's identifying outpoint (its collateral vin).
    pub vin: OutPoint,
    pub denom_mask: u8,
    pub time: i64,
    /// false = advertising (still accepting entries); true = session full.
    pub ready: bool,
    pub sig: [u8; 64],
}

impl DSQueue {
    /// Build the unsigned form; call `sign` before broadcasting.
    pub fn unsigned(vin: OutPoint, denom_mask: u8, time: i64, ready: bool) -> Self {
        Self {
            vin,
            denom_mask,
            time,
            ready,
            sig: [0u8; 64],
        }
    }

    fn signing_payload(&self) -> Vec<u8> {
        let mut msg = Vec::with_capacity(32 + 4 + 1 + 8 + 1);
        msg.extend_from_slice(&self.vin.txid);
        msg.extend_from_slice(&self.vin.vout.to_le_bytes());
        msg.push(self.denom_mask);
        msg.extend_from_slice(&self.time.to_le_bytes());
        msg.push(self.ready as u8);
        msg
    }

    pub fn sign(&mut self, key: &SigningKey) {
        self.sig = signer::sign(key, &self.signing_payload());
    }

    pub fn verify_against_registry(&self, pubkey: &VerifyingKey) -> Result<(), QueueError> {
        signer::verify(pubkey, &self.sig, &self.signing_payload())
            .map_err(|_| QueueError::InvalidSignature)
    }

    pub fn is_expired(&self, now: i64) -> bool {
        now - self.time > crate::constants::timing::QUEUE_TIMEOUT_SECS
    }
}
