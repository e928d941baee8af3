//! Keyed signing and verification over domain-separated message digests.
//!
//! The original protocol signs `SHA256d(magic || msg)` with a compact,
//! recoverable secp256k1 signature and verifies by recovering the signer's
//! public key and comparing its derived address. This codebase's signing
//! stack is ed25519-dalek throughout, which has no public-key-recovery API.
//! Recovery was never a security requirement here — the original's
//! `VerifyMessage` already compares the recovered key against a known
//! expected key — so this implementation signs and verifies directly
//! against a caller-supplied public key instead of recovering one.

use crate::types::Hash256;
use ed25519_dalek::{Signer as _, SigningKey, Verifier as _, VerifyingKey};
use sha2::{Digest, Sha256};

/// Domain-separation prefix mixed into every signed message, mirroring the
/// magic-prefixed message hashing of the original signer.
const SIGNING_MAGIC: &[u8] = b"AnonPool Signed Message:\n";

#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    #[error("malformed signature bytes")]
    MalformedSignature,
    #[error("malformed public key bytes")]
    MalformedPublicKey,
    #[error("signature does not verify against the supplied public key")]
    VerificationFailed,
}

/// Hashes `msg` the same way the wire protocol expects it signed:
/// `SHA256d(magic || msg)`.
fn digest(msg: &[u8]) -> Hash256 {
    let mut prefixed = Vec::with_capacity(SIGNING_MAGIC.len() + msg.len());
    prefixed.extend_from_slice(SIGNING_MAGIC);
    prefixed.extend_from_slice(msg);
    let once = Sha256::digest(&prefixed);
    Sha256::digest(once).into()
}

/// Sign `msg` with `key`, returning the 64-byte signature bytes.
pub fn sign(key: &SigningKey, msg: &[u8]) -> [u8; 64] {
    key.sign(&digest(msg)).to_bytes()
}

/// Verify that `sig` is a valid signature over `msg` by the holder of `pubkey`.
pub fn verify(pubkey: &VerifyingKey, sig: &[u8; 64], msg: &[u8]) -> Result<(), SignerError> {
    let signature = ed25519_dalek::Signature::from_slice(sig)
        .map_err(|_| SignerError::MalformedSignature)?;
    pubkey
        .verify(&digest(msg), &signature)
        .map_err(|_| SignerError::VerificationFailed)
}

/// Checks that `outpoint`'s producing transaction pays the INODE collateral
/// stake to a script derived from `pubkey`. Mirrors
/// `IsVinAssociatedWithPubkey`: the chain lookup itself is an external
/// collaborator concern (`ChainView::get_transaction`).
pub fn associated_with(
    chain: &dyn crate::collaborators::ChainView,
    outpoint: &crate::types::OutPoint,
    expected_script: &[u8],
) -> bool {
    let Some(tx) = chain.get_transaction(&outpoint.txid) else {
        return false;
    };
    let Some(output) = tx.outputs.get(outpoint.vout as usize) else {
        return false;
    };
    output.value == crate::constants::fees::COLLATERAL_STAKE
        && output.script_pubkey == expected_script
}
