//! Core UTXO transaction primitives shared across the mixing pipeline.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub type Hash256 = [u8; 32];
pub type Signature = [u8; 64];

pub const SATOSHIS_PER_TIME: u64 = 100_000_000;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct OutPoint {
    pub txid: Hash256,
    pub vout: u32,
}

impl OutPoint {
    pub fn is_null(&self) -> bool {
        self.txid == [0u8; 32] && self.vout == u32::MAX
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TxInput {
    pub previous_output: OutPoint,
    pub script_sig: Vec<u8>,
    pub sequence: u32,
}

impl TxInput {
    pub fn unsigned(previous_output: OutPoint) -> Self {
        Self {
            previous_output,
            script_sig: Vec::new(),
            sequence: 0xffff_ffff,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TxOutput {
    pub value: u64,
    pub script_pubkey: Vec<u8>,
}

impl TxOutput {
    /// A standard pay-to-pubkey-hash script is exactly 25 bytes:
    /// OP_DUP OP_HASH160 <20-byte hash> OP_EQUALVERIFY OP_CHECKSIG
    pub fn is_standard_p2pkh(&self) -> bool {
        self.script_pubkey.len() == 25
            && self.script_pubkey[0] == 0x76
            && self.script_pubkey[1] == 0xa9
            && self.script_pubkey[2] == 0x14
            && self.script_pubkey[23] == 0x88
            && self.script_pubkey[24] == 0xac
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub lock_time: u32,
    pub timestamp: i64,
}

impl Transaction {
    pub fn txid(&self) -> Hash256 {
        let json = serde_json::to_string(self).expect("canonical JSON serialization");
        Sha256::digest(json.as_bytes()).into()
    }

    pub fn output_sum(&self) -> u64 {
        self.outputs.iter().map(|o| o.value).sum()
    }
}
