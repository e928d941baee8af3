//! `Entry`: one client's contribution to a mixing session.

use crate::types::{OutPoint, Transaction, TxOutput};
use serde::{Deserialize, Serialize};

/// One of an entry's inputs, with its script-sig slot. `is_sig_set` becomes
/// true once the owning client has returned a signature for this input.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EntryInput {
    pub vin: OutPoint,
    pub script_sig: Vec<u8>,
    pub is_sig_set: bool,
}

impl EntryInput {
    pub fn unsigned(vin: OutPoint) -> Self {
        Self {
            vin,
            script_sig: Vec::new(),
            is_sig_set: false,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Entry {
    pub inputs: Vec<EntryInput>,
    pub amount: u64,
    pub collateral_tx: Transaction,
    pub outputs: Vec<TxOutput>,
    pub created_at: i64,
}

impl Entry {
    pub fn new(
        inputs: Vec<EntryInput>,
        amount: u64,
        collateral_tx: Transaction,
        outputs: Vec<TxOutput>,
        created_at: i64,
    ) -> Self {
        Self {
            inputs,
            amount,
            collateral_tx,
            outputs,
            created_at,
        }
    }

    /// Sets the signature for `vin` if present. Re-delivery of the same
    /// signature is a no-op that reports success; a different signature for
    /// an outpoint already signed is rejected (signature aggregation is
    /// idempotent, not overwritable).
    pub fn add_signature(&mut self, vin: &OutPoint, script_sig: Vec<u8>) -> Result<bool, ()> {
        for input in &mut self.inputs {
            if &input.vin == vin {
                if input.is_sig_set {
                    return if input.script_sig == script_sig {
                        Ok(false) // already present, second call is a no-op
                    } else {
                        Err(())
                    };
                }
                input.script_sig = script_sig;
                input.is_sig_set = true;
                return Ok(true);
            }
        }
        Err(())
    }

    pub fn all_signatures_present(&self) -> bool {
        self.inputs.iter().all(|i| i.is_sig_set)
    }

    pub fn unsigned_vins(&self) -> impl Iterator<Item = &OutPoint> {
        self.inputs
            .iter()
            .filter(|i| !i.is_sig_set)
            .map(|i| &i.vin)
    }

    pub fn is_expired(&self, now: i64) -> bool {
        now - self.created_at > crate::constants::timing::ENTRY_TIMEOUT_SECS
    }

    pub fn input_outpoints(&self) -> impl Iterator<Item = &OutPoint> {
        self.inputs.iter().map(|i| &i.vin)
    }

    pub fn output_sum(&self) -> u64 {
        self.outputs.iter().map(|o| o.value).sum()
    }
}
