//! External collaborator interfaces.
//!
//! Base-layer chain storage, wallet coin selection, the INODE registry and
//! the network transport are explicitly out of scope for the mixing core;
//! this module names the seams the core consumes so production code can
//! plug in real implementations while tests use the in-memory ones below.

use crate::types::{OutPoint, Transaction};
use async_trait::async_trait;
use ed25519_dalek::VerifyingKey;

/// Read access to chain state and mempool policy.
pub trait ChainView: Send + Sync {
    fn get_transaction(&self, txid: &crate::types::Hash256) -> Option<Transaction>;
    fn acceptable_inputs(&self, tx: &Transaction) -> bool;
}

/// Wallet-side coin selection and signing primitives.
pub trait WalletView: Send + Sync {
    fn is_denominated(&self, value: u64) -> bool;
    fn select_coins_by_denominations(
        &self,
        mask: u8,
        min: u64,
        max: u64,
    ) -> Option<(Vec<OutPoint>, u64)>;
    fn has_collateral_inputs(&self) -> bool;
    fn create_collateral_transaction(&self) -> Option<Transaction>;
    /// Builds a transaction whose outputs are denominated so the resulting
    /// coins total at least `total_value`, or `None` if the wallet can't.
    fn create_denominated_transaction(&self, total_value: u64) -> Option<Transaction>;
    fn unlock(&self, outpoint: &OutPoint);
    fn is_mine(&self, outpoint: &OutPoint) -> bool;
    fn sign_input(
        &self,
        tx: &Transaction,
        index: usize,
        script_pubkey: &[u8],
        hash_type: u32,
    ) -> Vec<u8>;
}

/// One row of the INODE registry.
#[derive(Clone, Debug)]
pub struct InodeRecord {
    pub vin: OutPoint,
    pub pubkey: VerifyingKey,
    pub last_dsq_index: u64,
    pub proto_version: u32,
    pub allow_free_tx: bool,
}

pub trait InodeRegistryView: Send + Sync {
    fn records(&self) -> Vec<InodeRecord>;
    fn find(&self, vin: &OutPoint) -> Option<InodeRecord>;
    fn count_peers_above(&self, min_proto_version: u32) -> u64;
}

/// Outbound network actions.
#[async_trait]
pub trait NetworkHandle: Send + Sync {
    async fn connect(&self, addr: &str) -> Result<(), String>;
    async fn broadcast(&self, msg: &crate::network::message::NetworkMessage);
    fn peers(&self) -> Vec<String>;
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct MockChain {
        transactions: Mutex<HashMap<crate::types::Hash256, Transaction>>,
        accept: Mutex<bool>,
    }

    impl MockChain {
        pub fn new() -> Self {
            Self {
                transactions: Mutex::new(HashMap::new()),
                accept: Mutex::new(true),
            }
        }

        pub fn insert(&self, txid: crate::types::Hash256, tx: Transaction) {
            self.transactions.lock().unwrap().insert(txid, tx);
        }

        pub fn set_acceptable(&self, accept: bool) {
            *self.accept.lock().unwrap() = accept;
        }
    }

    impl ChainView for MockChain {
        fn get_transaction(&self, txid: &crate::types::Hash256) -> Option<Transaction> {
            self.transactions.lock().unwrap().get(txid).cloned()
        }

        fn acceptable_inputs(&self, _tx: &Transaction) -> bool {
            *self.accept.lock().unwrap()
        }
    }

    #[derive(Default)]
    pub struct MockRegistry {
        records: Vec<InodeRecord>,
    }

    impl MockRegistry {
        pub fn new(records: Vec<InodeRecord>) -> Self {
            Self { records }
        }
    }

    impl InodeRegistryView for MockRegistry {
        fn records(&self) -> Vec<InodeRecord> {
            self.records.clone()
        }

        fn find(&self, vin: &OutPoint) -> Option<InodeRecord> {
            self.records.iter().find(|r| &r.vin == vin).cloned()
        }

        fn count_peers_above(&self, min_proto_version: u32) -> u64 {
            self.records
                .iter()
                .filter(|r| r.proto_version >= min_proto_version)
                .count() as u64
        }
    }
}
