//! Owns all mixing state that used to live behind process-wide singletons:
//! the queue rate-limit counters, coin locks, per-round INODE usage, and the
//! bounded record of transactions this node has already broadcast.

use crate::constants::network::BROADCAST_TX_CACHE_SIZE;
use crate::queue::DSQueue;
use crate::session::Session;
use crate::types::{Hash256, OutPoint};
use dashmap::DashMap;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;

/// Root object for mixing state on one node. A node running as an INODE
/// holds live `Session`s here; any node (INODE or client) tracks its own
/// queue-issuance counters, locked coins, and broadcast-tx dedup cache
/// through the same value rather than module-level globals.
pub struct MixingCoordinator {
    sessions: DashMap<u32, Session>,
    next_session_id: Mutex<u32>,

    /// Per-INODE-vin queue issuance counter, used for the `dsq` rate limit.
    dsq_counter: DashMap<OutPoint, u64>,

    /// Outpoints currently locked by an in-flight session, owned by the
    /// session and released on every exit path.
    locked_coins: DashMap<OutPoint, u32>,

    /// INODEs already tried this client round, to avoid repeat attempts.
    used_inodes: Mutex<Vec<OutPoint>>,

    /// Write-once-per-hash record of transactions already broadcast,
    /// bounded by an LRU so it can never grow without limit.
    broadcast_txes: Mutex<LruCache<Hash256, ()>>,
}

impl MixingCoordinator {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            next_session_id: Mutex::new(1),
            dsq_counter: DashMap::new(),
            locked_coins: DashMap::new(),
            used_inodes: Mutex::new(Vec::new()),
            broadcast_txes: Mutex::new(LruCache::new(
                NonZeroUsize::new(BROADCAST_TX_CACHE_SIZE).unwrap(),
            )),
        }
    }

    pub fn create_session(&self, now_ms: i64) -> u32 {
        let mut next = self.next_session_id.lock();
        let id = *next;
        *next += 1;
        self.sessions.insert(id, Session::new(id, now_ms));
        id
    }

    pub fn with_session<R>(&self, id: u32, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        self.sessions.get_mut(&id).map(|mut s| f(&mut s))
    }

    pub fn session_ids(&self) -> Vec<u32> {
        self.sessions.iter().map(|e| *e.key()).collect()
    }

    pub fn remove_session(&self, id: u32) {
        self.sessions.remove(&id);
    }

    pub fn lock_coin(&self, outpoint: OutPoint, session_id: u32) {
        self.locked_coins.insert(outpoint, session_id);
    }

    pub fn unlock_coin(&self, outpoint: &OutPoint) {
        self.locked_coins.remove(outpoint);
    }

    pub fn is_locked(&self, outpoint: &OutPoint) -> bool {
        self.locked_coins.contains_key(outpoint)
    }

    /// Rate-gates queue issuance for `vin`: a new `dsq` is only accepted if
    /// at least `CountPeersAbove / 5` queues have passed since this INODE's
    /// last advertisement (approximated here by a strictly increasing index
    /// the caller supplies from `InodeRegistryView::count_peers_above`).
    pub fn try_advance_dsq_counter(&self, vin: OutPoint, current_index: u64, min_gap: u64) -> bool {
        let mut entry = self.dsq_counter.entry(vin).or_insert(0);
        if current_index.saturating_sub(*entry) < min_gap {
            return false;
        }
        *entry = current_index;
        true
    }

    pub fn mark_inode_used(&self, vin: OutPoint) {
        self.used_inodes.lock().push(vin);
    }

    pub fn inode_already_used(&self, vin: &OutPoint) -> bool {
        self.used_inodes.lock().contains(vin)
    }

    pub fn clear_used_inodes(&self) {
        self.used_inodes.lock().clear();
    }

    /// Records that `txid` has been broadcast, returning `false` if it was
    /// already recorded (write-once semantics).
    pub fn record_broadcast(&self, txid: Hash256) -> bool {
        let mut cache = self.broadcast_txes.lock();
        if cache.contains(&txid) {
            return false;
        }
        cache.put(txid, ());
        true
    }

    pub fn validate_queue(&self, queue: &DSQueue, pubkey: &ed25519_dalek::VerifyingKey) -> bool {
        queue.verify_against_registry(pubkey).is_ok()
    }
}

impl Default for MixingCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
