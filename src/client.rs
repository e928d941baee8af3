//! Wallet-side auto-denomination driver: decides when to mix, prepares
//! denominated coins, picks an INODE, submits an entry, and verifies the
//! finalized transaction before signing it.

use crate::collaborators::{ChainView, InodeRecord, InodeRegistryView, WalletView};
use crate::config::MixingConfig;
use crate::constants::{fees, pool, rounds as round_consts, timing};
use crate::denom::is_denominated;
use crate::entry::EntryInput;
use crate::error::MixingError;
use crate::network::message::SignedInput;
use crate::queue::DSQueue;
use crate::types::{OutPoint, Transaction};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientState {
    Idle,
    Queue,
    AcceptingEntries,
    Signing,
    Complete,
    Error,
}

/// Tracks one client's attempt at a mixing round from submission through
/// signing. A fresh `ClientDriver` is created for each auto-denomination
/// attempt; `Idle` is the rest state between ticks.
pub struct ClientDriver {
    pub state: ClientState,
    pub session_id: Option<u32>,
    pub submitted_to_inode: Option<OutPoint>,
    pub own_inputs: Vec<OutPoint>,
    pub own_outputs_total: u64,
    pub last_success_block: u64,
}

impl Default for ClientDriver {
    fn default() -> Self {
        Self {
            state: ClientState::Idle,
            session_id: None,
            submitted_to_inode: None,
            own_inputs: Vec::new(),
            own_outputs_total: 0,
            last_success_block: 0,
        }
    }
}

impl ClientDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Step 1-2 of auto-denomination: whether this tick should even attempt
    /// a mixing round, and how much more needs to be anonymized.
    pub fn compute_needs_anon(
        &self,
        config: &MixingConfig,
        anonymized_balance: u64,
        non_anonymized_balance: u64,
        current_block: u64,
        chain_synced: bool,
        wallet_unlocked: bool,
    ) -> Option<u64> {
        if !config.enable_mixing || config.lite_mode {
            return None;
        }
        if !chain_synced || !wallet_unlocked {
            return None;
        }
        if current_block.saturating_sub(self.last_success_block) < timing::MIN_BLOCK_SPACING {
            return None;
        }

        let target = config.target_anon_amount;
        let mut needs = target.saturating_sub(anonymized_balance);
        needs = needs.min(pool::POOL_MAX).min(non_anonymized_balance);

        let min_denom = *crate::constants::denomination::LADDER.last().unwrap();
        if needs < fees::ANON_FEE + 5 * min_denom {
            return None;
        }
        Some(needs)
    }

    /// Step 5 INODE selection: 67% of the time pick a queue advertiser whose
    /// mask is compatible and not already used this session; otherwise try
    /// up to 10 registry records in random order.
    pub fn choose_inode(
        registry: &dyn InodeRegistryView,
        queue: &[DSQueue],
        wallet_denom_mask: u8,
        used: &HashSet<OutPoint>,
    ) -> Option<OutPoint> {
        let mut rng = rand::thread_rng();
        let use_queue = rng.gen_range(0..100) < 67;

        if use_queue {
            if let Some(candidate) = queue
                .iter()
                .find(|q| q.denom_mask == wallet_denom_mask && !used.contains(&q.vin))
            {
                return Some(candidate.vin);
            }
        }

        let mut records: Vec<InodeRecord> = registry.records();
        records.shuffle(&mut rng);
        records
            .into_iter()
            .filter(|r| !used.contains(&r.vin))
            .take(10)
            .next()
            .map(|r| r.vin)
    }

    /// `rounds(outpoint)`: how many times this coin has already passed
    /// through a denominated mix, measured by walking its producing
    /// transaction's own wallet-owned denominated inputs. Iterative with an
    /// explicit visited set (the original walks via recursion; this avoids
    /// unbounded stack growth on pathological ancestries) and the same depth
    /// cap and sentinel values.
    pub fn rounds(chain: &dyn ChainView, wallet: &dyn WalletView, outpoint: OutPoint) -> i32 {
        let mut visited = HashSet::new();
        let mut current = outpoint;
        let mut depth: u32 = 0;

        loop {
            if !visited.insert(current) {
                return round_consts::BOUNDS_VIOLATION;
            }

            let Some(tx) = chain.get_transaction(&current.txid) else {
                return round_consts::BOUNDS_VIOLATION;
            };
            let Some(output) = tx.outputs.get(current.vout as usize) else {
                return round_consts::BOUNDS_VIOLATION;
            };

            if depth == 0 && !is_denominated(output.value) {
                return round_consts::NOT_DENOMINATED;
            }
            if output.value == fees::ANON_FEE {
                return round_consts::IS_ANON_FEE;
            }

            if depth >= round_consts::ROUND_CAP {
                return round_consts::ROUND_CAP as i32;
            }

            let next = tx.inputs.iter().find_map(|input| {
                let producing = chain.get_transaction(&input.previous_output.txid)?;
                let prev_out = producing.outputs.get(input.previous_output.vout as usize)?;
                if wallet.is_mine(&input.previous_output) && is_denominated(prev_out.value) {
                    Some(input.previous_output)
                } else {
                    None
                }
            });

            match next {
                Some(outpoint) => {
                    current = outpoint;
                    depth += 1;
                }
                None => return depth as i32,
            }
        }
    }

    /// Verifies a `dsf` finalized transaction against this driver's
    /// submitted entry before signing: every owned input must still be
    /// present, every owned output must appear unchanged, and the matched
    /// output sum must equal the original entry's output sum.
    pub fn verify_final_tx(
        &self,
        session_id: u32,
        already_received: bool,
        final_tx: &Transaction,
        own_inputs: &[EntryInput],
        own_outputs: &[crate::types::TxOutput],
    ) -> Result<(), MixingError> {
        if Some(session_id) != self.session_id || already_received {
            return Err(MixingError::SignatureRefused);
        }

        for input in own_inputs {
            if !final_tx
                .inputs
                .iter()
                .any(|i| i.previous_output == input.vin)
            {
                return Err(MixingError::SignatureRefused);
            }
        }

        let mut matched_sum = 0u64;
        for owned in own_outputs {
            let found = final_tx
                .outputs
                .iter()
                .any(|o| o.value == owned.value && o.script_pubkey == owned.script_pubkey);
            if !found {
                return Err(MixingError::SignatureRefused);
            }
            matched_sum += owned.value;
        }

        let original_sum: u64 = own_outputs.iter().map(|o| o.value).sum();
        if matched_sum != original_sum {
            return Err(MixingError::SignatureRefused);
        }

        Ok(())
    }

    /// Signs every input this client owns in `final_tx` with
    /// `SIGHASH_ALL | SIGHASH_ANYONECANPAY`, ready to send as `dss`.
    pub fn sign_final_tx(
        chain: &dyn ChainView,
        wallet: &dyn WalletView,
        final_tx: &Transaction,
        own_inputs: &[EntryInput],
    ) -> Vec<SignedInput> {
        const SIGHASH_ALL: u32 = 0x01;
        const SIGHASH_ANYONECANPAY: u32 = 0x80;

        own_inputs
            .iter()
            .filter_map(|owned| {
                let index = final_tx
                    .inputs
                    .iter()
                    .position(|i| i.previous_output == owned.vin)?;
                let output = previous_output_script(chain, wallet, &owned.vin)?;
                let script_sig = wallet.sign_input(
                    final_tx,
                    index,
                    &output,
                    SIGHASH_ALL | SIGHASH_ANYONECANPAY,
                );
                Some(SignedInput {
                    previous_output: owned.vin,
                    script_sig,
                })
            })
            .collect()
    }

    /// `MakeCollateralAmounts` equivalent: if the wallet has no collateral
    /// inputs ready, build the transaction that creates them. `None` means
    /// either collateral is already funded or the wallet couldn't build one.
    pub fn ensure_collateral_inputs(wallet: &dyn WalletView) -> Option<Transaction> {
        if wallet.has_collateral_inputs() {
            return None;
        }
        wallet.create_collateral_transaction()
    }

    /// `CreateDenominated` equivalent: ask the wallet to split/merge coins
    /// into the denomination ladder until at least `total_value` is covered.
    pub fn create_denominated(wallet: &dyn WalletView, total_value: u64) -> Option<Transaction> {
        if total_value == 0 {
            return None;
        }
        wallet.create_denominated_transaction(total_value)
    }

    /// `SendRandomPaymentToSelf` equivalent: liquidity providers occasionally
    /// pay themselves to keep the pool supplied with fresh denominated coins.
    /// `liquidity_provider` is 0 for "not a provider", otherwise an id in
    /// 1..=100 that must match `roll` to fire, and only once this client has
    /// mixed enough rounds on average to be trusted with the extra traffic.
    pub fn should_self_pay(liquidity_provider: u8, average_rounds: f64, roll: u32) -> bool {
        if liquidity_provider == 0 {
            return false;
        }
        average_rounds > 8.0 && roll == 50 + liquidity_provider as u32
    }

    /// `PrepareAnonsendDenominate` equivalent: a ready `dsq` from the
    /// currently-awaited INode arrived, so move off `Queue` and submit an
    /// entry. Returns whether the transition actually happened.
    pub fn prepare_denominate(&mut self) -> bool {
        if self.state != ClientState::Queue {
            return false;
        }
        self.state = ClientState::AcceptingEntries;
        true
    }
}

fn previous_output_script(
    chain: &dyn ChainView,
    wallet: &dyn WalletView,
    outpoint: &OutPoint,
) -> Option<Vec<u8>> {
    if !wallet.is_mine(outpoint) {
        return None;
    }
    let tx = chain.get_transaction(&outpoint.txid)?;
    let output = tx.outputs.get(outpoint.vout as usize)?;
    Some(output.script_pubkey.clone())
}
