//! End-to-end scenarios over the session/entry/client pipeline, exercised
//! without any real network or chain — only the in-memory collaborators.

use timed::client::ClientDriver;
use timed::collaborators::mocks::MockChain;
use timed::constants;
use timed::entry::{Entry, EntryInput};
use timed::error::MixingError;
use timed::session::Session;
use timed::types::{OutPoint, Transaction, TxInput, TxOutput};

fn p2pkh() -> Vec<u8> {
    let mut s = vec![0x76, 0xa9, 0x14];
    s.extend_from_slice(&[0u8; 20]);
    s.extend_from_slice(&[0x88, 0xac]);
    s
}

fn fund(chain: &MockChain, txid: [u8; 32], value: u64) {
    chain.insert(
        txid,
        Transaction {
            version: 1,
            inputs: vec![],
            outputs: vec![TxOutput {
                value,
                script_pubkey: p2pkh(),
            }],
            lock_time: 0,
            timestamp: 0,
        },
    );
}

fn collateral(chain: &MockChain, collateral_txid: [u8; 32]) -> Transaction {
    let funding_txid = {
        let mut t = collateral_txid;
        t[0] ^= 0xFF;
        t
    };
    fund(chain, funding_txid, constants::fees::COLLATERAL_FEE * 2);
    let tx = Transaction {
        version: 1,
        inputs: vec![TxInput::unsigned(OutPoint {
            txid: funding_txid,
            vout: 0,
        })],
        outputs: vec![TxOutput {
            value: constants::fees::COLLATERAL_FEE,
            script_pubkey: p2pkh(),
        }],
        lock_time: 0,
        timestamp: 0,
    };
    chain.insert(collateral_txid, tx.clone());
    tx
}

fn entry_for_client(chain: &MockChain, client_id: u8, denom: u64) -> Entry {
    let input_txid = [client_id; 32];
    fund(chain, input_txid, denom * 3);

    let outputs = vec![
        TxOutput {
            value: denom,
            script_pubkey: p2pkh(),
        },
        TxOutput {
            value: denom,
            script_pubkey: p2pkh(),
        },
        TxOutput {
            value: denom,
            script_pubkey: p2pkh(),
        },
    ];

    Entry::new(
        vec![EntryInput::unsigned(OutPoint {
            txid: input_txid,
            vout: 0,
        })],
        denom * 3,
        collateral(chain, [client_id + 100; 32]),
        outputs,
        0,
    )
}

/// Scenario 1: three clients each contribute one entry of three equal
/// outputs; the session fills, finalizes, and every output survives into
/// the joint transaction unchanged.
#[test]
fn happy_path_three_client_session() {
    let chain = MockChain::new();
    let denom = constants::denomination::LADDER[2];
    let mut session = Session::new(1, 0);

    for client_id in 1..=3u8 {
        let entry = entry_for_client(&chain, client_id, denom);
        session.add_entry(entry, &chain, 0).unwrap();
    }

    assert_eq!(session.state, timed::session::SessionState::FinalizeTx);

    let tx = session.build_final_tx(0).clone();
    assert_eq!(tx.inputs.len(), 3);
    assert_eq!(tx.outputs.len(), 9);
    assert!(tx.outputs.iter().all(|o| o.value == denom));
    assert_eq!(session.state, timed::session::SessionState::Signing);
}

/// Scenario 2: a denomination mismatch is rejected with the canonical wire
/// text and does not corrupt the session's locked-in mask.
#[test]
fn denomination_mismatch_is_rejected() {
    let chain = MockChain::new();
    let denom_a = constants::denomination::LADDER[1];
    let denom_b = constants::denomination::LADDER[3];

    let mut session = Session::new(1, 0);
    let entry_a = entry_for_client(&chain, 1, denom_a);
    session.add_entry(entry_a, &chain, 0).unwrap();

    let entry_b = entry_for_client(&chain, 2, denom_b);
    let err = session.add_entry(entry_b, &chain, 0).unwrap_err();

    assert_eq!(err, MixingError::IncompatibleDenomination);
    assert_eq!(
        err.wire_message(),
        "not compatible with existing transactions."
    );
    assert_eq!(session.entries.len(), 1);
}

/// Scenario 3: a session stuck in Signing past the timeout transitions to
/// Error with the canonical message.
#[test]
fn signing_timeout_transitions_to_error() {
    let chain = MockChain::new();
    let denom = constants::denomination::LADDER[2];
    let mut session = Session::new(1, 0);

    for client_id in 1..=3u8 {
        let entry = entry_for_client(&chain, client_id, denom);
        session.add_entry(entry, &chain, 0).unwrap();
    }
    session.build_final_tx(0);

    let fired = session.check_timeout(
        constants::timing::SIGNING_TIMEOUT_SECS * 1000,
        0,
    );
    assert_eq!(fired, Some("Signing timed out, please resubmit."));
    assert_eq!(session.state, timed::session::SessionState::Error);
}

/// Scenario 5: a tampered finalized transaction is refused by the client
/// before any signature is produced.
#[test]
fn client_refuses_to_sign_tampered_final_tx() {
    let mut driver = ClientDriver::new();
    driver.session_id = Some(42);

    let own_output = TxOutput {
        value: constants::denomination::LADDER[4],
        script_pubkey: p2pkh(),
    };
    let tampered_output = TxOutput {
        value: constants::denomination::LADDER[4] - 1,
        script_pubkey: p2pkh(),
    };

    let final_tx = Transaction {
        version: 1,
        inputs: vec![],
        outputs: vec![tampered_output],
        lock_time: 0,
        timestamp: 0,
    };

    let result = driver.verify_final_tx(42, false, &final_tx, &[], &[own_output]);
    assert_eq!(result.unwrap_err(), MixingError::SignatureRefused);
}

/// Scenario 6: round tracking returns the exact depth for a three-deep
/// denominated ancestry, and -2 for a non-denominated coinbase-style root.
#[test]
fn round_tracking_depth_three() {
    use std::collections::HashSet;
    use timed::collaborators::WalletView;

    struct StubWallet {
        mine: HashSet<OutPoint>,
    }
    impl WalletView for StubWallet {
        fn is_denominated(&self, value: u64) -> bool {
            timed::denom::is_denominated(value)
        }
        fn select_coins_by_denominations(
            &self,
            _mask: u8,
            _min: u64,
            _max: u64,
        ) -> Option<(Vec<OutPoint>, u64)> {
            None
        }
        fn has_collateral_inputs(&self) -> bool {
            false
        }
        fn create_collateral_transaction(&self) -> Option<Transaction> {
            None
        }
        fn create_denominated_transaction(&self, _total_value: u64) -> Option<Transaction> {
            None
        }
        fn unlock(&self, _outpoint: &OutPoint) {}
        fn is_mine(&self, outpoint: &OutPoint) -> bool {
            self.mine.contains(outpoint)
        }
        fn sign_input(
            &self,
            _tx: &Transaction,
            _index: usize,
            _script_pubkey: &[u8],
            _hash_type: u32,
        ) -> Vec<u8> {
            vec![]
        }
    }

    let chain = MockChain::new();
    let denom = constants::denomination::LADDER[3];
    let mut mine = HashSet::new();
    let mut previous = None;

    for i in 1..=4u8 {
        let txid = [i; 32];
        let inputs = match previous {
            Some(prev_outpoint) => vec![TxInput::unsigned(prev_outpoint)],
            None => vec![],
        };
        chain.insert(
            txid,
            Transaction {
                version: 1,
                inputs,
                outputs: vec![TxOutput {
                    value: denom,
                    script_pubkey: p2pkh(),
                }],
                lock_time: 0,
                timestamp: 0,
            },
        );
        let outpoint = OutPoint { txid, vout: 0 };
        if i < 4 {
            mine.insert(outpoint);
        }
        previous = Some(outpoint);
    }

    let wallet = StubWallet { mine };
    let leaf = previous.unwrap();
    assert_eq!(ClientDriver::rounds(&chain, &wallet, leaf), 3);

    let coinbase_txid = [99u8; 32];
    chain.insert(
        coinbase_txid,
        Transaction {
            version: 1,
            inputs: vec![],
            outputs: vec![TxOutput {
                value: 12345,
                script_pubkey: p2pkh(),
            }],
            lock_time: 0,
            timestamp: 0,
        },
    );
    let coinbase_outpoint = OutPoint {
        txid: coinbase_txid,
        vout: 0,
    };
    assert_eq!(
        ClientDriver::rounds(&chain, &wallet, coinbase_outpoint),
        constants::rounds::NOT_DENOMINATED
    );
}
