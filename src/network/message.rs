//! Peer-to-peer message set for the mixing protocol.
//!
//! Every variant here corresponds to a wire command from the protocol table
//! (`dsa`, `dsq`, `dsi`, `dssu`, `dssub`, `dsf`, `dss`, `dsc`). Framing is
//! handled by `wire.rs`; this module is only the payload shape.

use crate::entry::EntryInput;
use crate::queue::DSQueue;
use crate::types::{OutPoint, Transaction};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum NetworkMessage {
    /// `dsa`: client -> INODE, session admission request.
    SessionAdmission {
        denom_mask: u8,
        collateral: Transaction,
    },
    /// `dsq`: INODE -> all, signed queue advertisement.
    Queue(DSQueue),
    /// `dsi`: client -> INODE, entry submission.
    EntrySubmission {
        inputs: Vec<EntryInput>,
        amount: u64,
        collateral: Transaction,
        outputs: Vec<crate::types::TxOutput>,
    },
    /// `dssu`: INODE -> client, status update.
    StatusUpdate {
        session_id: u32,
        state: crate::session::SessionState,
        entries_count: usize,
        accepted: i32,
        message: String,
    },
    /// `dssub`: client -> INODE, subscribe to status updates.
    SubscribeStatus,
    /// `dsf`: INODE -> client, finalized transaction.
    FinalizedTransaction {
        session_id: u32,
        final_tx: Transaction,
    },
    /// `dss`: client -> INODE, signature delivery.
    Signatures(Vec<SignedInput>),
    /// `dsc`: INODE -> client, session completion notice.
    Completion {
        session_id: u32,
        error: bool,
        message: String,
    },
}

impl NetworkMessage {
    pub fn command(&self) -> &'static str {
        match self {
            NetworkMessage::SessionAdmission { .. } => "dsa",
            NetworkMessage::Queue(_) => "dsq",
            NetworkMessage::EntrySubmission { .. } => "dsi",
            NetworkMessage::StatusUpdate { .. } => "dssu",
            NetworkMessage::SubscribeStatus => "dssub",
            NetworkMessage::FinalizedTransaction { .. } => "dsf",
            NetworkMessage::Signatures(_) => "dss",
            NetworkMessage::Completion { .. } => "dsc",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SignedInput {
    pub previous_output: OutPoint,
    pub script_sig: Vec<u8>,
}
