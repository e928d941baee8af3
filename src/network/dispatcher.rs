//! Routes inbound protocol messages to session and registry operations.
//!
//! Every message is gated on the peer's advertised protocol version; most
//! are further gated on the peer being the client's currently-active INODE,
//! checked by network address only (never full peer identity — see
//! `DispatchContext::is_from_active_inode`).

use crate::collaborators::{ChainView, InodeRegistryView};
use crate::constants::accepted;
use crate::coordinator::MixingCoordinator;
use crate::entry::{Entry, EntryInput};
use crate::error::MixingError;
use crate::network::message::NetworkMessage;
use crate::session::SessionState;

pub struct DispatchContext {
    pub peer_proto_version: u32,
    pub peer_addr: String,
    pub active_inode_addr: Option<String>,
    pub active_session_id: Option<u32>,
}

impl DispatchContext {
    fn is_from_active_inode(&self) -> bool {
        matches!(&self.active_inode_addr, Some(addr) if addr == &self.peer_addr)
    }
}

/// Outcome of handling one inbound message.
pub enum DispatchOutcome {
    /// Send this message back to the peer.
    Reply(NetworkMessage),
    /// Nothing to send (e.g. a queue advertisement was recorded only).
    NoReply,
    /// A ready `dsq` arrived from the INode this client is currently
    /// awaiting; the caller should call `ClientDriver::prepare_denominate`.
    PrepareDenominate,
}

pub fn dispatch(
    msg: &NetworkMessage,
    ctx: &DispatchContext,
    coordinator: &MixingCoordinator,
    chain: &dyn ChainView,
    registry: &dyn InodeRegistryView,
    now_ms: i64,
) -> Result<DispatchOutcome, MixingError> {
    if ctx.peer_proto_version < crate::constants::timing::MIN_PEER_PROTO_VERSION {
        return Err(MixingError::VersionIncompatible {
            found: ctx.peer_proto_version,
            required: crate::constants::timing::MIN_PEER_PROTO_VERSION,
        });
    }

    match msg {
        NetworkMessage::SessionAdmission {
            denom_mask,
            collateral,
        } => handle_admission(*denom_mask, collateral, coordinator, chain, now_ms),

        NetworkMessage::Queue(queue) => {
            let record = registry.find(&queue.vin).ok_or(MixingError::NotInRegistry)?;
            if !coordinator.validate_queue(queue, &record.pubkey) {
                return Err(MixingError::NotInode);
            }
            if queue.is_expired(now_ms / 1000) {
                return Err(MixingError::RateLimited);
            }

            if queue.ready {
                if ctx.is_from_active_inode() {
                    return Ok(DispatchOutcome::PrepareDenominate);
                }
                return Ok(DispatchOutcome::NoReply);
            }

            let min_gap = registry.count_peers_above(crate::constants::timing::MIN_PEER_PROTO_VERSION) / 5;
            let advanced = coordinator.try_advance_dsq_counter(
                queue.vin,
                record.last_dsq_index,
                min_gap.max(1),
            );
            if !advanced {
                return Err(MixingError::RateLimited);
            }
            Ok(DispatchOutcome::NoReply)
        }

        NetworkMessage::EntrySubmission {
            inputs,
            amount,
            collateral,
            outputs,
        } => {
            if !ctx.is_from_active_inode() {
                return Err(MixingError::NotInode);
            }
            let session_id = ctx.active_session_id.ok_or(MixingError::IncompatibleSessionState)?;

            let entry = Entry::new(
                inputs
                    .iter()
                    .map(|i| EntryInput::unsigned(i.vin))
                    .collect(),
                *amount,
                collateral.clone(),
                outputs.clone(),
                now_ms / 1000,
            );

            let result = coordinator
                .with_session(session_id, |session| session.add_entry(entry, chain, now_ms))
                .ok_or(MixingError::IncompatibleSessionState)?;

            match result {
                Ok(()) => {
                    for i in inputs {
                        coordinator.lock_coin(i.vin, session_id);
                    }
                    Ok(DispatchOutcome::Reply(NetworkMessage::StatusUpdate {
                        session_id,
                        state: SessionState::AcceptingEntries,
                        entries_count: coordinator
                            .with_session(session_id, |s| s.entries.len())
                            .unwrap_or(0),
                        accepted: accepted::INODE_ACCEPTED,
                        message: String::new(),
                    }))
                }
                Err(err) => Ok(DispatchOutcome::Reply(NetworkMessage::StatusUpdate {
                    session_id,
                    state: SessionState::AcceptingEntries,
                    entries_count: coordinator
                        .with_session(session_id, |s| s.entries.len())
                        .unwrap_or(0),
                    accepted: accepted::INODE_REJECTED,
                    message: err.wire_message(),
                })),
            }
        }

        NetworkMessage::SubscribeStatus => {
            if !ctx.is_from_active_inode() {
                return Err(MixingError::NotInode);
            }
            Ok(DispatchOutcome::NoReply)
        }

        NetworkMessage::Signatures(signed_inputs) => {
            if !ctx.is_from_active_inode() {
                return Err(MixingError::NotInode);
            }
            let session_id = ctx.active_session_id.ok_or(MixingError::IncompatibleSessionState)?;

            let mut complete = false;
            for signed in signed_inputs {
                complete = coordinator
                    .with_session(session_id, |session| {
                        session.record_signature(&signed.previous_output, signed.script_sig.clone())
                    })
                    .ok_or(MixingError::IncompatibleSessionState)??;
            }

            if complete {
                coordinator.with_session(session_id, |session| session.mark_transmitting(now_ms));
            }

            Ok(DispatchOutcome::NoReply)
        }

        NetworkMessage::StatusUpdate { .. }
        | NetworkMessage::FinalizedTransaction { .. }
        | NetworkMessage::Completion { .. } => {
            // INODE -> client directions; nothing for an INODE to do on receipt.
            Ok(DispatchOutcome::NoReply)
        }
    }
}

fn handle_admission(
    denom_mask: u8,
    collateral: &crate::types::Transaction,
    coordinator: &MixingCoordinator,
    chain: &dyn ChainView,
    now_ms: i64,
) -> Result<DispatchOutcome, MixingError> {
    crate::session::validate_collateral(collateral, chain)?;

    let open_session = coordinator
        .session_ids()
        .into_iter()
        .find(|id| {
            coordinator
                .with_session(*id, |s| s.is_compatible_with_session(denom_mask).is_ok())
                .unwrap_or(false)
        })
        .unwrap_or_else(|| coordinator.create_session(now_ms));

    coordinator
        .with_session(open_session, |session| {
            session.is_compatible_with_session(denom_mask)
        })
        .ok_or(MixingError::IncompatibleSessionState)??;

    Ok(DispatchOutcome::Reply(NetworkMessage::StatusUpdate {
        session_id: open_session,
        state: SessionState::Queue,
        entries_count: 0,
        accepted: accepted::INODE_ACCEPTED,
        message: String::new(),
    }))
}
