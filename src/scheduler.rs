//! Background tick loop: drops expired queues and entries, enforces session
//! timeouts and their fee penalties, and resets terminal sessions once they
//! have lingered long enough for late messages to be discarded.

use crate::constants::timing::{TERMINAL_LINGER_MS, TICK_PERIOD_MS};
use crate::coordinator::MixingCoordinator;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Runs the tick loop until `cancel` fires. Spawn with
/// `ShutdownManager::register_task` so shutdown waits for a clean exit.
pub async fn run(coordinator: Arc<MixingCoordinator>, cancel: CancellationToken, now_ms: impl Fn() -> i64) {
    let mut interval = tokio::time::interval(tokio::time::Duration::from_millis(TICK_PERIOD_MS));

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("mixing scheduler shutting down");
                break;
            }
            _ = interval.tick() => {
                tick(&coordinator, now_ms());
            }
        }
    }
}

fn tick(coordinator: &MixingCoordinator, now_ms: i64) {
    for id in coordinator.session_ids() {
        coordinator.with_session(id, |session| {
            for collateral in session.drop_expired_entries(now_ms) {
                tracing::debug!(session_id = id, txid = ?collateral.txid(), "dropped expired entry");
            }

            if let Some(reason) =
                session.check_timeout(now_ms, crate::constants::timing::CLIENT_LAG_MS)
            {
                if let Some(offender) = session.charge_fees() {
                    tracing::warn!(session_id = id, offender, "charging collateral fee");
                }
                tracing::info!(session_id = id, reason, "session timed out");
            }

            if session.ready_to_reset(now_ms) {
                session.reset(|outpoint| coordinator.unlock_coin(outpoint), now_ms);
            }
        });
    }
}
