//! Asynchronous send pipeline.
//!
//! The caller has already appended an optimistic message in `Sending`
//! state; this task persists it and folds the outcome back into the store.
//! Local state is never rolled back on failure: the message flips to
//! `Failed` and stays retryable.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use atrium_shared::protocol::MessageEnvelope;
use atrium_shared::types::MessageId;
use atrium_store::CoreState;

use crate::notify::CoreNotification;
use crate::services::Transport;

/// Lock the shared state, recovering from a poisoned mutex: the store
/// holds plain data and every mutation is transactional at the method
/// level, so a panicked peer task cannot leave it half-written.
pub(crate) fn lock(state: &Mutex<CoreState>) -> MutexGuard<'_, CoreState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Spawn the confirm/fail follow-up for an optimistic message.
///
/// On success the temp id is replaced in place and the message advances to
/// `Sent`, then to `Delivered` after `delivered_delay` — a stand-in for a
/// real transport acknowledgment, routed through the same store entry point
/// a real ack would use.
pub fn spawn_send(
    state: Arc<Mutex<CoreState>>,
    transport: Arc<dyn Transport>,
    notify: mpsc::Sender<CoreNotification>,
    temp_id: MessageId,
    envelope: MessageEnvelope,
    delivered_delay: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        match transport.send_message(envelope).await {
            Ok(server_id) => {
                {
                    let mut state = lock(&state);
                    if let Err(e) = state.messages.confirm_send(&temp_id, server_id.clone()) {
                        error!(temp = %temp_id, error = %e, "Confirm failed");
                        return;
                    }
                    state.overlays.rename_message(&temp_id, &server_id);
                }
                info!(msg_id = %server_id, "Message sent");
                let _ = notify
                    .send(CoreNotification::MessageConfirmed {
                        temp_id: temp_id.clone(),
                        id: server_id.clone(),
                    })
                    .await;

                tokio::time::sleep(delivered_delay).await;
                let delivered = lock(&state).messages.mark_delivered(&server_id).is_ok();
                if delivered {
                    let _ = notify
                        .send(CoreNotification::MessageDelivered { id: server_id })
                        .await;
                }
            }
            Err(e) => {
                let reason = e.to_string();
                if let Err(fail_err) = lock(&state).messages.fail_send(&temp_id, &reason) {
                    error!(temp = %temp_id, error = %fail_err, "Could not mark send failed");
                    return;
                }
                let _ = notify
                    .send(CoreNotification::SendFailed {
                        id: temp_id,
                        reason,
                    })
                    .await;
            }
        }
    })
}
