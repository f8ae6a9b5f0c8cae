//! Background purge of expired conversation sessions.
//!
//! Reads already ignore expired sessions, so the sweeper only bounds memory
//! held by conversations nobody comes back to.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use tutor_context_core::memory::ConversationStore;

/// Spawn a task that calls [`ConversationStore::clear_expired`] every
/// `interval`. Abort the returned handle to stop it.
pub fn spawn_sweeper(store: Arc<ConversationStore>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let removed = store.clear_expired();
            debug!(removed, remaining = store.len(), "sweep finished");
        }
    })
}
