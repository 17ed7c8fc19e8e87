use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::snapshot::STATE_NAMESPACE;
use crate::store::ChatStore;
use crate::vault::StateVault;
use crate::StoreError;

/// Project and write the durable subset immediately.
pub fn save_now(store: &ChatStore, vault: &StateVault) -> Result<(), StoreError> {
    let payload = store.snapshot().encode()?;
    vault.save(STATE_NAMESPACE, &payload)
}

/// Background writer: wakes on the store's revision channel, sleeps out the
/// debounce window so bursts of mutations coalesce into one write, then
/// persists the snapshot. Write failures are logged, never fatal.
pub fn spawn_autosave(
    store: Arc<ChatStore>,
    vault: StateVault,
    debounce: Duration,
) -> JoinHandle<()> {
    let mut revision = store.subscribe();
    tokio::spawn(async move {
        loop {
            if revision.changed().await.is_err() {
                break;
            }
            tokio::time::sleep(debounce).await;
            // Everything that arrived during the sleep is covered by this
            // snapshot; mark it seen so it does not trigger another write.
            revision.borrow_and_update();

            match save_now(&store, &vault) {
                Ok(()) => debug!("state persisted"),
                Err(e) => warn!(error = %e, "failed to persist state"),
            }
        }
    })
}
