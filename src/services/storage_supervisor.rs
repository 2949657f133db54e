use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::{
    dao::{
        game_store::GameStore,
        storage::{StorageError, StorageResult},
    },
    services::roster_service,
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Own the storage connection for the lifetime of the process: connect with
/// backoff, hydrate the roster registries, then watch health and reconnect,
/// keeping the shared degraded flag accurate throughout.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn GameStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                state.set_game_store(store.clone()).await;
                info!("storage connection established; leaving degraded mode");

                if let Err(err) = roster_service::hydrate_from_store(&state, store.as_ref()).await
                {
                    warn!(error = %err, "roster hydration failed; continuing with in-memory state");
                }

                delay = INITIAL_DELAY;
                monitor(&state, store.as_ref()).await;
            }
            Err(err) => {
                warn!(error = %err, "storage connection attempt failed");
            }
        }

        sleep(delay).await;
        delay = (delay * 2).min(MAX_DELAY);
    }
}

/// Mirror one write to the store on a background task. Failures are logged
/// and never bubble up to the caller; scan acknowledgment and roster updates
/// must not wait on or fail with storage.
pub fn spawn_write<F, Fut>(state: &SharedState, op: &'static str, write: F)
where
    F: FnOnce(Arc<dyn GameStore>) -> Fut + Send + 'static,
    Fut: Future<Output = StorageResult<()>> + Send + 'static,
{
    let state = state.clone();
    tokio::spawn(async move {
        let Some(store) = state.game_store().await else {
            debug!(op, "skipping store write in degraded mode");
            return;
        };
        if let Err(err) = write(store).await {
            warn!(op, error = %err, "store write failed");
        }
    });
}

/// Poll the store until it stops answering and reconnection attempts are
/// exhausted. Returns once the store should be considered lost.
async fn monitor(state: &SharedState, store: &dyn GameStore) {
    loop {
        match store.health_check().await {
            Ok(()) => {
                if state.is_degraded() {
                    info!("storage healthy again; leaving degraded mode");
                    state.update_degraded(false);
                }
                sleep(HEALTH_POLL_INTERVAL).await;
            }
            Err(err) => {
                warn!(error = %err, "storage health check failed");
                if !reconnect_with_backoff(state, store).await {
                    warn!("exhausted storage reconnect attempts; staying in degraded mode");
                    return;
                }
                state.update_degraded(false);
                sleep(HEALTH_POLL_INTERVAL).await;
            }
        }
    }
}

/// Retry [`GameStore::try_reconnect`] a bounded number of times, raising the
/// degraded flag on the first failure.
async fn reconnect_with_backoff(state: &SharedState, store: &dyn GameStore) -> bool {
    let mut delay = INITIAL_DELAY;

    for attempt in 0..MAX_RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => {
                info!(attempt, "storage reconnection succeeded");
                return true;
            }
            Err(err) => {
                if attempt == 0 {
                    warn!(attempt, error = %err, "storage reconnect failed; entering degraded mode");
                    state.update_degraded(true);
                } else {
                    warn!(attempt, error = %err, "storage reconnect attempt failed");
                }
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }

    false
}
