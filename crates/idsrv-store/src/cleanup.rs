//! Periodic removal of expired grants.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval_at, Instant};
use tracing::{debug, info, warn};

use crate::config::OperationalStoreOptions;
use crate::entities::now_utc;
use crate::error::StoreResult;
use crate::store::PersistedGrantStore;

/// Shortest period between sweeps.
pub const MIN_CLEANUP_INTERVAL: Duration = Duration::from_secs(1);

/// Expired-grant sweep.
#[derive(Clone)]
pub struct TokenCleanup {
    store: Arc<dyn PersistedGrantStore>,
    interval: Duration,
    batch_size: usize,
}

impl std::fmt::Debug for TokenCleanup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCleanup")
            .field("interval", &self.interval)
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

impl TokenCleanup {
    /// Intervals below [`MIN_CLEANUP_INTERVAL`] and a zero batch size are
    /// raised to the minimum.
    #[must_use]
    pub fn new(store: Arc<dyn PersistedGrantStore>, interval: Duration, batch_size: usize) -> Self {
        Self {
            store,
            interval: interval.max(MIN_CLEANUP_INTERVAL),
            batch_size: batch_size.max(1),
        }
    }

    /// Uses the interval and batch size from the operational options.
    #[must_use]
    pub fn from_options(store: Arc<dyn PersistedGrantStore>, options: &OperationalStoreOptions) -> Self {
        Self::new(
            store,
            options.token_cleanup_interval,
            options.token_cleanup_batch_size,
        )
    }

    /// Removes expired grants batch by batch until a batch comes back short.
    /// Returns the total removed.
    ///
    /// # Errors
    ///
    /// Returns the first store error; batches already removed stay removed.
    pub async fn run_once(&self) -> StoreResult<u64> {
        let cutoff = now_utc();
        let mut total = 0_u64;

        loop {
            let removed = self.store.remove_expired_batch(cutoff, self.batch_size).await?;
            total += removed;
            debug!(removed, "Removed expired grant batch");

            if removed < self.batch_size as u64 {
                break;
            }
        }

        if total > 0 {
            info!(removed = total, "Removed expired grants");
        }
        Ok(total)
    }

    /// Spawns the sweep on the current tokio runtime. The first pass runs
    /// one interval after start.
    #[must_use]
    pub fn start(self) -> TokenCleanupHandle {
        let period = self.interval;
        info!(interval = ?period, batch_size = self.batch_size, "Starting token cleanup");

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                if let Err(e) = self.run_once().await {
                    warn!(error = %e, "Token cleanup failed");
                }
            }
        });

        TokenCleanupHandle {
            handle: Some(handle),
        }
    }

    /// Starts the sweep if the options enable it.
    #[must_use]
    pub fn spawn_if_enabled(
        store: Arc<dyn PersistedGrantStore>,
        options: &OperationalStoreOptions,
    ) -> Option<TokenCleanupHandle> {
        options
            .enable_token_cleanup
            .then(|| Self::from_options(store, options).start())
    }
}

/// Running sweep. Dropping the handle stops it.
#[derive(Debug)]
pub struct TokenCleanupHandle {
    handle: Option<JoinHandle<()>>,
}

impl TokenCleanupHandle {
    /// Stops the sweep and waits for the task to finish.
    pub async fn stop(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            let _ = handle.await;
            info!("Token cleanup stopped");
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for TokenCleanupHandle {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use time::OffsetDateTime;

    use super::*;
    use crate::error::StoreError;
    use crate::model::{PersistedGrant, PersistedGrantFilter};

    /// Holds a number of expired grants and counts sweep calls.
    struct ExpiredGrants {
        remaining: Mutex<u64>,
        calls: AtomicUsize,
        fail: bool,
    }

    impl ExpiredGrants {
        fn new(count: u64) -> Arc<Self> {
            Arc::new(Self {
                remaining: Mutex::new(count),
                calls: AtomicUsize::new(0),
                fail: false,
            })
        }
    }

    #[async_trait]
    impl PersistedGrantStore for ExpiredGrants {
        async fn store(&self, _: &PersistedGrant) -> StoreResult<()> {
            Ok(())
        }
        async fn get(&self, _: &str) -> StoreResult<Option<PersistedGrant>> {
            Ok(None)
        }
        async fn get_all(&self, _: &PersistedGrantFilter) -> StoreResult<Vec<PersistedGrant>> {
            Ok(Vec::new())
        }
        async fn remove(&self, _: &str) -> StoreResult<bool> {
            Ok(false)
        }
        async fn remove_all(&self, _: &PersistedGrantFilter) -> StoreResult<u64> {
            Ok(0)
        }
        async fn update_consumed_time(&self, _: &str, _: OffsetDateTime) -> StoreResult<bool> {
            Ok(false)
        }
        async fn remove_expired(&self, _: OffsetDateTime) -> StoreResult<u64> {
            let mut remaining = self.remaining.lock().unwrap();
            let removed = *remaining;
            *remaining = 0;
            Ok(removed)
        }
        async fn remove_expired_batch(&self, _: OffsetDateTime, batch_size: usize) -> StoreResult<u64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(StoreError::transient("connection reset"));
            }
            let mut remaining = self.remaining.lock().unwrap();
            let removed = (*remaining).min(batch_size as u64);
            *remaining -= removed;
            Ok(removed)
        }
    }

    #[tokio::test]
    async fn test_run_once_drains_in_batches() {
        let store = ExpiredGrants::new(250);
        let cleanup = TokenCleanup::new(store.clone(), Duration::from_secs(60), 100);

        assert_eq!(cleanup.run_once().await.unwrap(), 250);
        assert_eq!(store.calls.load(Ordering::SeqCst), 3);
        assert_eq!(*store.remaining.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_run_once_exact_multiple_needs_one_empty_batch() {
        let store = ExpiredGrants::new(200);
        let cleanup = TokenCleanup::new(store.clone(), Duration::from_secs(60), 100);

        assert_eq!(cleanup.run_once().await.unwrap(), 200);
        assert_eq!(store.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_run_once_propagates_errors() {
        let store = Arc::new(ExpiredGrants {
            remaining: Mutex::new(10),
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let cleanup = TokenCleanup::new(store, Duration::from_secs(60), 100);
        assert!(cleanup.run_once().await.unwrap_err().is_transient());
    }

    #[tokio::test(start_paused = true)]
    async fn test_started_sweep_runs_each_interval() {
        let store = ExpiredGrants::new(5);
        let handle = TokenCleanup::new(store.clone(), Duration::from_secs(60), 100).start();
        assert!(handle.is_running());

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
        assert_eq!(*store.remaining.lock().unwrap(), 0);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);

        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_is_raised_to_minimum() {
        let store = ExpiredGrants::new(3);
        let cleanup = TokenCleanup::new(store.clone(), Duration::ZERO, 0);
        assert_eq!(cleanup.interval, MIN_CLEANUP_INTERVAL);
        assert_eq!(cleanup.batch_size, 1);

        let handle = cleanup.start();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(handle.is_running());
        assert!(store.calls.load(Ordering::SeqCst) >= 1);

        handle.stop().await;
    }

    #[test]
    fn test_spawn_if_enabled_respects_option() {
        let store = ExpiredGrants::new(0);
        let options = OperationalStoreOptions::default();
        assert!(TokenCleanup::spawn_if_enabled(store, &options).is_none());
    }
}
