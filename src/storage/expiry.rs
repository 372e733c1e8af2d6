//! Background Expiry Sweeper
//!
//! Lazy expiry (checking on access) reclaims an entry only when someone
//! touches its key; an entry that expires and is never read again would sit
//! in memory forever. This module runs a background task that periodically
//! sweeps all shards and drops dead entries.
//!
//! The sweeper is a tokio task driven by a fixed interval and stopped
//! through a `watch` channel; dropping the [`ExpirySweeper`] handle stops it.

use crate::storage::CacheEngine;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

/// Configuration for the expiry sweeper.
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// Time between two sweeps.
    pub interval: Duration,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
        }
    }
}

/// A handle to the running expiry sweeper.
///
/// When this handle is dropped, the sweeper task will be stopped.
#[derive(Debug)]
pub struct ExpirySweeper {
    shutdown_tx: watch::Sender<bool>,
}

impl ExpirySweeper {
    /// Starts the expiry sweeper as a background task.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use embercache::storage::{CacheEngine, ExpirySweeper, SweeperConfig};
    /// use std::sync::Arc;
    ///
    /// let cache = Arc::new(CacheEngine::new());
    /// let sweeper = ExpirySweeper::start(Arc::clone(&cache), SweeperConfig::default());
    ///
    /// // Sweeper runs in the background; dropping the handle stops it.
    /// drop(sweeper);
    /// ```
    pub fn start(cache: Arc<CacheEngine>, config: SweeperConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(sweeper_loop(cache, config, shutdown_rx));

        info!("Background expiry sweeper started");

        Self { shutdown_tx }
    }

    /// Stops the expiry sweeper.
    ///
    /// This is called automatically when the handle is dropped.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn sweeper_loop(
    cache: Arc<CacheEngine>,
    config: SweeperConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(config.interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Expiry sweeper received shutdown signal");
                    return;
                }
            }
        }

        let reclaimed = cache.reclaim_expired();
        if reclaimed > 0 {
            debug!(
                reclaimed = reclaimed,
                entries_remaining = cache.len(),
                "Expired entries reclaimed"
            );
        }
    }
}

/// Starts the expiry sweeper with default configuration.
///
/// This is a convenience function for simple use cases.
pub fn start_expiry_sweeper(cache: Arc<CacheEngine>) -> ExpirySweeper {
    ExpirySweeper::start(cache, SweeperConfig::default())
}
