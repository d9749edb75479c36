//! Recurring expiry sweep for the cache
//!
//! Spawns a background task that periodically deletes expired entries from
//! both cache tiers, using a tokio interval and a shutdown channel so the
//! task can be stopped cleanly.

use std::time::Duration;

use tokio::sync::mpsc;

use super::service::CacheService;

/// Configuration for the background expiry sweep
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// How often expired entries are purged
    pub interval: Duration,
    /// Whether the background sweep runs at all
    pub enabled: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60 * 60), // hourly
            enabled: true,
        }
    }
}

/// Handle for controlling the background sweep task
pub struct SweepHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl SweepHandle {
    /// Spawns the sweep task for the given cache
    ///
    /// The first purge happens one interval after spawn, not immediately;
    /// lazy eviction covers anything read before then.
    pub fn spawn(cache: CacheService, config: SweepConfig) -> Self {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        if config.enabled {
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(config.interval);
                // Skip the first tick (immediate)
                interval.tick().await;

                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            let removed = cache.clear_expired();
                            if removed > 0 {
                                log::debug!("expiry sweep removed {} entries", removed);
                            }
                        }
                        _ = shutdown_rx.recv() => {
                            break;
                        }
                    }
                }
            });
        }

        Self { shutdown_tx }
    }

    /// Stops the background sweep task
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sweep_config_default_is_hourly() {
        let config = SweepConfig::default();
        assert_eq!(config.interval, Duration::from_secs(3600));
        assert!(config.enabled);
    }

    #[tokio::test]
    async fn test_disabled_sweep_spawns_nothing() {
        let dir = TempDir::new().unwrap();
        let cache = CacheService::with_dir(dir.path().to_path_buf());
        cache.set("stale", &1_u32, Duration::ZERO);

        let handle = SweepHandle::spawn(
            cache.clone(),
            SweepConfig {
                interval: Duration::from_millis(5),
                enabled: false,
            },
        );
        tokio::time::sleep(Duration::from_millis(30)).await;

        // Entry is still present in the memory tier; nothing swept it
        assert_eq!(cache.stats().memory_items, 1);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_sweep_removes_expired_entries() {
        let dir = TempDir::new().unwrap();
        let cache = CacheService::with_dir(dir.path().to_path_buf());
        cache.set("stale", &1_u32, Duration::ZERO);
        cache.set("fresh", &2_u32, Duration::from_secs(60));

        let handle = SweepHandle::spawn(
            cache.clone(),
            SweepConfig {
                interval: Duration::from_millis(10),
                enabled: true,
            },
        );
        tokio::time::sleep(Duration::from_millis(100)).await;

        let stats = cache.stats();
        assert_eq!(stats.memory_items, 1);
        assert_eq!(stats.disk_items, 1);
        assert!(stats.last_cleanup.is_some());
        handle.shutdown().await;
    }
}
