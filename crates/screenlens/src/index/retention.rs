//! Background retention sweeper.
//!
//! One dedicated task owns both cleanup duties: the persistent index's
//! retention policy and eviction of stale in-memory cache entries. The task
//! runs until its cancellation token fires.

use super::SemanticIndex;
use crate::cache::TwoTierCache;
use crate::config::Config;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Spawn the sweeper. Returns the join handle; cancel via `token`.
pub fn spawn_sweeper(
    index: Arc<SemanticIndex>,
    cache: Arc<TwoTierCache>,
    config: Config,
    token: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    let period = Duration::from_secs(config.cleanup_interval_hours * 3600);
    tokio::spawn(async move {
        info!(interval_hours = config.cleanup_interval_hours, "retention sweeper started");
        let mut interval = tokio::time::interval(period);
        // The immediate first tick would sweep at startup; skip it.
        interval.tick().await;
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    info!("retention sweeper stopped");
                    return;
                }
                _ = interval.tick() => {
                    run_sweep(&index, &cache, &config).await;
                }
            }
        }
    })
}

/// One sweep pass. Index delete failures are retried once, then abandoned
/// until the next cadence.
pub async fn run_sweep(index: &SemanticIndex, cache: &TwoTierCache, config: &Config) {
    let now = chrono::Utc::now().timestamp_millis();

    let evicted = cache.sweep_stale(config.stale_cache_ms, now);
    if evicted > 0 {
        debug!(evicted, "evicted stale cache entries");
    }

    match index.retention_sweep(now).await {
        Ok(_) => {}
        Err(first) => {
            warn!(error = %first, "retention sweep failed, retrying once");
            if let Err(second) = index.retention_sweep(now).await {
                warn!(error = %second, "retention sweep retry failed, abandoning until next run");
            }
        }
    }
}
