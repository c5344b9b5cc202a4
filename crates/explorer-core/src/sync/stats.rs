//! Chain transaction statistics.
//!
//! Four series are sampled from `getchaintxstats`:
//!
//! | series    | points                        | offset     |
//! |-----------|-------------------------------|------------|
//! | `day`     | blocks per day / 4            | `-144`     |
//! | `week`    | blocks per day / 4            | `-144 * 7` |
//! | `month`   | blocks per day / 4            | `-144 * 30`|
//! | `overall` | `stats_points_count`          | `0`        |
//!
//! A negative offset is relative to the chain height. Sample windows are spread evenly over
//! `height - offset` blocks, never narrower than 10.

use crate::{
    chain::ChainTipState,
    metrics::MetricsCollector,
    sync::{cancellable, SyncError},
    types::{ChainTxStats, TxStatsComposite, TxStatsDataPoint, TxStatsEntry},
    upstream::NodeRpc,
};
use futures::{stream, StreamExt, TryStreamExt};
use std::{collections::BTreeMap, sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const SECONDS_PER_DAY: u64 = 86_400;
const BLOCKS_PER_STATS_DAY: i64 = 144;
const MIN_STATS_WINDOW: f64 = 10.0;
const WARMUP: Duration = Duration::from_secs(5);
const STATS_CONCURRENCY: usize = 8;

/// Sample window sizes for one series, indexed by point label.
///
/// # Errors
///
/// Returns [`SyncError::StatsOffset`] if a positive `offset` exceeds `count`.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn sample_windows(count: u64, offset: i64, points: usize) -> Result<Vec<u64>, SyncError> {
    let count_i = i64::try_from(count).unwrap_or(i64::MAX);
    if offset > count_i {
        return Err(SyncError::StatsOffset { offset, count });
    }
    let offset = if offset < 0 { (count_i + offset).max(0) } else { offset };
    let span = (count_i - offset) as f64;

    if points < 2 {
        let single = (span - 1.0).max(MIN_STATS_WINDOW) as u64;
        return Ok(if points == 0 { Vec::new() } else { vec![single] });
    }

    let step = span / (points - 1) as f64;
    Ok((0..points)
        .map(|i| (span - i as f64 * step - 1.0).max(MIN_STATS_WINDOW) as u64)
        .collect())
}

/// Periodically recomputes [`TxStatsComposite`] into [`ChainTipState`].
pub struct TxStatsWorker {
    node: Arc<dyn NodeRpc>,
    chain_state: Arc<ChainTipState>,
    metrics: MetricsCollector,
    delay: Duration,
    overall_points: usize,
    range_points: usize,
}

impl TxStatsWorker {
    #[must_use]
    pub fn new(
        node: Arc<dyn NodeRpc>,
        chain_state: Arc<ChainTipState>,
        metrics: MetricsCollector,
        delay: Duration,
        overall_points: usize,
        block_time_seconds: u64,
    ) -> Self {
        let blocks_per_day = SECONDS_PER_DAY / block_time_seconds.max(1);
        let range_points = usize::try_from(blocks_per_day / 4).unwrap_or(usize::MAX);
        Self { node, chain_state, metrics, delay, overall_points, range_points }
    }

    fn series(&self) -> [(&'static str, usize, i64); 4] {
        [
            ("day", self.range_points, -BLOCKS_PER_STATS_DAY),
            ("week", self.range_points, -BLOCKS_PER_STATS_DAY * 7),
            ("month", self.range_points, -BLOCKS_PER_STATS_DAY * 30),
            ("overall", self.overall_points, 0),
        ]
    }

    async fn compute_series(
        &self,
        count: u64,
        points: usize,
        offset: i64,
        cancel: &CancellationToken,
    ) -> Result<TxStatsEntry, SyncError> {
        let windows = sample_windows(count, offset, points)?;

        // Narrowest window first, labels descending.
        let samples: Vec<(usize, ChainTxStats)> =
            stream::iter(windows.into_iter().enumerate().rev())
                .map(move |(label, window)| async move {
                    let stats = cancellable(cancel, self.node.get_chain_tx_stats(window)).await?;
                    Ok::<_, SyncError>((label, stats))
                })
                .buffered(STATS_CONCURRENCY)
                .try_collect()
                .await?;

        let mut entry = TxStatsEntry::default();
        for (label, stats) in samples {
            if stats.window_tx_count == 0 {
                continue;
            }

            #[allow(clippy::cast_precision_loss)]
            let x = count.saturating_sub(stats.window_block_count) as f64;
            #[allow(clippy::cast_precision_loss)]
            let tx_count = stats.txcount.saturating_sub(stats.window_tx_count) as f64;

            entry.tx_counts.push(TxStatsDataPoint { x, y: tx_count });
            entry.tx_rates.push(TxStatsDataPoint { x, y: stats.txrate });
            entry.labels.push(label.to_string());
        }

        Ok(entry)
    }

    /// Recomputes every series and stores the composite.
    ///
    /// A series that fails keeps its previous value.
    ///
    /// # Errors
    ///
    /// Only [`SyncError::Cancelled`] is returned.
    pub async fn refresh(&self, cancel: &CancellationToken) -> Result<(), SyncError> {
        let count = self.chain_state.node_height().max(1);
        let previous = self.chain_state.tx_stats();
        let mut tx_stats = BTreeMap::new();

        for (name, points, offset) in self.series() {
            match self.compute_series(count, points, offset, cancel).await {
                Ok(entry) => {
                    tx_stats.insert(name.to_string(), entry);
                }
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    warn!(series = name, error = %e, "tx stats series failed");
                    self.metrics.record_tick_failure("tx_stats");
                    if let Some(stale) = previous.tx_stats.get(name) {
                        tx_stats.insert(name.to_string(), stale.clone());
                    }
                }
            }
        }

        debug!(height = count, series = tx_stats.len(), "tx stats refreshed");
        self.chain_state.update_tx_stats(TxStatsComposite { tx_stats });
        Ok(())
    }

    pub async fn run(self, cancel: CancellationToken) {
        tokio::select! {
            () = cancel.cancelled() => return,
            () = tokio::time::sleep(WARMUP) => {}
        }
        info!(delay_ms = self.delay.as_millis(), "tx stats worker started");

        while !cancel.is_cancelled() {
            if self.refresh(&cancel).await.is_err() {
                break;
            }

            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(self.delay) => {}
            }
        }
        info!("tx stats worker shutting down");
    }
}
