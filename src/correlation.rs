use crate::config::EngineConfig;
use crate::model::{CorrelationEdge, CorrelationLabel};
use crate::snapshot::SnapshotCell;
use crate::store::TimeSeriesStore;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const MIN_BUCKET_SECONDS: i64 = 60;

/// Result of one correlation pass, swapped in atomically. `partial` is set
/// when any pair failed and was skipped, so readers can tell a complete
/// matrix from a degraded one.
#[derive(Debug, Clone, Default, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CorrelationSnapshot {
    pub computed_at: Option<DateTime<Utc>>,
    pub edges: Vec<CorrelationEdge>,
    pub withheld_pairs: usize,
    pub failed_pairs: usize,
    pub partial: bool,
}

enum PairOutcome {
    Edge(CorrelationEdge),
    Withheld,
    Failed,
}

/// Periodic pairwise correlation over resampled observation windows.
/// Runs on a cadence rather than per observation: the pass is O(n²) in
/// active signals. Holds no store locks while computing; publishes via
/// snapshot swap and publishes nothing when cancelled mid-pass.
pub struct CorrelationService {
    store: Arc<TimeSeriesStore>,
    cell: Arc<SnapshotCell<CorrelationSnapshot>>,
    config: EngineConfig,
}

impl CorrelationService {
    pub fn new(
        store: Arc<TimeSeriesStore>,
        cell: Arc<SnapshotCell<CorrelationSnapshot>>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            cell,
            config,
        }
    }

    pub fn start(self, cancel: CancellationToken) {
        let interval = self.config.correlation_interval();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        self.run_pass(Utc::now(), &cancel);
                    }
                }
            }
        });
    }

    /// One full pairwise pass. Per-pair failures are isolated and counted;
    /// cancellation leaves the previously published snapshot intact.
    pub fn run_pass(&self, now: DateTime<Utc>, cancel: &CancellationToken) -> bool {
        let window = ChronoDuration::days(self.config.correlation_window_days);
        let ids = self.store.signal_ids();

        let mut series: Vec<(String, Vec<(i64, f64)>, i64)> = Vec::with_capacity(ids.len());
        for id in ids {
            let observations = self.store.window(&id, window, now);
            if observations.len() < 2 {
                continue;
            }
            let points: Vec<(i64, f64)> = observations
                .iter()
                .filter(|obs| obs.magnitude.is_finite())
                .map(|obs| (obs.timestamp.timestamp(), obs.magnitude))
                .collect();
            let Some(cadence) = median_gap_seconds(&points) else {
                continue;
            };
            series.push((id, points, cadence));
        }

        let mut edges = Vec::new();
        let mut withheld_pairs = 0usize;
        let mut failed_pairs = 0usize;

        for i in 0..series.len() {
            for j in (i + 1)..series.len() {
                if cancel.is_cancelled() {
                    tracing::info!("correlation pass cancelled; keeping prior snapshot");
                    return false;
                }
                let (a_id, a_points, a_cadence) = &series[i];
                let (b_id, b_points, b_cadence) = &series[j];
                match self.compute_pair(a_id, a_points, *a_cadence, b_id, b_points, *b_cadence) {
                    PairOutcome::Edge(edge) => edges.push(edge),
                    PairOutcome::Withheld => withheld_pairs += 1,
                    PairOutcome::Failed => {
                        failed_pairs += 1;
                        tracing::warn!(
                            signal_a = %a_id,
                            signal_b = %b_id,
                            "correlation pair computation failed; skipping pair"
                        );
                    }
                }
            }
        }

        let snapshot = CorrelationSnapshot {
            computed_at: Some(now),
            edges,
            withheld_pairs,
            failed_pairs,
            partial: failed_pairs > 0,
        };
        tracing::debug!(
            edges = snapshot.edges.len(),
            withheld = snapshot.withheld_pairs,
            failed = snapshot.failed_pairs,
            "correlation pass complete"
        );
        self.cell.publish(snapshot);
        true
    }

    fn compute_pair(
        &self,
        a_id: &str,
        a_points: &[(i64, f64)],
        a_cadence: i64,
        b_id: &str,
        b_points: &[(i64, f64)],
        b_cadence: i64,
    ) -> PairOutcome {
        // Bucket width is the coarsest of the two native cadences, so the
        // denser signal is averaged down rather than the sparse one
        // interpolated up.
        let bucket_seconds = a_cadence.max(b_cadence).max(MIN_BUCKET_SECONDS);
        let a = resample(a_points, bucket_seconds);
        let b = resample(b_points, bucket_seconds);

        let max_lag_buckets = (self.config.correlation_max_lag_days * 86_400) / bucket_seconds;
        let min_overlap = self.config.correlation_min_overlap;

        let Some((r, n, lag_buckets)) = best_corr_within_lag(&a, &b, max_lag_buckets, min_overlap)
        else {
            return PairOutcome::Withheld;
        };
        if !r.is_finite() {
            return PairOutcome::Failed;
        }

        let n_f = n as f64;
        let k = min_overlap as f64;
        let confidence = (100.0 * (1.0 - 1.0 / (1.0 + n_f / k))).clamp(0.0, 100.0);

        PairOutcome::Edge(CorrelationEdge {
            signal_a: a_id.to_string(),
            signal_b: b_id.to_string(),
            coefficient: r,
            lag_days: (lag_buckets * bucket_seconds) as f64 / 86_400.0,
            label: CorrelationLabel::from_coefficient(r),
            confidence,
            sample_count: n,
        })
    }
}

fn median_gap_seconds(points: &[(i64, f64)]) -> Option<i64> {
    if points.len() < 2 {
        return None;
    }
    let mut gaps: Vec<i64> = points
        .iter()
        .zip(points.iter().skip(1))
        .map(|(a, b)| (b.0 - a.0).max(1))
        .collect();
    gaps.sort_unstable();
    Some(gaps[gaps.len() / 2])
}

/// Averages raw points into fixed-width buckets keyed by bucket index.
fn resample(points: &[(i64, f64)], bucket_seconds: i64) -> Vec<(i64, f64)> {
    let bucket_seconds = bucket_seconds.max(1);
    let mut out: Vec<(i64, f64, usize)> = Vec::new();
    for (ts, value) in points {
        let bucket = ts.div_euclid(bucket_seconds);
        match out.last_mut() {
            Some((last_bucket, sum, count)) if *last_bucket == bucket => {
                *sum += value;
                *count += 1;
            }
            _ => out.push((bucket, *value, 1)),
        }
    }
    out.into_iter()
        .map(|(bucket, sum, count)| (bucket, sum / count as f64))
        .collect()
}

/// Streaming-sums Pearson over bucket-aligned values, with `b` shifted by
/// `lag_buckets`. Returns the coefficient (clamped to [-1, 1]) and the
/// overlap count; `None` when overlap is insufficient or variance
/// degenerates.
fn pearson_with_lag(
    a: &[(i64, f64)],
    b: &[(i64, f64)],
    lag_buckets: i64,
    min_overlap: usize,
) -> (Option<f64>, usize) {
    let mut i = 0;
    let mut j = 0;
    let mut n = 0usize;
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut sum_x2 = 0.0;
    let mut sum_y2 = 0.0;
    let mut sum_xy = 0.0;

    while i < a.len() && j < b.len() {
        let (bucket_a, val_a) = a[i];
        let (bucket_b, val_b) = b[j];
        let shifted_b = bucket_b - lag_buckets;
        if bucket_a == shifted_b {
            n += 1;
            sum_x += val_a;
            sum_y += val_b;
            sum_x2 += val_a * val_a;
            sum_y2 += val_b * val_b;
            sum_xy += val_a * val_b;
            i += 1;
            j += 1;
        } else if bucket_a < shifted_b {
            i += 1;
        } else {
            j += 1;
        }
    }

    if n < min_overlap {
        return (None, n);
    }
    let n_f = n as f64;
    let denom_x = n_f * sum_x2 - sum_x * sum_x;
    let denom_y = n_f * sum_y2 - sum_y * sum_y;
    let denom = (denom_x * denom_y).sqrt();
    if denom <= 0.0 || !denom.is_finite() {
        return (None, n);
    }
    let r = (n_f * sum_xy - sum_x * sum_y) / denom;
    (Some(r.clamp(-1.0, 1.0)), n)
}

/// Scans candidate lags in both directions and keeps the lag maximizing
/// |r|; ties prefer more overlap, then the smaller absolute lag.
fn best_corr_within_lag(
    a: &[(i64, f64)],
    b: &[(i64, f64)],
    max_lag_buckets: i64,
    min_overlap: usize,
) -> Option<(f64, usize, i64)> {
    let max_lag_buckets = max_lag_buckets.max(0);
    let mut best: Option<(f64, usize, i64)> = None;

    for lag in -max_lag_buckets..=max_lag_buckets {
        let (r, n) = pearson_with_lag(a, b, lag, min_overlap);
        let Some(r) = r else {
            continue;
        };
        let replace = match best {
            None => true,
            Some((best_r, best_n, best_lag)) => {
                let abs = r.abs();
                let best_abs = best_r.abs();
                abs > best_abs
                    || (abs == best_abs && n > best_n)
                    || (abs == best_abs && n == best_n && lag.abs() < best_lag.abs())
            }
        };
        if replace {
            best = Some((r, n, lag));
        }
    }

    best
}
