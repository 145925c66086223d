use crate::aggregator::StatsAggregator;
use crate::error::IngestError;
use crate::model::Observation;
use crate::store::TimeSeriesStore;
use chrono::{Duration as ChronoDuration, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Clock skew allowance for observations stamped slightly ahead of the
/// engine's own clock.
const MAX_FUTURE_SKEW_SECONDS: i64 = 300;

#[derive(Debug)]
pub enum IngestCommand {
    Observation(Observation),
    Flush(oneshot::Sender<()>),
}

#[derive(Debug, Default)]
pub struct IngestStats {
    pub queue_depth: AtomicU64,
    pub accepted: AtomicU64,
    pub rejected_stale: AtomicU64,
    pub rejected_invalid: AtomicU64,
    pub rejected_busy: AtomicU64,
    pub last_error: Mutex<Option<String>>,
}

impl IngestStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_error(&self, err: impl Into<String>) {
        if let Ok(mut guard) = self.last_error.lock() {
            *guard = Some(err.into());
        }
    }
}

/// Caller-facing handle for the ingest pipeline. Validation and the
/// stale/backpressure checks happen here so rejections are typed and
/// synchronous; accepted observations are queued for the single worker.
#[derive(Clone)]
pub struct IngestHandle {
    tx: mpsc::Sender<IngestCommand>,
    stats: Arc<IngestStats>,
    store: Arc<TimeSeriesStore>,
    aggregator: Arc<StatsAggregator>,
}

impl IngestHandle {
    pub fn new(
        tx: mpsc::Sender<IngestCommand>,
        stats: Arc<IngestStats>,
        store: Arc<TimeSeriesStore>,
        aggregator: Arc<StatsAggregator>,
    ) -> Self {
        Self {
            tx,
            stats,
            store,
            aggregator,
        }
    }

    pub fn stats(&self) -> Arc<IngestStats> {
        self.stats.clone()
    }

    /// Accepts or rejects one observation. Never blocks: a full queue is a
    /// typed `Busy`, not a silent drop, so a slow consumer surfaces to the
    /// caller instead of stalling the aggregator.
    pub fn submit(&self, observation: Observation) -> Result<(), IngestError> {
        let now = Utc::now();

        if let Err(err) = validate(&observation) {
            self.stats.rejected_invalid.fetch_add(1, Ordering::Relaxed);
            return Err(err);
        }
        if observation.timestamp > now + ChronoDuration::seconds(MAX_FUTURE_SKEW_SECONDS) {
            self.stats.rejected_invalid.fetch_add(1, Ordering::Relaxed);
            return Err(IngestError::InvalidObservation(format!(
                "timestamp {} is in the future",
                observation.timestamp
            )));
        }
        if !self.aggregator.contains(&observation.signal_id) {
            self.stats.rejected_invalid.fetch_add(1, Ordering::Relaxed);
            return Err(IngestError::InvalidObservation(format!(
                "unknown signal {}",
                observation.signal_id
            )));
        }
        let floor = self.store.retention_floor(now);
        if observation.timestamp < floor {
            self.stats.rejected_stale.fetch_add(1, Ordering::Relaxed);
            return Err(IngestError::RejectedStale {
                timestamp: observation.timestamp,
                floor,
            });
        }

        match self.tx.try_send(IngestCommand::Observation(observation)) {
            Ok(()) => {
                self.stats.queue_depth.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_))
            | Err(mpsc::error::TrySendError::Closed(_)) => {
                self.stats.rejected_busy.fetch_add(1, Ordering::Relaxed);
                Err(IngestError::Busy)
            }
        }
    }

    /// Waits for every queued observation to be applied. Test and shutdown
    /// aid.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(IngestCommand::Flush(tx)).await.is_ok() {
            let _ = rx.await;
        }
    }
}

fn validate(observation: &Observation) -> Result<(), IngestError> {
    if observation.signal_id.trim().is_empty() {
        return Err(IngestError::InvalidObservation(
            "signal_id is required".to_string(),
        ));
    }
    if observation.source.trim().is_empty() {
        return Err(IngestError::InvalidObservation(
            "source is required".to_string(),
        ));
    }
    if !observation.magnitude.is_finite() {
        return Err(IngestError::InvalidObservation(
            "magnitude must be finite".to_string(),
        ));
    }
    if !observation.sentiment.is_finite() || observation.sentiment.abs() > 1.0 {
        return Err(IngestError::InvalidObservation(
            "sentiment must be within [-1, 1]".to_string(),
        ));
    }
    Ok(())
}

/// Single consumer draining the ingest queue: appends to the store, then
/// folds the observation into the aggregator. Per-observation failures are
/// counted and logged, never fatal to the pipeline.
pub fn spawn_worker(
    mut rx: mpsc::Receiver<IngestCommand>,
    stats: Arc<IngestStats>,
    store: Arc<TimeSeriesStore>,
    aggregator: Arc<StatsAggregator>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(command) = rx.recv().await {
            match command {
                IngestCommand::Observation(observation) => {
                    stats.queue_depth.fetch_sub(1, Ordering::Relaxed);
                    let now = Utc::now();
                    match store.append(observation.clone(), now) {
                        Ok(()) => {
                            if let Err(err) = aggregator.apply(&observation) {
                                stats.rejected_invalid.fetch_add(1, Ordering::Relaxed);
                                stats.record_error(err.to_string());
                                tracing::warn!(
                                    signal = %observation.signal_id,
                                    error = %err,
                                    "aggregator rejected queued observation"
                                );
                            } else {
                                stats.accepted.fetch_add(1, Ordering::Relaxed);
                            }
                        }
                        Err(err) => {
                            stats.rejected_stale.fetch_add(1, Ordering::Relaxed);
                            stats.record_error(err.to_string());
                            tracing::warn!(
                                signal = %observation.signal_id,
                                error = %err,
                                "store rejected queued observation"
                            );
                        }
                    }
                }
                IngestCommand::Flush(done) => {
                    let _ = done.send(());
                }
            }
        }
    })
}

/// Builds the bounded pipeline and starts its worker.
pub fn build_pipeline(
    queue_size: usize,
    store: Arc<TimeSeriesStore>,
    aggregator: Arc<StatsAggregator>,
) -> (IngestHandle, JoinHandle<()>) {
    let stats = Arc::new(IngestStats::new());
    let (tx, rx) = mpsc::channel::<IngestCommand>(queue_size.max(1));
    let handle = IngestHandle::new(tx, stats.clone(), store.clone(), aggregator.clone());
    let worker = spawn_worker(rx, stats, store, aggregator);
    (handle, worker)
}
