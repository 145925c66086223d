use crate::aggregator::StatsAggregator;
use crate::config::EngineConfig;
use crate::correlation::CorrelationSnapshot;
use crate::ingest::{build_pipeline, IngestHandle};
use crate::predictor::PredictionSnapshot;
use crate::rules::RuleEngine;
use crate::snapshot::SnapshotCell;
use crate::store::TimeSeriesStore;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Shared handles for the HTTP layer and the background services.
#[derive(Clone)]
pub struct AppState {
    pub config: EngineConfig,
    pub store: Arc<TimeSeriesStore>,
    pub aggregator: Arc<StatsAggregator>,
    pub ingest: IngestHandle,
    pub correlations: Arc<SnapshotCell<CorrelationSnapshot>>,
    pub predictions: Arc<SnapshotCell<PredictionSnapshot>>,
    pub rules: Arc<RuleEngine>,
}

impl AppState {
    /// Builds every store and starts the ingest worker. Must run inside a
    /// tokio runtime.
    pub fn build(config: EngineConfig) -> (Self, JoinHandle<()>) {
        let store = Arc::new(TimeSeriesStore::new(
            config.retention_days,
            config.shard_count,
        ));
        let aggregator = Arc::new(StatsAggregator::new(config.clone()));
        let (ingest, worker) =
            build_pipeline(config.ingest_queue, store.clone(), aggregator.clone());
        let state = Self {
            config: config.clone(),
            store,
            aggregator,
            ingest,
            correlations: Arc::new(SnapshotCell::new(CorrelationSnapshot::default())),
            predictions: Arc::new(SnapshotCell::new(PredictionSnapshot::default())),
            rules: Arc::new(RuleEngine::new(config)),
        };
        (state, worker)
    }
}
