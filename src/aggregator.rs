use crate::config::EngineConfig;
use crate::error::{IngestError, StatsError};
use crate::model::{
    Observation, SignalDescriptor, SignalId, SignalMetrics, SignalSnapshot, Trend,
};
use crate::snapshot::SnapshotVersion;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Active,
    Stale,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SourceHealth {
    pub source: String,
    pub observations: u64,
    pub last_seen: DateTime<Utc>,
    pub status: SourceStatus,
}

#[derive(Debug)]
struct SignalState {
    descriptor: SignalDescriptor,
    samples: u64,
    strength: f64,
    sentiment: f64,
    velocity: f64,
    recent: VecDeque<(DateTime<Utc>, f64)>,
    trend: Trend,
    rising_streak: u32,
    falling_streak: u32,
    stable_streak: u32,
    last_observed_at: Option<DateTime<Utc>>,
}

impl SignalState {
    fn new(descriptor: SignalDescriptor) -> Self {
        Self {
            descriptor,
            samples: 0,
            strength: 0.0,
            sentiment: 0.0,
            velocity: 0.0,
            recent: VecDeque::new(),
            trend: Trend::Stable,
            rising_streak: 0,
            falling_streak: 0,
            stable_streak: 0,
            last_observed_at: None,
        }
    }
}

#[derive(Debug)]
struct SourceState {
    observations: u64,
    last_seen: DateTime<Utc>,
}

/// Owns the derived view of every signal: registered identity plus rolling
/// strength/velocity/sentiment metrics, incrementally updated on each
/// accepted observation. Partitioned by signal id so updates to one signal
/// never contend with another.
#[derive(Debug)]
pub struct StatsAggregator {
    shards: Vec<RwLock<HashMap<SignalId, SignalState>>>,
    sources: RwLock<HashMap<String, SourceState>>,
    config: EngineConfig,
    version: Arc<SnapshotVersion>,
}

impl StatsAggregator {
    pub fn new(config: EngineConfig) -> Self {
        let shard_count = config.shard_count.max(1);
        Self {
            shards: (0..shard_count)
                .map(|_| RwLock::new(HashMap::new()))
                .collect(),
            sources: RwLock::new(HashMap::new()),
            config,
            version: Arc::new(SnapshotVersion::new()),
        }
    }

    pub fn version(&self) -> Arc<SnapshotVersion> {
        self.version.clone()
    }

    fn shard_for(&self, signal_id: &str) -> &RwLock<HashMap<SignalId, SignalState>> {
        let mut hasher = DefaultHasher::new();
        signal_id.hash(&mut hasher);
        let idx = (hasher.finish() as usize) % self.shards.len();
        &self.shards[idx]
    }

    /// Upserts a signal's identity. Re-registering keeps accumulated
    /// statistics and only refreshes the descriptor fields.
    pub fn register(&self, descriptor: SignalDescriptor) {
        let mut shard = self
            .shard_for(&descriptor.id)
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match shard.get_mut(&descriptor.id) {
            Some(state) => state.descriptor = descriptor,
            None => {
                shard.insert(descriptor.id.clone(), SignalState::new(descriptor));
            }
        }
    }

    pub fn contains(&self, signal_id: &str) -> bool {
        self.shard_for(signal_id)
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains_key(signal_id)
    }

    /// Applies one accepted observation to the owning signal's rolling
    /// state. The ingest worker is the only caller.
    pub fn apply(&self, observation: &Observation) -> Result<(), IngestError> {
        let scale = self.config.scale_for(&observation.source);
        let strength_sample = (observation.magnitude * scale).clamp(0.0, 100.0);
        let sentiment_sample = observation.sentiment.clamp(-1.0, 1.0);
        let alpha = self.config.ewma_alpha();

        {
            let mut shard = self
                .shard_for(&observation.signal_id)
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let state = shard.get_mut(&observation.signal_id).ok_or_else(|| {
                IngestError::InvalidObservation(format!(
                    "unknown signal {}",
                    observation.signal_id
                ))
            })?;

            if state.samples == 0 {
                state.strength = strength_sample;
                state.sentiment = sentiment_sample;
            } else {
                state.strength += alpha * (strength_sample - state.strength);
                state.sentiment += alpha * (sentiment_sample - state.sentiment);
            }
            state.strength = state.strength.clamp(0.0, 100.0);
            state.sentiment = state.sentiment.clamp(-1.0, 1.0);
            state.samples += 1;
            state.last_observed_at = Some(observation.timestamp);

            state.recent.push_back((observation.timestamp, state.strength));
            while state.recent.len() > self.config.velocity_window {
                state.recent.pop_front();
            }
            state.velocity = slope_points_per_day(state.recent.make_contiguous());

            self.step_trend(state);
        }

        {
            let mut sources = self
                .sources
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let entry = sources
                .entry(observation.source.trim().to_lowercase())
                .or_insert(SourceState {
                    observations: 0,
                    last_seen: observation.timestamp,
                });
            entry.observations += 1;
            if observation.timestamp > entry.last_seen {
                entry.last_seen = observation.timestamp;
            }
        }

        self.version.bump();
        Ok(())
    }

    /// Trend hysteresis: a direction must hold for `trend_confirmations`
    /// consecutive evaluations before the classification changes, so one
    /// noisy sample cannot flip it.
    fn step_trend(&self, state: &mut SignalState) {
        let threshold = self.config.trend_velocity_threshold;
        if state.velocity > threshold {
            state.rising_streak += 1;
            state.falling_streak = 0;
            state.stable_streak = 0;
        } else if state.velocity < -threshold {
            state.falling_streak += 1;
            state.rising_streak = 0;
            state.stable_streak = 0;
        } else {
            state.stable_streak += 1;
            state.rising_streak = 0;
            state.falling_streak = 0;
        }

        let needed = self.config.trend_confirmations;
        if state.rising_streak >= needed {
            state.trend = Trend::Rising;
        } else if state.falling_streak >= needed {
            state.trend = Trend::Falling;
        } else if state.stable_streak >= needed {
            state.trend = Trend::Stable;
        }
    }

    fn metrics_of(&self, state: &SignalState) -> Option<SignalMetrics> {
        if state.samples < self.config.min_samples {
            // Unscored, not zero: callers must not conflate the two.
            return None;
        }
        let k = self.config.confidence_k_for(&state.descriptor.source);
        let n = state.samples as f64;
        let confidence = (100.0 * (1.0 - 1.0 / (1.0 + n / k))).clamp(0.0, 100.0);
        Some(SignalMetrics {
            strength: state.strength,
            velocity: state.velocity,
            confidence,
            trend: state.trend,
            sentiment: state.sentiment,
        })
    }

    /// Typed metric access: below the minimum sample count this is an
    /// explicit `InsufficientData`, never zeroed metrics.
    pub fn metrics(&self, signal_id: &str) -> Result<SignalMetrics, StatsError> {
        let shard = self
            .shard_for(signal_id)
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let state = shard
            .get(signal_id)
            .ok_or_else(|| StatsError::UnknownSignal(signal_id.to_string()))?;
        self.metrics_of(state)
            .ok_or_else(|| StatsError::InsufficientData {
                signal_id: signal_id.to_string(),
                samples: state.samples,
                required: self.config.min_samples,
            })
    }

    fn snapshot_of(&self, state: &SignalState) -> SignalSnapshot {
        let metrics = self.metrics_of(state);

        SignalSnapshot {
            id: state.descriptor.id.clone(),
            name: state.descriptor.name.clone(),
            source: state.descriptor.source.clone(),
            category: state.descriptor.category,
            sample_count: state.samples,
            last_observed_at: state.last_observed_at,
            metrics,
        }
    }

    pub fn snapshot(&self, signal_id: &str) -> Option<SignalSnapshot> {
        let shard = self
            .shard_for(signal_id)
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        shard.get(signal_id).map(|state| self.snapshot_of(state))
    }

    pub fn snapshots(&self) -> Vec<SignalSnapshot> {
        let mut out = Vec::new();
        for shard in &self.shards {
            let shard = shard
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            out.extend(shard.values().map(|state| self.snapshot_of(state)));
        }
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    pub fn source_health(&self, now: DateTime<Utc>) -> Vec<SourceHealth> {
        let sources = self
            .sources
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut out: Vec<SourceHealth> = sources
            .iter()
            .map(|(source, state)| {
                let age = (now - state.last_seen).num_seconds();
                SourceHealth {
                    source: source.clone(),
                    observations: state.observations,
                    last_seen: state.last_seen,
                    status: if age > self.config.source_stale_seconds {
                        SourceStatus::Stale
                    } else {
                        SourceStatus::Active
                    },
                }
            })
            .collect();
        out.sort_by(|a, b| a.source.cmp(&b.source));
        out
    }
}

/// Least-squares slope of (timestamp, strength) points in points/day.
fn slope_points_per_day(points: &[(DateTime<Utc>, f64)]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    let origin = points[0].0;
    let xs: Vec<f64> = points
        .iter()
        .map(|(ts, _)| (*ts - origin).num_seconds() as f64 / 86_400.0)
        .collect();
    let n = points.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = points.iter().map(|(_, y)| *y).sum::<f64>() / n;

    let mut num = 0.0;
    let mut den = 0.0;
    for (x, (_, y)) in xs.iter().zip(points.iter()) {
        num += (x - mean_x) * (y - mean_y);
        den += (x - mean_x) * (x - mean_x);
    }
    if den <= 0.0 || !den.is_finite() {
        return 0.0;
    }
    let slope = num / den;
    if slope.is_finite() {
        slope
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Category;
    use chrono::Duration as ChronoDuration;

    fn aggregator() -> StatsAggregator {
        let aggregator = StatsAggregator::new(EngineConfig::default());
        aggregator.register(SignalDescriptor {
            id: "api-rate-limit".to_string(),
            name: "API Rate Limiting Complaints".to_string(),
            source: "Reddit".to_string(),
            category: Category::Technical,
        });
        aggregator
    }

    fn obs(ts: DateTime<Utc>, magnitude: f64, sentiment: f64) -> Observation {
        Observation {
            signal_id: "api-rate-limit".to_string(),
            source: "Reddit".to_string(),
            timestamp: ts,
            magnitude,
            sentiment,
        }
    }

    #[test]
    fn rejects_observations_for_unregistered_signals() {
        let aggregator = StatsAggregator::new(EngineConfig::default());
        let err = aggregator
            .apply(&obs(Utc::now(), 10.0, 0.0))
            .unwrap_err();
        assert!(matches!(err, IngestError::InvalidObservation(_)));
    }

    #[test]
    fn strength_and_confidence_stay_in_bounds_under_extreme_inputs() {
        let aggregator = aggregator();
        let start = Utc::now();
        for (i, magnitude) in [1e9, -500.0, 250.0, 0.0, 77.0, 1e12, -1e12, 50.0]
            .iter()
            .enumerate()
        {
            aggregator
                .apply(&obs(
                    start + ChronoDuration::hours(i as i64),
                    *magnitude,
                    if i % 2 == 0 { 5.0 } else { -5.0 },
                ))
                .unwrap();
        }
        let snapshot = aggregator.snapshot("api-rate-limit").unwrap();
        let metrics = snapshot.metrics.expect("scored after 8 samples");
        assert!((0.0..=100.0).contains(&metrics.strength));
        assert!((0.0..=100.0).contains(&metrics.confidence));
        assert!((-1.0..=1.0).contains(&metrics.sentiment));
    }

    #[test]
    fn signals_below_min_samples_are_unscored_not_zero() {
        let aggregator = aggregator();
        let start = Utc::now();
        for i in 0..3 {
            aggregator
                .apply(&obs(start + ChronoDuration::hours(i), 60.0, 0.1))
                .unwrap();
        }
        let snapshot = aggregator.snapshot("api-rate-limit").unwrap();
        assert_eq!(snapshot.sample_count, 3);
        assert!(snapshot.metrics.is_none());

        assert!(matches!(
            aggregator.metrics("api-rate-limit"),
            Err(StatsError::InsufficientData { samples: 3, .. })
        ));
        assert!(matches!(
            aggregator.metrics("never-registered"),
            Err(StatsError::UnknownSignal(_))
        ));
    }

    #[test]
    fn confidence_saturates_with_sample_count() {
        let aggregator = aggregator();
        let start = Utc::now();
        for i in 0..200 {
            aggregator
                .apply(&obs(start + ChronoDuration::hours(i), 50.0, 0.0))
                .unwrap();
        }
        let metrics = aggregator
            .snapshot("api-rate-limit")
            .unwrap()
            .metrics
            .unwrap();
        // n=200, k=20 => 100 * (1 - 1/11) ~ 90.9
        assert!(metrics.confidence > 90.0 && metrics.confidence < 92.0);
    }

    #[test]
    fn steady_climb_classifies_rising() {
        let aggregator = aggregator();
        let start = Utc::now();
        // ~5 pt/day ramp, two samples per day.
        for i in 0..20 {
            aggregator
                .apply(&obs(
                    start + ChronoDuration::hours(12 * i),
                    40.0 + 2.5 * i as f64,
                    -0.5,
                ))
                .unwrap();
        }
        let metrics = aggregator
            .snapshot("api-rate-limit")
            .unwrap()
            .metrics
            .unwrap();
        assert_eq!(metrics.trend, Trend::Rising);
        assert!(metrics.velocity > 1.0);
    }

    #[test]
    fn single_outlier_does_not_flip_rising_trend() {
        let aggregator = aggregator();
        let start = Utc::now();
        for i in 0..20 {
            aggregator
                .apply(&obs(
                    start + ChronoDuration::hours(12 * i),
                    40.0 + 2.5 * i as f64,
                    0.0,
                ))
                .unwrap();
        }
        assert_eq!(
            aggregator
                .snapshot("api-rate-limit")
                .unwrap()
                .metrics
                .unwrap()
                .trend,
            Trend::Rising
        );

        // One hard drop: velocity dips but the classification holds until
        // three consecutive corroborating evaluations.
        aggregator
            .apply(&obs(start + ChronoDuration::hours(240), 0.0, 0.0))
            .unwrap();
        assert_eq!(
            aggregator
                .snapshot("api-rate-limit")
                .unwrap()
                .metrics
                .unwrap()
                .trend,
            Trend::Rising
        );
    }

    #[test]
    fn source_health_tracks_counts_and_staleness() {
        let aggregator = aggregator();
        let start = Utc::now() - ChronoDuration::days(2);
        for i in 0..6 {
            aggregator
                .apply(&obs(start + ChronoDuration::hours(i), 30.0, 0.0))
                .unwrap();
        }
        let health = aggregator.source_health(Utc::now());
        assert_eq!(health.len(), 1);
        assert_eq!(health[0].source, "reddit");
        assert_eq!(health[0].observations, 6);
        assert_eq!(health[0].status, SourceStatus::Stale);
    }

    #[test]
    fn slope_of_linear_ramp_matches_rate() {
        let start = Utc::now();
        let points: Vec<(DateTime<Utc>, f64)> = (0..5)
            .map(|i| (start + ChronoDuration::days(i), 10.0 + 4.8 * i as f64))
            .collect();
        let slope = slope_points_per_day(&points);
        assert!((slope - 4.8).abs() < 1e-9);
    }
}
