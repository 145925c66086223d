use crate::aggregator::StatsAggregator;
use crate::config::EngineConfig;
use crate::correlation::CorrelationSnapshot;
use crate::model::{
    Category, CorrelationLabel, ImpactTier, Prediction, SignalSnapshot, TimeToSpike, Trend,
};
use crate::snapshot::SnapshotCell;
use crate::store::TimeSeriesStore;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// How far back the extrapolation fit looks.
const FIT_WINDOW_DAYS: i64 = 14;
/// Bound on the second-order term so short windows cannot launch the
/// projection into absurd curvature.
const MAX_ACCEL_POINTS_PER_DAY2: f64 = 1.0;
/// Projection step when searching for the threshold crossing.
const PROJECTION_STEP_DAYS: f64 = 0.05;
/// Corroborating rising correlated signals add this much probability each.
const CORROBORATION_BOOST: f64 = 4.0;
const CORROBORATION_BOOST_MAX: f64 = 12.0;

#[derive(Debug, Clone, Default, Serialize, Deserialize, utoipa::ToSchema)]
pub struct PredictionSnapshot {
    pub computed_at: Option<DateTime<Utc>>,
    pub predictions: Vec<Prediction>,
    pub partial: bool,
}

#[derive(Debug, Clone, Copy)]
struct LinearFit {
    slope: f64,
    intercept: f64,
    r2: f64,
}

#[derive(Debug, Clone, Copy)]
struct Projection {
    crossing_days: f64,
    fit: LinearFit,
    accel: f64,
}

/// Periodic spike scorer: extrapolates each eligible signal's recent
/// strength trend and publishes the whole prediction set atomically.
/// Fails closed: poor fit caps probability below the actionable
/// threshold instead of reporting a confident spike.
pub struct PredictiveService {
    store: Arc<TimeSeriesStore>,
    aggregator: Arc<StatsAggregator>,
    correlations: Arc<SnapshotCell<CorrelationSnapshot>>,
    cell: Arc<SnapshotCell<PredictionSnapshot>>,
    config: EngineConfig,
}

impl PredictiveService {
    pub fn new(
        store: Arc<TimeSeriesStore>,
        aggregator: Arc<StatsAggregator>,
        correlations: Arc<SnapshotCell<CorrelationSnapshot>>,
        cell: Arc<SnapshotCell<PredictionSnapshot>>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            aggregator,
            correlations,
            cell,
            config,
        }
    }

    pub fn start(self, cancel: CancellationToken) {
        let interval = self.config.predictor_interval();
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

    /// One scoring pass over every scored signal. Per-signal failures are
    /// isolated; cancellation publishes nothing.
    pub fn run_pass(&self, now: DateTime<Utc>, cancel: &CancellationToken) -> bool {
        let signals = self.aggregator.snapshots();
        let correlations = self.correlations.load();
        let trends: HashMap<&str, Trend> = signals
            .iter()
            .filter_map(|snapshot| {
                snapshot
                    .metrics
                    .as_ref()
                    .map(|metrics| (snapshot.id.as_str(), metrics.trend))
            })
            .collect();

        let mut predictions = Vec::new();
        let mut failed = 0usize;

        for snapshot in &signals {
            if cancel.is_cancelled() {
                tracing::info!("prediction pass cancelled; keeping prior snapshot");
                return false;
            }
            match self.score_signal(snapshot, &correlations, &trends, now) {
                Ok(Some(prediction)) => predictions.push(prediction),
                Ok(None) => {}
                Err(reason) => {
                    failed += 1;
                    tracing::warn!(
                        signal = %snapshot.id,
                        reason,
                        "prediction scoring failed; skipping signal"
                    );
                }
            }
        }

        predictions.sort_by(|a, b| {
            b.probability
                .partial_cmp(&a.probability)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let snapshot = PredictionSnapshot {
            computed_at: Some(now),
            predictions,
            partial: failed > 0,
        };
        tracing::debug!(
            predictions = snapshot.predictions.len(),
            failed,
            "prediction pass complete"
        );
        self.cell.publish(snapshot);
        true
    }

    fn score_signal(
        &self,
        snapshot: &SignalSnapshot,
        correlations: &CorrelationSnapshot,
        trends: &HashMap<&str, Trend>,
        now: DateTime<Utc>,
    ) -> Result<Option<Prediction>, &'static str> {
        // Unscored signals get no prediction at all: "no signal" must stay
        // distinguishable from "low probability".
        let Some(metrics) = snapshot.metrics.as_ref() else {
            return Ok(None);
        };
        if metrics.confidence < self.config.predictor_confidence_floor {
            return Ok(None);
        }
        if metrics.trend != Trend::Rising && metrics.velocity <= 0.0 {
            return Ok(None);
        }

        let observations =
            self.store
                .window(&snapshot.id, ChronoDuration::days(FIT_WINDOW_DAYS), now);
        if (observations.len() as u64) < self.config.min_samples {
            return Ok(None);
        }

        let scale = self.config.scale_for(&snapshot.source);
        let points: Vec<(f64, f64)> = observations
            .iter()
            .map(|obs| {
                (
                    (obs.timestamp - now).num_seconds() as f64 / 86_400.0,
                    (obs.magnitude * scale).clamp(0.0, 100.0),
                )
            })
            .collect();

        let Some(projection) = project_crossing(
            &points,
            self.config.spike_threshold,
            self.config.spike_max_days,
        ) else {
            // Trend never reaches the threshold inside the projection
            // horizon: no confident prediction for this signal.
            return Ok(None);
        };
        if !projection.crossing_days.is_finite() {
            return Err("non-finite projection");
        }

        let clamped_days = projection
            .crossing_days
            .clamp(self.config.spike_min_days, self.config.spike_max_days);
        let time_to_spike = TimeToSpike {
            low_days: (clamped_days * 0.75)
                .clamp(self.config.spike_min_days, self.config.spike_max_days),
            high_days: (clamped_days * 1.25)
                .clamp(self.config.spike_min_days, self.config.spike_max_days),
        };

        let mut factors = vec![
            format!(
                "velocity {:+.1} pt/day over {} samples",
                projection.fit.slope,
                points.len()
            ),
            format!("model fit {:.2}", projection.fit.r2),
        ];
        if projection.accel > 0.05 {
            factors.push(format!(
                "accelerating at {:+.2} pt/day per day",
                projection.accel
            ));
        }

        let mut boost = 0.0;
        for edge in &correlations.edges {
            if edge.label == CorrelationLabel::Weak || edge.coefficient < 0.6 {
                continue;
            }
            let partner = if edge.signal_a == snapshot.id {
                Some(edge.signal_b.as_str())
            } else if edge.signal_b == snapshot.id {
                Some(edge.signal_a.as_str())
            } else {
                None
            };
            let Some(partner) = partner else { continue };
            if trends.get(partner) == Some(&Trend::Rising) {
                boost = (boost + CORROBORATION_BOOST).min(CORROBORATION_BOOST_MAX);
                factors.push(format!(
                    "corroborated by rising signal {partner} (r = {:.2})",
                    edge.coefficient
                ));
            }
        }

        let current = projection.fit.intercept.clamp(0.0, 100.0);
        let proximity = (current / self.config.spike_threshold).clamp(0.0, 1.0);
        let mut probability =
            100.0 * (0.5 * projection.fit.r2 + 0.5 * proximity) + boost;

        let low_fit = projection.fit.r2 < self.config.predictor_fit_floor;
        if low_fit {
            probability = probability.min(self.config.low_fit_probability_cap);
            factors.push("probability capped: trend fit below floor".to_string());
        }
        probability = probability.clamp(0.0, 100.0);

        let impact = if probability >= 80.0
            || (clamped_days <= 30.0 && probability >= self.config.actionable_probability)
        {
            ImpactTier::High
        } else if probability >= 60.0 {
            ImpactTier::Medium
        } else {
            ImpactTier::Low
        };

        Ok(Some(Prediction {
            signal_id: snapshot.id.clone(),
            probability,
            impact,
            time_to_spike,
            model_fit: projection.fit.r2,
            low_fit,
            factors,
            recommendation_id: Uuid::new_v4(),
            recommendation: recommendation_for(snapshot.category, clamped_days),
            generated_at: now,
        }))
    }
}

fn recommendation_for(category: Category, crossing_days: f64) -> String {
    let horizon = if crossing_days <= 30.0 {
        "ahead of the projected spike"
    } else {
        "before the trend compounds"
    };
    match category {
        Category::Technical => format!("Scale or rate-limit the affected subsystem {horizon}"),
        Category::Bug => format!("Prioritize stability fixes for the affected surface {horizon}"),
        Category::Feature => format!("Evaluate the requested capability's roadmap slot {horizon}"),
        Category::Competitive => format!("Prepare a competitive response brief {horizon}"),
        Category::Performance => format!("Profile and optimize the degrading path {horizon}"),
        Category::Security => format!("Triage the reported exposure {horizon}"),
    }
}

/// Least-squares line over (days, strength) points; x = 0 is "now", so the
/// intercept is the current strength estimate.
fn linear_fit(points: &[(f64, f64)]) -> Option<LinearFit> {
    if points.len() < 2 {
        return None;
    }
    let n = points.len() as f64;
    let mean_x = points.iter().map(|(x, _)| *x).sum::<f64>() / n;
    let mean_y = points.iter().map(|(_, y)| *y).sum::<f64>() / n;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for (x, y) in points {
        sxx += (x - mean_x) * (x - mean_x);
        sxy += (x - mean_x) * (y - mean_y);
    }
    if sxx <= 0.0 || !sxx.is_finite() {
        return None;
    }
    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;

    let mut ss_res = 0.0;
    let mut ss_tot = 0.0;
    for (x, y) in points {
        let predicted = intercept + slope * x;
        ss_res += (y - predicted) * (y - predicted);
        ss_tot += (y - mean_y) * (y - mean_y);
    }
    let r2 = if ss_tot <= f64::EPSILON {
        0.0
    } else {
        (1.0 - ss_res / ss_tot).clamp(0.0, 1.0)
    };

    Some(LinearFit {
        slope,
        intercept,
        r2,
    })
}

/// Slope change between the older and newer halves of the window, bounded
/// so it stays a correction term rather than the dominant force.
fn bounded_acceleration(points: &[(f64, f64)]) -> f64 {
    if points.len() < 4 {
        return 0.0;
    }
    let mid = points.len() / 2;
    let (older, newer) = points.split_at(mid);
    let (Some(older_fit), Some(newer_fit)) = (linear_fit(older), linear_fit(newer)) else {
        return 0.0;
    };
    let older_mid = older.iter().map(|(x, _)| *x).sum::<f64>() / older.len() as f64;
    let newer_mid = newer.iter().map(|(x, _)| *x).sum::<f64>() / newer.len() as f64;
    let span = newer_mid - older_mid;
    if span <= 0.0 || !span.is_finite() {
        return 0.0;
    }
    ((newer_fit.slope - older_fit.slope) / span)
        .clamp(-MAX_ACCEL_POINTS_PER_DAY2, MAX_ACCEL_POINTS_PER_DAY2)
}

/// Walks the projected strength curve forward until it crosses `threshold`,
/// up to `max_days`. Returns `None` for flat/declining projections or when
/// the crossing is beyond the horizon.
fn project_crossing(points: &[(f64, f64)], threshold: f64, max_days: f64) -> Option<Projection> {
    let fit = linear_fit(points)?;
    if fit.slope <= 0.0 {
        return None;
    }
    let accel = bounded_acceleration(points);

    if fit.intercept >= threshold {
        return Some(Projection {
            crossing_days: 0.0,
            fit,
            accel,
        });
    }

    let mut t = 0.0;
    while t <= max_days {
        let projected = fit.intercept + fit.slope * t + 0.5 * accel * t * t;
        if projected >= threshold {
            return Some(Projection {
                crossing_days: t,
                fit,
                accel,
            });
        }
        t += PROJECTION_STEP_DAYS;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Observation, SignalDescriptor};

    fn build_service(
        config: EngineConfig,
    ) -> (
        PredictiveService,
        Arc<TimeSeriesStore>,
        Arc<StatsAggregator>,
        Arc<SnapshotCell<PredictionSnapshot>>,
        Arc<SnapshotCell<CorrelationSnapshot>>,
    ) {
        let store = Arc::new(TimeSeriesStore::new(
            config.retention_days,
            config.shard_count,
        ));
        let aggregator = Arc::new(StatsAggregator::new(config.clone()));
        let correlations = Arc::new(SnapshotCell::new(CorrelationSnapshot::default()));
        let cell = Arc::new(SnapshotCell::new(PredictionSnapshot::default()));
        let service = PredictiveService::new(
            store.clone(),
            aggregator.clone(),
            correlations.clone(),
            cell.clone(),
            config,
        );
        (service, store, aggregator, cell, correlations)
    }

    fn register(aggregator: &StatsAggregator, id: &str) {
        aggregator.register(SignalDescriptor {
            id: id.to_string(),
            name: id.to_string(),
            source: "Reddit".to_string(),
            category: Category::Technical,
        });
    }

    fn feed_ramp(
        store: &TimeSeriesStore,
        aggregator: &StatsAggregator,
        id: &str,
        now: DateTime<Utc>,
        samples: usize,
        start_value: f64,
        per_sample: f64,
        hours_apart: i64,
    ) {
        let span = ChronoDuration::hours(hours_apart * (samples as i64 - 1));
        let start = now - span;
        for i in 0..samples {
            let observation = Observation {
                signal_id: id.to_string(),
                source: "Reddit".to_string(),
                timestamp: start + ChronoDuration::hours(hours_apart * i as i64),
                magnitude: start_value + per_sample * i as f64,
                sentiment: -0.5,
            };
            store.append(observation.clone(), now).unwrap();
            aggregator.apply(&observation).unwrap();
        }
    }

    #[test]
    fn linear_fit_recovers_slope_and_current_estimate() {
        let points: Vec<(f64, f64)> = (0..20)
            .map(|i| (-9.5 + 0.5 * i as f64, 40.0 + 4.8 * (9.5 + (-9.5 + 0.5 * i as f64))))
            .collect();
        let fit = linear_fit(&points).unwrap();
        assert!((fit.slope - 4.8).abs() < 1e-9);
        assert!((fit.r2 - 1.0).abs() < 1e-9);
    }

    #[test]
    fn projection_walks_to_threshold_crossing() {
        // Current strength 88, +4.8/day: crossing in under half a day.
        let points: Vec<(f64, f64)> = (0..20)
            .map(|i| {
                let x = -9.5 + 0.5 * i as f64;
                (x, 88.0 + 4.8 * x)
            })
            .collect();
        let projection = project_crossing(&points, 90.0, 180.0).unwrap();
        assert!(projection.crossing_days < 1.0);
        assert!(projection.crossing_days >= 0.3);
    }

    #[test]
    fn declining_series_never_projects_a_spike() {
        let points: Vec<(f64, f64)> = (0..10).map(|i| (-(i as f64), 80.0 - i as f64)).collect();
        assert!(project_crossing(&points, 90.0, 180.0).is_none());
    }

    #[test]
    fn steep_clean_ramp_scores_high_probability_with_min_clamped_eta() {
        let config = EngineConfig::default();
        let (service, store, aggregator, cell, _) = build_service(config.clone());
        register(&aggregator, "api-rate-limit");
        let now = Utc::now();
        // 20 observations over 10 days, 40 -> 88 at ~4.8 pt/day.
        feed_ramp(&store, &aggregator, "api-rate-limit", now, 20, 40.0, 2.526, 12);

        assert_eq!(
            aggregator
                .snapshot("api-rate-limit")
                .unwrap()
                .metrics
                .unwrap()
                .trend,
            Trend::Rising
        );
        assert!(service.run_pass(now, &CancellationToken::new()));

        let snapshot = cell.load();
        assert_eq!(snapshot.predictions.len(), 1);
        let prediction = &snapshot.predictions[0];
        assert!(prediction.probability >= 80.0, "{}", prediction.probability);
        assert!(prediction.model_fit >= 0.85);
        assert!(!prediction.low_fit);
        // Raw crossing estimate is ~(90-88)/4.8 days; reported ETA clamps
        // to the configured minimum window.
        assert!((prediction.time_to_spike.low_days - config.spike_min_days).abs() < 1e-9);
        assert_eq!(prediction.impact, ImpactTier::High);
    }

    #[test]
    fn noisy_trend_is_capped_below_actionable() {
        let config = EngineConfig::default();
        let (service, store, aggregator, cell, _) = build_service(config.clone());
        register(&aggregator, "flaky");
        let now = Utc::now();
        // Alternating spikes: positive overall slope, terrible fit.
        let span = ChronoDuration::hours(12 * 19);
        let start = now - span;
        for i in 0..20 {
            let magnitude = if i % 2 == 0 { 20.0 } else { 85.0 } + i as f64;
            let observation = Observation {
                signal_id: "flaky".to_string(),
                source: "Reddit".to_string(),
                timestamp: start + ChronoDuration::hours(12 * i as i64),
                magnitude,
                sentiment: 0.0,
            };
            store.append(observation.clone(), now).unwrap();
            aggregator.apply(&observation).unwrap();
        }

        assert!(service.run_pass(now, &CancellationToken::new()));
        let snapshot = cell.load();
        for prediction in &snapshot.predictions {
            if prediction.low_fit {
                assert!(prediction.probability <= config.low_fit_probability_cap);
                assert!(prediction.probability < config.actionable_probability);
            }
        }
    }

    #[test]
    fn unscored_signals_get_no_prediction() {
        let config = EngineConfig::default();
        let (service, store, aggregator, cell, _) = build_service(config);
        register(&aggregator, "sparse");
        let now = Utc::now();
        feed_ramp(&store, &aggregator, "sparse", now, 3, 40.0, 10.0, 12);

        assert!(service.run_pass(now, &CancellationToken::new()));
        assert!(cell.load().predictions.is_empty());
    }

    #[test]
    fn corroborating_rising_edges_raise_probability() {
        let config = EngineConfig::default();
        let (service, store, aggregator, cell, correlations) = build_service(config);
        register(&aggregator, "primary");
        register(&aggregator, "partner");
        let now = Utc::now();
        feed_ramp(&store, &aggregator, "primary", now, 20, 30.0, 2.0, 12);
        feed_ramp(&store, &aggregator, "partner", now, 20, 35.0, 2.0, 12);

        assert!(service.run_pass(now, &CancellationToken::new()));
        let without = cell.load();
        let base = without
            .predictions
            .iter()
            .find(|p| p.signal_id == "primary")
            .unwrap()
            .probability;

        correlations.publish(CorrelationSnapshot {
            computed_at: Some(now),
            edges: vec![crate::model::CorrelationEdge {
                signal_a: "partner".to_string(),
                signal_b: "primary".to_string(),
                coefficient: 0.87,
                lag_days: 1.0,
                label: CorrelationLabel::Strong,
                confidence: 90.0,
                sample_count: 20,
            }],
            withheld_pairs: 0,
            failed_pairs: 0,
            partial: false,
        });

        assert!(service.run_pass(now, &CancellationToken::new()));
        let with = cell.load();
        let boosted = with
            .predictions
            .iter()
            .find(|p| p.signal_id == "primary")
            .unwrap();
        assert!(boosted.probability > base);
        assert!(boosted
            .factors
            .iter()
            .any(|factor| factor.contains("partner")));
    }
}
