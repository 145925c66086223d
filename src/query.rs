use crate::correlation::CorrelationSnapshot;
use crate::model::{
    Alert, AlertStatus, Category, CorrelationEdge, CorrelationLabel, ImpactTier, Prediction,
    Severity, SignalSnapshot, TimeToSpike, Trend,
};
use crate::predictor::PredictionSnapshot;
use crate::store::TimeSeriesStore;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Dashboard filter set. Empty sets mean "no restriction", matching the
/// dashboard's default-empty filter state; the confidence range is
/// inclusive and only restricts when explicitly present.
#[derive(Debug, Clone, Default)]
pub struct QueryFilter {
    pub sources: HashSet<String>,
    pub categories: HashSet<Category>,
    pub severity: HashSet<Severity>,
    pub confidence: Option<(f64, f64)>,
}

impl QueryFilter {
    /// All filters are conjunctive. An explicit confidence restriction
    /// excludes unscored signals: they have no confidence to compare.
    pub fn matches_signal(&self, signal: &SignalSnapshot) -> bool {
        if !self.sources.is_empty() && !self.sources.contains(&signal.source.to_lowercase()) {
            return false;
        }
        if !self.categories.is_empty() && !self.categories.contains(&signal.category) {
            return false;
        }
        if let Some((lo, hi)) = self.confidence {
            match &signal.metrics {
                Some(metrics) => {
                    if metrics.confidence < lo || metrics.confidence > hi {
                        return false;
                    }
                }
                None => return false,
            }
        }
        true
    }

    pub fn matches_alert(&self, alert: &Alert) -> bool {
        self.severity.is_empty() || self.severity.contains(&alert.severity)
    }
}

pub fn filter_signals(signals: &[SignalSnapshot], filter: &QueryFilter) -> Vec<SignalSnapshot> {
    signals
        .iter()
        .filter(|signal| filter.matches_signal(signal))
        .cloned()
        .collect()
}

/// Top-N alerts ordered by severity, then recency.
pub fn top_alerts(mut alerts: Vec<Alert>, filter: &QueryFilter, limit: usize) -> Vec<Alert> {
    alerts.retain(|alert| filter.matches_alert(alert));
    alerts.sort_by(|a, b| {
        a.severity
            .rank()
            .cmp(&b.severity.rank())
            .then(b.created_at.cmp(&a.created_at))
    });
    alerts.truncate(limit);
    alerts
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CorrelationMatrixView {
    pub computed_at: Option<DateTime<Utc>>,
    /// Non-weak edges only; weak edges are computed but withheld here to
    /// avoid false-confidence noise.
    pub edges: Vec<CorrelationEdge>,
    pub withheld_pairs: usize,
    pub partial: bool,
}

pub fn correlation_matrix(snapshot: &CorrelationSnapshot) -> CorrelationMatrixView {
    CorrelationMatrixView {
        computed_at: snapshot.computed_at,
        edges: snapshot
            .edges
            .iter()
            .filter(|edge| edge.label != CorrelationLabel::Weak)
            .cloned()
            .collect(),
        withheld_pairs: snapshot.withheld_pairs,
        partial: snapshot.partial,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct RiskEntry {
    pub signal_id: String,
    pub name: String,
    pub probability: f64,
    pub impact: ImpactTier,
    pub time_to_spike: TimeToSpike,
    /// Probability weighted by impact tier, for ranking.
    pub risk_score: f64,
}

fn impact_weight(impact: ImpactTier) -> f64 {
    match impact {
        ImpactTier::Low => 0.5,
        ImpactTier::Medium => 0.75,
        ImpactTier::High => 1.0,
    }
}

pub fn risk_list(
    predictions: &PredictionSnapshot,
    signals: &[SignalSnapshot],
    filter: &QueryFilter,
) -> Vec<RiskEntry> {
    let names: BTreeMap<&str, &SignalSnapshot> = signals
        .iter()
        .map(|signal| (signal.id.as_str(), signal))
        .collect();
    let mut out: Vec<RiskEntry> = predictions
        .predictions
        .iter()
        .filter_map(|prediction| {
            let signal = names.get(prediction.signal_id.as_str())?;
            if !filter.matches_signal(signal) {
                return None;
            }
            Some(RiskEntry {
                signal_id: prediction.signal_id.clone(),
                name: signal.name.clone(),
                probability: prediction.probability,
                impact: prediction.impact,
                time_to_spike: prediction.time_to_spike.clone(),
                risk_score: prediction.probability * impact_weight(prediction.impact),
            })
        })
        .collect();
    out.sort_by(|a, b| {
        b.risk_score
            .partial_cmp(&a.risk_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    out
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct OverviewSummary {
    pub total_signals: usize,
    pub scored_signals: usize,
    pub unscored_signals: usize,
    pub rising_signals: usize,
    pub open_alerts: usize,
    pub critical_alerts: usize,
    pub active_predictions: usize,
    /// Averages over scored signals only; absent when nothing is scored.
    pub average_strength: Option<f64>,
    pub average_confidence: Option<f64>,
    pub average_sentiment: Option<f64>,
}

pub fn overview(
    signals: &[SignalSnapshot],
    alerts: &[Alert],
    predictions: &PredictionSnapshot,
) -> OverviewSummary {
    let scored: Vec<_> = signals
        .iter()
        .filter_map(|signal| signal.metrics.as_ref())
        .collect();
    let average =
        |values: Vec<f64>| -> Option<f64> {
            if values.is_empty() {
                None
            } else {
                Some(values.iter().sum::<f64>() / values.len() as f64)
            }
        };

    OverviewSummary {
        total_signals: signals.len(),
        scored_signals: scored.len(),
        unscored_signals: signals.len() - scored.len(),
        rising_signals: scored
            .iter()
            .filter(|metrics| metrics.trend == Trend::Rising)
            .count(),
        open_alerts: alerts
            .iter()
            .filter(|alert| alert.status == AlertStatus::Open)
            .count(),
        critical_alerts: alerts
            .iter()
            .filter(|alert| {
                alert.status != AlertStatus::Resolved && alert.severity == Severity::Critical
            })
            .count(),
        active_predictions: predictions.predictions.len(),
        average_strength: average(scored.iter().map(|m| m.strength).collect()),
        average_confidence: average(scored.iter().map(|m| m.confidence).collect()),
        average_sentiment: average(scored.iter().map(|m| m.sentiment).collect()),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SentimentSummary {
    pub source: String,
    pub signal_count: usize,
    /// Mean smoothed sentiment across the source's scored signals.
    pub average_sentiment: f64,
    /// Mean raw sentiment over the last 7 days minus the 7 days before
    /// that; absent without observations in both windows.
    pub sentiment_delta_7d: Option<f64>,
}

pub fn sentiment_summary(
    signals: &[SignalSnapshot],
    store: &TimeSeriesStore,
    now: DateTime<Utc>,
) -> Vec<SentimentSummary> {
    let mut by_source: BTreeMap<String, Vec<&SignalSnapshot>> = BTreeMap::new();
    for signal in signals {
        by_source
            .entry(signal.source.to_lowercase())
            .or_default()
            .push(signal);
    }

    by_source
        .into_iter()
        .map(|(source, members)| {
            let smoothed: Vec<f64> = members
                .iter()
                .filter_map(|signal| signal.metrics.as_ref().map(|m| m.sentiment))
                .collect();
            let average_sentiment = if smoothed.is_empty() {
                0.0
            } else {
                smoothed.iter().sum::<f64>() / smoothed.len() as f64
            };

            let mut recent = Vec::new();
            let mut prior = Vec::new();
            let cutoff = now - ChronoDuration::days(7);
            for signal in &members {
                for obs in store.window(&signal.id, ChronoDuration::days(14), now) {
                    if obs.timestamp >= cutoff {
                        recent.push(obs.sentiment);
                    } else {
                        prior.push(obs.sentiment);
                    }
                }
            }
            let sentiment_delta_7d = if recent.is_empty() || prior.is_empty() {
                None
            } else {
                Some(
                    recent.iter().sum::<f64>() / recent.len() as f64
                        - prior.iter().sum::<f64>() / prior.len() as f64,
                )
            };

            SentimentSummary {
                source,
                signal_count: members.len(),
                average_sentiment,
                sentiment_delta_7d,
            }
        })
        .collect()
}

/// Per-signal detail view with its prediction, when one exists. The
/// `prediction` stays `None` (and `unscored` explicit) rather than being
/// zero-filled.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SignalDetail {
    #[serde(flatten)]
    pub signal: SignalSnapshot,
    pub unscored: bool,
    pub prediction: Option<Prediction>,
}

pub fn signal_detail(signal: SignalSnapshot, predictions: &PredictionSnapshot) -> SignalDetail {
    let prediction = predictions
        .predictions
        .iter()
        .find(|prediction| prediction.signal_id == signal.id)
        .cloned();
    SignalDetail {
        unscored: signal.metrics.is_none(),
        signal,
        prediction,
    }
}
