use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable, source-scoped identifier for a tracked signal.
pub type SignalId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Technical,
    Bug,
    Feature,
    Competitive,
    Performance,
    Security,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Technical => "technical",
            Self::Bug => "bug",
            Self::Feature => "feature",
            Self::Competitive => "competitive",
            Self::Performance => "performance",
            Self::Security => "security",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "technical" => Some(Self::Technical),
            "bug" => Some(Self::Bug),
            "feature" => Some(Self::Feature),
            "competitive" => Some(Self::Competitive),
            "performance" => Some(Self::Performance),
            "security" => Some(Self::Security),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Info,
}

impl Severity {
    /// Lower rank sorts first.
    pub fn rank(self) -> i32 {
        match self {
            Self::Critical => 0,
            Self::High => 1,
            Self::Medium => 2,
            Self::Info => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Info => "info",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "critical" => Some(Self::Critical),
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "info" => Some(Self::Info),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Rising,
    Falling,
    Stable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ImpactTier {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    P0,
    P1,
    P2,
    P3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Open,
    Acknowledged,
    Resolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Active,
    Paused,
}

/// Canonical ingest record. Immutable once accepted; only the ingest
/// pipeline creates these.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Observation {
    pub signal_id: SignalId,
    pub source: String,
    pub timestamp: DateTime<Utc>,
    pub magnitude: f64,
    /// Sentiment sample in [-1, 1].
    pub sentiment: f64,
}

/// Signal identity. Registered once via the configuration boundary;
/// derived metrics live in [`SignalSnapshot`].
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SignalDescriptor {
    pub id: SignalId,
    pub name: String,
    pub source: String,
    pub category: Category,
}

/// Derived metrics, recomputed from observation history. Never hand-set.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SignalMetrics {
    /// Smoothed strength in [0, 100].
    pub strength: f64,
    /// Rate of strength change in points/day.
    pub velocity: f64,
    /// Sample-count driven confidence in [0, 100].
    pub confidence: f64,
    pub trend: Trend,
    /// Smoothed sentiment in [-1, 1].
    pub sentiment: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SignalSnapshot {
    pub id: SignalId,
    pub name: String,
    pub source: String,
    pub category: Category,
    pub sample_count: u64,
    pub last_observed_at: Option<DateTime<Utc>>,
    /// `None` while the signal is unscored (below the minimum sample
    /// count). Distinct from zero metrics.
    pub metrics: Option<SignalMetrics>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationLabel {
    Strong,
    Moderate,
    Weak,
}

impl CorrelationLabel {
    pub fn from_coefficient(r: f64) -> Self {
        let abs = r.abs();
        if abs >= 0.8 {
            Self::Strong
        } else if abs >= 0.6 {
            Self::Moderate
        } else {
            Self::Weak
        }
    }
}

/// Correlation between a canonical unordered pair (`signal_a` <
/// `signal_b`). A positive lag means `signal_b` trails `signal_a`.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CorrelationEdge {
    pub signal_a: SignalId,
    pub signal_b: SignalId,
    pub coefficient: f64,
    pub lag_days: f64,
    pub label: CorrelationLabel,
    pub confidence: f64,
    pub sample_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct TimeToSpike {
    pub low_days: f64,
    pub high_days: f64,
}

/// Per-signal spike forecast. Superseded wholesale on every scorer pass.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Prediction {
    pub signal_id: SignalId,
    /// Spike probability in [0, 100].
    pub probability: f64,
    pub impact: ImpactTier,
    pub time_to_spike: TimeToSpike,
    /// Goodness of fit of the extrapolation model, [0, 1].
    pub model_fit: f64,
    /// True when the probability was capped because the fit was poor.
    pub low_fit: bool,
    pub factors: Vec<String>,
    pub recommendation_id: Uuid,
    pub recommendation: String,
    pub generated_at: DateTime<Utc>,
}

/// Immutable alert core with a timestamped, attributed lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Alert {
    pub id: Uuid,
    pub severity: Severity,
    pub title: String,
    pub message: String,
    pub source_component: String,
    pub action_required: bool,
    pub priority: Priority,
    pub signal_id: Option<SignalId>,
    pub workflow_id: Option<Uuid>,
    pub status: AlertStatus,
    pub assigned_to: Option<String>,
    pub created_at: DateTime<Utc>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub acknowledged_by: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_round_trips_through_parse() {
        for category in [
            Category::Technical,
            Category::Bug,
            Category::Feature,
            Category::Competitive,
            Category::Performance,
            Category::Security,
        ] {
            assert_eq!(Category::parse(category.as_str()), Some(category));
        }
        assert_eq!(Category::parse("unknown"), None);
    }

    #[test]
    fn severity_rank_orders_critical_first() {
        assert!(Severity::Critical.rank() < Severity::High.rank());
        assert!(Severity::High.rank() < Severity::Medium.rank());
        assert!(Severity::Medium.rank() < Severity::Info.rank());
    }

    #[test]
    fn correlation_label_thresholds() {
        assert_eq!(
            CorrelationLabel::from_coefficient(-0.85),
            CorrelationLabel::Strong
        );
        assert_eq!(
            CorrelationLabel::from_coefficient(0.65),
            CorrelationLabel::Moderate
        );
        assert_eq!(
            CorrelationLabel::from_coefficient(0.3),
            CorrelationLabel::Weak
        );
    }
}
