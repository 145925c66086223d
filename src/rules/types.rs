use crate::error::WorkflowError;
use crate::model::{Category, ImpactTier, Prediction, Priority, Severity, SignalSnapshot};
use serde::{Deserialize, Serialize};

const MAX_CONDITIONS: usize = 16;
const MAX_ACTIONS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MetricField {
    Strength,
    Confidence,
    Velocity,
    Sentiment,
    SpikeProbability,
    TimeToSpikeDays,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Lt,
    Lte,
    Gt,
    Gte,
    Eq,
    Neq,
}

pub fn compare(value: f64, op: CompareOp, threshold: f64) -> bool {
    match op {
        CompareOp::Lt => value < threshold,
        CompareOp::Lte => value <= threshold,
        CompareOp::Gt => value > threshold,
        CompareOp::Gte => value >= threshold,
        CompareOp::Eq => (value - threshold).abs() <= f64::EPSILON,
        CompareOp::Neq => (value - threshold).abs() > f64::EPSILON,
    }
}

/// One predicate over the live signal/prediction snapshot. Definitions are
/// data, never code: they are validated when configured and only read at
/// evaluation time.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    Metric {
        field: MetricField,
        op: CompareOp,
        value: f64,
    },
    CategoryIn {
        categories: Vec<Category>,
    },
    ImpactIn {
        tiers: Vec<ImpactTier>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Alert {
        severity: Severity,
        priority: Priority,
        #[serde(default)]
        action_required: bool,
        #[serde(default)]
        assign_to: Option<String>,
    },
    Escalate {
        team: String,
    },
    Tag {
        label: String,
    },
    Notify {
        channel: String,
    },
}

impl Action {
    pub fn is_alert(&self) -> bool {
        matches!(self, Action::Alert { .. })
    }

    pub fn summary(&self) -> String {
        match self {
            Action::Alert { severity, .. } => format!("alert ({})", severity.as_str()),
            Action::Escalate { team } => format!("escalate to {team}"),
            Action::Tag { label } => format!("tag {label}"),
            Action::Notify { channel } => format!("notify {channel}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct WorkflowDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub conditions: Vec<Condition>,
    pub actions: Vec<Action>,
}

/// Configuration-time validation; evaluation never re-validates.
pub fn validate_definition(definition: &WorkflowDefinition) -> Result<(), WorkflowError> {
    if definition.name.trim().is_empty() {
        return Err(WorkflowError::InvalidDefinition(
            "name is required".to_string(),
        ));
    }
    if definition.conditions.is_empty() {
        return Err(WorkflowError::InvalidDefinition(
            "at least one condition is required".to_string(),
        ));
    }
    if definition.conditions.len() > MAX_CONDITIONS {
        return Err(WorkflowError::InvalidDefinition(format!(
            "condition count exceeds max {MAX_CONDITIONS}"
        )));
    }
    if definition.actions.is_empty() {
        return Err(WorkflowError::InvalidDefinition(
            "at least one action is required".to_string(),
        ));
    }
    if definition.actions.len() > MAX_ACTIONS {
        return Err(WorkflowError::InvalidDefinition(format!(
            "action count exceeds max {MAX_ACTIONS}"
        )));
    }

    for condition in &definition.conditions {
        match condition {
            Condition::Metric { value, .. } => {
                if !value.is_finite() {
                    return Err(WorkflowError::InvalidDefinition(
                        "metric condition value must be finite".to_string(),
                    ));
                }
            }
            Condition::CategoryIn { categories } => {
                if categories.is_empty() {
                    return Err(WorkflowError::InvalidDefinition(
                        "category_in requires at least one category".to_string(),
                    ));
                }
            }
            Condition::ImpactIn { tiers } => {
                if tiers.is_empty() {
                    return Err(WorkflowError::InvalidDefinition(
                        "impact_in requires at least one tier".to_string(),
                    ));
                }
            }
        }
    }

    for action in &definition.actions {
        let target = match action {
            Action::Alert { .. } => continue,
            Action::Escalate { team } => team,
            Action::Tag { label } => label,
            Action::Notify { channel } => channel,
        };
        if target.trim().is_empty() {
            return Err(WorkflowError::InvalidDefinition(format!(
                "{} requires a non-empty target",
                action.summary()
            )));
        }
    }

    Ok(())
}

/// Evaluation view: the latest signal snapshot plus its prediction, if one
/// exists in the current prediction snapshot.
pub struct SignalView<'a> {
    pub signal: &'a SignalSnapshot,
    pub prediction: Option<&'a Prediction>,
}

/// A condition over missing data never holds: an unscored signal or an
/// absent prediction cannot satisfy a metric predicate.
pub fn condition_holds(condition: &Condition, view: &SignalView<'_>) -> bool {
    match condition {
        Condition::Metric { field, op, value } => {
            let observed = match field {
                MetricField::Strength => view.signal.metrics.as_ref().map(|m| m.strength),
                MetricField::Confidence => view.signal.metrics.as_ref().map(|m| m.confidence),
                MetricField::Velocity => view.signal.metrics.as_ref().map(|m| m.velocity),
                MetricField::Sentiment => view.signal.metrics.as_ref().map(|m| m.sentiment),
                MetricField::SpikeProbability => view.prediction.map(|p| p.probability),
                MetricField::TimeToSpikeDays => {
                    view.prediction.map(|p| p.time_to_spike.low_days)
                }
            };
            observed
                .map(|observed| compare(observed, *op, *value))
                .unwrap_or(false)
        }
        Condition::CategoryIn { categories } => categories.contains(&view.signal.category),
        Condition::ImpactIn { tiers } => view
            .prediction
            .map(|p| tiers.contains(&p.impact))
            .unwrap_or(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SignalMetrics, Trend};

    fn signal(strength: f64, confidence: f64) -> SignalSnapshot {
        SignalSnapshot {
            id: "sig".to_string(),
            name: "Sig".to_string(),
            source: "Reddit".to_string(),
            category: Category::Technical,
            sample_count: 40,
            last_observed_at: None,
            metrics: Some(SignalMetrics {
                strength,
                velocity: 2.0,
                confidence,
                trend: Trend::Rising,
                sentiment: -0.4,
            }),
        }
    }

    fn definition(conditions: Vec<Condition>) -> WorkflowDefinition {
        WorkflowDefinition {
            name: "Critical Signal Escalation".to_string(),
            description: String::new(),
            conditions,
            actions: vec![Action::Alert {
                severity: Severity::Critical,
                priority: Priority::P0,
                action_required: true,
                assign_to: None,
            }],
        }
    }

    #[test]
    fn validation_rejects_empty_conditions_and_actions() {
        let mut def = definition(vec![]);
        assert!(validate_definition(&def).is_err());

        def.conditions = vec![Condition::Metric {
            field: MetricField::Strength,
            op: CompareOp::Gt,
            value: 80.0,
        }];
        def.actions.clear();
        assert!(validate_definition(&def).is_err());
    }

    #[test]
    fn validation_rejects_non_finite_thresholds_and_blank_targets() {
        let def = definition(vec![Condition::Metric {
            field: MetricField::Strength,
            op: CompareOp::Gt,
            value: f64::NAN,
        }]);
        assert!(validate_definition(&def).is_err());

        let mut def = definition(vec![Condition::Metric {
            field: MetricField::Strength,
            op: CompareOp::Gt,
            value: 80.0,
        }]);
        def.actions.push(Action::Escalate {
            team: "  ".to_string(),
        });
        assert!(validate_definition(&def).is_err());
    }

    #[test]
    fn metric_conditions_over_unscored_signals_never_hold() {
        let mut unscored = signal(90.0, 90.0);
        unscored.metrics = None;
        let view = SignalView {
            signal: &unscored,
            prediction: None,
        };
        let condition = Condition::Metric {
            field: MetricField::Strength,
            op: CompareOp::Gt,
            value: 0.0,
        };
        assert!(!condition_holds(&condition, &view));
    }

    #[test]
    fn prediction_conditions_require_a_prediction() {
        let scored = signal(90.0, 90.0);
        let view = SignalView {
            signal: &scored,
            prediction: None,
        };
        let condition = Condition::Metric {
            field: MetricField::SpikeProbability,
            op: CompareOp::Gt,
            value: 10.0,
        };
        assert!(!condition_holds(&condition, &view));

        let impact = Condition::ImpactIn {
            tiers: vec![ImpactTier::High],
        };
        assert!(!condition_holds(&impact, &view));
    }

    #[test]
    fn category_membership_is_exact() {
        let scored = signal(50.0, 50.0);
        let view = SignalView {
            signal: &scored,
            prediction: None,
        };
        assert!(condition_holds(
            &Condition::CategoryIn {
                categories: vec![Category::Technical, Category::Bug]
            },
            &view
        ));
        assert!(!condition_holds(
            &Condition::CategoryIn {
                categories: vec![Category::Feature]
            },
            &view
        ));
    }

    #[test]
    fn workflow_definition_round_trips_through_json() {
        let def = definition(vec![
            Condition::Metric {
                field: MetricField::Strength,
                op: CompareOp::Gt,
                value: 80.0,
            },
            Condition::CategoryIn {
                categories: vec![Category::Technical, Category::Bug],
            },
        ]);
        let json = serde_json::to_value(&def).unwrap();
        assert_eq!(json["conditions"][0]["type"], "metric");
        assert_eq!(json["conditions"][0]["field"], "strength");
        let back: WorkflowDefinition = serde_json::from_value(json).unwrap();
        assert!(validate_definition(&back).is_ok());
    }
}
