use crate::aggregator::StatsAggregator;
use crate::config::EngineConfig;
use crate::error::{AlertError, WorkflowError};
use crate::model::{
    Alert, AlertStatus, Prediction, SignalId, SignalSnapshot, WorkflowStatus,
};
use crate::predictor::PredictionSnapshot;
use crate::snapshot::SnapshotCell;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub mod types;

use types::{condition_holds, validate_definition, Action, SignalView, WorkflowDefinition};

/// Identity of the state a rule pass evaluated against: the aggregator
/// version plus the prediction snapshot stamp. Re-evaluating an unchanged
/// key is a no-op, which makes evaluation idempotent.
pub type SnapshotKey = (u64, Option<DateTime<Utc>>);

#[derive(Debug, Clone)]
pub struct EvalSnapshot {
    pub key: SnapshotKey,
    pub signals: Vec<SignalSnapshot>,
    pub predictions: HashMap<SignalId, Prediction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Pending,
    Confirmed,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct WorkflowRun {
    pub id: Uuid,
    pub signal_id: SignalId,
    pub fired_at: DateTime<Utc>,
    pub actions: Vec<Action>,
    pub alert_ids: Vec<Uuid>,
    pub outcome: RunOutcome,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct WorkflowInfo {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub status: WorkflowStatus,
    pub conditions: Vec<types::Condition>,
    pub actions: Vec<Action>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_fired_at: Option<DateTime<Utc>>,
    pub trigger_count: u64,
    pub action_count: u64,
    /// Confirmed share of the rolling run window, as a percentage. `None`
    /// until the workflow has fired at least once.
    pub success_rate: Option<f64>,
}

#[derive(Debug, Default)]
struct FiringState {
    currently_firing: bool,
    last_fired_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct WorkflowState {
    definition: WorkflowDefinition,
    status: WorkflowStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_run_at: Option<DateTime<Utc>>,
    last_fired_at: Option<DateTime<Utc>>,
    trigger_count: u64,
    action_count: u64,
    last_eval_key: Option<SnapshotKey>,
    firing: HashMap<SignalId, FiringState>,
    runs: VecDeque<WorkflowRun>,
}

impl WorkflowState {
    fn info(&self, id: Uuid) -> WorkflowInfo {
        let success_rate = if self.runs.is_empty() {
            None
        } else {
            let confirmed = self
                .runs
                .iter()
                .filter(|run| run.outcome == RunOutcome::Confirmed)
                .count();
            Some(100.0 * confirmed as f64 / self.runs.len() as f64)
        };
        WorkflowInfo {
            id,
            name: self.definition.name.clone(),
            description: self.definition.description.clone(),
            status: self.status,
            conditions: self.definition.conditions.clone(),
            actions: self.definition.actions.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            last_run_at: self.last_run_at,
            last_fired_at: self.last_fired_at,
            trigger_count: self.trigger_count,
            action_count: self.action_count,
            success_rate,
        }
    }
}

/// Owns workflows and the alert log. Workflows mutate only through the
/// configuration operations here, never from analytics; alerts are created
/// by evaluation and only their lifecycle fields change afterwards.
pub struct RuleEngine {
    workflows: RwLock<HashMap<Uuid, WorkflowState>>,
    alerts: RwLock<Vec<Alert>>,
    alert_workflows: RwLock<HashMap<Uuid, Uuid>>,
    config: EngineConfig,
}

impl RuleEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            workflows: RwLock::new(HashMap::new()),
            alerts: RwLock::new(Vec::new()),
            alert_workflows: RwLock::new(HashMap::new()),
            config,
        }
    }

    pub fn create_workflow(
        &self,
        definition: WorkflowDefinition,
        now: DateTime<Utc>,
    ) -> Result<WorkflowInfo, WorkflowError> {
        validate_definition(&definition)?;
        let id = Uuid::new_v4();
        let state = WorkflowState {
            definition,
            status: WorkflowStatus::Active,
            created_at: now,
            updated_at: now,
            last_run_at: None,
            last_fired_at: None,
            trigger_count: 0,
            action_count: 0,
            last_eval_key: None,
            firing: HashMap::new(),
            runs: VecDeque::new(),
        };
        let info = state.info(id);
        self.workflows_mut().insert(id, state);
        Ok(info)
    }

    /// Replaces the definition; counters and run history survive, firing
    /// edges reset because the old edges were computed for old conditions.
    pub fn update_workflow(
        &self,
        id: Uuid,
        definition: WorkflowDefinition,
        now: DateTime<Utc>,
    ) -> Result<WorkflowInfo, WorkflowError> {
        validate_definition(&definition)?;
        let mut workflows = self.workflows_mut();
        let state = workflows.get_mut(&id).ok_or(WorkflowError::NotFound(id))?;
        state.definition = definition;
        state.updated_at = now;
        state.firing.clear();
        state.last_eval_key = None;
        Ok(state.info(id))
    }

    pub fn set_status(
        &self,
        id: Uuid,
        status: WorkflowStatus,
        now: DateTime<Utc>,
    ) -> Result<WorkflowInfo, WorkflowError> {
        let mut workflows = self.workflows_mut();
        let state = workflows.get_mut(&id).ok_or(WorkflowError::NotFound(id))?;
        if state.status != status {
            state.status = status;
            state.updated_at = now;
        }
        Ok(state.info(id))
    }

    pub fn workflow(&self, id: Uuid) -> Option<WorkflowInfo> {
        self.workflows_read().get(&id).map(|state| state.info(id))
    }

    pub fn workflows(&self) -> Vec<WorkflowInfo> {
        let workflows = self.workflows_read();
        let mut out: Vec<WorkflowInfo> = workflows
            .iter()
            .map(|(id, state)| state.info(*id))
            .collect();
        out.sort_by_key(|info| info.created_at);
        out
    }

    pub fn workflow_runs(&self, id: Uuid) -> Result<Vec<WorkflowRun>, WorkflowError> {
        let workflows = self.workflows_read();
        let state = workflows.get(&id).ok_or(WorkflowError::NotFound(id))?;
        Ok(state.runs.iter().cloned().collect())
    }

    /// Evaluates every active workflow against one state snapshot.
    /// Deterministic and idempotent: a workflow that already saw this
    /// snapshot key is skipped outright. Firing is edge-triggered per
    /// (workflow, signal); an elapsed cooldown re-arms a still-true
    /// condition. Returns the number of fires.
    pub fn evaluate(&self, snapshot: &EvalSnapshot, now: DateTime<Utc>) -> usize {
        let mut fires = 0usize;
        let mut workflows = self.workflows_mut();

        for (workflow_id, state) in workflows.iter_mut() {
            if state.status == WorkflowStatus::Paused {
                continue;
            }
            if state.last_eval_key.as_ref() == Some(&snapshot.key) {
                continue;
            }
            state.last_eval_key = Some(snapshot.key);
            state.last_run_at = Some(now);

            for signal in &snapshot.signals {
                let view = SignalView {
                    signal,
                    prediction: snapshot.predictions.get(&signal.id),
                };
                // Conjunctive semantics: every condition must hold against
                // the same snapshot. No partial-match firing.
                let passed = state
                    .definition
                    .conditions
                    .iter()
                    .all(|condition| condition_holds(condition, &view));

                let firing = state.firing.entry(signal.id.clone()).or_default();
                let cooldown_elapsed = firing
                    .last_fired_at
                    .map(|fired| {
                        (now - fired).num_seconds() >= self.config.rule_cooldown_seconds
                    })
                    .unwrap_or(true);
                let armed = !firing.currently_firing || cooldown_elapsed;

                if passed && armed {
                    firing.last_fired_at = Some(now);
                    firing.currently_firing = true;
                    fires += 1;

                    let run = self.fire(*workflow_id, state, signal, now);
                    state.trigger_count += 1;
                    state.action_count += run.actions.len() as u64;
                    state.last_fired_at = Some(now);
                    state.runs.push_back(run);
                    while state.runs.len() > self.config.success_rate_window {
                        state.runs.pop_front();
                    }
                } else {
                    firing.currently_firing = passed;
                }
            }
        }

        if fires > 0 {
            tracing::info!(fires, "workflow evaluation pass fired");
        }
        fires
    }

    fn fire(
        &self,
        workflow_id: Uuid,
        state: &WorkflowState,
        signal: &SignalSnapshot,
        now: DateTime<Utc>,
    ) -> WorkflowRun {
        let definition = &state.definition;
        let observed = signal
            .metrics
            .as_ref()
            .map(|m| {
                format!(
                    "strength {:.0}, confidence {:.0}, velocity {:+.1}",
                    m.strength, m.confidence, m.velocity
                )
            })
            .unwrap_or_else(|| "unscored".to_string());

        let mut alert_ids = Vec::new();
        for action in &definition.actions {
            if let Action::Alert {
                severity,
                priority,
                action_required,
                assign_to,
            } = action
            {
                let alert = Alert {
                    id: Uuid::new_v4(),
                    severity: *severity,
                    title: format!("{}: {}", definition.name, signal.name),
                    message: format!(
                        "{} matched all {} conditions ({observed})",
                        signal.name,
                        definition.conditions.len()
                    ),
                    source_component: "rule-engine".to_string(),
                    action_required: *action_required,
                    priority: *priority,
                    signal_id: Some(signal.id.clone()),
                    workflow_id: Some(workflow_id),
                    status: AlertStatus::Open,
                    assigned_to: assign_to.clone(),
                    created_at: now,
                    acknowledged_at: None,
                    acknowledged_by: None,
                    resolved_at: None,
                    resolved_by: None,
                };
                alert_ids.push(alert.id);
                self.alert_workflows_mut().insert(alert.id, workflow_id);
                self.alerts_mut().push(alert);
            } else {
                tracing::debug!(
                    workflow = %definition.name,
                    signal = %signal.id,
                    action = %action.summary(),
                    "automation action recorded"
                );
            }
        }

        WorkflowRun {
            id: Uuid::new_v4(),
            signal_id: signal.id.clone(),
            fired_at: now,
            actions: definition.actions.clone(),
            alert_ids,
            outcome: RunOutcome::Pending,
        }
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts_read().clone()
    }

    pub fn acknowledge_alert(
        &self,
        id: Uuid,
        by: &str,
        now: DateTime<Utc>,
    ) -> Result<Alert, AlertError> {
        let updated = {
            let mut alerts = self.alerts_mut();
            let alert = alerts
                .iter_mut()
                .find(|alert| alert.id == id)
                .ok_or(AlertError::NotFound(id))?;
            if alert.status != AlertStatus::Open {
                return Err(AlertError::InvalidTransition {
                    id,
                    status: format!("{:?}", alert.status).to_lowercase(),
                });
            }
            alert.status = AlertStatus::Acknowledged;
            alert.acknowledged_at = Some(now);
            alert.acknowledged_by = Some(by.to_string());
            alert.clone()
        };
        self.confirm_run(id);
        Ok(updated)
    }

    pub fn resolve_alert(
        &self,
        id: Uuid,
        by: &str,
        now: DateTime<Utc>,
    ) -> Result<Alert, AlertError> {
        let updated = {
            let mut alerts = self.alerts_mut();
            let alert = alerts
                .iter_mut()
                .find(|alert| alert.id == id)
                .ok_or(AlertError::NotFound(id))?;
            if alert.status == AlertStatus::Resolved {
                return Err(AlertError::InvalidTransition {
                    id,
                    status: "resolved".to_string(),
                });
            }
            alert.status = AlertStatus::Resolved;
            alert.resolved_at = Some(now);
            alert.resolved_by = Some(by.to_string());
            alert.clone()
        };
        self.confirm_run(id);
        Ok(updated)
    }

    pub fn assign_alert(
        &self,
        id: Uuid,
        assignee: Option<String>,
    ) -> Result<Alert, AlertError> {
        let mut alerts = self.alerts_mut();
        let alert = alerts
            .iter_mut()
            .find(|alert| alert.id == id)
            .ok_or(AlertError::NotFound(id))?;
        if alert.status == AlertStatus::Resolved {
            return Err(AlertError::InvalidTransition {
                id,
                status: "resolved".to_string(),
            });
        }
        alert.assigned_to = assignee;
        Ok(alert.clone())
    }

    /// An acknowledged or resolved alert confirms the run that raised it,
    /// feeding the rolling success rate.
    fn confirm_run(&self, alert_id: Uuid) {
        let Some(workflow_id) = self.alert_workflows_read().get(&alert_id).copied() else {
            return;
        };
        let mut workflows = self.workflows_mut();
        let Some(state) = workflows.get_mut(&workflow_id) else {
            return;
        };
        for run in state.runs.iter_mut() {
            if run.outcome == RunOutcome::Pending && run.alert_ids.contains(&alert_id) {
                run.outcome = RunOutcome::Confirmed;
                break;
            }
        }
    }

    fn workflows_read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<Uuid, WorkflowState>> {
        self.workflows
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn workflows_mut(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<Uuid, WorkflowState>> {
        self.workflows
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn alerts_read(&self) -> std::sync::RwLockReadGuard<'_, Vec<Alert>> {
        self.alerts
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn alerts_mut(&self) -> std::sync::RwLockWriteGuard<'_, Vec<Alert>> {
        self.alerts
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn alert_workflows_read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<Uuid, Uuid>> {
        self.alert_workflows
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn alert_workflows_mut(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<Uuid, Uuid>> {
        self.alert_workflows
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Builds the evaluation snapshot the rule pass runs against: latest
/// signal snapshots, latest published predictions, and the key that makes
/// re-evaluation idempotent.
pub fn build_eval_snapshot(
    aggregator: &StatsAggregator,
    predictions: &SnapshotCell<PredictionSnapshot>,
) -> EvalSnapshot {
    let version = aggregator.version().current();
    let published = predictions.load();
    EvalSnapshot {
        key: (version, published.computed_at),
        signals: aggregator.snapshots(),
        predictions: published
            .predictions
            .iter()
            .map(|prediction| (prediction.signal_id.clone(), prediction.clone()))
            .collect(),
    }
}

/// Periodic evaluation driver. Snapshot-based: each tick reads the latest
/// committed aggregator/prediction state and never blocks them.
pub struct RuleEngineService {
    engine: Arc<RuleEngine>,
    aggregator: Arc<StatsAggregator>,
    predictions: Arc<SnapshotCell<PredictionSnapshot>>,
    config: EngineConfig,
}

impl RuleEngineService {
    pub fn new(
        engine: Arc<RuleEngine>,
        aggregator: Arc<StatsAggregator>,
        predictions: Arc<SnapshotCell<PredictionSnapshot>>,
        config: EngineConfig,
    ) -> Self {
        Self {
            engine,
            aggregator,
            predictions,
            config,
        }
    }

    pub fn start(self, cancel: CancellationToken) {
        let interval = self.config.rules_interval();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let snapshot = build_eval_snapshot(&self.aggregator, &self.predictions);
                        self.engine.evaluate(&snapshot, Utc::now());
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, Priority, Severity, SignalMetrics, Trend};
    use chrono::Duration as ChronoDuration;
    use types::{CompareOp, Condition, MetricField};

    fn signal(strength: f64, confidence: f64) -> SignalSnapshot {
        SignalSnapshot {
            id: "api-rate-limit".to_string(),
            name: "API Rate Limiting Complaints".to_string(),
            source: "Reddit".to_string(),
            category: Category::Technical,
            sample_count: 40,
            last_observed_at: None,
            metrics: Some(SignalMetrics {
                strength,
                velocity: 3.0,
                confidence,
                trend: Trend::Rising,
                sentiment: -0.7,
            }),
        }
    }

    fn snapshot(key: u64, strength: f64, confidence: f64) -> EvalSnapshot {
        EvalSnapshot {
            key: (key, None),
            signals: vec![signal(strength, confidence)],
            predictions: HashMap::new(),
        }
    }

    fn escalation_definition() -> WorkflowDefinition {
        WorkflowDefinition {
            name: "Critical Signal Escalation".to_string(),
            description: "Escalate strong, confident signals".to_string(),
            conditions: vec![
                Condition::Metric {
                    field: MetricField::Strength,
                    op: CompareOp::Gt,
                    value: 80.0,
                },
                Condition::Metric {
                    field: MetricField::Confidence,
                    op: CompareOp::Gt,
                    value: 85.0,
                },
            ],
            actions: vec![
                Action::Alert {
                    severity: Severity::Critical,
                    priority: Priority::P0,
                    action_required: true,
                    assign_to: Some("PM Team".to_string()),
                },
                Action::Escalate {
                    team: "engineering".to_string(),
                },
            ],
        }
    }

    fn engine() -> RuleEngine {
        RuleEngine::new(EngineConfig::default())
    }

    #[test]
    fn rejects_invalid_definitions_at_configuration_time() {
        let engine = engine();
        let mut definition = escalation_definition();
        definition.conditions.clear();
        let err = engine
            .create_workflow(definition, Utc::now())
            .unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidDefinition(_)));
        assert!(engine.workflows().is_empty());
    }

    #[test]
    fn does_not_fire_when_only_one_condition_holds() {
        let engine = engine();
        engine
            .create_workflow(escalation_definition(), Utc::now())
            .unwrap();

        // strength > 80 holds, confidence > 85 does not.
        let fires = engine.evaluate(&snapshot(1, 85.0, 70.0), Utc::now());
        assert_eq!(fires, 0);
        assert!(engine.alerts().is_empty());
    }

    #[test]
    fn fires_exactly_once_per_rising_edge() {
        let engine = engine();
        engine
            .create_workflow(escalation_definition(), Utc::now())
            .unwrap();
        let now = Utc::now();

        assert_eq!(engine.evaluate(&snapshot(1, 85.0, 92.0), now), 1);
        // Condition still true on the next cycles: level, not edge.
        assert_eq!(engine.evaluate(&snapshot(2, 86.0, 92.0), now), 0);
        assert_eq!(engine.evaluate(&snapshot(3, 87.0, 93.0), now), 0);
        // Falls below threshold, then recovers: a new edge.
        assert_eq!(engine.evaluate(&snapshot(4, 60.0, 92.0), now), 0);
        assert_eq!(engine.evaluate(&snapshot(5, 88.0, 92.0), now), 1);

        assert_eq!(engine.alerts().len(), 2);
    }

    #[test]
    fn evaluating_the_same_snapshot_key_twice_is_idempotent() {
        let engine = engine();
        engine
            .create_workflow(escalation_definition(), Utc::now())
            .unwrap();
        let now = Utc::now();

        let snap = snapshot(7, 85.0, 92.0);
        assert_eq!(engine.evaluate(&snap, now), 1);
        assert_eq!(engine.evaluate(&snap, now), 0);
        assert_eq!(engine.alerts().len(), 1);
    }

    #[test]
    fn elapsed_cooldown_rearms_a_still_true_condition() {
        let engine = engine();
        engine
            .create_workflow(escalation_definition(), Utc::now())
            .unwrap();
        let start = Utc::now();

        assert_eq!(engine.evaluate(&snapshot(1, 85.0, 92.0), start), 1);
        // Still true within the cooldown window: suppressed.
        assert_eq!(
            engine.evaluate(
                &snapshot(2, 85.0, 92.0),
                start + ChronoDuration::minutes(10)
            ),
            0
        );
        // Still true after the cooldown: re-armed.
        assert_eq!(
            engine.evaluate(&snapshot(3, 85.0, 92.0), start + ChronoDuration::hours(2)),
            1
        );
    }

    #[test]
    fn paused_workflows_are_skipped_and_resume_retains_state() {
        let engine = engine();
        let info = engine
            .create_workflow(escalation_definition(), Utc::now())
            .unwrap();
        let now = Utc::now();

        assert_eq!(engine.evaluate(&snapshot(1, 85.0, 92.0), now), 1);
        engine
            .set_status(info.id, WorkflowStatus::Paused, now)
            .unwrap();
        assert_eq!(engine.evaluate(&snapshot(2, 90.0, 95.0), now), 0);

        // Resuming does not re-fire: the signal never stopped passing.
        engine
            .set_status(info.id, WorkflowStatus::Active, now)
            .unwrap();
        assert_eq!(engine.evaluate(&snapshot(3, 90.0, 95.0), now), 0);
    }

    #[test]
    fn acknowledged_alerts_confirm_runs_and_drive_success_rate() {
        let engine = engine();
        let info = engine
            .create_workflow(escalation_definition(), Utc::now())
            .unwrap();
        let now = Utc::now();

        assert_eq!(engine.evaluate(&snapshot(1, 85.0, 92.0), now), 1);
        let alert = engine.alerts().pop().unwrap();
        assert_eq!(alert.status, AlertStatus::Open);
        assert_eq!(alert.assigned_to.as_deref(), Some("PM Team"));

        engine
            .acknowledge_alert(alert.id, "oncall", now)
            .unwrap();
        let rate = engine.workflow(info.id).unwrap().success_rate.unwrap();
        assert!((rate - 100.0).abs() < 1e-9);

        // A second, unconfirmed fire halves the rate.
        assert_eq!(engine.evaluate(&snapshot(2, 40.0, 92.0), now), 0);
        assert_eq!(engine.evaluate(&snapshot(3, 85.0, 92.0), now), 1);
        let rate = engine.workflow(info.id).unwrap().success_rate.unwrap();
        assert!((rate - 50.0).abs() < 1e-9);
    }

    #[test]
    fn alert_lifecycle_transitions_are_guarded_and_attributed() {
        let engine = engine();
        engine
            .create_workflow(escalation_definition(), Utc::now())
            .unwrap();
        let now = Utc::now();
        engine.evaluate(&snapshot(1, 85.0, 92.0), now);
        let alert = engine.alerts().pop().unwrap();

        let acked = engine.acknowledge_alert(alert.id, "oncall", now).unwrap();
        assert_eq!(acked.acknowledged_by.as_deref(), Some("oncall"));
        assert!(matches!(
            engine.acknowledge_alert(alert.id, "oncall", now),
            Err(AlertError::InvalidTransition { .. })
        ));

        let resolved = engine.resolve_alert(alert.id, "oncall", now).unwrap();
        assert_eq!(resolved.status, AlertStatus::Resolved);
        assert!(matches!(
            engine.assign_alert(alert.id, Some("anyone".to_string())),
            Err(AlertError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn automation_actions_are_recorded_in_run_history() {
        let engine = engine();
        let info = engine
            .create_workflow(escalation_definition(), Utc::now())
            .unwrap();
        let now = Utc::now();
        engine.evaluate(&snapshot(1, 85.0, 92.0), now);

        let runs = engine.workflow_runs(info.id).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].actions.len(), 2);
        assert_eq!(runs[0].alert_ids.len(), 1);
        assert_eq!(runs[0].outcome, RunOutcome::Pending);

        let listed = engine.workflow(info.id).unwrap();
        assert_eq!(listed.trigger_count, 1);
        assert_eq!(listed.action_count, 2);
    }
}
