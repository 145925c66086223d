use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "signal-engine",
        description = "Signal intelligence engine read/configuration API"
    ),
    paths(
        crate::routes::health::healthz_handler,
        crate::routes::signals::list_signals,
        crate::routes::signals::get_signal,
        crate::routes::signals::register_signal,
        crate::routes::observations::submit_observation,
        crate::routes::alerts::list_alerts,
        crate::routes::alerts::acknowledge_alert,
        crate::routes::alerts::resolve_alert,
        crate::routes::alerts::assign_alert,
        crate::routes::correlations::correlation_matrix,
        crate::routes::predictions::list_predictions,
        crate::routes::predictions::risk_list,
        crate::routes::workflows::list_workflows,
        crate::routes::workflows::create_workflow,
        crate::routes::workflows::update_workflow,
        crate::routes::workflows::pause_workflow,
        crate::routes::workflows::resume_workflow,
        crate::routes::workflows::workflow_runs,
        crate::routes::overview::overview,
        crate::routes::overview::sources,
        crate::routes::overview::sentiment,
    ),
    components(schemas(
        crate::model::Category,
        crate::model::Severity,
        crate::model::Trend,
        crate::model::ImpactTier,
        crate::model::Priority,
        crate::model::AlertStatus,
        crate::model::WorkflowStatus,
        crate::model::Observation,
        crate::model::SignalDescriptor,
        crate::model::SignalMetrics,
        crate::model::SignalSnapshot,
        crate::model::CorrelationLabel,
        crate::model::CorrelationEdge,
        crate::model::TimeToSpike,
        crate::model::Prediction,
        crate::model::Alert,
        crate::aggregator::SourceStatus,
        crate::aggregator::SourceHealth,
        crate::correlation::CorrelationSnapshot,
        crate::predictor::PredictionSnapshot,
        crate::query::CorrelationMatrixView,
        crate::query::RiskEntry,
        crate::query::OverviewSummary,
        crate::query::SentimentSummary,
        crate::query::SignalDetail,
        crate::rules::types::MetricField,
        crate::rules::types::CompareOp,
        crate::rules::types::Condition,
        crate::rules::types::Action,
        crate::rules::types::WorkflowDefinition,
        crate::rules::RunOutcome,
        crate::rules::WorkflowRun,
        crate::rules::WorkflowInfo,
        crate::routes::health::HealthResponse,
        crate::routes::observations::IngestAccepted,
        crate::routes::alerts::ActorBody,
        crate::routes::alerts::AssignBody,
    ))
)]
pub struct ApiDoc;

pub fn document() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_the_read_api_paths() {
        let doc = document();
        let paths = &doc.paths.paths;
        assert!(paths.contains_key("/healthz"));
        assert!(paths.contains_key("/api/signals"));
        assert!(paths.contains_key("/api/observations"));
        assert!(paths.contains_key("/api/correlations"));
        assert!(paths.contains_key("/api/workflows"));
    }
}
