use anyhow::{Context, Result};
use clap::Parser;
use signal_engine::correlation::CorrelationService;
use signal_engine::predictor::PredictiveService;
use signal_engine::rules::RuleEngineService;
use signal_engine::{cli, config, openapi, routes, state};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

async fn bind_listener(addr: &str) -> Result<TcpListener> {
    match TcpListener::bind(addr).await {
        Ok(listener) => Ok(listener),
        Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
            anyhow::bail!(
                "Failed to bind signal-engine listener on {addr}: port already in use. Stop the other service or re-run with --port.",
            );
        }
        Err(err) => {
            Err(err).with_context(|| format!("failed to bind signal-engine listener on {addr}"))
        }
    }
}

async fn shutdown_signal(cancel: CancellationToken) {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
    cancel.cancel();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Args::parse();
    if args.print_openapi {
        println!("{}", serde_json::to_string_pretty(&openapi::document())?);
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = config::EngineConfig::from_env();
    let (state, _ingest_worker) = state::AppState::build(config.clone());

    let cancel = CancellationToken::new();
    CorrelationService::new(
        state.store.clone(),
        state.correlations.clone(),
        config.clone(),
    )
    .start(cancel.clone());
    PredictiveService::new(
        state.store.clone(),
        state.aggregator.clone(),
        state.correlations.clone(),
        state.predictions.clone(),
        config.clone(),
    )
    .start(cancel.clone());
    RuleEngineService::new(
        state.rules.clone(),
        state.aggregator.clone(),
        state.predictions.clone(),
        config.clone(),
    )
    .start(cancel.clone());

    let app = routes::router(state).layer(CorsLayer::permissive());
    let addr = format!("{}:{}", args.host, args.port);
    let listener = bind_listener(&addr).await?;
    tracing::info!(%addr, "signal-engine listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel))
        .await
        .context("server exited")?;

    Ok(())
}
