//! Employee Attrition Dashboard Server
//!
//! Loads the trained classifier, its feature schema and the HR dataset once,
//! then serves predictions, explanations and population comparisons over
//! HTTP until SIGINT or SIGTERM.

use std::future::IntoFuture;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use attrition_core::{AttritionClassifier, DashboardConfig, LoggingConfig};
use attrition_dashboard::config::load_config;
use attrition_dashboard::shutdown::{shutdown_signal, ShutdownCoordinator};
use attrition_dashboard::{build_router, AppState, AttritionPipeline, Metrics, PopulationDataset};
use attrition_model::{load_schema, XgbAttritionClassifier};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration: from CLI arg, env var, or default
    let config = load_dashboard_config()?;
    init_tracing(&config.logging);

    info!(
        listen_addr = %config.listen_addr,
        model_path = %config.model_path,
        "Starting attrition dashboard"
    );

    let listen_addr = config.listen_addr.clone();
    let timeout_seconds = config.shutdown.timeout_seconds;

    let state = build_app_state(config)?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    info!(%listen_addr, "Dashboard listening");

    let coordinator = ShutdownCoordinator::new(timeout_seconds);
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(coordinator.clone()))
        .into_future();

    tokio::select! {
        result = server => result?,
        _ = coordinator.drain_deadline() => {}
    }

    info!("Dashboard stopped");
    Ok(())
}

/// Load dashboard configuration from a YAML file or fall back to defaults.
///
/// Checks (in order):
/// 1. First CLI argument as config path
/// 2. `ATTRITION_CONFIG` environment variable
/// 3. Default configuration
fn load_dashboard_config() -> anyhow::Result<DashboardConfig> {
    let config_path: Option<PathBuf> = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("ATTRITION_CONFIG").ok())
        .map(PathBuf::from);

    match config_path {
        Some(path) => load_config(&path),
        None => Ok(DashboardConfig::default()),
    }
}

/// `RUST_LOG` wins over the configured level.
fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Load the model, schema and dataset into the shared [`AppState`].
fn build_app_state(config: DashboardConfig) -> anyhow::Result<Arc<AppState>> {
    let schema = load_schema(Path::new(&config.schema_path))?;
    let classifier = XgbAttritionClassifier::load(Path::new(&config.model_path), schema.clone())?;
    info!(
        classifier = classifier.name(),
        trees = classifier.num_trees(),
        features = classifier.num_features(),
        "Classifier ready"
    );

    let dataset = PopulationDataset::load(Path::new(&config.dataset_path))?;
    let pipeline = AttritionPipeline::new(
        schema,
        Arc::new(classifier),
        config.prediction.clone(),
        config.explanation.clone(),
    )?;

    Ok(Arc::new(AppState {
        config,
        pipeline,
        dataset,
        metrics: Metrics::new(),
    }))
}
