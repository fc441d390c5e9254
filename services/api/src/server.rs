use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use admit_match::config::AppConfig;
use admit_match::error::AppError;
use admit_match::matching::{build_scorer, MatchingService};
use admit_match::telemetry;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use tracing::info;

use crate::cli::ServeArgs;
use crate::infra::{load_catalog, AppState, InMemoryAssessmentRepository};
use crate::routes::with_matching_routes;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(path) = args.catalog_csv.take() {
        config.catalog.csv_path = Some(path);
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let catalog = Arc::new(load_catalog(&config.catalog)?);
    let repository = Arc::new(InMemoryAssessmentRepository::default());
    let scorer = build_scorer(&config.scoring);
    let backend = scorer.backend();
    let matching_service = Arc::new(MatchingService::new(catalog, repository, scorer));

    let app = with_matching_routes(matching_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        backend,
        seeded = config.scoring.seed.is_some(),
        "assessment service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
