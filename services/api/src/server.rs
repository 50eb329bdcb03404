use crate::cli::ServeArgs;
use crate::infra::{AppState, InProcessPlatform};
use crate::routes::with_portal_routes;
use crate::seed::{render_seed_report, seed_platform, SeedArgs};
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use grant_portal::config::AppConfig;
use grant_portal::error::AppError;
use grant_portal::portal::PortalServices;
use grant_portal::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let in_process = InProcessPlatform::default();
    let platform = in_process.platform();
    if args.seed_test_accounts {
        let report = seed_platform(&platform, &SeedArgs::default()).await?;
        info!(summary = %render_seed_report(&report).trim_end(), "test environment ready");
    }

    let services = PortalServices::new(platform, config.portal.clone());
    let app = with_portal_routes(services)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        upload_prefix = %config.portal.upload_prefix,
        "grant portal ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
