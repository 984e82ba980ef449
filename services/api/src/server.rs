use crate::cli::ServeArgs;
use crate::infra::{AppState, LogCompletionGate, LogFileStorage};
use crate::routes::with_workbook_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;
use workbook::config::AppConfig;
use workbook::error::AppError;
use workbook::router::WorkbookServices;
use workbook::store::InMemoryStore;
use workbook::telemetry;
use workbook::types::ItemTypeRegistry;

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

    let store = Arc::new(InMemoryStore::new());
    let files = Arc::new(LogFileStorage);
    let gate = Arc::new(LogCompletionGate);
    let registry = Arc::new(ItemTypeRegistry::with_builtins());
    let services = Arc::new(WorkbookServices::new(store, files, gate, registry));

    let app = with_workbook_routes(services)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "evaluation workbook service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
