use crate::cli::ServeArgs;
use crate::infra::{assemble, seed_sample_notices, AppState};
use crate::routes::with_stage_change_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use notice_stage::config::AppConfig;
use notice_stage::error::AppError;
use notice_stage::telemetry;
use notice_stage::workflows::stage_change::{
    Clock, LogNotificationSender, StageChangeError, SystemClock,
};
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
    if let Some(report_dir) = args.report_dir.take() {
        config.stage_change.report_dir = report_dir;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let sender = Arc::new(LogNotificationSender::new(
        config.stage_change.notify_recipients.clone(),
        config.stage_change.notify_subject_prefix.clone(),
    ));
    let assembled = assemble(&config.stage_change, sender, clock.clone());
    if args.seed_samples {
        seed_sample_notices(&assembled.stores, clock.now()).map_err(StageChangeError::from)?;
        info!("sample notices seeded");
    }
    tokio::spawn(assembled.worker.run());

    let app = with_stage_change_routes(assembled.service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        report_dir = %config.stage_change.report_dir.display(),
        "notice stage service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
