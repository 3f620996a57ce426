use axum::extract::{Query, State};
use chrono::Utc;

use crate::handlers::admin::dashboard::{monitoring_window, MonitoringParams, MonitoringReport};
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

/// GET /api/root/monitoring: process-wide view across every tenant
pub async fn monitoring(State(state): State<AppState>, Query(params): Query<MonitoringParams>) -> ApiResult<MonitoringReport> {
    let window = monitoring_window(&params)?;
    let monitor = &state.monitor;
    monitor.evaluate_alerts(Utc::now());

    Ok(ApiResponse::success(MonitoringReport {
        summary: monitor.summary(window),
        recent_errors: monitor.recent_errors(20),
        alerts: monitor.recent_alerts(10),
    }))
}
