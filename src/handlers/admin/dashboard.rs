use axum::extract::{Query, State};
use axum::Extension;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use super::super::common::parse_opt;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, TenantPool, ValidatedTenant};
use crate::monitoring::{Alert, MonitoringSummary, TrackedError};
use crate::services::stats::{self, AdminStats};
use crate::state::AppState;

const MAX_WINDOW_MINUTES: i64 = 24 * 60;

#[derive(Debug, Default, Deserialize)]
pub struct MonitoringParams {
    pub window_minutes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MonitoringReport {
    pub summary: MonitoringSummary,
    pub recent_errors: Vec<TrackedError>,
    pub alerts: Vec<Alert>,
}

/// GET /api/admin/stats
pub async fn stats(Extension(TenantPool(pool)): Extension<TenantPool>) -> ApiResult<AdminStats> {
    Ok(ApiResponse::success(stats::admin_stats(&pool).await?))
}

/// Validated `window_minutes`, defaulting to an hour
pub fn monitoring_window(params: &MonitoringParams) -> Result<Duration, ApiError> {
    let minutes = parse_opt::<i64>("window_minutes", params.window_minutes.as_deref())?.unwrap_or(60);
    if !(1..=MAX_WINDOW_MINUTES).contains(&minutes) {
        return Err(ApiError::bad_request(format!(
            "window_minutes must be between 1 and {}",
            MAX_WINDOW_MINUTES
        )));
    }
    Ok(Duration::minutes(minutes))
}

/// GET /api/admin/monitoring: the caller's tenant only
pub async fn monitoring(
    State(state): State<AppState>,
    Extension(tenant): Extension<ValidatedTenant>,
    Query(params): Query<MonitoringParams>,
) -> ApiResult<MonitoringReport> {
    let window = monitoring_window(&params)?;
    let monitor = &state.monitor;

    Ok(ApiResponse::success(MonitoringReport {
        summary: monitor.tenant_summary(&tenant.name, window),
        recent_errors: monitor.tenant_errors(&tenant.name, 20),
        alerts: monitor.tenant_alerts(&tenant.name, Utc::now()),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(value: Option<&str>) -> MonitoringParams {
        MonitoringParams {
            window_minutes: value.map(str::to_string),
        }
    }

    #[test]
    fn window_bounds() {
        assert_eq!(monitoring_window(&params(None)).unwrap(), Duration::minutes(60));
        assert_eq!(monitoring_window(&params(Some("1440"))).unwrap(), Duration::minutes(1440));
        assert!(monitoring_window(&params(Some("0"))).is_err());
        assert!(monitoring_window(&params(Some("1441"))).is_err());
        assert!(monitoring_window(&params(Some("soon"))).is_err());
    }
}
