use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use std::time::Instant;

use super::tenant::ValidatedTenant;
use crate::error::ErrorDetail;
use crate::monitoring::Severity;
use crate::state::AppState;

/// Feeds every request into the monitor; 5xx responses also become tracked errors.
/// Requests served for a tenant are tagged with it via the response extensions.
pub async fn request_metrics_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let method = request.method().to_string();
    let started = Instant::now();

    let response = next.run(request).await;
    let status = response.status();
    let tenant = response.extensions().get::<ValidatedTenant>().map(|t| t.name.clone());

    state
        .monitor
        .record_request(&route, &method, status.as_u16(), started.elapsed(), tenant.as_deref());

    if status.is_server_error() {
        let (code, message) = match response.extensions().get::<ErrorDetail>() {
            Some(detail) => (detail.code, detail.message.clone()),
            None => ("INTERNAL_SERVER_ERROR", status.to_string()),
        };
        let severity = if status.as_u16() == 503 { Severity::Critical } else { Severity::Error };
        state.monitor.track_error(&message, code, Some(&route), tenant.as_deref(), severity);

        for alert in state.monitor.evaluate_alerts(Utc::now()) {
            tracing::warn!("Alert raised: {}", alert.message);
        }
    }

    response
}
