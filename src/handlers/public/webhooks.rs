use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::ApiError;
use crate::middleware::tenant::resolve_tenant_by_name;
use crate::middleware::{ApiResponse, ApiResult};
use crate::payments::WebhookEventKind;
use crate::services::fulfillment::{self, WebhookOutcome};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    pub outcome: &'static str,
}

/// POST /api/webhooks/:provider
pub async fn receive(
    State(state): State<AppState>,
    Path(provider_name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<WebhookAck> {
    let provider = state.payments.get(&provider_name)?;
    let event = provider.parse_webhook(&headers, &body)?;

    tracing::info!("{} webhook {} ({})", provider.name(), event.id, event.event_type);

    if event.kind == WebhookEventKind::Ignored {
        record_outcome(&state, provider.name(), WebhookOutcome::Ignored);
        return Ok(ApiResponse::success(WebhookAck {
            received: true,
            outcome: WebhookOutcome::Ignored.as_str(),
        }));
    }

    let tenant_name = event
        .tenant
        .as_deref()
        .ok_or_else(|| ApiError::bad_request("Webhook payload does not name a tenant"))?;
    let (_, pool) = resolve_tenant_by_name(tenant_name).await?;

    let outcome = fulfillment::process_webhook_event(&state, &pool, provider.name(), &event).await?;
    record_outcome(&state, provider.name(), outcome);
    Ok(ApiResponse::success(WebhookAck {
        received: true,
        outcome: outcome.as_str(),
    }))
}

fn record_outcome(state: &AppState, provider: &str, outcome: WebhookOutcome) {
    let tags = BTreeMap::from([
        ("provider".to_string(), provider.to_string()),
        ("outcome".to_string(), outcome.as_str().to_string()),
    ]);
    state.monitor.record_metric("webhook.received", 1.0, tags);
}
