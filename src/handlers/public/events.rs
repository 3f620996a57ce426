use axum::extract::{Path, Query};
use axum::Extension;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use super::super::common::{all_of, parse_bool, search_clause, PageParams};
use crate::database::models::Event;
use crate::database::{Page, Repository};
use crate::error::ApiError;
use crate::filter::FilterData;
use crate::middleware::{ApiResponse, ApiResult, TenantPool};

#[derive(Debug, Default, Deserialize)]
pub struct EventListParams {
    pub upcoming: Option<String>,
    pub search: Option<String>,
    #[serde(flatten)]
    pub page: PageParams,
}

#[derive(Debug, Serialize)]
pub struct EventSummary {
    #[serde(flatten)]
    pub event: Event,
    pub registered_count: i64,
    pub seats_remaining: Option<i64>,
}

impl EventSummary {
    pub fn new(event: Event, registered_count: i64) -> Self {
        let seats_remaining = event.seats_remaining(registered_count);
        Self {
            event,
            registered_count,
            seats_remaining,
        }
    }
}

impl EventListParams {
    pub fn to_filter(&self) -> Result<FilterData, ApiError> {
        let mut conditions = vec![json!({ "status": "published" })];
        let upcoming = parse_bool("upcoming", self.upcoming.as_deref())?.unwrap_or(true);

        if upcoming {
            conditions.push(json!({ "starts_at": { "$gt": Utc::now().to_rfc3339() } }));
        }
        if let Some(term) = self.search.as_deref().filter(|s| !s.trim().is_empty()) {
            conditions.push(search_clause(term, &["title", "description", "location"]));
        }

        Ok(FilterData {
            where_clause: Some(all_of(conditions)),
            order: Some(json!(if upcoming { "starts_at asc" } else { "starts_at desc" })),
            ..Default::default()
        })
    }
}

pub async fn registration_counts(pool: &PgPool, event_ids: &[Uuid]) -> Result<HashMap<Uuid, i64>, ApiError> {
    if event_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows: Vec<(Uuid, i64)> = sqlx::query_as(
        "SELECT event_id, COUNT(*) FROM event_registrations \
         WHERE event_id = ANY($1) AND status = 'registered' GROUP BY event_id",
    )
    .bind(event_ids)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().collect())
}

/// GET /api/events
pub async fn list(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Query(params): Query<EventListParams>,
) -> ApiResult<Page<EventSummary>> {
    let (page, limit) = params.page.resolve()?;
    let events = Repository::<Event>::new("events", pool.clone())
        .paginate(params.to_filter()?, page, limit)
        .await?;

    let ids: Vec<Uuid> = events.items.iter().map(|e| e.id).collect();
    let counts = registration_counts(&pool, &ids).await?;

    Ok(ApiResponse::success(events.map(|event| {
        let registered = counts.get(&event.id).copied().unwrap_or(0);
        EventSummary::new(event, registered)
    })))
}

/// GET /api/events/:slug
pub async fn show(Extension(TenantPool(pool)): Extension<TenantPool>, Path(slug): Path<String>) -> ApiResult<EventSummary> {
    let event = Repository::<Event>::new("events", pool.clone())
        .select_one(FilterData::with_where(json!({ "slug": slug, "status": "published" })))
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Event '{}' not found", slug)))?;

    let registered = registration_counts(&pool, &[event.id]).await?.get(&event.id).copied().unwrap_or(0);
    Ok(ApiResponse::success(EventSummary::new(event, registered)))
}
