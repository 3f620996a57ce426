use axum::extract::Path;
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use super::super::common::ensure_slug_available;
use crate::config;
use crate::database::models::{Event, EventRegistration, PUBLISH_STATUSES};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, TenantPool};
use crate::validation::{slugify, ValidationErrors, MAX_TITLE_LEN};

#[derive(Debug, Default, Deserialize)]
pub struct EventInput {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub is_online: Option<bool>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub capacity: Option<i32>,
    pub price: Option<Decimal>,
    pub currency: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EventFields {
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub is_online: bool,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub capacity: Option<i32>,
    pub price: Decimal,
    pub currency: String,
    pub status: String,
}

impl EventFields {
    pub fn for_create(input: EventInput) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let title = input.title.unwrap_or_default();
        let now = Utc::now();
        if input.starts_at.is_none() {
            errors.add("starts_at", "This field is required");
        }
        if input.ends_at.is_none() {
            errors.add("ends_at", "This field is required");
        }

        Self {
            slug: input.slug.unwrap_or_else(|| slugify(&title)),
            title: title.trim().to_string(),
            description: input.description,
            location: input.location,
            is_online: input.is_online.unwrap_or(false),
            starts_at: input.starts_at.unwrap_or(now),
            ends_at: input.ends_at.unwrap_or(now),
            capacity: input.capacity,
            price: input.price.unwrap_or(Decimal::ZERO),
            currency: input
                .currency
                .unwrap_or_else(|| config::config().payments.default_currency.clone()),
            status: input.status.unwrap_or_else(|| "draft".to_string()),
        }
        .validate(errors)
    }

    pub fn for_update(event: &Event, input: EventInput) -> Result<Self, ValidationErrors> {
        Self {
            title: input.title.map(|t| t.trim().to_string()).unwrap_or_else(|| event.title.clone()),
            slug: input.slug.unwrap_or_else(|| event.slug.clone()),
            description: input.description.or_else(|| event.description.clone()),
            location: input.location.or_else(|| event.location.clone()),
            is_online: input.is_online.unwrap_or(event.is_online),
            starts_at: input.starts_at.unwrap_or(event.starts_at),
            ends_at: input.ends_at.unwrap_or(event.ends_at),
            capacity: input.capacity.or(event.capacity),
            price: input.price.unwrap_or(event.price),
            currency: input.currency.unwrap_or_else(|| event.currency.clone()),
            status: input.status.unwrap_or_else(|| event.status.clone()),
        }
        .validate(ValidationErrors::new())
    }

    fn validate(self, mut errors: ValidationErrors) -> Result<Self, ValidationErrors> {
        errors.require_text("title", &self.title, MAX_TITLE_LEN);
        errors.slug("slug", &self.slug);
        errors.price("price", self.price);
        errors.currency("currency", &self.currency);
        errors.one_of("status", &self.status, PUBLISH_STATUSES);
        if self.ends_at <= self.starts_at {
            errors.add("ends_at", "End time must be after the start time");
        }
        if matches!(self.capacity, Some(c) if c <= 0) {
            errors.add("capacity", "Capacity must be positive");
        }
        if !self.is_online && self.location.as_deref().map_or(true, |l| l.trim().is_empty()) {
            errors.add("location", "In-person events need a location");
        }
        errors.finish().map(|_| self)
    }
}

async fn find_event(pool: &PgPool, id: Uuid) -> Result<Event, ApiError> {
    sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1 AND deleted_at IS NULL")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Event not found"))
}

/// POST /api/admin/events
pub async fn create(Extension(TenantPool(pool)): Extension<TenantPool>, Json(input): Json<EventInput>) -> ApiResult<Event> {
    let fields = EventFields::for_create(input)?;
    ensure_slug_available(&pool, "events", &fields.slug, None).await?;

    let event = sqlx::query_as::<_, Event>(
        "INSERT INTO events (id, slug, title, description, location, is_online, starts_at, ends_at, capacity, \
         price, currency, status) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(&fields.slug)
    .bind(&fields.title)
    .bind(&fields.description)
    .bind(&fields.location)
    .bind(fields.is_online)
    .bind(fields.starts_at)
    .bind(fields.ends_at)
    .bind(fields.capacity)
    .bind(fields.price)
    .bind(&fields.currency)
    .bind(&fields.status)
    .fetch_one(&pool)
    .await?;

    Ok(ApiResponse::created(event))
}

/// PUT /api/admin/events/:id
pub async fn update(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<Uuid>,
    Json(input): Json<EventInput>,
) -> ApiResult<Event> {
    let event = find_event(&pool, id).await?;
    let fields = EventFields::for_update(&event, input)?;
    if fields.slug != event.slug {
        ensure_slug_available(&pool, "events", &fields.slug, Some(event.id)).await?;
    }

    let registered: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM event_registrations WHERE event_id = $1 AND status = 'registered'")
            .bind(event.id)
            .fetch_one(&pool)
            .await?;
    if matches!(fields.capacity, Some(c) if i64::from(c) < registered) {
        return Err(ApiError::conflict(format!(
            "Capacity cannot be lower than the {} existing registrations",
            registered
        )));
    }

    let event = sqlx::query_as::<_, Event>(
        "UPDATE events SET slug = $2, title = $3, description = $4, location = $5, is_online = $6, \
         starts_at = $7, ends_at = $8, capacity = $9, price = $10, currency = $11, status = $12, updated_at = NOW() \
         WHERE id = $1 RETURNING *",
    )
    .bind(event.id)
    .bind(&fields.slug)
    .bind(&fields.title)
    .bind(&fields.description)
    .bind(&fields.location)
    .bind(fields.is_online)
    .bind(fields.starts_at)
    .bind(fields.ends_at)
    .bind(fields.capacity)
    .bind(fields.price)
    .bind(&fields.currency)
    .bind(&fields.status)
    .fetch_one(&pool)
    .await?;

    Ok(ApiResponse::success(event))
}

/// DELETE /api/admin/events/:id (soft delete)
pub async fn delete(Extension(TenantPool(pool)): Extension<TenantPool>, Path(id): Path<Uuid>) -> ApiResult<Event> {
    let event = sqlx::query_as::<_, Event>(
        "UPDATE events SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL RETURNING *",
    )
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| ApiError::not_found("Event not found"))?;

    Ok(ApiResponse::success(event))
}

/// GET /api/admin/events/:id/registrations
pub async fn registrations(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<EventRegistration>> {
    let event = find_event(&pool, id).await?;
    let registrations = sqlx::query_as::<_, EventRegistration>(
        "SELECT * FROM event_registrations WHERE event_id = $1 ORDER BY created_at",
    )
    .bind(event.id)
    .fetch_all(&pool)
    .await?;

    Ok(ApiResponse::success(registrations))
}
