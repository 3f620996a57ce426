use axum::extract::{Path, State};
use axum::{Extension, Json};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::config;
use crate::database::models::{Event, EventRegistration};
use crate::email::templates;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, TenantPool};
use crate::state::AppState;
use crate::validation::{is_valid_email, normalize_email, ValidationErrors};

#[derive(Debug, Default, Deserialize)]
pub struct RegistrationInput {
    pub attendee_name: Option<String>,
    pub attendee_email: Option<String>,
}

impl RegistrationInput {
    /// Attendee details default to the account holder
    fn resolve(self, current: &CurrentUser) -> Result<(String, String), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let name = self
            .attendee_name
            .map(|n| n.trim().to_string())
            .unwrap_or_else(|| current.user.name.clone());
        let email = self
            .attendee_email
            .map(|e| normalize_email(&e))
            .unwrap_or_else(|| current.user.email.clone());

        errors.require_text("attendee_name", &name, 100);
        if !is_valid_email(&email) {
            errors.add("attendee_email", "A valid email address is required");
        }
        errors.finish().map(|_| (name, email))
    }
}

/// POST /api/events/:id/register (free events; paid events go through checkout)
pub async fn register(
    State(state): State<AppState>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(current): Extension<CurrentUser>,
    Path(event_id): Path<Uuid>,
    input: Option<Json<RegistrationInput>>,
) -> ApiResult<EventRegistration> {
    let (attendee_name, attendee_email) = input.map(|Json(i)| i).unwrap_or_default().resolve(&current)?;

    let mut tx = pool.begin().await?;

    // Row lock serialises capacity checks for the same event
    let event = sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1 AND deleted_at IS NULL FOR UPDATE")
        .bind(event_id)
        .fetch_optional(&mut *tx)
        .await?
        .filter(|e| e.status == "published")
        .ok_or_else(|| ApiError::not_found("Event not found"))?;

    if !event.is_open_for_registration(Utc::now()) {
        return Err(ApiError::bad_request("Registration for this event has closed"));
    }
    if !event.price.is_zero() {
        return Err(ApiError::bad_request("Paid events are booked through checkout"));
    }

    let already: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM event_registrations WHERE event_id = $1 AND user_id = $2 AND status = 'registered')",
    )
    .bind(event.id)
    .bind(current.user.id)
    .fetch_one(&mut *tx)
    .await?;
    if already {
        return Err(ApiError::conflict("You are already registered for this event"));
    }

    let registered: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM event_registrations WHERE event_id = $1 AND status = 'registered'")
            .bind(event.id)
            .fetch_one(&mut *tx)
            .await?;
    if event.seats_remaining(registered) == Some(0) {
        return Err(ApiError::conflict("This event is full"));
    }

    let registration = sqlx::query_as::<_, EventRegistration>(
        "INSERT INTO event_registrations (id, event_id, user_id, attendee_name, attendee_email) \
         VALUES ($1, $2, $3, $4, $5) \
         ON CONFLICT (event_id, user_id) DO UPDATE SET status = 'registered', \
         attendee_name = EXCLUDED.attendee_name, attendee_email = EXCLUDED.attendee_email, updated_at = NOW() \
         RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(event.id)
    .bind(current.user.id)
    .bind(&attendee_name)
    .bind(&attendee_email)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    state.send_email(templates::event_registration(
        &config::config().site.name,
        &registration.attendee_email,
        &registration.attendee_name,
        &event.title,
        &event.starts_at.to_rfc2822(),
    ));

    Ok(ApiResponse::created(registration))
}

/// DELETE /api/events/:id/register
pub async fn cancel(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(current): Extension<CurrentUser>,
    Path(event_id): Path<Uuid>,
) -> ApiResult<EventRegistration> {
    let registration = sqlx::query_as::<_, EventRegistration>(
        "UPDATE event_registrations SET status = 'cancelled', updated_at = NOW() \
         WHERE event_id = $1 AND user_id = $2 AND status = 'registered' RETURNING *",
    )
    .bind(event_id)
    .bind(current.user.id)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| ApiError::not_found("Registration not found"))?;

    Ok(ApiResponse::success(registration))
}
