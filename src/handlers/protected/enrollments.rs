use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::config;
use crate::database::models::{enrollment, Course, Enrollment};
use crate::email::templates;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, TenantPool};
use crate::state::AppState;
use crate::validation::ValidationErrors;

#[derive(Debug, Serialize, FromRow)]
pub struct EnrollmentWithCourse {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub enrollment: Enrollment,
    pub course_title: String,
    pub course_slug: String,
}

#[derive(Debug, Deserialize)]
pub struct ProgressInput {
    pub progress_percent: i32,
}

/// Paid order containing the course, if any
async fn paid_order_for(pool: &PgPool, user_id: Uuid, course_id: Uuid) -> Result<Option<Uuid>, ApiError> {
    let order_id = sqlx::query_scalar::<_, Uuid>(
        "SELECT o.id FROM orders o JOIN order_items oi ON oi.order_id = o.id \
         WHERE o.user_id = $1 AND o.status = 'paid' AND oi.item_type = 'course' AND oi.item_id = $2 \
         ORDER BY o.paid_at DESC LIMIT 1",
    )
    .bind(user_id)
    .bind(course_id)
    .fetch_optional(pool)
    .await?;
    Ok(order_id)
}

/// Order backing a new enrollment; paid courses need a paid order
pub fn enrollment_order(course: &Course, paid_order: Option<Uuid>) -> Result<Option<Uuid>, ApiError> {
    if course.is_free() {
        return Ok(None);
    }
    paid_order
        .map(Some)
        .ok_or_else(|| ApiError::forbidden("Purchase this course before enrolling"))
}

/// POST /api/courses/:id/enroll
pub async fn enroll(
    State(state): State<AppState>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(current): Extension<CurrentUser>,
    Path(course_id): Path<Uuid>,
) -> ApiResult<Enrollment> {
    let course = sqlx::query_as::<_, Course>(
        "SELECT * FROM courses WHERE id = $1 AND status = 'published' AND deleted_at IS NULL",
    )
    .bind(course_id)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| ApiError::not_found("Course not found"))?;

    let active: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM enrollments WHERE user_id = $1 AND course_id = $2 AND status <> 'cancelled')",
    )
    .bind(current.user.id)
    .bind(course.id)
    .fetch_one(&pool)
    .await?;
    if active {
        return Err(ApiError::conflict("You are already enrolled in this course"));
    }

    let paid = if course.is_free() {
        None
    } else {
        paid_order_for(&pool, current.user.id, course.id).await?
    };
    let order_id = enrollment_order(&course, paid)?;

    // A cancelled enrollment is reactivated rather than duplicated
    let enrollment = sqlx::query_as::<_, Enrollment>(
        "INSERT INTO enrollments (id, user_id, course_id, order_id) VALUES ($1, $2, $3, $4) \
         ON CONFLICT (user_id, course_id) DO UPDATE SET status = 'active', progress_percent = 0, \
         enrolled_at = NOW(), completed_at = NULL, order_id = EXCLUDED.order_id \
         RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(current.user.id)
    .bind(course.id)
    .bind(order_id)
    .fetch_one(&pool)
    .await?;

    state.send_email(templates::enrollment_confirmation(
        &config::config().site.name,
        &current.user.email,
        &course.title,
    ));

    Ok(ApiResponse::created(enrollment))
}

/// GET /api/enrollments
pub async fn list(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Vec<EnrollmentWithCourse>> {
    let enrollments = sqlx::query_as::<_, EnrollmentWithCourse>(
        "SELECT e.*, c.title AS course_title, c.slug AS course_slug \
         FROM enrollments e JOIN courses c ON c.id = e.course_id \
         WHERE e.user_id = $1 AND e.status <> 'cancelled' ORDER BY e.enrolled_at DESC",
    )
    .bind(current.user.id)
    .fetch_all(&pool)
    .await?;

    Ok(ApiResponse::success(enrollments))
}

fn validate_progress(input: &ProgressInput) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    if !(0..=100).contains(&input.progress_percent) {
        errors.add("progress_percent", "Progress must be between 0 and 100");
    }
    errors.finish()
}

/// PATCH /api/enrollments/:id/progress; reaching 100 completes the course
pub async fn update_progress(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(input): Json<ProgressInput>,
) -> ApiResult<Enrollment> {
    validate_progress(&input)?;

    let status = enrollment::status_for_progress(input.progress_percent);
    let enrollment = sqlx::query_as::<_, Enrollment>(
        "UPDATE enrollments SET progress_percent = $3, status = $4, \
         completed_at = CASE WHEN $4 = 'completed' THEN COALESCE(completed_at, NOW()) ELSE NULL END \
         WHERE id = $1 AND user_id = $2 AND status <> 'cancelled' RETURNING *",
    )
    .bind(id)
    .bind(current.user.id)
    .bind(input.progress_percent)
    .bind(status)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| ApiError::not_found("Enrollment not found"))?;

    Ok(ApiResponse::success(enrollment))
}
