use axum::extract::Path;
use axum::{Extension, Json};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use super::super::common::{becomes_published, ensure_slug_available};
use crate::config;
use crate::database::models::course::COURSE_LEVELS;
use crate::database::models::{Course, PUBLISH_STATUSES};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, TenantPool};
use crate::validation::{slugify, ValidationErrors, MAX_TITLE_LEN};

#[derive(Debug, Default, Deserialize)]
pub struct CourseInput {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub instructor_id: Option<Uuid>,
    pub price: Option<Decimal>,
    pub currency: Option<String>,
    pub level: Option<String>,
    pub duration_minutes: Option<i32>,
    pub status: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CourseFields {
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub instructor_id: Uuid,
    pub price: Decimal,
    pub currency: String,
    pub level: String,
    pub duration_minutes: Option<i32>,
    pub status: String,
}

impl CourseFields {
    pub fn for_create(input: CourseInput, instructor_id: Uuid) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let title = input.title.unwrap_or_default();
        if input.price.is_none() {
            errors.add("price", "This field is required");
        }

        let fields = Self {
            slug: input.slug.unwrap_or_else(|| slugify(&title)),
            title: title.trim().to_string(),
            description: input.description,
            instructor_id: input.instructor_id.unwrap_or(instructor_id),
            price: input.price.unwrap_or(Decimal::ZERO),
            currency: input
                .currency
                .unwrap_or_else(|| config::config().payments.default_currency.clone()),
            level: input.level.unwrap_or_else(|| "beginner".to_string()),
            duration_minutes: input.duration_minutes,
            status: input.status.unwrap_or_else(|| "draft".to_string()),
        };
        fields.validate(errors)
    }

    pub fn for_update(course: &Course, input: CourseInput) -> Result<Self, ValidationErrors> {
        Self {
            title: input.title.map(|t| t.trim().to_string()).unwrap_or_else(|| course.title.clone()),
            slug: input.slug.unwrap_or_else(|| course.slug.clone()),
            description: input.description.or_else(|| course.description.clone()),
            instructor_id: input.instructor_id.unwrap_or(course.instructor_id),
            price: input.price.unwrap_or(course.price),
            currency: input.currency.unwrap_or_else(|| course.currency.clone()),
            level: input.level.unwrap_or_else(|| course.level.clone()),
            duration_minutes: input.duration_minutes.or(course.duration_minutes),
            status: input.status.unwrap_or_else(|| course.status.clone()),
        }
        .validate(ValidationErrors::new())
    }

    fn validate(self, mut errors: ValidationErrors) -> Result<Self, ValidationErrors> {
        errors.require_text("title", &self.title, MAX_TITLE_LEN);
        errors.slug("slug", &self.slug);
        errors.price("price", self.price);
        errors.currency("currency", &self.currency);
        errors.one_of("level", &self.level, COURSE_LEVELS);
        errors.one_of("status", &self.status, PUBLISH_STATUSES);
        if matches!(self.duration_minutes, Some(m) if m <= 0) {
            errors.add("duration_minutes", "Duration must be positive");
        }
        errors.finish().map(|_| self)
    }
}

async fn find_course(pool: &PgPool, id: Uuid) -> Result<Course, ApiError> {
    sqlx::query_as::<_, Course>("SELECT * FROM courses WHERE id = $1 AND deleted_at IS NULL")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Course not found"))
}

/// POST /api/admin/courses
pub async fn create(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(current): Extension<CurrentUser>,
    Json(input): Json<CourseInput>,
) -> ApiResult<Course> {
    let fields = CourseFields::for_create(input, current.user.id)?;
    ensure_slug_available(&pool, "courses", &fields.slug, None).await?;

    let course = sqlx::query_as::<_, Course>(
        "INSERT INTO courses (id, slug, title, description, instructor_id, price, currency, level, \
         duration_minutes, status, published_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, CASE WHEN $10 = 'published' THEN NOW() END) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(&fields.slug)
    .bind(&fields.title)
    .bind(&fields.description)
    .bind(fields.instructor_id)
    .bind(fields.price)
    .bind(&fields.currency)
    .bind(&fields.level)
    .bind(fields.duration_minutes)
    .bind(&fields.status)
    .fetch_one(&pool)
    .await?;

    Ok(ApiResponse::created(course))
}

/// PUT /api/admin/courses/:id
pub async fn update(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<Uuid>,
    Json(input): Json<CourseInput>,
) -> ApiResult<Course> {
    let course = find_course(&pool, id).await?;
    let fields = CourseFields::for_update(&course, input)?;
    if fields.slug != course.slug {
        ensure_slug_available(&pool, "courses", &fields.slug, Some(course.id)).await?;
    }

    let course = sqlx::query_as::<_, Course>(
        "UPDATE courses SET slug = $2, title = $3, description = $4, instructor_id = $5, price = $6, \
         currency = $7, level = $8, duration_minutes = $9, status = $10, \
         published_at = CASE WHEN $11 THEN NOW() ELSE published_at END, updated_at = NOW() \
         WHERE id = $1 RETURNING *",
    )
    .bind(course.id)
    .bind(&fields.slug)
    .bind(&fields.title)
    .bind(&fields.description)
    .bind(fields.instructor_id)
    .bind(fields.price)
    .bind(&fields.currency)
    .bind(&fields.level)
    .bind(fields.duration_minutes)
    .bind(&fields.status)
    .bind(becomes_published(&fields.status, course.published_at.is_some()))
    .fetch_one(&pool)
    .await?;

    Ok(ApiResponse::success(course))
}

/// DELETE /api/admin/courses/:id (soft delete)
pub async fn delete(Extension(TenantPool(pool)): Extension<TenantPool>, Path(id): Path<Uuid>) -> ApiResult<Course> {
    let course = sqlx::query_as::<_, Course>(
        "UPDATE courses SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL RETURNING *",
    )
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| ApiError::not_found("Course not found"))?;

    Ok(ApiResponse::success(course))
}
