use axum::extract::{Path, Query};
use axum::Extension;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::super::common::{all_of, search_clause, PageParams};
use crate::database::models::course::COURSE_LEVELS;
use crate::database::models::Course;
use crate::database::{Page, Repository};
use crate::error::ApiError;
use crate::filter::FilterData;
use crate::middleware::{ApiResponse, ApiResult, TenantPool};

#[derive(Debug, Default, Deserialize)]
pub struct CourseListParams {
    pub level: Option<String>,
    pub search: Option<String>,
    #[serde(flatten)]
    pub page: PageParams,
}

#[derive(Debug, Serialize)]
pub struct CourseDetail {
    #[serde(flatten)]
    pub course: Course,
    pub enrollment_count: i64,
}

impl CourseListParams {
    pub fn to_filter(&self) -> Result<FilterData, ApiError> {
        let mut conditions = vec![json!({ "status": "published" })];

        if let Some(level) = self.level.as_deref().filter(|l| !l.is_empty()) {
            if !COURSE_LEVELS.contains(&level) {
                return Err(ApiError::bad_request(format!("Unknown level: {}", level)));
            }
            conditions.push(json!({ "level": level }));
        }
        if let Some(term) = self.search.as_deref().filter(|s| !s.trim().is_empty()) {
            conditions.push(search_clause(term, &["title", "description"]));
        }

        Ok(FilterData {
            where_clause: Some(all_of(conditions)),
            order: Some(json!("published_at desc, created_at desc")),
            ..Default::default()
        })
    }
}

/// GET /api/courses
pub async fn list(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Query(params): Query<CourseListParams>,
) -> ApiResult<Page<Course>> {
    let (page, limit) = params.page.resolve()?;
    let courses = Repository::<Course>::new("courses", pool)
        .paginate(params.to_filter()?, page, limit)
        .await?;
    Ok(ApiResponse::success(courses))
}

/// GET /api/courses/:slug
pub async fn show(Extension(TenantPool(pool)): Extension<TenantPool>, Path(slug): Path<String>) -> ApiResult<CourseDetail> {
    let course = Repository::<Course>::new("courses", pool.clone())
        .select_one(FilterData::with_where(json!({ "slug": slug, "status": "published" })))
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Course '{}' not found", slug)))?;

    let enrollment_count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM enrollments WHERE course_id = $1 AND status <> 'cancelled'")
            .bind(course.id)
            .fetch_one(&pool)
            .await?;

    Ok(ApiResponse::success(CourseDetail { course, enrollment_count }))
}
