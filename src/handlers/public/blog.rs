use axum::extract::{Path, Query};
use axum::Extension;
use serde::Deserialize;
use serde_json::json;

use super::super::common::{all_of, search_clause, PageParams};
use crate::database::models::BlogPost;
use crate::database::{Page, Repository};
use crate::error::ApiError;
use crate::filter::FilterData;
use crate::middleware::{ApiResponse, ApiResult, TenantPool};

#[derive(Debug, Default, Deserialize)]
pub struct BlogListParams {
    pub tag: Option<String>,
    pub search: Option<String>,
    #[serde(flatten)]
    pub page: PageParams,
}

impl BlogListParams {
    pub fn to_filter(&self) -> FilterData {
        let mut conditions = vec![json!({ "status": "published" })];

        if let Some(tag) = self.tag.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            conditions.push(json!({ "tags": { "$any": tag.to_lowercase() } }));
        }
        if let Some(term) = self.search.as_deref().filter(|s| !s.trim().is_empty()) {
            conditions.push(search_clause(term, &["title", "excerpt", "content"]));
        }

        FilterData {
            where_clause: Some(all_of(conditions)),
            order: Some(json!("published_at desc")),
            ..Default::default()
        }
    }
}

/// GET /api/blog
pub async fn list(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Query(params): Query<BlogListParams>,
) -> ApiResult<Page<BlogPost>> {
    let (page, limit) = params.page.resolve()?;
    let posts = Repository::<BlogPost>::new("blog_posts", pool)
        .paginate(params.to_filter(), page, limit)
        .await?;
    Ok(ApiResponse::success(posts))
}

/// GET /api/blog/:slug; each read counts as a view
pub async fn show(Extension(TenantPool(pool)): Extension<TenantPool>, Path(slug): Path<String>) -> ApiResult<BlogPost> {
    let post = sqlx::query_as::<_, BlogPost>(
        "UPDATE blog_posts SET view_count = view_count + 1 \
         WHERE slug = $1 AND status = 'published' AND deleted_at IS NULL RETURNING *",
    )
    .bind(&slug)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| ApiError::not_found(format!("Post '{}' not found", slug)))?;

    Ok(ApiResponse::success(post))
}
