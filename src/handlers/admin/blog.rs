use axum::extract::Path;
use axum::{Extension, Json};
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use super::super::common::{becomes_published, ensure_slug_available};
use crate::database::models::{BlogPost, PUBLISH_STATUSES};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, TenantPool};
use crate::validation::{slugify, ValidationErrors, MAX_TITLE_LEN};

const MAX_EXCERPT_LEN: usize = 500;
const MAX_TAGS: usize = 20;

#[derive(Debug, Default, Deserialize)]
pub struct PostInput {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub excerpt: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    pub status: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PostFields {
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub tags: Vec<String>,
    pub status: String,
}

/// Lowercased, trimmed, de-duplicated, order kept
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

impl PostFields {
    pub fn for_create(input: PostInput) -> Result<Self, ValidationErrors> {
        let title = input.title.unwrap_or_default();
        Self {
            slug: input.slug.unwrap_or_else(|| slugify(&title)),
            title: title.trim().to_string(),
            excerpt: input.excerpt,
            content: input.content.unwrap_or_default(),
            tags: normalize_tags(input.tags.unwrap_or_default()),
            status: input.status.unwrap_or_else(|| "draft".to_string()),
        }
        .validate()
    }

    pub fn for_update(post: &BlogPost, input: PostInput) -> Result<Self, ValidationErrors> {
        Self {
            title: input.title.map(|t| t.trim().to_string()).unwrap_or_else(|| post.title.clone()),
            slug: input.slug.unwrap_or_else(|| post.slug.clone()),
            excerpt: input.excerpt.or_else(|| post.excerpt.clone()),
            content: input.content.unwrap_or_else(|| post.content.clone()),
            tags: input.tags.map(normalize_tags).unwrap_or_else(|| post.tags.clone()),
            status: input.status.unwrap_or_else(|| post.status.clone()),
        }
        .validate()
    }

    fn validate(self) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.require_text("title", &self.title, MAX_TITLE_LEN);
        errors.slug("slug", &self.slug);
        errors.optional_text("excerpt", self.excerpt.as_deref(), MAX_EXCERPT_LEN);
        if self.content.trim().is_empty() {
            errors.add("content", "This field is required");
        }
        if self.tags.len() > MAX_TAGS {
            errors.add("tags", format!("At most {} tags", MAX_TAGS));
        }
        errors.one_of("status", &self.status, PUBLISH_STATUSES);
        errors.finish().map(|_| self)
    }
}

async fn find_post(pool: &PgPool, id: Uuid) -> Result<BlogPost, ApiError> {
    sqlx::query_as::<_, BlogPost>("SELECT * FROM blog_posts WHERE id = $1 AND deleted_at IS NULL")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Post not found"))
}

/// POST /api/admin/blog
pub async fn create(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(current): Extension<CurrentUser>,
    Json(input): Json<PostInput>,
) -> ApiResult<BlogPost> {
    let fields = PostFields::for_create(input)?;
    ensure_slug_available(&pool, "blog_posts", &fields.slug, None).await?;

    let post = sqlx::query_as::<_, BlogPost>(
        "INSERT INTO blog_posts (id, slug, title, excerpt, content, author_id, tags, status, published_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, CASE WHEN $8 = 'published' THEN NOW() END) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(&fields.slug)
    .bind(&fields.title)
    .bind(&fields.excerpt)
    .bind(&fields.content)
    .bind(current.user.id)
    .bind(&fields.tags)
    .bind(&fields.status)
    .fetch_one(&pool)
    .await?;

    Ok(ApiResponse::created(post))
}

/// PUT /api/admin/blog/:id
pub async fn update(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<Uuid>,
    Json(input): Json<PostInput>,
) -> ApiResult<BlogPost> {
    let post = find_post(&pool, id).await?;
    let fields = PostFields::for_update(&post, input)?;
    if fields.slug != post.slug {
        ensure_slug_available(&pool, "blog_posts", &fields.slug, Some(post.id)).await?;
    }

    let post = sqlx::query_as::<_, BlogPost>(
        "UPDATE blog_posts SET slug = $2, title = $3, excerpt = $4, content = $5, tags = $6, status = $7, \
         published_at = CASE WHEN $8 THEN NOW() ELSE published_at END, updated_at = NOW() \
         WHERE id = $1 RETURNING *",
    )
    .bind(post.id)
    .bind(&fields.slug)
    .bind(&fields.title)
    .bind(&fields.excerpt)
    .bind(&fields.content)
    .bind(&fields.tags)
    .bind(&fields.status)
    .bind(becomes_published(&fields.status, post.published_at.is_some()))
    .fetch_one(&pool)
    .await?;

    Ok(ApiResponse::success(post))
}

/// DELETE /api/admin/blog/:id (soft delete)
pub async fn delete(Extension(TenantPool(pool)): Extension<TenantPool>, Path(id): Path<Uuid>) -> ApiResult<BlogPost> {
    let post = sqlx::query_as::<_, BlogPost>(
        "UPDATE blog_posts SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL RETURNING *",
    )
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| ApiError::not_found("Post not found"))?;

    Ok(ApiResponse::success(post))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_normalized() {
        let tags = normalize_tags(vec![" Rust ".into(), "rust".into(), "".into(), "Async".into()]);
        assert_eq!(tags, vec!["rust", "async"]);
    }

    #[test]
    fn content_is_required() {
        let input = PostInput { title: Some("Hello".into()), ..Default::default() };
        assert!(PostFields::for_create(input).unwrap_err().get("content").is_some());

        let input = PostInput {
            title: Some("Hello World".into()),
            content: Some("Body".into()),
            ..Default::default()
        };
        assert_eq!(PostFields::for_create(input).unwrap().slug, "hello-world");
    }
}
