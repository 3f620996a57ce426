//! Book authoring. Authors manage their own books, admins manage all of them.

use axum::extract::Path;
use axum::{Extension, Json};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use super::super::common::{becomes_published, ensure_slug_available};
use crate::config;
use crate::database::models::{Book, PUBLISH_STATUSES};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, TenantPool};
use crate::validation::{slugify, ValidationErrors, MAX_TITLE_LEN};

const MAX_DESCRIPTION_LEN: usize = 10_000;

#[derive(Debug, Default, Deserialize)]
pub struct BookInput {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub currency: Option<String>,
    pub cover_url: Option<String>,
    pub isbn: Option<String>,
    pub category: Option<String>,
    pub page_count: Option<i32>,
    pub status: Option<String>,
    pub featured: Option<bool>,
}

/// Column values after applying an input over defaults or an existing row
#[derive(Debug, Clone, PartialEq)]
pub struct BookFields {
    pub title: String,
    pub slug: String,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub price: Decimal,
    pub currency: String,
    pub cover_url: Option<String>,
    pub isbn: Option<String>,
    pub category: Option<String>,
    pub page_count: Option<i32>,
    pub status: String,
    pub featured: bool,
}

impl BookFields {
    pub fn for_create(input: BookInput) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let title = input.title.unwrap_or_default();
        let price = input.price.unwrap_or_else(|| {
            errors.add("price", "This field is required");
            Decimal::ZERO
        });

        let fields = Self {
            slug: input.slug.unwrap_or_else(|| slugify(&title)),
            title: title.trim().to_string(),
            subtitle: input.subtitle,
            description: input.description,
            price,
            currency: input
                .currency
                .unwrap_or_else(|| config::config().payments.default_currency.clone()),
            cover_url: input.cover_url,
            isbn: input.isbn,
            category: input.category,
            page_count: input.page_count,
            status: input.status.unwrap_or_else(|| "draft".to_string()),
            featured: input.featured.unwrap_or(false),
        };
        fields.validate(errors)
    }

    pub fn for_update(book: &Book, input: BookInput) -> Result<Self, ValidationErrors> {
        let fields = Self {
            title: input.title.map(|t| t.trim().to_string()).unwrap_or_else(|| book.title.clone()),
            slug: input.slug.unwrap_or_else(|| book.slug.clone()),
            subtitle: input.subtitle.or_else(|| book.subtitle.clone()),
            description: input.description.or_else(|| book.description.clone()),
            price: input.price.unwrap_or(book.price),
            currency: input.currency.unwrap_or_else(|| book.currency.clone()),
            cover_url: input.cover_url.or_else(|| book.cover_url.clone()),
            isbn: input.isbn.or_else(|| book.isbn.clone()),
            category: input.category.or_else(|| book.category.clone()),
            page_count: input.page_count.or(book.page_count),
            status: input.status.unwrap_or_else(|| book.status.clone()),
            featured: input.featured.unwrap_or(book.featured),
        };
        fields.validate(ValidationErrors::new())
    }

    fn validate(self, mut errors: ValidationErrors) -> Result<Self, ValidationErrors> {
        errors.require_text("title", &self.title, MAX_TITLE_LEN);
        errors.slug("slug", &self.slug);
        errors.optional_text("subtitle", self.subtitle.as_deref(), MAX_TITLE_LEN);
        errors.optional_text("description", self.description.as_deref(), MAX_DESCRIPTION_LEN);
        errors.price("price", self.price);
        errors.currency("currency", &self.currency);
        errors.one_of("status", &self.status, PUBLISH_STATUSES);
        if matches!(self.page_count, Some(n) if n <= 0) {
            errors.add("page_count", "Page count must be positive");
        }
        errors.finish().map(|_| self)
    }
}

async fn find_book(pool: &PgPool, id: Uuid) -> Result<Book, ApiError> {
    sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1 AND deleted_at IS NULL")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Book not found"))
}

fn ensure_can_edit(current: &CurrentUser, book: &Book) -> Result<(), ApiError> {
    if current.is_admin() || (current.can_publish() && book.author_id == current.user.id) {
        Ok(())
    } else {
        Err(ApiError::forbidden("You can only modify your own books"))
    }
}

/// POST /api/books
pub async fn create(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(current): Extension<CurrentUser>,
    Json(input): Json<BookInput>,
) -> ApiResult<Book> {
    if !current.can_publish() {
        return Err(ApiError::forbidden("Only authors and admins can create books"));
    }

    let fields = BookFields::for_create(input)?;
    ensure_slug_available(&pool, "books", &fields.slug, None).await?;

    let book = sqlx::query_as::<_, Book>(
        "INSERT INTO books (id, slug, title, subtitle, description, author_id, price, currency, cover_url, isbn, \
         category, page_count, status, featured, published_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, \
         CASE WHEN $13 = 'published' THEN NOW() END) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(&fields.slug)
    .bind(&fields.title)
    .bind(&fields.subtitle)
    .bind(&fields.description)
    .bind(current.user.id)
    .bind(fields.price)
    .bind(&fields.currency)
    .bind(&fields.cover_url)
    .bind(&fields.isbn)
    .bind(&fields.category)
    .bind(fields.page_count)
    .bind(&fields.status)
    .bind(fields.featured)
    .fetch_one(&pool)
    .await?;

    tracing::info!("Book '{}' created by {}", book.slug, current.user.id);
    Ok(ApiResponse::created(book))
}

/// PUT /api/books/:id
pub async fn update(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(input): Json<BookInput>,
) -> ApiResult<Book> {
    let book = find_book(&pool, id).await?;
    ensure_can_edit(&current, &book)?;

    let fields = BookFields::for_update(&book, input)?;
    if fields.slug != book.slug {
        ensure_slug_available(&pool, "books", &fields.slug, Some(book.id)).await?;
    }
    let stamp = becomes_published(&fields.status, book.published_at.is_some());

    let book = sqlx::query_as::<_, Book>(
        "UPDATE books SET slug = $2, title = $3, subtitle = $4, description = $5, price = $6, currency = $7, \
         cover_url = $8, isbn = $9, category = $10, page_count = $11, status = $12, featured = $13, \
         published_at = CASE WHEN $14 THEN NOW() ELSE published_at END, updated_at = NOW() \
         WHERE id = $1 RETURNING *",
    )
    .bind(book.id)
    .bind(&fields.slug)
    .bind(&fields.title)
    .bind(&fields.subtitle)
    .bind(&fields.description)
    .bind(fields.price)
    .bind(&fields.currency)
    .bind(&fields.cover_url)
    .bind(&fields.isbn)
    .bind(&fields.category)
    .bind(fields.page_count)
    .bind(&fields.status)
    .bind(fields.featured)
    .bind(stamp)
    .fetch_one(&pool)
    .await?;

    Ok(ApiResponse::success(book))
}

/// DELETE /api/books/:id (soft delete)
pub async fn delete(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Book> {
    let book = find_book(&pool, id).await?;
    ensure_can_edit(&current, &book)?;

    let book = sqlx::query_as::<_, Book>(
        "UPDATE books SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(book.id)
    .fetch_one(&pool)
    .await?;

    tracing::info!("Book '{}' deleted by {}", book.slug, current.user.id);
    Ok(ApiResponse::success(book))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn input(title: &str, price: &str) -> BookInput {
        BookInput {
            title: Some(title.to_string()),
            price: Some(Decimal::from_str(price).unwrap()),
            currency: Some("USD".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn create_derives_slug_and_defaults() {
        let fields = BookFields::for_create(input("Rust in Practice", "29.99")).unwrap();
        assert_eq!(fields.slug, "rust-in-practice");
        assert_eq!(fields.status, "draft");
        assert!(!fields.featured);
    }

    #[test]
    fn create_reports_invalid_fields() {
        let mut bad = input("", "-5");
        bad.status = Some("live".to_string());
        bad.page_count = Some(0);
        let errors = BookFields::for_create(bad).unwrap_err();
        assert!(errors.get("title").is_some());
        assert!(errors.get("price").is_some());
        assert!(errors.get("status").is_some());
        assert!(errors.get("page_count").is_some());

        let missing_price = BookInput { title: Some("Priceless".into()), ..Default::default() };
        assert!(BookFields::for_create(missing_price).unwrap_err().get("price").is_some());
    }

    #[test]
    fn precision_is_limited_to_cents() {
        assert!(BookFields::for_create(input("Precise", "1.999")).is_err());
    }
}
