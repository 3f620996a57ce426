use axum::extract::{Path, Query};
use axum::Extension;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use super::super::common::{all_of, parse_bool, parse_opt, price_bound, search_clause, PageParams};
use crate::database::models::{Book, Review};
use crate::database::{Page, Repository};
use crate::error::ApiError;
use crate::filter::FilterData;
use crate::middleware::{ApiResponse, ApiResult, TenantPool};

#[derive(Debug, Default, Deserialize)]
pub struct BookListParams {
    pub category: Option<String>,
    pub search: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub featured: Option<String>,
    pub author: Option<String>,
    pub sort: Option<String>,
    #[serde(flatten)]
    pub page: PageParams,
}

#[derive(Debug, Serialize)]
pub struct BookDetail {
    #[serde(flatten)]
    pub book: Book,
    pub average_rating: f64,
    pub review_count: i64,
}

pub fn book_sort(sort: Option<&str>) -> Result<&'static str, ApiError> {
    Ok(match sort.unwrap_or("newest") {
        "newest" => "published_at desc, created_at desc",
        "oldest" => "published_at asc, created_at asc",
        "price_asc" => "price asc, title asc",
        "price_desc" => "price desc, title asc",
        "title" => "title asc",
        other => return Err(ApiError::bad_request(format!("Unknown sort: {}", other))),
    })
}

impl BookListParams {
    pub fn to_filter(&self) -> Result<FilterData, ApiError> {
        let mut conditions = vec![json!({ "status": "published" })];

        if let Some(category) = self.category.as_deref().filter(|c| !c.is_empty()) {
            conditions.push(json!({ "category": category }));
        }
        if let Some(term) = self.search.as_deref().filter(|s| !s.trim().is_empty()) {
            conditions.push(search_clause(term, &["title", "subtitle", "description"]));
        }
        if let Some(min) = price_bound("min_price", self.min_price.as_deref())? {
            conditions.push(json!({ "price": { "$gte": min } }));
        }
        if let Some(max) = price_bound("max_price", self.max_price.as_deref())? {
            conditions.push(json!({ "price": { "$lte": max } }));
        }
        if let Some(featured) = parse_bool("featured", self.featured.as_deref())? {
            conditions.push(json!({ "featured": featured }));
        }
        if let Some(author) = parse_opt::<Uuid>("author", self.author.as_deref())? {
            conditions.push(json!({ "author_id": author.to_string() }));
        }

        Ok(FilterData {
            where_clause: Some(all_of(conditions)),
            order: Some(Value::String(book_sort(self.sort.as_deref())?.to_string())),
            ..Default::default()
        })
    }
}

/// GET /api/books
pub async fn list(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Query(params): Query<BookListParams>,
) -> ApiResult<Page<Book>> {
    let (page, limit) = params.page.resolve()?;
    let filter = params.to_filter()?;
    let books = Repository::<Book>::new("books", pool).paginate(filter, page, limit).await?;
    Ok(ApiResponse::success(books))
}

pub async fn find_published_by_slug(pool: &sqlx::PgPool, slug: &str) -> Result<Book, ApiError> {
    let book = Repository::<Book>::new("books", pool.clone())
        .select_one(FilterData::with_where(json!({ "slug": slug, "status": "published" })))
        .await?;
    book.ok_or_else(|| ApiError::not_found(format!("Book '{}' not found", slug)))
}

/// GET /api/books/:slug
pub async fn show(Extension(TenantPool(pool)): Extension<TenantPool>, Path(slug): Path<String>) -> ApiResult<BookDetail> {
    let book = find_published_by_slug(&pool, &slug).await?;

    let (average_rating, review_count): (f64, i64) =
        sqlx::query_as("SELECT COALESCE(AVG(rating)::float8, 0), COUNT(*) FROM reviews WHERE book_id = $1")
            .bind(book.id)
            .fetch_one(&pool)
            .await?;

    Ok(ApiResponse::success(BookDetail {
        book,
        average_rating: (average_rating * 10.0).round() / 10.0,
        review_count,
    }))
}

/// GET /api/books/:slug/reviews
pub async fn reviews(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(slug): Path<String>,
    Query(params): Query<PageParams>,
) -> ApiResult<Page<Review>> {
    let (page, limit) = params.resolve()?;
    let book = find_published_by_slug(&pool, &slug).await?;

    let filter = FilterData {
        where_clause: Some(json!({ "book_id": book.id.to_string() })),
        order: Some(json!("created_at desc")),
        ..Default::default()
    };
    let reviews = Repository::<Review>::new("reviews", pool).paginate(filter, page, limit).await?;
    Ok(ApiResponse::success(reviews))
}
