use axum::extract::Path;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::database::models::{Book, ReadingProgress};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, TenantPool};
use crate::validation::ValidationErrors;

#[derive(Debug, Serialize, FromRow)]
pub struct ProgressWithBook {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub progress: ReadingProgress,
    pub book_title: String,
    pub book_slug: String,
}

#[derive(Debug, Deserialize)]
pub struct ProgressInput {
    pub current_page: i32,
    pub total_pages: Option<i32>,
}

/// Page count from the request, then the book, then the last saved progress
pub fn resolve_pages(
    input: &ProgressInput,
    book_pages: Option<i32>,
    saved_pages: Option<i32>,
) -> Result<(i32, i32), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let total = input.total_pages.or(book_pages).or(saved_pages);

    if input.current_page < 0 {
        errors.add("current_page", "Current page must not be negative");
    }
    match total {
        None => errors.add("total_pages", "This field is required"),
        Some(t) if t <= 0 => errors.add("total_pages", "Total pages must be positive"),
        Some(t) if input.current_page > t => errors.add("current_page", "Current page is past the end of the book"),
        Some(_) => {}
    }
    errors.finish()?;
    Ok((input.current_page, total.unwrap_or(1)))
}

/// Whether a reader may track progress without a purchase
pub fn open_access(user_id: Uuid, book: &Book) -> bool {
    book.author_id == user_id || (book.price.is_zero() && book.is_published())
}

/// Open-access books, plus books in one of the reader's paid orders
async fn owns_book(pool: &PgPool, user_id: Uuid, book: &Book) -> Result<bool, ApiError> {
    if open_access(user_id, book) {
        return Ok(true);
    }
    let purchased: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM order_items oi JOIN orders o ON o.id = oi.order_id \
         WHERE o.user_id = $1 AND o.status = 'paid' AND oi.item_type = 'book' AND oi.item_id = $2)",
    )
    .bind(user_id)
    .bind(book.id)
    .fetch_one(pool)
    .await?;
    Ok(purchased)
}

/// GET /api/reading-progress
pub async fn list(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Vec<ProgressWithBook>> {
    let progress = sqlx::query_as::<_, ProgressWithBook>(
        "SELECT rp.*, b.title AS book_title, b.slug AS book_slug \
         FROM reading_progress rp JOIN books b ON b.id = rp.book_id \
         WHERE rp.user_id = $1 AND b.deleted_at IS NULL ORDER BY rp.last_read_at DESC",
    )
    .bind(current.user.id)
    .fetch_all(&pool)
    .await?;

    Ok(ApiResponse::success(progress))
}

/// PUT /api/reading-progress/:book_id
pub async fn upsert(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(current): Extension<CurrentUser>,
    Path(book_id): Path<Uuid>,
    Json(input): Json<ProgressInput>,
) -> ApiResult<ReadingProgress> {
    let book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1 AND deleted_at IS NULL")
        .bind(book_id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Book not found"))?;

    if !owns_book(&pool, current.user.id, &book).await? {
        return Err(ApiError::forbidden("You do not own this book"));
    }

    let saved_pages: Option<i32> =
        sqlx::query_scalar("SELECT total_pages FROM reading_progress WHERE user_id = $1 AND book_id = $2")
            .bind(current.user.id)
            .bind(book.id)
            .fetch_optional(&pool)
            .await?;

    let (current_page, total_pages) = resolve_pages(&input, book.page_count, saved_pages)?;
    let percent = ReadingProgress::compute_percent(current_page, total_pages);

    let progress = sqlx::query_as::<_, ReadingProgress>(
        "INSERT INTO reading_progress (id, user_id, book_id, current_page, total_pages, percent) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         ON CONFLICT (user_id, book_id) DO UPDATE SET current_page = EXCLUDED.current_page, \
         total_pages = EXCLUDED.total_pages, percent = EXCLUDED.percent, last_read_at = NOW() \
         RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(current.user.id)
    .bind(book.id)
    .bind(current_page)
    .bind(total_pages)
    .bind(percent)
    .fetch_one(&pool)
    .await?;

    Ok(ApiResponse::success(progress))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(current_page: i32, total_pages: Option<i32>) -> ProgressInput {
        ProgressInput { current_page, total_pages }
    }

    #[test]
    fn page_count_fallbacks() {
        assert_eq!(resolve_pages(&input(10, Some(200)), Some(300), None).unwrap(), (10, 200));
        assert_eq!(resolve_pages(&input(10, None), Some(300), Some(250)).unwrap(), (10, 300));
        assert_eq!(resolve_pages(&input(10, None), None, Some(250)).unwrap(), (10, 250));
        assert!(resolve_pages(&input(10, None), None, None).is_err());
    }

    fn book(price: &str, status: &str, author_id: Uuid) -> Book {
        let now = chrono::Utc::now();
        Book {
            id: Uuid::new_v4(),
            slug: "field-notes".to_string(),
            title: "Field Notes".to_string(),
            subtitle: None,
            description: None,
            author_id,
            price: price.parse().unwrap(),
            currency: "USD".to_string(),
            cover_url: None,
            isbn: None,
            category: None,
            page_count: Some(120),
            status: status.to_string(),
            featured: false,
            published_at: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[test]
    fn free_books_are_open_only_once_published() {
        let author = Uuid::new_v4();
        let reader = Uuid::new_v4();

        assert!(open_access(reader, &book("0", "published", author)));
        assert!(!open_access(reader, &book("0", "draft", author)));
        assert!(!open_access(reader, &book("9.99", "published", author)));

        let mut removed = book("0", "published", author);
        removed.deleted_at = Some(chrono::Utc::now());
        assert!(!open_access(reader, &removed));

        // Authors always reach their own books
        assert!(open_access(author, &book("9.99", "draft", author)));
    }

    #[test]
    fn page_bounds() {
        assert!(resolve_pages(&input(-1, Some(10)), None, None).is_err());
        assert!(resolve_pages(&input(11, Some(10)), None, None).is_err());
        assert!(resolve_pages(&input(1, Some(0)), None, None).is_err());
        assert_eq!(resolve_pages(&input(10, Some(10)), None, None).unwrap(), (10, 10));
    }
}
