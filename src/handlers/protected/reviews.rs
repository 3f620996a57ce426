use axum::extract::Path;
use axum::{Extension, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::database::models::Review;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, TenantPool};
use crate::validation::{ValidationErrors, MAX_TITLE_LEN};

const MAX_REVIEW_LEN: usize = 5_000;

#[derive(Debug, Deserialize)]
pub struct ReviewInput {
    pub rating: i32,
    pub title: Option<String>,
    pub body: Option<String>,
}

impl ReviewInput {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if !(1..=5).contains(&self.rating) {
            errors.add("rating", "Rating must be between 1 and 5");
        }
        errors.optional_text("title", self.title.as_deref(), MAX_TITLE_LEN);
        errors.optional_text("body", self.body.as_deref(), MAX_REVIEW_LEN);
        errors.finish()
    }
}

/// POST /api/books/:id/reviews
pub async fn create(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(current): Extension<CurrentUser>,
    Path(book_id): Path<Uuid>,
    Json(input): Json<ReviewInput>,
) -> ApiResult<Review> {
    input.validate()?;

    let published: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM books WHERE id = $1 AND status = 'published' AND deleted_at IS NULL)",
    )
    .bind(book_id)
    .fetch_one(&pool)
    .await?;
    if !published {
        return Err(ApiError::not_found("Book not found"));
    }

    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM reviews WHERE book_id = $1 AND user_id = $2)")
        .bind(book_id)
        .bind(current.user.id)
        .fetch_one(&pool)
        .await?;
    if exists {
        return Err(ApiError::conflict("You have already reviewed this book"));
    }

    let review = sqlx::query_as::<_, Review>(
        "INSERT INTO reviews (id, book_id, user_id, rating, title, body) VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(book_id)
    .bind(current.user.id)
    .bind(input.rating)
    .bind(input.title.as_deref().map(str::trim))
    .bind(input.body.as_deref().map(str::trim))
    .fetch_one(&pool)
    .await?;

    Ok(ApiResponse::created(review))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_bounds() {
        for (rating, ok) in [(0, false), (1, true), (5, true), (6, false)] {
            let input = ReviewInput { rating, title: None, body: None };
            assert_eq!(input.validate().is_ok(), ok, "rating {}", rating);
        }
    }
}
