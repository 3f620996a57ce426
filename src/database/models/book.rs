use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Book {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub author_id: Uuid,
    pub price: Decimal,
    pub currency: String,
    pub cover_url: Option<String>,
    pub isbn: Option<String>,
    pub category: Option<String>,
    pub page_count: Option<i32>,
    pub status: String,
    pub featured: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Book {
    pub fn is_published(&self) -> bool {
        self.status == "published" && self.deleted_at.is_none()
    }
}
