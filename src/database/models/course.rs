use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Course {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub description: Option<String>,
    pub instructor_id: Uuid,
    pub price: Decimal,
    pub currency: String,
    pub level: String,
    pub duration_minutes: Option<i32>,
    pub status: String,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

pub const COURSE_LEVELS: &[&str] = &["beginner", "intermediate", "advanced"];

impl Course {
    pub fn is_published(&self) -> bool {
        self.status == "published" && self.deleted_at.is_none()
    }

    pub fn is_free(&self) -> bool {
        self.price.is_zero()
    }
}
