use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ReadingProgress {
    pub id: Uuid,
    pub user_id: Uuid,
    pub book_id: Uuid,
    pub current_page: i32,
    pub total_pages: i32,
    pub percent: i32,
    pub last_read_at: DateTime<Utc>,
}

impl ReadingProgress {
    /// Whole percent, clamped to 0..=100
    pub fn compute_percent(current_page: i32, total_pages: i32) -> i32 {
        if total_pages <= 0 {
            return 0;
        }
        let pct = i64::from(current_page.max(0)) * 100 / i64::from(total_pages);
        pct.clamp(0, 100) as i32
    }
}
