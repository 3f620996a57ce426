use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Enrollment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub order_id: Option<Uuid>,
    pub status: String,
    pub progress_percent: i32,
    pub enrolled_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Reaching 100 percent completes the course; anything lower keeps it active
pub fn status_for_progress(progress_percent: i32) -> &'static str {
    if progress_percent >= 100 {
        "completed"
    } else {
        "active"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_progress_completes() {
        assert_eq!(status_for_progress(100), "completed");
        assert_eq!(status_for_progress(99), "active");
        assert_eq!(status_for_progress(0), "active");
    }
}
