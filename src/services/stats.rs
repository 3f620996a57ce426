//! Admin dashboard aggregation. Every section is an independent query, run concurrently.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::database::DatabaseError;

#[derive(Debug, Serialize)]
pub struct AdminStats {
    pub users: UserStats,
    pub books: CatalogueStats,
    pub courses: CatalogueStats,
    pub events: EventStats,
    pub orders: OrderStats,
    /// One entry per currency with paid orders; totals are never summed across currencies
    pub revenue: Vec<RevenueStats>,
    pub enrollments: EnrollmentStats,
    pub registrations: RegistrationStats,
    pub top_books: Vec<TopBook>,
    pub recent_orders: Vec<RecentOrder>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, FromRow)]
pub struct UserStats {
    pub total: i64,
    pub new_last_30_days: i64,
}

#[derive(Debug, Serialize, FromRow)]
pub struct CatalogueStats {
    pub total: i64,
    pub published: i64,
}

#[derive(Debug, Serialize, FromRow)]
pub struct EventStats {
    pub total: i64,
    pub upcoming: i64,
}

#[derive(Debug, Serialize)]
pub struct OrderStats {
    pub total: i64,
    pub by_status: BTreeMap<String, i64>,
}

#[derive(Debug, Serialize)]
pub struct RevenueStats {
    pub currency: String,
    pub total: Decimal,
    pub last_30_days: Decimal,
    pub previous_30_days: Decimal,
    pub growth_percent: Option<f64>,
}

#[derive(Debug, FromRow)]
struct RevenueRow {
    currency: String,
    total: Decimal,
    last_30_days: Decimal,
    previous_30_days: Decimal,
}

#[derive(Debug, Serialize, FromRow)]
pub struct EnrollmentStats {
    pub total: i64,
    pub completed: i64,
}

#[derive(Debug, Serialize, FromRow)]
pub struct RegistrationStats {
    pub total: i64,
}

#[derive(Debug, Serialize, FromRow)]
pub struct TopBook {
    pub id: Uuid,
    pub title: String,
    pub units_sold: i64,
    pub revenue: Decimal,
    pub currency: String,
}

#[derive(Debug, Serialize, FromRow)]
pub struct RecentOrder {
    pub id: Uuid,
    pub order_number: String,
    pub customer_email: String,
    pub status: String,
    pub total: Decimal,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

/// Percentage change rounded to one decimal place.
/// Growth from zero is undefined unless both periods are zero.
pub fn percent_change(previous: Decimal, current: Decimal) -> Option<f64> {
    if previous.is_zero() {
        return if current.is_zero() { Some(0.0) } else { None };
    }
    let change = (current - previous) / previous * Decimal::from(100);
    change.round_dp(1).to_f64()
}

async fn user_stats(pool: &PgPool) -> Result<UserStats, DatabaseError> {
    let stats = sqlx::query_as::<_, UserStats>(
        "SELECT COUNT(*) AS total, \
         COUNT(*) FILTER (WHERE created_at >= NOW() - INTERVAL '30 days') AS new_last_30_days \
         FROM users WHERE deleted_at IS NULL",
    )
    .fetch_one(pool)
    .await?;
    Ok(stats)
}

async fn catalogue_stats(pool: &PgPool, table: &'static str) -> Result<CatalogueStats, DatabaseError> {
    let query = format!(
        "SELECT COUNT(*) AS total, COUNT(*) FILTER (WHERE status = 'published') AS published \
         FROM {} WHERE deleted_at IS NULL",
        table
    );
    Ok(sqlx::query_as::<_, CatalogueStats>(&query).fetch_one(pool).await?)
}

async fn event_stats(pool: &PgPool) -> Result<EventStats, DatabaseError> {
    let stats = sqlx::query_as::<_, EventStats>(
        "SELECT COUNT(*) AS total, \
         COUNT(*) FILTER (WHERE status = 'published' AND starts_at > NOW()) AS upcoming \
         FROM events WHERE deleted_at IS NULL",
    )
    .fetch_one(pool)
    .await?;
    Ok(stats)
}

async fn order_stats(pool: &PgPool) -> Result<OrderStats, DatabaseError> {
    let rows: Vec<(String, i64)> = sqlx::query_as("SELECT status, COUNT(*) FROM orders GROUP BY status")
        .fetch_all(pool)
        .await?;
    let total = rows.iter().map(|(_, n)| n).sum();
    Ok(OrderStats {
        total,
        by_status: rows.into_iter().collect(),
    })
}

impl From<RevenueRow> for RevenueStats {
    fn from(row: RevenueRow) -> Self {
        Self {
            growth_percent: percent_change(row.previous_30_days, row.last_30_days),
            currency: row.currency,
            total: row.total,
            last_30_days: row.last_30_days,
            previous_30_days: row.previous_30_days,
        }
    }
}

async fn revenue_stats(pool: &PgPool) -> Result<Vec<RevenueStats>, DatabaseError> {
    let rows = sqlx::query_as::<_, RevenueRow>(
        "SELECT currency, COALESCE(SUM(total), 0) AS total, \
         COALESCE(SUM(total) FILTER (WHERE paid_at >= NOW() - INTERVAL '30 days'), 0) AS last_30_days, \
         COALESCE(SUM(total) FILTER (WHERE paid_at >= NOW() - INTERVAL '60 days' \
             AND paid_at < NOW() - INTERVAL '30 days'), 0) AS previous_30_days \
         FROM orders WHERE status = 'paid' GROUP BY currency ORDER BY currency",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(RevenueStats::from).collect())
}

async fn enrollment_stats(pool: &PgPool) -> Result<EnrollmentStats, DatabaseError> {
    let stats = sqlx::query_as::<_, EnrollmentStats>(
        "SELECT COUNT(*) AS total, COUNT(*) FILTER (WHERE status = 'completed') AS completed FROM enrollments",
    )
    .fetch_one(pool)
    .await?;
    Ok(stats)
}

async fn registration_stats(pool: &PgPool) -> Result<RegistrationStats, DatabaseError> {
    let stats = sqlx::query_as::<_, RegistrationStats>(
        "SELECT COUNT(*) AS total FROM event_registrations WHERE status = 'registered'",
    )
    .fetch_one(pool)
    .await?;
    Ok(stats)
}

async fn top_books(pool: &PgPool, limit: i64) -> Result<Vec<TopBook>, DatabaseError> {
    let books = sqlx::query_as::<_, TopBook>(
        "SELECT b.id, b.title, SUM(oi.quantity)::BIGINT AS units_sold, \
         SUM(oi.unit_price * oi.quantity) AS revenue, o.currency \
         FROM order_items oi \
         JOIN orders o ON o.id = oi.order_id AND o.status = 'paid' \
         JOIN books b ON b.id = oi.item_id \
         WHERE oi.item_type = 'book' \
         GROUP BY b.id, b.title, o.currency \
         ORDER BY units_sold DESC, revenue DESC \
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(books)
}

async fn recent_orders(pool: &PgPool, limit: i64) -> Result<Vec<RecentOrder>, DatabaseError> {
    let orders = sqlx::query_as::<_, RecentOrder>(
        "SELECT o.id, o.order_number, u.email AS customer_email, o.status, o.total, o.currency, o.created_at \
         FROM orders o JOIN users u ON u.id = o.user_id \
         ORDER BY o.created_at DESC LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(orders)
}

pub async fn admin_stats(pool: &PgPool) -> Result<AdminStats, DatabaseError> {
    let (users, books, courses, events, orders, revenue, enrollments, registrations, top_books, recent_orders) = tokio::try_join!(
        user_stats(pool),
        catalogue_stats(pool, "books"),
        catalogue_stats(pool, "courses"),
        event_stats(pool),
        order_stats(pool),
        revenue_stats(pool),
        enrollment_stats(pool),
        registration_stats(pool),
        top_books(pool, 5),
        recent_orders(pool, 5),
    )?;

    Ok(AdminStats {
        users,
        books,
        courses,
        events,
        orders,
        revenue,
        enrollments,
        registrations,
        top_books,
        recent_orders,
        generated_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn growth_against_previous_period() {
        assert_eq!(percent_change(d("100"), d("150")), Some(50.0));
        assert_eq!(percent_change(d("200"), d("50")), Some(-75.0));
        assert_eq!(percent_change(d("3"), d("4")), Some(33.3));
    }

    #[test]
    fn revenue_keeps_currencies_apart() {
        let rows = vec![
            RevenueRow {
                currency: "NGN".to_string(),
                total: d("150000"),
                last_30_days: d("150000"),
                previous_30_days: Decimal::ZERO,
            },
            RevenueRow {
                currency: "USD".to_string(),
                total: d("300"),
                last_30_days: d("150"),
                previous_30_days: d("100"),
            },
        ];
        let stats: Vec<RevenueStats> = rows.into_iter().map(RevenueStats::from).collect();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].currency, "NGN");
        assert_eq!(stats[0].growth_percent, None);
        assert_eq!(stats[1].total, d("300"));
        assert_eq!(stats[1].growth_percent, Some(50.0));
    }

    #[test]
    fn growth_from_zero() {
        assert_eq!(percent_change(Decimal::ZERO, Decimal::ZERO), Some(0.0));
        assert_eq!(percent_change(Decimal::ZERO, d("10")), None);
    }
}
