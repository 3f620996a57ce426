//! Order state transitions after payment and the access they grant.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config;
use crate::database::models::{Event, ItemType, Order, OrderItem, OrderStatus};
use crate::email::templates::{self, OrderLine};
use crate::error::ApiError;
use crate::monitoring::Severity;
use crate::payments::{PaidAmount, WebhookEvent, WebhookEventKind};
use crate::state::AppState;

/// A freshly paid order with what the buyer gained access to
#[derive(Debug, Clone)]
pub struct FulfilledOrder {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub customer_email: String,
    pub customer_name: String,
    pub courses: Vec<String>,
    pub events: Vec<(String, DateTime<Utc>)>,
    /// Paid events that filled up between checkout and payment; these need a refund
    pub overbooked: Vec<String>,
}

#[derive(Debug)]
pub enum MarkPaid {
    Fulfilled(FulfilledOrder),
    AlreadyProcessed,
    /// The provider collected a different amount or currency; the order stays pending
    AmountMismatch,
}

/// What a payment confirmation may do to an order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentCheck {
    Fulfil,
    AlreadyProcessed,
    AmountMismatch,
}

/// Only pending orders move to paid, and only when the collected amount settles the total
pub fn check_payment(order: &Order, paid: Option<&PaidAmount>) -> PaymentCheck {
    if order.status() != Some(OrderStatus::Pending) {
        return PaymentCheck::AlreadyProcessed;
    }
    match paid {
        Some(paid) if !paid.settles(order.total, &order.currency) => PaymentCheck::AmountMismatch,
        _ => PaymentCheck::Fulfil,
    }
}

/// A seat is free when the event is unlimited or other attendees leave room
pub fn has_seat(event: &Event, taken_by_others: i64) -> bool {
    event.seats_remaining(taken_by_others).map_or(true, |left| left > 0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    Paid,
    Failed,
    Duplicate,
    Ignored,
    AmountMismatch,
}

impl WebhookOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookOutcome::Paid => "paid",
            WebhookOutcome::Failed => "failed",
            WebhookOutcome::Duplicate => "duplicate",
            WebhookOutcome::Ignored => "ignored",
            WebhookOutcome::AmountMismatch => "amount_mismatch",
        }
    }
}

async fn mark_paid_in(
    tx: &mut Transaction<'_, Postgres>,
    order_id: Uuid,
    provider: Option<&str>,
    reference: Option<&str>,
    paid: Option<&PaidAmount>,
) -> Result<MarkPaid, ApiError> {
    // Row lock makes concurrent confirmations for one order take turns
    let current = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
        .bind(order_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Order {} not found", order_id)))?;

    match check_payment(&current, paid) {
        PaymentCheck::Fulfil => {}
        PaymentCheck::AlreadyProcessed => {
            debug!("Order {} is no longer pending; skipping fulfillment", order_id);
            return Ok(MarkPaid::AlreadyProcessed);
        }
        PaymentCheck::AmountMismatch => {
            warn!(
                "Order {} expects {} {} but the provider reported {:?}",
                current.order_number, current.total, current.currency, paid
            );
            return Ok(MarkPaid::AmountMismatch);
        }
    }

    let order = sqlx::query_as::<_, Order>(
        "UPDATE orders SET status = 'paid', paid_at = NOW(), updated_at = NOW(), \
         payment_provider = COALESCE($2, payment_provider), payment_reference = COALESCE($3, payment_reference) \
         WHERE id = $1 RETURNING *",
    )
    .bind(order_id)
    .bind(provider)
    .bind(reference)
    .fetch_one(&mut **tx)
    .await?;

    let items = sqlx::query_as::<_, OrderItem>("SELECT * FROM order_items WHERE order_id = $1 ORDER BY title")
        .bind(order.id)
        .fetch_all(&mut **tx)
        .await?;

    let (customer_email, customer_name): (String, String) =
        sqlx::query_as("SELECT email, name FROM users WHERE id = $1")
            .bind(order.user_id)
            .fetch_one(&mut **tx)
            .await?;

    let mut courses = Vec::new();
    let mut events = Vec::new();
    let mut overbooked = Vec::new();

    for item in &items {
        match ItemType::parse(&item.item_type) {
            Some(ItemType::Course) => {
                sqlx::query(
                    "INSERT INTO enrollments (id, user_id, course_id, order_id) VALUES ($1, $2, $3, $4) \
                     ON CONFLICT (user_id, course_id) DO UPDATE SET status = 'active', progress_percent = 0, \
                     enrolled_at = NOW(), completed_at = NULL, order_id = EXCLUDED.order_id \
                     WHERE enrollments.status = 'cancelled'",
                )
                .bind(Uuid::new_v4())
                .bind(order.user_id)
                .bind(item.item_id)
                .bind(order.id)
                .execute(&mut **tx)
                .await?;
                courses.push(item.title.clone());
            }
            Some(ItemType::Event) => {
                // Row lock serialises seat counting with other fulfillments and free registrations
                let event = sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1 FOR UPDATE")
                    .bind(item.item_id)
                    .fetch_one(&mut **tx)
                    .await?;
                let taken: i64 = sqlx::query_scalar(
                    "SELECT COUNT(*) FROM event_registrations \
                     WHERE event_id = $1 AND status = 'registered' AND user_id <> $2",
                )
                .bind(event.id)
                .bind(order.user_id)
                .fetch_one(&mut **tx)
                .await?;

                if !has_seat(&event, taken) {
                    warn!("Event '{}' filled before order {} was paid", event.title, order.order_number);
                    overbooked.push(item.title.clone());
                    continue;
                }

                sqlx::query(
                    "INSERT INTO event_registrations (id, event_id, user_id, order_id, attendee_name, attendee_email) \
                     VALUES ($1, $2, $3, $4, $5, $6) ON CONFLICT (event_id, user_id) DO UPDATE SET status = 'registered', \
                     order_id = EXCLUDED.order_id, updated_at = NOW() WHERE event_registrations.status = 'cancelled'",
                )
                .bind(Uuid::new_v4())
                .bind(event.id)
                .bind(order.user_id)
                .bind(order.id)
                .bind(&customer_name)
                .bind(&customer_email)
                .execute(&mut **tx)
                .await?;
                events.push((item.title.clone(), event.starts_at));
            }
            // Book access is derived from the paid order itself
            Some(ItemType::Book) | None => {}
        }
    }

    Ok(MarkPaid::Fulfilled(FulfilledOrder {
        order,
        items,
        customer_email,
        customer_name,
        courses,
        events,
        overbooked,
    }))
}

async fn mark_failed_in(tx: &mut Transaction<'_, Postgres>, order_id: Uuid) -> Result<bool, ApiError> {
    let result = sqlx::query("UPDATE orders SET status = 'failed', updated_at = NOW() WHERE id = $1 AND status = 'pending'")
        .bind(order_id)
        .execute(&mut **tx)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Move a pending order to paid and grant access. A second call is a no-op.
pub async fn mark_paid(
    pool: &PgPool,
    order_id: Uuid,
    provider: Option<&str>,
    reference: Option<&str>,
) -> Result<MarkPaid, ApiError> {
    let mut tx = pool.begin().await?;
    let outcome = mark_paid_in(&mut tx, order_id, provider, reference, None).await?;
    tx.commit().await?;

    if let MarkPaid::Fulfilled(fulfilled) = &outcome {
        info!("Order {} paid", fulfilled.order.order_number);
    }
    Ok(outcome)
}

pub async fn mark_failed(pool: &PgPool, order_id: Uuid) -> Result<bool, ApiError> {
    let mut tx = pool.begin().await?;
    let changed = mark_failed_in(&mut tx, order_id).await?;
    tx.commit().await?;
    Ok(changed)
}

async fn resolve_order_id(pool: &PgPool, event: &WebhookEvent) -> Result<Option<Uuid>, ApiError> {
    if event.order_id.is_some() {
        return Ok(event.order_id);
    }
    let Some(reference) = event.reference.as_deref() else {
        return Ok(None);
    };
    let id = sqlx::query_scalar::<_, Uuid>(
        "SELECT id FROM orders WHERE payment_reference = $1 OR order_number = $1 LIMIT 1",
    )
    .bind(reference)
    .fetch_optional(pool)
    .await?;
    Ok(id)
}

/// Apply a verified webhook event exactly once per (provider, event id)
pub async fn process_webhook_event(
    state: &AppState,
    pool: &PgPool,
    provider: &str,
    event: &WebhookEvent,
) -> Result<WebhookOutcome, ApiError> {
    if event.kind == WebhookEventKind::Ignored {
        return Ok(WebhookOutcome::Ignored);
    }

    let Some(order_id) = resolve_order_id(pool, event).await? else {
        warn!("{} webhook {} does not reference a known order", provider, event.id);
        return Ok(WebhookOutcome::Ignored);
    };

    let mut tx = pool.begin().await?;

    let inserted = sqlx::query(
        "INSERT INTO processed_webhooks (provider, event_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(provider)
    .bind(&event.id)
    .execute(&mut *tx)
    .await?;

    if inserted.rows_affected() == 0 {
        debug!("{} webhook {} already processed", provider, event.id);
        return Ok(WebhookOutcome::Duplicate);
    }

    let outcome = match event.kind {
        WebhookEventKind::Succeeded => {
            let paid = mark_paid_in(
                &mut tx,
                order_id,
                Some(provider),
                event.reference.as_deref(),
                event.amount.as_ref(),
            )
            .await?;
            tx.commit().await?;
            match paid {
                MarkPaid::Fulfilled(fulfilled) => {
                    info!("Order {} paid via {} webhook", fulfilled.order.order_number, provider);
                    for title in &fulfilled.overbooked {
                        state.monitor.track_error(
                            &format!("Order {} paid for full event '{}'", fulfilled.order.order_number, title),
                            "EVENT_OVERBOOKED",
                            None,
                            event.tenant.as_deref(),
                            Severity::Error,
                        );
                    }
                    send_fulfillment_emails(state, &fulfilled);
                    WebhookOutcome::Paid
                }
                MarkPaid::AlreadyProcessed => WebhookOutcome::Duplicate,
                MarkPaid::AmountMismatch => {
                    state.monitor.track_error(
                        &format!("{} webhook {} amount does not settle order {}", provider, event.id, order_id),
                        "PAYMENT_AMOUNT_MISMATCH",
                        None,
                        event.tenant.as_deref(),
                        Severity::Critical,
                    );
                    WebhookOutcome::AmountMismatch
                }
            }
        }
        WebhookEventKind::Failed => {
            if mark_failed_in(&mut tx, order_id).await? {
                info!("Order {} marked failed via {} webhook", order_id, provider);
            }
            tx.commit().await?;
            WebhookOutcome::Failed
        }
        WebhookEventKind::Ignored => WebhookOutcome::Ignored,
    };

    Ok(outcome)
}

pub fn send_fulfillment_emails(state: &AppState, fulfilled: &FulfilledOrder) {
    let site = &config::config().site.name;
    let to = &fulfilled.customer_email;

    let lines: Vec<OrderLine<'_>> = fulfilled
        .items
        .iter()
        .map(|item| OrderLine {
            title: &item.title,
            item_type: &item.item_type,
            unit_price: item.unit_price,
            quantity: item.quantity,
        })
        .collect();

    state.send_email(templates::order_confirmation(
        site,
        to,
        &fulfilled.order.order_number,
        &lines,
        fulfilled.order.total,
        &fulfilled.order.currency,
    ));

    for course in &fulfilled.courses {
        state.send_email(templates::enrollment_confirmation(site, to, course));
    }
    for (title, starts_at) in &fulfilled.events {
        state.send_email(templates::event_registration(
            site,
            to,
            &fulfilled.customer_name,
            title,
            &starts_at.to_rfc2822(),
        ));
    }
}
