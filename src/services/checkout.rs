//! Turning a cart into a pending order and a hosted payment page.

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use std::collections::HashSet;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config;
use crate::database::models::{ItemType, Order, OrderItem, User};
use crate::error::ApiError;
use crate::payments::{to_minor_units, CheckoutLine, CheckoutRequest};
use crate::services::fulfillment;
use crate::state::AppState;

pub const MAX_ITEMS_PER_ORDER: usize = 20;

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Hash)]
pub struct CartItem {
    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResult {
    pub order: Order,
    pub items: Vec<OrderItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkout_url: Option<String>,
}

/// Purchasable snapshot of a catalogue row
#[derive(Debug, Clone, FromRow)]
struct Purchasable {
    id: Uuid,
    title: String,
    price: Decimal,
    currency: String,
}

#[derive(Debug)]
struct PricedItem {
    item_type: ItemType,
    item: Purchasable,
}

/// `FOL-YYYYMMDD-XXXXXXXX`
pub fn order_number(now: DateTime<Utc>, id: Uuid) -> String {
    let suffix: String = id.simple().to_string()[..8].to_ascii_uppercase();
    format!("FOL-{}-{}", now.format("%Y%m%d"), suffix)
}

pub fn validate_cart(items: &[CartItem]) -> Result<(), ApiError> {
    if items.is_empty() {
        return Err(ApiError::bad_request("Cart is empty"));
    }
    if items.len() > MAX_ITEMS_PER_ORDER {
        return Err(ApiError::bad_request(format!(
            "An order may contain at most {} items",
            MAX_ITEMS_PER_ORDER
        )));
    }
    let unique: HashSet<&CartItem> = items.iter().collect();
    if unique.len() != items.len() {
        return Err(ApiError::bad_request("Cart contains duplicate items"));
    }
    Ok(())
}

/// Single currency and summed total
fn order_total(items: &[PricedItem]) -> Result<(Decimal, String), ApiError> {
    let currency = items
        .first()
        .map(|p| p.item.currency.clone())
        .unwrap_or_else(|| config::config().payments.default_currency.clone());

    if items.iter().any(|p| p.item.currency != currency) {
        return Err(ApiError::bad_request("All items in an order must use the same currency"));
    }
    Ok((items.iter().map(|p| p.item.price).sum(), currency))
}

async fn load_item(pool: &PgPool, cart_item: CartItem) -> Result<PricedItem, ApiError> {
    let extra = match cart_item.item_type {
        ItemType::Event => " AND starts_at > NOW()",
        _ => "",
    };
    let query = format!(
        "SELECT id, title, price, currency FROM {} WHERE id = $1 AND status = 'published' AND deleted_at IS NULL{}",
        cart_item.item_type.table(),
        extra
    );

    let item = sqlx::query_as::<_, Purchasable>(&query)
        .bind(cart_item.id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("{} {} is not available", cart_item.item_type.as_str(), cart_item.id)))?;

    Ok(PricedItem {
        item_type: cart_item.item_type,
        item,
    })
}

/// Reject items the user already owns, and full events
async fn check_ownership(pool: &PgPool, user_id: Uuid, priced: &PricedItem) -> Result<(), ApiError> {
    let (owned, message) = match priced.item_type {
        ItemType::Book => {
            let owned: bool = sqlx::query_scalar(
                "SELECT EXISTS (SELECT 1 FROM order_items oi JOIN orders o ON o.id = oi.order_id \
                 WHERE o.user_id = $1 AND o.status = 'paid' AND oi.item_type = 'book' AND oi.item_id = $2)",
            )
            .bind(user_id)
            .bind(priced.item.id)
            .fetch_one(pool)
            .await?;
            (owned, "You already own this book")
        }
        ItemType::Course => {
            let owned: bool = sqlx::query_scalar(
                "SELECT EXISTS (SELECT 1 FROM enrollments WHERE user_id = $1 AND course_id = $2 AND status <> 'cancelled')",
            )
            .bind(user_id)
            .bind(priced.item.id)
            .fetch_one(pool)
            .await?;
            (owned, "You are already enrolled in this course")
        }
        ItemType::Event => {
            let owned: bool = sqlx::query_scalar(
                "SELECT EXISTS (SELECT 1 FROM event_registrations WHERE user_id = $1 AND event_id = $2 AND status = 'registered')",
            )
            .bind(user_id)
            .bind(priced.item.id)
            .fetch_one(pool)
            .await?;
            if !owned && event_is_full(pool, priced.item.id).await? {
                return Err(ApiError::conflict("This event is full"));
            }
            (owned, "You are already registered for this event")
        }
    };

    if owned {
        return Err(ApiError::conflict(message));
    }
    Ok(())
}

async fn event_is_full(pool: &PgPool, event_id: Uuid) -> Result<bool, ApiError> {
    let full: bool = sqlx::query_scalar(
        "SELECT e.capacity IS NOT NULL AND e.capacity <= \
         (SELECT COUNT(*) FROM event_registrations r WHERE r.event_id = e.id AND r.status = 'registered') \
         FROM events e WHERE e.id = $1",
    )
    .bind(event_id)
    .fetch_one(pool)
    .await?;
    Ok(full)
}

async fn insert_order(
    pool: &PgPool,
    user_id: Uuid,
    total: Decimal,
    currency: &str,
    priced: &[PricedItem],
) -> Result<(Order, Vec<OrderItem>), ApiError> {
    let order_id = Uuid::new_v4();
    let mut tx = pool.begin().await?;

    let order = sqlx::query_as::<_, Order>(
        "INSERT INTO orders (id, order_number, user_id, status, total, currency) \
         VALUES ($1, $2, $3, 'pending', $4, $5) RETURNING *",
    )
    .bind(order_id)
    .bind(order_number(Utc::now(), order_id))
    .bind(user_id)
    .bind(total)
    .bind(currency)
    .fetch_one(&mut *tx)
    .await?;

    let mut items = Vec::with_capacity(priced.len());
    for p in priced {
        let item = sqlx::query_as::<_, OrderItem>(
            "INSERT INTO order_items (id, order_id, item_type, item_id, title, unit_price, quantity) \
             VALUES ($1, $2, $3, $4, $5, $6, 1) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(order.id)
        .bind(p.item_type.as_str())
        .bind(p.item.id)
        .bind(&p.item.title)
        .bind(p.item.price)
        .fetch_one(&mut *tx)
        .await?;
        items.push(item);
    }

    tx.commit().await?;
    Ok((order, items))
}

/// Validate the cart, persist a pending order, then either fulfil it (free)
/// or open a provider checkout session (paid)
pub async fn checkout(
    state: &AppState,
    pool: &PgPool,
    tenant: &str,
    user: &User,
    cart: &[CartItem],
    provider: Option<&str>,
) -> Result<CheckoutResult, ApiError> {
    validate_cart(cart)?;

    let priced = try_join_all(cart.iter().map(|item| load_item(pool, *item))).await?;
    try_join_all(priced.iter().map(|p| check_ownership(pool, user.id, p))).await?;
    let (total, currency) = order_total(&priced)?;

    // Resolve the provider before writing anything so a bad name is a clean 404
    let payment_provider = if total.is_zero() {
        None
    } else {
        Some(state.payments.resolve(provider)?)
    };

    let (order, items) = insert_order(pool, user.id, total, &currency, &priced).await?;
    info!("Created order {} ({} {}) for user {}", order.order_number, total, currency, user.id);

    let Some(payment_provider) = payment_provider else {
        let outcome = fulfillment::mark_paid(pool, order.id, Some("free"), None).await?;
        let order = match outcome {
            fulfillment::MarkPaid::Fulfilled(fulfilled) => {
                fulfillment::send_fulfillment_emails(state, &fulfilled);
                fulfilled.order
            }
            fulfillment::MarkPaid::AlreadyProcessed | fulfillment::MarkPaid::AmountMismatch => order,
        };
        return Ok(CheckoutResult { order, items, checkout_url: None });
    };

    let mut lines = Vec::with_capacity(items.len());
    for item in &items {
        lines.push(CheckoutLine {
            title: item.title.clone(),
            unit_amount: to_minor_units(item.unit_price, &currency)?,
            quantity: i64::from(item.quantity),
        });
    }

    let payments = &config::config().payments;
    let request = CheckoutRequest {
        order_id: order.id,
        order_number: order.order_number.clone(),
        tenant: tenant.to_string(),
        customer_email: user.email.clone(),
        currency: currency.clone(),
        lines,
        success_url: payments.success_url.replace("{order_id}", &order.id.to_string()),
        cancel_url: payments.cancel_url.replace("{order_id}", &order.id.to_string()),
    };

    let session = match payment_provider.create_checkout(&request).await {
        Ok(session) => session,
        Err(e) => {
            warn!("Checkout session failed for order {}: {}", order.order_number, e);
            fulfillment::mark_failed(pool, order.id).await?;
            return Err(e.into());
        }
    };

    let order = sqlx::query_as::<_, Order>(
        "UPDATE orders SET payment_provider = $2, payment_reference = $3, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(order.id)
    .bind(&session.provider)
    .bind(&session.reference)
    .fetch_one(pool)
    .await?;

    Ok(CheckoutResult {
        order,
        items,
        checkout_url: Some(session.url),
    })
}
