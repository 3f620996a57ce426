use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use super::super::common::PageParams;
use crate::database::models::{Order, OrderItem};
use crate::database::{Page, Repository};
use crate::error::ApiError;
use crate::filter::FilterData;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, TenantPool, ValidatedTenant};
use crate::services::checkout::{self, CartItem, CheckoutResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CheckoutInput {
    pub items: Vec<CartItem>,
    pub provider: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// POST /api/checkout
pub async fn create(
    State(state): State<AppState>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(tenant): Extension<ValidatedTenant>,
    Extension(current): Extension<CurrentUser>,
    Json(input): Json<CheckoutInput>,
) -> ApiResult<CheckoutResult> {
    let result = checkout::checkout(
        &state,
        &pool,
        &tenant.name,
        &current.user,
        &input.items,
        input.provider.as_deref(),
    )
    .await?;
    Ok(ApiResponse::created(result))
}

/// Attach items to a page of orders with one query
pub async fn with_items(pool: &PgPool, orders: Page<Order>) -> Result<Page<OrderWithItems>, ApiError> {
    let ids: Vec<Uuid> = orders.items.iter().map(|o| o.id).collect();
    let items = sqlx::query_as::<_, OrderItem>("SELECT * FROM order_items WHERE order_id = ANY($1) ORDER BY title")
        .bind(&ids)
        .fetch_all(pool)
        .await?;

    let mut grouped: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
    for item in items {
        grouped.entry(item.order_id).or_default().push(item);
    }

    Ok(orders.map(|order| OrderWithItems {
        items: grouped.remove(&order.id).unwrap_or_default(),
        order,
    }))
}

/// GET /api/orders
pub async fn list(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(current): Extension<CurrentUser>,
    Query(params): Query<PageParams>,
) -> ApiResult<Page<OrderWithItems>> {
    let (page, limit) = params.resolve()?;
    let filter = FilterData {
        where_clause: Some(json!({ "user_id": current.user.id.to_string() })),
        order: Some(json!("created_at desc")),
        ..Default::default()
    };
    let orders = Repository::<Order>::new("orders", pool.clone()).paginate(filter, page, limit).await?;
    Ok(ApiResponse::success(with_items(&pool, orders).await?))
}

/// GET /api/orders/:id
pub async fn show(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<OrderWithItems> {
    let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(current.user.id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Order not found"))?;

    let items = sqlx::query_as::<_, OrderItem>("SELECT * FROM order_items WHERE order_id = $1 ORDER BY title")
        .bind(order.id)
        .fetch_all(&pool)
        .await?;

    Ok(ApiResponse::success(OrderWithItems { order, items }))
}
