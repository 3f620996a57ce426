use axum::extract::Query;
use axum::Extension;
use serde::Deserialize;
use serde_json::json;

use super::super::common::PageParams;
use super::super::protected::checkout::{with_items, OrderWithItems};
use crate::database::models::{Order, OrderStatus};
use crate::database::{Page, Repository};
use crate::error::ApiError;
use crate::filter::FilterData;
use crate::middleware::{ApiResponse, ApiResult, TenantPool};

#[derive(Debug, Default, Deserialize)]
pub struct OrderListParams {
    pub status: Option<String>,
    #[serde(flatten)]
    pub page: PageParams,
}

pub fn order_filter(status: Option<&str>) -> Result<FilterData, ApiError> {
    let where_clause = match status.filter(|s| !s.is_empty()) {
        Some(s) => {
            let status = OrderStatus::parse(s).ok_or_else(|| ApiError::bad_request(format!("Unknown order status: {}", s)))?;
            json!({ "status": status.as_str() })
        }
        None => json!({}),
    };
    Ok(FilterData {
        where_clause: Some(where_clause),
        order: Some(json!("created_at desc")),
        ..Default::default()
    })
}

/// GET /api/admin/orders
pub async fn list(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Query(params): Query<OrderListParams>,
) -> ApiResult<Page<OrderWithItems>> {
    let (page, limit) = params.page.resolve()?;
    let orders = Repository::<Order>::new("orders", pool.clone())
        .paginate(order_filter(params.status.as_deref())?, page, limit)
        .await?;
    Ok(ApiResponse::success(with_items(&pool, orders).await?))
}
