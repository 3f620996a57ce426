//! Query-string parsing and catalogue helpers shared by the handler tiers.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::PgPool;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ApiError;

pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Raw `page`/`limit` values. Parsed by hand so bad input gets the JSON error envelope.
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl PageParams {
    pub fn resolve(&self) -> Result<(i64, i64), ApiError> {
        let page = parse_opt::<i64>("page", self.page.as_deref())?.unwrap_or(1);
        let limit = parse_opt::<i64>("limit", self.limit.as_deref())?.unwrap_or(DEFAULT_PAGE_SIZE);
        if page < 1 || limit < 1 {
            return Err(ApiError::bad_request("page and limit must be positive"));
        }
        Ok((page, limit))
    }
}

/// Blank values count as absent
pub fn parse_opt<T: FromStr>(name: &str, value: Option<&str>) -> Result<Option<T>, ApiError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| ApiError::bad_request(format!("Invalid value for '{}': {}", name, raw))),
    }
}

pub fn parse_bool(name: &str, value: Option<&str>) -> Result<Option<bool>, ApiError> {
    match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") => Ok(None),
        Some("true") | Some("1") => Ok(Some(true)),
        Some("false") | Some("0") => Ok(Some(false)),
        Some(other) => Err(ApiError::bad_request(format!("Invalid value for '{}': {}", name, other))),
    }
}

/// Price bounds become float parameters; numeric columns compare against float8 directly
pub fn price_bound(name: &str, value: Option<&str>) -> Result<Option<Value>, ApiError> {
    let Some(amount) = parse_opt::<Decimal>(name, value)? else {
        return Ok(None);
    };
    if amount.is_sign_negative() {
        return Err(ApiError::bad_request(format!("'{}' must not be negative", name)));
    }
    Ok(amount.to_f64().map(|f| json!(f)))
}

/// `%term%` match on any of the columns
pub fn search_clause(term: &str, columns: &[&str]) -> Value {
    let pattern = format!("%{}%", term.trim().replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_"));
    let alternatives: Vec<Value> = columns.iter().map(|c| json!({ *c: { "$ilike": pattern } })).collect();
    json!({ "$or": alternatives })
}

/// Join conditions with `$and`; an empty list matches everything
pub fn all_of(conditions: Vec<Value>) -> Value {
    json!({ "$and": conditions })
}

pub async fn ensure_slug_available(
    pool: &PgPool,
    table: &'static str,
    slug: &str,
    exclude_id: Option<Uuid>,
) -> Result<(), ApiError> {
    let query = format!(
        "SELECT EXISTS (SELECT 1 FROM {} WHERE slug = $1 AND ($2::uuid IS NULL OR id <> $2))",
        table
    );
    let taken: bool = sqlx::query_scalar(&query).bind(slug).bind(exclude_id).fetch_one(pool).await?;
    if taken {
        return Err(ApiError::conflict(format!("Slug '{}' is already in use", slug)));
    }
    Ok(())
}

/// Whether a status change should stamp `published_at`
pub fn becomes_published(status: &str, already_published: bool) -> bool {
    status == "published" && !already_published
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_params_default_and_validate() {
        assert_eq!(PageParams::default().resolve().unwrap(), (1, DEFAULT_PAGE_SIZE));
        let params = PageParams { page: Some("3".into()), limit: Some("50".into()) };
        assert_eq!(params.resolve().unwrap(), (3, 50));
        assert!(PageParams { page: Some("abc".into()), limit: None }.resolve().is_err());
        assert!(PageParams { page: Some("0".into()), limit: None }.resolve().is_err());
    }

    #[test]
    fn numeric_filters_reject_garbage() {
        assert_eq!(price_bound("min_price", Some("9.99")).unwrap(), Some(json!(9.99)));
        assert_eq!(price_bound("min_price", Some(" ")).unwrap(), None);
        assert!(price_bound("min_price", Some("cheap")).is_err());
        assert!(price_bound("max_price", Some("-1")).is_err());
    }

    #[test]
    fn bool_params() {
        assert_eq!(parse_bool("featured", Some("true")).unwrap(), Some(true));
        assert_eq!(parse_bool("featured", Some("0")).unwrap(), Some(false));
        assert_eq!(parse_bool("featured", None).unwrap(), None);
        assert!(parse_bool("featured", Some("yes please")).is_err());
    }

    #[test]
    fn search_escapes_wildcards() {
        let clause = search_clause("50%_off", &["title"]);
        assert_eq!(clause["$or"][0]["title"]["$ilike"], "%50\\%\\_off%");
    }

    #[test]
    fn publishing_stamps_once() {
        assert!(becomes_published("published", false));
        assert!(!becomes_published("published", true));
        assert!(!becomes_published("draft", false));
    }
}
