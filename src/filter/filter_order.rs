use serde_json::Value;

use super::error::FilterError;
use super::is_valid_identifier;
use super::types::{FilterOrderInfo, SortDirection};

pub struct FilterOrder;

impl FilterOrder {
    /// Accepts `"created_at desc, title"`, `["price asc"]` or `{"price": "desc"}`
    pub fn validate_and_parse(order: &Value) -> Result<Vec<FilterOrderInfo>, FilterError> {
        let infos = match order {
            Value::Null => vec![],
            Value::String(s) => Self::parse_order_string(s)?,
            Value::Array(arr) => {
                let mut out = Vec::new();
                for v in arr {
                    let s = v
                        .as_str()
                        .ok_or_else(|| FilterError::InvalidOperatorData("order entries must be strings".to_string()))?;
                    out.extend(Self::parse_order_string(s)?);
                }
                out
            }
            Value::Object(obj) => {
                let mut out = Vec::new();
                for (column, dir) in obj {
                    out.push(FilterOrderInfo {
                        column: column.clone(),
                        sort: Self::parse_direction(dir.as_str().unwrap_or("asc"))?,
                    });
                }
                out
            }
            _ => return Err(FilterError::InvalidOperatorData("Unsupported order format".to_string())),
        };

        for info in &infos {
            if !is_valid_identifier(&info.column) {
                return Err(FilterError::InvalidColumn(info.column.clone()));
            }
        }
        Ok(infos)
    }

    fn parse_order_string(s: &str) -> Result<Vec<FilterOrderInfo>, FilterError> {
        let mut out = Vec::new();
        for part in s.split(',') {
            let mut it = part.split_whitespace();
            if let Some(column) = it.next() {
                let sort = Self::parse_direction(it.next().unwrap_or("asc"))?;
                out.push(FilterOrderInfo { column: column.to_string(), sort });
            }
        }
        Ok(out)
    }

    fn parse_direction(dir: &str) -> Result<SortDirection, FilterError> {
        if dir.eq_ignore_ascii_case("asc") {
            Ok(SortDirection::Asc)
        } else if dir.eq_ignore_ascii_case("desc") {
            Ok(SortDirection::Desc)
        } else {
            Err(FilterError::InvalidOperatorData(format!("Invalid sort direction: {}", dir)))
        }
    }

    pub fn generate(infos: &[FilterOrderInfo]) -> String {
        if infos.is_empty() {
            return String::new();
        }
        let parts: Vec<String> = infos
            .iter()
            .map(|i| format!("\"{}\" {}", i.column, i.sort.to_sql()))
            .collect();
        format!("ORDER BY {}", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_all_shapes() {
        let from_str = FilterOrder::validate_and_parse(&json!("published_at desc, title")).unwrap();
        assert_eq!(FilterOrder::generate(&from_str), "ORDER BY \"published_at\" DESC, \"title\" ASC");

        let from_arr = FilterOrder::validate_and_parse(&json!(["price ASC"])).unwrap();
        assert_eq!(from_arr[0].sort, SortDirection::Asc);

        let from_obj = FilterOrder::validate_and_parse(&json!({"price": "desc"})).unwrap();
        assert_eq!(from_obj[0].sort, SortDirection::Desc);
    }

    #[test]
    fn rejects_injection() {
        assert!(FilterOrder::validate_and_parse(&json!("price; DROP TABLE books")).is_err());
        assert!(FilterOrder::validate_and_parse(&json!("price sideways")).is_err());
    }
}
