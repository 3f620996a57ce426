use serde_json::Value;

use super::error::FilterError;
use super::is_valid_identifier;
use super::types::{FilterOp, FilterWhereOptions};

/// Turns a JSON condition tree into a parameterised WHERE body.
///
/// `{ "status": "published", "price": { "$lte": 20 }, "$or": [ ... ] }`
/// becomes `"status" = $1 AND "price" <= $2 AND (... OR ...)`.
pub struct FilterWhere {
    param_values: Vec<Value>,
    param_index: usize,
}

impl FilterWhere {
    pub fn new(starting_param_index: usize) -> Self {
        Self {
            param_values: vec![],
            param_index: starting_param_index,
        }
    }

    pub fn generate(
        where_data: &Value,
        starting_param_index: usize,
        options: &FilterWhereOptions,
    ) -> Result<(String, Vec<Value>), FilterError> {
        let mut filter_where = Self::new(starting_param_index);
        let mut conditions = Self::soft_delete_conditions(options);
        conditions.extend(filter_where.parse_node(where_data)?);
        Ok((Self::join_and(conditions), filter_where.param_values))
    }

    pub fn generate_empty(options: &FilterWhereOptions) -> (String, Vec<Value>) {
        (Self::join_and(Self::soft_delete_conditions(options)), vec![])
    }

    pub fn validate(where_data: &Value) -> Result<(), FilterError> {
        match where_data {
            Value::Null | Value::Object(_) => Ok(()),
            _ => Err(FilterError::InvalidWhereClause("WHERE must be an object".to_string())),
        }
    }

    fn soft_delete_conditions(options: &FilterWhereOptions) -> Vec<String> {
        if options.soft_delete {
            vec!["\"deleted_at\" IS NULL".to_string()]
        } else {
            vec![]
        }
    }

    fn join_and(conditions: Vec<String>) -> String {
        if conditions.is_empty() {
            "1=1".to_string()
        } else {
            conditions.join(" AND ")
        }
    }

    fn parse_node(&mut self, node: &Value) -> Result<Vec<String>, FilterError> {
        let obj = match node {
            Value::Null => return Ok(vec![]),
            Value::Object(obj) => obj,
            _ => return Err(FilterError::InvalidWhereClause("Condition must be an object".to_string())),
        };

        let mut conditions = Vec::new();
        for (key, value) in obj {
            if key.starts_with('$') {
                conditions.push(self.parse_logical_operator(key, value)?);
            } else {
                conditions.extend(self.parse_field_condition(key, value)?);
            }
        }
        Ok(conditions)
    }

    fn parse_logical_operator(&mut self, op: &str, value: &Value) -> Result<String, FilterError> {
        match op {
            "$and" | "$or" => {
                let arr = value
                    .as_array()
                    .ok_or_else(|| FilterError::InvalidOperatorData(format!("{} requires array", op)))?;
                if arr.is_empty() {
                    // Empty OR matches nothing, empty AND matches everything
                    return Ok(if op == "$or" { "1=0" } else { "1=1" }.to_string());
                }
                let mut parts = Vec::with_capacity(arr.len());
                for branch in arr {
                    parts.push(format!("({})", Self::join_and(self.parse_node(branch)?)));
                }
                let joiner = if op == "$and" { " AND " } else { " OR " };
                Ok(format!("({})", parts.join(joiner)))
            }
            "$not" => {
                let inner = Self::join_and(self.parse_node(value)?);
                Ok(format!("NOT ({})", inner))
            }
            _ => Err(FilterError::UnsupportedOperator(op.to_string())),
        }
    }

    fn parse_field_condition(&mut self, field: &str, value: &Value) -> Result<Vec<String>, FilterError> {
        if !is_valid_identifier(field) {
            return Err(FilterError::InvalidColumn(field.to_string()));
        }
        let column = format!("\"{}\"", field);

        match value {
            Value::Object(obj) if obj.keys().any(|k| k.starts_with('$')) => {
                let mut out = Vec::with_capacity(obj.len());
                for (op_key, op_val) in obj {
                    let operator =
                        FilterOp::parse(op_key).ok_or_else(|| FilterError::UnsupportedOperator(op_key.clone()))?;
                    out.push(self.build_condition(&column, operator, op_val)?);
                }
                Ok(out)
            }
            // Implicit equality: { field: value }
            _ => Ok(vec![self.build_condition(&column, FilterOp::Eq, value)?]),
        }
    }

    fn build_condition(&mut self, column: &str, operator: FilterOp, data: &Value) -> Result<String, FilterError> {
        match operator {
            FilterOp::Eq if data.is_null() => Ok(format!("{} IS NULL", column)),
            FilterOp::Ne if data.is_null() => Ok(format!("{} IS NOT NULL", column)),
            FilterOp::Eq | FilterOp::Ne | FilterOp::Gt | FilterOp::Gte | FilterOp::Lt | FilterOp::Lte | FilterOp::ILike => {
                if data.is_array() || data.is_object() {
                    return Err(FilterError::InvalidOperatorData(format!(
                        "{:?} requires a scalar value",
                        operator
                    )));
                }
                let sql_op = operator.comparison().unwrap_or("=");
                Ok(format!("{} {} {}", column, sql_op, self.param(data.clone())))
            }
            FilterOp::In => match data {
                Value::Array(values) if values.is_empty() => Ok("1=0".to_string()),
                Value::Array(values) => {
                    let params: Vec<String> = values.iter().map(|v| self.param(v.clone())).collect();
                    Ok(format!("{} IN ({})", column, params.join(", ")))
                }
                other => Ok(format!("{} = {}", column, self.param(other.clone()))),
            },
            FilterOp::Between => match data {
                Value::Array(values) if values.len() == 2 => Ok(format!(
                    "{} BETWEEN {} AND {}",
                    column,
                    self.param(values[0].clone()),
                    self.param(values[1].clone())
                )),
                _ => Err(FilterError::InvalidOperatorData(
                    "$between requires an array of exactly 2 values".to_string(),
                )),
            },
            // Array column overlaps any of the given values
            FilterOp::Any => match data {
                Value::Array(values) if values.is_empty() => Ok("1=0".to_string()),
                Value::Array(values) => {
                    let params: Vec<String> = values.iter().map(|v| self.param(v.clone())).collect();
                    Ok(format!("{} && ARRAY[{}]", column, params.join(", ")))
                }
                other => Ok(format!("{} = ANY({})", self.param(other.clone()), column)),
            },
        }
    }

    fn param(&mut self, value: Value) -> String {
        self.param_values.push(value);
        self.param_index += 1;
        format!("${}", self.param_index)
    }
}
