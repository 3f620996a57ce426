use thiserror::Error;

/// Rejected filter input. Every variant is the caller's fault and maps to 400.
#[derive(Error, Debug)]
pub enum FilterError {
    #[error("'{0}' is not a valid table name")]
    InvalidTableName(String),

    #[error("'{0}' is not a valid column name")]
    InvalidColumn(String),

    #[error("Malformed where clause: {0}")]
    InvalidWhereClause(String),

    #[error("Unknown filter operator '{0}'")]
    UnsupportedOperator(String),

    #[error("Bad operand: {0}")]
    InvalidOperatorData(String),

    #[error("Invalid pagination: {0}")]
    InvalidPagination(String),
}
