use thiserror::Error;

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Invalid WHERE clause: {0}")]
    InvalidWhereClause(String),

    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    #[error("Invalid operator data: {0}")]
    InvalidOperatorData(String),

    #[error("Invalid order: {0}")]
    InvalidOrder(String),
}
