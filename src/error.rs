use rusqlite::Error as RusqliteError;
use std::io;
use thiserror::Error;

use crate::query::Operator;

#[derive(Error, Debug)]
pub enum SocietyError {
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] RusqliteError),

    #[error("Connection pool error: {0}")]
    PoolError(#[from] r2d2::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unknown table '{0}'")]
    UnknownTable(String),

    #[error("Unknown field '{field}' on table '{table}'")]
    UnknownField { table: String, field: String },

    #[error("Unknown relation '{relation}' on table '{table}'")]
    UnknownRelation { table: String, relation: String },

    #[error("Type mismatch on field '{field}': expected {expected}, got {found}")]
    TypeMismatch {
        field: String,
        expected: String,
        found: String,
    },

    #[error("Operator '{operator}' is not supported on {col_type} field '{field}'")]
    UnsupportedOperator {
        field: String,
        operator: Operator,
        col_type: &'static str,
    },

    #[error("Failed to load relation '{relation}': {source}")]
    RelationLoadError {
        relation: String,
        #[source]
        source: RusqliteError,
    },

    #[error("Query cancelled")]
    Cancelled,

    #[error("Error: {0}")]
    Error(String),
}

impl SocietyError {
    /// True for errors caused by the request itself rather than the store.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            SocietyError::InvalidRequest(_)
                | SocietyError::UnknownField { .. }
                | SocietyError::UnknownRelation { .. }
                | SocietyError::TypeMismatch { .. }
                | SocietyError::UnsupportedOperator { .. }
        )
    }

    /// Stable name of the error kind, used in API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            SocietyError::IoError(_) => "IoError",
            SocietyError::DatabaseError(_) => "DatabaseError",
            SocietyError::PoolError(_) => "PoolError",
            SocietyError::InvalidRequest(_) => "InvalidRequestError",
            SocietyError::UnknownTable(_) => "UnknownTableError",
            SocietyError::UnknownField { .. } => "UnknownFieldError",
            SocietyError::UnknownRelation { .. } => "UnknownRelationError",
            SocietyError::TypeMismatch { .. } => "TypeMismatchError",
            SocietyError::UnsupportedOperator { .. } => "UnsupportedOperatorError",
            SocietyError::RelationLoadError { .. } => "RelationLoadError",
            SocietyError::Cancelled => "CancelledError",
            SocietyError::Error(_) => "Error",
        }
    }

    pub(crate) fn type_mismatch(
        field: &str,
        expected: impl Into<String>,
        found: &serde_json::Value,
    ) -> Self {
        SocietyError::TypeMismatch {
            field: field.to_owned(),
            expected: expected.into(),
            found: json_kind(found).to_owned(),
        }
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
