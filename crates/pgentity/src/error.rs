//! Error types for pgentity

use thiserror::Error;

/// Result type alias for pgentity operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Error types for query building and entity persistence
#[derive(Debug, Error)]
pub enum StoreError {
    /// A filter used an operator key the compiler does not know.
    #[error("Unsupported query operator: {0}")]
    UnknownOperator(String),

    /// The query object has a malformed shape (bad `and$`/`or$`, `native$`, `fields$`...).
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Statement execution error, with the offending statement attached.
    #[error("Query error: {source} (statement: {statement})")]
    Execution {
        statement: String,
        #[source]
        source: tokio_postgres::Error,
    },

    /// Driver error raised outside of a statement (commit, rollback, connect).
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    /// Unique constraint violation
    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    /// Foreign key constraint violation
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Check constraint violation
    #[error("Check constraint violation: {0}")]
    CheckViolation(String),

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pool error
    #[cfg(feature = "pool")]
    #[error("Pool error: {0}")]
    Pool(String),

    /// Query timeout error
    #[error("Query timeout after {0:?}")]
    Timeout(std::time::Duration),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl StoreError {
    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create an invalid query error
    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::InvalidQuery(message.into())
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Check if this error was raised while building a statement (no I/O attempted).
    pub fn is_compile_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownOperator(_) | Self::InvalidQuery(_) | Self::Validation(_)
        )
    }

    /// Check if this is a unique violation error
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation(_))
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Check if this error means the connection is gone and a reconnect may help.
    pub fn is_connection_error(&self) -> bool {
        match self {
            Self::Connection(_) => true,
            #[cfg(feature = "pool")]
            Self::Pool(_) => true,
            Self::Database(e) | Self::Execution { source: e, .. } => e.is_closed(),
            _ => false,
        }
    }

    /// The statement text attached to an execution error, if any.
    pub fn statement(&self) -> Option<&str> {
        match self {
            Self::Execution { statement, .. } => Some(statement),
            _ => None,
        }
    }

    /// Parse a tokio_postgres error raised by `statement` into a more specific StoreError
    pub fn from_db_error(statement: &str, err: tokio_postgres::Error) -> Self {
        if let Some(db_err) = err.as_db_error() {
            let constraint = db_err.constraint().unwrap_or("unknown");
            let message = db_err.message();

            match db_err.code().code() {
                "23505" => return Self::UniqueViolation(format!("{}: {}", constraint, message)),
                "23503" => {
                    return Self::ForeignKeyViolation(format!("{}: {}", constraint, message));
                }
                "23514" => return Self::CheckViolation(format!("{}: {}", constraint, message)),
                _ => {}
            }
        }
        Self::Execution {
            statement: statement.to_string(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(feature = "pool")]
impl From<deadpool_postgres::PoolError> for StoreError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}
