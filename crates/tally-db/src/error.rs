//! # Database Error Types
//!
//! Error types for database operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError (this module) ← constraint classification                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError::Step { step: "insert order item", .. } ← inside transactions │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  AppError (backoffice) ← serialized for the shell                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A transaction that returns early with any of these is dropped without
//! commit, and sqlx rolls it back.

use thiserror::Error;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Inserting a duplicate SKU
    /// - Two writers generating the same order/invoice number
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    ///
    /// ## When This Occurs
    /// - Deleting a client that still has orders or invoices
    /// - Inserting an order for a client id that does not exist
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// Database connection failed (file, permissions, pragma checks).
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A migration script failed or could not be recorded.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Begin / commit failed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// The row exists but is in a state that forbids the operation.
    #[error("Invalid state: {message}")]
    InvalidState { message: String },

    /// A money amount does not fit in 64-bit cents.
    #[error("Amount out of range: {message}")]
    AmountOutOfRange { message: String },

    /// A step inside a multi-statement transaction failed.
    #[error("{step}: {source}")]
    Step {
        step: &'static str,
        #[source]
        source: Box<DbError>,
    },

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        DbError::InvalidState {
            message: message.into(),
        }
    }

    pub fn amount_out_of_range(message: impl Into<String>) -> Self {
        DbError::AmountOutOfRange {
            message: message.into(),
        }
    }

    /// Wraps this error with the name of the transaction step that failed.
    pub fn at_step(self, step: &'static str) -> Self {
        DbError::Step {
            step,
            source: Box::new(self),
        }
    }

    /// Strips any `Step` wrappers.
    pub fn root(&self) -> &DbError {
        match self {
            DbError::Step { source, .. } => source.root(),
            other => other,
        }
    }

    /// The innermost failing step, if the error came from a transaction.
    pub fn step(&self) -> Option<&'static str> {
        match self {
            DbError::Step { step, source } => source.step().or(Some(*step)),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), DbError::NotFound { .. })
    }

    pub fn is_foreign_key_violation(&self) -> bool {
        matches!(self.root(), DbError::ForeignKeyViolation { .. })
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // UNIQUE constraint: "UNIQUE constraint failed: <table>.<column>"
                // FK constraint: "FOREIGN KEY constraint failed"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

/// Attaches a step name to any error convertible into [`DbError`].
///
/// ```rust,ignore
/// sqlx::query("UPDATE client SET debt_cents = ?1 WHERE id = ?2")
///     .bind(new_debt)
///     .bind(client_id)
///     .execute(&mut *tx)
///     .await
///     .step("increment client debt")?;
/// ```
pub(crate) trait StepContext<T> {
    fn step(self, step: &'static str) -> DbResult<T>;
}

impl<T, E: Into<DbError>> StepContext<T> for Result<T, E> {
    fn step(self, step: &'static str) -> DbResult<T> {
        self.map_err(|e| e.into().at_step(step))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
