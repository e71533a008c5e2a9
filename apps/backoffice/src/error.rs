//! # Application Error Type
//!
//! Unified error type returned by every service.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Tally                                  │
//! │                                                                         │
//! │  Shell                       Rust Backoffice                            │
//! │  ─────                       ───────────────                            │
//! │                                                                         │
//! │  clients.delete(7)                                                      │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  Service Function                                                │  │
//! │  │  AppResult<T>                                                    │  │
//! │  │         │                                                        │  │
//! │  │         ▼                                                        │  │
//! │  │  Validation Error? ─── ValidationError::Required ──┐            │  │
//! │  │         │                                          │            │  │
//! │  │         ▼                                          ▼            │  │
//! │  │  Database Error? ──── DbError (root of Step) ──── AppError ────►│  │
//! │  │         │                                                        │  │
//! │  │         ▼                                                        │  │
//! │  │  Success ──────────────────────────────────────────────────────►│  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! │  { "code": "INTEGRITY_VIOLATION",                                       │
//! │    "message": "client has non-canceled orders" }                        │
//! │    → shell offers "cancel orders first"                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use tally_core::{CoreError, ValidationError};
use tally_db::DbError;

use crate::config::ConfigError;

/// Error returned from service calls.
///
/// ## Serialization
/// ```json
/// {
///   "code": "NOT_FOUND",
///   "message": "Client not found: 42"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,
}

/// Error codes surfaced to the shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Input validation failed
    ValidationError,

    /// Referenced client, order, invoice or product is absent
    NotFound,

    /// Delete refused because other rows still reference the record
    IntegrityViolation,

    /// Operation not allowed in the record's current status
    InvalidState,

    /// Storage or transaction failure
    DatabaseError,

    /// Configuration could not be loaded or is invalid
    ConfigError,

    /// Anything else
    InternalError,
}

impl AppError {
    /// Creates a new application error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        AppError {
            code,
            message: message.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(resource: &str, id: impl ToString) -> Self {
        AppError::new(
            ErrorCode::NotFound,
            format!("{} not found: {}", resource, id.to_string()),
        )
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::new(ErrorCode::ValidationError, message)
    }

    /// Creates an integrity error.
    pub fn integrity(message: impl Into<String>) -> Self {
        AppError::new(ErrorCode::IntegrityViolation, message)
    }

    /// Creates an invalid state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        AppError::new(ErrorCode::InvalidState, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        AppError::new(ErrorCode::InternalError, message)
    }
}

/// Converts database errors to application errors.
///
/// Step context is peeled off with [`DbError::root`] so the code reflects
/// the underlying failure; the step itself is kept in the log line.
impl From<DbError> for AppError {
    fn from(err: DbError) -> Self {
        let step = err.step();

        match err.root() {
            DbError::NotFound { entity, id } => AppError::not_found(entity, id),
            DbError::UniqueViolation { field, value } => AppError::new(
                ErrorCode::ValidationError,
                format!("{} '{}' already exists", field, value),
            ),
            DbError::ForeignKeyViolation { message } => {
                tracing::warn!(?step, "Foreign key violation: {}", message);
                AppError::integrity("record is still referenced by other rows")
            }
            DbError::InvalidState { message } => AppError::invalid_state(message.clone()),
            DbError::AmountOutOfRange { message } => {
                AppError::validation(format!("amount out of range: {}", message))
            }
            DbError::ConnectionFailed(_) => {
                AppError::new(ErrorCode::DatabaseError, "Database connection failed")
            }
            DbError::MigrationFailed(e) => {
                tracing::error!("Migration failed: {}", e);
                AppError::new(ErrorCode::DatabaseError, "Database migration failed")
            }
            DbError::QueryFailed(e) => {
                // Log the actual error but return a generic message
                tracing::error!(?step, "Database query failed: {}", e);
                AppError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
            DbError::TransactionFailed(e) => {
                tracing::error!(?step, "Transaction failed: {}", e);
                AppError::new(ErrorCode::DatabaseError, "Database transaction failed")
            }
            DbError::PoolExhausted => {
                AppError::new(ErrorCode::DatabaseError, "Database pool exhausted")
            }
            DbError::Internal(e) => {
                tracing::error!(?step, "Internal database error: {}", e);
                AppError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
            // root() never returns a Step
            DbError::Step { .. } => AppError::internal("Unexpected nested database error"),
        }
    }
}

/// Converts core errors to application errors.
impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidStatus { .. } => AppError::validation(err.to_string()),
            CoreError::Validation(e) => AppError::from(e),
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::validation(err.to_string())
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::new(ErrorCode::ConfigError, err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {}

/// Result alias for service calls.
pub type AppResult<T> = Result<T, AppError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_screaming_snake_code() {
        let err = AppError::integrity("client has non-canceled orders");
        let json = serde_json::to_value(&err).unwrap();

        assert_eq!(json["code"], "INTEGRITY_VIOLATION");
        assert_eq!(json["message"], "client has non-canceled orders");
    }

    #[test]
    fn test_db_error_mapping_sees_through_steps() {
        let err: AppError = DbError::not_found("Client", 42)
            .at_step("load client debt")
            .into();
        assert_eq!(err.code, ErrorCode::NotFound);
        assert_eq!(err.message, "Client not found: 42");

        let err: AppError = DbError::ForeignKeyViolation {
            message: "FOREIGN KEY constraint failed".into(),
        }
        .at_step("delete client")
        .into();
        assert_eq!(err.code, ErrorCode::IntegrityViolation);

        let err: AppError = DbError::invalid_state("order ORD-2026-0001 is canceled").into();
        assert_eq!(err.code, ErrorCode::InvalidState);

        let err: AppError = DbError::duplicate("sku", "CEM-50").into();
        assert_eq!(err.code, ErrorCode::ValidationError);
        assert_eq!(err.message, "sku 'CEM-50' already exists");

        let err: AppError = DbError::amount_out_of_range("line 1 total")
            .at_step("insert order items")
            .into();
        assert_eq!(err.code, ErrorCode::ValidationError);
        assert_eq!(err.message, "amount out of range: line 1 total");
    }

    #[test]
    fn test_validation_error_mapping() {
        let err: AppError = ValidationError::Required {
            field: "name".into(),
        }
        .into();
        assert_eq!(err.code, ErrorCode::ValidationError);
        assert_eq!(err.message, "name is required");

        let err: AppError = "SHIPPED".parse::<tally_core::OrderStatus>().unwrap_err().into();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }
}
