use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::migrate::MigrateError;
use thiserror::Error;

/// PostgreSQL SQLSTATE raised when `lock_timeout` expires
const SQLSTATE_LOCK_NOT_AVAILABLE: &str = "55P03";
/// PostgreSQL SQLSTATE raised when `statement_timeout` expires
const SQLSTATE_QUERY_CANCELED: &str = "57014";

/// Top-level error type for the entire application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Settlement error: {0}")]
    Settlement(#[from] SettlementError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("A verified phone number is required")]
    PhoneRequired,
}

/// Settlement-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettlementError {
    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: Decimal, available: Decimal },

    #[error("Product not found: {slug}")]
    ProductNotFound { slug: String },

    #[error("Wallet not found for owner {0}")]
    WalletNotFound(String),

    #[error("Treasury wallet {0} is not provisioned")]
    TreasuryNotFound(String),

    /// Row lock could not be acquired before the deadline. Retriable.
    #[error("Timed out waiting for wallet lock")]
    LockTimeout,
}

impl AppError {
    /// Whether the caller may safely retry the same request
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            AppError::Settlement(SettlementError::LockTimeout) | AppError::Database(_)
        )
    }
}

impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &error {
            if let Some(code) = db.code() {
                if code == SQLSTATE_LOCK_NOT_AVAILABLE || code == SQLSTATE_QUERY_CANCELED {
                    return AppError::Settlement(SettlementError::LockTimeout);
                }
            }
        }
        AppError::Database(error)
    }
}

impl From<MigrateError> for AppError {
    fn from(error: MigrateError) -> Self {
        AppError::Internal(format!("Migration error: {:?}", error))
    }
}

/// API error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String, Option<serde_json::Value>) {
        match self {
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Authentication required".to_string(),
                None,
            ),
            AppError::Forbidden => (
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                "Admin role required".to_string(),
                None,
            ),
            AppError::PhoneRequired => (
                StatusCode::BAD_REQUEST,
                "PHONE_REQUIRED",
                "A phone number is required to use the wallet".to_string(),
                None,
            ),
            AppError::InvalidInput(msg) => (
                StatusCode::BAD_REQUEST,
                "INVALID_INPUT",
                msg.clone(),
                None,
            ),
            AppError::Settlement(SettlementError::ProductNotFound { slug }) => (
                StatusCode::NOT_FOUND,
                "PRODUCT_NOT_FOUND",
                format!("Product not found: {}", slug),
                Some(serde_json::json!({ "slug": slug })),
            ),
            AppError::Settlement(SettlementError::InsufficientBalance { required, available }) => (
                StatusCode::PAYMENT_REQUIRED,
                "INSUFFICIENT_BALANCE",
                "Wallet balance is insufficient for this purchase".to_string(),
                Some(serde_json::json!({
                    "required": required.to_string(),
                    "available": available.to_string(),
                })),
            ),
            AppError::Settlement(SettlementError::WalletNotFound(_)) => (
                StatusCode::NOT_FOUND,
                "WALLET_NOT_FOUND",
                "Wallet not found".to_string(),
                None,
            ),
            AppError::Settlement(SettlementError::TreasuryNotFound(_)) => (
                StatusCode::NOT_FOUND,
                "TREASURY_NOT_FOUND",
                "Treasury wallet is not available".to_string(),
                None,
            ),
            AppError::Settlement(SettlementError::LockTimeout) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "LOCK_TIMEOUT",
                "The wallet is busy, please retry".to_string(),
                Some(serde_json::json!({ "retriable": true })),
            ),
            AppError::Database(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "DATABASE_ERROR",
                "A database error occurred".to_string(),
                Some(serde_json::json!({ "retriable": true })),
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
                None,
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = self.parts();
        let retriable = self.is_retriable();

        let body = Json(ErrorResponse {
            error: message,
            error_code: error_code.to_string(),
            details,
        });

        let mut response = (status, body).into_response();
        if retriable {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
        }
        response
    }
}

/// Result type alias for the application
pub type AppResult<T> = Result<T, AppError>;
