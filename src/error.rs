/// Error types
///
/// Each component reports its own error enum. Handlers return `AppError`,
/// which decides the status code, the public message and the log level.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use std::error::Error as StdError;
use std::fmt;

// Component errors

/// Validation errors for request input
#[derive(Debug, Clone)]
pub enum ValidationError {
    EmptyField(String),
    TooLong(String, usize),
    InvalidFormat(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyField(field) => write!(f, "{} is empty", field),
            ValidationError::TooLong(field, max) => {
                write!(f, "{} is too long (maximum {} characters)", field, max)
            }
            ValidationError::InvalidFormat(field) => write!(f, "{} has invalid format", field),
        }
    }
}

impl StdError for ValidationError {}

/// Persistence errors shared by the user and refresh-token stores
#[derive(Debug)]
pub enum StorageError {
    NotFound,
    Duplicate(String),
    Unavailable(String),
    Query(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::NotFound => write!(f, "Record not found"),
            StorageError::Duplicate(what) => write!(f, "Duplicate entry: {}", what),
            StorageError::Unavailable(msg) => write!(f, "Storage unavailable: {}", msg),
            StorageError::Query(msg) => write!(f, "Query error: {}", msg),
        }
    }
}

impl StdError for StorageError {}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StorageError::NotFound,
            // 23505 = unique_violation
            sqlx::Error::Database(ref db) if db.code().as_deref() == Some("23505") => {
                StorageError::Duplicate(db.constraint().unwrap_or("unique key").to_string())
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StorageError::Unavailable(err.to_string())
            }
            other => StorageError::Query(other.to_string()),
        }
    }
}

/// Password hashing errors
///
/// Verification has one failure shape. Wrong password, malformed hash and
/// unsupported cost all end up as `VerificationFailure`.
#[derive(Debug)]
pub enum PasswordError {
    HashingFailure(String),
    VerificationFailure,
}

impl fmt::Display for PasswordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PasswordError::HashingFailure(msg) => write!(f, "Password hashing failed: {}", msg),
            PasswordError::VerificationFailure => write!(f, "Password verification failed"),
        }
    }
}

impl StdError for PasswordError {}

/// Access token signing and verification errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    MalformedToken,
    BadSignature,
    Expired,
    IssuerMismatch,
    SigningFailure(String),
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenError::MalformedToken => write!(f, "Malformed token"),
            TokenError::BadSignature => write!(f, "Token signature mismatch"),
            TokenError::Expired => write!(f, "Token has expired"),
            TokenError::IssuerMismatch => write!(f, "Token issuer mismatch"),
            TokenError::SigningFailure(msg) => write!(f, "Token signing failed: {}", msg),
        }
    }
}

impl StdError for TokenError {}

/// Header credential extraction errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    MissingCredential,
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialError::MissingCredential => write!(f, "Missing or malformed credential"),
        }
    }
}

impl StdError for CredentialError {}

/// Startup configuration errors. Fatal; never rendered as an HTTP response.
#[derive(Debug)]
pub enum ConfigError {
    MissingRequired(String),
    InvalidValue(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingRequired(msg) => write!(f, "Missing required config: {}", msg),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid config value: {}", msg),
        }
    }
}

impl StdError for ConfigError {}

// Caller-visible authentication outcomes

/// `InvalidCredentials` covers both an unknown email and a wrong password.
/// `InvalidRefreshToken` covers unknown, expired and revoked refresh tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    InvalidCredentials,
    InvalidRefreshToken,
    Unauthorized,
    Forbidden,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::InvalidCredentials => write!(f, "Incorrect email or password"),
            AuthError::InvalidRefreshToken => write!(f, "Invalid refresh token"),
            AuthError::Unauthorized => write!(f, "Unauthorized"),
            AuthError::Forbidden => write!(f, "Forbidden"),
        }
    }
}

impl StdError for AuthError {}

// Handler error

#[derive(Debug)]
pub enum AppError {
    Validation(ValidationError),
    Storage(StorageError),
    Auth(AuthError),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(e) => write!(f, "{}", e),
            AppError::Storage(e) => write!(f, "{}", e),
            AppError::Auth(e) => write!(f, "{}", e),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl StdError for AppError {}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err)
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::Storage(err)
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Auth(err)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Storage(err.into())
    }
}

impl From<PasswordError> for AppError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::VerificationFailure => AppError::Auth(AuthError::InvalidCredentials),
            PasswordError::HashingFailure(msg) => AppError::Internal(msg),
        }
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::SigningFailure(msg) => AppError::Internal(msg),
            _ => AppError::Auth(AuthError::Unauthorized),
        }
    }
}

impl From<CredentialError> for AppError {
    fn from(_: CredentialError) -> Self {
        AppError::Auth(AuthError::Unauthorized)
    }
}

impl AppError {
    /// Stable code and public message. Storage and internal details stay in
    /// the log.
    pub fn public_parts(&self) -> (&'static str, String) {
        match self {
            AppError::Validation(e) => ("VALIDATION_ERROR", e.to_string()),
            AppError::Storage(StorageError::NotFound) => {
                ("NOT_FOUND", "Resource not found".to_string())
            }
            AppError::Storage(StorageError::Duplicate(_)) => {
                ("DUPLICATE_ENTRY", "Resource already exists".to_string())
            }
            AppError::Storage(StorageError::Unavailable(_)) => (
                "SERVICE_UNAVAILABLE",
                "Storage temporarily unavailable".to_string(),
            ),
            AppError::Storage(StorageError::Query(_)) => {
                ("STORAGE_ERROR", "Storage error occurred".to_string())
            }
            AppError::Auth(e @ (AuthError::InvalidCredentials | AuthError::InvalidRefreshToken)) => {
                ("AUTH_FAILURE", e.to_string())
            }
            AppError::Auth(AuthError::Unauthorized) => (
                "UNAUTHORIZED",
                "Missing, invalid or expired access token".to_string(),
            ),
            AppError::Auth(AuthError::Forbidden) => ("FORBIDDEN", "Forbidden".to_string()),
            AppError::Internal(_) => ("INTERNAL_ERROR", "Internal server error".to_string()),
        }
    }

    fn log(&self, error_id: &str) {
        match self {
            AppError::Validation(_) | AppError::Auth(_) | AppError::Storage(StorageError::Duplicate(_)) => {
                tracing::warn!(error_id, error = %self, "Request rejected");
            }
            AppError::Storage(_) | AppError::Internal(_) => {
                tracing::error!(error_id, error = %self, "Request failed");
            }
        }
    }
}

/// JSON body of every error response
#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    pub error_id: String,
    pub message: String,
    pub code: String,
    pub status: u16,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn from_error(err: &AppError, error_id: &str) -> Self {
        let (code, message) = err.public_parts();
        Self {
            error_id: error_id.to_string(),
            message,
            code: code.to_string(),
            status: err.status_code().as_u16(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let error_id = uuid::Uuid::new_v4().to_string();
        self.log(&error_id);

        HttpResponse::build(self.status_code()).json(ErrorResponse::from_error(self, &error_id))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Storage(StorageError::NotFound) => StatusCode::NOT_FOUND,
            AppError::Storage(StorageError::Duplicate(_)) => StatusCode::CONFLICT,
            AppError::Storage(StorageError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Storage(StorageError::Query(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Auth(AuthError::Forbidden) => StatusCode::FORBIDDEN,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Per-request tag for handler logs
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub request_id: String,
    pub operation: &'static str,
    pub user_id: Option<String>,
}

impl ErrorContext {
    pub fn new(operation: &'static str) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            operation,
            user_id: None,
        }
    }

    pub fn with_user_id(mut self, user_id: String) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn log_error(&self, error: &AppError) {
        tracing::warn!(
            request_id = %self.request_id,
            operation = self.operation,
            user_id = ?self.user_id,
            error = %error,
            "Operation failed"
        );
    }
}
