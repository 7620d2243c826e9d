/// Account routes
///
/// Account management proper; the authentication subsystem is only used to
/// hash passwords and, for updates, to identify the caller.

use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::hash_password;
use crate::clock::Clock;
use crate::error::{AppError, AuthError, ErrorContext, StorageError};
use crate::middleware::AuthenticatedUser;
use crate::users::{User, UserStore};
use crate::validators::{is_valid_email, is_valid_password};

/// Body of both account creation and credential update
#[derive(Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

/// Public view of a user. The password hash never leaves the server.
#[derive(Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_chirpy_red: bool,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            created_at: user.created_at,
            updated_at: user.updated_at,
            is_chirpy_red: user.is_chirpy_red,
        }
    }
}

/// Validate the body and return the normalized email with a fresh hash
fn validated_credentials(form: &CredentialsRequest) -> Result<(String, String), AppError> {
    let email = is_valid_email(&form.email)?;
    is_valid_password(&form.password)?;
    let password_hash = hash_password(&form.password)?;
    Ok((email, password_hash))
}

/// POST /api/users
///
/// # Errors
/// - 400: invalid email or password
/// - 409: email already registered
pub async fn create_user(
    form: web::Json<CredentialsRequest>,
    users: web::Data<dyn UserStore>,
    clock: web::Data<dyn Clock>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_creation");

    let (email, password_hash) = validated_credentials(&form)?;

    let user = User::new(email, password_hash, clock.now());
    if let Err(e) = users.create(&user).await {
        let err = AppError::from(e);
        context.log_error(&err);
        return Err(err);
    }

    tracing::info!(
        request_id = %context.request_id,
        user_id = %user.id,
        "User created"
    );

    Ok(HttpResponse::Created().json(UserResponse::from(user)))
}

/// PUT /api/users
///
/// Replace the caller's email and password. **Requires valid JWT access
/// token.** Existing sessions are left alone.
///
/// # Errors
/// - 400: invalid email or password
/// - 401: token is valid but the account is gone
/// - 409: email belongs to another account
pub async fn update_user(
    caller: web::ReqData<AuthenticatedUser>,
    form: web::Json<CredentialsRequest>,
    users: web::Data<dyn UserStore>,
    clock: web::Data<dyn Clock>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_update").with_user_id(caller.user_id.to_string());

    let (email, password_hash) = validated_credentials(&form)?;

    let user = users
        .update_credentials(caller.user_id, &email, &password_hash, clock.now())
        .await
        .map_err(|e| {
            let err = match e {
                StorageError::NotFound => AppError::Auth(AuthError::Unauthorized),
                other => AppError::from(other),
            };
            context.log_error(&err);
            err
        })?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %user.id,
        "User credentials updated"
    );

    Ok(HttpResponse::Ok().json(UserResponse::from(user)))
}
