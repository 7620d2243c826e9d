/// Authentication Routes
///
/// Login, access token refresh, refresh token revocation and the current user.

use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::{bearer_token, AuthService};
use crate::error::{AppError, AuthError, ErrorContext};
use crate::middleware::AuthenticatedUser;
use crate::routes::users::UserResponse;
use crate::users::UserStore;
use crate::validators::is_valid_email;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Login response: the account plus access and refresh tokens
#[derive(Serialize)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

#[derive(Serialize)]
pub struct AccessTokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Pull the refresh token out of `Authorization: Bearer <token>`.
///
/// A missing or malformed header reads as a bad refresh token so it
/// cannot be told apart from an unknown one.
fn refresh_token_from(req: &HttpRequest) -> Result<String, AppError> {
    bearer_token(req.headers()).map_err(|e| {
        tracing::warn!(error = %e, "Missing refresh token");
        AppError::Auth(AuthError::InvalidRefreshToken)
    })
}

/// POST /api/login
///
/// # Errors
/// - 401: unknown email or wrong password, with one shared message
pub async fn login(
    form: web::Json<LoginRequest>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_login");

    // An address that cannot exist is just another unknown email
    let email = is_valid_email(&form.email).map_err(|_| AuthError::InvalidCredentials)?;

    let session = auth.login(&email, &form.password).await?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %session.user.id,
        "Login succeeded"
    );

    Ok(HttpResponse::Ok().json(LoginResponse {
        user: UserResponse::from(session.user),
        access_token: session.access_token,
        refresh_token: session.refresh_token,
        token_type: "Bearer".to_string(),
        expires_in: auth.access_token_ttl().num_seconds(),
    }))
}

/// POST /api/refresh
///
/// Requires `Authorization: Bearer <refresh_token>`. The refresh token is
/// not rotated.
///
/// # Errors
/// - 401: unknown, expired or revoked refresh token
pub async fn refresh(
    req: HttpRequest,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let token = refresh_token_from(&req)?;
    let access_token = auth.refresh(&token).await?;

    Ok(HttpResponse::Ok().json(AccessTokenResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: auth.access_token_ttl().num_seconds(),
    }))
}

/// POST /api/revoke
///
/// Requires `Authorization: Bearer <refresh_token>`. Revoking a token that
/// is already revoked or expired still answers 204.
pub async fn revoke(
    req: HttpRequest,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let token = refresh_token_from(&req)?;
    auth.logout(&token).await?;

    Ok(HttpResponse::NoContent().finish())
}

/// POST /api/revoke_all
///
/// Log the authenticated user out of every session.
pub async fn revoke_all(
    user: web::ReqData<AuthenticatedUser>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("revoke_all").with_user_id(user.user_id.to_string());

    let revoked = auth.logout_everywhere(user.user_id).await.map_err(|e| {
        context.log_error(&e);
        e
    })?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %user.user_id,
        revoked,
        "Logged out everywhere"
    );

    Ok(HttpResponse::NoContent().finish())
}

/// GET /api/me
///
/// **Requires valid JWT access token**; the identity is injected by
/// `JwtMiddleware`.
///
/// # Errors
/// - 401: token is valid but the user has since been deleted
pub async fn get_current_user(
    user: web::ReqData<AuthenticatedUser>,
    users: web::Data<dyn UserStore>,
) -> Result<HttpResponse, AppError> {
    let record = users
        .find_by_id(user.user_id)
        .await?
        .ok_or(AuthError::Unauthorized)?;

    Ok(HttpResponse::Ok().json(UserResponse::from(record)))
}
