use actix_web::{web, HttpResponse};
use serde::Serialize;

use crate::auth::AuthService;
use crate::error::AppError;

#[derive(Serialize)]
pub struct ResetResponse {
    pub message: String,
    pub users_deleted: u64,
    pub refresh_tokens_deleted: u64,
}

/// POST /admin/reset
///
/// Deletes every refresh token and then every user. Answers 403 unless the
/// platform is `dev`.
pub async fn reset(auth: web::Data<AuthService>) -> Result<HttpResponse, AppError> {
    let summary = auth.reset().await?;

    Ok(HttpResponse::Ok().json(ResetResponse {
        message: "All users have been deleted".to_string(),
        users_deleted: summary.users_deleted,
        refresh_tokens_deleted: summary.refresh_tokens_deleted,
    }))
}
