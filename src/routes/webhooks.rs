/// Payment provider webhooks
///
/// Authenticated by `ApiKeyMiddleware`. A `user.upgraded` event marks the
/// account as Chirpy Red; other events are acknowledged and ignored.

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{AppError, StorageError};
use crate::users::UserStore;

const USER_UPGRADED: &str = "user.upgraded";

#[derive(Deserialize)]
pub struct WebhookData {
    pub user_id: Uuid,
}

#[derive(Deserialize)]
pub struct WebhookRequest {
    pub event: String,
    pub data: WebhookData,
}

/// POST /api/polka/webhooks
pub async fn polka_webhook(
    body: web::Json<WebhookRequest>,
    users: web::Data<dyn UserStore>,
    clock: web::Data<dyn Clock>,
) -> Result<HttpResponse, AppError> {
    if body.event != USER_UPGRADED {
        tracing::debug!(event = %body.event, "Ignoring webhook event");
        return Ok(HttpResponse::NoContent().finish());
    }

    match users.upgrade_to_chirpy_red(body.data.user_id, clock.now()).await {
        Ok(()) => {
            tracing::info!(user_id = %body.data.user_id, "User upgraded to Chirpy Red");
            Ok(HttpResponse::NoContent().finish())
        }
        Err(StorageError::NotFound) => {
            tracing::warn!(user_id = %body.data.user_id, "Webhook names unknown user");
            Err(StorageError::NotFound.into())
        }
        Err(e) => Err(e.into()),
    }
}
