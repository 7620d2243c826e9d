use actix_web::dev::Server;
use actix_web::{guard, middleware::Logger, web, App, HttpServer};
use std::net::TcpListener;
use std::sync::Arc;

use crate::auth::AuthService;
use crate::clock::Clock;
use crate::configuration::WebhookSettings;
use crate::error::{AppError, ValidationError};
use crate::logger::LoggerMiddleware;
use crate::middleware::{ApiKeyMiddleware, JwtMiddleware};
use crate::routes::{
    create_user, get_current_user, health_check, login, polka_webhook, refresh, reset, revoke,
    revoke_all, update_user,
};
use crate::users::UserStore;

pub fn run(
    listener: TcpListener,
    auth: AuthService,
    users: Arc<dyn UserStore>,
    clock: Arc<dyn Clock>,
    webhook: WebhookSettings,
) -> Result<Server, std::io::Error> {
    let auth = web::Data::new(auth);
    let users: web::Data<dyn UserStore> = web::Data::from(users);
    let clock: web::Data<dyn Clock> = web::Data::from(clock);

    let server = HttpServer::new(move || {
        let json_config = web::JsonConfig::default().error_handler(|err, _req| {
            tracing::warn!(error = %err, "Rejected request body");
            AppError::Validation(ValidationError::InvalidFormat("request body".to_string())).into()
        });

        App::new()
            // Global middleware
            .wrap(Logger::default())
            .wrap(LoggerMiddleware)

            // Shared state
            .app_data(json_config)
            .app_data(auth.clone())
            .app_data(users.clone())
            .app_data(clock.clone())

            .route("/admin/reset", web::post().to(reset))
            .service(
                web::scope("/api")
                    .route("/healthz", web::get().to(health_check))
                    .service(
                        web::resource("/users")
                            .guard(guard::Put())
                            .wrap(JwtMiddleware::new(auth.clone()))
                            .route(web::put().to(update_user)),
                    )
                    .route("/users", web::post().to(create_user))
                    .route("/login", web::post().to(login))
                    .route("/refresh", web::post().to(refresh))
                    .route("/revoke", web::post().to(revoke))

                    // Protected routes (require JWT authentication)
                    .service(
                        web::resource("/me")
                            .wrap(JwtMiddleware::new(auth.clone()))
                            .route(web::get().to(get_current_user)),
                    )
                    .service(
                        web::resource("/revoke_all")
                            .wrap(JwtMiddleware::new(auth.clone()))
                            .route(web::post().to(revoke_all)),
                    )

                    // Webhook relay (shared API key)
                    .service(
                        web::scope("/polka")
                            .wrap(ApiKeyMiddleware::new(webhook.api_key.clone()))
                            .route("/webhooks", web::post().to(polka_webhook)),
                    ),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
