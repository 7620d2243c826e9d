/// API key middleware
///
/// Guards machine-to-machine endpoints that authenticate with
/// `Authorization: ApiKey <key>` instead of a user token.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;

use crate::auth::api_key;
use crate::error::{AppError, AuthError};

pub struct ApiKeyMiddleware {
    expected: Rc<String>,
}

impl ApiKeyMiddleware {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            expected: Rc::new(api_key.into()),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for ApiKeyMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = ApiKeyMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(ApiKeyMiddlewareService {
            service: Rc::new(service),
            expected: self.expected.clone(),
        }))
    }
}

pub struct ApiKeyMiddlewareService<S> {
    service: Rc<S>,
    expected: Rc<String>,
}

impl<S, B> Service<ServiceRequest> for ApiKeyMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let accepted = match api_key(req.headers()) {
            Ok(key) => !self.expected.is_empty() && key == *self.expected,
            Err(e) => {
                tracing::warn!(path = %req.path(), error = %e, "Missing or malformed API key");
                false
            }
        };

        if !accepted {
            tracing::warn!(path = %req.path(), "API key rejected");
            return Box::pin(async move { Err(AppError::Auth(AuthError::Unauthorized).into()) });
        }

        let service = self.service.clone();
        Box::pin(async move { service.call(req).await })
    }
}
