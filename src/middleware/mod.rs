/// Middleware module
///
/// Access token and API key guards.

mod api_key_middleware;
mod jwt_middleware;

pub use api_key_middleware::ApiKeyMiddleware;
pub use jwt_middleware::{AuthenticatedUser, JwtMiddleware};
