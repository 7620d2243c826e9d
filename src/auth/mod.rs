/// Authentication module
///
/// Password hashing, access token signing, refresh token storage, header
/// credential extraction and the service that ties them together.

mod claims;
mod credentials;
mod jwt;
mod password;
mod refresh_token;
mod service;

pub use claims::Claims;
pub use credentials::{api_key, bearer_token};
pub use jwt::TokenSigner;
pub use password::{hash_password, verify_password, MAX_PASSWORD_BYTES};
pub use refresh_token::{
    generate_refresh_token, hash_token, RefreshTokenRecord, RefreshTokenStore, RevokeOutcome,
    TokenState,
};
pub use service::{AuthService, ResetSummary, SessionTokens};
