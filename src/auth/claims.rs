/// JWT Claims structure
///
/// Payload of an access token: the user it speaks for and the standard
/// time/issuer claims (RFC 7519).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TokenError;

/// JWT Claims for access tokens
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (user ID as UUID string)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Issuer
    pub iss: String,
}

impl Claims {
    /// Create claims for `user_id`, valid from `now` for `ttl_seconds`
    pub fn new(user_id: Uuid, now: DateTime<Utc>, ttl_seconds: i64, issuer: String) -> Self {
        let iat = now.timestamp();
        Self {
            sub: user_id.to_string(),
            exp: iat + ttl_seconds,
            iat,
            iss: issuer,
        }
    }

    /// Extract user ID from claims
    ///
    /// # Errors
    /// A subject that is not a UUID was never issued by us.
    pub fn user_id(&self) -> Result<Uuid, TokenError> {
        Uuid::parse_str(&self.sub).map_err(|_| TokenError::MalformedToken)
    }

    /// A token is expired from the expiry second onwards
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() >= self.exp
    }
}
