/// JWT Token Generation and Validation
///
/// `TokenSigner` issues and verifies HS256 access tokens. It owns the signing
/// secret, handed in once at startup, and reads time from an injected clock.

use std::sync::Arc;

use chrono::Duration;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::auth::claims::Claims;
use crate::clock::Clock;
use crate::configuration::JwtSettings;
use crate::error::{ConfigError, TokenError};

#[derive(Clone)]
pub struct TokenSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    default_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenSigner {
    /// Build a signer from configuration
    ///
    /// # Errors
    /// An empty secret or a non-positive access token lifetime is rejected.
    pub fn new(config: &JwtSettings, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        if config.secret.is_empty() {
            return Err(ConfigError::MissingRequired("jwt.secret".to_string()));
        }
        if config.access_token_expiry <= 0 {
            return Err(ConfigError::InvalidValue(
                "jwt.access_token_expiry must be positive".to_string(),
            ));
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            issuer: config.issuer.clone(),
            default_ttl: Duration::seconds(config.access_token_expiry),
            clock,
        })
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Lifetime actually granted for a requested TTL.
    ///
    /// Anything longer than the default (or non-positive) gets the default.
    pub fn effective_ttl(&self, requested: Duration) -> Duration {
        if requested <= Duration::zero() || requested > self.default_ttl {
            self.default_ttl
        } else {
            requested
        }
    }

    /// Issue a signed access token for `user_id`
    ///
    /// # Errors
    /// Returns `SigningFailure` if the JWT library cannot encode the claims.
    pub fn issue(&self, user_id: Uuid, ttl: Duration) -> Result<String, TokenError> {
        let claims = Claims::new(
            user_id,
            self.clock.now(),
            self.effective_ttl(ttl).num_seconds(),
            self.issuer.clone(),
        );

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::SigningFailure(e.to_string()))
    }

    /// Verify a token and return the user it was issued for
    ///
    /// Signature is checked first, then issuer, then expiry against our clock.
    ///
    /// # Errors
    /// `MalformedToken`, `BadSignature`, `IssuerMismatch` or `Expired`.
    pub fn verify(&self, token: &str) -> Result<Uuid, TokenError> {
        if token.split('.').count() != 3 {
            return Err(TokenError::MalformedToken);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        // Expiry is judged against the injected clock below.
        validation.validate_exp = false;
        validation.leeway = 0;

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => TokenError::BadSignature,
                ErrorKind::InvalidIssuer => TokenError::IssuerMismatch,
                ErrorKind::MissingRequiredClaim(claim) if claim == "iss" => {
                    TokenError::IssuerMismatch
                }
                _ => TokenError::MalformedToken,
            })?;

        if claims.is_expired_at(self.clock.now()) {
            return Err(TokenError::Expired);
        }

        claims.user_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;

    fn get_test_config() -> JwtSettings {
        JwtSettings {
            secret: "test-secret-key-at-least-32-characters-long".to_string(),
            access_token_expiry: 3600,
            refresh_token_expiry: 5_184_000,
            issuer: "test".to_string(),
        }
    }

    fn signer_with_clock() -> (TokenSigner, Arc<MockClock>) {
        let clock = Arc::new(MockClock::default());
        let signer = TokenSigner::new(&get_test_config(), clock.clone()).unwrap();
        (signer, clock)
    }

    #[test]
    fn test_issue_and_verify_token() {
        let (signer, _) = signer_with_clock();
        let user_id = Uuid::new_v4();

        let token = signer
            .issue(user_id, Duration::hours(1))
            .expect("Failed to issue token");
        let verified = signer.verify(&token).expect("Failed to verify token");

        assert_eq!(verified, user_id);
    }

    #[test]
    fn test_token_expires_once_clock_reaches_ttl() {
        let (signer, clock) = signer_with_clock();
        let user_id = Uuid::new_v4();
        let token = signer.issue(user_id, Duration::seconds(120)).unwrap();

        clock.advance(Duration::seconds(119));
        assert_eq!(signer.verify(&token), Ok(user_id));

        clock.advance(Duration::seconds(1));
        assert_eq!(signer.verify(&token), Err(TokenError::Expired));
    }

    #[test]
    fn test_longer_ttl_is_clamped_to_default() {
        let (signer, clock) = signer_with_clock();
        let token = signer.issue(Uuid::new_v4(), Duration::days(30)).unwrap();

        clock.advance(Duration::hours(1));

        assert_eq!(signer.verify(&token), Err(TokenError::Expired));
    }

    #[test]
    fn test_effective_ttl() {
        let (signer, _) = signer_with_clock();

        assert_eq!(signer.effective_ttl(Duration::minutes(5)), Duration::minutes(5));
        assert_eq!(signer.effective_ttl(Duration::hours(2)), Duration::hours(1));
        assert_eq!(signer.effective_ttl(Duration::zero()), Duration::hours(1));
    }

    #[test]
    fn test_malformed_token() {
        let (signer, _) = signer_with_clock();

        assert_eq!(signer.verify("not-a-jwt"), Err(TokenError::MalformedToken));
        assert_eq!(signer.verify(""), Err(TokenError::MalformedToken));
        assert_eq!(
            signer.verify("invalid.token.here"),
            Err(TokenError::MalformedToken)
        );
    }

    #[test]
    fn test_tampered_payload_or_signature_is_bad_signature() {
        let (signer, _) = signer_with_clock();
        let token = signer.issue(Uuid::new_v4(), Duration::hours(1)).unwrap();
        let header_len = token.find('.').unwrap() + 1;

        for i in header_len..token.len() {
            let original = token.as_bytes()[i];
            if original == b'.' {
                continue;
            }
            let replacement = if original == b'A' { 'B' } else { 'A' };
            let mut tampered = token.clone();
            tampered.replace_range(i..i + 1, &replacement.to_string());

            assert_eq!(
                signer.verify(&tampered),
                Err(TokenError::BadSignature),
                "byte {} was tampered",
                i
            );
        }
    }

    #[test]
    fn test_wrong_secret_is_bad_signature() {
        let (signer, clock) = signer_with_clock();
        let token = signer.issue(Uuid::new_v4(), Duration::hours(1)).unwrap();

        let mut other = get_test_config();
        other.secret = "a-completely-different-secret-for-this-test".to_string();
        let other_signer = TokenSigner::new(&other, clock).unwrap();

        assert_eq!(other_signer.verify(&token), Err(TokenError::BadSignature));
    }

    #[test]
    fn test_wrong_issuer() {
        let (signer, clock) = signer_with_clock();
        let token = signer.issue(Uuid::new_v4(), Duration::hours(1)).unwrap();

        let mut config = get_test_config();
        config.issuer = "wrong-issuer".to_string();
        let other_signer = TokenSigner::new(&config, clock).unwrap();

        assert_eq!(other_signer.verify(&token), Err(TokenError::IssuerMismatch));
    }

    #[test]
    fn test_empty_secret_is_rejected() {
        let mut config = get_test_config();
        config.secret = String::new();

        assert!(TokenSigner::new(&config, Arc::new(MockClock::default())).is_err());
    }
}
