/// Credential extraction from request headers
///
/// Both credentials ride on the `Authorization` header:
/// - `Authorization: Bearer <token>` for access and refresh tokens
/// - `Authorization: ApiKey <key>` for the webhook relay's shared key

use actix_web::http::header::{HeaderMap, AUTHORIZATION};

use crate::error::CredentialError;

const BEARER_SCHEME: &str = "Bearer";
const API_KEY_SCHEME: &str = "ApiKey";

/// Extract a bearer token
///
/// # Errors
/// `MissingCredential` if the header is absent, not UTF-8, uses another scheme
/// (the keyword is case-sensitive) or is not exactly `Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<String, CredentialError> {
    scheme_credential(headers, BEARER_SCHEME)
}

/// Extract the webhook API key
///
/// # Errors
/// Same rules as `bearer_token`, for the `ApiKey` scheme.
pub fn api_key(headers: &HeaderMap) -> Result<String, CredentialError> {
    scheme_credential(headers, API_KEY_SCHEME)
}

fn scheme_credential(headers: &HeaderMap, scheme: &str) -> Result<String, CredentialError> {
    let value = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(CredentialError::MissingCredential)?;

    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(s), Some(credential), None) if s == scheme && !credential.is_empty() => {
            Ok(credential.to_string())
        }
        _ => Err(CredentialError::MissingCredential),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::header::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_extracted() {
        let headers = headers_with("Bearer abc.def.ghi");
        assert_eq!(bearer_token(&headers), Ok("abc.def.ghi".to_string()));
    }

    #[test]
    fn test_missing_header() {
        assert_eq!(
            bearer_token(&HeaderMap::new()),
            Err(CredentialError::MissingCredential)
        );
        assert_eq!(
            api_key(&HeaderMap::new()),
            Err(CredentialError::MissingCredential)
        );
    }

    #[test]
    fn test_malformed_bearer_headers() {
        let malformed = [
            "Bearer",
            "Bearer ",
            "bearer abc",
            "BEARER abc",
            "Basic dXNlcjpwYXNz",
            "BearerToken",
            "Bearer  abc",
            "Bearer abc def",
            "ApiKey abc",
            "",
        ];

        for value in malformed {
            assert_eq!(
                bearer_token(&headers_with(value)),
                Err(CredentialError::MissingCredential),
                "should reject {:?}",
                value
            );
        }
    }

    #[test]
    fn test_api_key_extracted() {
        let headers = headers_with("ApiKey f271c81ff7084ee5b99a5091b42d486e");
        assert_eq!(
            api_key(&headers),
            Ok("f271c81ff7084ee5b99a5091b42d486e".to_string())
        );
    }

    #[test]
    fn test_api_key_rejects_bearer_scheme() {
        let headers = headers_with("Bearer f271c81ff7084ee5b99a5091b42d486e");
        assert_eq!(api_key(&headers), Err(CredentialError::MissingCredential));
    }
}
