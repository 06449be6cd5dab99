//! Bearer token claims (HS256 JWT).

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::user::UserId;

/// Claims carried by an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject: the authenticated user.
    pub sub: UserId,
    pub username: String,
    /// Role name resolved against the roles read model at request time.
    pub role: Option<String>,
    pub superuser: bool,
    /// Issued-at (unix seconds).
    pub iat: i64,
    /// Expiry (unix seconds).
    pub exp: i64,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is malformed or has an invalid signature")]
    Invalid,

    #[error("token is expired")]
    Expired,

    #[error("token could not be issued: {0}")]
    Encoding(String),
}

/// Issue an HS256 token for `claims`.
pub fn encode_token(claims: &JwtClaims, secret: &[u8]) -> Result<String, TokenError> {
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| TokenError::Encoding(e.to_string()))
}

/// Validate and decode a bearer token.
///
/// `now` is passed explicitly so validation is deterministic in tests.
pub fn decode_token(token: &str, secret: &[u8], now: DateTime<Utc>) -> Result<JwtClaims, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    // Expiry is checked against the supplied clock below.
    validation.validate_exp = false;
    validation.required_spec_claims.clear();

    let data = jsonwebtoken::decode::<JwtClaims>(
        token,
        &DecodingKey::from_secret(secret),
        &validation,
    )
    .map_err(|_| TokenError::Invalid)?;

    if data.claims.exp <= now.timestamp() {
        return Err(TokenError::Expired);
    }

    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn claims(now: DateTime<Utc>, ttl_minutes: i64) -> JwtClaims {
        JwtClaims {
            sub: UserId::for_username("ana"),
            username: "ana".to_string(),
            role: Some("warehouse".to_string()),
            superuser: false,
            iat: now.timestamp(),
            exp: (now + Duration::minutes(ttl_minutes)).timestamp(),
        }
    }

    #[test]
    fn round_trips_through_encode_and_decode() {
        let now = Utc::now();
        let claims = claims(now, 10);
        let token = encode_token(&claims, b"secret").unwrap();
        let decoded = decode_token(&token, b"secret", now).unwrap();
        assert_eq!(decoded, claims);
    }

    #[test]
    fn rejects_a_wrong_secret() {
        let now = Utc::now();
        let token = encode_token(&claims(now, 10), b"secret").unwrap();
        let err = decode_token(&token, b"other", now).unwrap_err();
        assert_eq!(err, TokenError::Invalid);
    }

    #[test]
    fn rejects_an_expired_token() {
        let now = Utc::now();
        let token = encode_token(&claims(now, 10), b"secret").unwrap();
        let later = now + Duration::minutes(11);
        let err = decode_token(&token, b"secret", later).unwrap_err();
        assert_eq!(err, TokenError::Expired);
    }
}
