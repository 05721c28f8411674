use axum::http::{header, HeaderMap, StatusCode};
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::problem::ProblemResponse;
use crate::router::AppState;

/// Authenticated caller; every job operation is scoped to `user_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: String,
}

/// Verifies HS256 bearer tokens issued by the identity provider.
#[derive(Clone)]
pub struct AuthTokenValidator {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl AuthTokenValidator {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_aud = false;
        validation.validate_exp = false;
        validation.validate_nbf = false;
        Self {
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<Principal, TokenError> {
        let claims = decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|err| TokenError::Invalid(format!("{err}")))?
            .claims;

        let now_ts = now.timestamp();
        if let Some(nbf) = claims.nbf {
            if now_ts < nbf {
                return Err(TokenError::Invalid("token_not_yet_valid".to_string()));
            }
        }
        if now_ts >= claims.exp {
            return Err(TokenError::Invalid("token_expired".to_string()));
        }

        let user_id = claims.sub.trim();
        if user_id.is_empty() {
            return Err(TokenError::Invalid("missing_subject".to_string()));
        }
        Ok(Principal {
            user_id: user_id.to_string(),
        })
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TokenClaims {
    pub sub: String,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token: {0}")]
    Invalid(String),
}

/// Resolves the caller from the `Authorization: Bearer` header.
pub fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Principal, ProblemResponse> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|raw| raw.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            ProblemResponse::new(
                StatusCode::UNAUTHORIZED,
                "missing_token",
                "Authorization bearer token is required",
            )
        })?;

    state
        .token_validator()
        .validate(token, state.now())
        .map_err(|err| {
            debug!(stage = "auth", error = %err, "bearer token rejected");
            ProblemResponse::new(StatusCode::UNAUTHORIZED, "invalid_token", "Token is not valid")
        })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Duration;
    use jsonwebtoken::{encode, EncodingKey, Header};

    pub(crate) const TEST_SECRET: &[u8] = b"token-secret";

    pub(crate) fn mint(secret: &[u8], sub: &str, exp: DateTime<Utc>) -> String {
        let claims = TokenClaims {
            sub: sub.to_string(),
            exp: exp.timestamp(),
            nbf: None,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret),
        )
        .expect("encode token")
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .expect("fixed time")
            .with_timezone(&Utc)
    }

    #[test]
    fn accepts_valid_token() {
        let validator = AuthTokenValidator::new(TEST_SECRET);
        let token = mint(TEST_SECRET, "user-1", now() + Duration::hours(1));
        let principal = validator.validate(&token, now()).expect("valid");
        assert_eq!(principal.user_id, "user-1");
    }

    #[test]
    fn rejects_expired_token() {
        let validator = AuthTokenValidator::new(TEST_SECRET);
        let token = mint(TEST_SECRET, "user-1", now() - Duration::seconds(1));
        let err = validator.validate(&token, now()).unwrap_err();
        assert!(err.to_string().contains("token_expired"));
    }

    #[test]
    fn rejects_foreign_signature() {
        let validator = AuthTokenValidator::new(TEST_SECRET);
        let token = mint(b"other-secret", "user-1", now() + Duration::hours(1));
        assert!(validator.validate(&token, now()).is_err());
    }

    #[test]
    fn rejects_blank_subject() {
        let validator = AuthTokenValidator::new(TEST_SECRET);
        let token = mint(TEST_SECRET, "  ", now() + Duration::hours(1));
        let err = validator.validate(&token, now()).unwrap_err();
        assert!(err.to_string().contains("missing_subject"));
    }

    #[test]
    fn rejects_token_before_nbf() {
        let validator = AuthTokenValidator::new(TEST_SECRET);
        let claims = TokenClaims {
            sub: "user-1".into(),
            exp: (now() + Duration::hours(2)).timestamp(),
            nbf: Some((now() + Duration::hours(1)).timestamp()),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(TEST_SECRET),
        )
        .expect("encode token");
        let err = validator.validate(&token, now()).unwrap_err();
        assert!(err.to_string().contains("token_not_yet_valid"));
    }
}
