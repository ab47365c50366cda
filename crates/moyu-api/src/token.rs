use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    #[serde(default)]
    pub iat: usize,
    pub exp: usize,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token")]
    InvalidToken,
    #[error("failed to sign token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
    #[error("token lifetime out of range")]
    Lifetime,
}

/// Issues and verifies HS256 bearer tokens. Stateless: a token is valid until
/// its `exp`.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        let mut validation = Validation::default();
        // Issuer and verifier share a clock.
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        }
    }

    pub fn generate(&self, user_id: i64) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            user_id,
            iat: now.timestamp() as usize,
            exp: now
                .checked_add_signed(self.ttl)
                .ok_or(TokenError::Lifetime)?
                .timestamp() as usize,
        };
        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    /// Rejects malformed, badly signed and expired tokens, and tokens whose
    /// `user_id` claim is missing or not a number.
    pub fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("token rejected: {}", e);
                TokenError::InvalidToken
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SECRET: &str = "test-secret";

    fn service() -> TokenService {
        TokenService::new(SECRET, Duration::hours(1))
    }

    fn sign(claims: serde_json::Value, secret: &str) -> String {
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn in_an_hour() -> i64 {
        (Utc::now() + Duration::hours(1)).timestamp()
    }

    #[test]
    fn generated_token_validates() {
        let tokens = service();
        let token = tokens.generate(42).unwrap();
        let claims = tokens.validate(&token).unwrap();
        assert_eq!(claims.user_id, 42);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn expired_token_is_invalid() {
        let token = sign(
            json!({ "user_id": 1, "exp": (Utc::now() - Duration::minutes(5)).timestamp() }),
            SECRET,
        );
        assert!(matches!(service().validate(&token), Err(TokenError::InvalidToken)));
    }

    #[test]
    fn wrong_signature_is_invalid() {
        let token = sign(json!({ "user_id": 1, "exp": in_an_hour() }), "other-secret");
        assert!(matches!(service().validate(&token), Err(TokenError::InvalidToken)));
    }

    #[test]
    fn missing_or_non_numeric_subject_is_invalid() {
        let missing = sign(json!({ "exp": in_an_hour() }), SECRET);
        assert!(service().validate(&missing).is_err());

        let text = sign(json!({ "user_id": "1", "exp": in_an_hour() }), SECRET);
        assert!(service().validate(&text).is_err());
    }

    #[test]
    fn token_without_expiry_is_invalid() {
        let token = sign(json!({ "user_id": 1 }), SECRET);
        assert!(service().validate(&token).is_err());
    }

    #[test]
    fn lifetime_past_the_calendar_is_an_error() {
        let tokens = TokenService::new(SECRET, Duration::hours(10_000_000_000));
        assert!(matches!(tokens.generate(1), Err(TokenError::Lifetime)));
    }

    #[test]
    fn garbage_is_invalid() {
        assert!(service().validate("").is_err());
        assert!(service().validate("not.a.jwt").is_err());
    }
}
