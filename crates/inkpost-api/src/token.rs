//! Bearer token issuing and verification (HS256).

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use thiserror::Error;

use inkpost_types::MAX_SAFE_ID;
use inkpost_types::claims::Claims;

pub const DEFAULT_TTL_HOURS: i64 = 72;

/// Signing configuration, built once at startup and handed to [`TokenService`].
#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub ttl: Duration,
}

impl AuthConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            ttl: Duration::hours(DEFAULT_TTL_HOURS),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("malformed token")]
    Malformed,
    #[error("token expired")]
    Expired,
    #[error("invalid token signature")]
    InvalidSignature,
    #[error("signing secret is not configured")]
    MissingSecret,
    #[error("failed to sign token: {0}")]
    Signing(String),
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::Expired,
            ErrorKind::InvalidSignature => AuthError::InvalidSignature,
            _ => AuthError::Malformed,
        }
    }
}

#[derive(Debug)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenService {
    pub fn new(config: &AuthConfig) -> Result<Self, AuthError> {
        if config.secret.is_empty() {
            return Err(AuthError::MissingSecret);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Ok(Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            ttl: config.ttl,
        })
    }

    pub fn issue(&self, user_id: u64, email: &str) -> Result<IssuedToken, AuthError> {
        if user_id > MAX_SAFE_ID {
            return Err(AuthError::Signing(format!(
                "user id {user_id} exceeds the exact numeric range of the claim"
            )));
        }

        let now = Utc::now();
        let expires_at = now + self.ttl;
        let claims = Claims {
            id: user_id,
            email: email.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Signing(e.to_string()))?;
        Ok(IssuedToken { token, expires_at })
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn service() -> TokenService {
        TokenService::new(&AuthConfig::new("test-secret-for-tokens")).unwrap()
    }

    fn sign_raw(secret: &str, claims: &serde_json::Value) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn in_an_hour() -> i64 {
        (Utc::now() + Duration::hours(1)).timestamp()
    }

    #[test]
    fn issue_then_verify_returns_same_identity() {
        let svc = service();
        for id in [1, 42, MAX_SAFE_ID] {
            let issued = svc.issue(id, "a@example.com").unwrap();
            let claims = svc.verify(&issued.token).unwrap();
            assert_eq!(claims.id, id);
            assert_eq!(claims.email, "a@example.com");
            assert_eq!(claims.exp, issued.expires_at.timestamp());
        }
    }

    #[test]
    fn default_ttl_is_72_hours() {
        let issued = service().issue(1, "a@example.com").unwrap();
        let hours = (issued.expires_at - Utc::now()).num_minutes() as f64 / 60.0;
        assert!((71.9..=72.0).contains(&hours), "ttl was {hours}h");
    }

    #[test]
    fn refuses_ids_beyond_exact_range() {
        let err = service().issue(MAX_SAFE_ID + 1, "a@example.com").unwrap_err();
        assert!(matches!(err, AuthError::Signing(_)));
    }

    #[test]
    fn empty_secret_is_rejected() {
        assert_eq!(
            TokenService::new(&AuthConfig::new("")).err(),
            Some(AuthError::MissingSecret)
        );
    }

    #[test]
    fn float_identity_claim_is_accepted() {
        let token = sign_raw(
            "test-secret-for-tokens",
            &json!({"id": 42.0, "email": "a@example.com", "iat": 0, "exp": in_an_hour()}),
        );
        assert_eq!(service().verify(&token).unwrap().id, 42);
    }

    #[test]
    fn fractional_identity_is_malformed() {
        let token = sign_raw(
            "test-secret-for-tokens",
            &json!({"id": 4.5, "email": "a@example.com", "iat": 0, "exp": in_an_hour()}),
        );
        assert_eq!(service().verify(&token), Err(AuthError::Malformed));
    }

    #[test]
    fn failure_kinds() {
        let svc = service();
        assert_eq!(svc.verify("not-a-token"), Err(AuthError::Malformed));

        let foreign = TokenService::new(&AuthConfig::new("some-other-secret"))
            .unwrap()
            .issue(7, "a@example.com")
            .unwrap();
        assert_eq!(svc.verify(&foreign.token), Err(AuthError::InvalidSignature));

        let stale = TokenService::new(
            &AuthConfig::new("test-secret-for-tokens").with_ttl(Duration::seconds(-30)),
        )
        .unwrap()
        .issue(7, "a@example.com")
        .unwrap();
        assert_eq!(svc.verify(&stale.token), Err(AuthError::Expired));
    }
}
