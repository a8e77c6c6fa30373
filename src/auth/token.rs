use std::sync::Arc;

use jsonwebtoken::{errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::{ids::UserId, AppError, AppResult};

/// Identity claims carried inside a session token.
///
/// Timestamps are unix seconds, serialized under the registered JWT names so
/// any standard verifier can read them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    #[serde(rename = "sub")]
    pub user_id: UserId,
    pub nickname: String,
    pub email: String,
    #[serde(rename = "iat")]
    pub issued_at: i64,
    #[serde(rename = "exp")]
    pub expires_at: i64,
}

impl SessionClaims {
    pub fn new(user_id: UserId, nickname: String, email: String, lifetime: Duration) -> Self {
        let issued_at = OffsetDateTime::now_utc().unix_timestamp();
        Self {
            user_id,
            nickname,
            email,
            issued_at,
            expires_at: issued_at.saturating_add(lifetime.whole_seconds()),
        }
    }
}

/// Signs and verifies stateless session tokens with a shared HMAC secret.
#[derive(Clone)]
pub struct TokenService {
    algorithm: Algorithm,
    lifetime: Duration,
    encoding_key: Arc<EncodingKey>,
    decoding_key: Arc<DecodingKey>,
    validation: Arc<Validation>,
}

impl TokenService {
    pub fn new(secret: &str, algorithm: Algorithm, lifetime: Duration) -> anyhow::Result<Self> {
        anyhow::ensure!(!secret.is_empty(), "token secret must not be empty");
        anyhow::ensure!(
            matches!(algorithm, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512),
            "token algorithm {algorithm:?} is not a shared-secret HMAC"
        );
        anyhow::ensure!(lifetime.is_positive(), "token lifetime must be positive");

        let mut validation = Validation::new(algorithm);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            algorithm,
            lifetime,
            encoding_key: Arc::new(EncodingKey::from_secret(secret.as_bytes())),
            decoding_key: Arc::new(DecodingKey::from_secret(secret.as_bytes())),
            validation: Arc::new(validation),
        })
    }

    /// Lifetime applied to freshly authenticated sessions.
    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    pub fn issue(&self, claims: &SessionClaims) -> AppResult<String> {
        jsonwebtoken::encode(&Header::new(self.algorithm), claims, &self.encoding_key)
            .map_err(AppError::internal)
    }

    /// Verifies a bearer token; `None` or an empty string means the caller
    /// sent no token at all.
    pub fn verify(&self, token: Option<&str>) -> AppResult<SessionClaims> {
        let token = match token {
            Some(token) if !token.is_empty() => token,
            _ => return Err(AppError::MissingToken),
        };

        jsonwebtoken::decode::<SessionClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => AppError::ExpiredToken,
                ErrorKind::InvalidSignature => AppError::BadSignature,
                _ => AppError::MalformedToken,
            })
    }
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("algorithm", &self.algorithm)
            .field("lifetime", &self.lifetime)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-that-is-long-enough-for-testing";

    fn service(secret: &str) -> TokenService {
        TokenService::new(secret, Algorithm::HS512, Duration::hours(1)).unwrap()
    }

    fn claims(lifetime: Duration) -> SessionClaims {
        SessionClaims::new(UserId::new(), "alice".into(), "a@x.com".into(), lifetime)
    }

    #[test]
    fn issued_token_verifies_to_same_claims() {
        let tokens = service(SECRET);
        let claims = claims(tokens.lifetime());

        let token = tokens.issue(&claims).unwrap();
        assert_eq!(tokens.verify(Some(&token)).unwrap(), claims);
    }

    #[test]
    fn expired_token_is_rejected() {
        let tokens = service(SECRET);
        let token = tokens.issue(&claims(Duration::minutes(-5))).unwrap();

        assert!(matches!(tokens.verify(Some(&token)), Err(AppError::ExpiredToken)));
    }

    #[test]
    fn foreign_secret_is_a_bad_signature() {
        let token = service("secret-one-for-testing-purposes")
            .issue(&claims(Duration::hours(1)))
            .unwrap();

        let result = service("secret-two-for-testing-purposes").verify(Some(&token));
        assert!(matches!(result, Err(AppError::BadSignature)));
    }

    #[test]
    fn missing_and_garbage_tokens() {
        let tokens = service(SECRET);
        assert!(matches!(tokens.verify(None), Err(AppError::MissingToken)));
        assert!(matches!(tokens.verify(Some("")), Err(AppError::MissingToken)));
        assert!(matches!(tokens.verify(Some("invalid.token.here")), Err(AppError::MalformedToken)));
    }

    #[test]
    fn tampered_payload_fails_signature_check() {
        let tokens = service(SECRET);
        let token = tokens.issue(&claims(Duration::hours(1))).unwrap();
        let other = tokens.issue(&claims(Duration::hours(1))).unwrap();

        // header and signature from one token, payload from another
        let parts: Vec<&str> = token.split('.').collect();
        let other_parts: Vec<&str> = other.split('.').collect();
        let forged = format!("{}.{}.{}", parts[0], other_parts[1], parts[2]);

        assert!(matches!(tokens.verify(Some(&forged)), Err(AppError::BadSignature)));
    }

    #[test]
    fn rejects_unusable_configuration() {
        assert!(TokenService::new("", Algorithm::HS512, Duration::hours(1)).is_err());
        assert!(TokenService::new(SECRET, Algorithm::RS256, Duration::hours(1)).is_err());
        assert!(TokenService::new(SECRET, Algorithm::HS256, Duration::ZERO).is_err());
    }
}
