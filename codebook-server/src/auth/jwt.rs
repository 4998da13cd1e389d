//! HS256 bearer tokens

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use shared::models::{User, UserRole};
use thiserror::Error;

use super::AuthContext;

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: String,
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: UserRole,
    /// Issued at (Unix seconds)
    pub iat: i64,
    /// Expiration (Unix seconds)
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("token expired")]
    Expired,
    #[error("invalid token: {0}")]
    Invalid(String),
    #[error("token signing failed: {0}")]
    Encode(String),
}

/// Signing secret and token lifetime
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    expiry_hours: i64,
}

impl std::fmt::Debug for JwtKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtKeys")
            .field("expiry_hours", &self.expiry_hours)
            .finish_non_exhaustive()
    }
}

impl JwtKeys {
    pub fn new(secret: &str, expiry_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            expiry_hours,
        }
    }

    pub fn create_token(&self, user: &User) -> Result<String, JwtError> {
        let now = chrono::Utc::now();
        let claims = Claims {
            sub: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: (now + chrono::Duration::hours(self.expiry_hours)).timestamp(),
        };
        self.encode(&claims)
    }

    pub(crate) fn encode(&self, claims: &Claims) -> Result<String, JwtError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| JwtError::Encode(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<AuthContext, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation).map_err(
            |e| match e.kind() {
                ErrorKind::ExpiredSignature => JwtError::Expired,
                _ => JwtError::Invalid(e.to_string()),
            },
        )?;
        Ok(data.claims.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::user;

    #[test]
    fn test_token_round_trip_carries_identity() {
        let keys = JwtKeys::new("test-secret", 24);
        let admin = user("a1", "admin@codebook.dev", UserRole::Admin);

        let token = keys.create_token(&admin).unwrap();
        let ctx = keys.verify(&token).unwrap();

        assert_eq!(ctx.user_id, "a1");
        assert_eq!(ctx.email, "admin@codebook.dev");
        assert!(ctx.is_admin());
        assert!(ctx.expires_at > ctx.issued_at);
    }

    #[test]
    fn test_expired_token() {
        let keys = JwtKeys::new("test-secret", 24);
        let now = chrono::Utc::now().timestamp();
        let token = keys
            .encode(&Claims {
                sub: "u1".into(),
                email: "u1@codebook.dev".into(),
                name: "U1".into(),
                role: UserRole::User,
                iat: now - 7200,
                exp: now - 3600,
            })
            .unwrap();

        assert!(matches!(keys.verify(&token), Err(JwtError::Expired)));
    }

    #[test]
    fn test_wrong_secret_is_invalid() {
        let token = JwtKeys::new("one", 24)
            .create_token(&user("u1", "u1@codebook.dev", UserRole::User))
            .unwrap();
        assert!(matches!(
            JwtKeys::new("two", 24).verify(&token),
            Err(JwtError::Invalid(_))
        ));
        assert!(matches!(
            JwtKeys::new("two", 24).verify("not-a-jwt"),
            Err(JwtError::Invalid(_))
        ));
    }
}
