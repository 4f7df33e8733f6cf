//! JWT issue and verification (HS256, shared secret).

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use crate::config::JwtConfig;

/// Claims carried in access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id).
    pub sub: String,
    pub username: String,
    pub role: String,
    /// Expiration time (Unix timestamp).
    pub exp: i64,
    /// Issued at (Unix timestamp).
    pub iat: i64,
}

/// Token response returned to clients.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_expiry_minutes: i64,
}

impl JwtService {
    pub fn new(config: &JwtConfig) -> Self {
        let secret = config.secret.expose_secret().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            access_token_expiry_minutes: config.access_token_expiry_minutes,
        }
    }

    pub fn expiry_minutes(&self) -> i64 {
        self.access_token_expiry_minutes
    }

    /// Issue an access token for a user.
    pub fn issue(&self, user_id: &str, username: &str, role: &str) -> Result<String, anyhow::Error> {
        let now = Utc::now();
        let exp = now + Duration::minutes(self.access_token_expiry_minutes);

        let claims = Claims {
            sub: user_id.to_string(),
            username: username.to_string(),
            role: role.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to encode access token: {}", e))?;
        Ok(token)
    }

    /// Verify a token and return its claims.
    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let data = decode::<Claims>(token, &self.decoding_key, &Validation::new(Algorithm::HS256))?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::Secret;

    fn service() -> JwtService {
        JwtService::new(&JwtConfig {
            secret: Secret::new("test-secret-not-for-production".to_string()),
            access_token_expiry_minutes: 60,
        })
    }

    #[test]
    fn issue_and_verify_round_trip() {
        let jwt = service();
        let token = jwt.issue("user-1", "alice", "admin").expect("issue");
        let claims = jwt.verify(&token).expect("verify");
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.role, "admin");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn verify_rejects_tampered_token() {
        let jwt = service();
        let mut token = jwt.issue("user-1", "alice", "regular").expect("issue");
        token.push('x');
        assert!(jwt.verify(&token).is_err());
    }

    #[test]
    fn verify_rejects_wrong_secret() {
        let jwt = service();
        let other = JwtService::new(&JwtConfig {
            secret: Secret::new("a-different-secret".to_string()),
            access_token_expiry_minutes: 60,
        });
        let token = jwt.issue("user-1", "alice", "regular").expect("issue");
        assert!(other.verify(&token).is_err());
    }
}
