// JWT token service
// Decision: HS256 with a secret shared with the external auth service
// Decision: Claims follow the auth service's shape: `sub` (email) + `exp`, other claims optional

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::config::JwtConfig;

/// JWT claims for access tokens
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AccessTokenClaims {
    /// Subject (user email or id); used as the audit-log subject
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    /// User email, when the issuer includes it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Display name, when the issuer includes it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// JWT service for token generation and validation
#[derive(Clone)]
pub struct JwtService {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// Generate an access token for `subject`
    pub fn generate_access_token(
        &self,
        subject: &str,
        email: Option<&str>,
        name: Option<&str>,
    ) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::from_std(self.config.access_token_lifetime)?;

        let claims = AccessTokenClaims {
            sub: subject.to_string(),
            exp: exp.timestamp(),
            iat: Some(now.timestamp()),
            email: email.map(str::to_string),
            name: name.map(str::to_string),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .context("Failed to encode access token")
    }

    /// Validate and decode an access token
    pub fn validate_access_token(&self, token: &str) -> Result<AccessTokenClaims> {
        let mut validation = Validation::default();
        validation.validate_exp = true;

        let token_data = decode::<AccessTokenClaims>(token, &self.decoding_key, &validation)
            .context("Invalid access token")?;

        if token_data.claims.sub.trim().is_empty() {
            anyhow::bail!("Token has an empty subject");
        }

        Ok(token_data.claims)
    }

    /// Get access token lifetime in seconds
    pub fn access_token_lifetime_secs(&self) -> i64 {
        i64::try_from(self.config.access_token_lifetime.as_secs()).unwrap_or(i64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    fn test_config() -> JwtConfig {
        JwtConfig {
            secret: "test-secret-key-for-testing".to_string(),
            access_token_lifetime: StdDuration::from_secs(900), // 15 minutes
        }
    }

    #[test]
    fn test_generate_access_token() {
        let service = JwtService::new(test_config());
        let token = service
            .generate_access_token("ops@example.com", Some("ops@example.com"), Some("Ops"))
            .unwrap();

        assert!(!token.is_empty());

        let claims = service.validate_access_token(&token).unwrap();
        assert_eq!(claims.sub, "ops@example.com");
        assert_eq!(claims.email.as_deref(), Some("ops@example.com"));
        assert_eq!(claims.name.as_deref(), Some("Ops"));
        assert!(claims.exp > Utc::now().timestamp());
        assert_eq!(service.access_token_lifetime_secs(), 900);
    }

    #[test]
    fn test_minimal_issuer_claims_accepted() {
        // The auth service only sets `sub` and `exp`
        let config = test_config();
        let claims = serde_json::json!({
            "sub": "demo@example.com",
            "exp": Utc::now().timestamp() + 600,
        });
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.secret.as_bytes()),
        )
        .unwrap();

        let service = JwtService::new(config);
        let decoded = service.validate_access_token(&token).unwrap();
        assert_eq!(decoded.sub, "demo@example.com");
        assert!(decoded.email.is_none());
        assert!(decoded.iat.is_none());
    }

    #[test]
    fn test_invalid_token() {
        let service = JwtService::new(test_config());
        assert!(service.validate_access_token("invalid-token").is_err());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let issuer = JwtService::new(JwtConfig {
            secret: "another-secret".to_string(),
            ..test_config()
        });
        let token = issuer.generate_access_token("x@example.com", None, None).unwrap();

        let service = JwtService::new(test_config());
        assert!(service.validate_access_token(&token).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let config = test_config();
        let claims = AccessTokenClaims {
            sub: "late@example.com".to_string(),
            exp: Utc::now().timestamp() - 3600,
            iat: None,
            email: None,
            name: None,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.secret.as_bytes()),
        )
        .unwrap();

        let service = JwtService::new(config);
        assert!(service.validate_access_token(&token).is_err());
    }

    #[test]
    fn test_empty_subject_rejected() {
        let service = JwtService::new(test_config());
        let token = service.generate_access_token("  ", None, None).unwrap();
        assert!(service.validate_access_token(&token).is_err());
    }

    #[test]
    fn test_lifetime_secs_saturates() {
        let service = JwtService::new(JwtConfig {
            access_token_lifetime: StdDuration::from_secs(u64::MAX),
            ..test_config()
        });
        assert_eq!(service.access_token_lifetime_secs(), i64::MAX);
    }
}
