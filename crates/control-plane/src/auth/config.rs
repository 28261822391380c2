// Authentication configuration loaded from environment variables.
// Decision: AUTH_ prefix for all auth config
// Decision: The mode is decided once at startup; handlers never query the auth backend
// Decision: Default to JWT; "none" is an explicit opt-in for local demos

use anyhow::{bail, Result};
use std::time::Duration;

/// Authentication mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    /// No authentication required (local demo); every caller is anonymous
    None,
    /// Bearer JWT issued by the external auth service
    #[default]
    Jwt,
}

impl AuthMode {
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "none" | "demo" | "disabled" => AuthMode::None,
            _ => AuthMode::Jwt,
        }
    }
}

impl std::fmt::Display for AuthMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthMode::None => write!(f, "none"),
            AuthMode::Jwt => write!(f, "jwt"),
        }
    }
}

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Secret key shared with the token issuer (HS256)
    pub secret: String,
    /// Lifetime of tokens minted by `issue-token`
    pub access_token_lifetime: Duration,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            access_token_lifetime: Duration::from_secs(30 * 60), // 30 minutes
        }
    }
}

/// Complete authentication configuration
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    /// Authentication mode
    pub mode: AuthMode,
    /// JWT configuration
    pub jwt: JwtConfig,
}

impl AuthConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mode = std::env::var("AUTH_MODE")
            .map(|s| AuthMode::from_str(&s))
            .unwrap_or_default();

        let secret = std::env::var("AUTH_JWT_SECRET").unwrap_or_default();

        let access_token_lifetime = crate::config::env_parse("AUTH_JWT_ACCESS_TOKEN_LIFETIME")
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(30 * 60));

        let config = Self {
            mode,
            jwt: JwtConfig {
                secret,
                access_token_lifetime,
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that would accept forged tokens
    pub fn validate(&self) -> Result<()> {
        if self.mode == AuthMode::Jwt && self.jwt.secret.is_empty() {
            bail!("AUTH_JWT_SECRET must be set when AUTH_MODE is jwt (set AUTH_MODE=none for demo mode)");
        }
        Ok(())
    }

    /// Check if authentication is enabled
    pub fn is_enabled(&self) -> bool {
        self.mode != AuthMode::None
    }
}
