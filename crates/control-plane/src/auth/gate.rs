// Identity gate
// Decision: The gate is the only way to obtain an AuthUser, so holding one proves validation happened
// Decision: Implementations are chosen once at startup from AuthConfig

use std::sync::Arc;
use thiserror::Error;

use super::config::{AuthConfig, AuthMode};
use super::jwt::JwtService;
use crate::error::ControlError;

/// Credential rejected by the gate
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct AuthError {
    pub message: String,
}

impl AuthError {
    pub fn unauthorized(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

impl From<AuthError> for ControlError {
    fn from(err: AuthError) -> Self {
        ControlError::Unauthorized(err.message)
    }
}

/// Authentication method used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    /// No authentication (anonymous)
    None,
    /// JWT bearer token
    Jwt,
}

/// Validated caller identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    /// Audit-log subject
    pub subject: String,
    /// User email, when known
    pub email: Option<String>,
    /// User name, when known
    pub name: Option<String>,
    /// Authentication method used
    pub auth_method: AuthMethod,
}

impl AuthUser {
    /// Create an anonymous user for no-auth mode
    pub fn anonymous() -> Self {
        Self {
            subject: "anonymous".to_string(),
            email: None,
            name: None,
            auth_method: AuthMethod::None,
        }
    }
}

/// Validates bearer credentials before supervisor operations.
pub trait IdentityGate: Send + Sync {
    /// Validate the raw bearer token (if any) carried by a request
    fn validate(&self, token: Option<&str>) -> Result<AuthUser, AuthError>;

    /// Mode this gate enforces
    fn mode(&self) -> AuthMode;
}

/// Accepts every request as the anonymous user
#[derive(Debug, Default)]
pub struct OpenGate;

impl IdentityGate for OpenGate {
    fn validate(&self, _token: Option<&str>) -> Result<AuthUser, AuthError> {
        Ok(AuthUser::anonymous())
    }

    fn mode(&self) -> AuthMode {
        AuthMode::None
    }
}

/// Requires a valid HS256 access token
pub struct JwtGate {
    jwt: JwtService,
}

impl JwtGate {
    pub fn new(jwt: JwtService) -> Self {
        Self { jwt }
    }
}

impl IdentityGate for JwtGate {
    fn validate(&self, token: Option<&str>) -> Result<AuthUser, AuthError> {
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::unauthorized("Authentication required"))?;

        let claims = self.jwt.validate_access_token(token).map_err(|e| {
            tracing::debug!("JWT validation failed: {:#}", e);
            AuthError::unauthorized("Invalid or expired token")
        })?;

        Ok(AuthUser {
            subject: claims.sub,
            email: claims.email,
            name: claims.name,
            auth_method: AuthMethod::Jwt,
        })
    }

    fn mode(&self) -> AuthMode {
        AuthMode::Jwt
    }
}

/// Build the gate for the configured mode
pub fn gate_from_config(config: &AuthConfig) -> Arc<dyn IdentityGate> {
    match config.mode {
        AuthMode::None => Arc::new(OpenGate),
        AuthMode::Jwt => Arc::new(JwtGate::new(JwtService::new(config.jwt.clone()))),
    }
}
