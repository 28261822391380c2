// Authentication extractor
// Decision: Support both cookie-based (dashboard UI) and header-based (API) bearer tokens
// Decision: In "none" mode the gate returns an anonymous user context

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, HeaderMap},
};
use axum_extra::extract::CookieJar;
use std::sync::Arc;

use super::config::AuthMode;
use super::gate::{AuthError, AuthUser, IdentityGate};
use crate::error::ControlError;

/// Name of the cookie the dashboard stores its access token in
pub const ACCESS_TOKEN_COOKIE: &str = "access_token";

/// Auth state shared across routes
#[derive(Clone)]
pub struct AuthState {
    pub gate: Arc<dyn IdentityGate>,
}

impl AuthState {
    pub fn new(gate: Arc<dyn IdentityGate>) -> Self {
        Self { gate }
    }
}

/// Extractor for authenticated user
/// This is required - rejects with 401 if not authenticated
#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AuthState: FromRef<S>,
{
    type Rejection = ControlError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_state = AuthState::from_ref(state);
        let token = match bearer_token(&parts.headers) {
            Ok(token) => token,
            // An open gate ignores credentials, including unusable ones
            Err(_) if auth_state.gate.mode() == AuthMode::None => None,
            Err(e) => return Err(e.into()),
        };
        let user = auth_state.gate.validate(token.as_deref())?;
        Ok(user)
    }
}

/// Pull the bearer token out of the Authorization header, falling back to the
/// access-token cookie. A header with any other scheme is rejected outright.
pub fn bearer_token(headers: &HeaderMap) -> Result<Option<String>, AuthError> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        let auth_str = auth_header
            .to_str()
            .map_err(|_| AuthError::unauthorized("Invalid authorization header"))?;

        let (scheme, token) = auth_str
            .split_once(' ')
            .ok_or_else(|| AuthError::unauthorized("Invalid authorization header"))?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return Err(AuthError::unauthorized("Unsupported authorization scheme"));
        }
        return Ok(Some(token.trim().to_string()));
    }

    let jar = CookieJar::from_headers(headers);
    Ok(jar
        .get(ACCESS_TOKEN_COOKIE)
        .map(|cookie| cookie.value().to_string()))
}
