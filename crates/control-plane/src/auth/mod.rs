// Authentication module
//
// The identity gate is an external collaborator: tokens are issued elsewhere,
// this module only validates them before supervisor operations.

pub mod config;
pub mod gate;
pub mod jwt;
pub mod middleware;

pub use config::{AuthConfig, AuthMode, JwtConfig};
pub use gate::{gate_from_config, AuthError, AuthMethod, AuthUser, IdentityGate, JwtGate, OpenGate};
pub use jwt::JwtService;
pub use middleware::AuthState;
