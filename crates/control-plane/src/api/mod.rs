// HTTP API routes
//
// Each submodule handles one concern with its own AppState.

pub mod common;
pub mod locust;
pub mod metrics;
pub mod realtime;

// Re-export common types
pub use common::{ErrorResponse, StatusResponse};
