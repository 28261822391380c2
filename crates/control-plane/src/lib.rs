// Locust dashboard control plane library
// Decision: Shared library for binaries (API server, CLI tools) and integration tests

// API routes and types (shared for OpenAPI generation)
pub mod api;

// Router assembly and health
pub mod app;

// Authentication module
pub mod auth;

// Environment configuration
pub mod config;

pub mod error;

// Services layer
pub mod services;
pub use services::{SubscriberRegistry, WorkerSupervisor};

// OpenAPI spec generation
pub mod openapi;
