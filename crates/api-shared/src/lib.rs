//! # API Shared
//!
//! Shared utilities and definitions for the lab report APIs.
//!
//! Contains:
//! - Response bodies that are not core model types (`dto` module)
//! - Shared services like `HealthService`
//! - Authentication utilities
//!
//! Used by `api-rest` for common functionality.

pub mod auth;
pub mod dto;
pub mod health;

pub use auth::{validate_api_key, AuthError};
pub use dto::*;
pub use health::HealthService;
