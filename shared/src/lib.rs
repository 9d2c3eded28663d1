//! Shared types for the settlement platform
//!
//! Error system, domain models and the order lifecycle, used by the
//! settlement service and by anything that talks to its API.

pub mod error;
pub mod models;
pub mod order;

// Re-exports
pub use axum::Json;
pub use http;
pub use serde::{Deserialize, Serialize};
