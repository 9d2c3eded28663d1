//! Order aggregate: enums and the canonical lifecycle
//!
//! - [`types`]: status, payment and routing enums
//! - [`lifecycle`]: the state machine every writer goes through

pub mod lifecycle;
pub mod types;

// Re-exports
pub use lifecycle::{LifecycleError, TransitionMode};
pub use types::*;
