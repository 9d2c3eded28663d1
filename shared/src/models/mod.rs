//! Data models
//!
//! Shared between the settlement service and its API consumers.
//! IDs are UUID strings; timestamps are Unix millis.

pub mod invoice;
pub mod menu;
pub mod order;
pub mod payment;
pub mod restaurant;

// Re-exports
pub use invoice::*;
pub use menu::*;
pub use order::*;
pub use payment::*;
pub use restaurant::*;
