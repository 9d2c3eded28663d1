//! Payment providers: port, registry and implementations

pub mod paytabs;
pub mod port;
pub mod registry;
pub mod stripe;

pub use port::{
    PaymentConfirmation, PaymentError, PaymentOutcome, PaymentProvider, PaymentRequest,
    ProviderKind,
};
pub use registry::ProviderRegistry;
