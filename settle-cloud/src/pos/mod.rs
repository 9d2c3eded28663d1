//! POS integration: adapter port, HTTP connector, menu sync, order push
//! and inbound callbacks

pub mod http_adapter;
pub mod inbound;
pub mod port;
pub mod push;
pub mod status_map;
pub mod sync_job;

pub use http_adapter::HttpPosConnectors;
pub use port::{
    MenuSnapshot, PosCategory, PosConnector, PosConnectors, PosError, PosMenuItem, PosOrder,
};
