//! Port definitions (interfaces)
//!
//! Ports define the boundaries between the application core and external systems.
//! Each port is a trait that can be implemented by adapters in the infrastructure layer.

mod auth_api;
mod backend_api;
mod clock;
mod presentation;
mod realtime;
mod storage;

pub use auth_api::AuthApi;
pub use backend_api::BackendApi;
pub use clock::Clock;
pub use presentation::{Navigator, Notifier};
pub use realtime::{
    AccessTokenSource, FrameHandler, RealtimeTransport, TransportConnection, TransportError,
    TransportEvent,
};
pub use storage::KeyValueStorage;
