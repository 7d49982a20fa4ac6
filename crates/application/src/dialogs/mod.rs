//! Dialog state, REST operations and realtime synchronization.

mod service;
mod store;
mod sync;

pub use service::DialogService;
pub use store::{DialogStore, Reconciliation, TYPING_TIMEOUT_SECONDS};
pub use sync::DialogSync;
