//! Chatdesk Application - Session and messaging services
//!
//! This crate holds the client-side session logic and the realtime
//! messaging core. It talks to the outside world only through the
//! traits in [`ports`]; adapters live in the infrastructure crate.
//!
//! - [`session`]: token and profile store
//! - [`auth`]: auth state machine, flows and single-flight refresh
//! - [`realtime`]: reconnecting duplex channel
//! - [`dialogs`]: optimistic message store and REST operations

pub mod auth;
pub mod dialogs;
pub mod error;
pub mod ports;
pub mod realtime;
pub mod session;

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    missing_docs,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]
pub(crate) mod testutil;

pub use auth::{AuthOrchestrator, AuthorizedCalls, SessionEvent};
pub use dialogs::{DialogService, DialogStore, DialogSync, Reconciliation};
pub use error::{
    ApiError, ApplicationError, ApplicationResult, AuthFailure, ChannelError,
    LOGIN_FALLBACK_MESSAGE,
};
pub use realtime::{ChannelConfig, RealtimeChannel};
pub use session::{MemoryStorage, SessionStore, TokenStatus};
