//! Authentication: session lifecycle, auth flows and authenticated calls.
//!
//! - [`AuthOrchestrator`] owns the auth state machine and route guarding
//! - [`AuthorizedCalls`] runs backend calls with single-flight token refresh
//! - [`SessionEvent`] is broadcast on every session change

mod authorized;
mod events;
mod orchestrator;

pub use authorized::AuthorizedCalls;
pub use events::SessionEvent;
pub use orchestrator::{AuthOrchestrator, PROFILE_CACHE_MAX_AGE_SECONDS, SESSION_CHECK_INTERVAL};
