//! Session storage: tokens, cached profile and expiry checks.

mod memory;
mod token_store;

pub use memory::MemoryStorage;
pub use token_store::{
    REFRESH_THRESHOLD_SECONDS, SessionStore, TOKENS_KEY, TokenStatus, USER_KEY,
};
