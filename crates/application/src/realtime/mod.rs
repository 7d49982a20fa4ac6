//! Realtime messaging channel.

mod channel;

pub use channel::{CONNECTION_LOST_MESSAGE, ChannelConfig, RealtimeChannel, STABLE_CONNECTION};
