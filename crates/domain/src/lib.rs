//! Chatdesk Domain - Core types
//!
//! This crate defines the domain model for the Chatdesk session and
//! realtime messaging core. All types here are pure Rust with no I/O
//! dependencies.

pub mod auth;
pub mod dialog;
pub mod error;
pub mod frames;
pub mod id;
pub mod notification;
pub mod routes;
pub mod websocket;

pub use auth::{
    AuthResponse, AuthState, AuthTransition, CachedProfile, Credentials, RefreshResponse,
    RegistrationData, TokenClaims, TokenPair, UserProfile,
};
pub use dialog::{
    Appeal, AppealPatch, Chat, DeliveryStatus, DialogMessage, Page, PageRequest, SendMessage,
    Sender, SenderKind, ServerMessage,
};
pub use error::{DomainError, DomainResult};
pub use frames::{InboundEvent, TypingSignal};
pub use id::{CorrelationId, generate_id};
pub use notification::{Notification, NotificationKind, NotificationLevel};
pub use routes::{RouteDecision, RouteGuard};
pub use websocket::{
    ConnectionEvent, ConnectionInfo, ConnectionState, Directive, ReconnectPolicy,
    SubscribeFormat, Topic, realtime_url,
};
