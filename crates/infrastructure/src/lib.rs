//! Chatdesk Infrastructure - Adapters and implementations
//!
//! This crate provides concrete implementations of the ports
//! defined in the application layer, plus console configuration.

pub mod adapters;
pub mod config;
pub mod persistence;
pub mod serialization;

pub use adapters::{
    ClientBuildError, ConsoleNavigator, JsonClient, ReqwestAuthApi, ReqwestBackendApi,
    SystemClock, TracingNotifier, TungsteniteTransport,
};
pub use config::{ConfigError, ConsoleConfig, ReconnectSettings};
pub use persistence::{FileStorage, StorageError};
pub use serialization::{SerializationError, from_json_bytes, to_json_stable, to_json_stable_bytes};
