//! Adapters implementing the application ports.

mod presentation;
mod reqwest_api;
mod system_clock;
mod tungstenite_transport;

pub use presentation::{ConsoleNavigator, TracingNotifier};
pub use reqwest_api::{
    ClientBuildError, DEFAULT_REQUEST_TIMEOUT, JsonClient, ReqwestAuthApi, ReqwestBackendApi,
    SERVICE_KEY_HEADER, USER_AGENT,
};
pub use system_clock::SystemClock;
pub use tungstenite_transport::{DEFAULT_CONNECT_TIMEOUT, TungsteniteTransport};
