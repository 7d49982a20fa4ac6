//! ID generation utilities.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates a new UUID v7 as a string.
///
/// UUID v7 includes timestamp information and is sortable.
#[must_use]
pub fn generate_id() -> String {
    Uuid::now_v7().to_string()
}

/// Client-generated identifier matching an optimistic message with its
/// server-confirmed counterpart.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Generates a fresh local correlation id.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("local-{}", generate_id()))
    }

    /// Correlation id for a message that only ever existed on the server.
    #[must_use]
    pub fn for_server_message(server_id: i64) -> Self {
        Self(format!("server-{server_id}"))
    }

    /// Wraps an id echoed back by the server.
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the id was generated on this client.
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.0.starts_with("local-")
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_id_format() {
        let id = generate_id();
        // 8-4-4-4-12 = 36 chars
        assert_eq!(id.len(), 36);
        assert!(Uuid::parse_str(&id).is_ok());
    }

    #[test]
    fn test_generate_id_uniqueness() {
        assert_ne!(generate_id(), generate_id());
    }

    #[test]
    fn test_correlation_ids() {
        let local = CorrelationId::generate();
        assert!(local.is_local());
        assert_ne!(local, CorrelationId::generate());

        let server = CorrelationId::for_server_message(42);
        assert_eq!(server.as_str(), "server-42");
        assert!(!server.is_local());
    }
}
