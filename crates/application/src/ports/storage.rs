//! Persistent key/value storage port

/// Synchronous key/value storage holding the session between runs.
///
/// Implementations never fail loudly: an unreadable or unwritable store
/// behaves as empty and ignores writes, logging the cause.
pub trait KeyValueStorage: Send + Sync {
    /// Returns the value stored under `key`, if any.
    fn get(&self, key: &str) -> Option<String>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str);

    /// Removes `key`. Removing a missing key is a no-op.
    fn remove(&self, key: &str);
}
