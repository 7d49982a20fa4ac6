//! Presentation-side ports: navigation and notifications

use chatdesk_domain::Notification;

/// Port for changing the current route.
pub trait Navigator: Send + Sync {
    /// Replaces the current route with `route`.
    fn navigate(&self, route: &str);
}

/// Port for showing dismissible notifications.
pub trait Notifier: Send + Sync {
    /// Shows `notification` to the user.
    fn notify(&self, notification: Notification);
}
