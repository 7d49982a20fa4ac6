//! Console presentation adapters.

use chatdesk_application::ports::{Navigator, Notifier};
use chatdesk_domain::routes::LANDING_ROUTE;
use chatdesk_domain::{Notification, NotificationLevel};
use parking_lot::RwLock;
use tracing::{error, info, warn};

/// Emits notifications as tracing events at the matching level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        let kind = notification.kind;
        match notification.level {
            NotificationLevel::Info => info!(kind = ?kind, "{}", notification.message),
            NotificationLevel::Warning => warn!(kind = ?kind, "{}", notification.message),
            NotificationLevel::Error => error!(kind = ?kind, "{}", notification.message),
        }
    }
}

/// Tracks the current route for a console without a router.
#[derive(Debug)]
pub struct ConsoleNavigator {
    route: RwLock<String>,
}

impl Default for ConsoleNavigator {
    fn default() -> Self {
        Self {
            route: RwLock::new(LANDING_ROUTE.to_string()),
        }
    }
}

impl ConsoleNavigator {
    /// Starts at the landing route.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The route last navigated to.
    #[must_use]
    pub fn current_route(&self) -> String {
        self.route.read().clone()
    }
}

impl Navigator for ConsoleNavigator {
    fn navigate(&self, route: &str) {
        let mut current = self.route.write();
        if *current != route {
            info!(from = %current, to = route, "navigating");
            *current = route.to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatdesk_domain::NotificationKind;

    #[test]
    fn test_navigator_tracks_route() {
        let navigator = ConsoleNavigator::new();
        assert_eq!(navigator.current_route(), LANDING_ROUTE);

        navigator.navigate("/login");
        navigator.navigate("/agents");
        assert_eq!(navigator.current_route(), "/agents");
    }

    #[test]
    fn test_notifier_accepts_every_level() {
        let notifier = TracingNotifier;
        notifier.notify(Notification::info(NotificationKind::NewAppeal, "hello"));
        notifier.notify(Notification::new(
            NotificationKind::Realtime,
            NotificationLevel::Warning,
            "reconnecting",
        ));
        notifier.notify(Notification::error(NotificationKind::ServerError, "boom"));
    }
}
