//! Route protection rules.
//!
//! Decides whether navigation to a route is allowed given the current
//! authentication state, or where the client should be sent instead.

use crate::auth::AuthState;

/// Route of the login page.
pub const LOGIN_ROUTE: &str = "/login";

/// Route users land on after signing in.
pub const DEFAULT_AUTHENTICATED_ROUTE: &str = "/agents";

/// Public landing page, reachable in both states.
pub const LANDING_ROUTE: &str = "/";

/// Routes reachable without a session.
pub const PUBLIC_ROUTES: &[&str] = &[
    LANDING_ROUTE,
    LOGIN_ROUTE,
    "/register",
    "/forgot-password",
    "/reset-password",
    "/privacy",
    "/terms",
];

/// Outcome of a route check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// Navigation may proceed.
    Allow,
    /// Navigation must be replaced by this route.
    Redirect(String),
}

impl RouteDecision {
    /// Redirect target, if any.
    #[must_use]
    pub fn redirect_target(&self) -> Option<&str> {
        match self {
            Self::Allow => None,
            Self::Redirect(to) => Some(to),
        }
    }
}

/// Public allow-list plus the login and landing routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteGuard {
    public_routes: Vec<String>,
    login_route: String,
    authenticated_route: String,
    landing_route: String,
}

impl Default for RouteGuard {
    fn default() -> Self {
        Self {
            public_routes: PUBLIC_ROUTES.iter().map(ToString::to_string).collect(),
            login_route: LOGIN_ROUTE.to_string(),
            authenticated_route: DEFAULT_AUTHENTICATED_ROUTE.to_string(),
            landing_route: LANDING_ROUTE.to_string(),
        }
    }
}

impl RouteGuard {
    /// Creates a guard with the standard console routes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a route to the public allow-list.
    #[must_use]
    pub fn with_public_route(mut self, route: impl Into<String>) -> Self {
        self.public_routes.push(route.into());
        self
    }

    /// Login route.
    #[must_use]
    pub fn login_route(&self) -> &str {
        &self.login_route
    }

    /// Default route after sign-in.
    #[must_use]
    pub fn authenticated_route(&self) -> &str {
        &self.authenticated_route
    }

    /// Returns true if `path` is reachable without a session.
    ///
    /// Query strings and fragments are ignored. Entries match exactly or as a
    /// prefix followed by `/`, except the landing route which only matches itself.
    #[must_use]
    pub fn is_public(&self, path: &str) -> bool {
        let path = normalize(path);
        self.public_routes.iter().any(|route| {
            if route == &self.landing_route {
                path == route.as_str()
            } else {
                path == route.as_str()
                    || path
                        .strip_prefix(route.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            }
        })
    }

    /// Decides what happens when navigating to `path` in `state`.
    ///
    /// While the session check is pending nothing is redirected.
    #[must_use]
    pub fn check(&self, state: &AuthState, path: &str) -> RouteDecision {
        let public = self.is_public(path);
        match state {
            AuthState::Unauthenticated if !public => {
                RouteDecision::Redirect(self.login_route.clone())
            }
            AuthState::Authenticated { .. }
                if public && normalize(path) != self.landing_route =>
            {
                RouteDecision::Redirect(self.authenticated_route.clone())
            }
            _ => RouteDecision::Allow,
        }
    }
}

fn normalize(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::UserProfile;

    fn signed_in() -> AuthState {
        AuthState::Authenticated {
            user: UserProfile {
                id: 1,
                name: String::new(),
                email: "a@b.c".to_string(),
                role: None,
                company_id: None,
                plan: None,
                subscription_expires_at: None,
            },
        }
    }

    #[test]
    fn test_unauthenticated_protected_route_redirects_to_login() {
        let guard = RouteGuard::new();
        assert_eq!(
            guard.check(&AuthState::Unauthenticated, "/agents"),
            RouteDecision::Redirect("/login".to_string())
        );
    }

    #[test]
    fn test_authenticated_login_redirects_to_agents() {
        let guard = RouteGuard::new();
        assert_eq!(
            guard.check(&signed_in(), "/login"),
            RouteDecision::Redirect("/agents".to_string())
        );
    }

    #[test]
    fn test_authenticated_landing_is_exempt() {
        let guard = RouteGuard::new();
        assert_eq!(guard.check(&signed_in(), "/"), RouteDecision::Allow);
    }

    #[test]
    fn test_public_route_matching() {
        let guard = RouteGuard::new();
        assert!(guard.is_public("/reset-password/abc123"));
        assert!(guard.is_public("/login?next=%2Fdialogs"));
        assert!(guard.is_public("/register/"));
        assert!(!guard.is_public("/registered-users"));
        assert!(!guard.is_public("/dialogs"));
    }

    #[test]
    fn test_pending_state_never_redirects() {
        let guard = RouteGuard::new();
        assert_eq!(guard.check(&AuthState::Checking, "/agents"), RouteDecision::Allow);
        assert_eq!(guard.check(&AuthState::Uninitialized, "/login"), RouteDecision::Allow);
    }

    #[test]
    fn test_custom_public_route() {
        let guard = RouteGuard::new().with_public_route("/pricing");
        assert_eq!(
            guard.check(&AuthState::Unauthenticated, "/pricing"),
            RouteDecision::Allow
        );
    }
}
