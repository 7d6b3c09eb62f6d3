//! Navigation state and route guarding

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::info;

/// Where the user currently is, and how to send them elsewhere
pub trait Navigator: Send + Sync {
    fn current_path(&self) -> String;
    fn navigate(&self, path: &str);
}

/// In-process navigation state
#[derive(Debug)]
pub struct RouteState {
    current: Mutex<String>,
    navigations: AtomicUsize,
}

impl RouteState {
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            current: Mutex::new(initial.into()),
            navigations: AtomicUsize::new(0),
        }
    }

    /// Number of forced navigations performed so far
    pub fn navigation_count(&self) -> usize {
        self.navigations.load(Ordering::SeqCst)
    }
}

impl Default for RouteState {
    fn default() -> Self {
        Self::new("/")
    }
}

impl Navigator for RouteState {
    fn current_path(&self) -> String {
        self.current.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn navigate(&self, path: &str) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        info!("Navigating from {} to {}", current, path);
        *current = path.to_string();
        self.navigations.fetch_add(1, Ordering::SeqCst);
    }
}

/// Outcome of guarding a navigation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    Proceed,
    Redirect(String),
}

/// Decide whether a navigation to `target` may proceed.
///
/// Protected routes need a token; the login route is skipped for a user who
/// already has one.
pub fn resolve_route(
    target: &str,
    requires_auth: bool,
    has_token: bool,
    login_route: &str,
    home_route: &str,
) -> RouteDecision {
    if requires_auth && !has_token {
        RouteDecision::Redirect(login_route.to_string())
    } else if target == login_route && has_token {
        RouteDecision::Redirect(home_route.to_string())
    } else {
        RouteDecision::Proceed
    }
}
