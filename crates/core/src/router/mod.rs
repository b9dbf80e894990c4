//! Client-side navigation for the app shell.
//!
//! The router maps path strings to handlers and keeps the shell's document
//! state (title, URL, active navigation link, scroll offset) and its session
//! history in step with every navigation.
//!
//! ### Navigation
//! - Unknown paths redirect to the not-found route.
//! - Global guards, then route guards, run in registration order; the first
//!   `false` stops the navigation with no side effects.
//! - Routes marked `requires_auth` redirect to the login route when the
//!   [`Authenticator`] rejects.
//! - A handler error redirects to the not-found route.
//! - Redirects are resolved iteratively. Re-entering a path already visited
//!   during the same navigation ends it as [`Navigation::Unroutable`], so a
//!   missing or failing not-found route can never loop.
//!
//! ### Events
//! Every completed navigation is published as a [`RouteChange`] on a
//! broadcast channel; subscribe with [`Router::subscribe`].
//!
//! ### Hosting
//! The router is a library type for the page host that embeds the shell:
//! it owns the route handlers and renders on each [`RouteChange`]. The
//! `noor-worker` binary has no pages, so none of its tools drive a router.

mod history;
mod query;
mod route;

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;

pub use history::{History, HistoryEntry, HistoryState};
pub use query::{QueryParams, parse_query_string};
pub use route::{Breadcrumb, Guard, Handler, HandlerError, Prefetch, Route, RouteContext, RouteOptions, Transition};

const EVENT_CAPACITY: usize = 64;
const HOME_LABEL: &str = "الرئيسية";

/// Decides whether protected routes may be entered.
pub trait Authenticator: Send + Sync {
    fn is_authenticated(&self) -> bool;
}

/// Accepts everyone.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysAuthenticated;

impl Authenticator for AlwaysAuthenticated {
    fn is_authenticated(&self) -> bool {
        true
    }
}

/// Document state the host mirrors into its UI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DocumentState {
    pub title: String,
    pub url: String,
    pub active_nav: Option<String>,
    pub scroll_y: u32,
}

/// Published after each completed navigation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteChange {
    pub route: String,
    pub query_params: QueryParams,
    pub transition: Option<Transition>,
}

/// How a navigation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    /// The handler for `path` ran. `path` is the final route after redirects.
    Completed { path: String },
    /// A guard on `path` refused.
    Blocked { path: String },
    /// Redirects came back to `path` a second time.
    Unroutable { path: String },
}

impl Navigation {
    pub fn is_completed(&self) -> bool {
        matches!(self, Navigation::Completed { .. })
    }
}

/// Hash/History router.
pub struct Router {
    routes: HashMap<String, Route>,
    current_route: Option<String>,
    query_params: QueryParams,
    default_route: String,
    not_found_route: String,
    login_route: String,
    app_title: String,
    global_middleware: Vec<Guard>,
    authenticator: Arc<dyn Authenticator>,
    transition: Option<Transition>,
    route_cache: Option<HashMap<String, String>>,
    history: History,
    document: DocumentState,
    events: broadcast::Sender<RouteChange>,
}

impl Router {
    /// Create a router whose document titles end with `app_title`.
    pub fn new(app_title: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            routes: HashMap::new(),
            current_route: None,
            query_params: QueryParams::new(),
            default_route: "home".into(),
            not_found_route: "404".into(),
            login_route: "login".into(),
            app_title: app_title.into(),
            global_middleware: Vec::new(),
            authenticator: Arc::new(AlwaysAuthenticated),
            transition: None,
            route_cache: None,
            history: History::new(),
            document: DocumentState::default(),
            events,
        }
    }

    /// Replace the authentication check used for `requires_auth` routes.
    pub fn with_authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = authenticator;
        self
    }

    /// Register a route. An existing route at `path` is replaced.
    pub fn add_route<F>(&mut self, path: &str, handler: F, options: RouteOptions)
    where
        F: Fn(&RouteContext<'_>) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        let route = options.into_route(path, Arc::new(handler));
        if self.routes.insert(path.to_string(), route).is_some() {
            tracing::debug!(route = path, "replaced existing route");
        }
    }

    /// Remove a route. Returns false if none was registered.
    pub fn remove_route(&mut self, path: &str) -> bool {
        self.routes.remove(path).is_some()
    }

    pub fn route(&self, path: &str) -> Option<&Route> {
        self.routes.get(path)
    }

    /// Navigate to `path`.
    ///
    /// `push_state` is false when the navigation replays an existing history
    /// entry (back/forward, hash change) so no duplicate entry is pushed.
    /// Redirects to the not-found or login route always push.
    pub fn navigate_to(&mut self, path: &str, push_state: bool) -> Navigation {
        let mut target = path.to_string();
        let mut push = push_state;
        let mut visited: Vec<String> = Vec::new();
        let query = self.query_params.clone();

        loop {
            if visited.contains(&target) {
                tracing::warn!(route = %target, requested = path, "redirect loop; giving up");
                return Navigation::Unroutable { path: target };
            }
            visited.push(target.clone());

            let Some(route) = self.routes.get(&target).cloned() else {
                tracing::warn!(route = %target, "route not found");
                target = self.not_found_route.clone();
                push = true;
                continue;
            };

            let ctx = RouteContext { path: &target, query: &query };
            if !self.global_middleware.iter().chain(route.middleware.iter()).all(|guard| guard(&ctx)) {
                tracing::debug!(route = %target, "navigation blocked by guard");
                return Navigation::Blocked { path: target };
            }

            if route.requires_auth && !self.authenticator.is_authenticated() {
                tracing::debug!(route = %target, "authentication required");
                target = self.login_route.clone();
                push = true;
                continue;
            }

            self.current_route = Some(target.clone());

            if push {
                let url = self.url_for(&target);
                self.history.push(HistoryEntry {
                    state: HistoryState { route: target.clone() },
                    title: route.title.clone(),
                    url: url.clone(),
                });
                self.document.url = url;
            }

            self.document.title = format!("{} - {}", route.title, self.app_title);

            let ctx = RouteContext { path: &target, query: &query };
            if let Err(e) = (route.handler)(&ctx) {
                tracing::error!(route = %target, error = %e, "route handler failed");
                target = self.not_found_route.clone();
                push = true;
                continue;
            }

            self.document.active_nav = Some(target.clone());
            self.document.scroll_y = 0;
            self.track_route(&target);

            let change = RouteChange {
                route: target.clone(),
                query_params: query,
                transition: route.transition.or(self.transition),
            };
            // No subscribers is fine.
            let _ = self.events.send(change);

            return Navigation::Completed { path: target };
        }
    }

    /// React to a hash change (`#path?query`), or the initial load.
    ///
    /// An empty hash means the default route. Query parameters are stored
    /// for handlers and the route is entered without pushing history.
    pub fn handle_hash_change(&mut self, hash: &str) -> Navigation {
        let raw = hash.strip_prefix('#').unwrap_or(hash);
        let route = if raw.is_empty() { self.default_route.clone() } else { raw.to_string() };
        let (path, query) = route.split_once('?').unwrap_or((route.as_str(), ""));

        self.query_params = parse_query_string(query);
        self.navigate_to(path, false)
    }

    /// React to a back/forward event carrying saved state.
    pub fn handle_pop_state(&mut self, state: Option<&HistoryState>) -> Option<Navigation> {
        let state = state?;
        Some(self.navigate_to(&state.route, false))
    }

    pub fn go_back(&mut self) -> Option<Navigation> {
        let state = self.history.back()?;
        self.document.url = self.url_for(&state.route);
        self.handle_pop_state(Some(&state))
    }

    pub fn go_forward(&mut self) -> Option<Navigation> {
        let state = self.history.forward()?;
        self.document.url = self.url_for(&state.route);
        self.handle_pop_state(Some(&state))
    }

    /// Re-run the current route without touching history.
    pub fn refresh(&mut self) -> Option<Navigation> {
        let current = self.current_route.clone()?;
        Some(self.navigate_to(&current, false))
    }

    fn url_for(&self, path: &str) -> String {
        if path == self.default_route { "/".to_string() } else { format!("/#{path}") }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RouteChange> {
        self.events.subscribe()
    }

    pub fn current_route(&self) -> Option<&str> {
        self.current_route.as_deref()
    }

    pub fn query_params(&self) -> &QueryParams {
        &self.query_params
    }

    pub fn document(&self) -> &DocumentState {
        &self.document
    }

    /// Record the host's scroll offset; reset to 0 on every navigation.
    pub fn set_scroll(&mut self, y: u32) {
        self.document.scroll_y = y;
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn set_default_route(&mut self, route: impl Into<String>) {
        self.default_route = route.into();
    }

    pub fn set_not_found_route(&mut self, route: impl Into<String>) {
        self.not_found_route = route.into();
    }

    pub fn set_login_route(&mut self, route: impl Into<String>) {
        self.login_route = route.into();
    }

    /// Router-wide transition, used when a route has none of its own.
    pub fn set_transition_effect(&mut self, transition: Option<Transition>) {
        self.transition = transition;
    }

    /// Add a guard that runs before every route's own guards.
    pub fn add_global_middleware<F>(&mut self, guard: F)
    where
        F: Fn(&RouteContext<'_>) -> bool + Send + Sync + 'static,
    {
        self.global_middleware.push(Arc::new(guard));
    }

    /// Append a guard to an existing route. Returns false if the route is unknown.
    pub fn add_route_guard<F>(&mut self, path: &str, guard: F) -> bool
    where
        F: Fn(&RouteContext<'_>) -> bool + Send + Sync + 'static,
    {
        match self.routes.get_mut(path) {
            Some(route) => {
                route.middleware.push(Arc::new(guard));
                true
            }
            None => false,
        }
    }

    pub fn set_route_metadata(&mut self, path: &str, metadata: serde_json::Value) -> bool {
        match self.routes.get_mut(path) {
            Some(route) => {
                route.metadata = Some(metadata);
                true
            }
            None => false,
        }
    }

    pub fn route_metadata(&self, path: &str) -> Option<&serde_json::Value> {
        self.routes.get(path).and_then(|r| r.metadata.as_ref())
    }

    /// Run a route's prefetch hook. Returns false if it has none.
    pub fn prefetch_route(&self, path: &str) -> bool {
        match self.routes.get(path).and_then(|r| r.prefetch.as_ref()) {
            Some(prefetch) => {
                prefetch();
                true
            }
            None => false,
        }
    }

    /// Breadcrumbs for the current route: its own list if it defines one,
    /// otherwise home followed by the current route.
    pub fn breadcrumbs(&self) -> Vec<Breadcrumb> {
        let current = self.current_route.as_deref().unwrap_or(&self.default_route);
        let route = self.routes.get(current);

        if let Some(crumbs) = route.and_then(|r| r.breadcrumbs.clone()) {
            return crumbs;
        }

        let mut crumbs = vec![Breadcrumb { name: HOME_LABEL.into(), path: self.default_route.clone() }];
        if current != self.default_route {
            crumbs.push(Breadcrumb {
                name: route.map_or_else(|| current.to_string(), |r| r.title.clone()),
                path: current.to_string(),
            });
        }
        crumbs
    }

    pub fn track_route(&self, path: &str) {
        tracing::info!(route = path, page_path = %format!("/#{path}"), "route visited");
    }

    pub fn enable_route_cache(&mut self) {
        self.route_cache.get_or_insert_with(HashMap::new);
    }

    /// Cache rendered content. Ignored unless the cache is enabled.
    pub fn cache_route(&mut self, path: &str, content: impl Into<String>) {
        if let Some(cache) = self.route_cache.as_mut() {
            cache.insert(path.to_string(), content.into());
        }
    }

    pub fn cached_route(&self, path: &str) -> Option<&str> {
        self.route_cache.as_ref()?.get(path).map(String::as_str)
    }

    pub fn clear_route_cache(&mut self) {
        if let Some(cache) = self.route_cache.as_mut() {
            cache.clear();
        }
    }

    /// Drop all routes, cached content and history.
    pub fn destroy(&mut self) {
        self.routes.clear();
        self.clear_route_cache();
        self.history.clear();
        self.global_middleware.clear();
        self.current_route = None;
    }
}
