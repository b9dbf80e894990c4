//! Route definitions and registration options.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::query::QueryParams;

/// Error a handler may return; it sends the navigation to the not-found route.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// What a handler sees while running.
#[derive(Debug, Clone, Copy)]
pub struct RouteContext<'a> {
    pub path: &'a str,
    pub query: &'a QueryParams,
}

pub type Handler = Arc<dyn Fn(&RouteContext<'_>) -> Result<(), HandlerError> + Send + Sync>;

/// A guard returns `false` to stop the navigation.
pub type Guard = Arc<dyn Fn(&RouteContext<'_>) -> bool + Send + Sync>;

pub type Prefetch = Arc<dyn Fn() + Send + Sync>;

/// Cosmetic effect the host plays around the page swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    Fade,
    Slide,
}

impl Transition {
    /// Delay before the new content is shown.
    pub fn duration(&self) -> Duration {
        Duration::from_millis(150)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breadcrumb {
    pub name: String,
    pub path: String,
}

/// A registered route.
#[derive(Clone)]
pub struct Route {
    pub path: String,
    pub handler: Handler,
    pub title: String,
    pub requires_auth: bool,
    pub middleware: Vec<Guard>,
    pub metadata: Option<serde_json::Value>,
    pub breadcrumbs: Option<Vec<Breadcrumb>>,
    pub prefetch: Option<Prefetch>,
    pub transition: Option<Transition>,
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("path", &self.path)
            .field("title", &self.title)
            .field("requires_auth", &self.requires_auth)
            .field("middleware", &self.middleware.len())
            .field("metadata", &self.metadata)
            .field("transition", &self.transition)
            .finish_non_exhaustive()
    }
}

/// Options accepted by [`super::Router::add_route`].
#[derive(Default, Clone)]
pub struct RouteOptions {
    title: Option<String>,
    requires_auth: bool,
    middleware: Vec<Guard>,
    breadcrumbs: Option<Vec<Breadcrumb>>,
    prefetch: Option<Prefetch>,
    transition: Option<Transition>,
}

impl RouteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Document title; defaults to the path.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn requires_auth(mut self) -> Self {
        self.requires_auth = true;
        self
    }

    /// Append a guard. Guards run in the order they were added.
    pub fn guard<F>(mut self, guard: F) -> Self
    where
        F: Fn(&RouteContext<'_>) -> bool + Send + Sync + 'static,
    {
        self.middleware.push(Arc::new(guard));
        self
    }

    pub fn breadcrumbs(mut self, breadcrumbs: Vec<Breadcrumb>) -> Self {
        self.breadcrumbs = Some(breadcrumbs);
        self
    }

    pub fn prefetch<F>(mut self, prefetch: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.prefetch = Some(Arc::new(prefetch));
        self
    }

    pub fn transition(mut self, transition: Transition) -> Self {
        self.transition = Some(transition);
        self
    }

    pub(crate) fn into_route(self, path: &str, handler: Handler) -> Route {
        Route {
            path: path.to_string(),
            handler,
            title: self.title.unwrap_or_else(|| path.to_string()),
            requires_auth: self.requires_auth,
            middleware: self.middleware,
            metadata: None,
            breadcrumbs: self.breadcrumbs,
            prefetch: self.prefetch,
            transition: self.transition,
        }
    }
}
