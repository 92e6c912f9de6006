//! Ordered request router.
//!
//! One route list per HTTP method, scanned in registration order. The first
//! route whose template matches wins; there is no specificity scoring, so a
//! later route with the same template as an earlier one is never reached.

use std::collections::HashMap;

use tracing::debug;

use crate::handler::{BoxedHandler, Handler};
use crate::method::Method;
use crate::pattern::{Matcher, Params};

/// A registered route.
pub struct Route {
    method: Method,
    matcher: Matcher,
    pub(crate) handler: BoxedHandler,
}

impl Route {
    pub fn method(&self) -> Method {
        self.method
    }

    pub fn template(&self) -> &str {
        self.matcher.template()
    }
}

/// Outcome of [`Router::lookup`].
pub enum RouteMatch<'a> {
    /// A route matched; `params` may be empty.
    Found { route: &'a Route, params: Params },
    /// The method has a route list, but nothing in it matched.
    NotFound,
    /// No route list exists for the method at all.
    MethodNotAllowed,
}

/// The routing table.
///
/// Route lists for `GET`, `POST`, `PUT`, `DELETE` and `PATCH` exist from the
/// start, so an unmatched request with one of those methods is a 404. Any
/// other method is a 405 until a route is registered for it with
/// [`Router::on`].
pub struct Router {
    routes: HashMap<Method, Vec<Route>>,
}

impl Router {
    pub fn new() -> Self {
        let routes = Method::ROUTABLE.into_iter().map(|m| (m, Vec::new())).collect();
        Self { routes }
    }

    /// Registers a handler for a method + path template. Returns `self` for
    /// chaining.
    ///
    /// Path parameters use `:name` syntax; `req.param("name")` retrieves
    /// them. A trailing `/` on a template other than `/` is dropped, the same
    /// way it is dropped from request paths.
    ///
    /// # Panics
    ///
    /// Panics if the template cannot be compiled.
    pub fn on(mut self, method: Method, template: &str, handler: impl Handler) -> Self {
        let matcher = Matcher::compile(normalize(template))
            .unwrap_or_else(|e| panic!("invalid route `{template}`: {e}"));
        self.routes.entry(method).or_default().push(Route {
            method,
            matcher,
            handler: handler.into_boxed_handler(),
        });
        self
    }

    /// Finds the route for `method` and `path`.
    ///
    /// A single trailing `/` is stripped from `path` before matching, except
    /// for the root path itself.
    pub fn lookup(&self, method: Method, path: &str) -> RouteMatch<'_> {
        let Some(routes) = self.routes.get(&method) else {
            return RouteMatch::MethodNotAllowed;
        };
        let path = normalize(path);

        routes
            .iter()
            .find_map(|route| {
                let params = route.matcher.captures(path)?;
                debug!(%method, path, template = route.template(), "route matched");
                Some(RouteMatch::Found { route, params })
            })
            .unwrap_or(RouteMatch::NotFound)
    }

    /// Registered routes for `method`, in registration order.
    pub fn routes(&self, method: Method) -> &[Route] {
        self.routes.get(&method).map(Vec::as_slice).unwrap_or_default()
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize(path: &str) -> &str {
    if path.len() > 1 {
        path.strip_suffix('/').unwrap_or(path)
    } else {
        path
    }
}
