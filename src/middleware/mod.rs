//! Middleware pipeline.
//!
//! Middleware run in registration order. Each one receives the request and
//! a [`Next`] continuation; calling [`Next::run`] hands the request to the
//! following middleware, or to route handling once the list is exhausted.
//! A middleware that returns without calling `next` short-circuits
//! everything after it. A middleware that panics is answered with
//! `500 Internal error`, like a failing handler.
//!
//! ```rust
//! use nanoweb::{App, Next, Request, Response, Status};
//!
//! async fn require_token(req: Request, next: Next) -> Response {
//!     match req.header("authorization") {
//!         Some(_) => next.run(req).await,
//!         None => Response::new().status(Status::Unauthorized).send("Unauthorized"),
//!     }
//! }
//!
//! let app = App::new()
//!     .middleware(nanoweb::middleware::trace)
//!     .middleware(require_token);
//! ```

pub mod serve_dir;
pub mod trace;

use std::future::Future;
use std::sync::Arc;

use tracing::debug;

use crate::handler::{BoxFuture, contain, invoke};
use crate::request::Request;
use crate::response::Response;
use crate::router::{RouteMatch, Router};
use crate::status::Status;
use crate::template::TemplateEngine;

pub use serve_dir::serve_dir;
pub use trace::trace;

/// A unit of request processing that may short-circuit the pipeline.
///
/// Implemented for every `async fn(Request, Next) -> Response` and for
/// closures of that shape.
pub trait Middleware: Send + Sync + 'static {
    fn call(&self, req: Request, next: Next) -> BoxFuture<Response>;
}

impl<F, Fut> Middleware for F
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    fn call(&self, req: Request, next: Next) -> BoxFuture<Response> {
        Box::pin(self(req, next))
    }
}

/// The rest of the pipeline, from one middleware's point of view.
///
/// Single use: `run` consumes it.
pub struct Next {
    pipeline: Arc<Inner>,
    cursor: usize,
}

impl Next {
    /// Passes `req` to the next middleware, or to route handling after the
    /// last one.
    pub async fn run(self, req: Request) -> Response {
        match self.pipeline.middleware.get(self.cursor) {
            Some(middleware) => {
                let next = Next { pipeline: Arc::clone(&self.pipeline), cursor: self.cursor + 1 };
                contain("middleware", async move { middleware.call(req, next).await }).await
            }
            None => self.pipeline.route(req).await,
        }
    }
}

/// A finished application: middleware, routes and views, ready to handle
/// requests. Cheap to clone.
#[derive(Clone)]
pub struct Pipeline {
    inner: Arc<Inner>,
}

struct Inner {
    middleware: Vec<Box<dyn Middleware>>,
    router: Router,
    views: Arc<TemplateEngine>,
}

impl Pipeline {
    pub(crate) fn new(
        middleware: Vec<Box<dyn Middleware>>,
        router: Router,
        views: TemplateEngine,
    ) -> Self {
        let inner = Inner { middleware, router, views: Arc::new(views) };
        Self { inner: Arc::new(inner) }
    }

    /// Runs one request through every middleware and, unless one of them
    /// short-circuits, route handling.
    pub async fn handle(&self, mut req: Request) -> Response {
        req.set_views(Arc::clone(&self.inner.views));
        Next { pipeline: Arc::clone(&self.inner), cursor: 0 }.run(req).await
    }

    pub fn router(&self) -> &Router {
        &self.inner.router
    }
}

impl Inner {
    async fn route(&self, mut req: Request) -> Response {
        match self.router.lookup(req.method(), req.path()) {
            RouteMatch::Found { route, params } => {
                let handler = Arc::clone(&route.handler);
                req.set_params(params);
                invoke(handler, req).await
            }
            RouteMatch::NotFound => {
                debug!(method = %req.method(), path = req.path(), "no route matched");
                Response::new().status(Status::NotFound).send("Not Found")
            }
            RouteMatch::MethodNotAllowed => {
                debug!(method = %req.method(), "no routes for method");
                Response::new().status(Status::MethodNotAllowed).send("Method Not Allowed")
            }
        }
    }
}
