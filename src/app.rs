//! Application builder: middleware, routes and views.

use crate::handler::Handler;
use crate::method::Method;
use crate::middleware::{Middleware, Pipeline};
use crate::router::Router;
use crate::template::TemplateEngine;

/// Collects everything a [`Pipeline`] needs. Build it once at startup, then
/// pass it to [`Server::serve`](crate::Server::serve).
///
/// ```rust,no_run
/// use nanoweb::{App, Request, Response, Server, TemplateEngine};
///
/// #[tokio::main]
/// async fn main() {
///     let app = App::new()
///         .middleware(nanoweb::middleware::trace)
///         .views(TemplateEngine::new("./views"))
///         .get("/users/:id", show_user);
///
///     Server::bind("0.0.0.0:3000").serve(app).await.unwrap();
/// }
///
/// async fn show_user(req: Request) -> Response {
///     let id = req.param("id").unwrap_or_default();
///     Response::new().json(&serde_json::json!({ "id": id }))
/// }
/// ```
pub struct App {
    middleware: Vec<Box<dyn Middleware>>,
    router: Router,
    views: TemplateEngine,
}

impl App {
    pub fn new() -> Self {
        Self { middleware: Vec::new(), router: Router::new(), views: TemplateEngine::default() }
    }

    /// Appends `middleware` to the pipeline. Middleware run in the order
    /// they are added.
    pub fn middleware(mut self, middleware: impl Middleware) -> Self {
        self.middleware.push(Box::new(middleware));
        self
    }

    /// The engine handlers reach through [`Request::views`](crate::Request::views).
    /// Defaults to `./views`.
    pub fn views(mut self, engine: TemplateEngine) -> Self {
        self.views = engine;
        self
    }

    /// Registers a route. See [`Router::on`].
    pub fn on(mut self, method: Method, template: &str, handler: impl Handler) -> Self {
        self.router = self.router.on(method, template, handler);
        self
    }

    pub fn get(self, template: &str, handler: impl Handler) -> Self {
        self.on(Method::Get, template, handler)
    }

    pub fn post(self, template: &str, handler: impl Handler) -> Self {
        self.on(Method::Post, template, handler)
    }

    pub fn put(self, template: &str, handler: impl Handler) -> Self {
        self.on(Method::Put, template, handler)
    }

    pub fn delete(self, template: &str, handler: impl Handler) -> Self {
        self.on(Method::Delete, template, handler)
    }

    pub fn patch(self, template: &str, handler: impl Handler) -> Self {
        self.on(Method::Patch, template, handler)
    }

    /// Freezes the application into a request pipeline.
    pub fn into_pipeline(self) -> Pipeline {
        Pipeline::new(self.middleware, self.router, self.views)
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}
