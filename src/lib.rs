//! # nanoweb
//!
//! A minimal HTTP application toolkit: ordered routing with `:name`
//! parameters, a middleware pipeline, request-body decoding (JSON,
//! URL-encoded, multipart), response helpers for cookies and signed
//! sessions, and a small text-template engine.
//!
//! What a request goes through:
//!
//! - **Server**: hyper HTTP/1.1 on tokio. The body of a `POST`/`PUT`/`PATCH`
//!   is read in full and decoded before anything else runs.
//! - **Middleware**: run in registration order; any of them may answer
//!   directly instead of calling `next`.
//! - **Routing**: first registered template that matches wins. Unmatched
//!   path is `404`, a method with no routes is `405`.
//! - **Handler**: runs inside a failure boundary; an `Err` or a panic becomes
//!   `500 Internal error`. Middleware panics are caught the same way.
//!
//! Around that core, [`middleware::serve_dir()`] serves static files and
//! [`storage`] saves uploads and browses directories.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use nanoweb::{App, HandlerFault, Request, Response, Server, Status};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() {
//!     let app = App::new()
//!         .middleware(nanoweb::middleware::trace)
//!         .get("/users/:id", get_user)
//!         .post("/users", create_user);
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await.unwrap();
//! }
//!
//! async fn get_user(req: Request) -> Result<Response, HandlerFault> {
//!     let id: u64 = req.param("id").unwrap_or_default().parse()?;
//!     Ok(Response::new().json(&json!({ "id": id })))
//! }
//!
//! async fn create_user(req: Request) -> Response {
//!     match req.body().get("name") {
//!         Some(name) => Response::new()
//!             .status(Status::Created)
//!             .header("location", "/users/99")
//!             .json(&json!({ "id": 99, "name": name })),
//!         None => Response::new().status(Status::BadRequest).send("name is required"),
//!     }
//! }
//! ```

mod app;
mod error;
mod handler;
mod method;
mod multipart;
mod pattern;
mod request;
mod response;
mod router;
mod server;
mod status;

pub mod body;
pub mod cookie;
pub mod middleware;
pub mod storage;
pub mod template;

pub use app::App;
pub use body::{DecodeError, Files, UploadedFile};
pub use cookie::{CookieOptions, SameSite};
pub use error::{Error, HandlerFault};
pub use handler::{Handler, HandlerOutput};
pub use method::{Method, UnknownMethod};
pub use middleware::{Middleware, Next, Pipeline};
pub use pattern::{Matcher, Params};
pub use request::Request;
pub use response::{ContentType, IntoResponse, Payload, Response};
pub use router::{Route, RouteMatch, Router};
pub use server::Server;
pub use status::Status;
pub use storage::{Browser, SavedFile, StorageError, Uploader};
pub use template::{Context, Directory, TemplateEngine, TemplateSource};
