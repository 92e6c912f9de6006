//! Handler trait and type erasure.
//!
//! # How handlers are stored
//!
//! Every method's route list holds handlers of *different* concrete types, so
//! each one is erased behind `dyn ErasedHandler` and shared through an `Arc`:
//!
//! ```text
//! async fn show(req: Request) -> Response { … }   ← user writes this
//!        ↓ app.get("/users/:id", show)
//! show.into_boxed_handler()                       ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(show))                       ← stored as BoxedHandler
//!        ↓
//! handler.call(req)  at request time              ← one vtable dispatch
//!        ↓
//! invoke(handler, req)                            ← Err / panic → 500
//! ```
//!
//! A handler may return anything that implements [`HandlerOutput`]: a plain
//! responder, or a `Result` whose error converts into [`HandlerFault`].

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;

use futures::FutureExt;
use tracing::error;

use crate::error::HandlerFault;
use crate::request::Request;
use crate::response::{IntoResponse, Response};
use crate::status::Status;

/// A heap-allocated, type-erased future.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` because it appears in the return type of
/// [`Handler::into_boxed_handler`].
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Request) -> BoxFuture<Result<Response, HandlerFault>>;
}

#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

/// What a handler's future may resolve to.
///
/// Implemented for the plain responders ([`Response`], `String`,
/// `&'static str`, [`Status`]) and for `Result<T, E>` where `T` is one of
/// those and `E: Into<HandlerFault>`, so handlers can use `?`:
///
/// ```rust
/// use nanoweb::{HandlerFault, Request, Response};
///
/// async fn show(req: Request) -> Result<Response, HandlerFault> {
///     let id: u64 = req.param("id").unwrap_or_default().parse()?;
///     Ok(Response::new().json(&serde_json::json!({ "id": id })))
/// }
/// ```
pub trait HandlerOutput: Send + 'static {
    fn into_outcome(self) -> Result<Response, HandlerFault>;
}

macro_rules! plain_output {
    ($($ty:ty),* $(,)?) => {$(
        impl HandlerOutput for $ty {
            fn into_outcome(self) -> Result<Response, HandlerFault> {
                Ok(self.into_response())
            }
        }
    )*};
}

plain_output!(Response, String, &'static str, Status);

impl<T, E> HandlerOutput for Result<T, E>
where
    T: IntoResponse + Send + 'static,
    E: Into<HandlerFault> + Send + 'static,
{
    fn into_outcome(self) -> Result<Response, HandlerFault> {
        self.map(IntoResponse::into_response).map_err(Into::into)
    }
}

/// Implemented for every valid route handler.
///
/// You never implement this yourself. Any function or closure of the shape
///
/// ```text
/// async fn name(req: Request) -> impl HandlerOutput
/// ```
///
/// satisfies it. The trait is sealed.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: HandlerOutput,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: HandlerOutput,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: HandlerOutput,
{
    fn call(&self, req: Request) -> BoxFuture<Result<Response, HandlerFault>> {
        let fut = (self.0)(req);
        Box::pin(async move { fut.await.into_outcome() })
    }
}

/// Runs a handler inside the failure boundary.
///
/// A returned [`HandlerFault`] or a panic is logged and answered with
/// `500 Internal error`; neither reaches the connection.
pub(crate) async fn invoke(handler: BoxedHandler, req: Request) -> Response {
    let run = async move {
        match handler.call(req).await {
            Ok(response) => response,
            Err(fault) => {
                error!(error = %fault, "handler failed");
                internal_error()
            }
        }
    };
    contain("handler", run).await
}

/// Polls `future`, answering `500 Internal error` if it panics.
pub(crate) async fn contain<F>(origin: &'static str, future: F) -> Response
where
    F: Future<Output = Response>,
{
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(response) => response,
        Err(panic) => {
            error!(origin, panic = panic_message(panic.as_ref()), "request processing panicked");
            internal_error()
        }
    }
}

fn internal_error() -> Response {
    Response::new().status(Status::InternalServerError).send("Internal error")
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::Method;

    fn request() -> Request {
        Request::new(Method::Get, "/")
    }

    #[tokio::test]
    async fn test_plain_output_passes_through() {
        async fn hello(_: Request) -> &'static str {
            "hello"
        }
        let response = invoke(hello.into_boxed_handler(), request()).await;
        assert_eq!(response.status_code(), 200);
        assert_eq!(response.body_text(), "hello");
    }

    #[tokio::test]
    async fn test_err_becomes_internal_error() {
        async fn broken(_: Request) -> Result<Response, HandlerFault> {
            Err(HandlerFault::msg("database unreachable"))
        }
        let response = invoke(broken.into_boxed_handler(), request()).await;
        assert_eq!(response.status_code(), 500);
        assert_eq!(response.body_text(), "Internal error");
    }

    #[tokio::test]
    async fn test_question_mark_converts_std_errors() {
        async fn parse(_: Request) -> Result<String, HandlerFault> {
            let n: u32 = "nope".parse()?;
            Ok(n.to_string())
        }
        let response = invoke(parse.into_boxed_handler(), request()).await;
        assert_eq!(response.status_code(), 500);
    }

    #[tokio::test]
    async fn test_panic_becomes_internal_error() {
        async fn explode(_: Request) -> Response {
            panic!("boom")
        }
        let response = invoke(explode.into_boxed_handler(), request()).await;
        assert_eq!(response.status_code(), 500);
        assert_eq!(response.body_text(), "Internal error");
    }

    #[tokio::test]
    async fn test_contain_passes_responses_through() {
        let response = contain("test", async { Response::new().status(Status::Accepted) }).await;
        assert_eq!(response.status_code(), 202);
    }

    #[test]
    fn test_panic_message_downcasts() {
        let s: Box<dyn Any + Send> = Box::new("static");
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let other: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(s.as_ref()), "static");
        assert_eq!(panic_message(owned.as_ref()), "owned");
        assert_eq!(panic_message(other.as_ref()), "non-string panic payload");
    }
}
