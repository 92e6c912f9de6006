use std::sync::{Arc, Mutex};

use nanoweb::{App, HandlerFault, Method, Middleware, Next, Request, Response, Status, TemplateEngine};
use serde_json::json;

type Log = Arc<Mutex<Vec<&'static str>>>;

fn recorder(log: &Log, name: &'static str) -> impl Middleware {
    let log = Arc::clone(log);
    move |req: Request, next: Next| {
        let log = Arc::clone(&log);
        async move {
            log.lock().unwrap().push(name);
            next.run(req).await
        }
    }
}

fn multipart_request() -> Request {
    let body = "--B\r\n\
                Content-Disposition: form-data; name=\"title\"\r\n\r\n\
                Hello\r\n\
                --B\r\n\
                Content-Disposition: form-data; name=\"document\"; filename=\"a.txt\"\r\n\
                Content-Type: text/plain\r\n\r\n\
                XY\r\n\
                --B--\r\n";
    Request::new(Method::Post, "/upload")
        .with_header("Content-Type", "multipart/form-data; boundary=B")
        .with_body(body)
}

#[tokio::test]
async fn test_middleware_runs_in_registration_order() {
    let log: Log = Arc::default();
    let handler_log = Arc::clone(&log);
    let pipeline = App::new()
        .middleware(recorder(&log, "m1"))
        .middleware(recorder(&log, "m2"))
        .get("/", move |_req: Request| {
            let log = Arc::clone(&handler_log);
            async move {
                log.lock().unwrap().push("handler");
                "ok"
            }
        })
        .into_pipeline();

    let response = pipeline.handle(Request::new(Method::Get, "/")).await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(*log.lock().unwrap(), ["m1", "m2", "handler"]);
}

#[tokio::test]
async fn test_middleware_short_circuits() {
    let log: Log = Arc::default();
    let handler_log = Arc::clone(&log);
    let pipeline = App::new()
        .middleware(|_req: Request, _next: Next| async {
            Response::new().status(Status::Unauthorized).send("stop")
        })
        .middleware(recorder(&log, "m2"))
        .get("/", move |_req: Request| {
            let log = Arc::clone(&handler_log);
            async move {
                log.lock().unwrap().push("handler");
                "ok"
            }
        })
        .into_pipeline();

    let response = pipeline.handle(Request::new(Method::Get, "/")).await;
    assert_eq!(response.status_code(), 401);
    assert_eq!(response.body_text(), "stop");
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_middleware_can_rewrite_the_response() {
    async fn stamp(req: Request, next: Next) -> Response {
        next.run(req).await.header("x-stamp", "1")
    }
    let pipeline = App::new().middleware(stamp).into_pipeline();

    let response = pipeline.handle(Request::new(Method::Get, "/missing")).await;
    assert_eq!(response.status_code(), 404);
    assert_eq!(response.header_value("x-stamp"), Some("1"));
}

#[tokio::test]
async fn test_middleware_passes_extensions_to_handler() {
    #[derive(Clone)]
    struct RequestId(&'static str);

    async fn assign_id(mut req: Request, next: Next) -> Response {
        req.extensions_mut().insert(RequestId("req-1"));
        next.run(req).await
    }
    async fn echo_id(req: Request) -> String {
        req.extensions().get::<RequestId>().map(|id| id.0).unwrap_or("none").to_owned()
    }

    let pipeline = App::new().middleware(assign_id).get("/", echo_id).into_pipeline();
    let response = pipeline.handle(Request::new(Method::Get, "/")).await;
    assert_eq!(response.body_text(), "req-1");
}

#[tokio::test]
async fn test_not_found_and_method_not_allowed() {
    let pipeline = App::new().get("/things", |_req: Request| async { "things" }).into_pipeline();

    let missing = pipeline.handle(Request::new(Method::Get, "/nothing")).await;
    assert_eq!(missing.status_code(), 404);
    assert_eq!(missing.body_text(), "Not Found");

    let options = pipeline.handle(Request::new(Method::Options, "/things")).await;
    assert_eq!(options.status_code(), 405);
    assert_eq!(options.body_text(), "Method Not Allowed");

    let delete = pipeline.handle(Request::new(Method::Delete, "/things")).await;
    assert_eq!(delete.status_code(), 404);
}

#[tokio::test]
async fn test_params_and_query_reach_handler() {
    async fn show(req: Request) -> Response {
        Response::new().json(&json!({
            "id": req.param("id"),
            "tab": req.query().get("tab"),
        }))
    }
    let pipeline = App::new().get("/users/:id", show).into_pipeline();

    let response = pipeline.handle(Request::new(Method::Get, "/users/42/?tab=posts")).await;
    assert_eq!(response.status_code(), 200);
    let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(body, json!({"id": "42", "tab": "posts"}));
}

#[tokio::test]
async fn test_first_registered_route_wins() {
    let pipeline = App::new()
        .get("/users/:id", |_req: Request| async { "by id" })
        .get("/users/me", |_req: Request| async { "me" })
        .into_pipeline();

    let response = pipeline.handle(Request::new(Method::Get, "/users/me")).await;
    assert_eq!(response.body_text(), "by id");
}

#[tokio::test]
async fn test_handler_failures_become_500() {
    async fn fails(_req: Request) -> Result<Response, HandlerFault> {
        Err(HandlerFault::msg("boom"))
    }
    async fn panics(_req: Request) -> Response {
        panic!("handler bug")
    }
    let pipeline = App::new().get("/fails", fails).get("/panics", panics).into_pipeline();

    for path in ["/fails", "/panics"] {
        let response = pipeline.handle(Request::new(Method::Get, path)).await;
        assert_eq!(response.status_code(), 500, "{path}");
        assert_eq!(response.body_text(), "Internal error");
    }

    // The pipeline keeps serving afterwards.
    let response = pipeline.handle(Request::new(Method::Get, "/fails")).await;
    assert_eq!(response.status_code(), 500);
}

#[tokio::test]
async fn test_multipart_upload_reaches_handler() {
    async fn upload(req: Request) -> Response {
        let file = req.file("document").cloned();
        Response::new().json(&json!({
            "body": req.body(),
            "filename": file.as_ref().map(|f| f.filename.clone()),
            "content": file.as_ref().map(|f| String::from_utf8_lossy(&f.content).into_owned()),
            "mimetype": file.as_ref().map(|f| f.mimetype.clone()),
        }))
    }
    let pipeline = App::new().post("/upload", upload).into_pipeline();

    let response = pipeline.handle(multipart_request()).await;
    let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(
        body,
        json!({
            "body": {"title": "Hello"},
            "filename": "a.txt",
            "content": "XY",
            "mimetype": "text/plain",
        })
    );
}

#[tokio::test]
async fn test_bad_json_body_is_empty_mapping() {
    async fn echo(req: Request) -> Response {
        Response::new().json(req.body())
    }
    let pipeline = App::new().post("/echo", echo).into_pipeline();

    let request = Request::new(Method::Post, "/echo")
        .with_header("content-type", "application/json")
        .with_body("not json");
    let response = pipeline.handle(request).await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.body_text(), "{}");
}

#[tokio::test]
async fn test_redirect_cookies_and_session() {
    const SECRET: &str = "test-secret";

    async fn login(_req: Request) -> Response {
        Response::new()
            .set_session("user", &json!({"id": 7}), SECRET)
            .redirect("/me")
    }
    async fn me(req: Request) -> Response {
        match req.session("user", SECRET) {
            Some(user) => Response::new().json(&user),
            None => Response::new().status(Status::Unauthorized).send("no session"),
        }
    }
    let pipeline = App::new().get("/login", login).get("/me", me).into_pipeline();

    let login = pipeline.handle(Request::new(Method::Get, "/login")).await;
    assert_eq!(login.status_code(), 302);
    assert_eq!(login.header_value("location"), Some("/me"));
    let cookie = login.header_value("set-cookie").unwrap();
    let pair = cookie.split(';').next().unwrap();

    let me_ok = pipeline.handle(Request::new(Method::Get, "/me").with_header("cookie", pair)).await;
    assert_eq!(me_ok.body_text(), r#"{"id":7}"#);

    let forged = pair.replace("session_user=", "session_user=x");
    let me_forged = pipeline.handle(Request::new(Method::Get, "/me").with_header("cookie", &forged)).await;
    assert_eq!(me_forged.status_code(), 401);
}

#[tokio::test]
async fn test_render_uses_configured_views() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("hello.html"), "Hello, {{ name }}!").unwrap();

    async fn hello(req: Request) -> Response {
        let name = req.param("name").unwrap_or_default().to_owned();
        Response::new().render(req.views(), "hello", &json!({ "name": name }))
    }
    async fn missing(req: Request) -> Response {
        Response::new().render(req.views(), "nope", &json!({}))
    }
    let pipeline = App::new()
        .views(TemplateEngine::new(dir.path()))
        .get("/hello/:name", hello)
        .get("/missing", missing)
        .into_pipeline();

    let page = pipeline.handle(Request::new(Method::Get, "/hello/Ada")).await;
    assert_eq!(page.status_code(), 200);
    assert_eq!(page.body_text(), "Hello, Ada!");
    assert_eq!(page.header_value("content-type"), Some("text/html; charset=utf-8"));

    let miss = pipeline.handle(Request::new(Method::Get, "/missing")).await;
    assert_eq!(miss.status_code(), 404);
    assert_eq!(miss.body_text(), "View nope not found");
}

#[tokio::test]
async fn test_middleware_panic_becomes_500() {
    async fn broken(_req: Request, _next: Next) -> Response {
        panic!("middleware bug")
    }

    let log: Log = Arc::default();
    let seen = Arc::new(Mutex::new(None));
    let seen_status = Arc::clone(&seen);
    let pipeline = App::new()
        .middleware(move |req: Request, next: Next| {
            let seen = Arc::clone(&seen_status);
            async move {
                let response = next.run(req).await;
                *seen.lock().unwrap() = Some(response.status_code());
                response
            }
        })
        .middleware(broken)
        .middleware(recorder(&log, "after"))
        .get("/", |_req: Request| async { "ok" })
        .into_pipeline();

    let response = pipeline.handle(Request::new(Method::Get, "/")).await;
    assert_eq!(response.status_code(), 500);
    assert_eq!(response.body_text(), "Internal error");
    assert_eq!(*seen.lock().unwrap(), Some(500));
    assert!(log.lock().unwrap().is_empty());
}

fn static_site() -> (tempfile::TempDir, nanoweb::Pipeline) {
    let outer = tempfile::tempdir().unwrap();
    std::fs::write(outer.path().join("secret.txt"), "private").unwrap();
    let public = outer.path().join("public");
    std::fs::create_dir_all(public.join("css")).unwrap();
    std::fs::write(public.join("css/site.css"), "body{}").unwrap();
    std::fs::write(public.join("logo.png"), [0x89, b'P', b'N', b'G']).unwrap();

    let pipeline = App::new()
        .middleware(nanoweb::middleware::serve_dir(&public))
        .get("/api", |_req: Request| async { "api" })
        .into_pipeline();
    (outer, pipeline)
}

#[tokio::test]
async fn test_static_files_are_served_by_extension() {
    let (_dir, pipeline) = static_site();

    let css = pipeline.handle(Request::new(Method::Get, "/css/site.css")).await;
    assert_eq!(css.status_code(), 200);
    assert_eq!(css.header_value("content-type"), Some("text/css; charset=utf-8"));
    assert_eq!(css.body_text(), "body{}");

    let png = pipeline.handle(Request::new(Method::Get, "/logo.png")).await;
    assert_eq!(png.header_value("content-type"), Some("image/png"));
    assert_eq!(&png.body()[..], [0x89, b'P', b'N', b'G']);
}

#[tokio::test]
async fn test_static_misses_fall_through() {
    let (_dir, pipeline) = static_site();

    let api = pipeline.handle(Request::new(Method::Get, "/api")).await;
    assert_eq!(api.body_text(), "api");

    let missing = pipeline.handle(Request::new(Method::Get, "/missing.css")).await;
    assert_eq!(missing.status_code(), 404);
    assert_eq!(missing.body_text(), "Not Found");

    let directory = pipeline.handle(Request::new(Method::Get, "/css")).await;
    assert_eq!(directory.status_code(), 404);

    let post = pipeline.handle(Request::new(Method::Post, "/css/site.css")).await;
    assert_eq!(post.status_code(), 404);
}

#[tokio::test]
async fn test_static_refuses_paths_outside_root() {
    let (_dir, pipeline) = static_site();

    for path in ["/../secret.txt", "/css/../../secret.txt", "/%2e%2e/secret.txt"] {
        let response = pipeline.handle(Request::new(Method::Get, path)).await;
        assert_eq!(response.status_code(), 404, "{path}");
        assert_ne!(response.body_text(), "private", "{path}");
    }
}

#[tokio::test]
async fn test_upload_is_saved_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    let uploads = dir.path().join("uploads");
    let uploader = nanoweb::Uploader::new(&uploads);

    let pipeline = App::new()
        .post("/upload", move |req: Request| {
            let uploader = uploader.clone();
            async move {
                let saved = uploader.save_as(&req, "document", "stored.txt").await?;
                Ok::<_, HandlerFault>(Response::new().json(&saved))
            }
        })
        .into_pipeline();

    let response = pipeline.handle(multipart_request()).await;
    assert_eq!(response.status_code(), 200);
    let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(body["originalName"], "a.txt");
    assert_eq!(body["savedName"], "stored.txt");
    assert_eq!(body["size"], 2);
    assert_eq!(body["mimetype"], "text/plain");
    assert_eq!(std::fs::read(uploads.join("stored.txt")).unwrap(), b"XY");
}
