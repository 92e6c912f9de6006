//! nanoweb demo: JSON endpoints, forms with uploads, cookies, signed
//! sessions and rendered views.
//!
//! Run from the crate root (views are read from `demos/views`):
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/user/123?tab=posts
//!   curl -X POST http://localhost:3000/api/users \
//!        -H 'content-type: application/json' \
//!        -d '{"name":"alice"}'
//!   curl -F title=Hello -F document=@Cargo.toml http://localhost:3000/upload
//!   curl http://localhost:3000/style.css
//!   curl 'http://localhost:3000/files?path=docs'
//!   curl -i http://localhost:3000/session-demo
//!   curl http://localhost:3000/profile/Ada

use nanoweb::storage::{Browser, StorageError, Uploader};
use nanoweb::{App, CookieOptions, HandlerFault, Next, Request, Response, Server, Status, TemplateEngine};
use serde_json::json;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const SESSION_SECRET: &str = "change-me";

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let app = App::new()
        .middleware(nanoweb::middleware::trace)
        .middleware(powered_by)
        .middleware(nanoweb::middleware::serve_dir("demos/public"))
        .views(TemplateEngine::new("demos/views"))
        .get("/", index)
        .get("/user/:id", show_user)
        .get("/api/users", list_users)
        .post("/api/users", create_user)
        .post("/upload", upload)
        .get("/files", Browser::new("demos/public").allow_extensions(&["txt", "css"]).handler())
        .get("/set-cookie", set_cookie)
        .get("/remove-cookie", remove_cookie)
        .get("/session-demo", start_session)
        .get("/check-session", check_session)
        .get("/logout", logout)
        .get("/mvc-demo", mvc_demo)
        .get("/profile/:name", profile)
        .get("/status/:state", status_page);

    Server::bind("0.0.0.0:3000")
        .serve(app)
        .await
        .expect("server error");
}

// Runs around every request; adds a header to whatever comes back.
async fn powered_by(req: Request, next: Next) -> Response {
    next.run(req).await.header("x-powered-by", "nanoweb")
}

async fn index(_req: Request) -> &'static str {
    r#"<h1>nanoweb</h1>
<ul>
  <li><a href="/user/123?tab=posts">Route and query params</a></li>
  <li><a href="/set-cookie">Set cookies</a></li>
  <li><a href="/session-demo">Signed session</a></li>
  <li><a href="/mvc-demo">Rendered view</a></li>
  <li><a href="/profile/Ada">Profile</a></li>
  <li><a href="/status/active">Status: active</a></li>
  <li><a href="/status/banned">Status: banned</a></li>
  <li><a href="/files">Browse demos/public</a></li>
  <li><a href="/style.css">Static file</a></li>
</ul>"#
}

// GET /user/:id
async fn show_user(req: Request) -> Response {
    Response::new().json(&json!({
        "message": "User details",
        "userId": req.param("id"),
        "query": req.query(),
    }))
}

async fn list_users(_req: Request) -> Response {
    Response::new().json(&json!([
        { "id": 1, "name": "John Doe" },
        { "id": 2, "name": "Jane Smith" },
    ]))
}

// POST /api/users: JSON or form body, already decoded.
async fn create_user(req: Request) -> Response {
    Response::new()
        .status(Status::Created)
        .json(&json!({ "message": "User created", "data": req.body() }))
}

// POST /upload (multipart/form-data): saved under ./uploads
async fn upload(req: Request) -> Result<Response, HandlerFault> {
    match Uploader::new("./uploads").save(&req, "document").await {
        Ok(file) => Ok(Response::new().json(&json!({
            "message": "File uploaded successfully",
            "file": file,
            "formData": req.body(),
        }))),
        Err(StorageError::MissingFile(field)) => Ok(Response::new()
            .status(Status::BadRequest)
            .json(&json!({ "error": format!("no file in field `{field}`") }))),
        Err(e) => Err(e.into()),
    }
}

async fn set_cookie(_req: Request) -> Response {
    Response::new()
        .set_cookie("username", "JohnDoe", &CookieOptions::default().max_age(Duration::from_secs(900)))
        .set_cookie("preferences", &json!({ "theme": "dark" }).to_string(), &CookieOptions::default())
        .send(r#"Cookies set! <a href="/remove-cookie">Remove one</a>"#)
}

async fn remove_cookie(req: Request) -> Response {
    let before = req.cookie("username").unwrap_or_else(|| "(none)".to_owned());
    Response::new()
        .remove_cookie("username")
        .send(format!(r#"Removed username={before}. <a href="/">Home</a>"#))
}

async fn start_session(_req: Request) -> Response {
    let user = json!({ "id": 1, "name": "John Doe" });
    Response::new()
        .set_session("user", &user, SESSION_SECRET)
        .send(r#"Session set! <a href="/check-session">Check session</a>"#)
}

async fn check_session(req: Request) -> Response {
    match req.session("user", SESSION_SECRET) {
        Some(user) => Response::new().json(&json!({ "session": user })),
        None => Response::new().status(Status::Unauthorized).send("No valid session"),
    }
}

async fn logout(_req: Request) -> Response {
    Response::new().clear_session("user").redirect("/")
}

async fn mvc_demo(req: Request) -> Response {
    let context = json!({
        "title": "Welcome to nanoweb",
        "siteName": "nanoweb",
        "user": { "name": "Administrator", "email": "admin@example.com", "role": "Super Admin" },
        "users": [
            { "name": "Alice", "age": 25, "email": "alice@example.com" },
            { "name": "Bob", "age": 30, "email": "bob@example.com" },
            { "name": "Charlie", "age": 35, "email": "charlie@example.com" },
        ],
        "showList": true,
        "stats": { "totalUsers": 150, "activeUsers": 89 },
    });
    Response::new().render(req.views(), "home", &context)
}

async fn profile(req: Request) -> Response {
    let name = req.param("name").unwrap_or("anonymous");
    let context = json!({
        "user": {
            "name": name,
            "email": format!("{}@example.com", name.to_lowercase()),
            "location": "San Francisco, CA",
        },
        "skills": ["Rust", "tokio", "hyper", "serde"],
        "isOnline": true,
    });
    Response::new().render(req.views(), "profile", &context)
}

async fn status_page(req: Request) -> Response {
    let state = req.param("state").unwrap_or_default();
    let post_count = if state == "active" { 42 } else { 0 };
    let context = json!({
        "userName": "JohnDoe",
        "isActive": state == "active",
        "isBanned": state == "banned",
        "userStatus": state,
        "postCount": post_count,
    });
    Response::new().render(req.views(), "status", &context)
}
