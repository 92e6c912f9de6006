//! Files on disk: upload persistence and directory browsing.
//!
//! Every path that comes from a client (a request path, a `?path=` query, an
//! upload's file name) is resolved with [`resolve`] first. A name is usable
//! only when it stays inside the root it is joined to: absolute names and
//! `..` components are refused.

use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::body::UploadedFile;
use crate::handler::Handler;
use crate::request::Request;
use crate::response::{ContentType, Response};
use crate::status::Status;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("no file uploaded in field `{0}`")]
    MissingFile(String),

    #[error("`{0}` is not a plain file name")]
    InvalidName(String),

    #[error("path escapes the root directory")]
    Forbidden,

    #[error("io: {0}")]
    Io(#[from] io::Error),
}

/// Joins `relative` onto `root`, or `None` if the result could leave `root`.
///
/// An empty name resolves to `root` itself.
pub fn resolve(root: &Path, relative: &str) -> Option<PathBuf> {
    let relative = Path::new(relative);
    relative
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        .then(|| root.join(relative))
}

/// The last component of a client-supplied file name, if it is a plain name.
fn plain_name(name: &str) -> Option<&str> {
    match Path::new(name).components().next_back() {
        Some(Component::Normal(last)) => last.to_str(),
        _ => None,
    }
}

/// Where an upload ended up.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedFile {
    pub original_name: String,
    pub saved_name: String,
    pub path: PathBuf,
    pub size: usize,
    pub mimetype: String,
}

impl UploadedFile {
    /// Writes the file to `dir/name`, creating `dir` if needed.
    ///
    /// `name` must be a single plain path component.
    pub async fn save_to(&self, dir: impl AsRef<Path>, name: &str) -> Result<SavedFile, StorageError> {
        let dir = dir.as_ref();
        if plain_name(name) != Some(name) {
            return Err(StorageError::InvalidName(name.to_owned()));
        }
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(name);
        tokio::fs::write(&path, &self.content).await?;
        debug!(path = %path.display(), size = self.size(), "upload saved");

        Ok(SavedFile {
            original_name: self.filename.clone(),
            saved_name: name.to_owned(),
            path,
            size: self.size(),
            mimetype: self.mimetype.clone(),
        })
    }
}

/// Saves uploaded files into one directory.
///
/// ```rust,no_run
/// use nanoweb::{HandlerFault, Request, Response};
/// use nanoweb::storage::Uploader;
///
/// async fn upload(req: Request) -> Result<Response, HandlerFault> {
///     let saved = Uploader::new("./uploads").save(&req, "document").await?;
///     Ok(Response::new().json(&saved))
/// }
/// ```
#[derive(Clone, Debug)]
pub struct Uploader {
    dir: PathBuf,
}

impl Uploader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Saves the file sent in `field` as `{unix millis}_{client file name}`.
    pub async fn save(&self, req: &Request, field: &str) -> Result<SavedFile, StorageError> {
        let file = uploaded(req, field)?;
        let client_name = plain_name(&file.filename)
            .ok_or_else(|| StorageError::InvalidName(file.filename.clone()))?;
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        file.save_to(&self.dir, &format!("{millis}_{client_name}")).await
    }

    /// Saves the file sent in `field` under exactly `name`.
    pub async fn save_as(&self, req: &Request, field: &str, name: &str) -> Result<SavedFile, StorageError> {
        uploaded(req, field)?.save_to(&self.dir, name).await
    }

    /// Saves every listed field; stops at the first failure.
    pub async fn save_all(&self, req: &Request, fields: &[&str]) -> Result<Vec<SavedFile>, StorageError> {
        let mut saved = Vec::with_capacity(fields.len());
        for field in fields {
            saved.push(self.save(req, field).await?);
        }
        Ok(saved)
    }

    /// Removes a saved file. `Ok(false)` if it did not exist.
    pub async fn delete(&self, name: &str) -> Result<bool, StorageError> {
        if plain_name(name) != Some(name) {
            return Err(StorageError::InvalidName(name.to_owned()));
        }
        match tokio::fs::remove_file(self.dir.join(name)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

fn uploaded<'a>(req: &'a Request, field: &str) -> Result<&'a UploadedFile, StorageError> {
    req.file(field).ok_or_else(|| StorageError::MissingFile(field.to_owned()))
}

/// One row of a directory listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub name: String,
    pub size: u64,
    /// Seconds since the Unix epoch, when the platform reports it.
    pub modified: Option<u64>,
    pub is_dir: bool,
}

/// Lists `relative` under `root`: directories first, then by name.
pub async fn list_dir(root: &Path, relative: &str) -> Result<Vec<Entry>, StorageError> {
    let dir = resolve(root, relative).ok_or(StorageError::Forbidden)?;
    let mut read_dir = tokio::fs::read_dir(&dir).await?;

    let mut entries = Vec::new();
    while let Some(entry) = read_dir.next_entry().await? {
        let metadata = entry.metadata().await?;
        entries.push(Entry {
            name: entry.file_name().to_string_lossy().into_owned(),
            size: metadata.len(),
            modified: metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs()),
            is_dir: metadata.is_dir(),
        });
    }
    entries.sort_by(|a, b| b.is_dir.cmp(&a.is_dir).then_with(|| a.name.cmp(&b.name)));
    Ok(entries)
}

/// A route handler that browses a directory.
///
/// The `path` query parameter selects what to show. A directory answers a
/// JSON listing, a file is sent as a download. Paths that leave the root
/// and files whose extension is not allowed answer `403`.
///
/// ```rust,no_run
/// use nanoweb::App;
/// use nanoweb::storage::Browser;
///
/// let app = App::new().get("/files", Browser::new("./public").allow_extensions(&["txt", "pdf"]).handler());
/// ```
#[derive(Clone, Debug)]
pub struct Browser {
    root: PathBuf,
    allowed: Option<Vec<String>>,
}

impl Browser {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), allowed: None }
    }

    /// Restricts downloads to these extensions (with or without the dot,
    /// case-insensitive). Listings are unaffected.
    pub fn allow_extensions(mut self, extensions: &[&str]) -> Self {
        let allowed = extensions
            .iter()
            .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
            .collect();
        self.allowed = Some(allowed);
        self
    }

    pub fn handler(self) -> impl Handler {
        let browser = Arc::new(self);
        move |req: Request| {
            let browser = Arc::clone(&browser);
            async move { browser.respond(&req).await }
        }
    }

    /// Answers one browse request.
    pub async fn respond(&self, req: &Request) -> Response {
        let relative = req.query().get("path").and_then(|v| v.as_str()).unwrap_or_default();
        let Some(target) = resolve(&self.root, relative) else {
            info!(path = relative, "browse outside root refused");
            return Response::new().status(Status::Forbidden).send("Access denied");
        };

        let metadata = match tokio::fs::metadata(&target).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Response::new().status(Status::NotFound).send("Not found");
            }
            Err(e) => return io_failure(&target, &e),
        };

        if metadata.is_file() {
            return self.download(&target).await;
        }
        match list_dir(&self.root, relative).await {
            Ok(entries) => Response::new().json(&json!({ "path": relative, "entries": entries })),
            Err(StorageError::Io(e)) => io_failure(&target, &e),
            Err(_) => Response::new().status(Status::Forbidden).send("Access denied"),
        }
    }

    async fn download(&self, path: &Path) -> Response {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        if self.allowed.as_ref().is_some_and(|allowed| !allowed.contains(&extension)) {
            return Response::new().status(Status::Forbidden).send("File type not allowed");
        }

        let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        match tokio::fs::read(path).await {
            Ok(bytes) => Response::new()
                .header("content-disposition", &format!("attachment; filename=\"{name}\""))
                .bytes(ContentType::OctetStream, bytes),
            Err(e) => io_failure(path, &e),
        }
    }
}

fn io_failure(path: &Path, e: &io::Error) -> Response {
    error!(path = %path.display(), error = %e, "browse failed");
    Response::new().status(Status::InternalServerError).send("Internal error")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::Method;

    fn upload_request(filename: &str, content: &str) -> Request {
        let body = format!(
            "--B\r\nContent-Disposition: form-data; name=\"document\"; filename=\"{filename}\"\r\n\
             Content-Type: text/plain\r\n\r\n{content}\r\n--B--\r\n"
        );
        Request::new(Method::Post, "/upload")
            .with_header("content-type", "multipart/form-data; boundary=B")
            .with_body(body)
    }

    #[test]
    fn test_resolve_stays_inside_root() {
        let root = Path::new("/srv/public");
        assert_eq!(resolve(root, "css/site.css"), Some(root.join("css/site.css")));
        assert_eq!(resolve(root, "./a.txt"), Some(root.join("a.txt")));
        assert_eq!(resolve(root, ""), Some(root.to_path_buf()));
        assert_eq!(resolve(root, "../etc/passwd"), None);
        assert_eq!(resolve(root, "a/../../b"), None);
        assert_eq!(resolve(root, "/etc/passwd"), None);
    }

    #[test]
    fn test_plain_name_takes_last_component() {
        assert_eq!(plain_name("report.pdf"), Some("report.pdf"));
        assert_eq!(plain_name("../../etc/passwd"), Some("passwd"));
        assert_eq!(plain_name(".."), None);
        assert_eq!(plain_name(""), None);
    }

    #[tokio::test]
    async fn test_save_as_writes_bytes_and_reports_names() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("uploads");
        let req = upload_request("notes.txt", "hello disk");

        let saved = Uploader::new(&target).save_as(&req, "document", "kept.txt").await.unwrap();
        assert_eq!(saved.original_name, "notes.txt");
        assert_eq!(saved.saved_name, "kept.txt");
        assert_eq!(saved.path, target.join("kept.txt"));
        assert_eq!(saved.size, 10);
        assert_eq!(saved.mimetype, "text/plain");
        assert_eq!(std::fs::read(&saved.path).unwrap(), b"hello disk");
    }

    #[tokio::test]
    async fn test_save_prefixes_timestamp_and_strips_client_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let req = upload_request("../../evil.txt", "x");

        let saved = Uploader::new(dir.path()).save(&req, "document").await.unwrap();
        let (millis, rest) = saved.saved_name.split_once('_').unwrap();
        assert!(millis.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(rest, "evil.txt");
        assert_eq!(saved.path.parent(), Some(dir.path()));
        assert!(saved.path.exists());
    }

    #[tokio::test]
    async fn test_save_errors() {
        let dir = tempfile::tempdir().unwrap();
        let uploader = Uploader::new(dir.path());
        let req = upload_request("a.txt", "x");

        assert!(matches!(
            uploader.save(&req, "missing").await,
            Err(StorageError::MissingFile(field)) if field == "missing"
        ));
        assert!(matches!(
            uploader.save_as(&req, "document", "../a.txt").await,
            Err(StorageError::InvalidName(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_reports_whether_file_existed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("old.txt"), "x").unwrap();
        let uploader = Uploader::new(dir.path());

        assert!(uploader.delete("old.txt").await.unwrap());
        assert!(!uploader.delete("old.txt").await.unwrap());
        assert!(matches!(uploader.delete("../old.txt").await, Err(StorageError::InvalidName(_))));
    }

    #[tokio::test]
    async fn test_list_dir_orders_directories_first() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "bb").unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        std::fs::create_dir(dir.path().join("z")).unwrap();

        let entries = list_dir(dir.path(), "").await.unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["z", "a.txt", "b.txt"]);
        assert!(entries[0].is_dir);
        assert_eq!(entries[2].size, 2);
        assert!(matches!(list_dir(dir.path(), "..").await, Err(StorageError::Forbidden)));
    }

    #[tokio::test]
    async fn test_browser_answers() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("docs")).unwrap();
        std::fs::write(dir.path().join("docs/guide.txt"), "read me").unwrap();
        std::fs::write(dir.path().join("docs/run.sh"), "echo").unwrap();
        let browser = Browser::new(dir.path()).allow_extensions(&[".TXT"]);

        let get = |target: &str| Request::new(Method::Get, target);

        let listing = browser.respond(&get("/files?path=docs")).await;
        assert_eq!(listing.status_code(), 200);
        let body: serde_json::Value = serde_json::from_slice(listing.body()).unwrap();
        assert_eq!(body["path"], "docs");
        assert_eq!(body["entries"][0]["name"], "guide.txt");
        assert_eq!(body["entries"][0]["isDir"], false);

        let file = browser.respond(&get("/files?path=docs/guide.txt")).await;
        assert_eq!(file.body_text(), "read me");
        assert_eq!(
            file.header_value("content-disposition"),
            Some("attachment; filename=\"guide.txt\"")
        );

        assert_eq!(browser.respond(&get("/files?path=docs/run.sh")).await.status_code(), 403);
        assert_eq!(browser.respond(&get("/files?path=../")).await.status_code(), 403);
        assert_eq!(browser.respond(&get("/files?path=nope")).await.status_code(), 404);
    }
}
