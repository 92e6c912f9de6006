//! Static files.

use std::path::PathBuf;
use std::sync::Arc;

use percent_encoding::percent_decode_str;
use tracing::{debug, warn};

use super::{Middleware, Next};
use crate::method::Method;
use crate::request::Request;
use crate::response::{ContentType, Response};
use crate::storage;

/// Serves files under `root` for `GET` requests whose path names one.
///
/// The content type follows the file extension. Anything else (other
/// methods, directories, missing files, paths that leave `root`) falls
/// through to the rest of the pipeline.
///
/// ```rust
/// use nanoweb::App;
///
/// let app = App::new().middleware(nanoweb::middleware::serve_dir("./public"));
/// ```
pub fn serve_dir(root: impl Into<PathBuf>) -> impl Middleware {
    let root = Arc::new(root.into());
    move |req: Request, next: Next| {
        let root = Arc::clone(&root);
        async move {
            if req.method() != Method::Get {
                return next.run(req).await;
            }

            let decoded = percent_decode_str(req.path()).decode_utf8_lossy().into_owned();
            let Some(path) = storage::resolve(&root, decoded.trim_start_matches('/')) else {
                debug!(path = req.path(), "static path outside root");
                return next.run(req).await;
            };

            match tokio::fs::metadata(&path).await {
                Ok(metadata) if metadata.is_file() => match tokio::fs::read(&path).await {
                    Ok(bytes) => Response::new().bytes(ContentType::for_path(&path), bytes),
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "static file unreadable");
                        next.run(req).await
                    }
                },
                _ => next.run(req).await,
            }
        }
    }
}
